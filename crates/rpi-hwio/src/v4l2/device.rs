// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Video capture device node backed by V4L2 ioctls.

use super::driver::{BufferInfo, DequeuedBuffer, Driver, FormatDescription, Mapping, PixFormat};
use crate::{fourcc::FourCC, Error};
use rpi_hwio_sys::{libc, v4l2 as ffi};
use std::{
    fs::{File, OpenOptions},
    io,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
    ptr::{self, NonNull},
    time::Duration,
};
use unix_ts::Timestamp;

/// An open V4L2 capture device.
///
/// The node is opened non-blocking so that `VIDIOC_DQBUF` reports an empty
/// queue instead of sleeping; waiting is done with [`Driver::poll_readable`].
/// The descriptor is closed on drop.
#[derive(Debug)]
pub struct V4l2Device {
    file: File,
    path: PathBuf,
}

impl V4l2Device {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| Error::DeviceOpen {
                path: path.to_owned(),
                source,
            })?;

        log::debug!("opened {} (fd {})", path.display(), file.as_raw_fd());
        Ok(V4l2Device {
            file,
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Issue `request` with `arg`, retrying when interrupted by a signal.
    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
        loop {
            // SAFETY: arg is a live, exclusively borrowed #[repr(C)] value of
            // the type encoded in the request code.
            let ret = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
            if ret != -1 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl AsFd for V4l2Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for V4l2Device {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

fn pix_format(pix: &ffi::v4l2_pix_format) -> PixFormat {
    PixFormat {
        width: pix.width,
        height: pix.height,
        fourcc: FourCC::from(pix.pixelformat),
        field: pix.field,
        bytes_per_line: pix.bytesperline,
        size_image: pix.sizeimage,
    }
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

/// Poll timeout in milliseconds, rounded up so short waits do not spin.
fn poll_millis(timeout: Duration) -> libc::c_int {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
}

impl Driver for V4l2Device {
    fn enum_format(&mut self, index: u32) -> io::Result<Option<FormatDescription>> {
        let mut desc = ffi::v4l2_fmtdesc::capture(index);
        match self.ioctl(ffi::VIDIOC_ENUM_FMT, &mut desc) {
            Ok(()) => Ok(Some(FormatDescription {
                index: desc.index,
                fourcc: FourCC::from(desc.pixelformat),
                description: c_string(&desc.description),
                compressed: desc.flags & ffi::V4L2_FMT_FLAG_COMPRESSED != 0,
            })),
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn set_format(&mut self, format: &PixFormat) -> io::Result<PixFormat> {
        let mut fmt = ffi::v4l2_format::capture(ffi::v4l2_pix_format {
            width: format.width,
            height: format.height,
            pixelformat: format.fourcc.as_u32(),
            field: format.field,
            ..Default::default()
        });
        self.ioctl(ffi::VIDIOC_S_FMT, &mut fmt)?;
        // SAFETY: the driver fills the pix member for capture buffer types
        let pix = unsafe { fmt.fmt.pix };
        Ok(pix_format(&pix))
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut req = ffi::v4l2_requestbuffers {
            count,
            type_: ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE,
            memory: ffi::V4L2_MEMORY_MMAP,
            ..Default::default()
        };
        self.ioctl(ffi::VIDIOC_REQBUFS, &mut req)?;
        Ok(req.count)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo> {
        let mut buf = ffi::v4l2_buffer::capture(index);
        self.ioctl(ffi::VIDIOC_QUERYBUF, &mut buf)?;
        Ok(BufferInfo {
            index,
            length: buf.length,
            // SAFETY: offset is the active member for MMAP buffers
            offset: unsafe { buf.m.offset },
        })
    }

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<Mapping> {
        let offset = libc::off_t::try_from(info.offset)
            .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        let len = info.length as usize;

        // SAFETY: shared mapping of a driver-provided offset and length,
        // checked against MAP_FAILED below.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.file.as_raw_fd(),
                offset,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))?;

        // SAFETY: the mapping stays valid until unmap_buffer
        Ok(unsafe { Mapping::from_raw_parts(ptr, len) })
    }

    fn unmap_buffer(&mut self, mapping: Mapping) -> io::Result<()> {
        // SAFETY: the mapping was produced by map_buffer with this length and
        // is consumed here.
        let ret = unsafe { libc::munmap(mapping.as_ptr().cast(), mapping.len()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let mut buf = ffi::v4l2_buffer::capture(index);
        self.ioctl(ffi::VIDIOC_QBUF, &mut buf)
    }

    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer> {
        let mut buf = ffi::v4l2_buffer::capture(0);
        self.ioctl(ffi::VIDIOC_DQBUF, &mut buf)?;
        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            timestamp: Timestamp::new(
                buf.timestamp.tv_sec as i64,
                (buf.timestamp.tv_usec as u32).saturating_mul(1000),
            ),
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let mut kind = ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE as libc::c_int;
        self.ioctl(ffi::VIDIOC_STREAMON, &mut kind)
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let mut kind = ffi::V4L2_BUF_TYPE_VIDEO_CAPTURE as libc::c_int;
        self.ioctl(ffi::VIDIOC_STREAMOFF, &mut kind)
    }

    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: one valid pollfd
        let ret = unsafe { libc::poll(&mut fds, 1, poll_millis(timeout)) };
        match ret {
            -1 => Err(io::Error::last_os_error()),
            0 => Ok(false),
            _ if fds.revents & (libc::POLLERR | libc::POLLNVAL) != 0 => {
                Err(io::Error::from_raw_os_error(libc::EIO))
            }
            _ => Ok(true),
        }
    }
}

impl Drop for V4l2Device {
    fn drop(&mut self) {
        log::debug!("closing {}", self.path.display());
    }
}
