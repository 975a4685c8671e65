// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::fourcc::FourCC;
use std::{io, ptr::NonNull, time::Duration};
use unix_ts::Timestamp;

/// Pixel format description reported by `VIDIOC_ENUM_FMT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescription {
    pub index: u32,
    pub fourcc: FourCC,
    pub description: String,
    pub compressed: bool,
}

/// Single-planar pixel format as exchanged with `VIDIOC_S_FMT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    /// Raw `v4l2_field` value
    pub field: u32,
    pub bytes_per_line: u32,
    pub size_image: u32,
}

/// Location of a kernel buffer within the device's mmap space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub index: u32,
    pub length: u32,
    pub offset: u32,
}

/// Result of a successful `VIDIOC_DQBUF`.
#[derive(Debug, Clone, Copy)]
pub struct DequeuedBuffer {
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
    pub timestamp: Timestamp,
}

/// A region of kernel buffer memory mapped into the process.
///
/// A mapping is created by [`Driver::map_buffer`] and must be handed back to
/// [`Driver::unmap_buffer`] exactly once.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
}

impl Mapping {
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes that stay readable until the mapping is
    /// passed to [`Driver::unmap_buffer`].
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize) -> Self {
        Mapping { ptr, len }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: guaranteed by the constructor contract
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

/// Kernel calls used by the capture path.
///
/// Each method corresponds to one system call on the open device. Errors are
/// returned as raw [`io::Error`]s and wrapped with context by the caller.
/// [`V4l2Device`](super::V4l2Device) is the implementation backed by a real
/// device node.
pub trait Driver {
    /// Describe the format at `index`, or `None` past the last format.
    fn enum_format(&mut self, index: u32) -> io::Result<Option<FormatDescription>>;

    /// Commit `format` and return the values the driver actually applied.
    fn set_format(&mut self, format: &PixFormat) -> io::Result<PixFormat>;

    /// Request `count` MMAP buffers, returning the number granted. A count
    /// of zero frees the allocation.
    fn request_buffers(&mut self, count: u32) -> io::Result<u32>;

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo>;

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<Mapping>;

    fn unmap_buffer(&mut self, mapping: Mapping) -> io::Result<()>;

    fn queue_buffer(&mut self, index: u32) -> io::Result<()>;

    /// Take a filled buffer from the outgoing queue. Fails with
    /// [`io::ErrorKind::WouldBlock`] when none is ready.
    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer>;

    fn stream_on(&mut self) -> io::Result<()>;

    fn stream_off(&mut self) -> io::Result<()>;

    /// Wait up to `timeout` for the device to become readable. Returns
    /// `false` on timeout. Interruption by a signal is reported as
    /// [`io::ErrorKind::Interrupted`].
    fn poll_readable(&mut self, timeout: Duration) -> io::Result<bool>;
}
