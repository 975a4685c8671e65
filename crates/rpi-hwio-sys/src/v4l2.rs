// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Video4Linux2 structures and request codes (`linux/videodev2.h`).
//!
//! Only the single-planar capture subset with MMAP buffers is declared.

use crate::{iow, iowr};
use libc::{c_ulong, c_void, timeval};

pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;

pub const V4L2_MEMORY_MMAP: u32 = 1;

pub const V4L2_FIELD_ANY: u32 = 0;
pub const V4L2_FIELD_NONE: u32 = 1;
pub const V4L2_FIELD_TOP: u32 = 2;
pub const V4L2_FIELD_BOTTOM: u32 = 3;
pub const V4L2_FIELD_INTERLACED: u32 = 4;
pub const V4L2_FIELD_SEQ_TB: u32 = 5;
pub const V4L2_FIELD_SEQ_BT: u32 = 6;
pub const V4L2_FIELD_ALTERNATE: u32 = 7;
pub const V4L2_FIELD_INTERLACED_TB: u32 = 8;
pub const V4L2_FIELD_INTERLACED_BT: u32 = 9;

pub const V4L2_FMT_FLAG_COMPRESSED: u32 = 0x0001;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

/// The kernel union also holds `v4l2_window`, which contains pointers, so
/// the union is pointer aligned.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_format_fmt {
    pub pix: v4l2_pix_format,
    pub raw_data: [u8; 200],
    pub _align: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_fmt,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: c_ulong,
    pub planes: *mut c_void,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl v4l2_fmtdesc {
    /// Capture format descriptor query for `index`.
    pub fn capture(index: u32) -> Self {
        // SAFETY: plain-old-data, all-zero is a valid value
        let mut desc: Self = unsafe { std::mem::zeroed() };
        desc.index = index;
        desc.type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        desc
    }
}

impl v4l2_format {
    /// Capture format carrying `pix`.
    pub fn capture(pix: v4l2_pix_format) -> Self {
        // SAFETY: plain-old-data, all-zero is a valid value
        let mut format: Self = unsafe { std::mem::zeroed() };
        format.type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        format.fmt.pix = pix;
        format
    }
}

impl v4l2_buffer {
    /// MMAP capture buffer descriptor for `index`.
    pub fn capture(index: u32) -> Self {
        // SAFETY: plain-old-data, all-zero is a valid value
        let mut buf: Self = unsafe { std::mem::zeroed() };
        buf.index = index;
        buf.type_ = V4L2_BUF_TYPE_VIDEO_CAPTURE;
        buf.memory = V4L2_MEMORY_MMAP;
        buf
    }
}

pub const VIDIOC_ENUM_FMT: c_ulong = iowr::<v4l2_fmtdesc>(b'V', 2);
pub const VIDIOC_S_FMT: c_ulong = iowr::<v4l2_format>(b'V', 5);
pub const VIDIOC_REQBUFS: c_ulong = iowr::<v4l2_requestbuffers>(b'V', 8);
pub const VIDIOC_QUERYBUF: c_ulong = iowr::<v4l2_buffer>(b'V', 9);
pub const VIDIOC_QBUF: c_ulong = iowr::<v4l2_buffer>(b'V', 15);
pub const VIDIOC_DQBUF: c_ulong = iowr::<v4l2_buffer>(b'V', 17);
pub const VIDIOC_STREAMON: c_ulong = iow::<libc::c_int>(b'V', 18);
pub const VIDIOC_STREAMOFF: c_ulong = iow::<libc::c_int>(b'V', 19);
