// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Kernel ABI used by `rpi-hwio`.
//!
//! Structures mirror `linux/videodev2.h` field for field so they can be passed
//! straight to `ioctl(2)`. Request codes are derived from the structure sizes
//! with the generic `_IOC` encoding used by arm, arm64 and x86.
//!
//! The [`bcm`] module carries the BCM283x GPIO register layout.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

pub use libc;

pub mod bcm;
pub mod v4l2;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Encode an ioctl request number (`_IOC` in `asm-generic/ioctl.h`).
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    ((dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

/// `_IOR(ty, nr, T)`
pub const fn ior<T>(ty: u8, nr: u8) -> libc::c_ulong {
    ioc(IOC_READ, ty, nr, std::mem::size_of::<T>())
}

/// `_IOW(ty, nr, T)`
pub const fn iow<T>(ty: u8, nr: u8) -> libc::c_ulong {
    ioc(IOC_WRITE, ty, nr, std::mem::size_of::<T>())
}

/// `_IOWR(ty, nr, T)`
pub const fn iowr<T>(ty: u8, nr: u8) -> libc::c_ulong {
    ioc(IOC_READ | IOC_WRITE, ty, nr, std::mem::size_of::<T>())
}
