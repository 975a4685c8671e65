// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Raspberry Pi Hardware I/O for Rust
//!
//! Low-level access to two classes of single-board-computer peripherals:
//! general-purpose I/O pins driven through memory-mapped BCM283x registers,
//! and Video4Linux2 capture devices streamed through kernel-owned MMAP
//! buffers.
//!
//! # Quick Start
//!
//! ## Driving a GPIO pin
//!
//! ```no_run
//! use rpi_hwio::gpio::{GpioDevice, Level, Pin};
//!
//! let mut led: GpioDevice = GpioDevice::new(Pin::new(17)?);
//! led.initialize()?;
//! led.set_state(Level::High)?;
//! led.shutdown()?;
//! # Ok::<(), rpi_hwio::Error>(())
//! ```
//!
//! ## Snapping a frame
//!
//! ```no_run
//! use rpi_hwio::camera::create_camera;
//!
//! let mut cam = create_camera()
//!     .with_device("/dev/video0")
//!     .with_resolution(1280, 720);
//! cam.initialize()?;
//! let frame = cam.snap_frame()?;
//! println!("{}x{} {} bytes", frame.width(), frame.height(), frame.data().len());
//! # Ok::<(), rpi_hwio::Error>(())
//! ```
//!
//! # Protocol Order
//!
//! Capture follows the kernel's fixed sequence: format negotiation, buffer
//! allocation, stream on, poll and dequeue, stream off, unmap. The
//! [`camera::Camera`] handle enforces this order; the lower level
//! [`v4l2`] types can be composed directly when finer control is needed.

use std::{error, fmt, io, path::PathBuf, time::Duration};

/// Error type for hardware I/O operations
#[derive(Debug)]
pub enum Error {
    /// The GPIO register block could not be opened or mapped
    Map(io::Error),

    /// Pin number outside the supported Broadcom range
    InvalidPin(u32),

    /// Function select value does not fit the 3-bit field
    InvalidFunction(u32),

    /// Register word outside the mapped block or its bank
    RegisterOutOfRange { offset: usize, words: usize },

    /// Register block accessed after it was closed
    RegisterUnavailable,

    /// Pin number cannot change once the device is initialized
    PinChangeForbidden,

    /// Capture device path cannot change once the device is initialized
    DeviceChangeForbidden,

    /// Operation requires an initialized device
    NotInitialized,

    /// No video capture device nodes were found
    NoCaptureDevices,

    /// The capture device node could not be opened
    DeviceOpen { path: PathBuf, source: io::Error },

    /// Querying the driver's format descriptions failed
    FormatEnumeration(io::Error),

    /// The driver reported no usable pixel formats
    NoFormats,

    /// The driver rejected the requested format
    FormatNegotiation(io::Error),

    /// The driver committed an interlaced field order
    UnsupportedField(u32),

    /// Requesting kernel buffers failed
    BufferRequest(io::Error),

    /// The kernel granted fewer buffers than streaming requires
    InsufficientBuffers { requested: u32, granted: u32 },

    /// Querying a kernel buffer failed
    BufferQuery { index: u32, source: io::Error },

    /// Mapping a kernel buffer failed
    BufferMap { index: u32, source: io::Error },

    /// Returning a buffer to the kernel failed
    Queue { index: u32, source: io::Error },

    /// Starting the stream failed
    StreamStart(io::Error),

    /// Stopping the stream failed; the stream is considered stopped anyway
    StreamStop(io::Error),

    /// The device produced no data within the timeout
    PollTimeout(Duration),

    /// Waiting for device readiness failed
    Poll(io::Error),

    /// Dequeuing a filled buffer failed
    Dequeue(io::Error),

    /// The kernel returned a buffer index outside the pool
    InvalidBufferIndex(u32),

    /// Operation requires a streaming device
    NotStreaming,

    /// I/O error from underlying system calls
    Io(io::Error),
}

impl Error {
    /// Whether the failure only affects the current capture attempt.
    ///
    /// Retryable errors leave the device usable for a subsequent snap.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PollTimeout(_) | Error::Poll(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Map(err) => write!(f, "GPIO register block could not be mapped: {}", err),
            Error::InvalidPin(pin) => write!(f, "invalid GPIO pin: {}", pin),
            Error::InvalidFunction(func) => write!(f, "invalid GPIO function: {}", func),
            Error::RegisterOutOfRange { offset, words } => write!(
                f,
                "register word {} outside of {} word block",
                offset, words
            ),
            Error::RegisterUnavailable => write!(f, "register block is not mapped"),
            Error::PinChangeForbidden => {
                write!(f, "cannot change pin number after initialization")
            }
            Error::DeviceChangeForbidden => {
                write!(f, "cannot change capture device after initialization")
            }
            Error::NotInitialized => write!(f, "device is not initialized"),
            Error::NoCaptureDevices => write!(f, "no video capture devices found"),
            Error::DeviceOpen { path, source } => {
                write!(f, "could not open {}: {}", path.display(), source)
            }
            Error::FormatEnumeration(err) => write!(f, "format enumeration failed: {}", err),
            Error::NoFormats => write!(f, "device reports no pixel formats"),
            Error::FormatNegotiation(err) => write!(f, "format negotiation failed: {}", err),
            Error::UnsupportedField(field) => {
                write!(f, "unsupported field order {} (only progressive)", field)
            }
            Error::BufferRequest(err) => write!(f, "buffer request failed: {}", err),
            Error::InsufficientBuffers { requested, granted } => write!(
                f,
                "kernel granted {} of {} buffers, at least 2 required",
                granted, requested
            ),
            Error::BufferQuery { index, source } => {
                write!(f, "could not query buffer {}: {}", index, source)
            }
            Error::BufferMap { index, source } => {
                write!(f, "could not map buffer {}: {}", index, source)
            }
            Error::Queue { index, source } => {
                write!(f, "could not enqueue buffer {}: {}", index, source)
            }
            Error::StreamStart(err) => write!(f, "could not start stream: {}", err),
            Error::StreamStop(err) => write!(f, "could not stop stream: {}", err),
            Error::PollTimeout(timeout) => {
                write!(f, "no frame within {:.1}s", timeout.as_secs_f32())
            }
            Error::Poll(err) => write!(f, "poll failed: {}", err),
            Error::Dequeue(err) => write!(f, "could not dequeue buffer: {}", err),
            Error::InvalidBufferIndex(index) => {
                write!(f, "kernel returned unknown buffer index {}", index)
            }
            Error::NotStreaming => write!(f, "device is not streaming"),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Map(err)
            | Error::FormatEnumeration(err)
            | Error::FormatNegotiation(err)
            | Error::BufferRequest(err)
            | Error::StreamStart(err)
            | Error::StreamStop(err)
            | Error::Poll(err)
            | Error::Dequeue(err)
            | Error::Io(err) => Some(err),
            Error::DeviceOpen { source, .. }
            | Error::BufferQuery { source, .. }
            | Error::BufferMap { source, .. }
            | Error::Queue { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// The gpio module provides the memory-mapped pin driver.
pub mod gpio;

/// The v4l2 module provides discovery, negotiation and streaming capture.
pub mod v4l2;

/// The camera module provides the capture device lifecycle.
pub mod camera;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;
