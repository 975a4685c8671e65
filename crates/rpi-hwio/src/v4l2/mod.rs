// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 Streaming Capture
//!
//! This module implements single-planar video capture through kernel-owned
//! MMAP buffers: discovery of capture nodes, pixel format negotiation, buffer
//! pool management and the queue/poll/dequeue streaming protocol.
//!
//! # Quick Start
//!
//! ```no_run
//! use rpi_hwio::v4l2::{CaptureEngine, DeviceEnumerator, FormatNegotiator, FormatPolicy};
//!
//! let path = DeviceEnumerator::first()?;
//! let mut negotiator = FormatNegotiator::open(&path)?;
//! for desc in negotiator.enumerate_formats()? {
//!     println!("{}: {}", desc.fourcc, desc.description);
//! }
//!
//! let format = negotiator.negotiate(1280, 720, FormatPolicy::default())?;
//! let mut engine = CaptureEngine::new(negotiator, format, 4)?;
//! let frame = engine.snap()?;
//! println!("{} bytes", frame.data().len());
//! # Ok::<(), rpi_hwio::Error>(())
//! ```
//!
//! # Components
//!
//! | Type | Responsibility |
//! |------|----------------|
//! | [`DeviceEnumerator`] | Finds `video<N>` nodes |
//! | [`FormatNegotiator`] | `VIDIOC_ENUM_FMT`, `VIDIOC_S_FMT` |
//! | [`BufferPool`] | `VIDIOC_REQBUFS`, `VIDIOC_QUERYBUF`, `mmap` |
//! | [`CaptureEngine`] | `VIDIOC_QBUF`, `VIDIOC_STREAMON`, `poll`, `VIDIOC_DQBUF`, `VIDIOC_STREAMOFF` |
//!
//! Each component must succeed before the next is built: a buffer pool is
//! sized from a committed format and a stream runs over an allocated pool.
//!
//! # Format Selection
//!
//! Drivers list their formats in an order of their choosing. The format
//! committed during negotiation is picked from that list by a
//! [`FormatPolicy`]; the default takes the last entry. The driver may adjust
//! the requested resolution and the values it reports back are used for all
//! buffer sizing.
//!
//! # Streaming Without Busy Waiting
//!
//! Devices are opened non-blocking. A dequeue with nothing ready yields
//! [`Dequeue::Empty`] rather than an error, and waiting is done in
//! [`CaptureEngine::poll_ready`]. [`CaptureEngine::snap`] combines the two
//! under a single overall deadline.
//!
//! # Kernel Access
//!
//! All system calls go through the [`Driver`] trait. [`V4l2Device`] is the
//! implementation for a real device node; other implementations can stand in
//! for hardware.

mod buffer;
mod capture;
mod device;
mod driver;
mod enumerator;
mod format;

pub use buffer::{Buffer, BufferPool, BufferState, DEFAULT_BUFFER_COUNT, MIN_BUFFER_COUNT};
pub use capture::{CaptureEngine, Dequeue, FilledBuffer, Frame, StreamState, DEFAULT_POLL_TIMEOUT};
pub use device::V4l2Device;
pub use driver::{BufferInfo, DequeuedBuffer, Driver, FormatDescription, Mapping, PixFormat};
pub use enumerator::{DeviceEnumerator, DEVICE_ROOT};
pub use format::{CaptureFormat, Field, FormatNegotiator, FormatPolicy, MAX_DIMENSION};
