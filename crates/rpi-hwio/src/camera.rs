// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    v4l2::{
        CaptureEngine, CaptureFormat, DeviceEnumerator, Driver, FormatDescription,
        FormatNegotiator, FormatPolicy, Frame, V4l2Device, DEFAULT_BUFFER_COUNT,
        DEFAULT_POLL_TIMEOUT,
    },
    Error,
};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Capture device handle with an initialize/shutdown lifecycle.
///
/// Configuration is set through the `with_*` builder methods before
/// [`initialize`](Camera::initialize); the device path is fixed from then on.
/// The requested resolution is a hint, the driver decides the actual frame
/// size which is reported by [`frame_width`](Camera::frame_width) and
/// [`frame_height`](Camera::frame_height).
#[derive(Debug)]
pub struct Camera<D: Driver = V4l2Device> {
    /// video device file for the camera, first enumerated device when unset
    device: Option<PathBuf>,

    /// request camera width, actual camera width may be different
    width: u32,

    /// request camera height, actual camera height may be different
    height: u32,

    /// number of camera buffers to request
    num_buffers: u32,

    /// pixel format selection among the formats the device lists
    policy: FormatPolicy,

    /// time allowed for a single snap
    poll_timeout: Duration,

    engine: Option<CaptureEngine<D>>,
}

impl<D: Driver> Camera<D> {
    pub fn with_device<P: AsRef<Path>>(mut self, device: P) -> Self {
        self.device = Some(device.as_ref().to_owned());
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_buffers(mut self, num_buffers: u32) -> Self {
        self.num_buffers = num_buffers;
        self
    }

    pub fn with_policy(mut self, policy: FormatPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }

    /// Change the device path. Only allowed before initialization.
    pub fn set_device<P: AsRef<Path>>(&mut self, device: P) -> Result<(), Error> {
        if self.is_initialized() {
            return Err(Error::DeviceChangeForbidden);
        }
        self.device = Some(device.as_ref().to_owned());
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Initialize over an already open driver.
    ///
    /// Enumerates the formats, negotiates the configured resolution and
    /// allocates the buffer pool. Does nothing when already initialized.
    pub fn initialize_with(&mut self, driver: D) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }

        let mut negotiator = FormatNegotiator::new(driver);
        negotiator.enumerate_formats()?;
        let format = negotiator.negotiate(self.width, self.height, self.policy)?;
        let engine = CaptureEngine::new(negotiator, format, self.num_buffers)?
            .with_poll_timeout(self.poll_timeout);

        log::debug!(
            "camera ready: {} with {} buffers",
            engine.format(),
            engine.pool().len()
        );
        self.engine = Some(engine);
        Ok(())
    }

    /// Stop streaming, unmap the buffers and close the device. Safe to call
    /// repeatedly.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        match self.engine.take() {
            Some(mut engine) => engine.shutdown(),
            None => Ok(()),
        }
    }

    pub fn engine(&self) -> Option<&CaptureEngine<D>> {
        self.engine.as_ref()
    }

    fn engine_ref(&self) -> Result<&CaptureEngine<D>, Error> {
        self.engine.as_ref().ok_or(Error::NotInitialized)
    }

    fn engine_mut(&mut self) -> Result<&mut CaptureEngine<D>, Error> {
        self.engine.as_mut().ok_or(Error::NotInitialized)
    }

    /// Renegotiate the format at `width` x `height` and rebuild the buffer
    /// pool. Returns the format the driver committed.
    pub fn negotiate_format(&mut self, width: u32, height: u32) -> Result<CaptureFormat, Error> {
        let policy = self.policy;
        let format = self.engine_mut()?.renegotiate(width, height, policy)?;
        self.width = width;
        self.height = height;
        Ok(format)
    }

    /// Capture one frame. The frame stays valid until the next snap.
    pub fn snap_frame(&mut self) -> Result<&Frame, Error> {
        self.engine_mut()?.snap()
    }

    pub fn format(&self) -> Result<&CaptureFormat, Error> {
        Ok(self.engine_ref()?.format())
    }

    /// Formats reported by the device during initialization.
    pub fn formats(&self) -> Result<&[FormatDescription], Error> {
        Ok(self.engine_ref()?.negotiator().formats())
    }

    pub fn frame_width(&self) -> Result<u32, Error> {
        Ok(self.format()?.width)
    }

    pub fn frame_height(&self) -> Result<u32, Error> {
        Ok(self.format()?.height)
    }

    pub fn frame_bytes_per_pixel(&self) -> Result<u32, Error> {
        Ok(self.format()?.bytes_per_pixel())
    }

    /// Size in bytes of a packed frame.
    pub fn frame_buffer_size(&self) -> Result<usize, Error> {
        Ok(self.format()?.buffer_size())
    }
}

impl Camera<V4l2Device> {
    /// Open the configured device, or the first enumerated one, and
    /// initialize it.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.is_initialized() {
            return Ok(());
        }

        let path = match &self.device {
            Some(path) => path.clone(),
            None => DeviceEnumerator::first()?,
        };
        let device = V4l2Device::open(&path)?;
        self.device = Some(path);
        self.initialize_with(device)
    }
}

impl<D: Driver> Default for Camera<D> {
    fn default() -> Self {
        Camera {
            device: None,
            width: 640,
            height: 480,
            num_buffers: DEFAULT_BUFFER_COUNT,
            policy: FormatPolicy::Last,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            engine: None,
        }
    }
}

impl<D: Driver> Drop for Camera<D> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("camera shutdown: {}", err);
        }
    }
}

pub fn create_camera() -> Camera {
    Camera::default()
}
