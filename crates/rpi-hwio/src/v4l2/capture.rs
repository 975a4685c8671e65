// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::{
    buffer::{BufferPool, BufferState},
    device::V4l2Device,
    driver::{DequeuedBuffer, Driver},
    format::{CaptureFormat, FormatNegotiator, FormatPolicy},
};
use crate::Error;
use std::{
    fmt, io,
    time::{Duration, Instant},
};
use unix_ts::Timestamp;

/// Time a snap waits for the device to produce a frame.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Streaming,
}

/// Image copied out of a kernel buffer.
///
/// Packed formats are stored with rows back to back and the driver's row
/// padding removed. Compressed and planar formats hold the bytes the driver
/// reported as used, unchanged.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    sequence: u32,
    timestamp: Timestamp,
}

impl Frame {
    fn new(format: &CaptureFormat) -> Self {
        Frame {
            data: vec![0; format.buffer_size()],
            width: format.width,
            height: format.height,
            bytes_per_pixel: format.bytes_per_pixel(),
            sequence: 0,
            timestamp: Timestamp::new(0, 0),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.bytes_per_pixel
    }

    /// Driver frame counter of the captured buffer.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Driver timestamp of the captured buffer.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} bpp:{} seq:{} {} bytes",
            self.width,
            self.height,
            self.bytes_per_pixel,
            self.sequence,
            self.data.len()
        )
    }
}

/// Copy `rows` rows of `row_bytes` bytes from `src`, laid out every `stride`
/// bytes, into the packed `dst`. Rows missing from a short `src` are left
/// untouched.
pub(crate) fn relocate(src: &[u8], stride: usize, row_bytes: usize, rows: usize, dst: &mut [u8]) {
    if row_bytes == 0 {
        return;
    }
    let stride = if stride == 0 { row_bytes } else { stride };
    let row_bytes = row_bytes.min(stride);

    if stride == row_bytes {
        let n = src.len().min(dst.len()).min(row_bytes * rows);
        dst[..n].copy_from_slice(&src[..n]);
        return;
    }

    for (row, out) in dst.chunks_mut(row_bytes).take(rows).enumerate() {
        let start = row * stride;
        let Some(line) = src.get(start..) else {
            break;
        };
        let n = line.len().min(out.len());
        out[..n].copy_from_slice(&line[..n]);
    }
}

/// Outcome of [`CaptureEngine::dequeue`].
#[derive(Debug)]
pub enum Dequeue<'a, D: Driver> {
    /// A filled buffer, returned to the driver when the guard is released
    Ready(FilledBuffer<'a, D>),
    /// No buffer was ready; nothing needs to be re-queued
    Empty,
}

/// A dequeued buffer whose bytes are readable until it is re-queued.
///
/// Call [`requeue`](Self::requeue) to hand the buffer back to the driver and
/// observe failures. Dropping the guard re-queues on a best effort basis.
#[derive(Debug)]
pub struct FilledBuffer<'a, D: Driver> {
    driver: &'a mut D,
    pool: &'a mut BufferPool,
    buffer: DequeuedBuffer,
    done: bool,
}

impl<D: Driver> FilledBuffer<'_, D> {
    pub fn index(&self) -> u32 {
        self.buffer.index
    }

    /// Bytes of image data the driver wrote.
    pub fn bytes_used(&self) -> u32 {
        self.buffer.bytes_used
    }

    pub fn sequence(&self) -> u32 {
        self.buffer.sequence
    }

    pub fn timestamp(&self) -> Timestamp {
        self.buffer.timestamp
    }

    /// The whole mapped buffer in the driver's layout.
    pub fn data(&self) -> &[u8] {
        self.pool.data(self.buffer.index).unwrap_or(&[])
    }

    /// Return the buffer to the driver's incoming queue.
    pub fn requeue(mut self) -> Result<(), Error> {
        self.queue()
    }

    fn queue(&mut self) -> Result<(), Error> {
        self.done = true;
        let index = self.buffer.index;
        self.driver
            .queue_buffer(index)
            .map_err(|source| Error::Queue { index, source })?;
        self.pool.set_state(index, BufferState::Queued);
        Ok(())
    }
}

impl<D: Driver> Drop for FilledBuffer<'_, D> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(err) = self.queue() {
                log::warn!("{}", err);
            }
        }
    }
}

/// Streaming capture over a negotiated format and a mapped buffer pool.
///
/// The engine owns the device and follows the kernel protocol order: buffers
/// are queued before the stream starts, only dequeued while streaming, and
/// released only once the stream is stopped. Dropping the engine stops the
/// stream and releases the buffers.
///
/// # Example
///
/// ```no_run
/// use rpi_hwio::v4l2::{CaptureEngine, FormatNegotiator, FormatPolicy};
///
/// let mut negotiator = FormatNegotiator::open("/dev/video0")?;
/// let format = negotiator.negotiate(640, 480, FormatPolicy::default())?;
/// let mut engine = CaptureEngine::new(negotiator, format, 4)?;
/// let frame = engine.snap()?;
/// println!("{}", frame);
/// # Ok::<(), rpi_hwio::Error>(())
/// ```
#[derive(Debug)]
pub struct CaptureEngine<D: Driver = V4l2Device> {
    negotiator: FormatNegotiator<D>,
    format: CaptureFormat,
    pool: BufferPool,
    buffer_count: u32,
    state: StreamState,
    poll_timeout: Duration,
    frame: Frame,
}

impl<D: Driver> CaptureEngine<D> {
    /// Allocate `buffer_count` buffers for `format`, which must be the format
    /// most recently committed through `negotiator`.
    pub fn new(
        mut negotiator: FormatNegotiator<D>,
        format: CaptureFormat,
        buffer_count: u32,
    ) -> Result<Self, Error> {
        let pool = BufferPool::allocate(negotiator.driver_mut(), buffer_count)?;
        Ok(CaptureEngine {
            negotiator,
            frame: Frame::new(&format),
            format,
            pool,
            buffer_count,
            state: StreamState::Stopped,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        })
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn format(&self) -> &CaptureFormat {
        &self.format
    }

    pub fn negotiator(&self) -> &FormatNegotiator<D> {
        &self.negotiator
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }

    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    /// Most recent frame produced by [`snap`](Self::snap).
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Replace the format and buffer pool while stopped.
    ///
    /// The current buffers are released before the new format is committed.
    /// If negotiation or allocation fails the engine is left without buffers
    /// and [`start`](Self::start) fails until a later renegotiation succeeds.
    pub fn renegotiate(
        &mut self,
        width: u32,
        height: u32,
        policy: FormatPolicy,
    ) -> Result<CaptureFormat, Error> {
        self.stop()?;
        self.pool.release(self.negotiator.driver_mut());

        let format = self.negotiator.negotiate(width, height, policy)?;
        self.pool = BufferPool::allocate(self.negotiator.driver_mut(), self.buffer_count)?;
        self.frame = Frame::new(&format);
        self.format = format;
        Ok(format)
    }

    /// Queue every buffer and turn the stream on. Does nothing when already
    /// streaming.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.state == StreamState::Streaming {
            return Ok(());
        }
        if self.pool.is_empty() {
            return Err(Error::NotInitialized);
        }

        let driver = self.negotiator.driver_mut();
        for index in 0..self.pool.len() as u32 {
            if let Err(err) = driver.queue_buffer(index) {
                if index > 0 {
                    // Queued buffers are only returned by stream-off.
                    if let Err(err) = driver.stream_off() {
                        log::warn!("stream off after failed start: {}", err);
                    }
                }
                self.pool.reset_states();
                return Err(Error::StreamStart(err));
            }
            self.pool.set_state(index, BufferState::Queued);
        }

        if let Err(err) = driver.stream_on() {
            if let Err(err) = driver.stream_off() {
                log::warn!("stream off after failed start: {}", err);
            }
            self.pool.reset_states();
            return Err(Error::StreamStart(err));
        }

        self.state = StreamState::Streaming;
        log::debug!("streaming {} with {} buffers", self.format, self.pool.len());
        Ok(())
    }

    /// Wait up to `timeout` for a filled buffer.
    ///
    /// Signals interrupting the wait are retried with the remaining time.
    pub fn poll_ready(&mut self, timeout: Duration) -> Result<(), Error> {
        if self.state != StreamState::Streaming {
            return Err(Error::NotStreaming);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.negotiator.driver_mut().poll_readable(remaining) {
                Ok(true) => return Ok(()),
                Ok(false) => return Err(Error::PollTimeout(timeout)),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    log::trace!("poll interrupted, {:?} remaining", remaining);
                }
                Err(err) => return Err(Error::Poll(err)),
            }
        }
    }

    /// Take the next filled buffer, if any.
    pub fn dequeue(&mut self) -> Result<Dequeue<'_, D>, Error> {
        if self.state != StreamState::Streaming {
            return Err(Error::NotStreaming);
        }
        dequeue(self.negotiator.driver_mut(), &mut self.pool)
    }

    /// Capture a single frame.
    ///
    /// Starts the stream, waits for the first filled buffer, copies it into
    /// the frame store with row padding removed, and stops the stream again.
    /// The whole attempt is bounded by the poll timeout; the stream is stopped
    /// whether or not a frame arrived.
    pub fn snap(&mut self) -> Result<&Frame, Error> {
        self.start()?;
        let captured = self.capture();
        let stopped = self.stop();

        match (captured, stopped) {
            (Err(err), Err(stop)) => {
                log::warn!("{}", stop);
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(&self.frame),
        }
    }

    fn capture(&mut self) -> Result<(), Error> {
        let timeout = self.poll_timeout;
        let deadline = Instant::now() + timeout;
        let stride = self.format.bytes_per_line as usize;
        let row_bytes = self.format.row_bytes();
        let rows = self.format.height as usize;
        let packed = self.format.is_packed();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::PollTimeout(timeout));
            }
            self.poll_ready(remaining).map_err(|err| match err {
                Error::PollTimeout(_) => Error::PollTimeout(timeout),
                err => err,
            })?;

            match dequeue(self.negotiator.driver_mut(), &mut self.pool)? {
                Dequeue::Empty => log::trace!("readable but no buffer, retrying"),
                Dequeue::Ready(buffer) => {
                    if packed {
                        relocate(buffer.data(), stride, row_bytes, rows, &mut self.frame.data);
                    } else {
                        let data = buffer.data();
                        let n = (buffer.bytes_used() as usize).min(data.len());
                        self.frame.data.clear();
                        self.frame.data.extend_from_slice(&data[..n]);
                    }
                    self.frame.sequence = buffer.sequence();
                    self.frame.timestamp = buffer.timestamp();
                    return buffer.requeue();
                }
            }
        }
    }

    /// Turn the stream off.
    ///
    /// The engine is stopped afterwards even when the driver reports an
    /// error, and every buffer is back in user space.
    pub fn stop(&mut self) -> Result<(), Error> {
        if self.state == StreamState::Stopped {
            return Ok(());
        }

        let result = self.negotiator.driver_mut().stream_off();
        self.state = StreamState::Stopped;
        self.pool.reset_states();
        log::debug!("stream stopped");
        result.map_err(Error::StreamStop)
    }

    /// Stop streaming and release the buffer pool. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        let stopped = self.stop();
        self.pool.release(self.negotiator.driver_mut());
        stopped
    }
}

impl<D: Driver> Drop for CaptureEngine<D> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("{}", err);
        }
    }
}

fn dequeue<'a, D: Driver>(
    driver: &'a mut D,
    pool: &'a mut BufferPool,
) -> Result<Dequeue<'a, D>, Error> {
    let buffer = match driver.dequeue_buffer() {
        Ok(buffer) => buffer,
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Dequeue::Empty),
        Err(err) => return Err(Error::Dequeue(err)),
    };

    if pool.state(buffer.index).is_none() {
        return Err(Error::InvalidBufferIndex(buffer.index));
    }
    pool.set_state(buffer.index, BufferState::Dequeued);

    Ok(Dequeue::Ready(FilledBuffer {
        driver,
        pool,
        buffer,
        done: false,
    }))
}
