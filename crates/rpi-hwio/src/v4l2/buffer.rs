// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::driver::{BufferInfo, Driver, Mapping};
use crate::Error;

/// Buffer count requested when none is configured.
pub const DEFAULT_BUFFER_COUNT: u32 = 4;

/// Fewest buffers a stream can run with.
pub const MIN_BUFFER_COUNT: u32 = 2;

/// Ownership of a kernel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Mapped, not in any driver queue
    Idle,
    /// Owned by the driver, waiting to be filled
    Queued,
    /// Filled and handed to user space
    Dequeued,
}

/// A mapped kernel buffer.
#[derive(Debug)]
pub struct Buffer {
    info: BufferInfo,
    mapping: Mapping,
    state: BufferState,
}

impl Buffer {
    pub fn index(&self) -> u32 {
        self.info.index
    }

    pub fn length(&self) -> u32 {
        self.info.length
    }

    pub fn state(&self) -> BufferState {
        self.state
    }
}

/// Set of kernel MMAP buffers mapped into the process.
///
/// The pool is built by [`allocate`](Self::allocate) and torn down by
/// [`release`](Self::release); both need the driver that owns the buffers, so
/// the pool itself cannot unmap on drop.
#[derive(Debug, Default)]
pub struct BufferPool {
    buffers: Vec<Buffer>,
    allocated: bool,
}

impl BufferPool {
    /// Request `count` buffers from the driver and map each of them.
    ///
    /// The driver may grant a different count; the pool holds as many buffers
    /// as were granted.
    ///
    /// # Errors
    ///
    /// - [`Error::BufferRequest`] if the request is rejected
    /// - [`Error::InsufficientBuffers`] if fewer than [`MIN_BUFFER_COUNT`]
    ///   were granted
    /// - [`Error::BufferQuery`] or [`Error::BufferMap`] if a buffer cannot be
    ///   located or mapped
    ///
    /// On error nothing remains mapped and the kernel allocation is freed.
    pub fn allocate<D: Driver>(driver: &mut D, count: u32) -> Result<Self, Error> {
        let granted = driver.request_buffers(count).map_err(Error::BufferRequest)?;

        let mut pool = BufferPool {
            buffers: Vec::with_capacity(granted as usize),
            allocated: true,
        };

        if granted < MIN_BUFFER_COUNT {
            pool.release(driver);
            return Err(Error::InsufficientBuffers {
                requested: count,
                granted,
            });
        }

        for index in 0..granted {
            match map_buffer(driver, index) {
                Ok(buffer) => pool.buffers.push(buffer),
                Err(err) => {
                    pool.release(driver);
                    return Err(err);
                }
            }
        }

        log::debug!("mapped {} of {} requested buffers", granted, count);
        Ok(pool)
    }

    /// Unmap every buffer and free the kernel allocation.
    ///
    /// Failures are logged and otherwise ignored. Calling it again does
    /// nothing.
    pub fn release<D: Driver>(&mut self, driver: &mut D) {
        for buffer in self.buffers.drain(..) {
            if let Err(err) = driver.unmap_buffer(buffer.mapping) {
                log::warn!("unmap of buffer {} failed: {}", buffer.info.index, err);
            }
        }

        if std::mem::take(&mut self.allocated) {
            match driver.request_buffers(0) {
                Ok(_) => log::debug!("released kernel buffers"),
                Err(err) => log::warn!("freeing kernel buffers failed: {}", err),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn state(&self, index: u32) -> Option<BufferState> {
        self.buffers.get(index as usize).map(|b| b.state)
    }

    /// Contents of buffer `index`, available only while it is dequeued.
    pub fn data(&self, index: u32) -> Option<&[u8]> {
        self.buffers
            .get(index as usize)
            .filter(|b| b.state == BufferState::Dequeued)
            .map(|b| b.mapping.as_slice())
    }

    pub(crate) fn set_state(&mut self, index: u32, state: BufferState) {
        if let Some(buffer) = self.buffers.get_mut(index as usize) {
            buffer.state = state;
        }
    }

    pub(crate) fn reset_states(&mut self) {
        for buffer in &mut self.buffers {
            buffer.state = BufferState::Idle;
        }
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            log::warn!("{} buffers dropped while still mapped", self.buffers.len());
        }
    }
}

fn map_buffer<D: Driver>(driver: &mut D, index: u32) -> Result<Buffer, Error> {
    let info = driver
        .query_buffer(index)
        .map_err(|source| Error::BufferQuery { index, source })?;
    let mapping = driver
        .map_buffer(&info)
        .map_err(|source| Error::BufferMap { index, source })?;

    log::trace!(
        "buffer {}: {} bytes at offset {:#x}",
        index,
        info.length,
        info.offset
    );
    Ok(Buffer {
        info,
        mapping,
        state: BufferState::Idle,
    })
}
