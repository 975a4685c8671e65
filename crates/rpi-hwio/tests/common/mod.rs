// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Simulated V4L2 driver shared by the integration tests.
//
// The driver keeps its state behind Rc<RefCell<..>> so a test can configure
// failures and inspect the calls made after the driver has been moved into a
// negotiator, engine or camera.

#![allow(dead_code)]

use rand::Rng;
use rpi_hwio::{
    fourcc::FourCC,
    v4l2::{BufferInfo, DequeuedBuffer, Driver, FormatDescription, Mapping, PixFormat},
};
use std::{cell::RefCell, collections::VecDeque, io, ptr::NonNull, rc::Rc, time::Duration};
use unix_ts::Timestamp;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

pub fn describe(code: &[u8; 4]) -> FormatDescription {
    FormatDescription {
        index: 0,
        fourcc: FourCC::from(code),
        description: String::from_utf8_lossy(code).into_owned(),
        compressed: code == b"MJPG",
    }
}

#[derive(Debug)]
pub struct State {
    // Device behaviour
    pub formats: Vec<FormatDescription>,
    pub enum_error: Option<i32>,
    pub max_width: u32,
    pub max_height: u32,
    pub row_padding: u32,
    /// Stride reported for every format instead of the computed one
    pub bytes_per_line: Option<u32>,
    /// Dimensions committed regardless of the request
    pub commit_size: Option<(u32, u32)>,
    /// Bytes the driver reports as used, for variable size payloads
    pub payload_len: Option<usize>,
    pub committed_field: u32,
    pub reject_format: bool,
    pub fail_request: bool,
    pub grant_limit: Option<u32>,
    pub fail_query_at: Option<u32>,
    pub fail_map_at: Option<u32>,
    pub fail_queue_at: Option<u32>,
    pub fail_stream_on: bool,
    pub fail_stream_off: bool,
    pub empty_dequeues: u32,
    pub interrupts: u32,
    pub silent: bool,
    pub bogus_index: Option<u32>,

    // Observations
    pub format: Option<PixFormat>,
    pub requests: Vec<u32>,
    pub memory: Vec<Box<[u8]>>,
    pub maps: u32,
    pub unmaps: u32,
    pub queued: VecDeque<u32>,
    pub queue_calls: u32,
    pub streaming: bool,
    pub stream_ons: u32,
    pub stream_offs: u32,
    pub polls: u32,
    pub dequeues: u32,
    pub sequence: u32,
    pub last_payload: Vec<u8>,
}

impl Default for State {
    fn default() -> Self {
        State {
            formats: vec![describe(b"MJPG"), describe(b"YUYV")],
            enum_error: None,
            max_width: 1920,
            max_height: 1080,
            row_padding: 0,
            bytes_per_line: None,
            commit_size: None,
            payload_len: None,
            committed_field: 1,
            reject_format: false,
            fail_request: false,
            grant_limit: None,
            fail_query_at: None,
            fail_map_at: None,
            fail_queue_at: None,
            fail_stream_on: false,
            fail_stream_off: false,
            empty_dequeues: 0,
            interrupts: 0,
            silent: false,
            bogus_index: None,
            format: None,
            requests: Vec::new(),
            memory: Vec::new(),
            maps: 0,
            unmaps: 0,
            queued: VecDeque::new(),
            queue_calls: 0,
            streaming: false,
            stream_ons: 0,
            stream_offs: 0,
            polls: 0,
            dequeues: 0,
            sequence: 0,
            last_payload: Vec::new(),
        }
    }
}

impl State {
    pub fn live_mappings(&self) -> u32 {
        self.maps - self.unmaps
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    state: Rc<RefCell<State>>,
}

impl SimulatedDriver {
    pub fn new() -> (Self, Rc<RefCell<State>>) {
        Self::with_state(State::default())
    }

    pub fn with_state(state: State) -> (Self, Rc<RefCell<State>>) {
        let state = Rc::new(RefCell::new(state));
        (
            SimulatedDriver {
                state: state.clone(),
            },
            state,
        )
    }
}

/// Stride and image size the way V4L2 drivers report them: padded rows for
/// packed codes, a luma stride and 4:2:0 size for planar YUV, and no stride
/// with a worst case size for compressed codes.
fn layout(state: &State, fourcc: FourCC, width: u32, height: u32) -> (u32, u32) {
    let (stride, size) = match fourcc.components() {
        Some(n) => {
            let stride = width.saturating_mul(n).saturating_add(state.row_padding);
            (stride, stride.saturating_mul(height))
        }
        None if matches!(&fourcc.0, b"YU12" | b"YV12" | b"NV12" | b"NV21") => {
            (width, width.saturating_mul(height).saturating_mul(3) / 2)
        }
        None => (0, width.saturating_mul(height).saturating_mul(2)),
    };
    match state.bytes_per_line {
        Some(stride) if stride > 0 => (stride, stride.saturating_mul(height)),
        Some(stride) => (stride, size),
        None => (stride, size),
    }
}

impl Driver for SimulatedDriver {
    fn enum_format(&mut self, index: u32) -> io::Result<Option<FormatDescription>> {
        let state = self.state.borrow();
        if let Some(code) = state.enum_error {
            return Err(errno(code));
        }
        Ok(state.formats.get(index as usize).cloned().map(|mut desc| {
            desc.index = index;
            desc
        }))
    }

    fn set_format(&mut self, format: &PixFormat) -> io::Result<PixFormat> {
        let mut state = self.state.borrow_mut();
        if state.reject_format {
            return Err(errno(libc::EINVAL));
        }
        let (width, height) = state.commit_size.unwrap_or((
            format.width.min(state.max_width),
            format.height.min(state.max_height),
        ));
        let (bytes_per_line, size_image) = layout(&state, format.fourcc, width, height);
        let committed = PixFormat {
            width,
            height,
            fourcc: format.fourcc,
            field: state.committed_field,
            bytes_per_line,
            size_image,
        };
        state.format = Some(committed);
        Ok(committed)
    }

    fn request_buffers(&mut self, count: u32) -> io::Result<u32> {
        let mut state = self.state.borrow_mut();
        state.requests.push(count);
        if count == 0 {
            state.memory.clear();
            return Ok(0);
        }
        if state.fail_request {
            return Err(errno(libc::ENOMEM));
        }
        let granted = state.grant_limit.map_or(count, |limit| count.min(limit));
        let size = state.format.map_or(4096, |f| f.size_image as usize);
        state.memory = (0..granted)
            .map(|_| vec![0u8; size].into_boxed_slice())
            .collect();
        Ok(granted)
    }

    fn query_buffer(&mut self, index: u32) -> io::Result<BufferInfo> {
        let state = self.state.borrow();
        if state.fail_query_at == Some(index) {
            return Err(errno(libc::EINVAL));
        }
        let memory = state
            .memory
            .get(index as usize)
            .ok_or_else(|| errno(libc::EINVAL))?;
        Ok(BufferInfo {
            index,
            length: memory.len() as u32,
            offset: index * 0x10_0000,
        })
    }

    fn map_buffer(&mut self, info: &BufferInfo) -> io::Result<Mapping> {
        let mut state = self.state.borrow_mut();
        if state.fail_map_at == Some(info.index) {
            return Err(errno(libc::ENOMEM));
        }
        let memory = state
            .memory
            .get_mut(info.index as usize)
            .ok_or_else(|| errno(libc::EINVAL))?;
        let ptr = NonNull::new(memory.as_mut_ptr()).ok_or_else(|| errno(libc::EFAULT))?;
        let len = memory.len();
        state.maps += 1;
        // SAFETY: the boxed slice stays allocated until REQBUFS(0), which the
        // pool issues only after unmapping.
        Ok(unsafe { Mapping::from_raw_parts(ptr, len) })
    }

    fn unmap_buffer(&mut self, _mapping: Mapping) -> io::Result<()> {
        self.state.borrow_mut().unmaps += 1;
        Ok(())
    }

    fn queue_buffer(&mut self, index: u32) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.queue_calls += 1;
        if state.fail_queue_at == Some(index) {
            return Err(errno(libc::EINVAL));
        }
        state.queued.push_back(index);
        Ok(())
    }

    fn dequeue_buffer(&mut self) -> io::Result<DequeuedBuffer> {
        let mut state = self.state.borrow_mut();
        state.dequeues += 1;
        if !state.streaming {
            return Err(errno(libc::EINVAL));
        }
        if state.silent {
            return Err(errno(libc::EAGAIN));
        }
        if state.empty_dequeues > 0 {
            state.empty_dequeues -= 1;
            return Err(errno(libc::EAGAIN));
        }
        let timestamp = Timestamp::new(1_700_000_000, 500_000_000);
        if let Some(index) = state.bogus_index.take() {
            return Ok(DequeuedBuffer {
                index,
                bytes_used: 0,
                sequence: 0,
                timestamp,
            });
        }
        let Some(index) = state.queued.pop_front() else {
            return Err(errno(libc::EAGAIN));
        };

        let capacity = state.memory[index as usize].len();
        let len = state.payload_len.map_or(capacity, |n| n.min(capacity));
        let mut payload = vec![0u8; len];
        rand::rng().fill(&mut payload[..]);
        state.memory[index as usize][..len].copy_from_slice(&payload);
        state.last_payload = payload;
        state.sequence += 1;

        Ok(DequeuedBuffer {
            index,
            bytes_used: state.last_payload.len() as u32,
            sequence: state.sequence,
            timestamp,
        })
    }

    fn stream_on(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.stream_ons += 1;
        if state.fail_stream_on {
            return Err(errno(libc::EIO));
        }
        state.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.stream_offs += 1;
        state.streaming = false;
        state.queued.clear();
        if state.fail_stream_off {
            return Err(errno(libc::EIO));
        }
        Ok(())
    }

    fn poll_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        if state.interrupts > 0 {
            state.interrupts -= 1;
            return Err(errno(libc::EINTR));
        }
        Ok(!state.silent)
    }
}
