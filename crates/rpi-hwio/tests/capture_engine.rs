// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Streaming protocol tests against a simulated driver.
//
// Covers the start/poll/dequeue/stop state machine, the bounded retry loop
// of snap() and buffer ownership across the queue boundary.
//
// RUN:
//   cargo test --test capture_engine

mod common;

use common::{describe, SimulatedDriver, State};
use rpi_hwio::{
    v4l2::{
        BufferState, CaptureEngine, Dequeue, FormatNegotiator, FormatPolicy, StreamState,
    },
    Error,
};
use std::{cell::RefCell, rc::Rc, time::Duration};

const WIDTH: u32 = 48;
const HEIGHT: u32 = 16;

fn engine(configure: impl FnOnce(&mut State)) -> (CaptureEngine<SimulatedDriver>, Rc<RefCell<State>>) {
    common::init_logging();
    let mut state = State::default();
    configure(&mut state);
    let (driver, state) = SimulatedDriver::with_state(state);

    let mut negotiator = FormatNegotiator::new(driver);
    let format = negotiator
        .negotiate(WIDTH, HEIGHT, FormatPolicy::Last)
        .unwrap();
    let engine = CaptureEngine::new(negotiator, format, 4)
        .unwrap()
        .with_poll_timeout(Duration::from_millis(200));
    (engine, state)
}

/// Packed copy of the last payload the driver produced.
fn expected_frame(state: &State, stride: usize, row_bytes: usize) -> Vec<u8> {
    state
        .last_payload
        .chunks(stride)
        .take(HEIGHT as usize)
        .flat_map(|row| row[..row_bytes].to_vec())
        .collect()
}

#[test]
fn test_snap_after_empty_dequeues() {
    let (mut engine, state) = engine(|s| {
        s.empty_dequeues = 5;
        s.row_padding = 32;
    });
    let stride = engine.format().bytes_per_line as usize;
    let row_bytes = engine.format().row_bytes();
    assert_eq!(stride, row_bytes + 32);

    let frame = engine.snap().unwrap();
    assert_eq!(frame.width(), WIDTH);
    assert_eq!(frame.height(), HEIGHT);
    assert_eq!(frame.bytes_per_pixel(), 2);
    assert_eq!(frame.data().len(), (WIDTH * HEIGHT * 2) as usize);
    assert_eq!(frame.data(), &expected_frame(&state.borrow(), stride, row_bytes)[..]);

    assert_eq!(engine.state(), StreamState::Stopped);
    let state = state.borrow();
    assert_eq!(state.dequeues, 6);
    assert_eq!(state.stream_offs, 1);
    assert!(!state.streaming);
}

#[test]
fn test_frame_metadata() {
    let (mut engine, _state) = engine(|_| {});
    let first = engine.snap().unwrap().sequence();
    let frame = engine.snap().unwrap();
    assert_eq!(frame.sequence(), first + 1);
    assert_eq!(frame.timestamp().seconds(), 1_700_000_000);
}

#[test]
fn test_start_queues_every_buffer() {
    let (mut engine, state) = engine(|_| {});
    engine.start().unwrap();

    assert_eq!(engine.state(), StreamState::Streaming);
    {
        let state = state.borrow();
        assert_eq!(state.queued.len(), 4);
        assert_eq!(state.stream_ons, 1);
    }
    assert!(engine
        .pool()
        .buffers()
        .iter()
        .all(|b| b.state() == BufferState::Queued));

    // Starting twice is a no-op.
    engine.start().unwrap();
    assert_eq!(state.borrow().stream_ons, 1);

    engine.stop().unwrap();
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(engine
        .pool()
        .buffers()
        .iter()
        .all(|b| b.state() == BufferState::Idle));
}

#[test]
fn test_dequeue_requires_streaming() {
    let (mut engine, _state) = engine(|_| {});
    assert!(matches!(engine.dequeue(), Err(Error::NotStreaming)));
    assert!(matches!(
        engine.poll_ready(Duration::from_millis(1)),
        Err(Error::NotStreaming)
    ));
}

#[test]
fn test_empty_dequeue_requeues_nothing() {
    let (mut engine, state) = engine(|s| s.empty_dequeues = 1);
    engine.start().unwrap();
    let queued = state.borrow().queue_calls;

    assert!(matches!(engine.dequeue().unwrap(), Dequeue::Empty));
    assert_eq!(state.borrow().queue_calls, queued);
    engine.stop().unwrap();
}

#[test]
fn test_filled_buffer_guard() {
    let (mut engine, state) = engine(|_| {});
    engine.start().unwrap();
    let queued = state.borrow().queue_calls;

    match engine.dequeue().unwrap() {
        Dequeue::Ready(buffer) => {
            assert_eq!(buffer.index(), 0);
            assert_eq!(buffer.data(), &state.borrow().last_payload[..]);
            assert_eq!(buffer.bytes_used() as usize, buffer.data().len());
            buffer.requeue().unwrap();
        }
        Dequeue::Empty => panic!("expected a filled buffer"),
    }
    assert_eq!(state.borrow().queue_calls, queued + 1);
    assert_eq!(engine.pool().state(0), Some(BufferState::Queued));

    // Dropping the guard hands the buffer back as well.
    match engine.dequeue().unwrap() {
        Dequeue::Ready(buffer) => assert_eq!(buffer.index(), 1),
        Dequeue::Empty => panic!("expected a filled buffer"),
    }
    assert_eq!(state.borrow().queue_calls, queued + 2);
    assert_eq!(engine.pool().state(1), Some(BufferState::Queued));

    engine.stop().unwrap();
}

#[test]
fn test_silent_device_times_out() {
    let (mut engine, state) = engine(|s| s.silent = true);

    assert!(matches!(engine.snap(), Err(Error::PollTimeout(_))));
    assert_eq!(engine.state(), StreamState::Stopped);
    assert_eq!(state.borrow().stream_offs, 1);
}

#[test]
fn test_readable_without_data_times_out() {
    let (mut engine, state) = engine(|s| s.empty_dequeues = u32::MAX);
    engine.set_poll_timeout(Duration::from_millis(50));

    let err = engine.snap().unwrap_err();
    assert!(matches!(err, Error::PollTimeout(t) if t == Duration::from_millis(50)));
    assert!(err.is_retryable());
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(state.borrow().dequeues > 1);

    // The device stays usable for the next attempt.
    state.borrow_mut().empty_dequeues = 0;
    assert!(engine.snap().is_ok());
}

#[test]
fn test_interrupted_poll_is_retried() {
    let (mut engine, state) = engine(|s| s.interrupts = 3);

    engine.snap().unwrap();
    assert_eq!(state.borrow().polls, 4);
}

#[test]
fn test_stream_on_failure() {
    let (mut engine, state) = engine(|s| s.fail_stream_on = true);

    assert!(matches!(engine.start(), Err(Error::StreamStart(_))));
    assert_eq!(engine.state(), StreamState::Stopped);
    assert_eq!(state.borrow().stream_offs, 1);
    assert!(engine
        .pool()
        .buffers()
        .iter()
        .all(|b| b.state() == BufferState::Idle));
}

#[test]
fn test_queue_failure_on_start() {
    let (mut engine, state) = engine(|s| s.fail_queue_at = Some(2));

    assert!(matches!(engine.snap(), Err(Error::StreamStart(_))));
    assert_eq!(engine.state(), StreamState::Stopped);
    let state = state.borrow();
    assert_eq!(state.stream_ons, 0);
    assert_eq!(state.stream_offs, 1);
}

#[test]
fn test_stop_failure_still_stops() {
    let (mut engine, state) = engine(|s| s.fail_stream_off = true);
    engine.start().unwrap();

    assert!(matches!(engine.stop(), Err(Error::StreamStop(_))));
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(matches!(engine.dequeue(), Err(Error::NotStreaming)));

    // snap reports the stop failure after a successful capture.
    assert!(matches!(engine.snap(), Err(Error::StreamStop(_))));
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(state.borrow().sequence >= 1);
}

#[test]
fn test_unknown_buffer_index() {
    let (mut engine, state) = engine(|s| s.bogus_index = Some(9));
    engine.start().unwrap();
    let queued = state.borrow().queue_calls;

    assert!(matches!(
        engine.dequeue(),
        Err(Error::InvalidBufferIndex(9))
    ));
    assert_eq!(state.borrow().queue_calls, queued);
    engine.stop().unwrap();
}

#[test]
fn test_shutdown_releases_everything() {
    let (mut engine, state) = engine(|_| {});
    engine.start().unwrap();

    engine.shutdown().unwrap();
    engine.shutdown().unwrap();
    assert_eq!(engine.state(), StreamState::Stopped);
    assert!(matches!(engine.start(), Err(Error::NotInitialized)));

    let state = state.borrow();
    assert_eq!(state.maps, 4);
    assert_eq!(state.unmaps, 4);
    assert_eq!(state.requests, vec![4, 0]);
}

#[test]
fn test_drop_releases_everything() {
    let (mut engine, state) = engine(|_| {});
    engine.start().unwrap();
    drop(engine);

    let state = state.borrow();
    assert!(!state.streaming);
    assert_eq!(state.live_mappings(), 0);
}

#[test]
fn test_renegotiate_rebuilds_pool() {
    let (mut engine, state) = engine(|_| {});
    engine.snap().unwrap();

    let format = engine.renegotiate(32, 8, FormatPolicy::Last).unwrap();
    assert_eq!((format.width, format.height), (32, 8));
    assert_eq!(engine.frame().data().len(), 32 * 8 * 2);
    {
        let state = state.borrow();
        assert_eq!(state.maps, 8);
        assert_eq!(state.live_mappings(), 4);
        assert_eq!(state.requests, vec![4, 0, 4]);
    }

    assert_eq!(engine.snap().unwrap().data().len(), 32 * 8 * 2);
}

#[test]
fn test_snap_compressed_keeps_payload() {
    let (mut engine, state) = engine(|s| {
        s.formats = vec![describe(b"YUYV"), describe(b"MJPG")];
        s.payload_len = Some(1234);
    });
    assert_eq!(engine.format().bytes_per_line, 0);
    assert_eq!(engine.format().buffer_size(), (WIDTH * HEIGHT * 2) as usize);

    let frame = engine.snap().unwrap();
    assert_eq!(frame.data().len(), 1234);
    assert_eq!(frame.data(), &state.borrow().last_payload[..]);

    // A larger payload on the next snap replaces the previous one.
    state.borrow_mut().payload_len = Some(1500);
    let frame = engine.snap().unwrap();
    assert_eq!(frame.data().len(), 1500);
    assert_eq!(frame.data(), &state.borrow().last_payload[..]);
    assert_eq!(engine.state(), StreamState::Stopped);
}

#[test]
fn test_snap_planar_copies_every_plane() {
    let (mut engine, state) = engine(|s| s.formats = vec![describe(b"NV12")]);
    assert_eq!(engine.format().bytes_per_line, WIDTH);

    let frame = engine.snap().unwrap();
    assert_eq!(frame.data().len(), (WIDTH * HEIGHT * 3 / 2) as usize);
    assert_eq!(frame.data(), &state.borrow().last_payload[..]);
}

#[test]
fn test_snap_short_stride_copies_raw() {
    let (mut engine, state) = engine(|s| s.bytes_per_line = Some(20));
    assert!(!engine.format().is_packed());

    let frame = engine.snap().unwrap();
    assert_eq!(frame.data().len(), 20 * HEIGHT as usize);
    assert_eq!(frame.data(), &state.borrow().last_payload[..]);
}
