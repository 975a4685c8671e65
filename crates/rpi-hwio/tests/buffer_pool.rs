// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Buffer pool allocation and release against a simulated driver.
//
// RUN:
//   cargo test --test buffer_pool

mod common;

use common::{SimulatedDriver, State};
use rpi_hwio::{
    fourcc::FourCC,
    v4l2::{BufferPool, BufferState, Driver, PixFormat},
    Error,
};
use std::{cell::RefCell, rc::Rc};

/// Commit a small format so buffer sizes are known.
fn configured() -> (SimulatedDriver, Rc<RefCell<State>>) {
    common::init_logging();
    let (mut driver, state) = SimulatedDriver::new();
    driver
        .set_format(&PixFormat {
            width: 64,
            height: 32,
            fourcc: FourCC::YUYV,
            field: 1,
            bytes_per_line: 0,
            size_image: 0,
        })
        .unwrap();
    (driver, state)
}

#[test]
fn test_allocate_default_count() {
    let (mut driver, state) = configured();
    let mut pool = BufferPool::allocate(&mut driver, 4).unwrap();

    assert_eq!(pool.len(), 4);
    assert_eq!(state.borrow().live_mappings(), 4);
    for (index, buffer) in pool.buffers().iter().enumerate() {
        assert_eq!(buffer.index(), index as u32);
        assert_eq!(buffer.length(), 64 * 32 * 2);
        assert_eq!(buffer.state(), BufferState::Idle);
    }

    pool.release(&mut driver);
    assert!(pool.is_empty());
    assert_eq!(state.borrow().live_mappings(), 0);
    assert_eq!(state.borrow().requests, vec![4, 0]);
}

#[test]
fn test_granted_count_is_used() {
    let (mut driver, state) = configured();
    state.borrow_mut().grant_limit = Some(3);

    let mut pool = BufferPool::allocate(&mut driver, 8).unwrap();
    assert_eq!(pool.len(), 3);
    assert_eq!(state.borrow().maps, 3);
    pool.release(&mut driver);
}

#[test]
fn test_single_buffer_grant_is_insufficient() {
    let (mut driver, state) = configured();
    state.borrow_mut().grant_limit = Some(1);

    let err = BufferPool::allocate(&mut driver, 4).unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientBuffers {
            requested: 4,
            granted: 1
        }
    ));

    let state = state.borrow();
    assert_eq!(state.maps, 0);
    assert_eq!(state.live_mappings(), 0);
    // The kernel allocation is handed back.
    assert_eq!(state.requests, vec![4, 0]);
    assert!(state.memory.is_empty());
}

#[test]
fn test_request_failure() {
    let (mut driver, state) = configured();
    state.borrow_mut().fail_request = true;

    let err = BufferPool::allocate(&mut driver, 4).unwrap_err();
    assert!(matches!(err, Error::BufferRequest(_)));
    assert_eq!(state.borrow().maps, 0);
}

#[test]
fn test_map_failure_unmaps_earlier_buffers() {
    let (mut driver, state) = configured();
    state.borrow_mut().fail_map_at = Some(2);

    let err = BufferPool::allocate(&mut driver, 4).unwrap_err();
    assert!(matches!(err, Error::BufferMap { index: 2, .. }));

    let state = state.borrow();
    assert_eq!(state.maps, 2);
    assert_eq!(state.unmaps, 2);
    assert_eq!(state.requests, vec![4, 0]);
}

#[test]
fn test_query_failure_unmaps_earlier_buffers() {
    let (mut driver, state) = configured();
    state.borrow_mut().fail_query_at = Some(1);

    let err = BufferPool::allocate(&mut driver, 4).unwrap_err();
    assert!(matches!(err, Error::BufferQuery { index: 1, .. }));
    assert_eq!(state.borrow().live_mappings(), 0);
}

#[test]
fn test_release_is_idempotent() {
    let (mut driver, state) = configured();
    let mut pool = BufferPool::allocate(&mut driver, 2).unwrap();

    pool.release(&mut driver);
    pool.release(&mut driver);

    let state = state.borrow();
    assert_eq!(state.maps, 2);
    assert_eq!(state.unmaps, 2);
    assert_eq!(state.requests, vec![2, 0]);
}

#[test]
fn test_data_only_while_dequeued() {
    let (mut driver, _state) = configured();
    let mut pool = BufferPool::allocate(&mut driver, 2).unwrap();

    assert!(pool.data(0).is_none());
    assert!(pool.data(5).is_none());
    assert_eq!(pool.state(5), None);

    pool.release(&mut driver);
}
