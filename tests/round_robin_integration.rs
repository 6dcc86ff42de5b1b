//! Integration tests for input polling
//!
//! These tests validate:
//! - Round-robin rotation of the starting input
//! - Falling through to the next input when one has nothing
//! - Idle ticks with no inputs, or only empty inputs
//! - Registering inputs and outputs on a running pipe

mod common;

use common::builders::PipeBuilder;
use common::recorders::{counting_input, tripwire, Recorder};
use common::{test_timeout, wait_until};
use faucet_rs::{Context, Pipe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_round_robin_ping_pong() {
    let pipe: Pipe<i64> = Pipe::named("ping-pong");

    let x = AtomicI64::new(0);
    pipe.add_input(move |_| Ok(Some(x.fetch_add(1, Ordering::SeqCst) + 1)));
    let y = AtomicI64::new(0);
    pipe.add_input(move |_| Ok(Some(y.fetch_sub(1, Ordering::SeqCst) - 1)));

    let recorder = Recorder::new();
    pipe.add_output_sink(recorder.clone());

    pipe.start(&Context::background(), Duration::from_millis(1));
    assert!(wait_until(test_timeout(), || recorder.len() >= 10));
    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    let values = recorder.values();
    for (i, value) in values.iter().enumerate() {
        let round = (i / 2) as i64 + 1;
        let expected = if i % 2 == 0 { round } else { -round };
        assert_eq!(*value, expected, "tick {} delivered {:?}", i, values);
    }
}

#[test]
fn test_fallback_inputs() {
    let pipe = PipeBuilder::new("fallback")
        .not_found()
        .found(1)
        .not_found()
        .found(2)
        .not_found()
        .found(3)
        .build();

    let recorder = Recorder::new();
    pipe.add_output_sink(recorder.clone());

    pipe.start(&Context::background(), Duration::from_millis(1));
    assert!(wait_until(test_timeout(), || recorder.len() >= 20));
    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    let pattern = [1, 1, 2, 2, 3, 3];
    for (i, value) in recorder.values().iter().enumerate() {
        assert_eq!(*value, pattern[i % pattern.len()], "tick {}", i);
    }
}

#[test]
fn test_rotation_starts_at_next_input_each_tick() {
    let pipe: Pipe<usize> = Pipe::new();
    let first_polled = Recorder::new();

    for index in 0..3 {
        let log = first_polled.clone();
        pipe.add_input(move |_| {
            log.push(index);
            Ok(Some(index))
        });
    }

    pipe.start(&Context::background(), Duration::from_millis(1));
    assert!(wait_until(test_timeout(), || first_polled.len() >= 9));
    pipe.stop();
    pipe.done().wait();

    // Every input is found, so each tick polls exactly one: the rotation start.
    let polled = first_polled.values();
    for (tick, index) in polled.iter().enumerate() {
        assert_eq!(*index, tick % 3, "polled order {:?}", polled);
    }
    assert_eq!(pipe.stats().input_polls, polled.len() as u64);
}

#[test]
fn test_no_inputs_is_idle() {
    let pipe: Pipe<u32> = Pipe::new();
    let (called, output) = tripwire();
    pipe.add_output(output);

    pipe.start(&Context::background(), Duration::from_millis(1));
    assert!(wait_until(test_timeout(), || pipe.stats().ticks >= 10));
    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    assert!(!called.load(Ordering::SeqCst));

    let stats = pipe.stats();
    assert_eq!(stats.ticks, stats.idle_ticks);
    assert_eq!(stats.input_polls, 0);
    assert_eq!(stats.output_calls, 0);
}

#[test]
fn test_not_found_inputs_are_idle() {
    let pipe = PipeBuilder::<u32>::new("empty")
        .not_found()
        .not_found()
        .not_found()
        .build();
    let (called, output) = tripwire();
    pipe.add_output(output);

    pipe.start(&Context::background(), Duration::from_millis(1));
    assert!(wait_until(test_timeout(), || pipe.stats().ticks >= 10));
    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    assert!(!called.load(Ordering::SeqCst));

    let stats = pipe.stats();
    assert_eq!(stats.values_delivered, 0);
    assert_eq!(stats.input_polls, stats.ticks * 3);
}

#[test]
fn test_no_outputs() {
    let pipe: Pipe<u64> = Pipe::new();
    pipe.add_input(counting_input());

    pipe.start(&Context::background(), Duration::from_millis(150));
    thread::sleep(Duration::from_millis(50));
    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    let stats = pipe.stats();
    assert_eq!(stats.values_delivered, 1, "only the immediate first tick ran");
    assert_eq!(stats.output_calls, 0);
}

#[test]
fn test_add_after_start() {
    let pipe: Pipe<bool> = Pipe::new();
    pipe.start(&Context::background(), Duration::from_millis(1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(pipe.stats().values_delivered, 0);

    let polled = Recorder::new();
    let log = polled.clone();
    pipe.add_input(move |_| {
        log.push(());
        Ok(Some(true))
    });

    let delivered = Recorder::new();
    pipe.add_output_sink(delivered.clone());

    assert!(wait_until(test_timeout(), || !polled.is_empty()));
    assert!(wait_until(test_timeout(), || !delivered.is_empty()));

    pipe.stop();
    pipe.done().wait();

    assert!(pipe.err().is_none());
    assert!(delivered.values().iter().all(|v| *v));
}
