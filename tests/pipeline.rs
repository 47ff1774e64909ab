//! End-to-end tests for the producer/consumer pipeline.
//!
//! These tests verify the complete flow:
//! 1. The channel is constructed before any driver thread starts
//! 2. Producer threads block whenever the buffer is full
//! 3. Consumer threads block whenever the buffer is empty
//! 4. Shutdown wakes every blocked driver and drains the buffered tail
//! 5. The run report accounts for every item exactly once, in FIFO order
//!
//! # Running with tracing
//!
//! To see full debug output, run with the tracing feature and no capture:
//! ```bash
//! cargo test --features tracing pipeline_end_to_end -- --nocapture
//! ```
//!
//! You can control the log level via RUST_LOG:
//! ```bash
//! RUST_LOG=conveyor=debug cargo test --features tracing -- --nocapture
//! ```

use std::sync::Once;
use std::thread;
use std::time::Duration;

use conveyor::runtime::pipeline::{Pipeline, PipelineConfig};
use conveyor::sync::mpmc::{self, Timeout, WaitError};

static INIT_TRACING: Once = Once::new();

/// Initialize tracing for tests (only once).
fn init_test_tracing() {
    INIT_TRACING.call_once(|| {
        conveyor::init_tracing();
    });
}

/// Encodes a (producer, sequence) pair into one payload word.
fn tag(producer: u64, seq: u64) -> u64 {
    producer * 1_000 + seq
}

#[test]
fn scenario_two_producers_two_consumers_small_ring() {
    init_test_tracing();

    let (producer, consumer) = mpmc::channel::<u64>(4).unwrap();

    // Two producers interleave four items each, with jitter so different
    // runs exercise different interleavings.
    let producers: Vec<_> = (0..2u64)
        .map(|p| {
            let producer = producer.clone();
            thread::spawn(move || {
                for seq in 0..4 {
                    if rand::random::<u8>() % 4 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                    producer.produce(tag(p, seq), Timeout::Infinite).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let consumer = consumer.clone();
            thread::spawn(move || {
                let mut got = Vec::new();
                loop {
                    match consumer.consume(Timeout::Infinite) {
                        Ok(item) => got.push(item),
                        Err(WaitError::Stopped) => break got,
                        Err(e) => panic!("unexpected consume error: {e}"),
                    }
                }
            })
        })
        .collect();

    for handle in producers {
        handle.join().unwrap();
    }
    consumer.shutdown();

    let per_consumer: Vec<Vec<u64>> = consumers
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    // Each consumer's observed per-producer subsequence must be increasing.
    for got in &per_consumer {
        for p in 0..2 {
            let seqs: Vec<u64> = got
                .iter()
                .filter(|&&item| item / 1_000 == p)
                .map(|&item| item % 1_000)
                .collect();
            assert!(
                seqs.windows(2).all(|w| w[0] < w[1]),
                "sequence regression for producer {p}: {seqs:?}"
            );
        }
    }

    // The union is a permutation of all eight items and the buffer is empty.
    let mut all: Vec<u64> = per_consumer.into_iter().flatten().collect();
    all.sort_unstable();
    let expected: Vec<u64> = (0..2).flat_map(|p| (0..4).map(move |s| tag(p, s))).collect();
    assert_eq!(all, expected);
    assert_eq!(consumer.len(), 0);
}

#[test]
fn pipeline_end_to_end_accounts_for_every_item() {
    init_test_tracing();

    let config = PipelineConfig {
        capacity: 2,
        producers: 4,
        consumers: 3,
        items_per_producer: 250,
    };
    let report = Pipeline::spawn(config).unwrap().join().unwrap();

    assert_eq!(report.produced, 1_000);
    assert_eq!(report.consumed, 1_000);
    assert_eq!(report.out_of_order, 0);
}

#[test]
fn pipeline_early_shutdown_is_clean() {
    init_test_tracing();

    let config = PipelineConfig {
        capacity: 4,
        producers: 2,
        consumers: 2,
        items_per_producer: u64::MAX,
    };
    let pipeline = Pipeline::spawn(config).unwrap();

    thread::sleep(Duration::from_millis(30));
    let report = pipeline.shutdown().unwrap();

    assert_eq!(report.produced, report.consumed);
    assert_eq!(report.out_of_order, 0);
}

#[test]
fn single_slot_channel_preserves_exact_order() {
    init_test_tracing();

    let (producer, consumer) = mpmc::channel::<u64>(1).unwrap();
    let count = 100u64;

    let handle = thread::spawn(move || {
        for i in 0..count {
            if rand::random::<u8>() % 8 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            producer.produce(i, Timeout::Infinite).unwrap();
        }
    });

    // With one slot every item is a strict handoff; order must be exact.
    for i in 0..count {
        assert_eq!(consumer.consume(Timeout::Infinite), Ok(i));
    }

    handle.join().unwrap();
    assert_eq!(consumer.try_consume(), None);
}

#[test]
fn blocked_consumer_wakes_on_matching_produce() {
    init_test_tracing();

    let (producer, consumer) = mpmc::channel::<&str>(2).unwrap();

    let waiter = thread::spawn(move || consumer.consume(Timeout::Infinite));

    // Let the consumer reach its wait before anything is enqueued.
    thread::sleep(Duration::from_millis(50));
    producer.produce("wake", Timeout::Infinite).unwrap();

    assert_eq!(waiter.join().unwrap(), Ok("wake"));
}
