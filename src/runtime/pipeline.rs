//! Pipeline runtime: producer and consumer driver threads over one channel.
//!
//! # Architecture
//!
//! The pipeline spawns two groups of threads around a single bounded
//! channel:
//! - **Producer threads**: each generates a fixed run of sequenced items,
//!   blocking whenever the buffer is full.
//! - **Consumer threads**: each withdraws items until the channel is stopped
//!   and drained, verifying per-producer sequence order as it goes.
//!
//! Shutdown follows the channel contract: producers finish their quota (or
//! observe the stop flag), the channel is shut down, and consumers drain the
//! buffered tail before exiting on the stopping outcome. The final
//! [`PipelineReport`] accounts for every item exactly once.
//!
//! # Example
//!
//! ```
//! use conveyor::runtime::pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     capacity: 4,
//!     producers: 2,
//!     consumers: 2,
//!     items_per_producer: 100,
//! };
//!
//! let pipeline = Pipeline::spawn(config).unwrap();
//! let report = pipeline.join().unwrap();
//!
//! assert_eq!(report.produced, 200);
//! assert_eq!(report.consumed, 200);
//! assert_eq!(report.out_of_order, 0);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::sync::mpmc::{self, Consumer, Producer, Timeout, WaitError};
use crate::trace::{debug, error, info, trace, warn};

/// Item carried through the pipeline channel.
///
/// The producer tag plus a per-producer sequence number lets consumers
/// verify FIFO delivery and lets the report account for every item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    /// Index of the producer thread that generated the item.
    pub producer: usize,
    /// Zero-based sequence number within that producer's run.
    pub seq: u64,
}

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Channel capacity in slots.
    pub capacity: usize,
    /// Number of producer threads.
    pub producers: usize,
    /// Number of consumer threads.
    pub consumers: usize,
    /// Items each producer generates before exiting.
    pub items_per_producer: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            producers: 1,
            consumers: 1,
            items_per_producer: 64,
        }
    }
}

/// Error spawning or running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Channel construction failed.
    #[error("channel error: {0}")]
    Channel(#[from] mpmc::ChannelError),
    /// OS-level thread spawn failure.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        source: std::io::Error,
    },
    /// A driver thread panicked; the run's accounting is unusable.
    #[error("{role} thread panicked")]
    DriverPanicked { role: &'static str },
    /// A driver observed a poisoned channel lock.
    #[error("channel poisoned during {role} loop")]
    Poisoned { role: &'static str },
}

/// Aggregate accounting for one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Items successfully enqueued across all producers.
    pub produced: u64,
    /// Items withdrawn across all consumers.
    pub consumed: u64,
    /// Per-producer sequence regressions observed by consumers. Always zero
    /// for a FIFO channel.
    pub out_of_order: u64,
}

/// Per-consumer accounting, merged into the report on join.
#[derive(Debug, Default)]
struct ConsumerStats {
    consumed: u64,
    out_of_order: u64,
}

/// Handle to a running pipeline.
///
/// Dropping the handle signals shutdown but does not wait for the driver
/// threads to exit. Use [`Pipeline::join`] for a complete run or
/// [`Pipeline::shutdown`] for an early stop with join.
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    channel: Consumer<Item>,
    producer_handles: Vec<JoinHandle<Result<u64, PipelineError>>>,
    consumer_handles: Vec<JoinHandle<Result<ConsumerStats, PipelineError>>>,
}

impl Pipeline {
    /// Spawns the producer and consumer driver threads.
    ///
    /// The channel is fully constructed before any thread starts, so every
    /// driver sees an initialized engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration names zero threads on either
    /// side, the channel capacity is zero, or a thread fails to spawn. On a
    /// spawn failure the already-running drivers are signaled to stop.
    pub fn spawn(config: PipelineConfig) -> Result<Self, PipelineError> {
        if config.producers == 0 {
            return Err(PipelineError::Config(
                "at least one producer thread is required".into(),
            ));
        }
        if config.consumers == 0 {
            return Err(PipelineError::Config(
                "at least one consumer thread is required".into(),
            ));
        }

        info!(
            capacity = config.capacity,
            producers = config.producers,
            consumers = config.consumers,
            items_per_producer = config.items_per_producer,
            "pipeline starting"
        );

        let (producer, consumer) = mpmc::channel::<Item>(config.capacity)?;
        let stop = Arc::new(AtomicBool::new(false));

        let mut producer_handles = Vec::with_capacity(config.producers);
        for index in 0..config.producers {
            let producer = producer.clone();
            let stop_flag = Arc::clone(&stop);
            let items = config.items_per_producer;
            let spawned = thread::Builder::new()
                .name(format!("conveyor-producer-{index}"))
                .spawn(move || {
                    debug!(producer = index, "producer thread started");
                    let result = producer_loop(&producer, index, items, &stop_flag);
                    debug!(producer = index, "producer thread exiting");
                    result
                });
            match spawned {
                Ok(handle) => producer_handles.push(handle),
                Err(source) => {
                    stop.store(true, Ordering::Relaxed);
                    consumer.shutdown();
                    return Err(PipelineError::Spawn {
                        role: "producer",
                        source,
                    });
                }
            }
        }

        let mut consumer_handles = Vec::with_capacity(config.consumers);
        for index in 0..config.consumers {
            let chan = consumer.clone();
            let producers = config.producers;
            let spawned = thread::Builder::new()
                .name(format!("conveyor-consumer-{index}"))
                .spawn(move || {
                    debug!(consumer = index, "consumer thread started");
                    let result = consumer_loop(&chan, index, producers);
                    debug!(consumer = index, "consumer thread exiting");
                    result
                });
            match spawned {
                Ok(handle) => consumer_handles.push(handle),
                Err(source) => {
                    stop.store(true, Ordering::Relaxed);
                    consumer.shutdown();
                    return Err(PipelineError::Spawn {
                        role: "consumer",
                        source,
                    });
                }
            }
        }

        Ok(Self {
            stop,
            channel: consumer,
            producer_handles,
            consumer_handles,
        })
    }

    /// Waits for the run to complete and returns the aggregate report.
    ///
    /// Producers are joined first so the channel stays open until every
    /// quota is met; the channel is then shut down and the consumers drain
    /// whatever is still buffered before exiting.
    ///
    /// # Errors
    ///
    /// Returns an error if a driver thread panicked or observed a poisoned
    /// channel lock.
    pub fn join(mut self) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();

        for handle in self.producer_handles.drain(..) {
            let produced = handle.join().map_err(|_| {
                error!("producer thread panicked");
                PipelineError::DriverPanicked { role: "producer" }
            })??;
            report.produced += produced;
        }

        // Every producer is done; stop the channel so the consumers drain
        // the buffered tail and exit on the stopping outcome.
        self.channel.shutdown();

        for handle in self.consumer_handles.drain(..) {
            let stats = handle.join().map_err(|_| {
                error!("consumer thread panicked");
                PipelineError::DriverPanicked { role: "consumer" }
            })??;
            report.consumed += stats.consumed;
            report.out_of_order += stats.out_of_order;
        }

        info!(
            produced = report.produced,
            consumed = report.consumed,
            out_of_order = report.out_of_order,
            "pipeline complete"
        );

        Ok(report)
    }

    /// Stops the run early: flags every driver, wakes all blocked calls,
    /// then joins and reports like [`Pipeline::join`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`Pipeline::join`].
    pub fn shutdown(self) -> Result<PipelineReport, PipelineError> {
        info!("pipeline shutdown initiated");
        self.stop.store(true, Ordering::Relaxed);
        self.channel.shutdown();
        self.join()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Signal shutdown if not already done; join() drains the handles,
        // so after a normal run both calls are no-ops.
        self.stop.store(true, Ordering::Relaxed);
        self.channel.shutdown();
    }
}

fn producer_loop(
    producer: &Producer<Item>,
    index: usize,
    items: u64,
    stop: &AtomicBool,
) -> Result<u64, PipelineError> {
    let mut produced = 0;
    for seq in 0..items {
        // The stop flag is only consulted between calls; a produce blocked
        // inside the engine is woken by the channel shutdown instead.
        if stop.load(Ordering::Relaxed) {
            debug!(producer = index, produced, "producer observed stop flag");
            break;
        }
        let item = Item {
            producer: index,
            seq,
        };
        match producer.produce(item, Timeout::Infinite) {
            Ok(()) => produced += 1,
            Err(err) => match err.reason() {
                WaitError::Stopped => {
                    debug!(producer = index, produced, "channel stopped mid-run");
                    break;
                }
                WaitError::Poisoned => {
                    return Err(PipelineError::Poisoned { role: "producer" });
                }
                WaitError::Timeout => unreachable!("infinite wait cannot time out"),
            },
        }
    }
    Ok(produced)
}

fn consumer_loop(
    consumer: &Consumer<Item>,
    index: usize,
    producers: usize,
) -> Result<ConsumerStats, PipelineError> {
    let mut stats = ConsumerStats::default();
    // Highest sequence seen per producer. Aggregate FIFO makes each
    // consumer's observed per-producer subsequence strictly increasing.
    let mut last_seq: Vec<Option<u64>> = vec![None; producers];

    loop {
        match consumer.consume(Timeout::Infinite) {
            Ok(item) => {
                stats.consumed += 1;
                trace!(
                    consumer = index,
                    producer = item.producer,
                    seq = item.seq,
                    "item consumed"
                );
                let slot = &mut last_seq[item.producer];
                if slot.is_some_and(|prev| item.seq <= prev) {
                    warn!(
                        consumer = index,
                        producer = item.producer,
                        seq = item.seq,
                        "sequence regression"
                    );
                    stats.out_of_order += 1;
                }
                *slot = Some(item.seq);
            }
            Err(WaitError::Stopped) => break,
            Err(WaitError::Poisoned) => {
                return Err(PipelineError::Poisoned { role: "consumer" });
            }
            Err(WaitError::Timeout) => unreachable!("infinite wait cannot time out"),
        }
    }
    Ok(stats)
}
