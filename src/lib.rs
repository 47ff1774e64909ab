//! Bounded blocking MPMC channel with producer/consumer driver threads.
//!
//! Conveyor coordinates any number of producer and consumer threads around
//! one fixed-capacity FIFO buffer. Access is serialized by a single mutex;
//! two condition variables (`space_available`, `item_available`) give the
//! channel its blocking semantics without busy-waiting. No item is ever
//! lost, no slot is overwritten while in use, and a waiter consumes no CPU
//! until it is signaled.
//!
//! # Modules
//!
//! - [`sync::mpmc`] - the blocking channel: [`channel`], [`Producer`],
//!   [`Consumer`], [`Timeout`], shutdown semantics.
//! - [`runtime::pipeline`] - driver threads: spawns producer/consumer loops
//!   around one channel and accounts for every item in a run report.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! use conveyor::{Timeout, channel};
//!
//! let (producer, consumer) = channel::<u64>(4).unwrap();
//!
//! let worker = thread::spawn(move || {
//!     for i in 0..8 {
//!         producer.produce(i, Timeout::Infinite).unwrap();
//!     }
//! });
//!
//! // Blocks while the buffer is empty; items arrive in FIFO order.
//! for i in 0..8 {
//!     assert_eq!(consumer.consume(Timeout::Infinite).unwrap(), i);
//! }
//!
//! worker.join().unwrap();
//! ```

pub(crate) mod mpmc;
pub mod runtime;
pub mod sync;

mod trace;

pub use sync::mpmc::{Consumer, Producer, Timeout, channel};
pub use trace::init_tracing;
