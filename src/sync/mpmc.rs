//! Blocking MPMC channel for in-process (inter-thread) communication.
//!
//! A bounded FIFO channel built from one mutex and two condition variables:
//! producers block while the buffer is full, consumers block while it is
//! empty, and no thread ever busy-waits.
//!
//! # Overview
//!
//! - [`Producer`] - write end (cloneable, one clone per producer thread)
//! - [`Consumer`] - read end (cloneable, one clone per consumer thread)
//! - [`channel`] - constructs a connected pair around one shared buffer
//!
//! A waiting thread holds no lock while blocked: the condition variable
//! releases the mutex for the duration of the wait and reacquires it on
//! wake. Every wait re-checks its predicate in a loop, so spurious wakeups
//! and waiters racing for the same slot are harmless.
//!
//! # Example
//!
//! ```
//! use conveyor::sync::mpmc::{self, Timeout};
//!
//! let (producer, consumer) = mpmc::channel::<u64>(4).unwrap();
//!
//! // Producer thread
//! producer.produce(42, Timeout::Infinite).unwrap();
//!
//! // Consumer thread
//! assert_eq!(consumer.consume(Timeout::Infinite).unwrap(), 42);
//! ```
//!
//! # Differences from a lock-free ring
//!
//! Compared to an atomic SPSC ring, this channel trades raw latency for
//! blocking semantics: any number of threads may share either end, and a
//! waiter consumes no CPU until signaled. The single coarse lock keeps the
//! protocol free of lock-ordering concerns; the bounded capacity keeps
//! contention on it acceptable.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use minstant::Instant;
use thiserror::Error;

use crate::mpmc::ring::Ring;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// Error constructing a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The buffer needs at least one slot.
    #[error("channel capacity must be at least 1")]
    InvalidCapacity,
}

/// Reason a blocking operation returned without transferring an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The deadline passed while the buffer stayed full (produce) or empty
    /// (consume). The channel state is untouched.
    #[error("channel operation timed out")]
    Timeout,
    /// The channel was shut down.
    #[error("channel is stopped")]
    Stopped,
    /// A thread panicked while holding the channel lock; the buffer
    /// invariants can no longer be trusted.
    #[error("channel lock poisoned")]
    Poisoned,
}

/// A produce call that did not enqueue; hands the rejected item back.
pub struct ProduceError<T> {
    item: T,
    reason: WaitError,
}

impl<T> ProduceError<T> {
    /// Why the item was rejected.
    #[must_use]
    pub fn reason(&self) -> WaitError {
        self.reason
    }

    /// Recovers the rejected item.
    #[must_use]
    pub fn into_item(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for ProduceError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProduceError").field(&self.reason).finish()
    }
}

impl<T> fmt::Display for ProduceError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.reason, f)
    }
}

impl<T> std::error::Error for ProduceError<T> {}

/// Channel state guarded by the single lock.
struct State<T> {
    ring: Ring<T>,
    stopped: bool,
}

/// Shared channel core: the buffer, its lock, and the two wait conditions.
struct Chan<T> {
    state: Mutex<State<T>>,
    /// Signaled whenever a slot frees up.
    space_available: Condvar,
    /// Signaled whenever an item is enqueued.
    item_available: Condvar,
    capacity: usize,
}

impl<T> Chan<T> {
    fn lock(&self) -> Result<MutexGuard<'_, State<T>>, WaitError> {
        self.state.lock().map_err(|_| WaitError::Poisoned)
    }

    fn produce(&self, mut item: T, timeout: Timeout) -> Result<(), ProduceError<T>> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };

        let mut state = match self.lock() {
            Ok(state) => state,
            Err(reason) => return Err(ProduceError { item, reason }),
        };
        loop {
            if state.stopped {
                return Err(ProduceError {
                    item,
                    reason: WaitError::Stopped,
                });
            }
            match state.ring.try_put(item) {
                Ok(()) => {
                    // At least one waiting consumer, if any, becomes
                    // eligible to take this item.
                    self.item_available.notify_one();
                    return Ok(());
                }
                Err(returned) => item = returned,
            }
            // Full: wait for a slot. The lock is released for the duration
            // of the wait and reacquired before the predicate is re-checked.
            state = match self.wait(&self.space_available, state, deadline) {
                Ok(state) => state,
                Err(reason) => return Err(ProduceError { item, reason }),
            };
        }
    }

    fn consume(&self, timeout: Timeout) -> Result<T, WaitError> {
        let deadline = match timeout {
            Timeout::Infinite => None,
            Timeout::Duration(d) => Some(Instant::now() + d),
        };

        let mut state = self.lock()?;
        loop {
            if let Some(item) = state.ring.try_take() {
                // A slot just freed; let one blocked producer proceed.
                self.space_available.notify_one();
                return Ok(item);
            }
            // A stopped channel still drains: the stop check comes after the
            // take so items enqueued before shutdown are never lost.
            if state.stopped {
                return Err(WaitError::Stopped);
            }
            state = self.wait(&self.item_available, state, deadline)?;
        }
    }

    /// One bounded wait on `condvar`, against the optional deadline.
    fn wait<'a>(
        &'a self,
        condvar: &Condvar,
        guard: MutexGuard<'a, State<T>>,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'a, State<T>>, WaitError> {
        match deadline {
            None => condvar.wait(guard).map_err(|_| WaitError::Poisoned),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(WaitError::Timeout);
                }
                condvar
                    .wait_timeout(guard, deadline.duration_since(now))
                    .map(|(guard, _)| guard)
                    .map_err(|_| WaitError::Poisoned)
            }
        }
    }

    fn try_produce(&self, item: T) -> Result<(), T> {
        let Ok(mut state) = self.state.lock() else {
            return Err(item);
        };
        if state.stopped {
            return Err(item);
        }
        state.ring.try_put(item)?;
        self.item_available.notify_one();
        Ok(())
    }

    fn try_consume(&self) -> Option<T> {
        let item = self.state.lock().ok()?.ring.try_take()?;
        self.space_available.notify_one();
        Some(item)
    }

    fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        // Wake every waiter, with the lock released, so each can observe the
        // stop flag and return the designated stopping outcome.
        self.space_available.notify_all();
        self.item_available.notify_all();
    }

    fn is_stopped(&self) -> bool {
        // A poisoned channel refuses all further traffic, same as stopped.
        self.state.lock().map_or(true, |state| state.stopped)
    }

    fn len(&self) -> usize {
        self.state.lock().map_or(0, |state| state.ring.len())
    }
}

/// Write end of the channel.
///
/// Cloneable: any number of producer threads may hold a handle, and every
/// produce call is serialized by the shared lock.
pub struct Producer<T> {
    chan: Arc<Chan<T>>,
}

/// Read end of the channel.
///
/// Cloneable; see [`Producer`] for the sharing semantics (same rules apply).
pub struct Consumer<T> {
    chan: Arc<Chan<T>>,
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Self {
            chan: Arc::clone(&self.chan),
        }
    }
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            chan: Arc::clone(&self.chan),
        }
    }
}

/// Creates a new bounded channel with `capacity` slots.
///
/// Returns a `(Producer, Consumer)` pair sharing one buffer. Both halves can
/// be cloned and sent to any number of threads. The buffer is released when
/// the last handle drops.
///
/// # Errors
///
/// Returns [`ChannelError::InvalidCapacity`] if `capacity` is zero.
///
/// # Example
///
/// ```
/// use conveyor::sync::mpmc;
///
/// let (tx, rx) = mpmc::channel::<String>(16).unwrap();
///
/// tx.try_produce("hello".to_string()).unwrap();
/// assert_eq!(rx.try_consume(), Some("hello".to_string()));
/// ```
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), ChannelError> {
    if capacity == 0 {
        return Err(ChannelError::InvalidCapacity);
    }

    let ring = Ring::with_capacity(capacity);
    let chan = Arc::new(Chan {
        capacity: ring.capacity(),
        state: Mutex::new(State {
            ring,
            stopped: false,
        }),
        space_available: Condvar::new(),
        item_available: Condvar::new(),
    });

    let producer = Producer {
        chan: Arc::clone(&chan),
    };
    let consumer = Consumer { chan };

    Ok((producer, consumer))
}

impl<T> Producer<T> {
    /// Attempts to enqueue an item without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the buffer is full or the channel is stopped,
    /// handing the item back for retry.
    pub fn try_produce(&self, item: T) -> Result<(), T> {
        self.chan.try_produce(item)
    }

    /// Enqueues an item, blocking while the buffer is full.
    ///
    /// On success the item is durably enqueued and visible to any
    /// subsequent consume.
    ///
    /// # Errors
    ///
    /// Returns a [`ProduceError`] holding the rejected item when the wait
    /// times out, the channel is shut down, or the lock is poisoned. A
    /// timeout leaves the channel state untouched.
    pub fn produce(&self, item: T, timeout: Timeout) -> Result<(), ProduceError<T>> {
        self.chan.produce(item, timeout)
    }

    /// Stops the channel: refuses further produce calls and wakes every
    /// blocked thread with [`WaitError::Stopped`]. Buffered items remain
    /// consumable. Idempotent.
    pub fn shutdown(&self) {
        self.chan.shutdown();
    }

    /// Whether the channel has been shut down.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.chan.is_stopped()
    }

    /// Number of slots in the buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chan.capacity
    }

    /// Snapshot of the number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chan.len()
    }

    /// Whether the buffer currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Consumer<T> {
    /// Attempts to dequeue an item without blocking.
    ///
    /// Returns `None` if the buffer is empty.
    #[must_use]
    pub fn try_consume(&self) -> Option<T> {
        self.chan.try_consume()
    }

    /// Dequeues the oldest item, blocking while the buffer is empty.
    ///
    /// FIFO holds across the aggregate call history: the returned item is
    /// the oldest one not yet returned by any consume, on any thread.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] when the deadline passes,
    /// [`WaitError::Stopped`] once the channel is shut down and drained, or
    /// [`WaitError::Poisoned`] if the lock is poisoned.
    pub fn consume(&self, timeout: Timeout) -> Result<T, WaitError> {
        self.chan.consume(timeout)
    }

    /// Stops the channel; see [`Producer::shutdown`].
    pub fn shutdown(&self) {
        self.chan.shutdown();
    }

    /// Whether the channel has been shut down.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.chan.is_stopped()
    }

    /// Number of slots in the buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.chan.capacity
    }

    /// Snapshot of the number of buffered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chan.len()
    }

    /// Whether the buffer currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
