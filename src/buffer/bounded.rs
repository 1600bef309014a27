//! `BoundedBufferWithId<T>` — a capacity-bounded FIFO guarded by a
//! `Mutex`/`Condvar` pair, identified by a `u64` port id once enrolled in
//! a broker.
//!
//! This is the primitive both halves of a `BufferPort` are built from:
//! one buffer carries raw (unprocessed) items toward consumers, the other
//! carries processed items back. Pushing blocks while the buffer is full;
//! popping blocks while it is empty. Both directions support an optional
//! timeout, surfaced as `BufferError::TimedOut`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::BufferError;

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
}

/// A bounded, id-tagged, thread-safe FIFO.
pub struct BoundedBufferWithId<T> {
    id: Mutex<Option<u64>>,
    state: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BoundedBufferWithId<T> {
    /// Creates an empty buffer with room for `capacity` items.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedBufferWithId capacity must be non-zero");
        Self {
            id: Mutex::new(None),
            state: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// The port id this buffer was tagged with by `Broker::enrol`, if any.
    pub fn id(&self) -> Option<u64> {
        *self.id.lock().expect("buffer id mutex poisoned")
    }

    /// Tags this buffer with a port id. Called once, by the broker, at
    /// enrollment time.
    pub fn set_id(&self, id: u64) {
        *self.id.lock().expect("buffer id mutex poisoned") = Some(id);
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().expect("buffer state mutex poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().expect("buffer state mutex poisoned").capacity
    }

    /// Pushes `item` to the front, blocking indefinitely while full.
    pub fn push_front(&self, item: T) {
        let mut guard = self.state.lock().expect("buffer state mutex poisoned");
        while guard.items.len() >= guard.capacity {
            guard = self.not_full.wait(guard).expect("buffer condvar poisoned");
        }
        guard.items.push_front(item);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Pushes `item` to the front, giving up after `timeout` if the
    /// buffer stays full the whole time.
    pub fn push_front_timeout(&self, item: T, timeout: Duration) -> Result<(), BufferError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().expect("buffer state mutex poisoned");
        while guard.items.len() >= guard.capacity {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BufferError::TimedOut);
            }
            let (g, result) = self
                .not_full
                .wait_timeout(guard, remaining)
                .expect("buffer condvar poisoned");
            guard = g;
            if result.timed_out() && guard.items.len() >= guard.capacity {
                return Err(BufferError::TimedOut);
            }
        }
        guard.items.push_front(item);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pops the oldest item, blocking indefinitely while empty.
    pub fn pop_back(&self) -> T {
        let mut guard = self.state.lock().expect("buffer state mutex poisoned");
        while guard.items.is_empty() {
            guard = self.not_empty.wait(guard).expect("buffer condvar poisoned");
        }
        let item = guard.items.pop_back().expect("checked non-empty above");
        drop(guard);
        self.not_full.notify_one();
        item
    }

    /// Pops the oldest item, giving up after `timeout` if the buffer
    /// stays empty the whole time.
    pub fn pop_back_timeout(&self, timeout: Duration) -> Result<T, BufferError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().expect("buffer state mutex poisoned");
        while guard.items.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BufferError::TimedOut);
            }
            let (g, result) = self
                .not_empty
                .wait_timeout(guard, remaining)
                .expect("buffer condvar poisoned");
            guard = g;
            if result.timed_out() && guard.items.is_empty() {
                return Err(BufferError::TimedOut);
            }
        }
        let item = guard.items.pop_back().expect("checked non-empty above");
        drop(guard);
        self.not_full.notify_one();
        Ok(item)
    }
}
