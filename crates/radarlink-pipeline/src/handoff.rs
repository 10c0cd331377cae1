use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use radarlink_frame::RawFrame;
use tracing::warn;

/// Default number of raw frames buffered between reader and worker.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 100;

/// Fixed-capacity ring of raw frames between the reading thread and the
/// decode worker.
///
/// One producer pushes, one consumer pops. When full, a push displaces the
/// oldest unread frame; frames are never reordered or partially consumed.
/// The read index moves on both sides, so both indices live under one lock.
pub struct HandoffBuffer {
    ring: Mutex<Ring>,
    signal: Condvar,
    overflows: AtomicU64,
}

struct Ring {
    slots: Vec<Option<RawFrame>>,
    write: usize,
    read: usize,
    full: bool,
    closed: bool,
}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else {
            (self.write + self.capacity() - self.read) % self.capacity()
        }
    }

    /// Store `frame`, returning the frame it displaced.
    fn put(&mut self, frame: RawFrame) -> Option<RawFrame> {
        let cap = self.capacity();
        let displaced = if self.full {
            let oldest = self.slots[self.read].take();
            self.read = (self.read + 1) % cap;
            oldest
        } else {
            None
        };

        self.slots[self.write] = Some(frame);
        self.write = (self.write + 1) % cap;
        if self.write == self.read {
            self.full = true;
        }
        displaced
    }

    fn take(&mut self) -> Option<RawFrame> {
        if self.read == self.write && !self.full {
            return None;
        }
        let frame = self.slots[self.read].take();
        self.read = (self.read + 1) % self.capacity();
        self.full = false;
        frame
    }
}

impl HandoffBuffer {
    /// Create a buffer holding up to `capacity` frames (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                write: 0,
                read: 0,
                full: false,
                closed: false,
            }),
            signal: Condvar::new(),
            overflows: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a frame and wake the consumer.
    ///
    /// Returns true when the oldest unread frame was dropped to make room.
    pub fn push(&self, frame: RawFrame) -> bool {
        let displaced = self.lock().put(frame);
        self.signal.notify_one();

        match displaced {
            Some(dropped) => {
                let total = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    frame_number = dropped.header.frame_number,
                    total_dropped = total,
                    "handoff buffer overflow, dropping oldest frame"
                );
                true
            }
            None => false,
        }
    }

    /// Dequeue the oldest unread frame without waiting.
    pub fn pop(&self) -> Option<RawFrame> {
        self.lock().take()
    }

    /// Dequeue the oldest unread frame, sleeping up to `timeout` for one.
    ///
    /// Returns `None` on timeout or once the buffer is closed and drained.
    pub fn wait_pop(&self, timeout: Duration) -> Option<RawFrame> {
        let deadline = Instant::now() + timeout;
        let mut ring = self.lock();
        loop {
            if let Some(frame) = ring.take() {
                return Some(frame);
            }
            if ring.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            ring = match self.signal.wait_timeout(ring, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Wake any waiting consumer and make future waits return immediately.
    pub fn close(&self) {
        self.lock().closed = true;
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Frames currently buffered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Frames dropped to overflow since creation.
    pub fn overflow_count(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for HandoffBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("overflows", &self.overflow_count())
            .finish()
    }
}
