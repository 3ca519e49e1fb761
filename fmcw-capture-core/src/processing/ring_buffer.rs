//! Fixed-capacity single-producer/single-consumer byte ring.
//!
//! The ring uses two indices: `head` (next write position, owned by the
//! producer) and `tail` (next read position, owned by the consumer). One slot
//! is kept free so that `head == tail` always means empty, which leaves
//! `capacity - 1` bytes usable for data.
//!
//! The producer publishes `head` with release ordering after copying, the
//! consumer publishes `tail` the same way, so the byte copy itself never takes
//! a lock.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;

struct Storage {
    data: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: the producer only writes bytes in the free region `[head, tail - 1)`
// and the consumer only reads bytes in the filled region `[tail, head)`. Each
// index has exactly one writer (enforced by the non-Clone handles), and an
// index is published with Release only after the bytes it covers are copied.
unsafe impl Sync for Storage {}

impl Storage {
    fn filled(&self, head: usize, tail: usize) -> usize {
        (head + self.capacity - tail) % self.capacity
    }

    fn occupancy(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        self.filled(head, tail)
    }

    /// Base pointer of the byte slots, valid for `capacity` bytes.
    fn slots(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.data.as_ptr())
    }
}

/// Circular byte buffer shared between one producer and one consumer.
///
/// Create it, take a [`RingMonitor`] for anyone who only needs occupancy, then
/// [`split`](Self::split) it into the producer and consumer halves.
pub struct RingBuffer {
    storage: Arc<Storage>,
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes (`capacity - 1` usable).
    pub fn new(capacity: usize) -> Result<Self, CaptureError> {
        if capacity < 2 {
            return Err(CaptureError::InvalidConfiguration(format!(
                "ring capacity must be at least 2 bytes, got {}",
                capacity
            )));
        }
        let data: Box<[UnsafeCell<u8>]> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Ok(Self {
            storage: Arc::new(Storage {
                data,
                capacity,
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }

    /// Bytes that can be buffered at once.
    pub fn usable_capacity(&self) -> usize {
        self.storage.capacity - 1
    }

    pub fn occupancy(&self) -> usize {
        self.storage.occupancy()
    }

    pub fn monitor(&self) -> RingMonitor {
        RingMonitor {
            storage: Arc::clone(&self.storage),
        }
    }

    /// Hand out the write and read halves. Each half can move to its own thread.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        (
            RingProducer {
                storage: Arc::clone(&self.storage),
            },
            RingConsumer {
                storage: self.storage,
            },
        )
    }
}

/// Read-only view of a ring's fill level, usable from any thread.
#[derive(Clone)]
pub struct RingMonitor {
    storage: Arc<Storage>,
}

impl RingMonitor {
    pub fn occupancy(&self) -> usize {
        self.storage.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }
}

/// Write half of a [`RingBuffer`]. Owns `head`.
pub struct RingProducer {
    storage: Arc<Storage>,
}

impl RingProducer {
    /// Copy as much of `data` as fits and return the number of bytes that
    /// could NOT be stored. Never blocks.
    ///
    /// Free space is checked, and checked once more if it looks short, before
    /// giving up on the remainder. Retrying later with only the returned tail
    /// of `data` continues the stream without gaps or duplicates.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        let s = &*self.storage;
        let cap = s.capacity;
        let head = s.head.load(Ordering::Relaxed);

        let mut free = cap - 1 - s.filled(head, s.tail.load(Ordering::Acquire));
        if free < data.len() {
            free = cap - 1 - s.filled(head, s.tail.load(Ordering::Acquire));
        }

        let count = free.min(data.len());
        if count > 0 {
            let first = count.min(cap - head);
            // SAFETY: `count` bytes starting at `head` (wrapping) lie in the free
            // region, which the consumer never reads until `head` is published.
            unsafe {
                let slots = s.slots();
                ptr::copy_nonoverlapping(data.as_ptr(), slots.add(head), first);
                ptr::copy_nonoverlapping(data.as_ptr().add(first), slots, count - first);
            }
            s.head.store((head + count) % cap, Ordering::Release);
        }
        data.len() - count
    }

    pub fn free_space(&self) -> usize {
        self.storage.capacity - 1 - self.storage.occupancy()
    }

    pub fn occupancy(&self) -> usize {
        self.storage.occupancy()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity
    }
}

/// Read half of a [`RingBuffer`]. Owns `tail`.
pub struct RingConsumer {
    storage: Arc<Storage>,
}

impl RingConsumer {
    /// Copy up to `dest.len()` buffered bytes into `dest`, oldest first.
    /// Returns 0 when the ring is empty. Never blocks.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        let s = &*self.storage;
        let cap = s.capacity;
        let tail = s.tail.load(Ordering::Relaxed);
        let head = s.head.load(Ordering::Acquire);

        let count = s.filled(head, tail).min(dest.len());
        if count == 0 {
            return 0;
        }
        let first = count.min(cap - tail);
        // SAFETY: `count` bytes starting at `tail` (wrapping) were published by
        // the producer's Release store of `head`, and it will not overwrite them
        // until `tail` moves past.
        unsafe {
            let slots = s.slots();
            ptr::copy_nonoverlapping(slots.add(tail), dest.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(slots, dest.as_mut_ptr().add(first), count - first);
        }
        s.tail.store((tail + count) % cap, Ordering::Release);
        count
    }

    pub fn occupancy(&self) -> usize {
        self.storage.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }
}
