use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::models::diagnostics::CaptureStats;
use crate::processing::ring_buffer::{RingConsumer, RingMonitor};

/// Writer lifecycle flags, written by one side and read by the other.
#[derive(Debug, Default)]
pub struct LifecycleFlags {
    stop_requested: AtomicBool,
    stopped: AtomicBool,
}

impl LifecycleFlags {
    /// The writer should exit once the ring is empty.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// The writer has left its loop.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// Everything the producer callback, the writer thread and the main thread
/// share for one capture.
///
/// The mutex guards the park/wake protocol only. Ring bytes are copied
/// without it.
pub struct PipelineContext {
    ring: RingMonitor,
    wake_lock: Mutex<()>,
    /// Signalled by the producer after every push, and by `request_writer_stop`.
    data_ready: Condvar,
    /// Signalled by the writer when the ring runs empty and when it exits.
    drained: Condvar,
    flags: LifecycleFlags,
    quota_reached: AtomicBool,
    stats: CaptureStats,
}

impl PipelineContext {
    pub fn new(ring: RingMonitor) -> Self {
        Self {
            ring,
            wake_lock: Mutex::new(()),
            data_ready: Condvar::new(),
            drained: Condvar::new(),
            flags: LifecycleFlags::default(),
            quota_reached: AtomicBool::new(false),
            stats: CaptureStats::new(),
        }
    }

    pub fn ring(&self) -> &RingMonitor {
        &self.ring
    }

    pub fn flags(&self) -> &LifecycleFlags {
        &self.flags
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn quota_reached(&self) -> bool {
        self.quota_reached.load(Ordering::Acquire)
    }

    pub(crate) fn mark_quota_reached(&self) {
        self.quota_reached.store(true, Ordering::Release);
    }

    /// Wake the writer if it is parked.
    pub(crate) fn notify_data(&self) {
        let _guard = self.wake_lock.lock();
        self.data_ready.notify_one();
    }

    /// Park the writer until the ring has data or a stop is requested.
    ///
    /// Returns `true` when the writer should exit: stop requested and the ring
    /// still empty after the re-check under the lock.
    pub(crate) fn park_writer(&self, consumer: &RingConsumer) -> bool {
        let mut guard = self.wake_lock.lock();
        while consumer.is_empty() && !self.flags.stop_requested() {
            self.data_ready.wait(&mut guard);
        }
        consumer.is_empty() && self.flags.stop_requested()
    }

    pub(crate) fn notify_drained(&self) {
        let _guard = self.wake_lock.lock();
        self.drained.notify_all();
    }

    pub(crate) fn request_writer_stop(&self) {
        let _guard = self.wake_lock.lock();
        self.flags.request_stop();
        self.data_ready.notify_one();
    }

    pub(crate) fn mark_writer_stopped(&self) {
        let _guard = self.wake_lock.lock();
        self.flags.mark_stopped();
        self.drained.notify_all();
    }

    /// Block until the ring is empty or the writer has exited.
    ///
    /// Waits in slices of `slice` so a missed signal costs at most one slice.
    pub(crate) fn wait_until_drained(&self, slice: Duration) {
        let mut guard = self.wake_lock.lock();
        while !self.ring.is_empty() && !self.flags.is_stopped() {
            self.drained.wait_for(&mut guard, slice);
        }
    }

    /// Block until the writer has left its loop.
    pub(crate) fn wait_until_writer_stopped(&self, slice: Duration) {
        let mut guard = self.wake_lock.lock();
        while !self.flags.is_stopped() {
            self.drained.wait_for(&mut guard, slice);
        }
    }
}
