use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Live counters shared by the callback, the writer and the main thread.
///
/// Every counter is monotonic except `window_bytes`, which the main thread
/// swaps back to zero once per measurement window.
#[derive(Debug, Default)]
pub struct CaptureStats {
    transfers: AtomicU64,
    bytes_received: AtomicU64,
    bytes_accepted: AtomicU64,
    bytes_written: AtomicU64,
    bytes_dropped: AtomicU64,
    overflow_events: AtomicU64,
    window_bytes: AtomicU64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer of `len` valid bytes arrived at the callback.
    pub fn record_transfer(&self, len: usize) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
        self.window_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_accepted(&self, len: usize) {
        self.bytes_accepted.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_written(&self, len: usize) {
        self.bytes_written.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, len: usize) {
        self.bytes_dropped.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.overflow_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes received since the previous call.
    pub fn take_window_bytes(&self) -> u64 {
        self.window_bytes.swap(0, Ordering::Relaxed)
    }

    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            transfers: self.transfers.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_accepted: self.bytes_accepted.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            overflow_events: self.overflow_events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CaptureStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureDiagnostics {
    pub transfers: u64,
    pub bytes_received: u64,
    pub bytes_accepted: u64,
    pub bytes_written: u64,
    pub bytes_dropped: u64,
    pub overflow_events: u64,
}

/// Throughput over one measurement window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub bytes: u64,
    pub elapsed: Duration,
    /// Ring occupancy at the end of the window.
    pub buffered: usize,
}

impl Throughput {
    pub fn mib(&self) -> f64 {
        self.bytes as f64 / MIB
    }

    pub fn mib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.mib() / secs
    }

    pub fn is_stalled(&self) -> bool {
        self.bytes == 0
    }
}
