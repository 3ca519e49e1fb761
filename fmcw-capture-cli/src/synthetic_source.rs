use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fmcw_capture_core::{AcquisitionSource, CaptureError, TransferCallback, TransferControl};

/// Size of one USB transfer from the receiver.
pub const TRANSFER_SIZE: usize = 262_144;

/// Fewest transfers per second the source delivers, so every measurement
/// window sees data even at low rates.
const MIN_TRANSFERS_PER_SEC: f64 = 4.0;

/// Longest single pacing sleep before the halt flag is checked again.
const PACE_SLICE: Duration = Duration::from_millis(50);

/// Transfer size for a byte rate: full USB transfers when the rate allows,
/// smaller ones otherwise.
pub fn transfer_size_for(byte_rate: f64) -> usize {
    let per_transfer = byte_rate / MIN_TRANSFERS_PER_SEC;
    if per_transfer >= TRANSFER_SIZE as f64 {
        TRANSFER_SIZE
    } else {
        (per_transfer as usize).max(1)
    }
}

/// Stand-in for the radio: pushes ramp-filled transfers at a fixed byte rate
/// from its own thread, the way the driver's USB completion thread does.
pub struct SyntheticSource {
    transfer_size: usize,
    byte_rate: f64,
    streaming: Arc<AtomicBool>,
    halt: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(byte_rate: f64) -> Self {
        Self::with_transfer_size(byte_rate, transfer_size_for(byte_rate))
    }

    pub fn with_transfer_size(byte_rate: f64, transfer_size: usize) -> Self {
        Self {
            transfer_size,
            byte_rate,
            streaming: Arc::new(AtomicBool::new(false)),
            halt: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl AcquisitionSource for SyntheticSource {
    fn start(&mut self, mut callback: TransferCallback) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::SourceFailed("already streaming".into()));
        }
        self.halt.store(false, Ordering::Release);
        self.streaming.store(true, Ordering::Release);

        let streaming = Arc::clone(&self.streaming);
        let halt = Arc::clone(&self.halt);
        let transfer_size = self.transfer_size;
        let byte_rate = self.byte_rate;

        let spawned = thread::Builder::new()
            .name("fmcw-acquisition".into())
            .spawn(move || {
                let mut buffer = vec![0u8; transfer_size];
                let mut counter: u8 = 0;
                let mut sent: u64 = 0;
                let started = Instant::now();

                while !halt.load(Ordering::Acquire) {
                    for byte in buffer.iter_mut() {
                        *byte = counter;
                        counter = counter.wrapping_add(1);
                    }
                    if callback(&buffer) == TransferControl::Stop {
                        log::debug!("callback asked the source to stop");
                        break;
                    }
                    sent += transfer_size as u64;

                    let due = Duration::from_secs_f64(sent as f64 / byte_rate);
                    while !halt.load(Ordering::Acquire) {
                        match due.checked_sub(started.elapsed()) {
                            Some(wait) if !wait.is_zero() => thread::sleep(wait.min(PACE_SLICE)),
                            _ => break,
                        }
                    }
                }
                streaming.store(false, Ordering::Release);
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                log::info!(
                    "synthetic source streaming {} byte transfers at {:.1} MB/s",
                    transfer_size,
                    byte_rate / 1e6
                );
                Ok(())
            }
            Err(e) => {
                self.streaming.store(false, Ordering::Release);
                Err(CaptureError::Thread(format!(
                    "failed to spawn acquisition thread: {}",
                    e
                )))
            }
        }
    }

    fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.halt.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| CaptureError::SourceFailed("acquisition thread panicked".into()))?;
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("synthetic source ({:.1} MB/s)", self.byte_rate / 1e6)
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn delivers_ramp_until_stop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut source = SyntheticSource::with_transfer_size(1e9, 100);

        source
            .start(Box::new(move |bytes: &[u8]| {
                let mut seen = sink.lock().unwrap();
                seen.extend_from_slice(bytes);
                if seen.len() >= 500 {
                    TransferControl::Stop
                } else {
                    TransferControl::Continue
                }
            }))
            .unwrap();

        for _ in 0..1000 {
            if !source.is_streaming() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!source.is_streaming());
        source.stop().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 500);
        assert!(seen.iter().enumerate().all(|(i, &b)| b == (i % 256) as u8));
    }

    #[test]
    fn stop_halts_streaming() {
        let mut source = SyntheticSource::with_transfer_size(1e6, 1000);
        source
            .start(Box::new(|_: &[u8]| TransferControl::Continue))
            .unwrap();
        assert!(source.is_streaming());
        assert!(source.start(Box::new(|_: &[u8]| TransferControl::Continue)).is_err());

        source.stop().unwrap();
        assert!(!source.is_streaming());
        source.stop().unwrap();
    }

    #[test]
    fn stop_interrupts_a_long_pacing_wait() {
        // One transfer per second: the thread is asleep after the first.
        let mut source = SyntheticSource::with_transfer_size(1000.0, 1000);
        source
            .start(Box::new(|_: &[u8]| TransferControl::Continue))
            .unwrap();
        thread::sleep(Duration::from_millis(20));

        let begun = Instant::now();
        source.stop().unwrap();
        assert!(begun.elapsed() < Duration::from_millis(500));
        assert!(!source.is_streaming());
    }

    #[test]
    fn slow_rates_use_smaller_transfers() {
        assert_eq!(transfer_size_for(10.2e6), TRANSFER_SIZE);
        assert_eq!(transfer_size_for(4.0 * TRANSFER_SIZE as f64), TRANSFER_SIZE);
        assert_eq!(transfer_size_for(100_000.0), 25_000);
        assert_eq!(transfer_size_for(2.0), 1);
    }

    #[test]
    fn slow_source_feeds_every_window() {
        let seen = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&seen);
        let mut source = SyntheticSource::new(40_000.0);
        source
            .start(Box::new(move |bytes: &[u8]| {
                *counter.lock().unwrap() += bytes.len();
                TransferControl::Continue
            }))
            .unwrap();
        thread::sleep(Duration::from_millis(300));
        source.stop().unwrap();

        // 10_000 byte transfers every 250 ms; a full USB transfer would take 6.5 s.
        let seen = *seen.lock().unwrap();
        assert!(seen >= 10_000, "{}", seen);
        assert_eq!(seen % 10_000, 0);
    }
}
