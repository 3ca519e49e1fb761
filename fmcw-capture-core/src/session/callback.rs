use std::sync::Arc;
use std::thread;

use crate::processing::ring_buffer::RingProducer;
use crate::session::context::PipelineContext;
use crate::traits::acquisition_source::{TransferCallback, TransferControl};

/// Optional cap on the total bytes pushed into the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferQuota {
    remaining: u64,
}

impl TransferQuota {
    pub fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Claim up to `len` bytes of the quota; returns how many were granted.
    pub fn take(&mut self, len: usize) -> usize {
        let granted = (len as u64).min(self.remaining);
        self.remaining -= granted;
        granted as usize
    }
}

/// Producer side of the pipeline, run on the acquisition source's thread.
///
/// Pushes each transfer into the ring and wakes the writer. It never touches
/// the sink. When the ring is full it spins until the writer makes room,
/// stalling the source rather than dropping bytes; it gives up only if the
/// writer has exited.
pub struct CaptureCallback {
    producer: RingProducer,
    context: Arc<PipelineContext>,
    quota: Option<TransferQuota>,
    finished: bool,
}

impl CaptureCallback {
    pub fn new(
        producer: RingProducer,
        context: Arc<PipelineContext>,
        transfer_limit: Option<u64>,
    ) -> Self {
        Self {
            producer,
            context,
            quota: transfer_limit.map(TransferQuota::new),
            finished: false,
        }
    }

    pub fn quota(&self) -> Option<&TransferQuota> {
        self.quota.as_ref()
    }

    /// Handle one filled transfer buffer.
    pub fn on_transfer(&mut self, buffer: &[u8]) -> TransferControl {
        if self.finished {
            return TransferControl::Stop;
        }
        self.context.stats().record_transfer(buffer.len());

        let bytes_to_write = match self.quota.as_mut() {
            Some(quota) => quota.take(buffer.len()),
            None => buffer.len(),
        };
        let left = self.push(&buffer[..bytes_to_write]);

        self.context.notify_data();

        let quota_done = self.quota.is_some_and(|q| q.is_exhausted());
        if quota_done {
            self.context.mark_quota_reached();
        }
        if left > 0 || quota_done {
            self.finished = true;
            return TransferControl::Stop;
        }
        TransferControl::Continue
    }

    /// Push `chunk`, spinning on overflow. Returns the bytes left unwritten,
    /// which is non-zero only if the writer exited mid-retry.
    fn push(&mut self, chunk: &[u8]) -> usize {
        let mut left = self.producer.write(chunk);

        if left > 0 {
            let stats = self.context.stats();
            stats.record_overflow();
            log::warn!(
                "buffer full: {} of {} bytes waiting for the writer",
                left,
                chunk.len()
            );
            self.context.notify_data();

            while left > 0 {
                if self.context.flags().is_stopped() {
                    log::error!("writer has exited, dropping {} bytes", left);
                    stats.record_dropped(left);
                    break;
                }
                thread::yield_now();
                left = self.producer.write(&chunk[chunk.len() - left..]);
            }
        }

        self.context.stats().record_accepted(chunk.len() - left);
        left
    }

    /// Box the callback for [`AcquisitionSource::start`](crate::traits::acquisition_source::AcquisitionSource::start).
    pub fn into_transfer_callback(mut self) -> TransferCallback {
        Box::new(move |buffer: &[u8]| self.on_transfer(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::{RingBuffer, RingConsumer};
    use std::time::Duration;

    fn pipeline(capacity: usize, limit: Option<u64>) -> (CaptureCallback, RingConsumer, Arc<PipelineContext>) {
        let ring = RingBuffer::new(capacity).unwrap();
        let context = Arc::new(PipelineContext::new(ring.monitor()));
        let (tx, rx) = ring.split();
        (CaptureCallback::new(tx, Arc::clone(&context), limit), rx, context)
    }

    #[test]
    fn quota_take_is_bounded() {
        let mut quota = TransferQuota::new(10);
        assert_eq!(quota.take(4), 4);
        assert_eq!(quota.take(100), 6);
        assert!(quota.is_exhausted());
        assert_eq!(quota.take(5), 0);
    }

    #[test]
    fn continues_without_quota() {
        let (mut callback, rx, context) = pipeline(1024, None);
        assert_eq!(callback.on_transfer(&[1; 100]), TransferControl::Continue);
        assert_eq!(callback.on_transfer(&[2; 100]), TransferControl::Continue);
        assert_eq!(rx.occupancy(), 200);
        assert_eq!(context.stats().bytes_accepted(), 200);
        assert!(!context.quota_reached());
    }

    #[test]
    fn quota_truncates_chunk_and_stops() {
        let (mut callback, mut rx, context) = pipeline(20_000, Some(10_000));
        let chunk: Vec<u8> = (0..12_000).map(|i| (i % 256) as u8).collect();

        assert_eq!(callback.on_transfer(&chunk), TransferControl::Stop);
        assert!(context.quota_reached());
        assert_eq!(callback.quota().unwrap().remaining(), 0);

        let mut out = vec![0u8; 20_000];
        let n = rx.read(&mut out);
        assert_eq!(n, 10_000);
        assert_eq!(&out[..n], &chunk[..10_000]);

        // The source must stop after Stop, but a stray call is harmless.
        assert_eq!(callback.on_transfer(&chunk), TransferControl::Stop);
        assert!(rx.is_empty());
        assert_eq!(context.stats().snapshot().bytes_received, 12_000);
    }

    #[test]
    fn quota_spanning_several_chunks() {
        let (mut callback, rx, _context) = pipeline(4096, Some(250));
        assert_eq!(callback.on_transfer(&[0; 100]), TransferControl::Continue);
        assert_eq!(callback.on_transfer(&[0; 100]), TransferControl::Continue);
        assert_eq!(callback.on_transfer(&[0; 100]), TransferControl::Stop);
        assert_eq!(rx.occupancy(), 250);
    }

    #[test]
    fn overflow_spins_until_consumer_makes_room() {
        let (mut callback, mut rx, context) = pipeline(64, None);
        assert_eq!(callback.on_transfer(&[1; 60]), TransferControl::Continue);

        let drainer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let mut seen = Vec::new();
            let mut scratch = [0u8; 16];
            while seen.len() < 100 {
                let n = rx.read(&mut scratch);
                seen.extend_from_slice(&scratch[..n]);
                thread::yield_now();
            }
            seen
        });

        assert_eq!(callback.on_transfer(&[2; 40]), TransferControl::Continue);
        let seen = drainer.join().unwrap();

        assert_eq!(&seen[..60], &[1u8; 60][..]);
        assert_eq!(&seen[60..], &[2u8; 40][..]);
        let snapshot = context.stats().snapshot();
        assert_eq!(snapshot.overflow_events, 1);
        assert_eq!(snapshot.bytes_dropped, 0);
        assert_eq!(snapshot.bytes_accepted, 100);
    }

    #[test]
    fn overflow_gives_up_when_writer_is_gone() {
        let (mut callback, _rx, context) = pipeline(16, None);
        context.mark_writer_stopped();

        assert_eq!(callback.on_transfer(&[5; 20]), TransferControl::Stop);
        let snapshot = context.stats().snapshot();
        assert_eq!(snapshot.bytes_accepted, 15);
        assert_eq!(snapshot.bytes_dropped, 5);
    }
}
