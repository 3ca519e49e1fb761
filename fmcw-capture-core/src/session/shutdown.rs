use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::models::state::StopReason;
use crate::session::context::PipelineContext;
use crate::storage::writer_thread::{WriterOutcome, WriterThread};
use crate::traits::output_sink::OutputSink;

/// Phases of an orderly stop.
///
/// ```text
/// running → stop_requested → draining → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    StopRequested(StopReason),
    Draining,
    Stopped,
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::StopRequested(reason) => write!(f, "stop requested ({})", reason),
            Self::Draining => f.write_str("draining"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Owns the writer thread and walks it through shutdown.
///
/// The source must already be stopped before `drain` runs, otherwise the
/// ring may refill behind the drain wait. The sink is only handed back once
/// the writer has exited, so it can never be closed under a live writer.
pub struct ShutdownCoordinator<S: OutputSink + 'static> {
    context: Arc<PipelineContext>,
    writer: Option<WriterThread<S>>,
    phase: ShutdownPhase,
    wait_slice: Duration,
}

impl<S: OutputSink + 'static> ShutdownCoordinator<S> {
    pub fn new(context: Arc<PipelineContext>, writer: WriterThread<S>, wait_slice: Duration) -> Self {
        Self {
            context,
            writer: Some(writer),
            phase: ShutdownPhase::Running,
            wait_slice,
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    /// Record the stop. Only valid while running.
    pub fn request_stop(&mut self, reason: StopReason) -> Result<(), CaptureError> {
        if self.phase != ShutdownPhase::Running {
            return Err(CaptureError::InvalidState(format!(
                "cannot request stop while {}",
                self.phase
            )));
        }
        log::info!("stop requested: {}", reason);
        self.phase = ShutdownPhase::StopRequested(reason);
        Ok(())
    }

    /// Wake the writer and wait until the ring is empty or the writer is gone.
    pub fn drain(&mut self) -> Result<(), CaptureError> {
        if !matches!(self.phase, ShutdownPhase::StopRequested(_)) {
            return Err(CaptureError::InvalidState(format!(
                "cannot drain while {}",
                self.phase
            )));
        }
        self.phase = ShutdownPhase::Draining;

        let pending = self.context.ring().occupancy();
        if pending > 0 {
            log::debug!("draining {} buffered bytes", pending);
        }
        self.context.notify_data();
        self.context.wait_until_drained(self.wait_slice);
        Ok(())
    }

    /// Tell the writer to exit, wait for it and take back the sink.
    pub fn stop_writer(&mut self) -> Result<WriterOutcome<S>, CaptureError> {
        if self.phase != ShutdownPhase::Draining {
            return Err(CaptureError::InvalidState(format!(
                "cannot stop writer while {}",
                self.phase
            )));
        }
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CaptureError::InvalidState("writer already stopped".into()))?;

        self.context.request_writer_stop();
        self.context.wait_until_writer_stopped(self.wait_slice);
        let outcome = writer.join()?;

        self.phase = ShutdownPhase::Stopped;
        log::debug!(
            "writer stopped, {} bytes written",
            self.context.stats().bytes_written()
        );
        Ok(outcome)
    }

    /// Run every remaining step in order.
    pub fn shutdown(&mut self, reason: StopReason) -> Result<WriterOutcome<S>, CaptureError> {
        self.request_stop(reason)?;
        self.drain()?;
        self.stop_writer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::ring_buffer::RingBuffer;
    use crate::traits::output_sink::SinkSummary;
    use parking_lot::Mutex;
    use std::io;
    use std::thread;

    struct SlowSink {
        data: Arc<Mutex<Vec<u8>>>,
    }

    impl OutputSink for SlowSink {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            thread::sleep(Duration::from_millis(1));
            let n = bytes.len().min(7);
            self.data.lock().extend_from_slice(&bytes[..n]);
            Ok(n)
        }

        fn close(&mut self) -> Result<SinkSummary, CaptureError> {
            Ok(SinkSummary {
                total_bytes: self.data.lock().len() as u64,
                checksum: String::new(),
            })
        }
    }

    fn coordinator(capacity: usize) -> (
        ShutdownCoordinator<SlowSink>,
        crate::processing::ring_buffer::RingProducer,
        Arc<PipelineContext>,
        Arc<Mutex<Vec<u8>>>,
    ) {
        let ring = RingBuffer::new(capacity).unwrap();
        let context = Arc::new(PipelineContext::new(ring.monitor()));
        let (tx, rx) = ring.split();
        let data = Arc::new(Mutex::new(Vec::new()));
        let sink = SlowSink {
            data: Arc::clone(&data),
        };
        let writer = WriterThread::spawn(rx, sink, Arc::clone(&context), 16).unwrap();
        (
            ShutdownCoordinator::new(Arc::clone(&context), writer, Duration::from_millis(5)),
            tx,
            context,
            data,
        )
    }

    #[test]
    fn buffered_bytes_reach_sink_after_stop() {
        let (mut coordinator, mut tx, context, data) = coordinator(512);
        let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        assert_eq!(tx.write(&payload), 0);

        let mut outcome = coordinator.shutdown(StopReason::Interrupted).unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(coordinator.phase(), ShutdownPhase::Stopped);
        assert!(context.ring().is_empty());
        assert_eq!(*data.lock(), payload);
        assert_eq!(outcome.sink.close().unwrap().total_bytes, 300);
    }

    #[test]
    fn steps_must_run_in_order() {
        let (mut coordinator, _tx, _context, _data) = coordinator(64);

        assert!(matches!(coordinator.drain(), Err(CaptureError::InvalidState(_))));
        assert!(coordinator.stop_writer().is_err());

        coordinator.request_stop(StopReason::QuotaReached).unwrap();
        assert_eq!(
            coordinator.phase(),
            ShutdownPhase::StopRequested(StopReason::QuotaReached)
        );
        assert!(coordinator.request_stop(StopReason::Interrupted).is_err());

        coordinator.drain().unwrap();
        assert_eq!(coordinator.phase(), ShutdownPhase::Draining);
        coordinator.stop_writer().unwrap();
        assert!(coordinator.stop_writer().is_err());
    }

    #[test]
    fn empty_ring_stops_promptly() {
        let (mut coordinator, _tx, context, data) = coordinator(64);
        coordinator.shutdown(StopReason::SourceStopped).unwrap();
        assert!(context.flags().is_stopped());
        assert!(data.lock().is_empty());
    }
}
