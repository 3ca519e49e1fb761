use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::models::capture_result::{CaptureMetadata, CaptureResult};
use crate::models::config::CaptureConfiguration;
use crate::models::diagnostics::{CaptureDiagnostics, Throughput};
use crate::models::error::CaptureError;
use crate::models::state::{CaptureState, StopReason};
use crate::processing::ring_buffer::RingBuffer;
use crate::processing::sweep_header::SweepHeader;
use crate::session::callback::CaptureCallback;
use crate::session::context::PipelineContext;
use crate::session::shutdown::ShutdownCoordinator;
use crate::storage::file_sink::FileSink;
use crate::storage::metadata;
use crate::storage::writer_thread::WriterThread;
use crate::traits::acquisition_source::AcquisitionSource;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::output_sink::OutputSink;

/// Longest single sleep while waiting for the end of a measurement window,
/// so a cancel is noticed promptly.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Slice used by the shutdown waits.
const SHUTDOWN_WAIT_SLICE: Duration = Duration::from_millis(10);

/// Drives one capture from start to a closed file.
///
/// Data flow:
/// ```text
/// [AcquisitionSource thread] → CaptureCallback → [RingBuffer] → [writer thread] → [OutputSink]
///                                                       ↑
///                  [main thread: throughput windows, stop decisions, shutdown]
/// ```
///
/// The session itself lives on the main thread. It never touches ring bytes;
/// it only watches counters and flags, then walks the shutdown sequence:
/// stop the source, drain the ring, stop the writer, close the sink.
pub struct CaptureSession<A: AcquisitionSource> {
    source: A,
    config: CaptureConfiguration,
    state: CaptureState,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    context: Option<Arc<PipelineContext>>,
    coordinator: Option<ShutdownCoordinator<Box<dyn OutputSink>>>,
    capture_start: Option<Instant>,
    window_start: Instant,
}

impl<A: AcquisitionSource> CaptureSession<A> {
    /// Validate `config` and build an idle session around `source`.
    pub fn new(source: A, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::InvalidConfiguration)?;
        Ok(Self {
            source,
            config,
            state: CaptureState::Idle,
            delegate: None,
            context: None,
            coordinator: None,
            capture_start: None,
            window_start: Instant::now(),
        })
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    /// Live counters, or zeros before the first start.
    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.context
            .as_ref()
            .map(|c| c.stats().snapshot())
            .unwrap_or_default()
    }

    /// Bytes currently staged in the ring.
    pub fn buffered_bytes(&self) -> usize {
        self.context.as_ref().map_or(0, |c| c.ring().occupancy())
    }

    /// Open the capture file, write its header and start streaming into it.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.ensure_idle()?;
        let header = SweepHeader::from_sweep(&self.config.sweep);
        let sink = FileSink::open(
            self.config.output_path.clone(),
            &header,
            self.config.sink_buffer_size,
        )?;
        self.start_with_sink(Box::new(sink))
    }

    /// Start streaming into an already opened sink.
    ///
    /// The writer thread is running before the source is started, so the
    /// first transfer always finds a consumer.
    pub fn start_with_sink(&mut self, sink: Box<dyn OutputSink>) -> Result<(), CaptureError> {
        self.ensure_idle()?;

        let ring = RingBuffer::new(self.config.buffer_capacity)?;
        let context = Arc::new(PipelineContext::new(ring.monitor()));
        let (producer, consumer) = ring.split();

        let writer = WriterThread::spawn(
            consumer,
            sink,
            Arc::clone(&context),
            self.config.staging_size,
        )?;
        let mut coordinator =
            ShutdownCoordinator::new(Arc::clone(&context), writer, SHUTDOWN_WAIT_SLICE);

        let callback =
            CaptureCallback::new(producer, Arc::clone(&context), self.config.transfer_limit);

        if let Err(e) = self.source.start(callback.into_transfer_callback()) {
            log::error!("failed to start {}: {}", self.source.description(), e);
            match coordinator.shutdown(StopReason::SourceStopped) {
                Ok(mut outcome) => {
                    if let Err(close_err) = outcome.sink.close() {
                        log::warn!("failed to close sink after start failure: {}", close_err);
                    }
                }
                Err(stop_err) => log::warn!("failed to stop writer: {}", stop_err),
            }
            let error = match e {
                CaptureError::SourceFailed(_) => e,
                other => CaptureError::SourceFailed(other.to_string()),
            };
            self.fail(error.clone());
            return Err(error);
        }

        let now = Instant::now();
        self.capture_start = Some(now);
        self.window_start = now;
        self.context = Some(context);
        self.coordinator = Some(coordinator);

        log::info!(
            "capturing from {} to {} ({:.3} MHz sample rate)",
            self.source.description(),
            self.config.output_path.display(),
            self.config.sweep.sample_rate() / 1e6
        );
        self.set_state(CaptureState::Running { elapsed_secs: 0.0 });
        Ok(())
    }

    /// Close the current measurement window: log throughput and check every
    /// stop condition. Returns the reason the capture should end, if any.
    ///
    /// Conditions are checked in priority order: a dead writer first, then the
    /// transfer limit, then the source, then a stalled window.
    pub fn measure_window(&mut self) -> Result<Option<StopReason>, CaptureError> {
        if !self.state.is_running() {
            return Err(CaptureError::InvalidState(format!(
                "cannot measure throughput while {}",
                self.state.name()
            )));
        }
        let context = match self.context.as_ref() {
            Some(c) => Arc::clone(c),
            None => return Err(CaptureError::InvalidState("pipeline not started".into())),
        };

        let now = Instant::now();
        let throughput = Throughput {
            bytes: context.stats().take_window_bytes(),
            elapsed: now.duration_since(self.window_start),
            buffered: context.ring().occupancy(),
        };
        self.window_start = now;

        log::info!(
            "{:4.1} MiB / {:5.3} sec = {:4.1} MiB/second",
            throughput.mib(),
            throughput.elapsed.as_secs_f64(),
            throughput.mib_per_sec()
        );
        log::debug!(
            "{} bytes buffered of {}",
            throughput.buffered,
            context.ring().capacity() - 1
        );
        if let Some(delegate) = &self.delegate {
            delegate.on_throughput(&throughput);
        }
        self.set_state(CaptureState::Running {
            elapsed_secs: self.elapsed_secs(),
        });

        if context.flags().is_stopped() {
            log::error!("writer thread exited early");
            return Ok(Some(StopReason::WriterFailed));
        }
        if context.quota_reached() {
            return Ok(Some(StopReason::QuotaReached));
        }
        if !self.source.is_streaming() {
            log::info!("{} stopped streaming", self.source.description());
            return Ok(Some(StopReason::SourceStopped));
        }
        if throughput.is_stalled() {
            log::error!("Couldn't transfer any bytes for one second.");
            return Ok(Some(StopReason::Stalled));
        }
        Ok(None)
    }

    /// Sleep out the rest of the current window, then measure it.
    ///
    /// Returns `Interrupted` as soon as `cancel` is seen during the sleep.
    pub fn poll_window(&mut self, cancel: &AtomicBool) -> Result<Option<StopReason>, CaptureError> {
        let deadline = self.window_start + self.config.poll_interval;
        loop {
            if cancel.load(Ordering::Acquire) {
                return Ok(Some(StopReason::Interrupted));
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
        }
        self.measure_window()
    }

    /// Poll windows until a stop condition fires or `cancel` is set.
    pub fn run_until_stopped(&mut self, cancel: &AtomicBool) -> Result<StopReason, CaptureError> {
        loop {
            if let Some(reason) = self.poll_window(cancel)? {
                return Ok(reason);
            }
        }
    }

    /// Shut down in order and finalize the capture.
    ///
    /// The source is stopped first so nothing refills the ring, then every
    /// buffered byte is drained to the sink before the writer is told to exit.
    /// The sink is closed last, on this thread.
    pub fn stop(&mut self, reason: StopReason) -> Result<CaptureResult, CaptureError> {
        if !self.state.is_running() {
            return Err(CaptureError::InvalidState(format!(
                "cannot stop while {}",
                self.state.name()
            )));
        }
        let (Some(context), Some(mut coordinator)) = (self.context.clone(), self.coordinator.take())
        else {
            return Err(CaptureError::InvalidState("pipeline not started".into()));
        };

        self.set_state(CaptureState::StopRequested(reason));
        if let Err(e) = self.source.stop() {
            log::warn!("failed to stop {}: {}", self.source.description(), e);
        }

        coordinator.request_stop(reason)?;
        self.set_state(CaptureState::Draining);
        coordinator.drain()?;
        let outcome = match coordinator.stop_writer() {
            Ok(outcome) => outcome,
            Err(e) => {
                self.fail(e.clone());
                return Err(e);
            }
        };
        self.set_state(CaptureState::Stopped);

        let mut sink = outcome.sink;
        let summary = sink.close();
        if let Some(e) = outcome.error {
            if let Err(close_err) = summary {
                log::warn!("failed to close sink: {}", close_err);
            }
            let error = with_loss_report(e, &context.stats().snapshot());
            self.fail(error.clone());
            return Err(error);
        }
        let summary = match summary {
            Ok(summary) => summary,
            Err(e) => {
                self.fail(e.clone());
                return Err(e);
            }
        };

        let stats = context.stats().snapshot();
        let duration_secs = self.elapsed_secs();
        let file_path = self.config.output_path.clone();
        let metadata = CaptureMetadata::new(
            &self.config.sweep,
            &file_path.to_string_lossy(),
            &summary.checksum,
            duration_secs,
            stats.bytes_written,
            reason,
        );
        if self.config.write_metadata {
            self.write_sidecar(&metadata, &file_path);
        }

        let result = CaptureResult {
            file_path,
            duration_secs,
            stop_reason: reason,
            data_bytes: stats.bytes_written,
            file_bytes: summary.total_bytes,
            dropped_bytes: stats.bytes_dropped,
            overflow_events: stats.overflow_events,
            checksum: summary.checksum,
            metadata,
        };
        log::info!(
            "capture finished ({}): {} bytes in {:.1} sec",
            reason,
            result.data_bytes,
            result.duration_secs
        );

        self.set_state(CaptureState::Completed(Box::new(result.clone())));
        if let Some(delegate) = &self.delegate {
            delegate.on_capture_finished(&result);
        }
        Ok(result)
    }

    /// Start, run until a stop condition or `cancel`, then stop.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<CaptureResult, CaptureError> {
        self.start()?;
        let reason = self.run_until_stopped(cancel)?;
        self.stop(reason)
    }

    // --- Internal helpers ---

    fn ensure_idle(&self) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            return Err(CaptureError::InvalidState(format!(
                "can only start from idle, session is {}",
                self.state.name()
            )));
        }
        Ok(())
    }

    fn elapsed_secs(&self) -> f64 {
        self.capture_start
            .map_or(0.0, |start| start.elapsed().as_secs_f64())
    }

    fn write_sidecar(&self, metadata: &CaptureMetadata, capture_path: &Path) {
        match metadata::write_metadata(metadata, capture_path) {
            Ok(path) => log::debug!("wrote metadata to {}", path.display()),
            Err(e) => {
                log::warn!("{}", e);
                if let Some(delegate) = &self.delegate {
                    delegate.on_error(&e);
                }
            }
        }
    }

    fn fail(&mut self, error: CaptureError) {
        if let Some(delegate) = &self.delegate {
            delegate.on_error(&error);
        }
        self.set_state(CaptureState::Failed(error));
    }

    fn set_state(&mut self, new_state: CaptureState) {
        log::trace!("session {} -> {}", self.state.name(), new_state.name());
        self.state = new_state;
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&self.state);
        }
    }
}

/// Append what the failed writer left behind to a sink error.
fn with_loss_report(error: CaptureError, stats: &CaptureDiagnostics) -> CaptureError {
    let unwritten = stats.bytes_accepted.saturating_sub(stats.bytes_written) + stats.bytes_dropped;
    match error {
        CaptureError::SinkWrite(msg) => CaptureError::SinkWrite(format!(
            "{} ({} bytes not written, {} dropped, {} overflow events)",
            msg, unwritten, stats.bytes_dropped, stats.overflow_events
        )),
        other => other,
    }
}

impl<A: AcquisitionSource> Drop for CaptureSession<A> {
    fn drop(&mut self) {
        if self.state.is_running() {
            log::warn!("capture session dropped while running, stopping");
            if let Err(e) = self.stop(StopReason::Interrupted) {
                log::error!("failed to stop capture on drop: {}", e);
            }
        }
    }
}
