//! Dedicated thread draining the ring into the output sink.
//!
//! The writer parks on the context's condition variable while the ring is
//! empty, drains at most one staging buffer per wake-up, and pushes every
//! drained byte to the sink before reading again. It exits only when a stop
//! has been requested and the ring is empty, so nothing the producer managed
//! to push is left behind.

use std::io;
use std::sync::Arc;
use std::thread;

use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingConsumer;
use crate::session::context::PipelineContext;
use crate::traits::output_sink::OutputSink;

/// What the writer hands back when it exits.
pub struct WriterOutcome<S> {
    /// The sink, still open. Closing it is the caller's job.
    pub sink: S,
    /// Set when the writer stopped on an unrecoverable sink error.
    pub error: Option<CaptureError>,
}

/// Handle to the running writer thread.
pub struct WriterThread<S: OutputSink + 'static> {
    handle: Option<thread::JoinHandle<WriterOutcome<S>>>,
}

impl<S: OutputSink + 'static> WriterThread<S> {
    /// Spawn the writer. It takes exclusive ownership of `consumer` and `sink`.
    pub fn spawn(
        consumer: RingConsumer,
        sink: S,
        context: Arc<PipelineContext>,
        staging_size: usize,
    ) -> Result<Self, CaptureError> {
        let handle = thread::Builder::new()
            .name("fmcw-writer".into())
            .spawn(move || run(consumer, sink, &context, staging_size))
            .map_err(|e| CaptureError::Thread(format!("failed to spawn writer thread: {}", e)))?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread to exit and take back the sink.
    pub fn join(mut self) -> Result<WriterOutcome<S>, CaptureError> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| CaptureError::Thread("writer thread already joined".into()))?;
        handle
            .join()
            .map_err(|_| CaptureError::Thread("writer thread panicked".into()))
    }
}

/// Sets `stopped` on every exit path, unwinding included, so the main thread
/// never waits on a writer that is gone.
struct StoppedOnExit<'a>(&'a PipelineContext);

impl Drop for StoppedOnExit<'_> {
    fn drop(&mut self) {
        self.0.mark_writer_stopped();
    }
}

fn run<S: OutputSink>(
    mut consumer: RingConsumer,
    mut sink: S,
    context: &PipelineContext,
    staging_size: usize,
) -> WriterOutcome<S> {
    let _stopped = StoppedOnExit(context);
    let mut staging = vec![0u8; staging_size];
    log::debug!("writer started, staging {} bytes", staging_size);

    let error = loop {
        if context.park_writer(&consumer) {
            break None;
        }

        let count = consumer.read(&mut staging);
        if count == 0 {
            continue;
        }
        if let Err(e) = write_chunk(&mut sink, &staging[..count]) {
            log::error!("writer stopping: {}", e);
            break Some(e);
        }
        context.stats().record_written(count);

        if consumer.is_empty() {
            context.notify_drained();
        }
    };

    log::debug!(
        "writer exiting, {} bytes written",
        context.stats().bytes_written()
    );
    WriterOutcome { sink, error }
}

/// Push all of `chunk` to the sink, retrying partial writes.
///
/// Interrupted writes are retried; a write that makes no progress, or any
/// other error, is fatal.
pub(crate) fn write_chunk<S: OutputSink + ?Sized>(
    sink: &mut S,
    chunk: &[u8],
) -> Result<(), CaptureError> {
    let mut written = 0;
    while written < chunk.len() {
        match sink.write(&chunk[written..]) {
            Ok(0) => {
                return Err(CaptureError::SinkWrite(format!(
                    "sink accepted no bytes with {} of {} pending",
                    chunk.len() - written,
                    chunk.len()
                )))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CaptureError::SinkWrite(e.to_string())),
        }
    }
    Ok(())
}
