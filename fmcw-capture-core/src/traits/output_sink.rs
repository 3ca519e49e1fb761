use std::io;

use crate::models::error::CaptureError;

/// What a sink reports once it has been flushed and closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    /// Bytes in the finished output, header included.
    pub total_bytes: u64,
    /// Hex SHA-256 of the finished output, if the sink computes one.
    pub checksum: String,
}

/// Append-only destination of the writer thread.
///
/// Owned by the writer thread from spawn until it exits, then handed back to
/// the session, which closes it.
pub trait OutputSink: Send {
    /// Write some prefix of `bytes`, returning how many were taken.
    ///
    /// Partial writes are allowed; the writer retries with the remainder.
    /// `Ok(0)` for a non-empty slice means the sink can make no progress.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Flush and close. Called exactly once, after the writer has exited.
    fn close(&mut self) -> Result<SinkSummary, CaptureError>;
}

impl<T: OutputSink + ?Sized> OutputSink for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        (**self).write(bytes)
    }

    fn close(&mut self) -> Result<SinkSummary, CaptureError> {
        (**self).close()
    }
}
