use crate::models::error::CaptureError;

/// What the transfer callback tells the acquisition source to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferControl {
    Continue,
    /// Stop invoking the callback. The source should wind down streaming.
    Stop,
}

/// Callback invoked with each filled transfer buffer.
///
/// Runs on the source's own thread, synchronously, on the time-critical path.
/// It must return quickly and must not block on I/O.
pub type TransferCallback = Box<dyn FnMut(&[u8]) -> TransferControl + Send + 'static>;

/// Interface for sample sources that push fixed-size transfers.
///
/// The radio driver is one implementation; the CLI ships a synthetic
/// generator, and the tests use scripted sources.
pub trait AcquisitionSource: Send {
    /// Start streaming, delivering transfers to `callback`.
    ///
    /// After the callback returns [`TransferControl::Stop`] the source must
    /// not invoke it again.
    fn start(&mut self, callback: TransferCallback) -> Result<(), CaptureError>;

    /// Liveness query, polled by the main thread once per measurement window.
    fn is_streaming(&self) -> bool;

    /// Stop streaming and release the device. Idempotent.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Human-readable description for log lines.
    fn description(&self) -> String;
}
