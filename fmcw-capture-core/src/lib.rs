//! # fmcw-capture-core
//!
//! Streaming capture core for an FMCW radar receiver.
//!
//! Moves raw sample bytes from a time-critical acquisition callback to a
//! capture file without blocking the callback on disk I/O and without losing
//! bytes on shutdown. Acquisition backends (the radio driver, synthetic
//! generators) implement the `AcquisitionSource` trait and plug into the
//! generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! fmcw-capture-core (this crate)
//! ├── traits/       ← AcquisitionSource, OutputSink, CaptureDelegate
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, CaptureStats, etc.
//! ├── processing/   ← lock-free SPSC RingBuffer, FMCW file header
//! ├── session/      ← CaptureCallback, PipelineContext, ShutdownCoordinator, CaptureSession
//! └── storage/      ← WriterThread, FileSink, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::capture_result::{CaptureMetadata, CaptureResult};
pub use models::config::{CaptureConfiguration, SweepParameters};
pub use models::diagnostics::{CaptureDiagnostics, CaptureStats, Throughput};
pub use models::error::CaptureError;
pub use models::state::{CaptureState, StopReason};
pub use processing::ring_buffer::{RingBuffer, RingConsumer, RingMonitor, RingProducer};
pub use processing::sweep_header::{SweepHeader, SWEEP_HEADER_SIZE};
pub use session::callback::{CaptureCallback, TransferQuota};
pub use session::capture::CaptureSession;
pub use session::context::PipelineContext;
pub use session::shutdown::{ShutdownCoordinator, ShutdownPhase};
pub use storage::file_sink::FileSink;
pub use storage::writer_thread::{WriterOutcome, WriterThread};
pub use traits::acquisition_source::{AcquisitionSource, TransferCallback, TransferControl};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::output_sink::{OutputSink, SinkSummary};
