use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::SweepParameters;
use super::state::StopReason;

/// Result returned when a capture session has shut down and closed its sink.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub stop_reason: StopReason,
    /// Sample bytes written after the header.
    pub data_bytes: u64,
    /// Total file size, header included.
    pub file_bytes: u64,
    /// Bytes dropped after the writer failed. Zero on a clean shutdown.
    pub dropped_bytes: u64,
    pub overflow_events: u64,
    pub checksum: String,
    pub metadata: CaptureMetadata,
}

/// Metadata stored alongside a capture.
///
/// Serializable for the JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub id: String,
    pub created_at: String,
    pub file_path: String,
    pub checksum: String,
    pub duration_secs: f64,
    pub data_bytes: u64,
    pub sample_rate_hz: f64,
    pub start_frequency_hz: f64,
    pub bandwidth_hz: f64,
    pub sweep_time_secs: f64,
    pub delay_clocks: i32,
    pub gain: u8,
    pub clock_divider: u32,
    pub stop_reason: String,
}

impl CaptureMetadata {
    pub fn new(
        sweep: &SweepParameters,
        file_path: &str,
        checksum: &str,
        duration_secs: f64,
        data_bytes: u64,
        stop_reason: StopReason,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            duration_secs,
            data_bytes,
            sample_rate_hz: sweep.sample_rate(),
            start_frequency_hz: sweep.start_frequency_hz,
            bandwidth_hz: sweep.bandwidth_hz,
            sweep_time_secs: sweep.sweep_time_secs,
            delay_clocks: sweep.delay_clocks,
            gain: sweep.gain,
            clock_divider: sweep.clock_divider,
            stop_reason: stop_reason.to_string(),
        }
    }
}
