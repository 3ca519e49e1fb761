use std::fs;
use std::path::{Path, PathBuf};

use crate::models::capture_result::CaptureMetadata;
use crate::models::error::CaptureError;

/// Path of the JSON sidecar for a capture: `{capture_path}.json`.
pub fn metadata_path(capture_path: &Path) -> PathBuf {
    let mut name = capture_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// Write capture metadata as a JSON sidecar file next to the capture.
pub fn write_metadata(metadata: &CaptureMetadata, capture_path: &Path) -> Result<PathBuf, CaptureError> {
    let path = metadata_path(capture_path);
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

/// Read capture metadata from a JSON sidecar file.
pub fn read_metadata(capture_path: &Path) -> Result<CaptureMetadata, CaptureError> {
    let json = fs::read_to_string(metadata_path(capture_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::SweepParameters;
    use crate::models::state::StopReason;

    #[test]
    fn sidecar_keeps_full_file_name() {
        let path = Path::new("/data/run.2024.fmcw");
        assert_eq!(metadata_path(path), PathBuf::from("/data/run.2024.fmcw.json"));
    }

    #[test]
    fn write_then_read_sidecar() {
        let capture = std::env::temp_dir().join(format!("fmcw_meta_{}.fmcw", std::process::id()));
        let metadata = CaptureMetadata::new(
            &SweepParameters::default(),
            &capture.to_string_lossy(),
            "abc123",
            2.5,
            4096,
            StopReason::QuotaReached,
        );

        let sidecar = write_metadata(&metadata, &capture).unwrap();
        let loaded = read_metadata(&capture).unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.stop_reason, "transfer limit reached");
        assert_eq!(loaded.clock_divider, 20);

        fs::remove_file(&sidecar).ok();
    }
}
