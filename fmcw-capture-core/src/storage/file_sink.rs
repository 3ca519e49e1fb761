use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::processing::sweep_header::SweepHeader;
use crate::traits::output_sink::{OutputSink, SinkSummary};

/// Buffered, append-only capture file.
///
/// ## File Format
///
/// ```text
/// [52-byte FMCW header]
/// [raw sample bytes, in arrival order...]
/// ```
pub struct FileSink {
    file_path: PathBuf,
    writer: Option<BufWriter<File>>,
    total_bytes_written: u64,
}

impl FileSink {
    /// Create the file (and its directory) and write the header.
    ///
    /// `buffer_size` is the userspace buffer in front of the file; it absorbs
    /// the many small writes of the header and of short ring reads.
    pub fn open(
        file_path: impl Into<PathBuf>,
        header: &SweepHeader,
        buffer_size: usize,
    ) -> Result<Self, CaptureError> {
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::StorageError(format!("failed to create directory: {}", e))
            })?;
        }

        let file = File::create(&file_path).map_err(|e| {
            CaptureError::StorageError(format!(
                "failed to open file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let mut sink = Self {
            file_path,
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
            total_bytes_written: 0,
        };
        sink.write_all_raw(&header.to_bytes())?;
        Ok(sink)
    }

    /// Total bytes accepted so far (including the header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_all_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        writer
            .write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

impl OutputSink for FileSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "file is not open"))?;
        let written = writer.write(bytes)?;
        self.total_bytes_written += written as u64;
        Ok(written)
    }

    /// Flush, sync to disk, and compute the SHA-256 checksum of the file.
    fn close(&mut self) -> Result<SinkSummary, CaptureError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;

        let file = writer
            .into_inner()
            .map_err(|e| CaptureError::StorageError(format!("flush failed: {}", e.error())))?;
        file.sync_all()
            .map_err(|e| CaptureError::StorageError(format!("sync failed: {}", e)))?;
        drop(file);

        let checksum = sha256_file(&self.file_path)?;
        log::debug!(
            "closed {} ({} bytes, sha256 {})",
            self.file_path.display(),
            self.total_bytes_written,
            checksum
        );
        Ok(SinkSummary {
            total_bytes: self.total_bytes_written,
            checksum,
        })
    }
}

/// Compute SHA-256 hex digest of a file, streaming it through the hasher.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path).map_err(|e| {
        CaptureError::StorageError(format!("failed to read file for checksum: {}", e))
    })?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| {
        CaptureError::StorageError(format!("failed to read file for checksum: {}", e))
    })?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::SweepParameters;
    use crate::processing::sweep_header::SWEEP_HEADER_SIZE;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fmcw_capture_test_{}_{}", std::process::id(), name))
    }

    fn header() -> SweepHeader {
        SweepHeader::from_sweep(&SweepParameters::default())
    }

    #[test]
    fn writes_header_then_data() {
        let path = temp_file_path("sink_plain.fmcw");
        let mut sink = FileSink::open(&path, &header(), 8 * 1024).unwrap();
        assert_eq!(sink.bytes_written(), SWEEP_HEADER_SIZE as u64);

        let data: Vec<u8> = (0..=255u8).collect();
        let mut offset = 0;
        while offset < data.len() {
            offset += sink.write(&data[offset..]).unwrap();
        }

        let summary = sink.close().unwrap();
        assert_eq!(summary.total_bytes, (SWEEP_HEADER_SIZE + 256) as u64);
        assert_eq!(summary.checksum.len(), 64);

        let file_data = fs::read(&path).unwrap();
        assert_eq!(file_data.len(), SWEEP_HEADER_SIZE + 256);
        assert_eq!(&file_data[0..4], b"FMCW");
        assert_eq!(&file_data[SWEEP_HEADER_SIZE..], &data[..]);

        let expected = hex_encode(&Sha256::digest(&file_data));
        assert_eq!(summary.checksum, expected);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn creates_missing_directory() {
        let dir = temp_file_path("sink_dir");
        let path = dir.join("nested").join("capture.fmcw");
        let mut sink = FileSink::open(&path, &header(), 16).unwrap();
        sink.close().unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), SWEEP_HEADER_SIZE as u64);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn closed_sink_refuses_writes() {
        let path = temp_file_path("sink_closed.fmcw");
        let mut sink = FileSink::open(&path, &header(), 64).unwrap();
        sink.close().unwrap();

        let err = sink.write(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(matches!(sink.close(), Err(CaptureError::StorageError(_))));

        fs::remove_file(&path).ok();
    }
}
