/// FMCW capture file header.
///
/// Every capture starts with a fixed preamble describing the sweep, followed
/// by the raw sample stream. The header records its own length so readers can
/// skip it without knowing the version.
use crate::models::config::SweepParameters;
use crate::models::error::CaptureError;

/// Size of the FMCW header in bytes: 4 + 4 + 4 + 4 * 8 + 4 + 4.
pub const SWEEP_HEADER_SIZE: usize = 52;

pub const SWEEP_HEADER_MAGIC: &[u8; 4] = b"FMCW";

pub const SWEEP_HEADER_VERSION: u32 = 1;

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHeader {
    pub version: u32,
    pub sample_rate: f64,
    pub start_frequency_hz: f64,
    pub bandwidth_hz: f64,
    pub sweep_time_secs: f64,
    pub delay_clocks: i32,
    pub flags: i32,
}

impl SweepHeader {
    /// Header for a capture taken with `sweep`. No flags are defined yet.
    pub fn from_sweep(sweep: &SweepParameters) -> Self {
        Self {
            version: SWEEP_HEADER_VERSION,
            sample_rate: sweep.sample_rate(),
            start_frequency_hz: sweep.start_frequency_hz,
            bandwidth_hz: sweep.bandwidth_hz,
            sweep_time_secs: sweep.sweep_time_secs,
            delay_clocks: sweep.delay_clocks,
            flags: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; SWEEP_HEADER_SIZE] {
        generate_sweep_header(self)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        parse_sweep_header(bytes)
    }
}

/// Generate the FMCW header, little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "FMCW"
/// [4-7]    version (u32)
/// [8-11]   header length = 52 (u32)
/// [12-19]  sample rate, Hz (f64)
/// [20-27]  sweep start frequency, Hz (f64)
/// [28-35]  sweep bandwidth, Hz (f64)
/// [36-43]  sweep time, s (f64)
/// [44-47]  delay, reference clocks (i32)
/// [48-51]  flags (i32)
/// ```
pub fn generate_sweep_header(header: &SweepHeader) -> [u8; SWEEP_HEADER_SIZE] {
    let mut out = [0u8; SWEEP_HEADER_SIZE];

    out[0..4].copy_from_slice(SWEEP_HEADER_MAGIC);
    out[4..8].copy_from_slice(&header.version.to_le_bytes());
    out[8..12].copy_from_slice(&(SWEEP_HEADER_SIZE as u32).to_le_bytes());

    out[12..20].copy_from_slice(&header.sample_rate.to_le_bytes());
    out[20..28].copy_from_slice(&header.start_frequency_hz.to_le_bytes());
    out[28..36].copy_from_slice(&header.bandwidth_hz.to_le_bytes());
    out[36..44].copy_from_slice(&header.sweep_time_secs.to_le_bytes());

    out[44..48].copy_from_slice(&header.delay_clocks.to_le_bytes());
    out[48..52].copy_from_slice(&header.flags.to_le_bytes());

    out
}

/// Parse and validate a header from the start of `bytes`.
///
/// Trailing bytes (the sample stream) are ignored.
pub fn parse_sweep_header(bytes: &[u8]) -> Result<SweepHeader, CaptureError> {
    if bytes.len() < SWEEP_HEADER_SIZE {
        return Err(CaptureError::MalformedHeader(format!(
            "need {} bytes, got {}",
            SWEEP_HEADER_SIZE,
            bytes.len()
        )));
    }
    if &bytes[0..4] != SWEEP_HEADER_MAGIC {
        return Err(CaptureError::MalformedHeader("bad magic".into()));
    }

    let version = u32_at(bytes, 4);
    if version != SWEEP_HEADER_VERSION {
        return Err(CaptureError::MalformedHeader(format!(
            "unsupported version {}",
            version
        )));
    }
    let length = u32_at(bytes, 8);
    if length as usize != SWEEP_HEADER_SIZE {
        return Err(CaptureError::MalformedHeader(format!(
            "header length {} does not match {}",
            length, SWEEP_HEADER_SIZE
        )));
    }

    Ok(SweepHeader {
        version,
        sample_rate: f64_at(bytes, 12),
        start_frequency_hz: f64_at(bytes, 20),
        bandwidth_hz: f64_at(bytes, 28),
        sweep_time_secs: f64_at(bytes, 36),
        delay_clocks: u32_at(bytes, 44) as i32,
        flags: u32_at(bytes, 48) as i32,
    })
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn f64_at(bytes: &[u8], offset: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(raw)
}
