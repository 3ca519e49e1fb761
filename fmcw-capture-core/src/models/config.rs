use std::path::PathBuf;
use std::time::Duration;

/// Reference clock of the ADC, divided by `2 * clock_divider` to get the sample rate.
pub const ADC_REFERENCE_CLOCK_HZ: f64 = 204e6;

/// Default ring capacity: 50 MiB of staging between callback and disk.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50 * 1024 * 1024;

/// Default size of the writer thread's local staging buffer.
pub const DEFAULT_STAGING_SIZE: usize = 1024 * 1024;

/// Default userspace buffer in front of the output file.
pub const DEFAULT_SINK_BUFFER_SIZE: usize = 8 * 1024;

/// Highest gain step accepted by the receiver's digital potentiometer.
pub const MAX_GAIN: u8 = 63;

/// Sweep parameters programmed into the radio and recorded in the file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParameters {
    /// Sweep start frequency in Hz (default: 5.6 GHz).
    pub start_frequency_hz: f64,

    /// Sweep bandwidth in Hz (default: 200 MHz).
    pub bandwidth_hz: f64,

    /// Sweep length in seconds (default: 1 ms).
    pub sweep_time_secs: f64,

    /// Delay between sweeps in reference clock cycles (default: 1800).
    pub delay_clocks: i32,

    /// Receiver gain step, 0..=63 (default: 0).
    pub gain: u8,

    /// ADC clock divider (default: 20).
    pub clock_divider: u32,
}

impl SweepParameters {
    /// ADC sample rate implied by the clock divider.
    pub fn sample_rate(&self) -> f64 {
        ADC_REFERENCE_CLOCK_HZ / (2.0 * self.clock_divider as f64)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.start_frequency_hz > 0.0) {
            return Err(format!(
                "start frequency must be positive, got {}",
                self.start_frequency_hz
            ));
        }
        if !(self.bandwidth_hz > 0.0) {
            return Err(format!("bandwidth must be positive, got {}", self.bandwidth_hz));
        }
        if !(self.sweep_time_secs >= 0.0) {
            return Err(format!(
                "sweep time must not be negative, got {}",
                self.sweep_time_secs
            ));
        }
        if self.delay_clocks < 0 {
            return Err(format!("delay must not be negative, got {}", self.delay_clocks));
        }
        if self.gain > MAX_GAIN {
            return Err(format!("gain must be within 0..={}, got {}", MAX_GAIN, self.gain));
        }
        if self.clock_divider == 0 {
            return Err("clock divider must be positive".into());
        }
        Ok(())
    }
}

impl Default for SweepParameters {
    fn default() -> Self {
        Self {
            start_frequency_hz: 5.6e9,
            bandwidth_hz: 200e6,
            sweep_time_secs: 1.0e-3,
            delay_clocks: 1800,
            gain: 0,
            clock_divider: 20,
        }
    }
}

/// Configuration for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfiguration {
    /// File the capture is written to.
    pub output_path: PathBuf,

    /// Radio sweep settings, written to the file header.
    pub sweep: SweepParameters,

    /// Ring capacity in bytes. One slot is reserved, so `buffer_capacity - 1`
    /// bytes can be staged at once.
    pub buffer_capacity: usize,

    /// Largest chunk the writer drains from the ring per write.
    pub staging_size: usize,

    /// Userspace buffering in front of the output file.
    pub sink_buffer_size: usize,

    /// Stop after this many bytes have been pushed (None = unlimited).
    pub transfer_limit: Option<u64>,

    /// Throughput measurement window of the main loop.
    pub poll_interval: Duration,

    /// Write a JSON metadata sidecar next to the capture.
    pub write_metadata: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.output_path.as_os_str().is_empty() {
            return Err("no output path given".into());
        }
        self.sweep.validate()?;
        if self.buffer_capacity < 2 {
            return Err(format!(
                "buffer capacity must be at least 2 bytes, got {}",
                self.buffer_capacity
            ));
        }
        if self.staging_size == 0 {
            return Err("staging size must be positive".into());
        }
        if self.sink_buffer_size == 0 {
            return Err("sink buffer size must be positive".into());
        }
        if self.transfer_limit == Some(0) {
            return Err("transfer limit must be positive when set".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            sweep: SweepParameters::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            staging_size: DEFAULT_STAGING_SIZE,
            sink_buffer_size: DEFAULT_SINK_BUFFER_SIZE,
            transfer_limit: None,
            poll_interval: Duration::from_secs(1),
            write_metadata: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn valid_config() -> CaptureConfiguration {
        CaptureConfiguration {
            output_path: PathBuf::from("capture.fmcw"),
            ..Default::default()
        }
    }

    #[test]
    fn default_sample_rate() {
        // 204 MHz / (2 * 20)
        assert_relative_eq!(SweepParameters::default().sample_rate(), 5.1e6);
    }

    #[test]
    fn default_config_needs_output_path() {
        assert!(CaptureConfiguration::default().validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_sweep() {
        let mut config = valid_config();
        config.sweep.gain = 64;
        assert!(config.validate().unwrap_err().contains("gain"));

        let mut config = valid_config();
        config.sweep.bandwidth_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sweep.start_frequency_hz = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sweep.delay_clocks = -1;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.sweep.clock_divider = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_sweep_time_is_allowed() {
        let mut config = valid_config();
        config.sweep.sweep_time_secs = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_buffers() {
        let mut config = valid_config();
        config.buffer_capacity = 1;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.staging_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.transfer_limit = Some(0);
        assert!(config.validate().is_err());
    }
}
