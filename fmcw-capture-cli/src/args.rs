//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;
use fmcw_capture_core::models::config::DEFAULT_BUFFER_CAPACITY;
use fmcw_capture_core::{CaptureConfiguration, SweepParameters};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// File to write the capture to (header + raw samples)
    #[arg(short = 'r', long = "output")]
    pub output: PathBuf,
    /// Sweep start frequency in Hz
    #[arg(short = 'f', long, default_value_t = 5.6e9, value_parser = positive_f64)]
    pub frequency: f64,
    /// Sweep bandwidth in Hz
    #[arg(short = 'b', long, default_value_t = 200e6, value_parser = positive_f64)]
    pub bandwidth: f64,
    /// Sweep length in seconds
    #[arg(short = 't', long, default_value_t = 1e-3, value_parser = non_negative_f64)]
    pub sweep_time: f64,
    /// Delay between sweeps, in reference clock cycles
    #[arg(short = 'd', long, default_value_t = 1800)]
    #[arg(value_parser = clap::value_parser!(i32).range(0..))]
    pub delay: i32,
    /// Receiver gain step
    #[arg(short = 'g', long, default_value_t = 0)]
    #[arg(value_parser = clap::value_parser!(u8).range(0..=63))]
    pub gain: u8,
    /// ADC clock divider; sample rate is 204 MHz / (2 * divider)
    #[arg(short = 'c', long, default_value_t = 20)]
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub clock_divider: u32,
    /// Stop after this many bytes (decimal, 0x hex or 0b binary)
    #[arg(short = 'n', long = "num-bytes", value_parser = positive_u64)]
    pub num_bytes: Option<u64>,
    /// Staging ring capacity in bytes
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY, value_parser = buffer_size)]
    pub buffer_size: usize,
    /// Byte rate of the synthetic source (default: 2 bytes per sample)
    #[arg(long, value_parser = positive_f64)]
    pub source_rate: Option<f64>,
    /// Write a JSON metadata file next to the capture
    #[arg(long)]
    pub metadata: bool,
}

impl Args {
    pub fn sweep(&self) -> SweepParameters {
        SweepParameters {
            start_frequency_hz: self.frequency,
            bandwidth_hz: self.bandwidth,
            sweep_time_secs: self.sweep_time,
            delay_clocks: self.delay,
            gain: self.gain,
            clock_divider: self.clock_divider,
        }
    }

    pub fn to_config(&self) -> CaptureConfiguration {
        CaptureConfiguration {
            output_path: self.output.clone(),
            sweep: self.sweep(),
            buffer_capacity: self.buffer_size,
            transfer_limit: self.num_bytes,
            write_metadata: self.metadata,
            ..CaptureConfiguration::default()
        }
    }

    /// Bytes per second the synthetic source should produce.
    pub fn source_rate(&self) -> f64 {
        self.source_rate
            .unwrap_or_else(|| 2.0 * self.sweep().sample_rate())
    }
}

/// Parse an unsigned integer with an optional `0x`/`0b` radix prefix.
pub fn parse_u64(s: &str) -> Result<u64, String> {
    let (digits, radix) = match s.get(..2) {
        Some("0x") | Some("0X") if s.len() > 2 => (&s[2..], 16),
        Some("0b") | Some("0B") if s.len() > 2 => (&s[2..], 2),
        _ => (s, 10),
    };
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid number '{}': {}", s, e))
}

fn positive_u64(s: &str) -> Result<u64, String> {
    match parse_u64(s)? {
        0 => Err("must be greater than zero".to_string()),
        v => Ok(v),
    }
}

fn buffer_size(s: &str) -> Result<usize, String> {
    let value = parse_u64(s)?;
    let size = usize::try_from(value).map_err(|_| format!("{} does not fit in memory", value))?;
    if size < 2 {
        return Err("ring needs at least 2 bytes".to_string());
    }
    Ok(size)
}

fn positive_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("invalid number '{}'", s))?;
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(format!("must be positive, got {}", s))
    }
}

fn non_negative_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("invalid number '{}'", s))?;
    if value >= 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(format!("must not be negative, got {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_prefixes() {
        assert_eq!(parse_u64("1000"), Ok(1000));
        assert_eq!(parse_u64("0x400"), Ok(1024));
        assert_eq!(parse_u64("0B101"), Ok(5));
        assert_eq!(parse_u64("0"), Ok(0));
        assert!(parse_u64("0x").is_err());
        assert!(parse_u64("12ab").is_err());
    }

    #[test]
    fn defaults_match_radio() {
        let args = Args::try_parse_from(["fmcw-capture", "-r", "out.fmcw"]).unwrap();
        let config = args.to_config();
        assert_eq!(config.sweep, SweepParameters::default());
        assert_eq!(config.transfer_limit, None);
        assert!(!config.write_metadata);
        assert!(config.validate().is_ok());
        assert_eq!(args.source_rate(), 10.2e6);
    }

    #[test]
    fn full_option_set() {
        let args = Args::try_parse_from([
            "fmcw-capture", "-r", "run.fmcw", "-f", "5.8e9", "-b", "150e6", "-t", "0.002",
            "-d", "900", "-g", "12", "-c", "10", "-n", "0x100000", "--buffer-size", "65536",
            "--source-rate", "1e6", "--metadata",
        ])
        .unwrap();
        let config = args.to_config();
        assert_eq!(config.sweep.start_frequency_hz, 5.8e9);
        assert_eq!(config.sweep.delay_clocks, 900);
        assert_eq!(config.sweep.gain, 12);
        assert_eq!(config.sweep.clock_divider, 10);
        assert_eq!(config.transfer_limit, Some(1 << 20));
        assert_eq!(config.buffer_capacity, 65536);
        assert!(config.write_metadata);
        assert_eq!(args.source_rate(), 1e6);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Args::try_parse_from(["fmcw-capture"]).is_err());
        for bad in [
            ["-f", "0"],
            ["-b", "-5"],
            ["-t", "-1"],
            ["-d", "-1"],
            ["-g", "64"],
            ["-c", "0"],
            ["-n", "0"],
        ] {
            let argv = ["fmcw-capture", "-r", "x.fmcw", bad[0], bad[1]];
            assert!(Args::try_parse_from(argv).is_err(), "{:?} accepted", bad);
        }
    }
}
