mod args;
mod synthetic_source;

use std::error::Error;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use args::Args;
use clap::Parser;
use fmcw_capture_core::{
    CaptureDelegate, CaptureError, CaptureResult, CaptureSession, CaptureState, StopReason,
    Throughput,
};
use synthetic_source::SyntheticSource;

/// Reports session events through the log.
struct LogDelegate;

impl CaptureDelegate for LogDelegate {
    fn on_state_changed(&self, state: &CaptureState) {
        if !state.is_running() {
            log::debug!("session {}", state.name());
        }
    }

    fn on_throughput(&self, throughput: &Throughput) {
        if throughput.buffered > 0 {
            log::debug!("{} bytes waiting for the writer", throughput.buffered);
        }
    }

    fn on_error(&self, error: &CaptureError) {
        log::error!("{}", error);
    }

    fn on_capture_finished(&self, result: &CaptureResult) {
        log::info!(
            "wrote {} ({} bytes, sha256 {})",
            result.file_path.display(),
            result.file_bytes,
            result.checksum
        );
        if result.overflow_events > 0 {
            log::warn!(
                "buffer filled {} times during the capture",
                result.overflow_events
            );
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Raise `flag` on Ctrl-C and on termination signals, so the capture drains
/// and closes its file.
fn install_interrupt_handler(flag: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || flag.store(true, Ordering::Release))
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn Error>> {
    let cancel = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(Arc::clone(&cancel))?;

    let source = SyntheticSource::new(args.source_rate());
    let mut session = CaptureSession::new(source, args.to_config())?;
    session.set_delegate(Arc::new(LogDelegate));

    let started = Instant::now();
    session.start()?;
    log::info!("Stop with Ctrl-C");

    let reason = session.run_until_stopped(&cancel)?;
    if reason == StopReason::Interrupted {
        log::info!("User cancel, exiting...");
    } else {
        log::info!("Exiting... {}", reason);
    }

    let finished = session.stop(reason);
    log::info!("Total time: {:5.5} s", started.elapsed().as_secs_f64());
    let result = finished?;
    log::info!("file closed, {} sample bytes", result.data_bytes);

    if reason.is_failure() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
