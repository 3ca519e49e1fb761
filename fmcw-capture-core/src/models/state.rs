use std::fmt;

use super::capture_result::CaptureResult;
use super::error::CaptureError;

/// Why a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user interrupted the capture (Ctrl-C, SIGTERM).
    Interrupted,
    /// The transfer limit was reached and the callback asked the source to stop.
    QuotaReached,
    /// The acquisition source stopped streaming on its own.
    SourceStopped,
    /// No bytes arrived during a full measurement window.
    Stalled,
    /// The writer thread exited on an unrecoverable sink error.
    WriterFailed,
}

impl StopReason {
    /// Whether this reason should be reported to the shell as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Stalled | Self::WriterFailed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Interrupted => "user cancel",
            Self::QuotaReached => "transfer limit reached",
            Self::SourceStopped => "acquisition source stopped streaming",
            Self::Stalled => "no bytes transferred for a full measurement window",
            Self::WriterFailed => "writer thread failed",
        };
        f.write_str(text)
    }
}

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → running → stop_requested → draining → stopped → completed
///                                                  ↘ failed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Running { elapsed_secs: f64 },
    StopRequested(StopReason),
    Draining,
    Stopped,
    Completed(Box<CaptureResult>),
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// True once a stop has been requested but the sink is not yet closed.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::StopRequested(_) | Self::Draining | Self::Stopped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Short lowercase name, used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::StopRequested(_) => "stop_requested",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_states() {
        assert!(CaptureState::StopRequested(StopReason::Interrupted).is_stopping());
        assert!(CaptureState::Draining.is_stopping());
        assert!(CaptureState::Stopped.is_stopping());
        assert!(!CaptureState::Running { elapsed_secs: 1.0 }.is_stopping());
        assert!(!CaptureState::Idle.is_stopping());
    }

    #[test]
    fn failure_reasons() {
        assert!(StopReason::Stalled.is_failure());
        assert!(StopReason::WriterFailed.is_failure());
        assert!(!StopReason::Interrupted.is_failure());
        assert!(!StopReason::QuotaReached.is_failure());
    }
}
