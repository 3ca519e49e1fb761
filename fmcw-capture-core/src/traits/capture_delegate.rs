use crate::models::capture_result::CaptureResult;
use crate::models::diagnostics::Throughput;
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event delegate for capture session notifications.
///
/// All methods are called from the thread driving the session (the main
/// thread), never from the acquisition callback.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called once per measurement window.
    fn on_throughput(&self, throughput: &Throughput);

    /// Called when an error occurs during capture or shutdown.
    fn on_error(&self, error: &CaptureError);

    /// Called when the sink is closed and the capture is final.
    fn on_capture_finished(&self, result: &CaptureResult);
}
