//! Orchestrator constants
//!
//! User-visible strings and SSE markers used throughout the orchestrator.

/// SSE stream termination signal
pub const SSE_DONE_SIGNAL: &str = "[DONE]";

/// SSE error prefix
pub const SSE_ERROR_PREFIX: &str = "[ERROR]";

/// Content of a generic reply whose backend call failed
pub const GENERIC_FAILURE_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Content of a file message when conversion and fallback both failed
pub const CONVERSION_FAILURE_TEXT: &str = "Conversion failed.";

/// Content of a file message whose conversion was cut short by a session
/// or module switch
pub const CONVERSION_CANCELLED_TEXT: &str = "Conversion cancelled.";

/// Content of a file message once a download is attached
pub fn conversion_success_text(file_name: &str) -> String {
    format!("Converted {} successfully.", file_name)
}

/// Placeholder shown while a file is being converted
pub fn conversion_progress_text(file_name: &str) -> String {
    format!("Converting {}...", file_name)
}
