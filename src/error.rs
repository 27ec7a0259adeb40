//! Error types for the capture coordinator.

use serde::Serialize;
use thiserror::Error;

/// Everything the coordinator can report, either as a rejected call or as an
/// `Error` event on the subscriber channel.
///
/// Clone so one outcome can settle every coalesced waiter.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureError {
    // Lifecycle errors (returned from start())
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No capture front-end registered")]
    NoCaptureTarget,

    #[error("Capture front-end did not acknowledge start within {timeout_ms}ms")]
    StartTimeout { timeout_ms: u64 },

    #[error("Capture front-end failed to start: {message}")]
    StartFailed { message: String },

    #[error("Cannot start while a stop is in progress")]
    StopInProgress,

    // Mid-session errors (emitted as events)
    #[error("Capture stopped unexpectedly")]
    UnexpectedStop,

    #[error("Capture front-end error: {message}")]
    Frontend { message: String },

    #[error("Failed to write recovery buffer {path}: {message}")]
    WriteFailure { path: String, message: String },

    #[error("Invalid audio chunk: {message}")]
    InvalidChunk { message: String },

    // Configuration and plumbing
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Capture coordinator is no longer running")]
    CoordinatorClosed,
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::Io {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
