use serde::{Deserialize, Serialize};

/// Lifecycle state of the capture coordinator
///
/// `Idle -> Starting -> Recording <-> Paused -> Stopping -> Idle`. `Error` is
/// entered when a start fails and is always followed by `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Starting,
    Recording,
    Paused,
    Stopping,
    Error,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stop settled; every coalesced caller receives the same value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The front-end acknowledged the stop
    Acknowledged,
    /// The front-end did not answer in time; state was reset anyway
    TimedOut,
    /// The front-end stopped without being asked
    Unexpected,
    /// Nothing was capturing
    NotCapturing,
    /// Forced during coordinator shutdown
    Shutdown,
}
