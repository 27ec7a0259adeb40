use serde::Serialize;
use tokio::sync::broadcast;

use super::state::CaptureState;
use crate::error::CaptureError;

/// Everything subscribers can observe, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CaptureEvent {
    /// Lifecycle transition
    StateChanged { state: CaptureState },

    /// A chunk was accepted onto the session and recovery tracks
    AudioChunk {
        timestamp_ms: u64,
        duration_ms: u64,
        byte_len: usize,
        encoded: bool,
    },

    /// Normalized level for UI meters (0.0 to 1.0)
    AudioLevel { level: f32 },

    /// Voice activity edge
    VoiceActivity { active: bool },

    /// Mid-session failure; the session may still be recoverable
    Error { error: CaptureError },
}

pub(crate) type EventSender = broadcast::Sender<CaptureEvent>;
pub type EventReceiver = broadcast::Receiver<CaptureEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(CaptureEvent::VoiceActivity { active: true }).unwrap();
        assert_eq!(json["event"], "voice_activity");
        assert_eq!(json["active"], true);

        let json = serde_json::to_value(CaptureEvent::Error {
            error: CaptureError::UnexpectedStop,
        })
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["error"]["kind"], "unexpected_stop");
    }
}
