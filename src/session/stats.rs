use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinator::CaptureState;

/// Snapshot of the current (or last) capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Unique session identifier, assigned on each successful start
    pub session_id: Option<String>,

    /// Lifecycle state at the time of the snapshot
    pub state: CaptureState,

    /// Whether capture is active (including while stopping)
    pub capturing: bool,

    /// Whether incoming chunks are being discarded
    pub paused: bool,

    /// When the session started
    pub started_at: Option<DateTime<Utc>>,

    /// Bytes on the raw PCM track
    pub raw_bytes: usize,

    /// Duration accumulated on the raw PCM track
    pub raw_duration_ms: u64,

    /// Bytes on the encoded track
    pub encoded_bytes: usize,

    /// Duration accumulated on the encoded track
    pub encoded_duration_ms: u64,

    /// MIME type of the encoded track, if any encoded chunk arrived
    pub encoded_mime_type: Option<String>,

    /// Chunks retained across both tracks
    pub chunks_count: usize,

    /// Chunks discarded while paused or not capturing
    pub dropped_chunks: usize,

    /// Current voice-active flag
    pub voice_active: bool,

    /// Last normalized level (0.0 to 1.0)
    pub level: f32,
}
