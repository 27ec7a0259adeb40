use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::session::CaptureConfig;

/// One chunk as delivered by the capture front-end
///
/// Exactly one of `samples` or `encoded_bytes` must be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundChunk {
    /// Capture-relative timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Duration covered by this chunk in milliseconds
    pub duration_ms: u64,
    /// Raw f32 samples (interleaved when multi-channel)
    pub samples: Option<Vec<f32>>,
    /// Pre-encoded container bytes (webm, ogg, mp4...)
    pub encoded_bytes: Option<Vec<u8>>,
    /// MIME type hint for encoded bytes
    pub mime_type: Option<String>,
    /// Level measured by the front-end, preferred over the size proxy
    pub measured_level: Option<f32>,
    /// RMS measured by the front-end
    pub measured_rms: Option<f32>,
}

impl InboundChunk {
    pub fn raw(timestamp_ms: u64, duration_ms: u64, samples: Vec<f32>) -> Self {
        Self {
            timestamp_ms,
            duration_ms,
            samples: Some(samples),
            ..Default::default()
        }
    }

    pub fn encoded(
        timestamp_ms: u64,
        duration_ms: u64,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            duration_ms,
            encoded_bytes: Some(bytes),
            mime_type: Some(mime_type.into()),
            ..Default::default()
        }
    }
}

/// Everything the front-end sends back to the coordinator, in order
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    /// A captured chunk
    Chunk(InboundChunk),
    /// Acknowledges `start_capture`
    Started,
    /// Capture ended, either acknowledging `stop_capture` or on its own
    Stopped,
    /// Start failed, or a mid-session error occurred
    Error(String),
}

pub type FrontendSender = mpsc::Sender<FrontendMessage>;
pub type FrontendReceiver = mpsc::Receiver<FrontendMessage>;

/// Capture front-end trait
///
/// Commands return as soon as they are issued; outcomes arrive later as
/// `FrontendMessage`s on the sender the front-end was built with. Commands
/// run on the coordinator task and must not await on that sender.
///
/// Implementations:
/// - `WavFileFrontend`: replays a WAV file (CLI, tests)
/// - Platform microphone front-ends live outside this crate
#[async_trait::async_trait]
pub trait CaptureFrontend: Send {
    /// Begin capturing with the given configuration
    async fn start_capture(&mut self, config: &CaptureConfig) -> Result<()>;

    /// Stop capturing; acknowledged with `FrontendMessage::Stopped`
    async fn stop_capture(&mut self) -> Result<()>;

    /// Switch input device, possibly while capturing
    async fn set_device(&mut self, device_id: &str) -> Result<()>;

    /// Front-end name for logging
    fn name(&self) -> &str;
}

/// Channel the front-end delivers chunks and acknowledgements on
pub fn frontend_channel(capacity: usize) -> (FrontendSender, FrontendReceiver) {
    mpsc::channel(capacity)
}
