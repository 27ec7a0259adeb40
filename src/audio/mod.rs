pub mod chunk;
pub mod file;
pub mod frontend;
pub mod permission;
pub mod vad;
pub mod wav;

pub use chunk::{AudioChunk, ChunkKind, IngestedChunk};
pub use file::{AudioFile, WavFileFrontend};
pub use frontend::{
    frontend_channel, CaptureFrontend, FrontendMessage, FrontendReceiver, FrontendSender,
    InboundChunk,
};
pub use permission::{AlwaysGranted, MicrophonePermission, PermissionStatus, StaticPermission};
pub use vad::{VadConfig, VoiceActivityDetector, VoiceTransition};
pub use wav::{encode_float32_wav, WavHeader, WAV_HEADER_LEN};
