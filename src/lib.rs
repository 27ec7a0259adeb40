pub mod audio;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod recovery;
pub mod session;

pub use audio::{
    AudioChunk, AudioFile, CaptureFrontend, FrontendMessage, FrontendSender, InboundChunk,
    MicrophonePermission, PermissionStatus, WavFileFrontend,
};
pub use config::Settings;
pub use coordinator::{
    CaptureCoordinator, CaptureEvent, CaptureState, CoordinatorBuilder, EncodedAudio,
    EventReceiver, StopReason,
};
pub use error::{CaptureError, Result};
pub use recovery::{RecoveryBuffer, MAX_RECOVERY_FILES};
pub use session::{CaptureConfig, ExportedAudio, SessionStats};
