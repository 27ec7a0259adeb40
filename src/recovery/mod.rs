//! Crash-resilient recovery trail
//!
//! Captured bytes are mirrored into rotating `audio-<timestamp>.raw` files so a
//! session can be salvaged after a crash or a failed export.

mod buffer;

pub use buffer::{default_recovery_dir, RecoveryBuffer, RecoveryFile, MAX_RECOVERY_FILES};
