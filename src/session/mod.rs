//! Capture session data
//!
//! This module provides what a single capture session accumulates:
//! - `CaptureConfig`, fixed for the session's lifetime
//! - `SessionAccumulator`, the raw and encoded tracks since the last start
//! - `ExportedAudio`, the finished artifact (WAV or encoded pass-through)
//! - `SessionStats`, a serializable snapshot

mod accumulator;
mod config;
mod export;
mod stats;

pub use accumulator::SessionAccumulator;
pub use config::CaptureConfig;
pub use export::{extension_for_mime, ExportedAudio, WAV_MIME_TYPE};
pub use stats::SessionStats;
