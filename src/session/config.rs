use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CaptureError, Result};

/// Configuration for a capture session
///
/// Supplied to `start()` and fixed for the lifetime of the session. Swapping the
/// input device mid-session goes through `set_device`, not through this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate the front-end should capture at
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration of each chunk the front-end delivers
    pub chunk_duration_ms: u64,

    /// RMS above which a chunk counts as voice (strictly greater)
    pub vad_threshold: f32,

    /// Silence needed before voice is considered ended
    pub vad_silence_ms: u64,

    /// Interval between recovery buffer rotations
    pub recovery_buffer_minutes: u64,

    /// Input device to open, front-end default when absent
    pub device_id: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_duration_ms: 100,
            vad_threshold: 0.01,
            vad_silence_ms: 600,
            recovery_buffer_minutes: 5,
            device_id: None,
        }
    }
}

/// Longest accepted recovery rotation interval (one day)
pub const MAX_RECOVERY_BUFFER_MINUTES: u64 = 24 * 60;

const BYTES_PER_SAMPLE: u64 = 4;

impl CaptureConfig {
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_buffer_minutes.saturating_mul(60))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if self.channels == 0 {
            return Err(invalid("channels", "must be positive"));
        }
        // WAV header fields: block_align is u16, byte_rate is u32
        if self.channels as u64 * BYTES_PER_SAMPLE > u16::MAX as u64 {
            return Err(invalid("channels", "too many channels for a WAV frame"));
        }
        if self.sample_rate as u64 * self.channels as u64 * BYTES_PER_SAMPLE > u32::MAX as u64 {
            return Err(invalid(
                "sample_rate",
                "sample_rate * channels exceeds the WAV byte rate limit",
            ));
        }
        if self.chunk_duration_ms == 0 {
            return Err(invalid("chunk_duration_ms", "must be positive"));
        }
        if !self.vad_threshold.is_finite() || self.vad_threshold < 0.0 {
            return Err(invalid("vad_threshold", "must be a non-negative number"));
        }
        if self.recovery_buffer_minutes == 0 {
            return Err(invalid("recovery_buffer_minutes", "must be positive"));
        }
        if self.recovery_buffer_minutes > MAX_RECOVERY_BUFFER_MINUTES {
            return Err(invalid(
                "recovery_buffer_minutes",
                "must be at most one day (1440)",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: &str) -> CaptureError {
    CaptureError::InvalidConfig {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.vad_threshold, 0.01);
        assert_eq!(config.vad_silence_ms, 600);
        assert_eq!(config.recovery_buffer_minutes, 5);
        assert_eq!(config.rotation_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let config = CaptureConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidConfig { ref key, .. }) if key == "sample_rate"
        ));
    }

    fn rejected_key(config: CaptureConfig) -> Option<String> {
        match config.validate() {
            Err(CaptureError::InvalidConfig { key, .. }) => Some(key),
            _ => None,
        }
    }

    #[test]
    fn test_rejects_byte_rate_overflow() {
        let config = CaptureConfig {
            sample_rate: 1_100_000_000,
            ..Default::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("sample_rate"));

        // 192kHz with 64 channels still fits
        let config = CaptureConfig {
            sample_rate: 192_000,
            channels: 64,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_block_align_overflow() {
        let config = CaptureConfig {
            sample_rate: 8000,
            channels: 16384,
            ..Default::default()
        };
        assert_eq!(rejected_key(config).as_deref(), Some("channels"));
    }

    #[test]
    fn test_rejects_huge_rotation_interval() {
        let config = CaptureConfig {
            recovery_buffer_minutes: 200_000_000_000_000_000,
            ..Default::default()
        };
        assert_eq!(
            rejected_key(config).as_deref(),
            Some("recovery_buffer_minutes")
        );

        let config = CaptureConfig {
            recovery_buffer_minutes: MAX_RECOVERY_BUFFER_MINUTES,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_nan_threshold() {
        let config = CaptureConfig {
            vad_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"sample_rate": 48000, "channels": 2}"#).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.channels, 2);
        assert_eq!(config.chunk_duration_ms, 100);
        assert_eq!(config.device_id, None);
    }
}
