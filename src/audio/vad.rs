//! Voice Activity Detection.
//!
//! Energy-based detector with hysteresis: voice activates on the first chunk
//! whose RMS exceeds the threshold and deactivates only after the silence has
//! lasted longer than the hangover window. Timing comes from chunk timestamps,
//! so the detector is deterministic for a given chunk sequence.

use crate::session::CaptureConfig;

/// Root mean square of a sample window (0.0 for an empty window)
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Configuration for voice activity detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    /// RMS that must be exceeded for a chunk to count as voice
    pub threshold: f32,
    /// Silence that must elapse before voice is considered ended
    pub silence_ms: u64,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for VadConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            threshold: config.vad_threshold,
            silence_ms: config.vad_silence_ms,
        }
    }
}

/// Edge emitted when the voice-active flag changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceTransition {
    /// Voice started
    Rising,
    /// Voice ended after the hangover elapsed
    Falling,
}

impl VoiceTransition {
    pub fn is_active(&self) -> bool {
        matches!(self, VoiceTransition::Rising)
    }
}

/// Voice activity detector
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    voice_active: bool,
    silence_start_ms: Option<u64>,
}

impl VoiceActivityDetector {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            voice_active: false,
            silence_start_ms: None,
        }
    }

    /// Feed one chunk's RMS and timestamp; returns an edge if the state changed.
    pub fn process(&mut self, rms: f32, timestamp_ms: u64) -> Option<VoiceTransition> {
        if rms > self.config.threshold {
            self.silence_start_ms = None;
            if !self.voice_active {
                self.voice_active = true;
                return Some(VoiceTransition::Rising);
            }
            return None;
        }

        if !self.voice_active {
            return None;
        }

        let silence_start = *self.silence_start_ms.get_or_insert(timestamp_ms);
        if timestamp_ms.saturating_sub(silence_start) > self.config.silence_ms {
            self.voice_active = false;
            self.silence_start_ms = None;
            return Some(VoiceTransition::Falling);
        }

        None
    }

    pub fn is_voice_active(&self) -> bool {
        self.voice_active
    }

    pub fn silence_start_ms(&self) -> Option<u64> {
        self.silence_start_ms
    }

    /// Return to rest without emitting an edge
    pub fn reset(&mut self) {
        self.voice_active = false;
        self.silence_start_ms = None;
    }
}
