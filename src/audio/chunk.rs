use std::sync::Arc;

use super::frontend::InboundChunk;
use super::vad::calculate_rms;
use crate::error::{CaptureError, Result};

/// Encoded blobs of this many bytes map to a full-scale level when the
/// front-end does not measure one itself.
const ENCODED_BYTES_FULL_SCALE: f32 = 6000.0;

/// Level below which an encoded chunk's RMS proxy is zero.
const ENCODED_LEVEL_FLOOR: f32 = 0.08;
const ENCODED_RMS_SCALE: f32 = 0.06;

/// One unit of captured audio after ingress
///
/// Immutable once created; the byte buffer is shared read-only between the
/// recovery buffer and the session accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Little-endian f32 PCM for raw chunks, container bytes for encoded ones
    pub bytes: Arc<[u8]>,
    /// Capture-relative timestamp in milliseconds
    pub timestamp_ms: u64,
    /// Duration covered by this chunk in milliseconds
    pub duration_ms: u64,
    /// Sample rate of the session that produced the chunk
    pub sample_rate: u32,
}

impl AudioChunk {
    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}

/// Which accumulation track a chunk belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    Raw,
    Encoded { mime_type: Option<String> },
}

/// A normalized chunk plus the signal measurements derived from it
#[derive(Debug, Clone)]
pub struct IngestedChunk {
    pub chunk: AudioChunk,
    pub kind: ChunkKind,
    /// Normalized level in [0, 1] for UI feedback
    pub level: f32,
    /// RMS (or RMS proxy for encoded audio) fed into the VAD
    pub rms: f32,
}

/// Normalize one inbound front-end message into an `IngestedChunk`.
///
/// A message must carry raw samples or encoded bytes, never both.
pub fn ingest(inbound: InboundChunk, sample_rate: u32) -> Result<IngestedChunk> {
    match (inbound.samples, inbound.encoded_bytes) {
        (Some(samples), None) => {
            let rms = calculate_rms(&samples);
            let bytes = samples_to_le_bytes(&samples);

            Ok(IngestedChunk {
                chunk: AudioChunk {
                    bytes: bytes.into(),
                    timestamp_ms: inbound.timestamp_ms,
                    duration_ms: inbound.duration_ms,
                    sample_rate,
                },
                kind: ChunkKind::Raw,
                level: level_from_rms(rms),
                rms,
            })
        }
        (None, Some(encoded)) => {
            let level = finite(inbound.measured_level)
                .map(|l| l.clamp(0.0, 1.0))
                .unwrap_or_else(|| {
                    (encoded.len() as f32 / ENCODED_BYTES_FULL_SCALE).clamp(0.0, 1.0)
                });
            let rms = finite(inbound.measured_rms)
                .unwrap_or((level - ENCODED_LEVEL_FLOOR) * ENCODED_RMS_SCALE)
                .max(0.0);

            Ok(IngestedChunk {
                chunk: AudioChunk {
                    bytes: encoded.into(),
                    timestamp_ms: inbound.timestamp_ms,
                    duration_ms: inbound.duration_ms,
                    sample_rate,
                },
                kind: ChunkKind::Encoded {
                    mime_type: inbound.mime_type,
                },
                level,
                rms,
            })
        }
        (Some(_), Some(_)) => Err(CaptureError::InvalidChunk {
            message: format!(
                "chunk at {}ms carries both samples and encoded bytes",
                inbound.timestamp_ms
            ),
        }),
        (None, None) => Err(CaptureError::InvalidChunk {
            message: format!("chunk at {}ms carries no audio", inbound.timestamp_ms),
        }),
    }
}

/// Serialize f32 samples as little-endian bytes
pub fn samples_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Normalized UI level for a raw RMS value
pub fn level_from_rms(rms: f32) -> f32 {
    (rms * 10.0).min(1.0)
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(samples: Vec<f32>) -> InboundChunk {
        InboundChunk {
            timestamp_ms: 200,
            duration_ms: 100,
            samples: Some(samples),
            ..Default::default()
        }
    }

    fn encoded(bytes: Vec<u8>) -> InboundChunk {
        InboundChunk {
            timestamp_ms: 200,
            duration_ms: 100,
            encoded_bytes: Some(bytes),
            mime_type: Some("audio/webm;codecs=opus".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_raw_chunk_bytes_are_little_endian_f32() {
        let ingested = ingest(raw(vec![0.5, -1.0]), 16000).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&0.5f32.to_le_bytes());
        expected.extend_from_slice(&(-1.0f32).to_le_bytes());

        assert_eq!(&ingested.chunk.bytes[..], &expected[..]);
        assert_eq!(ingested.chunk.len(), 8);
        assert_eq!(ingested.chunk.timestamp_ms, 200);
        assert_eq!(ingested.chunk.sample_rate, 16000);
        assert_eq!(ingested.kind, ChunkKind::Raw);
    }

    #[test]
    fn test_raw_level_is_scaled_rms_capped_at_one() {
        let quiet = ingest(raw(vec![0.05; 160]), 16000).unwrap();
        assert!((quiet.rms - 0.05).abs() < 1e-6);
        assert!((quiet.level - 0.5).abs() < 1e-5);

        let loud = ingest(raw(vec![0.5; 160]), 16000).unwrap();
        assert_eq!(loud.level, 1.0);
    }

    #[test]
    fn test_encoded_level_prefers_measured_value() {
        let mut chunk = encoded(vec![0u8; 100]);
        chunk.measured_level = Some(1.7);
        let ingested = ingest(chunk, 48000).unwrap();
        assert_eq!(ingested.level, 1.0);
        assert_eq!(
            ingested.kind,
            ChunkKind::Encoded {
                mime_type: Some("audio/webm;codecs=opus".to_string())
            }
        );
    }

    #[test]
    fn test_encoded_level_falls_back_to_blob_size() {
        let ingested = ingest(encoded(vec![0u8; 3000]), 48000).unwrap();
        assert!((ingested.level - 0.5).abs() < 1e-6);
        // (0.5 - 0.08) * 0.06
        assert!((ingested.rms - 0.0252).abs() < 1e-6);
    }

    #[test]
    fn test_encoded_rms_proxy_never_negative() {
        let ingested = ingest(encoded(vec![0u8; 60]), 48000).unwrap();
        assert_eq!(ingested.rms, 0.0);
    }

    #[test]
    fn test_encoded_measured_rms_used_as_is() {
        let mut chunk = encoded(vec![0u8; 60]);
        chunk.measured_rms = Some(0.2);
        let ingested = ingest(chunk, 48000).unwrap();
        assert_eq!(ingested.rms, 0.2);
    }

    #[test]
    fn test_rejects_both_shapes() {
        let mut chunk = raw(vec![0.1]);
        chunk.encoded_bytes = Some(vec![1, 2, 3]);
        assert!(matches!(
            ingest(chunk, 16000),
            Err(CaptureError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_message() {
        let chunk = InboundChunk {
            timestamp_ms: 0,
            duration_ms: 100,
            ..Default::default()
        };
        assert!(ingest(chunk, 16000).is_err());
    }
}
