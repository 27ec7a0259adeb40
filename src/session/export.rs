use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::accumulator::SessionAccumulator;
use crate::audio::wav::{encode_float32_wav, pcm_duration_ms};

pub const WAV_MIME_TYPE: &str = "audio/wav";

/// Export-ready audio for a finished session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedAudio {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub extension: &'static str,
    pub duration_ms: u64,
    /// True when the front-end's encoded container was passed through
    pub passthrough: bool,
}

impl ExportedAudio {
    /// Build the export from the session's tracks.
    ///
    /// The encoded track wins when it has any bytes; otherwise the raw track is
    /// wrapped as WAV. None when the session captured nothing.
    pub fn assemble(
        session: &SessionAccumulator,
        sample_rate: u32,
        channels: u16,
    ) -> Option<Self> {
        if session.encoded_bytes() > 0 {
            let bytes = session.encoded_audio();
            let mime_type = session
                .encoded_mime_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let duration_ms = duration_or_derived(
                session.encoded_duration_ms(),
                bytes.len(),
                sample_rate,
                channels,
            );

            return Some(Self {
                extension: extension_for_mime(&mime_type),
                bytes,
                mime_type,
                duration_ms,
                passthrough: true,
            });
        }

        if session.raw_bytes() == 0 {
            return None;
        }

        let pcm = session.raw_audio();
        let duration_ms =
            duration_or_derived(session.raw_duration_ms(), pcm.len(), sample_rate, channels);

        Some(Self {
            bytes: encode_float32_wav(&pcm, sample_rate, channels),
            mime_type: WAV_MIME_TYPE.to_string(),
            extension: "wav",
            duration_ms,
            passthrough: false,
        })
    }

    /// Write to `<dir>/<stem>.<extension>`, creating `dir` if needed
    pub fn write_to(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).context("Failed to create export directory")?;

        let path = dir.join(format!("{}.{}", stem, self.extension));
        fs::write(&path, &self.bytes)
            .with_context(|| format!("Failed to write export: {:?}", path))?;

        info!(
            "Exported {} ({}, {} bytes, {}ms)",
            path.display(),
            self.mime_type,
            self.bytes.len(),
            self.duration_ms
        );

        Ok(path)
    }
}

/// File extension for an encoded container's MIME type
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("webm") {
        "webm"
    } else if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("mp4") || mime.contains("m4a") || mime.contains("aac") {
        "m4a"
    } else if mime.contains("wav") {
        "wav"
    } else {
        "audio"
    }
}

fn duration_or_derived(counter_ms: u64, byte_len: usize, sample_rate: u32, channels: u16) -> u64 {
    if counter_ms > 0 {
        counter_ms
    } else {
        pcm_duration_ms(byte_len, sample_rate, channels)
    }
}
