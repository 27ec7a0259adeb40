use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::frontend::{CaptureFrontend, FrontendMessage, FrontendSender, InboundChunk};
use crate::session::CaptureConfig;

/// A WAV file decoded to interleaved f32 samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Front-end that replays a WAV file as raw chunks
///
/// Acknowledges start and stop like a live microphone would. Once the file is
/// exhausted capture stays open but silent until `stop_capture`.
pub struct WavFileFrontend {
    path: PathBuf,
    messages: FrontendSender,
    realtime: bool,
    capturing: bool,
    device_id: Option<String>,
    task: Option<JoinHandle<()>>,
    drained: Arc<Notify>,
}

impl WavFileFrontend {
    pub fn new(path: impl Into<PathBuf>, messages: FrontendSender) -> Self {
        Self {
            path: path.into(),
            messages,
            realtime: false,
            capturing: false,
            device_id: None,
            task: None,
            drained: Arc::new(Notify::new()),
        }
    }

    /// Pace chunks at their real duration instead of as fast as possible
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Notified once every chunk of the file has been delivered
    pub fn drained(&self) -> Arc<Notify> {
        Arc::clone(&self.drained)
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

#[async_trait::async_trait]
impl CaptureFrontend for WavFileFrontend {
    async fn start_capture(&mut self, config: &CaptureConfig) -> Result<()> {
        if self.capturing {
            bail!("Already capturing");
        }

        let audio = AudioFile::open(&self.path)?;
        if audio.sample_rate != config.sample_rate || audio.channels != config.channels {
            bail!(
                "{} is {}Hz/{}ch but capture expects {}Hz/{}ch",
                audio.path,
                audio.sample_rate,
                audio.channels,
                config.sample_rate,
                config.channels
            );
        }

        if let Some(device) = &config.device_id {
            self.device_id = Some(device.clone());
        }

        let frame_len =
            (config.sample_rate as u64 * config.chunk_duration_ms / 1000) as usize;
        let chunk_len = (frame_len * config.channels as usize).max(config.channels as usize);
        let samples_per_ms = config.sample_rate as f64 * config.channels as f64 / 1000.0;

        let messages = self.messages.clone();
        let drained = Arc::clone(&self.drained);
        let realtime = self.realtime;

        let task = tokio::spawn(async move {
            if messages.send(FrontendMessage::Started).await.is_err() {
                return;
            }

            let mut timestamp_ms = 0u64;
            for samples in audio.samples.chunks(chunk_len) {
                let duration_ms = (samples.len() as f64 / samples_per_ms).round() as u64;
                let chunk = InboundChunk::raw(timestamp_ms, duration_ms, samples.to_vec());

                if messages.send(FrontendMessage::Chunk(chunk)).await.is_err() {
                    debug!("Coordinator went away, stopping file replay");
                    return;
                }

                timestamp_ms += duration_ms;
                if realtime {
                    tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                }
            }

            debug!("File replay drained at {}ms", timestamp_ms);
            drained.notify_one();
        });

        self.task = Some(task);
        self.capturing = true;

        info!("File capture started: {}", self.path.display());

        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        let replay = self.task.take();
        if let Some(task) = &replay {
            task.abort();
        }
        self.capturing = false;

        // The coordinator may be blocked on this call while the channel is
        // full, so the ack goes out from its own task, after the replay ends.
        let messages = self.messages.clone();
        tokio::spawn(async move {
            if let Some(task) = replay {
                let _ = task.await;
            }
            if messages.send(FrontendMessage::Stopped).await.is_err() {
                debug!("Coordinator went away before stop acknowledgment");
            }
        });

        info!("File capture stopped: {}", self.path.display());

        Ok(())
    }

    async fn set_device(&mut self, device_id: &str) -> Result<()> {
        warn!(
            "File front-end has no input devices; recording {} as selected",
            device_id
        );
        self.device_id = Some(device_id.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}

impl Drop for WavFileFrontend {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frontend::frontend_channel;

    #[tokio::test]
    async fn test_set_device_recorded() {
        let (tx, _rx) = frontend_channel(4);
        let mut frontend = WavFileFrontend::new("unused.wav", tx);

        frontend.set_device("line-in").await.unwrap();
        assert_eq!(frontend.device_id(), Some("line-in"));
    }

    #[tokio::test]
    async fn test_stop_when_idle_sends_nothing() {
        let (tx, mut rx) = frontend_channel(4);
        let mut frontend = WavFileFrontend::new("unused.wav", tx);

        frontend.stop_capture().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_fails_start() {
        let (tx, _rx) = frontend_channel(4);
        let mut frontend = WavFileFrontend::new("/nonexistent/input.wav", tx);

        assert!(frontend.start_capture(&CaptureConfig::default()).await.is_err());
    }
}
