// Integration tests for the WAV file front-end
//
// Replays generated WAV fixtures through a real coordinator, the same way the
// CLI's `record` command does.

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use voice_capture::audio::AlwaysGranted;
use voice_capture::{
    AudioFile, CaptureConfig, CaptureCoordinator, CaptureError, StopReason, WavFileFrontend,
};

fn write_int16_wav(path: &Path, sample_rate: u32, samples: &[i16]) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

fn fixture(dir: &TempDir, sample_rate: u32, samples: &[i16]) -> PathBuf {
    let path = dir.path().join("fixture.wav");
    write_int16_wav(&path, sample_rate, samples).unwrap();
    path
}

#[test]
fn test_audio_file_scales_int_samples() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fixture(&dir, 16000, &[0, 16384, -16384, i16::MIN]);

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 16000);
    assert_eq!(audio.channels, 1);
    assert_eq!(audio.samples, vec![0.0, 0.5, -0.5, -1.0]);
    Ok(())
}

#[test]
fn test_audio_file_missing() {
    assert!(AudioFile::open("/nonexistent/fixture.wav").is_err());
}

#[tokio::test]
async fn test_file_session_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    // 350ms: three full 100ms chunks and a 50ms tail
    let path = fixture(&dir, 16000, &vec![8192i16; 5600]);

    let coordinator = CaptureCoordinator::builder(dir.path().join("recovery"))
        .permission(AlwaysGranted)
        .spawn();
    let frontend = WavFileFrontend::new(&path, coordinator.frontend_sender());
    let drained = frontend.drained();
    coordinator.register_frontend(frontend).await?;

    coordinator.start(CaptureConfig::default()).await?;
    drained.notified().await;

    assert_eq!(coordinator.stop().await, StopReason::Acknowledged);

    let stats = coordinator.session_stats().await?;
    assert_eq!(stats.chunks_count, 4);
    assert_eq!(stats.raw_bytes, 5600 * 4);
    assert_eq!(stats.raw_duration_ms, 350);

    let export = coordinator.export().await?.unwrap();
    assert_eq!(export.duration_ms, 350);
    assert_eq!(export.mime_type, "audio/wav");

    coordinator.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_file_format_mismatch_fails_start() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fixture(&dir, 8000, &[0i16; 800]);

    let coordinator = CaptureCoordinator::builder(dir.path().join("recovery"))
        .permission(AlwaysGranted)
        .spawn();
    coordinator
        .register_frontend(WavFileFrontend::new(&path, coordinator.frontend_sender()))
        .await?;

    match coordinator.start(CaptureConfig::default()).await {
        Err(CaptureError::StartFailed { message }) => assert!(message.contains("8000Hz")),
        other => panic!("expected StartFailed, got {:?}", other),
    }
    assert!(!coordinator.is_capturing().await);
    Ok(())
}

#[tokio::test]
async fn test_file_device_switch_accepted() -> Result<()> {
    let dir = TempDir::new()?;
    let path = fixture(&dir, 16000, &[0i16; 1600]);

    let coordinator = CaptureCoordinator::builder(dir.path().join("recovery"))
        .permission(AlwaysGranted)
        .spawn();
    coordinator
        .register_frontend(WavFileFrontend::new(&path, coordinator.frontend_sender()))
        .await?;

    coordinator.set_device("line-in").await?;
    Ok(())
}
