use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn, Level};
use voice_capture::audio::wav::encode_float32_wav;
use voice_capture::{AudioFile, CaptureCoordinator, EventReceiver, Settings, WavFileFrontend};

#[derive(Parser)]
#[command(name = "voice-capture")]
#[command(about = "Voice capture coordinator: VAD, recovery buffers and WAV export")]
struct Cli {
    /// Settings file (extension optional)
    #[arg(short, long, default_value = "config/voice-capture", global = true)]
    config: String,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a capture session fed from a WAV file and export the result
    Record {
        /// WAV file to replay as microphone input
        #[arg(short, long)]
        input: PathBuf,

        /// Export directory (defaults to export.dir from settings)
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Deliver chunks at their real duration
        #[arg(long)]
        realtime: bool,

        /// Pause capture this many ms after start (use with --realtime)
        #[arg(long)]
        pause_at_ms: Option<u64>,

        /// Resume capture this many ms after start
        #[arg(long, requires = "pause_at_ms")]
        resume_at_ms: Option<u64>,
    },

    /// Dump recent recovery buffers to a single raw f32 file
    Recover {
        /// How far back to look
        #[arg(short, long, default_value = "10")]
        minutes: u64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete every recovery buffer file
    ClearRecovery,

    /// Wrap raw little-endian f32 PCM in a WAV container
    EncodeWav {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        #[arg(long, default_value = "1")]
        channels: u16,

        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Command::Record {
            input,
            output_dir,
            realtime,
            pause_at_ms,
            resume_at_ms,
        } => {
            let output_dir = match output_dir {
                Some(dir) => PathBuf::from(shellexpand::tilde(&dir).as_ref()),
                None => settings.export_dir(),
            };
            record(
                &settings,
                input,
                output_dir,
                realtime,
                pause_at_ms,
                resume_at_ms,
            )
            .await
        }
        Command::Recover { minutes, output } => recover(&settings, minutes, output).await,
        Command::ClearRecovery => {
            let coordinator = CaptureCoordinator::new(settings.recovery_dir());
            let removed = coordinator.clear_recovery_buffers().await?;
            info!("Removed {} recovery files", removed);
            coordinator.shutdown().await;
            Ok(())
        }
        Command::EncodeWav {
            input,
            sample_rate,
            channels,
            output,
        } => encode_wav(input, sample_rate, channels, output),
    }
}

async fn record(
    settings: &Settings,
    input: PathBuf,
    output_dir: PathBuf,
    realtime: bool,
    pause_at_ms: Option<u64>,
    resume_at_ms: Option<u64>,
) -> Result<()> {
    let audio = AudioFile::open(&input)?;

    let mut config = settings.capture.clone();
    config.sample_rate = audio.sample_rate;
    config.channels = audio.channels;
    drop(audio);

    let coordinator = CaptureCoordinator::new(settings.recovery_dir());
    let printer = tokio::spawn(print_events(coordinator.subscribe()));

    let frontend = WavFileFrontend::new(&input, coordinator.frontend_sender()).realtime(realtime);
    let drained = frontend.drained();
    coordinator.register_frontend(frontend).await?;

    coordinator
        .start(config)
        .await
        .context("Failed to start capture")?;
    let started = Instant::now();

    let pause_script = async {
        if let Some(at) = pause_at_ms {
            sleep_until(started + Duration::from_millis(at)).await;
            coordinator.set_paused(true).await?;
        }
        if let Some(at) = resume_at_ms {
            sleep_until(started + Duration::from_millis(at)).await;
            coordinator.set_paused(false).await?;
        }
        Ok::<_, voice_capture::CaptureError>(())
    };

    let (_, paused) = tokio::join!(drained.notified(), pause_script);
    paused?;

    let reason = coordinator.stop().await;
    info!("Capture stopped: {:?}", reason);

    let stats = coordinator.session_stats().await?;
    match coordinator.export().await? {
        Some(export) => {
            let stem = stats.session_id.as_deref().unwrap_or("recording");
            let path = export.write_to(&output_dir, stem)?;
            println!("{}", path.display());
        }
        None => warn!("Nothing captured, no export written"),
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);

    coordinator.shutdown().await;
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }

    Ok(())
}

async fn print_events(mut events: EventReceiver) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => info!("event: {}", json),
                Err(e) => warn!("Unserializable event: {}", e),
            },
            Err(RecvError::Lagged(skipped)) => warn!("Event printer lagged, {} skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn recover(settings: &Settings, minutes: u64, output: PathBuf) -> Result<()> {
    let coordinator = CaptureCoordinator::new(settings.recovery_dir());
    let buffers = coordinator
        .recovery_buffers(Duration::from_secs(minutes.saturating_mul(60)))
        .await?;
    coordinator.shutdown().await;

    let bytes = buffers.concat();
    fs::write(&output, &bytes).with_context(|| format!("Failed to write {:?}", output))?;

    info!(
        "Recovered {} buffers ({} bytes) into {}",
        buffers.len(),
        bytes.len(),
        output.display()
    );

    Ok(())
}

fn encode_wav(input: PathBuf, sample_rate: u32, channels: u16, output: PathBuf) -> Result<()> {
    let pcm = fs::read(&input).with_context(|| format!("Failed to read {:?}", input))?;
    if pcm.len() % 4 != 0 {
        warn!(
            "{} bytes is not a whole number of f32 samples; trailing bytes kept as-is",
            pcm.len()
        );
    }

    let wav = encode_float32_wav(&pcm, sample_rate, channels);
    fs::write(&output, &wav).with_context(|| format!("Failed to write {:?}", output))?;

    info!("Wrote {} ({} bytes)", output.display(), wav.len());

    Ok(())
}
