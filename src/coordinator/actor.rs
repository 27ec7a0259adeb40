//! The coordinator's event loop.
//!
//! One task owns every piece of session state. Commands from the handle,
//! messages from the front-end, the start/stop deadlines and the recovery
//! rotation timer are all multiplexed here, so nothing is shared-mutable and
//! chunks are processed strictly in arrival order.

use chrono::{DateTime, Utc};
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::events::{CaptureEvent, EventSender};
use super::state::{CaptureState, StopReason};
use crate::audio::chunk::{self, ChunkKind, IngestedChunk};
use crate::audio::frontend::{CaptureFrontend, FrontendMessage, FrontendReceiver, InboundChunk};
use crate::audio::permission::{ensure_permission, MicrophonePermission};
use crate::audio::vad::{VadConfig, VoiceActivityDetector};
use crate::error::{CaptureError, Result};
use crate::recovery::RecoveryBuffer;
use crate::session::{CaptureConfig, ExportedAudio, SessionAccumulator, SessionStats};

/// Encoded track contents
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Handshake bounds
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub start: Duration,
    pub stop: Duration,
}

pub(crate) enum Command {
    RegisterFrontend {
        frontend: Box<dyn CaptureFrontend>,
        reply: oneshot::Sender<()>,
    },
    Start {
        config: CaptureConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        reply: oneshot::Sender<StopReason>,
    },
    SetPaused {
        paused: bool,
        reply: oneshot::Sender<()>,
    },
    SetDevice {
        device_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    CapturedAudio {
        reply: oneshot::Sender<Vec<u8>>,
    },
    EncodedAudio {
        reply: oneshot::Sender<EncodedAudio>,
    },
    ClearCapturedAudio {
        reply: oneshot::Sender<()>,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    Export {
        reply: oneshot::Sender<Option<ExportedAudio>>,
    },
    RecoveryBuffers {
        window: Duration,
        reply: oneshot::Sender<Vec<Vec<u8>>>,
    },
    ClearRecoveryBuffers {
        reply: oneshot::Sender<Result<usize>>,
    },
    Shutdown {
        reply: oneshot::Sender<StopReason>,
    },
}

/// `None` deadlines lie beyond what the clock can represent
struct PendingStart {
    config: CaptureConfig,
    deadline: Option<Instant>,
    waiters: Vec<oneshot::Sender<Result<()>>>,
}

struct PendingStop {
    deadline: Option<Instant>,
    waiters: Vec<oneshot::Sender<StopReason>>,
}

pub(crate) struct CaptureActor {
    commands: mpsc::Receiver<Command>,
    frontend_rx: FrontendReceiver,
    events: EventSender,
    permission: Box<dyn MicrophonePermission>,
    frontend: Option<Box<dyn CaptureFrontend>>,
    recovery: RecoveryBuffer,
    timeouts: Timeouts,

    config: CaptureConfig,
    state: CaptureState,
    capturing: bool,
    paused: bool,
    stop_requested: bool,

    session: SessionAccumulator,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    dropped_chunks: usize,
    vad: VoiceActivityDetector,
    level: f32,

    pending_start: Option<PendingStart>,
    pending_stop: Option<PendingStop>,
    rotation: Option<Interval>,

    /// Stop acks still owed by a front-end we stopped waiting on. The
    /// front-end sends these before its next `Started`, so any `Stopped`
    /// counted here belongs to an abandoned session.
    stale_stop_acks: usize,
}

impl CaptureActor {
    pub(crate) fn new(
        commands: mpsc::Receiver<Command>,
        frontend_rx: FrontendReceiver,
        events: EventSender,
        permission: Box<dyn MicrophonePermission>,
        recovery: RecoveryBuffer,
        timeouts: Timeouts,
    ) -> Self {
        let config = CaptureConfig::default();
        let vad = VoiceActivityDetector::new(VadConfig::from(&config));

        Self {
            commands,
            frontend_rx,
            events,
            permission,
            frontend: None,
            recovery,
            timeouts,
            config,
            state: CaptureState::Idle,
            capturing: false,
            paused: false,
            stop_requested: false,
            session: SessionAccumulator::new(),
            session_id: None,
            started_at: None,
            dropped_chunks: 0,
            vad,
            level: 0.0,
            pending_start: None,
            pending_stop: None,
            rotation: None,
            stale_stop_acks: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Capture coordinator started");

        loop {
            let start_deadline = self.pending_start.as_ref().and_then(|p| p.deadline);
            let stop_deadline = self.pending_stop.as_ref().and_then(|p| p.deadline);

            // Queued front-end messages drain before commands, so a command
            // observes every chunk delivered ahead of it.
            tokio::select! {
                biased;

                Some(message) = self.frontend_rx.recv() => self.handle_frontend(message),
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All coordinator handles dropped");
                        self.teardown().await;
                        break;
                    }
                },
                _ = sleep_until_opt(start_deadline) => self.start_timed_out().await,
                _ = sleep_until_opt(stop_deadline) => {
                    warn!(
                        "Front-end did not acknowledge stop within {}ms, finalizing anyway",
                        self.timeouts.stop.as_millis()
                    );
                    self.stale_stop_acks += 1;
                    self.finalize_stop(StopReason::TimedOut);
                }
                _ = tick_opt(&mut self.rotation) => self.rotate_recovery(),
            }
        }

        info!("Capture coordinator stopped");
    }

    /// Returns false once the loop should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::RegisterFrontend { frontend, reply } => {
                if self.capturing {
                    warn!("Replacing capture front-end while capturing");
                }
                info!("Registered capture front-end: {}", frontend.name());
                self.frontend = Some(frontend);
                let _ = reply.send(());
            }
            Command::Start { config, reply } => self.start(config, reply).await,
            Command::Stop { reply } => self.stop(reply).await,
            Command::SetPaused { paused, reply } => {
                self.set_paused(paused);
                let _ = reply.send(());
            }
            Command::SetDevice { device_id, reply } => {
                let _ = reply.send(self.set_device(&device_id).await);
            }
            Command::CapturedAudio { reply } => {
                let _ = reply.send(self.session.raw_audio());
            }
            Command::EncodedAudio { reply } => {
                let _ = reply.send(EncodedAudio {
                    bytes: self.session.encoded_audio(),
                    mime_type: self.session.encoded_mime_type().map(str::to_string),
                });
            }
            Command::ClearCapturedAudio { reply } => {
                self.session.clear();
                self.dropped_chunks = 0;
                debug!("Captured audio cleared");
                let _ = reply.send(());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::Export { reply } => {
                let export = ExportedAudio::assemble(
                    &self.session,
                    self.config.sample_rate,
                    self.config.channels,
                );
                let _ = reply.send(export);
            }
            Command::RecoveryBuffers { window, reply } => {
                let _ = reply.send(self.recovery.recent(window));
            }
            Command::ClearRecoveryBuffers { reply } => {
                let _ = reply.send(self.recovery.clear());
            }
            Command::Shutdown { reply } => {
                let reason = self.teardown().await;
                let _ = reply.send(reason);
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Start
    // ------------------------------------------------------------------

    async fn start(&mut self, config: CaptureConfig, reply: oneshot::Sender<Result<()>>) {
        if self.capturing {
            if self.stop_requested {
                let _ = reply.send(Err(CaptureError::StopInProgress));
            } else {
                info!("Capture already active, ignoring start");
                let _ = reply.send(Ok(()));
            }
            return;
        }

        if let Some(pending) = self.pending_start.as_mut() {
            debug!("Start already in flight, attaching caller");
            pending.waiters.push(reply);
            return;
        }

        if let Err(e) = config.validate() {
            let _ = reply.send(Err(e));
            return;
        }

        info!(
            "Starting capture ({}Hz, {} channels, {}ms chunks)",
            config.sample_rate, config.channels, config.chunk_duration_ms
        );
        self.set_state(CaptureState::Starting);

        if !ensure_permission(self.permission.as_ref()).await {
            self.fail_start(CaptureError::PermissionDenied, vec![reply]);
            return;
        }

        let issued = match self.frontend.as_mut() {
            Some(frontend) => frontend.start_capture(&config).await.map_err(|e| {
                CaptureError::StartFailed {
                    message: format!("{:#}", e),
                }
            }),
            None => Err(CaptureError::NoCaptureTarget),
        };
        if let Err(error) = issued {
            self.fail_start(error, vec![reply]);
            return;
        }

        self.pending_start = Some(PendingStart {
            config,
            deadline: Instant::now().checked_add(self.timeouts.start),
            waiters: vec![reply],
        });
    }

    fn on_started(&mut self) {
        let Some(pending) = self.pending_start.take() else {
            debug!("Ignoring start acknowledgment with no start in flight");
            return;
        };

        self.config = pending.config;
        self.capturing = true;
        self.stale_stop_acks = 0;
        self.stop_requested = false;
        self.paused = false;

        self.session.clear();
        self.dropped_chunks = 0;
        self.vad = VoiceActivityDetector::new(VadConfig::from(&self.config));
        self.level = 0.0;
        self.session_id = Some(format!("capture-{}", uuid::Uuid::new_v4()));
        self.started_at = Some(Utc::now());

        if let Err(e) = self.recovery.start() {
            warn!("Recovery buffer unavailable for this session: {}", e);
            self.emit(CaptureEvent::Error {
                error: CaptureError::WriteFailure {
                    path: self.recovery.dir().display().to_string(),
                    message: e.to_string(),
                },
            });
        }

        let period = self.config.rotation_interval();
        self.rotation = match Instant::now().checked_add(period) {
            Some(first) => {
                let mut rotation = interval_at(first, period);
                rotation.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(rotation)
            }
            None => {
                warn!(
                    "Rotation interval of {}s is out of range, flushing recovery only on stop",
                    period.as_secs()
                );
                None
            }
        };

        info!(
            "Capture started: {}",
            self.session_id.as_deref().unwrap_or_default()
        );
        self.set_state(CaptureState::Recording);

        for waiter in pending.waiters {
            let _ = waiter.send(Ok(()));
        }
    }

    async fn start_timed_out(&mut self) {
        let Some(pending) = self.pending_start.take() else {
            return;
        };

        let timeout_ms = self.timeouts.start.as_millis() as u64;
        if let Some(frontend) = self.frontend.as_mut() {
            match frontend.stop_capture().await {
                Ok(()) => self.stale_stop_acks += 1,
                Err(e) => debug!("Stop after start timeout failed: {:#}", e),
            }
        }
        self.fail_start(CaptureError::StartTimeout { timeout_ms }, pending.waiters);
    }

    fn fail_start(&mut self, error: CaptureError, waiters: Vec<oneshot::Sender<Result<()>>>) {
        warn!("Capture start failed: {}", error);

        self.set_state(CaptureState::Error);
        self.set_state(CaptureState::Idle);

        for waiter in waiters {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    // ------------------------------------------------------------------
    // Stop
    // ------------------------------------------------------------------

    async fn stop(&mut self, reply: oneshot::Sender<StopReason>) {
        if !self.capturing {
            let _ = reply.send(StopReason::NotCapturing);
            return;
        }

        if let Some(pending) = self.pending_stop.as_mut() {
            debug!("Stop already in flight, attaching caller");
            pending.waiters.push(reply);
            return;
        }

        info!("Stopping capture");

        self.stop_requested = true;
        self.paused = false;
        self.pending_stop = Some(PendingStop {
            deadline: Instant::now().checked_add(self.timeouts.stop),
            waiters: vec![reply],
        });
        self.set_state(CaptureState::Stopping);

        if let Some(frontend) = self.frontend.as_mut() {
            if let Err(e) = frontend.stop_capture().await {
                warn!("Front-end stop command failed: {:#}", e);
            }
        }
    }

    /// Converge on idle; safe to call from the ack, the timeout or teardown.
    fn finalize_stop(&mut self, reason: StopReason) {
        if !self.capturing {
            self.settle_stop_waiters(reason);
            return;
        }

        self.capturing = false;
        self.stop_requested = false;
        self.paused = false;
        self.rotation = None;

        if let Err(e) = self.recovery.stop() {
            warn!("Final recovery flush failed: {}", e);
            self.emit(CaptureEvent::Error { error: e });
        }

        self.reset_voice();

        info!(
            "Capture stopped ({:?}): {} raw bytes, {} encoded bytes",
            reason,
            self.session.raw_bytes(),
            self.session.encoded_bytes()
        );
        self.set_state(CaptureState::Idle);

        self.settle_stop_waiters(reason);
    }

    fn settle_stop_waiters(&mut self, reason: StopReason) {
        if let Some(pending) = self.pending_stop.take() {
            for waiter in pending.waiters {
                let _ = waiter.send(reason);
            }
        }
    }

    async fn teardown(&mut self) -> StopReason {
        if let Some(pending) = self.pending_start.take() {
            for waiter in pending.waiters {
                let _ = waiter.send(Err(CaptureError::CoordinatorClosed));
            }
        }

        if !self.capturing {
            return StopReason::NotCapturing;
        }

        if !self.stop_requested {
            if let Some(frontend) = self.frontend.as_mut() {
                if let Err(e) = frontend.stop_capture().await {
                    warn!("Front-end stop command failed: {:#}", e);
                }
            }
        }
        self.finalize_stop(StopReason::Shutdown);
        StopReason::Shutdown
    }

    // ------------------------------------------------------------------
    // Front-end messages
    // ------------------------------------------------------------------

    fn handle_frontend(&mut self, message: FrontendMessage) {
        match message {
            FrontendMessage::Chunk(chunk) => self.on_chunk(chunk),
            FrontendMessage::Started => self.on_started(),
            FrontendMessage::Stopped => self.on_stopped(),
            FrontendMessage::Error(message) => self.on_frontend_error(message),
        }
    }

    fn on_stopped(&mut self) {
        if self.stale_stop_acks > 0 {
            self.stale_stop_acks -= 1;
            debug!("Ignoring late stop acknowledgment from an abandoned session");
            return;
        }

        if let Some(pending) = self.pending_start.take() {
            let error = CaptureError::StartFailed {
                message: "front-end stopped before acknowledging start".to_string(),
            };
            self.fail_start(error, pending.waiters);
            return;
        }

        if !self.capturing {
            debug!("Ignoring stop acknowledgment while idle");
            return;
        }

        if self.stop_requested {
            self.finalize_stop(StopReason::Acknowledged);
        } else {
            error!("Capture front-end stopped unexpectedly");
            self.finalize_stop(StopReason::Unexpected);
            self.emit(CaptureEvent::Error {
                error: CaptureError::UnexpectedStop,
            });
        }
    }

    fn on_frontend_error(&mut self, message: String) {
        if let Some(pending) = self.pending_start.take() {
            self.fail_start(CaptureError::StartFailed { message }, pending.waiters);
            return;
        }

        if self.capturing {
            warn!("Capture front-end error: {}", message);
            self.emit(CaptureEvent::Error {
                error: CaptureError::Frontend { message },
            });
        } else {
            debug!("Ignoring front-end error while idle: {}", message);
        }
    }

    fn on_chunk(&mut self, inbound: InboundChunk) {
        if !self.capturing || self.paused {
            self.dropped_chunks += 1;
            debug!(
                "Dropping chunk at {}ms (capturing={}, paused={})",
                inbound.timestamp_ms, self.capturing, self.paused
            );
            return;
        }

        let IngestedChunk {
            chunk,
            kind,
            level,
            rms,
        } = match chunk::ingest(inbound, self.config.sample_rate) {
            Ok(ingested) => ingested,
            Err(e) => {
                warn!("{}", e);
                self.emit(CaptureEvent::Error { error: e });
                return;
            }
        };

        let timestamp_ms = chunk.timestamp_ms;
        let encoded = !matches!(kind, ChunkKind::Raw);

        self.emit(CaptureEvent::AudioChunk {
            timestamp_ms,
            duration_ms: chunk.duration_ms,
            byte_len: chunk.len(),
            encoded,
        });

        self.recovery.push(Arc::clone(&chunk.bytes));
        self.session.push(chunk, &kind);

        self.level = level;
        self.emit(CaptureEvent::AudioLevel { level });

        if let Some(edge) = self.vad.process(rms, timestamp_ms) {
            debug!(
                "Voice {} at {}ms",
                if edge.is_active() { "started" } else { "ended" },
                timestamp_ms
            );
            self.emit(CaptureEvent::VoiceActivity {
                active: edge.is_active(),
            });
        }
    }

    // ------------------------------------------------------------------
    // Pause, device, recovery
    // ------------------------------------------------------------------

    fn set_paused(&mut self, paused: bool) {
        if !self.capturing || self.stop_requested {
            debug!("Ignoring pause change while not recording");
            return;
        }
        if self.paused == paused {
            return;
        }

        self.paused = paused;
        if paused {
            self.reset_voice();
            info!("Capture paused");
            self.set_state(CaptureState::Paused);
        } else {
            info!("Capture resumed");
            self.set_state(CaptureState::Recording);
        }
    }

    async fn set_device(&mut self, device_id: &str) -> Result<()> {
        let frontend = self.frontend.as_mut().ok_or(CaptureError::NoCaptureTarget)?;

        info!("Switching input device to {}", device_id);
        frontend
            .set_device(device_id)
            .await
            .map_err(|e| CaptureError::Frontend {
                message: format!("{:#}", e),
            })
    }

    fn rotate_recovery(&mut self) {
        debug!("Rotating recovery buffer");
        if let Err(e) = self.recovery.rotate() {
            warn!("Recovery rotation failed: {}", e);
            self.emit(CaptureEvent::Error { error: e });
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Force voice-active false and level 0, emitting only what changed.
    fn reset_voice(&mut self) {
        if self.vad.is_voice_active() {
            self.emit(CaptureEvent::VoiceActivity { active: false });
        }
        self.vad.reset();

        self.level = 0.0;
        self.emit(CaptureEvent::AudioLevel { level: 0.0 });
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state {
            return;
        }
        debug!("Capture state {} -> {}", self.state, state);
        self.state = state;
        self.emit(CaptureEvent::StateChanged { state });
    }

    fn emit(&self, event: CaptureEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            state: self.state,
            capturing: self.capturing,
            paused: self.paused,
            started_at: self.started_at,
            raw_bytes: self.session.raw_bytes(),
            raw_duration_ms: self.session.raw_duration_ms(),
            encoded_bytes: self.session.encoded_bytes(),
            encoded_duration_ms: self.session.encoded_duration_ms(),
            encoded_mime_type: self.session.encoded_mime_type().map(str::to_string),
            chunks_count: self.session.raw_chunks().len() + self.session.encoded_chunks().len(),
            dropped_chunks: self.dropped_chunks,
            voice_active: self.vad.is_voice_active(),
            level: self.level,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
