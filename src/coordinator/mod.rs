//! Capture lifecycle coordinator.
//!
//! `CaptureCoordinator` is a handle onto a single background task that
//! owns the capture state machine, the session tracks, the recovery buffer
//! and voice activity detection. Every method is a request/response round
//! trip to that task; events are published on a broadcast channel.

mod actor;
mod events;
mod state;

pub use actor::{EncodedAudio, Timeouts};
pub use events::{CaptureEvent, EventReceiver};
pub use state::{CaptureState, StopReason};

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::audio::frontend::{frontend_channel, CaptureFrontend, FrontendSender};
use crate::audio::permission::{platform_permission, MicrophonePermission};
use crate::error::{CaptureError, Result};
use crate::recovery::RecoveryBuffer;
use crate::session::{CaptureConfig, ExportedAudio, SessionStats};
use actor::{CaptureActor, Command};
use events::EventSender;

/// Upper bound on waiting for the front-end's start acknowledgment
pub const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for the front-end's stop acknowledgment
pub const STOP_TIMEOUT: Duration = Duration::from_millis(1500);

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const DEFAULT_FRONTEND_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Builder for a `CaptureCoordinator`
pub struct CoordinatorBuilder {
    recovery_dir: PathBuf,
    permission: Box<dyn MicrophonePermission>,
    timeouts: Timeouts,
    frontend_capacity: usize,
}

impl CoordinatorBuilder {
    pub fn permission(mut self, permission: impl MicrophonePermission + 'static) -> Self {
        self.permission = Box::new(permission);
        self
    }

    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.start = timeout;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.stop = timeout;
        self
    }

    /// Bound on queued front-end messages before the front-end is backpressured
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.frontend_capacity = capacity.max(1);
        self
    }

    /// Spawn the coordinator task; must be called within a Tokio runtime.
    pub fn spawn(self) -> CaptureCoordinator {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (frontend_tx, frontend_rx) = frontend_channel(self.frontend_capacity);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let actor = CaptureActor::new(
            commands_rx,
            frontend_rx,
            events_tx.clone(),
            self.permission,
            RecoveryBuffer::new(self.recovery_dir),
            self.timeouts,
        );
        let task = tokio::spawn(actor.run());

        CaptureCoordinator {
            commands: commands_tx,
            events: events_tx,
            frontend_tx,
            task,
        }
    }
}

/// Handle to the capture coordinator task
pub struct CaptureCoordinator {
    commands: mpsc::Sender<Command>,
    events: EventSender,
    frontend_tx: FrontendSender,
    task: JoinHandle<()>,
}

impl CaptureCoordinator {
    /// Spawn a coordinator with default timeouts and platform permission
    pub fn new(recovery_dir: impl Into<PathBuf>) -> Self {
        Self::builder(recovery_dir).spawn()
    }

    pub fn builder(recovery_dir: impl Into<PathBuf>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            recovery_dir: recovery_dir.into(),
            permission: platform_permission(),
            timeouts: Timeouts {
                start: START_TIMEOUT,
                stop: STOP_TIMEOUT,
            },
            frontend_capacity: DEFAULT_FRONTEND_CAPACITY,
        }
    }

    /// Sender a front-end uses to deliver chunks and acknowledgments
    pub fn frontend_sender(&self) -> FrontendSender {
        self.frontend_tx.clone()
    }

    /// Subscribe to coordinator events from this point on
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Install the capture front-end, replacing any previous one
    pub async fn register_frontend(&self, frontend: impl CaptureFrontend + 'static) -> Result<()> {
        let frontend: Box<dyn CaptureFrontend> = Box::new(frontend);
        self.request(|reply| Command::RegisterFrontend { frontend, reply })
            .await
    }

    /// Start capturing.
    ///
    /// Resolves once the front-end acknowledges, fails, or the start timeout
    /// elapses. Concurrent calls share one outcome; calling while already
    /// recording succeeds immediately.
    pub async fn start(&self, config: CaptureConfig) -> Result<()> {
        self.request(|reply| Command::Start { config, reply })
            .await?
    }

    /// Stop capturing.
    ///
    /// Never fails: resolves on the front-end's acknowledgment or after the
    /// stop timeout, whichever comes first. Concurrent calls share one
    /// outcome.
    pub async fn stop(&self) -> StopReason {
        self.request(|reply| Command::Stop { reply })
            .await
            .unwrap_or(StopReason::NotCapturing)
    }

    /// Discard incoming chunks while paused; ignored unless recording
    pub async fn set_paused(&self, paused: bool) -> Result<()> {
        self.request(|reply| Command::SetPaused { paused, reply })
            .await
    }

    pub async fn set_device(&self, device_id: impl Into<String>) -> Result<()> {
        let device_id = device_id.into();
        self.request(|reply| Command::SetDevice { device_id, reply })
            .await?
    }

    pub async fn state(&self) -> Result<CaptureState> {
        Ok(self.session_stats().await?.state)
    }

    pub async fn is_capturing(&self) -> bool {
        self.session_stats()
            .await
            .map(|stats| stats.capturing)
            .unwrap_or(false)
    }

    pub async fn is_paused(&self) -> bool {
        self.session_stats()
            .await
            .map(|stats| stats.paused)
            .unwrap_or(false)
    }

    /// Raw track of the current (or last) session as little-endian f32 PCM
    pub async fn captured_audio(&self) -> Result<Vec<u8>> {
        self.request(|reply| Command::CapturedAudio { reply }).await
    }

    /// Encoded track of the current (or last) session
    pub async fn encoded_audio(&self) -> Result<EncodedAudio> {
        self.request(|reply| Command::EncodedAudio { reply }).await
    }

    pub async fn clear_captured_audio(&self) -> Result<()> {
        self.request(|reply| Command::ClearCapturedAudio { reply })
            .await
    }

    pub async fn session_stats(&self) -> Result<SessionStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Export-ready audio; None when nothing was captured
    pub async fn export(&self) -> Result<Option<ExportedAudio>> {
        self.request(|reply| Command::Export { reply }).await
    }

    /// Recovery files modified within `window`, then unflushed chunks
    pub async fn recovery_buffers(&self, window: Duration) -> Result<Vec<Vec<u8>>> {
        self.request(|reply| Command::RecoveryBuffers { window, reply })
            .await
    }

    /// Delete every recovery file; returns how many were removed
    pub async fn clear_recovery_buffers(&self) -> Result<usize> {
        self.request(|reply| Command::ClearRecoveryBuffers { reply })
            .await?
    }

    /// Stop any active session and end the coordinator task
    pub async fn shutdown(self) -> StopReason {
        let reason = self
            .request(|reply| Command::Shutdown { reply })
            .await
            .unwrap_or(StopReason::NotCapturing);

        if let Err(e) = self.task.await {
            debug!("Coordinator task ended abnormally: {}", e);
        }

        reason
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| CaptureError::CoordinatorClosed)?;
        response.await.map_err(|_| CaptureError::CoordinatorClosed)
    }
}
