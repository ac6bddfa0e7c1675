use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::audio::{AudioSegment, CaptureAdapter, CaptureDevice};
use crate::error::{IntakeError, Result};

/// Lifecycle of a single recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Recorded,
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingStatus::Idle => write!(f, "idle"),
            RecordingStatus::Recording => write!(f, "recording"),
            RecordingStatus::Paused => write!(f, "paused"),
            RecordingStatus::Recorded => write!(f, "recorded"),
        }
    }
}

/// Point-in-time view of a recorder
///
/// `captured_blob` is present iff `status` is `Recorded`.
#[derive(Debug, Clone, Default)]
pub struct RecordingSession {
    pub status: RecordingStatus,
    pub elapsed_seconds: u64,
    pub captured_blob: Option<Arc<[u8]>>,
    pub mime: String,
}

/// Commands accepted by [`Recorder::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Delete,
    Reset,
}

/// Recording state machine
///
/// Idle -> Recording <-> Paused -> Recorded -> Idle. Elapsed time is the
/// wall-clock span since start minus paused intervals, sampled by `tick`.
pub struct Recorder<D: CaptureDevice> {
    capture: CaptureAdapter<D>,
    status: RecordingStatus,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    elapsed_seconds: u64,
    blob: Option<Arc<[u8]>>,
}

impl<D: CaptureDevice> Recorder<D> {
    pub fn new(capture: CaptureAdapter<D>) -> Self {
        Self {
            capture,
            status: RecordingStatus::Idle,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            elapsed_seconds: 0,
            blob: None,
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn blob(&self) -> Option<&Arc<[u8]>> {
        self.blob.as_ref()
    }

    pub fn capture(&self) -> &CaptureAdapter<D> {
        &self.capture
    }

    pub fn snapshot(&self) -> RecordingSession {
        RecordingSession {
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            captured_blob: self.blob.clone(),
            mime: self.capture.mime().to_string(),
        }
    }

    /// Package the finished recording as a segment
    pub fn segment(&self) -> Option<AudioSegment> {
        self.blob.as_ref().map(|blob| {
            AudioSegment::new(Arc::clone(blob), self.capture.mime(), self.elapsed_seconds)
        })
    }

    /// Idle -> Recording. Stays Idle if the microphone cannot be opened.
    pub async fn start(&mut self) -> Result<()> {
        if self.status != RecordingStatus::Idle {
            return Err(IntakeError::InvalidTransition {
                from: self.status,
                action: "start",
            });
        }

        self.capture.open().await?;

        self.started_at = Some(Instant::now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.elapsed_seconds = 0;
        self.transition_to(RecordingStatus::Recording);
        Ok(())
    }

    /// Recording -> Paused. No-op unless the device is mid-capture.
    pub fn pause(&mut self) {
        if self.status != RecordingStatus::Recording || !self.capture.is_capturing() {
            return;
        }
        self.tick();
        if self.capture.pause() {
            self.paused_at = Some(Instant::now());
            self.transition_to(RecordingStatus::Paused);
        }
    }

    /// Paused -> Recording. No-op unless the device is paused.
    pub fn resume(&mut self) {
        if self.status != RecordingStatus::Paused || !self.capture.is_paused() {
            return;
        }
        if self.capture.resume() {
            if let Some(paused_at) = self.paused_at.take() {
                self.paused_total += paused_at.elapsed();
            }
            self.transition_to(RecordingStatus::Recording);
        }
    }

    /// Recording | Paused -> Recorded. Finalizes the blob and stops timing.
    pub async fn stop(&mut self) -> Result<()> {
        if !matches!(
            self.status,
            RecordingStatus::Recording | RecordingStatus::Paused
        ) {
            return Err(IntakeError::InvalidTransition {
                from: self.status,
                action: "stop",
            });
        }

        let blob = self.capture.stop().await;
        self.started_at = None;
        self.paused_at = None;

        match blob {
            Ok(blob) => {
                self.blob = Some(Arc::from(blob));
                self.transition_to(RecordingStatus::Recorded);
                Ok(())
            }
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                self.clear();
                Err(e)
            }
        }
    }

    /// Recorded -> Idle. Discards the blob and zeroes the timer.
    pub fn delete(&mut self) -> Result<()> {
        if self.status != RecordingStatus::Recorded {
            return Err(IntakeError::InvalidTransition {
                from: self.status,
                action: "delete",
            });
        }
        self.clear();
        Ok(())
    }

    /// External reset: back to Idle from any state, releasing the device
    pub fn reset(&mut self) {
        self.capture.abort();
        self.clear();
    }

    /// Sample elapsed time. Only advances while Recording.
    pub fn tick(&mut self) {
        if self.status != RecordingStatus::Recording {
            return;
        }
        if let Some(started_at) = self.started_at {
            let active = started_at.elapsed().saturating_sub(self.paused_total);
            self.elapsed_seconds = self.elapsed_seconds.max(active.as_secs());
        }
    }

    /// Dispatch a command to the matching transition
    pub async fn apply(&mut self, command: RecorderCommand) -> Result<()> {
        match command {
            RecorderCommand::Start => self.start().await,
            RecorderCommand::Pause => {
                self.pause();
                Ok(())
            }
            RecorderCommand::Resume => {
                self.resume();
                Ok(())
            }
            RecorderCommand::Stop => self.stop().await,
            RecorderCommand::Delete => self.delete(),
            RecorderCommand::Reset => {
                self.reset();
                Ok(())
            }
        }
    }

    /// Drive the recorder from a command channel, sampling elapsed time every
    /// `tick_interval` and publishing a snapshot after every change.
    ///
    /// Returns the recorder once the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<RecorderCommand>,
        updates: watch::Sender<RecordingSession>,
        tick_interval: Duration,
    ) -> Self {
        info!("Recorder loop started");

        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.status == RecordingStatus::Recording {
                        let before = self.elapsed_seconds;
                        self.tick();
                        if self.elapsed_seconds != before {
                            let _ = updates.send(self.snapshot());
                        }
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if let Err(e) = self.apply(command).await {
                        warn!("Recorder command {:?} failed: {}", command, e);
                    }
                    if command == RecorderCommand::Start || command == RecorderCommand::Resume {
                        // Align ticks with the start of the active period
                        ticker.reset();
                    }
                    let _ = updates.send(self.snapshot());
                }
            }
        }

        info!("Recorder loop stopped");
        self
    }

    fn clear(&mut self) {
        self.blob = None;
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.elapsed_seconds = 0;
        self.transition_to(RecordingStatus::Idle);
    }

    fn transition_to(&mut self, status: RecordingStatus) {
        if self.status != status {
            info!(from = %self.status, to = %status, elapsed_secs = self.elapsed_seconds, "recording transition");
        }
        self.status = status;
    }
}
