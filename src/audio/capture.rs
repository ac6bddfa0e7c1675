use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{IntakeError, Result};

/// Encoded formats in order of preference: codec-qualified container,
/// bare container, generic fallback.
pub const PREFERRED_FORMATS: [&str; 3] = ["audio/webm;codecs=opus", "audio/webm", "audio/mp4"];

/// Capture adapter configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// How often the device delivers an encoded chunk (default: 100ms)
    pub chunk_interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chunk_interval: Duration::from_millis(100),
        }
    }
}

/// Lifecycle of the underlying capture resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Capturing,
    Paused,
}

/// Microphone-like capture source
///
/// Implementations own the hardware resource. `open` acquires it and returns
/// a channel of encoded chunks; `release` gives it back and must close that
/// channel so the collected blob can be finalized.
#[async_trait::async_trait]
pub trait CaptureDevice: Send {
    /// Whether the device can encode to the given mime type
    fn supports(&self, mime: &str) -> bool;

    /// Acquire the device and start emitting chunks every `chunk_interval`
    ///
    /// Fails with `MicrophoneUnavailable` if permission is denied or no
    /// device exists.
    async fn open(&mut self, mime: &str, chunk_interval: Duration)
        -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Suspend or resume chunk delivery without releasing the device
    fn set_paused(&mut self, paused: bool);

    /// Release the device
    fn release(&mut self);

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Pick the first preferred format the device supports.
///
/// Returns an empty string (device default) when none match.
pub fn pick_format<D: CaptureDevice + ?Sized>(device: &D) -> String {
    PREFERRED_FORMATS
        .iter()
        .find(|mime| device.supports(mime))
        .map(|mime| mime.to_string())
        .unwrap_or_default()
}

/// Wraps a capture device and assembles its chunks into one blob.
///
/// The device is released exactly once per open/stop cycle, including when
/// opening fails and when the adapter is dropped mid-capture.
pub struct CaptureAdapter<D: CaptureDevice> {
    device: D,
    config: CaptureConfig,
    state: CaptureState,
    mime: String,
    collector: Option<JoinHandle<Vec<u8>>>,
}

impl<D: CaptureDevice> CaptureAdapter<D> {
    pub fn new(device: D, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            state: CaptureState::Inactive,
            mime: String::new(),
            collector: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    pub fn is_paused(&self) -> bool {
        self.state == CaptureState::Paused
    }

    /// Mime type chosen for the current (or last) capture
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Acquire the device and start collecting chunks
    pub async fn open(&mut self) -> Result<()> {
        if self.state != CaptureState::Inactive {
            return Err(IntakeError::InvalidCaptureState(
                "a capture is already open".to_string(),
            ));
        }

        let mime = pick_format(&self.device);
        info!(
            "Opening capture device {} (format: {})",
            self.device.name(),
            if mime.is_empty() { "device default" } else { mime.as_str() }
        );

        let mut chunk_rx = match self.device.open(&mime, self.config.chunk_interval).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Failed to open capture device {}: {}", self.device.name(), e);
                self.device.release();
                return Err(e);
            }
        };

        let collector = tokio::spawn(async move {
            let mut blob = Vec::new();
            let mut chunks = 0usize;
            while let Some(chunk) = chunk_rx.recv().await {
                chunks += 1;
                blob.extend_from_slice(&chunk);
            }
            debug!("Capture collector finished: {} chunks, {} bytes", chunks, blob.len());
            blob
        });

        self.mime = mime;
        self.collector = Some(collector);
        self.state = CaptureState::Capturing;
        Ok(())
    }

    /// Pause chunk delivery. No-op unless actively capturing.
    pub fn pause(&mut self) -> bool {
        if self.state != CaptureState::Capturing {
            return false;
        }
        self.device.set_paused(true);
        self.state = CaptureState::Paused;
        true
    }

    /// Resume chunk delivery. No-op unless paused.
    pub fn resume(&mut self) -> bool {
        if self.state != CaptureState::Paused {
            return false;
        }
        self.device.set_paused(false);
        self.state = CaptureState::Capturing;
        true
    }

    /// Release the device and return the concatenation of all chunks
    pub async fn stop(&mut self) -> Result<Vec<u8>> {
        if self.state == CaptureState::Inactive {
            return Err(IntakeError::InvalidCaptureState(
                "no capture is open".to_string(),
            ));
        }

        self.device.release();
        self.state = CaptureState::Inactive;

        let collector = self.collector.take().ok_or_else(|| {
            IntakeError::InvalidCaptureState("capture collector missing".to_string())
        })?;

        let blob = collector.await.map_err(|e| {
            IntakeError::InvalidCaptureState(format!("capture collector failed: {}", e))
        })?;

        info!("Capture stopped: {} bytes ({})", blob.len(), self.device.name());
        Ok(blob)
    }

    /// Release the device and discard anything captured so far
    pub fn abort(&mut self) {
        if self.state == CaptureState::Inactive {
            return;
        }
        self.device.release();
        self.state = CaptureState::Inactive;
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        info!("Capture aborted ({})", self.device.name());
    }
}

impl<D: CaptureDevice> Drop for CaptureAdapter<D> {
    fn drop(&mut self) {
        if self.state != CaptureState::Inactive {
            warn!("Capture adapter dropped while open, releasing device");
            self.abort();
        }
    }
}

/// Replays an encoded audio file as if it were being captured live.
///
/// Emits `chunk_size` bytes per chunk interval while not paused. Once the
/// source is exhausted the device stays open (emitting nothing) until
/// released.
pub struct FileCaptureDevice {
    name: String,
    mime: String,
    data: Arc<[u8]>,
    chunk_size: usize,
    paused: Arc<AtomicBool>,
    stop_tx: Option<watch::Sender<bool>>,
    emitter: Option<JoinHandle<()>>,
}

impl FileCaptureDevice {
    pub fn from_bytes(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: Arc::from(data),
            chunk_size: 3200, // 100ms of 16kHz mono PCM
            paused: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            emitter: None,
        }
    }

    /// Load a source file, inferring its mime type from the extension
    pub fn open_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mime = mime_for_path(path);
        Ok(Self::from_bytes(path.display().to_string(), mime, data))
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn source_mime(&self) -> &str {
        &self.mime
    }
}

/// Best-effort mime type from a file extension
pub fn mime_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "webm" => "audio/webm",
        "mp4" | "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[async_trait::async_trait]
impl CaptureDevice for FileCaptureDevice {
    fn supports(&self, mime: &str) -> bool {
        // Only the source's own container can be "recorded"
        mime.split(';').next().unwrap_or(mime).trim() == self.mime
    }

    async fn open(
        &mut self,
        _mime: &str,
        chunk_interval: Duration,
    ) -> Result<mpsc::Receiver<Vec<u8>>> {
        if self.data.is_empty() {
            return Err(IntakeError::MicrophoneUnavailable(format!(
                "capture source {} has no data",
                self.name
            )));
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        self.paused.store(false, Ordering::SeqCst);

        let data = Arc::clone(&self.data);
        let chunk_size = self.chunk_size;
        let paused = Arc::clone(&self.paused);

        let emitter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(chunk_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; chunks arrive one interval in
            ticker.tick().await;

            let mut offset = 0usize;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if paused.load(Ordering::SeqCst) || offset >= data.len() {
                            continue;
                        }
                        let end = (offset + chunk_size).min(data.len());
                        if chunk_tx.send(data[offset..end].to_vec()).await.is_err() {
                            break;
                        }
                        offset = end;
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        self.stop_tx = Some(stop_tx);
        self.emitter = Some(emitter);
        Ok(chunk_rx)
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn release(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        // The emitter owns the chunk sender; it exits on the stop signal
        self.emitter.take();
    }

    fn name(&self) -> &str {
        &self.name
    }
}
