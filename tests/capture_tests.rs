// Integration tests for the capture adapter
//
// Verifies chunk assembly, pause behaviour, format selection and that the
// device is released exactly once per open/stop cycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dictation_intake::audio::{
    pick_format, CaptureAdapter, CaptureConfig, CaptureDevice, CaptureState, FileCaptureDevice,
};
use dictation_intake::{IntakeError, Result};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Device that counts releases and can refuse to open
struct CountingDevice {
    releases: Arc<AtomicUsize>,
    deny: bool,
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl CountingDevice {
    fn new(releases: Arc<AtomicUsize>, deny: bool) -> Self {
        Self {
            releases,
            deny,
            tx: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for CountingDevice {
    fn supports(&self, mime: &str) -> bool {
        mime == "audio/webm"
    }

    async fn open(&mut self, _mime: &str, _interval: Duration) -> Result<mpsc::Receiver<Vec<u8>>> {
        if self.deny {
            return Err(IntakeError::MicrophoneUnavailable("permission denied".to_string()));
        }
        let (tx, rx) = mpsc::channel(8);
        tx.send(vec![1, 2]).await.unwrap();
        tx.send(vec![3]).await.unwrap();
        self.tx = Some(tx);
        Ok(rx)
    }

    fn set_paused(&mut self, _paused: bool) {}

    fn release(&mut self) {
        self.tx = None;
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[tokio::test]
async fn test_stop_concatenates_chunks_and_releases_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let mut adapter = CaptureAdapter::new(
        CountingDevice::new(Arc::clone(&releases), false),
        CaptureConfig::default(),
    );

    adapter.open().await.unwrap();
    assert_eq!(adapter.state(), CaptureState::Capturing);
    assert_eq!(adapter.mime(), "audio/webm");

    let blob = adapter.stop().await.unwrap();

    assert_eq!(blob, vec![1, 2, 3]);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.state(), CaptureState::Inactive);

    drop(adapter);
    assert_eq!(releases.load(Ordering::SeqCst), 1, "drop after stop must not release again");
}

#[tokio::test]
async fn test_failed_open_releases_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let mut adapter = CaptureAdapter::new(
        CountingDevice::new(Arc::clone(&releases), true),
        CaptureConfig::default(),
    );

    let result = adapter.open().await;

    assert!(matches!(result, Err(IntakeError::MicrophoneUnavailable(_))));
    assert_eq!(adapter.state(), CaptureState::Inactive);
    drop(adapter);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_drop_while_open_releases_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    {
        let mut adapter = CaptureAdapter::new(
            CountingDevice::new(Arc::clone(&releases), false),
            CaptureConfig::default(),
        );
        adapter.open().await.unwrap();
    }
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_open_is_rejected() {
    let releases = Arc::new(AtomicUsize::new(0));
    let mut adapter = CaptureAdapter::new(
        CountingDevice::new(Arc::clone(&releases), false),
        CaptureConfig::default(),
    );

    adapter.open().await.unwrap();
    assert!(matches!(adapter.open().await, Err(IntakeError::InvalidCaptureState(_))));
    assert_eq!(adapter.state(), CaptureState::Capturing);

    adapter.stop().await.unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_without_open_is_not_a_device_error() {
    let releases = Arc::new(AtomicUsize::new(0));
    let mut adapter = CaptureAdapter::new(
        CountingDevice::new(Arc::clone(&releases), false),
        CaptureConfig::default(),
    );

    let result = adapter.stop().await;

    assert!(matches!(result, Err(IntakeError::InvalidCaptureState(_))));
    assert_eq!(releases.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_file_device_delivers_whole_source() {
    let data: Vec<u8> = (0..=255).collect();
    let device = FileCaptureDevice::from_bytes("src", "audio/webm", data.clone()).with_chunk_size(50);
    let mut adapter = CaptureAdapter::new(device, CaptureConfig::default());

    adapter.open().await.unwrap();
    sleep(Duration::from_secs(1)).await;
    let blob = adapter.stop().await.unwrap();

    assert_eq!(blob, data);
}

#[tokio::test(start_paused = true)]
async fn test_file_device_pause_withholds_chunks() {
    let device = FileCaptureDevice::from_bytes("src", "audio/webm", vec![9u8; 100]).with_chunk_size(1);
    let mut adapter = CaptureAdapter::new(
        device,
        CaptureConfig {
            chunk_interval: Duration::from_millis(100),
        },
    );

    adapter.open().await.unwrap();
    sleep(Duration::from_millis(250)).await;
    assert!(adapter.pause());
    sleep(Duration::from_secs(1)).await;
    let blob = adapter.stop().await.unwrap();

    assert_eq!(blob.len(), 2);
}

#[test]
fn test_format_preference() {
    let webm = FileCaptureDevice::from_bytes("a", "audio/webm", vec![1]);
    assert_eq!(pick_format(&webm), "audio/webm;codecs=opus");

    let mp4 = FileCaptureDevice::from_bytes("b", "audio/mp4", vec![1]);
    assert_eq!(pick_format(&mp4), "audio/mp4");

    let wav = FileCaptureDevice::from_bytes("c", "audio/wav", vec![1]);
    assert_eq!(pick_format(&wav), "", "unsupported formats fall back to the device default");
}
