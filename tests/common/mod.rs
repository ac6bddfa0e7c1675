// Shared helpers for integration tests: WAV fixtures and local HTTP servers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use dictation_intake::config::EndpointsConfig;
use tokio::sync::{Barrier, Mutex};

/// Encode interleaved i16 samples as a WAV file in memory
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// A ramp of `frames` frames, identical across channels
pub fn ramp_wav(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let value = ((i % 2000) as i32 * 16 - 16000) as i16;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    wav_bytes(sample_rate, channels, &samples)
}

/// Read a WAV file back into (spec, interleaved samples)
pub fn read_wav(bytes: &[u8]) -> (hound::WavSpec, Vec<i16>) {
    let reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    (spec, samples)
}

/// A multipart request as seen by the mock webhook
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub hook: String,
    pub fields: HashMap<String, String>,
    /// (field name, file name, byte length)
    pub files: Vec<(String, String, usize)>,
}

#[derive(Clone, Default)]
pub struct HookState {
    pub received: Arc<Mutex<Vec<ReceivedRequest>>>,
    /// Status per hook name; 200 when absent
    pub statuses: Arc<Mutex<HashMap<String, u16>>>,
    /// When set, every request waits here before responding
    pub barrier: Option<Arc<Barrier>>,
}

async fn hook(
    State(state): State<HookState>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> StatusCode {
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default();
        match file_name {
            Some(file_name) => files.push((field_name, file_name, data.len())),
            None => {
                fields.insert(field_name, String::from_utf8_lossy(&data).into_owned());
            }
        }
    }

    state.received.lock().await.push(ReceivedRequest {
        hook: name.clone(),
        fields,
        files,
    });

    if let Some(barrier) = &state.barrier {
        barrier.wait().await;
    }

    let status = state.statuses.lock().await.get(&name).copied().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

pub struct MockWebhooks {
    pub addr: SocketAddr,
    pub state: HookState,
}

impl MockWebhooks {
    pub async fn start(state: HookState) -> Self {
        let app = Router::new()
            .route("/hooks/:name", post(hook))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn endpoints(&self) -> EndpointsConfig {
        let url = |name: &str| format!("http://{}/hooks/{}", self.addr, name);
        EndpointsConfig {
            audio_normal: url("audio"),
            audio_test: url("audio-test"),
            case_text: url("case-text"),
            case_photos: url("case-photos"),
        }
    }

    pub async fn set_status(&self, hook: &str, status: u16) {
        self.state
            .statuses
            .lock()
            .await
            .insert(hook.to_string(), status);
    }

    pub async fn received(&self) -> Vec<ReceivedRequest> {
        self.state.received.lock().await.clone()
    }
}
