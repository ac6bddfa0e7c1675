use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dictation_intake::audio::{merge_segments, AudioSegment, CaptureAdapter, FileCaptureDevice, SegmentStore};
use dictation_intake::counters::{CounterStore, CountersService, HttpCounterStore, MemoryCounterStore};
use dictation_intake::submission::{CaseObservation, DictationKind, ImageFile, SubmissionAssembler, WebhookClient};
use dictation_intake::{AuthEvent, Config, Identity, Recorder, SessionContext};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dictation-intake", version, about = "Medical dictation intake")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/dictation-intake")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge encoded segments into one WAV file
    Merge {
        #[arg(required = true, num_args = 1..=4)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Record from a file source as if it were a live microphone
    Record {
        source: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        seconds: u64,
    },
    /// Merge segments and submit them as a dictation
    Dictate {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        patient: String,
        /// Send to the test endpoint
        #[arg(long)]
        test: bool,
        #[arg(required = true, num_args = 1..=4)]
        segments: Vec<PathBuf>,
    },
    /// Submit a structured case observation
    Case {
        #[arg(long)]
        uid: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        case_id: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long = "image")]
        images: Vec<PathBuf>,
    },
}

fn load_segments(paths: &[PathBuf]) -> Result<SegmentStore> {
    let mut store = SegmentStore::new();
    for (i, path) in paths.iter().enumerate() {
        let segment = AudioSegment::from_file(path)
            .with_context(|| format!("Failed to read segment {}", path.display()))?;
        store.insert(i + 1, segment)?;
    }
    Ok(store)
}

fn build_assembler(cfg: &Config, uid: String, email: String) -> SubmissionAssembler {
    let http = reqwest::Client::new();

    let store: Arc<dyn CounterStore> = match &cfg.counters.base_url {
        Some(url) => Arc::new(HttpCounterStore::new(http.clone(), url, &cfg.counters.collection)),
        None => {
            info!("No counters store configured, keeping counters in memory");
            Arc::new(MemoryCounterStore::new())
        }
    };

    let session = SessionContext::new();
    session.apply(AuthEvent::SignedIn(Identity::new(uid, email)));

    SubmissionAssembler::new(
        session,
        WebhookClient::new(http, cfg.delivery.soft_success_status),
        cfg.endpoints.clone(),
        CountersService::new(store),
    )
    .with_audio_filename(&cfg.delivery.audio_filename)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Merge { inputs, output } => {
            let store = load_segments(&inputs)?;
            let merged = merge_segments(&store.populated())?;
            std::fs::write(&output, &merged.wav)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote {} ({:.2}s)", output.display(), merged.duration_seconds);
        }

        Command::Record { source, output, seconds } => {
            let device = FileCaptureDevice::open_path(&source)
                .with_context(|| format!("Failed to open capture source {}", source.display()))?;
            let mut recorder = Recorder::new(CaptureAdapter::new(device, Default::default()));

            recorder.start().await?;
            for _ in 0..seconds {
                tokio::time::sleep(Duration::from_secs(1)).await;
                recorder.tick();
            }
            recorder.stop().await?;

            let blob = recorder.blob().context("Recorder produced no blob")?;
            std::fs::write(&output, blob)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!(
                "Recorded {}s ({} bytes) to {}",
                recorder.elapsed_seconds(),
                blob.len(),
                output.display()
            );
        }

        Command::Dictate { uid, email, patient, test, segments } => {
            let cfg = Config::load(&cli.config)?;
            info!("Loaded config: {}", cfg.service.name);

            let store = load_segments(&segments)?;
            let kind = if test { DictationKind::Test } else { DictationKind::Normal };
            let receipt = build_assembler(&cfg, uid, email)
                .submit_dictation(&store, &patient, kind)
                .await?;
            info!(
                "Dictation {} delivered ({:.2}s)",
                receipt.id,
                receipt.duration_seconds.unwrap_or_default()
            );
        }

        Command::Case { uid, email, case_id, text, images } => {
            let cfg = Config::load(&cli.config)?;
            info!("Loaded config: {}", cfg.service.name);

            let images = images
                .iter()
                .map(|p| ImageFile::from_path(p).with_context(|| format!("Failed to read {}", p.display())))
                .collect::<Result<Vec<_>>>()?;
            let receipt = build_assembler(&cfg, uid, email)
                .submit_case(CaseObservation { case_id, text, images })
                .await?;
            info!("Case {} delivered ({} requests)", receipt.id, receipt.deliveries.len());
        }
    }

    Ok(())
}
