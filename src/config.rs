use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::submission::DEFAULT_SOFT_SUCCESS_STATUS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub capture: CaptureSettings,
    #[serde(default)]
    pub counters: CountersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

/// Workflow webhook URLs, one per submission kind
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    pub audio_normal: String,
    pub audio_test: String,
    pub case_text: String,
    pub case_photos: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Non-2xx status treated as accepted
    #[serde(default = "default_soft_success_status")]
    pub soft_success_status: u16,
    #[serde(default = "default_audio_filename")]
    pub audio_filename: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            soft_success_status: default_soft_success_status(),
            audio_filename: default_audio_filename(),
        }
    }
}

fn default_soft_success_status() -> u16 {
    DEFAULT_SOFT_SUCCESS_STATUS
}

fn default_audio_filename() -> String {
    "dictation.wav".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            chunk_interval_ms: default_chunk_interval_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl CaptureSettings {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            chunk_interval: Duration::from_millis(self.chunk_interval_ms.max(1)),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn default_chunk_interval_ms() -> u64 {
    100
}

fn default_tick_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountersConfig {
    /// Document store REST base URL; unset keeps counters in memory
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for CountersConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "users".to_string()
}

impl Config {
    /// Load from `path` (any extension the config crate understands, optional)
    /// overlaid with `DICTATION__SECTION__KEY` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("DICTATION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
