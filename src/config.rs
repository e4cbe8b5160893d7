//! Configuration types for gapgo

use crate::backtest::{SimulationMode, StrategyConfig};
use crate::bar::SessionHours;
use crate::features::FeatureConfig;
use crate::screen::ScreeningCriteria;
use crate::telemetry::LogFormat;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Invalid configuration value; fatal before any simulation starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{section}.{field}: {reason}")]
pub struct ConfigError {
    pub section: &'static str,
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn invalid(section: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            section,
            field,
            reason: reason.into(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub screening: ScreeningCriteria,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Local dataset locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of raw bar files (`*.json` arrays or `*.jsonl`)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory of minute bar files for intraday runs
    #[serde(default = "default_minute_dir")]
    pub minute_dir: PathBuf,
    /// News index file
    #[serde(default = "default_news_file")]
    pub news_file: PathBuf,
    /// Where reports and Parquet exports go
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/bars")
}
fn default_minute_dir() -> PathBuf {
    PathBuf::from("./data/minute")
}
fn default_news_file() -> PathBuf {
    PathBuf::from("./data/news.json")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            minute_dir: default_minute_dir(),
            news_file: default_news_file(),
            output_dir: default_output_dir(),
        }
    }
}

/// Market data provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to the `POLYGON_API_KEY` environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Minimum spacing between requests (free tier allows 5/min)
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.polygon.io".to_string()
}
fn default_request_interval_ms() -> u64 {
    12_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_interval_ms: default_request_interval_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Number of chunks evaluated in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub mode: SimulationMode,
    /// Regular hours intraday sessions are built from
    #[serde(default)]
    pub session: SessionHours,
}

fn default_concurrency() -> usize {
    4
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            mode: SimulationMode::Daily,
            session: SessionHours::default(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub metrics_enabled: bool,
    /// Prometheus text snapshot written at the end of a run
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_file: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration if the file exists.
    ///
    /// Only a missing file yields `Ok(None)`; unreadable files and TOML
    /// syntax or type errors are returned.
    pub fn load_if_present(path: impl AsRef<std::path::Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(Some(config))
    }

    /// Check every section; the first failure wins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.screening.validate()?;
        self.strategy.validate()?;
        self.features.validate()?;
        if self.runner.concurrency == 0 {
            return Err(ConfigError::invalid(
                "runner",
                "concurrency",
                "must be at least 1",
            ));
        }
        self.runner.session.validate()?;
        if self.source.max_retries > 10 {
            return Err(ConfigError::invalid(
                "source",
                "max_retries",
                "must not exceed 10",
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
