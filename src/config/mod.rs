use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::utils::retry::RetryPolicy;

/// Guide shaping parameters: melding thresholds and flex caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideConfig {
    /// Low-value time folded into a neighbouring entry before it is split
    /// back out as a standalone offline block
    #[serde(with = "duration_serde::duration", default = "default_max_padding_length")]
    pub max_padding_length: Duration,
    /// Longest single offline/flex block allowed in the published guide
    #[serde(with = "duration_serde::duration", default = "default_max_flex_duration")]
    pub max_flex_duration: Duration,
    /// Grid that flex blocks straddling "now" are clipped forward to
    #[serde(with = "duration_serde::duration", default = "default_alignment_grid")]
    pub alignment_grid: Duration,
    /// Display title for offline/flex guide rows
    #[serde(default = "default_offline_title")]
    pub offline_title: String,
}

fn default_max_padding_length() -> Duration {
    DEFAULT_MAX_PADDING_LENGTH
}
fn default_max_flex_duration() -> Duration {
    DEFAULT_MAX_FLEX_DURATION
}
fn default_alignment_grid() -> Duration {
    DEFAULT_ALIGNMENT_GRID
}
fn default_offline_title() -> String {
    DEFAULT_OFFLINE_TITLE.to_string()
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            max_padding_length: default_max_padding_length(),
            max_flex_duration: default_max_flex_duration(),
            alignment_grid: default_alignment_grid(),
            offline_title: default_offline_title(),
        }
    }
}

impl GuideConfig {
    pub fn max_padding_ms(&self) -> u64 {
        self.max_padding_length.as_millis() as u64
    }

    pub fn max_flex_ms(&self) -> u64 {
        self.max_flex_duration.as_millis() as u64
    }

    pub fn alignment_grid_ms(&self) -> u64 {
        self.alignment_grid.as_millis() as u64
    }
}

/// Build execution parameters: resolver slack and the retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Tolerance used by the incremental-advance fast path when comparing a
    /// resolved duration against the lineup's nominal slot duration
    #[serde(with = "duration_serde::duration", default = "default_fast_path_slack")]
    pub fast_path_slack: Duration,
    #[serde(default = "default_build_max_attempts")]
    pub max_attempts: u32,
    #[serde(with = "duration_serde::duration", default = "default_build_initial_delay")]
    pub initial_delay: Duration,
    #[serde(with = "duration_serde::duration", default = "default_build_max_delay")]
    pub max_delay: Duration,
    #[serde(with = "duration_serde::duration", default = "default_build_retry_budget")]
    pub retry_budget: Duration,
    #[serde(default = "default_build_jitter_percent")]
    pub jitter_percent: u8,
}

fn default_fast_path_slack() -> Duration {
    DEFAULT_FAST_PATH_SLACK
}
fn default_build_max_attempts() -> u32 {
    DEFAULT_BUILD_MAX_ATTEMPTS
}
fn default_build_initial_delay() -> Duration {
    DEFAULT_BUILD_INITIAL_DELAY
}
fn default_build_max_delay() -> Duration {
    DEFAULT_BUILD_MAX_DELAY
}
fn default_build_retry_budget() -> Duration {
    DEFAULT_BUILD_RETRY_BUDGET
}
fn default_build_jitter_percent() -> u8 {
    DEFAULT_BUILD_JITTER_PERCENT
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            fast_path_slack: default_fast_path_slack(),
            max_attempts: default_build_max_attempts(),
            initial_delay: default_build_initial_delay(),
            max_delay: default_build_max_delay(),
            retry_budget: default_build_retry_budget(),
            jitter_percent: default_build_jitter_percent(),
        }
    }
}

impl BuildConfig {
    pub fn fast_path_slack_ms(&self) -> u64 {
        self.fast_path_slack.as_millis() as u64
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: 2.0,
            total_budget: self.retry_budget,
            jitter_percent: self.jitter_percent,
        }
    }
}

/// Background refresh cadence for the orchestrator's run loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(with = "duration_serde::duration", default = "default_refresh_interval")]
    pub interval: Duration,
    /// How far ahead each refresh materializes the guide
    #[serde(with = "duration_serde::duration", default = "default_refresh_window")]
    pub window: Duration,
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}
fn default_refresh_window() -> Duration {
    DEFAULT_REFRESH_WINDOW
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: default_refresh_interval(),
            window: default_refresh_window(),
        }
    }
}

/// XMLTV export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_enabled")]
    pub enabled: bool,
    #[serde(default = "default_xmltv_path")]
    pub xmltv_path: PathBuf,
}

fn default_export_enabled() -> bool {
    DEFAULT_EXPORT_ENABLED
}
fn default_xmltv_path() -> PathBuf {
    PathBuf::from(DEFAULT_XMLTV_PATH)
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: default_export_enabled(),
            xmltv_path: default_xmltv_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from_file(&config_file)
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}
