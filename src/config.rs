//! TOML configuration.
//!
//! Every section except `[dataset]` is optional and falls back to the
//! defaults below. [`load_config`] parses and validates the file and
//! resolves a relative dataset path against the config file's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Explicit dataset version. Defaults to a hash of the file contents.
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_prohibited_threshold")]
    pub prohibited_threshold: f64,
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_prefilter")]
    pub prefilter: bool,
    /// Appended to the built-in safe names.
    #[serde(default)]
    pub safe_overrides: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            prohibited_threshold: default_prohibited_threshold(),
            warning_threshold: default_warning_threshold(),
            metric: default_metric(),
            prefilter: default_prefilter(),
            safe_overrides: Vec::new(),
        }
    }
}

fn default_prohibited_threshold() -> f64 {
    98.0
}
fn default_warning_threshold() -> f64 {
    90.0
}
fn default_metric() -> String {
    "levenshtein".to_string()
}
fn default_prefilter() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    #[serde(default = "default_retain")]
    pub retain: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            retain: default_retain(),
        }
    }
}

fn default_max_input_chars() -> usize {
    10_000
}
fn default_retain() -> usize {
    1_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_redirect_base")]
    pub redirect_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            redirect_base: default_redirect_base(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8765".to_string()
}
fn default_redirect_base() -> String {
    "/analysis".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if config.dataset.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.dataset.path = dir.join(&config.dataset.path);
        }
    }

    Ok(config)
}

/// Parse and validate configuration text. Paths are left as written.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate matching
    let m = &config.matching;
    if !(m.warning_threshold > 0.0
        && m.warning_threshold <= m.prohibited_threshold
        && m.prohibited_threshold <= 100.0)
    {
        anyhow::bail!(
            "matching thresholds must satisfy 0 < warning_threshold ({}) <= prohibited_threshold ({}) <= 100",
            m.warning_threshold,
            m.prohibited_threshold
        );
    }

    match m.metric.as_str() {
        "levenshtein" | "jaro_winkler" => {}
        other => anyhow::bail!(
            "Unknown matching metric: '{}'. Must be levenshtein or jaro_winkler.",
            other
        ),
    }

    // Validate cache and jobs
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }

    if config.jobs.max_input_chars == 0 {
        anyhow::bail!("jobs.max_input_chars must be > 0");
    }

    if config.jobs.retain == 0 {
        anyhow::bail!("jobs.retain must be > 0");
    }

    Ok(config)
}
