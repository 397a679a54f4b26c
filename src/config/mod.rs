//! Configuration management.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed `CROSSREF_MCP_` with `__` between section
//! and key (`CROSSREF_MCP_MATCHING__MATCH_THRESHOLD=0.8`). `CROSSREF_MAILTO`
//! is accepted as a shortcut for `crossref.mailto`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [crossref]
//! base_url = "https://api.crossref.org"
//! mailto = "you@example.org"
//! rows = 5
//! timeout_secs = 10
//!
//! [retry]
//! max_retries = 2
//! base_delay_ms = 500
//! backoff_factor = 2.0
//! max_delay_ms = 8000
//!
//! [matching]
//! author_weight = 0.4
//! year_weight = 0.2
//! title_weight = 0.4
//! match_threshold = 0.75
//! ambiguity_band = 0.1
//! max_candidates = 5
//!
//! [batch]
//! max_concurrent = 4
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RequestError;
use crate::matching::{MatchConfig, MatchWeights};
use crate::utils::RetryConfig;

/// Application name used for config file lookup
pub const APP_NAME: &str = "crossref-mcp";

const ENV_PREFIX: &str = "CROSSREF_MCP";
const MAILTO_ENV: &str = "CROSSREF_MAILTO";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Metadata provider settings
    #[serde(default)]
    pub crossref: CrossRefConfig,

    /// Retry policy for provider calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Scoring weights and thresholds
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Batch processing settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// CrossRef API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRefConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Contact address for CrossRef's polite pool
    #[serde(default)]
    pub mailto: Option<String>,

    /// Candidates requested per free-text search
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Time budget per request attempt
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrossRefConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mailto: None,
            rows: default_rows(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CrossRefConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    crate::sources::CROSSREF_API_BASE.to_string()
}

fn default_rows() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    8000
}

/// Matching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_author_weight")]
    pub author_weight: f64,

    #[serde(default = "default_year_weight")]
    pub year_weight: f64,

    #[serde(default = "default_title_weight")]
    pub title_weight: f64,

    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    #[serde(default = "default_ambiguity_band")]
    pub ambiguity_band: f64,

    /// Provider results considered per reference
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            author_weight: default_author_weight(),
            year_weight: default_year_weight(),
            title_weight: default_title_weight(),
            match_threshold: default_match_threshold(),
            ambiguity_band: default_ambiguity_band(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_author_weight() -> f64 {
    0.4
}

fn default_year_weight() -> f64 {
    0.2
}

fn default_title_weight() -> f64 {
    0.4
}

fn default_match_threshold() -> f64 {
    0.75
}

fn default_ambiguity_band() -> f64 {
    0.1
}

fn default_max_candidates() -> usize {
    5
}

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Ceiling on concurrent provider calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

impl Config {
    /// Retry policy for the lookup adapter
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_multiplier: self.retry.backoff_factor,
            attempt_timeout: self.crossref.timeout(),
        }
    }

    /// Validated scorer configuration
    pub fn match_config(&self) -> Result<MatchConfig, RequestError> {
        let m = &self.matching;
        MatchConfig::new(
            MatchWeights {
                author: m.author_weight,
                year: m.year_weight,
                title: m.title_weight,
            },
            m.match_threshold,
            m.ambiguity_band,
        )
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.match_config().map_err(|e| match e {
            RequestError::InvalidConfig(message) => ConfigError::Invalid(message),
            other => ConfigError::Invalid(other.to_string()),
        })?;

        url::Url::parse(&self.crossref.base_url)
            .map_err(|e| ConfigError::Invalid(format!("crossref.base_url: {}", e)))?;

        let positive = [
            ("crossref.rows", self.crossref.rows as u64),
            ("crossref.timeout_secs", self.crossref.timeout_secs),
            ("matching.max_candidates", self.matching.max_candidates as u64),
            ("batch.max_concurrent", self.batch.max_concurrent as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.backoff_factor must be at least 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<ConfigError> for RequestError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(message) => RequestError::InvalidConfig(message),
            other => RequestError::InvalidConfig(other.to_string()),
        }
    }
}

/// First existing config file: `./crossref-mcp.toml`, then
/// `<config dir>/crossref-mcp/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(format!("{}.toml", APP_NAME));
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME).join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from an optional file and the process environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map(Path::to_path_buf).or_else(find_config_file);
    if let Some(path) = &path {
        tracing::info!("Using config file: {}", path.display());
    }

    load_layered(path.as_deref(), None, std::env::var(MAILTO_ENV).ok())
}

/// Layered load with an explicit environment map instead of the process env
fn load_layered(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
    mailto: Option<String>,
) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    if let Some(mailto) = mailto.filter(|m| !m.trim().is_empty()) {
        builder = builder.set_override("crossref.mailto", mailto)?;
    }

    let config: Config = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
