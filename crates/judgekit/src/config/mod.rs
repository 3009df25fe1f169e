use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{DEFAULT_SLOTS, FileExtension, Language, RuntimeConfig};
use crate::types::ResourceLimits;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../judgekit.example.toml");

/// Prefix of environment variables that override file values
pub const ENV_PREFIX: &str = "JUDGEKIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for judgekit
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory that relative test case references are resolved against.
    /// Uses the working directory if not specified.
    #[serde(default)]
    pub resource_root: Option<PathBuf>,

    /// Default resource limits applied to all interpreter runs.
    /// Overridden per language by `languages.<id>.runtime.limits`.
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Execution service settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Remote judge settings
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

/// Settings for the execution service
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Test cases evaluated by a run when the caller gives no limit
    #[serde(default = "default_test_case_limit")]
    pub default_test_case_limit: usize,

    /// Overall deadline for one execute call in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_test_case_limit: default_test_case_limit(),
            timeout_secs: None,
        }
    }
}

/// Settings for the remote judge
#[derive(Clone, Deserialize)]
pub struct JudgeConfig {
    /// Base URL of the judge API
    #[serde(default = "default_judge_url")]
    pub url: String,

    /// Value of the `X-RapidAPI-Host` header
    #[serde(default)]
    pub api_host: Option<String>,

    /// Value of the `X-RapidAPI-Key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Delay between two result polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Polls before a submission is reported as timed out
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl JudgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Point the judge at another base URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the delay between polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the number of polls before giving up
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = attempts;
        self
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            url: default_judge_url(),
            api_host: None,
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("url", &self.url)
            .field("api_host", &self.api_host)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            resource_root: None,
            default_limits: ResourceLimits::default(),
            execution: ExecutionConfig::default(),
            judge: JudgeConfig::default(),
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Language IDs in sorted order
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Merge resource limits with defaults
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_test_case_limit() -> usize {
    2
}

fn default_judge_url() -> String {
    "https://judge0-ce.p.rapidapi.com".to_owned()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_attempts() -> u32 {
    30
}
