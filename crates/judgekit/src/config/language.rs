use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;
use crate::types::ResourceLimits;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Configuration for a programming language
///
/// A language is served by a local interpreter runtime, by the remote judge,
/// or by both (interpreter first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "Python 3")
    pub name: String,

    /// Language identifier understood by the remote judge
    #[serde(default)]
    pub judge_id: Option<u32>,

    /// Local interpreter configuration (None for judge-only languages)
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
}

impl Language {
    /// Check if the language can run locally
    pub fn has_runtime(&self) -> bool {
        self.runtime.is_some()
    }

    /// Check if the language can run on the remote judge
    pub fn has_judge(&self) -> bool {
        self.judge_id.is_some()
    }
}

/// File extension without dot (e.g., "py")
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for a local interpreter runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Extension of the source file handed to the interpreter
    pub extension: FileExtension,

    /// Command and arguments with placeholders
    /// Placeholders: {source}
    pub command: Vec<String>,

    /// Command printing the interpreter version, run once when the runtime loads
    #[serde(default)]
    pub version_command: Option<Vec<String>>,

    /// Environment variables to set for every run
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Resource limits for execution (overrides defaults)
    #[serde(default)]
    pub limits: Option<ResourceLimits>,

    /// Maximum number of concurrent executions
    #[serde(default = "default_slots")]
    pub slots: usize,
}

impl RuntimeConfig {
    /// Get the source file name for this runtime
    pub fn source_name(&self) -> String {
        format!("main.{}", self.extension)
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], source: &str) -> Vec<String> {
        command
            .iter()
            .map(|arg| arg.replace("{source}", source))
            .collect()
    }
}

/// Default number of concurrent executions per runtime
pub const DEFAULT_SLOTS: usize = 4;

fn default_slots() -> usize {
    DEFAULT_SLOTS
}
