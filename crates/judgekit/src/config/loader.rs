//! Configuration file loading for judgekit
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};

use crate::config::{Config, ConfigError, ENV_PREFIX};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file (or the embedded example when `None`)
    /// with `JUDGEKIT_*` environment variables layered on top
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = ConfigBuilder::builder();
        let builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::from_str(
                crate::config::EXAMPLE_CONFIG,
                FileFormat::Toml,
            )),
        };
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.judge.url.is_empty() {
            return Err(ConfigError::Invalid("judge url is empty".to_string()));
        }
        if self.judge.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "judge poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.judge.max_poll_attempts == 0 {
            return Err(ConfigError::Invalid(
                "judge max_poll_attempts must be at least 1".to_string(),
            ));
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if let Some(ref runtime) = lang.runtime {
                if runtime.extension.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty runtime extension"
                    )));
                }
                if runtime.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty runtime command"
                    )));
                }
                if !runtime.command.iter().any(|arg| arg.contains("{source}")) {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' runtime command has no {{source}} placeholder"
                    )));
                }
                if runtime.slots == 0 {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' runtime needs at least one slot"
                    )));
                }
                if let Some(ref version) = runtime.version_command
                    && version.is_empty()
                {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty version command"
                    )));
                }
            }
        }

        Ok(())
    }
}
