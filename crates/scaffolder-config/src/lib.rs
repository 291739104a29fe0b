//! Configuration for scaffold runs.
//!
//! A [`Config`] is built from, in increasing precedence:
//! 1. Built-in defaults
//! 2. The nearest `.scaffolder/config.toml` found walking upward
//! 3. The `SCAFFOLDER_MAX_RETRIES` environment variable
//! 4. Values set programmatically through [`ConfigBuilder`]
//!
//! Every effective value is attributed to the [`ConfigSource`] it came from.

mod builder;
mod discovery;

use std::collections::HashMap;
use std::path::PathBuf;

use scaffolder_utils::error::ConfigError;

pub use builder::ConfigBuilder;

/// Retry budget used when nothing else is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// Environment variable overriding `max_retries`.
pub const MAX_RETRIES_ENV: &str = "SCAFFOLDER_MAX_RETRIES";

/// Where an effective configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    ConfigFile(PathBuf),
    Env,
    Programmatic,
}

impl ConfigSource {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ConfigFile(_) => "config",
            Self::Env => "env",
            Self::Programmatic => "programmatic",
        }
    }
}

/// Effective configuration for an orchestrator and its executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of `resume()` calls allowed for a single run.
    pub max_retries: u32,
    /// Whether executors start in dry-run mode.
    pub dry_run: bool,
    /// Verbose logging: debug level, targets and span timings. Applied by
    /// [`Config::init_logging`].
    pub verbose: bool,
    /// Path of the config file that contributed values, if any.
    pub config_path: Option<PathBuf>,
    /// Source of each effective key.
    pub source_attribution: HashMap<String, ConfigSource>,
}

impl Default for Config {
    fn default() -> Self {
        let source_attribution = ["max_retries", "dry_run", "verbose"]
            .into_iter()
            .map(|k| (k.to_string(), ConfigSource::Default))
            .collect();

        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            dry_run: false,
            verbose: false,
            config_path: None,
            source_attribution,
        }
    }
}

impl Config {
    /// Validate value ranges.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if `max_retries` exceeds [`MAX_RETRIES_LIMIT`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::InvalidValue {
                key: "max_retries".to_string(),
                value: format!("{} (must be <= {MAX_RETRIES_LIMIT})", self.max_retries),
            });
        }
        Ok(())
    }

    /// Install the process-wide tracing subscriber at this config's
    /// verbosity.
    ///
    /// # Errors
    /// Returns an error if a global subscriber is already installed.
    pub fn init_logging(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        scaffolder_utils::logging::init_tracing(self.verbose)
    }

    /// Effective configuration as `key -> (value, source label)`.
    #[must_use]
    pub fn effective_config(&self) -> HashMap<String, (String, String)> {
        let source = |key: &str| {
            self.source_attribution
                .get(key)
                .unwrap_or(&ConfigSource::Default)
                .label()
                .to_string()
        };

        HashMap::from([
            (
                "max_retries".to_string(),
                (self.max_retries.to_string(), source("max_retries")),
            ),
            (
                "dry_run".to_string(),
                (self.dry_run.to_string(), source("dry_run")),
            ),
            (
                "verbose".to_string(),
                (self.verbose.to_string(), source("verbose")),
            ),
        ])
    }
}

pub(crate) fn parse_max_retries(raw: &str) -> Result<u32, ConfigError> {
    let value = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidValue {
            key: "max_retries".to_string(),
            value: raw.to_string(),
        })?;
    if value > MAX_RETRIES_LIMIT {
        return Err(ConfigError::InvalidValue {
            key: "max_retries".to_string(),
            value: format!("{value} (must be <= {MAX_RETRIES_LIMIT})"),
        });
    }
    Ok(value)
}
