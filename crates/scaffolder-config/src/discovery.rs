use serde::Deserialize;
use std::path::{Path, PathBuf};

use scaffolder_utils::error::ConfigError;

use crate::{Config, ConfigSource, MAX_RETRIES_ENV, parse_max_retries};

const CONFIG_DIR: &str = ".scaffolder";
const CONFIG_FILE: &str = "config.toml";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    orchestrator: Option<OrchestratorSection>,
    pipeline: Option<PipelineSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OrchestratorSection {
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineSection {
    dry_run: Option<bool>,
    verbose: Option<bool>,
}

impl Config {
    /// Discover configuration starting from the current directory.
    ///
    /// Precedence: `SCAFFOLDER_MAX_RETRIES` > config file > defaults.
    ///
    /// # Errors
    /// Returns an error if the current directory is unavailable, the config
    /// file is malformed, or a value is out of range.
    pub fn discover() -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|e| ConfigError::DiscoveryFailed {
            reason: format!("cannot read current directory: {e}"),
        })?;
        let env_retries = std::env::var(MAX_RETRIES_ENV).ok();
        Self::discover_with(&start_dir, env_retries.as_deref())
    }

    /// Discover configuration starting from a specific directory, ignoring the
    /// process environment.
    ///
    /// This is the path-driven variant used by tests to avoid process-global state.
    ///
    /// # Errors
    /// See [`Config::discover`].
    pub fn discover_from(start_dir: &Path) -> Result<Self, ConfigError> {
        Self::discover_with(start_dir, None)
    }

    /// Discovery with an explicit value standing in for `SCAFFOLDER_MAX_RETRIES`.
    ///
    /// # Errors
    /// See [`Config::discover`].
    pub fn discover_with(
        start_dir: &Path,
        env_max_retries: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(start_dir) {
            let file = Self::load_config_file(&path)?;
            let source = ConfigSource::ConfigFile(path.clone());

            if let Some(retries) = file.orchestrator.and_then(|o| o.max_retries) {
                config.max_retries = retries;
                config
                    .source_attribution
                    .insert("max_retries".to_string(), source.clone());
            }
            if let Some(pipeline) = file.pipeline {
                if let Some(dry_run) = pipeline.dry_run {
                    config.dry_run = dry_run;
                    config
                        .source_attribution
                        .insert("dry_run".to_string(), source.clone());
                }
                if let Some(verbose) = pipeline.verbose {
                    config.verbose = verbose;
                    config
                        .source_attribution
                        .insert("verbose".to_string(), source.clone());
                }
            }

            tracing::debug!(path = %path.display(), "Loaded scaffolder config file");
            config.config_path = Some(path);
        }

        if let Some(raw) = env_max_retries {
            config.max_retries = parse_max_retries(raw)?;
            config
                .source_attribution
                .insert("max_retries".to_string(), ConfigSource::Env);
        }

        config.validate()?;
        Ok(config)
    }

    /// Walk upward from `start_dir` looking for `.scaffolder/config.toml`.
    fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidFile {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| invalid(e.to_string()))
    }
}
