use scaffolder_utils::error::ConfigError;

use crate::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding the orchestrator and deterministic behaviour
    /// independent of the user's environment is required.
    ///
    /// # Example
    ///
    /// ```rust
    /// use scaffolder_config::Config;
    ///
    /// let config = Config::builder()
    ///     .max_retries(5)
    ///     .dry_run(true)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.max_retries, 5);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// [`ConfigSource::Programmatic`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    base: Option<Config>,
    max_retries: Option<u32>,
    dry_run: Option<bool>,
    verbose: Option<bool>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already discovered configuration instead of the defaults.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            base: Some(config),
            ..Self::default()
        }
    }

    /// Maximum number of `resume()` calls per run. Default: 3.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = Some(enabled);
        self
    }

    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = Some(enabled);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if a value is out of range.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = self.base.unwrap_or_default();

        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
            config
                .source_attribution
                .insert("max_retries".to_string(), ConfigSource::Programmatic);
        }
        if let Some(dry_run) = self.dry_run {
            config.dry_run = dry_run;
            config
                .source_attribution
                .insert("dry_run".to_string(), ConfigSource::Programmatic);
        }
        if let Some(verbose) = self.verbose {
            config.verbose = verbose;
            config
                .source_attribution
                .insert("verbose".to_string(), ConfigSource::Programmatic);
        }

        config.validate()?;
        Ok(config)
    }
}
