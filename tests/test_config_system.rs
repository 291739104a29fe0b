//! Configuration discovery and its effect on orchestrators and executors
//!
//! Tests:
//! - Upward discovery of `.scaffolder/config.toml`
//! - Precedence: environment > config file > defaults
//! - Source attribution
//! - Range validation of `max_retries`
//! - `Config` driving `Orchestrator` and `PipelineExecutor`

mod test_support;

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use scaffolder::{
    Config, ConfigError, ConfigSource, ContextData, DEFAULT_MAX_RETRIES, Orchestrator,
    OrchestratorConfig, PhaseId, PipelineExecutor, RunState,
};
use test_support::{FailingHandler, seed};

/// Helper to create a config file in a directory
fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_dir = dir.join(".scaffolder");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("config.toml");
    fs::write(&config_path, content).unwrap();
    config_path
}

#[test]
fn test_defaults_without_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let config = Config::discover_from(temp_dir.path())?;

    assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    assert!(!config.dry_run);
    assert!(!config.verbose);
    let effective = config.effective_config();
    assert_eq!(effective["max_retries"], ("3".to_string(), "default".to_string()));
    Ok(())
}

#[test]
fn test_discovery_from_nested_directory() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    create_config_file(
        root,
        r#"
[orchestrator]
max_retries = 7

[pipeline]
verbose = true
"#,
    );
    let nested = root.join("services").join("api");
    fs::create_dir_all(&nested)?;

    let config = Config::discover_from(&nested)?;

    assert_eq!(config.max_retries, 7);
    assert!(config.verbose);
    assert!(!config.dry_run);
    assert!(matches!(
        config.source_attribution.get("verbose"),
        Some(ConfigSource::ConfigFile(_))
    ));
    assert!(config.source_attribution.get("dry_run").is_none());
    Ok(())
}

#[test]
fn test_environment_beats_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_config_file(temp_dir.path(), "[orchestrator]\nmax_retries = 7\n");

    let config = Config::discover_with(temp_dir.path(), Some(" 1 "))?;

    assert_eq!(config.max_retries, 1);
    assert_eq!(config.source_attribution.get("max_retries"), Some(&ConfigSource::Env));
    Ok(())
}

#[test]
fn test_invalid_environment_value() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let err = Config::discover_with(temp_dir.path(), Some("several")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));

    let err = Config::discover_with(temp_dir.path(), Some("101")).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    Ok(())
}

#[test]
fn test_builder_validates_range() {
    assert!(Config::builder().max_retries(100).build().is_ok());
    assert!(matches!(
        Config::builder().max_retries(101).build(),
        Err(ConfigError::InvalidValue { .. })
    ));
}

/// A configured retry budget bounds resume
#[tokio::test]
async fn test_config_drives_retry_budget() -> Result<()> {
    let config = Config::builder().max_retries(1).build()?;
    assert_eq!(OrchestratorConfig::from(&config).max_retries, 1);

    let mut orchestrator = Orchestrator::from_config(&config);
    orchestrator.register_phase_handler(PhaseId::Discover, FailingHandler("offline"));

    orchestrator.start(seed()).await.unwrap_err();
    orchestrator.resume(ContextData::new()).await.unwrap_err();
    let err = orchestrator.resume(ContextData::new()).await.unwrap_err();
    assert_eq!(err.code(), "RETRIES_EXHAUSTED");
    Ok(())
}

/// A config file with `dry_run = true` yields a simulating executor
#[tokio::test]
async fn test_config_file_enables_dry_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_config_file(temp_dir.path(), "[pipeline]\ndry_run = true\n");
    let config = Config::discover_from(temp_dir.path())?;

    let mut executor = PipelineExecutor::from_config(&config);
    let outcome = executor.run(seed()).await;

    assert!(outcome.dry_run);
    assert!(outcome.success);
    assert_eq!(executor.orchestrator().state(), RunState::Idle);
    Ok(())
}
