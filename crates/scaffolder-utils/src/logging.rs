//! Logging and observability infrastructure for scaffolder
//!
//! Structured logging through `tracing`. The orchestrator and executor log
//! through the helpers below regardless of whether any lifecycle observer is
//! attached.

use std::io::IsTerminal;
use tracing::{Level, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::types::PhaseId;

/// Check if colored output should be used.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("scaffolder=debug,info")
            } else {
                EnvFilter::try_new("scaffolder=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize a human-readable tracing subscriber.
///
/// Verbose mode includes targets and span close events (which carry the
/// span's duration).
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_color())
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false);

    let layer = if verbose {
        layer.with_span_events(FmtSpan::CLOSE)
    } else {
        layer.with_span_events(FmtSpan::NONE)
    };

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(layer.compact())
        .try_init()?;

    Ok(())
}

/// Initialize a JSON tracing subscriber for machine consumption.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_json_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(default_filter(false))
        .with(fmt::layer().with_writer(std::io::stderr).json())
        .try_init()?;
    Ok(())
}

/// Span covering one whole run.
pub fn run_span(run_id: &str) -> tracing::Span {
    span!(Level::INFO, "scaffold_run", run_id = %run_id)
}

/// Span covering one phase execution within a run.
pub fn phase_span(run_id: &str, phase: PhaseId) -> tracing::Span {
    span!(
        Level::INFO,
        "phase_execution",
        run_id = %run_id,
        phase = %phase,
    )
}

pub fn log_phase_start(run_id: &str, phase: PhaseId) {
    info!(run_id = %run_id, phase = %phase, "Starting phase execution");
}

pub fn log_phase_complete(run_id: &str, phase: PhaseId, duration_ms: u64) {
    info!(
        run_id = %run_id,
        phase = %phase,
        duration_ms = %duration_ms,
        "Phase execution completed"
    );
}

pub fn log_phase_skipped(run_id: &str, phase: PhaseId) {
    info!(run_id = %run_id, phase = %phase, "Phase skipped by predicate");
}

pub fn log_phase_error(run_id: &str, phase: PhaseId, code: &str, error: &str, duration_ms: u64) {
    error!(
        run_id = %run_id,
        phase = %phase,
        code = %code,
        duration_ms = %duration_ms,
        error = %error,
        "Phase execution failed"
    );
}

pub fn log_dry_run_warning(run_id: &str, phase: PhaseId, warning: &str) {
    warn!(run_id = %run_id, phase = %phase, warning = %warning, "Dry run warning");
}
