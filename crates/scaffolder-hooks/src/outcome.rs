use serde::Serialize;

use scaffolder_orchestrator::{ErrorRecord, RunContext, TimingEntry};
use scaffolder_utils::error::ScaffolderError;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

/// One failure reported in a [`RunOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeError {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseId>,
    pub message: String,
}

impl From<&ScaffolderError> for OutcomeError {
    fn from(error: &ScaffolderError) -> Self {
        Self {
            code: error.code().to_string(),
            phase: error.phase(),
            message: error.to_string(),
        }
    }
}

impl From<&ErrorRecord> for OutcomeError {
    fn from(record: &ErrorRecord) -> Self {
        Self {
            code: record.code.clone(),
            phase: record.phase,
            message: record.message.clone(),
        }
    }
}

/// Normalized result of [`PipelineExecutor::run`](crate::PipelineExecutor::run)
/// and [`resume`](crate::PipelineExecutor::resume). Failures are reported
/// here rather than returned as `Err`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    pub run_id: String,
    pub state: RunState,
    pub data: ContextData,
    pub timings: Vec<TimingEntry>,
    pub completed_phases: Vec<PhaseId>,
    pub skipped_phases: Vec<PhaseId>,
    pub total_duration_ms: u64,
    pub errors: Vec<OutcomeError>,
    /// Dry-run contract warnings. Always empty for live runs.
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

impl RunOutcome {
    /// Outcome of a live run, read from the orchestrator's context.
    ///
    /// `rejected` is an error the orchestrator refused the call with before
    /// touching the run, so it is not in the run's error log.
    #[must_use]
    pub fn from_context(context: &RunContext, rejected: Option<&ScaffolderError>) -> Self {
        let mut errors: Vec<OutcomeError> = context.errors.iter().map(OutcomeError::from).collect();
        if let Some(err) = rejected {
            errors.push(OutcomeError::from(err));
        }

        Self {
            success: rejected.is_none() && context.state == RunState::Complete,
            run_id: context.run_id.clone(),
            state: context.state,
            data: context.data.clone(),
            timings: context.timings.clone(),
            completed_phases: context.completed_phases.clone(),
            skipped_phases: context.skipped_phases.clone(),
            total_duration_ms: context.total_duration_ms(),
            errors,
            warnings: Vec::new(),
            dry_run: false,
        }
    }

    /// Codes of every reported error, in order.
    #[must_use]
    pub fn error_codes(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.code.as_str()).collect()
    }
}
