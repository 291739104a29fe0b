use serde::Serialize;

use scaffolder_utils::types::{PhaseId, RunState};

use crate::context::{RunContext, TimingEntry, TimingStatus};

/// Aggregate view of one run's timing and outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    pub run_id: String,
    pub state: RunState,
    pub timings: Vec<TimingEntry>,
    pub total_duration_ms: u64,
    pub completed_phases: Vec<PhaseId>,
    pub skipped_phases: Vec<PhaseId>,
    pub failed_attempts: usize,
    pub error_count: usize,
    pub retry_count: u32,
}

impl RunMetrics {
    #[must_use]
    pub fn from_context(context: &RunContext) -> Self {
        Self {
            run_id: context.run_id.clone(),
            state: context.state,
            timings: context.timings.clone(),
            total_duration_ms: context.total_duration_ms(),
            completed_phases: context.completed_phases.clone(),
            skipped_phases: context.skipped_phases.clone(),
            failed_attempts: context
                .timings
                .iter()
                .filter(|t| t.status == TimingStatus::Failed)
                .count(),
            error_count: context.errors.len(),
            retry_count: context.retry_count,
        }
    }

    /// Total time spent in `phase` across all of its attempts.
    #[must_use]
    pub fn phase_duration_ms(&self, phase: PhaseId) -> u64 {
        self.timings
            .iter()
            .filter(|t| t.phase == phase)
            .map(|t| t.duration_ms)
            .sum()
    }
}
