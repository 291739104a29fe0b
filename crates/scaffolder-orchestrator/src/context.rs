//! Per-run mutable state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use scaffolder_utils::error::ScaffolderError;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

/// Status of one timing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimingStatus {
    Running,
    Completed,
    Failed,
    Skipped,
    Simulated,
    SimulatedWithWarnings,
}

impl TimingStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Simulated => "simulated",
            Self::SimulatedWithWarnings => "simulated-with-warnings",
        }
    }
}

/// One phase attempt in the timing log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    pub phase: PhaseId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub status: TimingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TimingEntry {
    /// An entry for a phase that is about to run.
    #[must_use]
    pub fn running(phase: PhaseId) -> Self {
        Self {
            phase,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            status: TimingStatus::Running,
            error: None,
        }
    }

    /// A closed zero-duration entry (skips, failures before the handler ran,
    /// simulated phases).
    #[must_use]
    pub fn instant(phase: PhaseId, status: TimingStatus, error: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            phase,
            started_at: now,
            ended_at: Some(now),
            duration_ms: 0,
            status,
            error,
        }
    }

    /// Close a running entry.
    pub fn finish(&mut self, status: TimingStatus, error: Option<String>) {
        let ended = Utc::now();
        self.duration_ms = u64::try_from((ended - self.started_at).num_milliseconds()).unwrap_or(0);
        self.ended_at = Some(ended);
        self.status = status;
        self.error = error;
    }
}

/// One entry of a run's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseId>,
    pub code: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    #[must_use]
    pub fn from_error(error: &ScaffolderError) -> Self {
        Self {
            phase: error.phase(),
            code: error.code().to_string(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// State owned by exactly one run.
///
/// Accessors on the orchestrator hand out clones, so nothing outside the
/// orchestrator can mutate a live context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunContext {
    pub run_id: String,
    pub state: RunState,
    pub current_phase: Option<PhaseId>,
    pub data: ContextData,
    pub timings: Vec<TimingEntry>,
    pub completed_phases: Vec<PhaseId>,
    pub skipped_phases: Vec<PhaseId>,
    /// Completed phases whose handler failure was absorbed by an error
    /// boundary. They merged nothing, so the final output check ignores them.
    pub recovered_phases: Vec<PhaseId>,
    pub errors: Vec<ErrorRecord>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

impl RunContext {
    /// Fresh `IDLE` context with a new run id.
    #[must_use]
    pub fn new(data: ContextData) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            state: RunState::Idle,
            current_phase: None,
            data,
            timings: Vec::new(),
            completed_phases: Vec::new(),
            skipped_phases: Vec::new(),
            recovered_phases: Vec::new(),
            errors: Vec::new(),
            started_at: now,
            updated_at: now,
            completed_at: None,
            retry_count: 0,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn is_completed(&self, phase: PhaseId) -> bool {
        self.completed_phases.contains(&phase)
    }

    /// Record a completed phase, keeping the list in canonical order.
    pub(crate) fn mark_completed(&mut self, phase: PhaseId) {
        if !self.completed_phases.contains(&phase) {
            self.completed_phases.push(phase);
            self.completed_phases.sort_by_key(PhaseId::order);
        }
    }

    pub(crate) fn mark_skipped(&mut self, phase: PhaseId) {
        if !self.skipped_phases.contains(&phase) {
            self.skipped_phases.push(phase);
            self.skipped_phases.sort_by_key(PhaseId::order);
        }
    }

    /// Sum of every timing entry's duration.
    #[must_use]
    pub fn total_duration_ms(&self) -> u64 {
        self.timings.iter().map(|t| t.duration_ms).sum()
    }
}
