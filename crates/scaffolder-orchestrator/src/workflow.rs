//! Whole-run control: start, resume, reset, rewind and the final check.

use std::sync::Arc;
use tracing::{Instrument, error, info};

use scaffolder_events::LifecycleEvent;
use scaffolder_registry::PhaseRegistry;
use scaffolder_utils::error::{ContractError, ScaffolderError};
use scaffolder_utils::logging::run_span;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

use crate::Orchestrator;
use crate::context::RunContext;

impl Orchestrator {
    /// Start a new run with `initial_data` and drive it to `COMPLETE`.
    ///
    /// Data carried over by `reset(true)` is kept underneath `initial_data`.
    ///
    /// # Errors
    /// Returns `INVALID_STATE` unless the orchestrator is `IDLE`, otherwise
    /// the first phase or validation failure.
    pub async fn start(
        &mut self,
        initial_data: ContextData,
    ) -> Result<RunContext, ScaffolderError> {
        let state = self.context.state;
        if state != RunState::Idle {
            return Err(ScaffolderError::InvalidState {
                operation: "start",
                state,
            });
        }

        let mut data = std::mem::take(&mut self.context.data);
        data.extend(initial_data);
        self.context = RunContext::new(data);

        let run_id = self.context.run_id.clone();
        info!(run_id = %run_id, "Starting scaffold run");
        self.emit(LifecycleEvent::RunStarted {
            run_id: run_id.clone(),
        });

        self.drive(PhaseId::Discover)
            .instrument(run_span(&run_id))
            .await
    }

    /// Continue a failed run from its current phase.
    ///
    /// Phases already completed are not re-run, and their timing entries are
    /// left alone.
    ///
    /// # Errors
    /// Returns `INVALID_STATE` in `IDLE` or `COMPLETE`, `RETRIES_EXHAUSTED`
    /// once `max_retries` resumes have been used, otherwise the first phase
    /// or validation failure.
    pub async fn resume(
        &mut self,
        additional_data: ContextData,
    ) -> Result<RunContext, ScaffolderError> {
        let state = self.context.state;
        if matches!(state, RunState::Idle | RunState::Complete) {
            return Err(ScaffolderError::InvalidState {
                operation: "resume",
                state,
            });
        }
        if self.context.retry_count >= self.config.max_retries {
            return Err(ScaffolderError::RetriesExhausted {
                retry_count: self.context.retry_count,
                max_retries: self.config.max_retries,
            });
        }

        self.context.data.extend(additional_data);
        self.context.retry_count += 1;
        self.context.touch();

        let run_id = self.context.run_id.clone();
        let from = self.context.current_phase.unwrap_or(PhaseId::Discover);
        info!(
            run_id = %run_id,
            phase = %from,
            retry_count = self.context.retry_count,
            max_retries = self.config.max_retries,
            "Resuming scaffold run"
        );
        self.emit(LifecycleEvent::RunResumed {
            run_id: run_id.clone(),
            retry_count: self.context.retry_count,
        });

        self.drive(from).instrument(run_span(&run_id)).await
    }

    /// Abandon the current run and return to `IDLE` with a fresh context.
    ///
    /// With `preserve_data` only the data map is carried forward; timings,
    /// errors, phase lists and the retry count start over.
    pub fn reset(&mut self, preserve_data: bool) {
        let data = if preserve_data {
            std::mem::take(&mut self.context.data)
        } else {
            ContextData::new()
        };
        let previous = std::mem::replace(&mut self.context, RunContext::new(data));

        info!(
            previous_run_id = %previous.run_id,
            run_id = %self.context.run_id,
            preserve_data,
            "Run reset"
        );
        self.emit(LifecycleEvent::RunReset {
            run_id: self.context.run_id.clone(),
            preserved_data: preserve_data,
        });
    }

    /// Move the resume point of a failed run back to `to`.
    ///
    /// `to` and every later completed phase are demoted and their declared
    /// outputs removed from the context, so the next `resume()` re-executes
    /// them against fresh data. Returns the demoted phases.
    ///
    /// # Errors
    /// Returns `INVALID_STATE` unless the run is in `ERROR`.
    pub fn rewind(&mut self, to: PhaseId) -> Result<Vec<PhaseId>, ScaffolderError> {
        let state = self.context.state;
        if state != RunState::Error {
            return Err(ScaffolderError::InvalidState {
                operation: "rewind",
                state,
            });
        }

        let demoted = self.invalidate_from(to);
        info!(run_id = %self.context.run_id, phase = %to, demoted = ?demoted, "Run rewound");
        Ok(demoted)
    }

    async fn drive(&mut self, from: PhaseId) -> Result<RunContext, ScaffolderError> {
        let mut result = self.run_phases(from).await;
        if result.is_ok() {
            result = self.finish_run();
        }

        match result {
            Ok(()) => Ok(self.context.clone()),
            Err(err) => {
                self.emit(LifecycleEvent::RunFailed {
                    run_id: self.context.run_id.clone(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_phases(&mut self, from: PhaseId) -> Result<(), ScaffolderError> {
        for phase in PhaseId::ALL.into_iter().skip(from.order()) {
            if self.context.is_completed(phase) {
                continue;
            }
            self.execute_phase(phase).await?;
        }
        Ok(())
    }

    /// Post-run check: every completed phase's outputs must still be present.
    fn finish_run(&mut self) -> Result<(), ScaffolderError> {
        if let Err(err) = self.transition(RunState::Validating) {
            return Err(self.fail_run(err));
        }

        let missing = missing_outputs(&self.registry, &self.context);
        if let Some(&(earliest, _)) = missing.first() {
            let err: ScaffolderError = ContractError::ValidationFailed { missing }.into();
            error!(run_id = %self.context.run_id, error = %err, "Post-run validation failed");
            self.invalidate_from(earliest);
            return Err(self.fail_run(err));
        }

        if let Err(err) = self.transition(RunState::Complete) {
            return Err(self.fail_run(err));
        }
        self.context.completed_at = Some(chrono::Utc::now());

        let duration_ms = self.context.total_duration_ms();
        info!(
            run_id = %self.context.run_id,
            duration_ms,
            completed = self.context.completed_phases.len(),
            skipped = self.context.skipped_phases.len(),
            "Scaffold run completed"
        );
        self.emit(LifecycleEvent::RunCompleted {
            run_id: self.context.run_id.clone(),
            duration_ms,
        });
        Ok(())
    }

    fn fail_run(&mut self, err: ScaffolderError) -> ScaffolderError {
        self.record_error(&err);
        self.enter_error();
        err
    }

    /// Demote `from` and every later phase, dropping the outputs they merged.
    fn invalidate_from(&mut self, from: PhaseId) -> Vec<PhaseId> {
        let registry = Arc::clone(&self.registry);
        let ctx = &mut self.context;
        let cut = from.order();

        let demoted: Vec<PhaseId> = ctx
            .completed_phases
            .iter()
            .copied()
            .filter(|p| p.order() >= cut)
            .collect();

        for phase in &demoted {
            if ctx.recovered_phases.contains(phase) {
                continue;
            }
            for key in &registry.definition(*phase).outputs {
                ctx.data.remove(key);
            }
        }

        ctx.completed_phases.retain(|p| p.order() < cut);
        ctx.skipped_phases.retain(|p| p.order() < cut);
        ctx.recovered_phases.retain(|p| p.order() < cut);
        ctx.current_phase = Some(from);
        ctx.touch();
        demoted
    }
}

/// Declared outputs of completed phases that are absent from the context.
///
/// Phases absorbed by an error boundary produced nothing and are ignored.
pub(crate) fn missing_outputs(
    registry: &PhaseRegistry,
    context: &RunContext,
) -> Vec<(PhaseId, Vec<String>)> {
    context
        .completed_phases
        .iter()
        .filter(|p| !context.recovered_phases.contains(p))
        .filter_map(|&phase| {
            let check = registry.validate_phase_output(phase, &context.data);
            (!check.valid).then_some((phase, check.missing))
        })
        .collect()
}
