//! Single-phase execution.
//!
//! [`Orchestrator::execute_phase`] is the atomic step of a run: skip check,
//! input check, transition, handler call, output check, merge. Any failure
//! leaves the context data untouched, appends a failed timing entry and an
//! error record, and moves the run to `ERROR`.

use tracing::{Instrument, warn};

use scaffolder_events::LifecycleEvent;
use scaffolder_phase_api::ContextSnapshot;
use scaffolder_utils::error::{ContractError, ScaffolderError};
use scaffolder_utils::logging::{
    log_phase_complete, log_phase_error, log_phase_skipped, log_phase_start, phase_span,
};
use scaffolder_utils::types::PhaseId;

use crate::Orchestrator;
use crate::context::{TimingEntry, TimingStatus};

/// How a successful [`Orchestrator::execute_phase`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    /// Handler ran and its output was merged.
    Completed,
    /// Skip predicate returned true; nothing ran.
    Skipped,
    /// Handler failed and the phase's recovery policy absorbed the failure.
    Recovered,
}

impl Orchestrator {
    /// Execute one phase against the current run.
    ///
    /// # Errors
    /// - `SKIP_PREDICATE_FAILED` if the skip predicate errors
    /// - `PHASE_INPUT_INVALID` if a required input key is absent
    /// - `UNREGISTERED_HANDLER` if no handler is bound to `phase`
    /// - `INVALID_TRANSITION` if the run cannot enter the phase's state
    /// - `HANDLER_FAILED` / `HOOK_FAILED` if the handler (or a hook wrapped
    ///   around it) fails
    /// - `PHASE_OUTPUT_INVALID` if the output misses a declared key
    pub async fn execute_phase(&mut self, phase: PhaseId) -> Result<PhaseStep, ScaffolderError> {
        self.context.current_phase = Some(phase);

        if let Some(predicate) = self.skip_conditions.get(&phase).cloned() {
            match predicate.should_skip(&self.context.data) {
                Ok(true) => return self.skip_phase(phase),
                Ok(false) => {}
                Err(e) => {
                    let err = ScaffolderError::SkipPredicate {
                        phase,
                        reason: format!("{e:#}"),
                    };
                    return Err(self.fail_phase(phase, None, err));
                }
            }
        }

        let input = self.registry.validate_phase_input(phase, &self.context.data);
        if !input.valid {
            let err = ContractError::PhaseInputInvalid {
                phase,
                missing: input.missing,
            };
            return Err(self.fail_phase(phase, None, err.into()));
        }

        let Some(handler) = self.handlers.get(&phase).cloned() else {
            let err = ScaffolderError::UnregisteredHandler { phase };
            return Err(self.fail_phase(phase, None, err));
        };

        if let Err(err) = self.transition(phase.active_state()) {
            return Err(self.fail_phase(phase, None, err));
        }

        let run_id = self.context.run_id.clone();
        log_phase_start(&run_id, phase);
        self.emit(LifecycleEvent::PhaseStarting {
            run_id: run_id.clone(),
            phase,
        });

        self.context.timings.push(TimingEntry::running(phase));
        let entry = self.context.timings.len() - 1;

        let snapshot = ContextSnapshot::new(run_id.clone(), phase, self.context.data.clone());
        let result = handler
            .handle(snapshot)
            .instrument(phase_span(&run_id, phase))
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if is_hook_failure(&e) => {
                let err = match e.downcast::<ScaffolderError>() {
                    Ok(hook) => hook,
                    Err(source) => ScaffolderError::Handler { phase, source },
                };
                return Err(self.fail_phase(phase, Some(entry), err));
            }
            Err(e) => {
                if self.try_recover(phase, &e).await {
                    return Ok(self.recover_phase(phase, entry, &e));
                }
                let err = ScaffolderError::Handler { phase, source: e };
                return Err(self.fail_phase(phase, Some(entry), err));
            }
        };

        let check = self.registry.validate_phase_output(phase, &output);
        if !check.valid {
            let err = ContractError::PhaseOutputInvalid {
                phase,
                missing: check.missing,
            };
            return Err(self.fail_phase(phase, Some(entry), err.into()));
        }

        self.context.data.extend(output);
        self.context.timings[entry].finish(TimingStatus::Completed, None);
        self.context.mark_completed(phase);
        self.context.touch();

        let duration_ms = self.context.timings[entry].duration_ms;
        log_phase_complete(&run_id, phase, duration_ms);
        self.emit(LifecycleEvent::PhaseCompleted {
            run_id,
            phase,
            duration_ms,
        });
        Ok(PhaseStep::Completed)
    }

    /// Ask the phase's recovery policy, if any, whether to absorb `error`.
    async fn try_recover(&self, phase: PhaseId, error: &anyhow::Error) -> bool {
        let Some(policy) = self.recovery.get(&phase).cloned() else {
            return false;
        };
        // The handler could not touch the live data, so this matches what it saw.
        let snapshot = ContextSnapshot::new(
            self.context.run_id.clone(),
            phase,
            self.context.data.clone(),
        );
        policy.recover(error, &snapshot).await
    }

    /// Record `phase` completed with an empty merge.
    fn recover_phase(&mut self, phase: PhaseId, entry: usize, error: &anyhow::Error) -> PhaseStep {
        let error = format!("{error:#}");
        self.context.timings[entry].finish(TimingStatus::Completed, Some(error.clone()));
        self.context.mark_completed(phase);
        if !self.context.recovered_phases.contains(&phase) {
            self.context.recovered_phases.push(phase);
        }
        self.context.touch();

        let run_id = self.context.run_id.clone();
        let duration_ms = self.context.timings[entry].duration_ms;
        warn!(
            run_id = %run_id,
            phase = %phase,
            error = %error,
            "Phase failure absorbed by recovery policy"
        );
        self.emit(LifecycleEvent::PhaseRecovered {
            run_id: run_id.clone(),
            phase,
            error,
        });
        self.emit(LifecycleEvent::PhaseCompleted {
            run_id,
            phase,
            duration_ms,
        });
        PhaseStep::Recovered
    }

    fn skip_phase(&mut self, phase: PhaseId) -> Result<PhaseStep, ScaffolderError> {
        // Skipped phases still pass through their state so the next phase's
        // transition stays legal.
        if let Err(err) = self.transition(phase.active_state()) {
            return Err(self.fail_phase(phase, None, err));
        }

        self.context
            .timings
            .push(TimingEntry::instant(phase, TimingStatus::Skipped, None));
        self.context.mark_skipped(phase);
        self.context.touch();

        log_phase_skipped(&self.context.run_id, phase);
        self.emit(LifecycleEvent::PhaseSkipped {
            run_id: self.context.run_id.clone(),
            phase,
        });
        Ok(PhaseStep::Skipped)
    }

    /// Record a phase failure and move the run to `ERROR`.
    ///
    /// `entry` is the index of the running timing entry, if the handler had
    /// already been called.
    fn fail_phase(
        &mut self,
        phase: PhaseId,
        entry: Option<usize>,
        err: ScaffolderError,
    ) -> ScaffolderError {
        let message = err.to_string();
        let duration_ms = match entry {
            Some(index) => {
                let timing = &mut self.context.timings[index];
                timing.finish(TimingStatus::Failed, Some(message.clone()));
                timing.duration_ms
            }
            None => {
                self.context.timings.push(TimingEntry::instant(
                    phase,
                    TimingStatus::Failed,
                    Some(message.clone()),
                ));
                0
            }
        };

        self.record_error(&err);
        let run_id = self.context.run_id.clone();
        log_phase_error(&run_id, phase, err.code(), &message, duration_ms);

        if let ScaffolderError::Hook(hook) = &err {
            self.emit(LifecycleEvent::HookFailed {
                run_id: run_id.clone(),
                phase: hook.phase,
                kind: hook.kind,
                message: format!("{:#}", hook.source),
                dry_run: false,
            });
        }
        self.emit(LifecycleEvent::PhaseFailed {
            run_id,
            phase,
            code: err.code().to_string(),
            message,
        });

        self.enter_error();
        err
    }
}

/// Hooks wrapped around a handler report through it as
/// [`ScaffolderError::Hook`]. Any other `ScaffolderError` a handler returns is
/// the handler's own failure.
fn is_hook_failure(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ScaffolderError>()
        .is_some_and(ScaffolderError::is_hook_error)
}
