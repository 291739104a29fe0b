//! Dry-run simulation.
//!
//! Walks a compiled pipeline without calling any handler and without touching
//! the orchestrator. Contract problems become warnings, hook failures become
//! outcome errors; nothing is ever returned as `Err`.

use serde_json::Value;
use tracing::{info, warn};

use scaffolder_events::LifecycleEvent;
use scaffolder_orchestrator::{TimingEntry, TimingStatus};
use scaffolder_utils::logging::log_dry_run_warning;
use scaffolder_utils::types::{ContextData, HookKind, PhaseId, RunState};

use crate::executor::PipelineExecutor;
use crate::hook::{Hook, HookContext};
use crate::outcome::{OutcomeError, RunOutcome};
use crate::pipeline::{CompiledPipeline, Stage};

/// Value synthesized for a declared output key during a dry run.
#[must_use]
pub fn placeholder(phase: PhaseId, key: &str) -> Value {
    Value::String(format!("<dry-run:{phase}.{key}>"))
}

struct Simulation {
    run_id: String,
    data: ContextData,
    timings: Vec<TimingEntry>,
    completed: Vec<PhaseId>,
    skipped: Vec<PhaseId>,
    errors: Vec<OutcomeError>,
    warnings: Vec<String>,
}

impl PipelineExecutor {
    pub(crate) async fn simulate(
        &self,
        pipeline: &CompiledPipeline,
        initial_data: ContextData,
    ) -> RunOutcome {
        let mut sim = Simulation {
            run_id: uuid::Uuid::new_v4().to_string(),
            data: initial_data,
            timings: Vec::new(),
            completed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        info!(run_id = %sim.run_id, "Starting dry run");
        self.observers.emit(&LifecycleEvent::DryRunStarted {
            run_id: sim.run_id.clone(),
        });

        for stage in pipeline.stages() {
            self.simulate_stage(stage, &mut sim).await;
        }

        let success = sim.errors.is_empty();
        info!(
            run_id = %sim.run_id,
            success,
            errors = sim.errors.len(),
            warnings = sim.warnings.len(),
            "Dry run finished"
        );
        self.observers.emit(&LifecycleEvent::DryRunCompleted {
            run_id: sim.run_id.clone(),
            success,
            error_count: sim.errors.len(),
        });

        let total_duration_ms = sim.timings.iter().map(|t| t.duration_ms).sum();
        RunOutcome {
            success,
            run_id: sim.run_id,
            state: RunState::Complete,
            data: sim.data,
            timings: sim.timings,
            completed_phases: sim.completed,
            skipped_phases: sim.skipped,
            total_duration_ms,
            errors: sim.errors,
            warnings: sim.warnings,
            dry_run: true,
        }
    }

    async fn simulate_stage(&self, stage: &Stage, sim: &mut Simulation) {
        let phase = stage.phase;

        // Fail open: a broken predicate must not block a preview.
        let skip = stage.skip.iter().any(|predicate| {
            predicate.should_skip(&sim.data).unwrap_or_else(|e| {
                warn!(
                    run_id = %sim.run_id,
                    phase = %phase,
                    error = %e,
                    "Skip predicate failed during dry run; treating as false"
                );
                false
            })
        });
        if skip {
            sim.timings
                .push(TimingEntry::instant(phase, TimingStatus::Skipped, None));
            sim.skipped.push(phase);
            self.observers.emit(&LifecycleEvent::DryRunPhase {
                run_id: sim.run_id.clone(),
                phase,
                skipped: true,
                warnings: Vec::new(),
            });
            return;
        }

        let registry = self.orchestrator().registry();
        let mut warnings = Vec::new();
        let input = registry.validate_phase_input(phase, &sim.data);
        if !input.valid {
            let warning = format!(
                "{phase}: missing required input(s): {}",
                input.missing.join(", ")
            );
            log_dry_run_warning(&sim.run_id, phase, &warning);
            warnings.push(warning);
        }

        self.simulate_hooks(&stage.before, HookKind::Before, phase, sim)
            .await;

        for key in &registry.definition(phase).outputs {
            sim.data.insert(key.clone(), placeholder(phase, key));
        }

        self.simulate_hooks(&stage.after, HookKind::After, phase, sim)
            .await;

        let status = if warnings.is_empty() {
            TimingStatus::Simulated
        } else {
            TimingStatus::SimulatedWithWarnings
        };
        sim.timings.push(TimingEntry::instant(phase, status, None));
        sim.completed.push(phase);

        self.observers.emit(&LifecycleEvent::DryRunPhase {
            run_id: sim.run_id.clone(),
            phase,
            skipped: false,
            warnings: warnings.clone(),
        });
        sim.warnings.extend(warnings);
    }

    /// Run hooks best-effort, collecting failures as outcome errors.
    async fn simulate_hooks(
        &self,
        hooks: &[std::sync::Arc<dyn Hook>],
        kind: HookKind,
        phase: PhaseId,
        sim: &mut Simulation,
    ) {
        if hooks.is_empty() {
            return;
        }

        let ctx = HookContext {
            phase,
            run_id: sim.run_id.clone(),
            data: sim.data.clone(),
            dry_run: true,
            kind,
        };
        for hook in hooks {
            if let Err(e) = hook.call(&ctx).await {
                let message = format!("{kind} hook for phase {phase} failed: {e:#}");
                warn!(
                    run_id = %sim.run_id,
                    phase = %phase,
                    kind = %kind,
                    error = %e,
                    "Hook failed during dry run"
                );
                self.observers.emit(&LifecycleEvent::HookFailed {
                    run_id: sim.run_id.clone(),
                    phase,
                    kind,
                    message: format!("{e:#}"),
                    dry_run: true,
                });
                sim.errors.push(OutcomeError {
                    code: "HOOK_FAILED".to_string(),
                    phase: Some(phase),
                    message,
                });
            }
        }
    }
}
