//! Run orchestrator for the scaffold workflow
//!
//! The [`Orchestrator`] owns one run at a time. It drives the five phases in
//! canonical order through the transition matrix held by its
//! [`PhaseRegistry`], validates each handler's inputs and outputs, merges
//! accepted outputs into the run context, and keeps the timing and error logs
//! that [`RunMetrics`] summarizes.
//!
//! Failures always land the run in `ERROR`. From there only
//! [`resume`](Orchestrator::resume) (bounded by `max_retries`),
//! [`rewind`](Orchestrator::rewind) followed by `resume`, or
//! [`reset`](Orchestrator::reset) continue.
//!
//! Concurrent runs need independent orchestrators. They may share one
//! registry.

mod context;
mod metrics;
mod phase_exec;
mod workflow;

pub use context::{ErrorRecord, RunContext, TimingEntry, TimingStatus};
pub use metrics::RunMetrics;
pub use phase_exec::PhaseStep;

use std::collections::HashMap;
use std::sync::Arc;

use scaffolder_config::{Config, DEFAULT_MAX_RETRIES};
use scaffolder_events::{LifecycleEvent, LifecycleObserver, ObserverSet};
use scaffolder_phase_api::{PhaseHandler, RecoveryPolicy, SkipPredicate};
use scaffolder_registry::{PhaseRegistry, default_registry};
use scaffolder_utils::error::ScaffolderError;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

/// Construction-time settings for an [`Orchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on `resume()` calls per run.
    pub max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
        }
    }
}

/// Stateful run controller.
pub struct Orchestrator {
    registry: Arc<PhaseRegistry>,
    config: OrchestratorConfig,
    handlers: HashMap<PhaseId, Arc<dyn PhaseHandler>>,
    skip_conditions: HashMap<PhaseId, Arc<dyn SkipPredicate>>,
    recovery: HashMap<PhaseId, Arc<dyn RecoveryPolicy>>,
    observers: ObserverSet,
    context: RunContext,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(default_registry(), OrchestratorConfig::default())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().copied().collect();
        handlers.sort();
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("handlers", &handlers)
            .field("observers", &self.observers)
            .field("run_id", &self.context.run_id)
            .field("state", &self.context.state)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(registry: Arc<PhaseRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            registry,
            config,
            handlers: HashMap::new(),
            skip_conditions: HashMap::new(),
            recovery: HashMap::new(),
            observers: ObserverSet::new(),
            context: RunContext::new(ContextData::new()),
        }
    }

    /// Orchestrator over the shared standard registry.
    #[must_use]
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self::new(default_registry(), config)
    }

    /// Orchestrator configured from a loaded [`Config`].
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_config(OrchestratorConfig::from(config))
    }

    // ---- registration -------------------------------------------------

    /// Bind `handler` to `phase`, replacing any previous handler.
    pub fn register_phase_handler<H>(&mut self, phase: PhaseId, handler: H)
    where
        H: PhaseHandler + 'static,
    {
        self.handlers.insert(phase, Arc::new(handler));
    }

    /// Bind an already shared handler to `phase`.
    pub fn register_shared_handler(&mut self, phase: PhaseId, handler: Arc<dyn PhaseHandler>) {
        self.handlers.insert(phase, handler);
    }

    /// Remove and return the handler bound to `phase`.
    pub fn unregister_handler(&mut self, phase: PhaseId) -> Option<Arc<dyn PhaseHandler>> {
        self.handlers.remove(&phase)
    }

    #[must_use]
    pub fn has_handler(&self, phase: PhaseId) -> bool {
        self.handlers.contains_key(&phase)
    }

    /// Bind a skip predicate to `phase`, replacing any previous one.
    pub fn register_skip_condition<P>(&mut self, phase: PhaseId, predicate: P)
    where
        P: SkipPredicate + 'static,
    {
        self.skip_conditions.insert(phase, Arc::new(predicate));
    }

    pub fn register_shared_skip_condition(
        &mut self,
        phase: PhaseId,
        predicate: Arc<dyn SkipPredicate>,
    ) {
        self.skip_conditions.insert(phase, predicate);
    }

    pub fn clear_skip_condition(&mut self, phase: PhaseId) {
        self.skip_conditions.remove(&phase);
    }

    /// Bind a recovery policy to `phase`, replacing any previous one.
    ///
    /// Without a policy every handler failure is fatal to the run.
    pub fn register_recovery_policy<P>(&mut self, phase: PhaseId, policy: P)
    where
        P: RecoveryPolicy + 'static,
    {
        self.recovery.insert(phase, Arc::new(policy));
    }

    pub fn register_shared_recovery_policy(
        &mut self,
        phase: PhaseId,
        policy: Arc<dyn RecoveryPolicy>,
    ) {
        self.recovery.insert(phase, policy);
    }

    pub fn clear_recovery_policy(&mut self, phase: PhaseId) {
        self.recovery.remove(&phase);
    }

    pub fn add_observer(&mut self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.add(observer);
    }

    // ---- accessors ----------------------------------------------------

    #[must_use]
    pub fn registry(&self) -> &Arc<PhaseRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> OrchestratorConfig {
        self.config
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.context.state
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.context.run_id
    }

    #[must_use]
    pub fn current_phase(&self) -> Option<PhaseId> {
        self.context.current_phase
    }

    /// Copy of the whole run context.
    #[must_use]
    pub fn context(&self) -> RunContext {
        self.context.clone()
    }

    /// Copy of the accumulated data.
    #[must_use]
    pub fn data(&self) -> ContextData {
        self.context.data.clone()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.context.errors.clone()
    }

    #[must_use]
    pub fn timings(&self) -> Vec<TimingEntry> {
        self.context.timings.clone()
    }

    #[must_use]
    pub fn completed_phases(&self) -> Vec<PhaseId> {
        self.context.completed_phases.clone()
    }

    #[must_use]
    pub fn skipped_phases(&self) -> Vec<PhaseId> {
        self.context.skipped_phases.clone()
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.context.retry_count
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.context.state == RunState::Complete
    }

    #[must_use]
    pub fn get_metrics(&self) -> RunMetrics {
        RunMetrics::from_context(&self.context)
    }

    /// Whether [`resume`](Self::resume) would be accepted right now.
    #[must_use]
    pub fn can_resume(&self) -> bool {
        !matches!(self.context.state, RunState::Idle | RunState::Complete)
            && self.context.retry_count < self.config.max_retries
    }

    // ---- internals shared by phase_exec and workflow -------------------

    fn emit(&self, event: LifecycleEvent) {
        self.observers.emit(&event);
    }

    /// Move to `to` if the matrix allows it.
    fn transition(&mut self, to: RunState) -> Result<(), ScaffolderError> {
        let from = self.context.state;
        let check = self.registry.validate_transition(from, to);
        if !check.valid {
            return Err(ScaffolderError::InvalidTransition {
                from,
                to,
                reason: check.reason.unwrap_or_default(),
            });
        }

        self.context.state = to;
        self.context.touch();
        tracing::debug!(run_id = %self.context.run_id, from = %from, to = %to, "State transition");
        self.emit(LifecycleEvent::StateChanged {
            run_id: self.context.run_id.clone(),
            from,
            to,
        });
        Ok(())
    }

    /// Force the run into `ERROR` when the matrix allows it from here.
    fn enter_error(&mut self) {
        if self.context.state != RunState::Error
            && scaffolder_registry::is_legal(self.context.state, RunState::Error)
        {
            // Legal by the check above.
            let _ = self.transition(RunState::Error);
        }
    }

    /// Append `error` to the run's error log.
    fn record_error(&mut self, error: &ScaffolderError) {
        self.context.errors.push(ErrorRecord::from_error(error));
        self.context.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_orchestrator_is_idle() {
        let orchestrator = Orchestrator::default();
        assert_eq!(orchestrator.state(), RunState::Idle);
        assert_eq!(orchestrator.max_retries(), DEFAULT_MAX_RETRIES);
        assert!(!orchestrator.can_resume());
        assert!(orchestrator.data().is_empty());
        assert!(!orchestrator.is_complete());
    }

    #[test]
    fn test_config_flows_into_orchestrator() {
        let config = Config::builder().max_retries(7).build().unwrap();
        let orchestrator = Orchestrator::from_config(&config);
        assert_eq!(orchestrator.max_retries(), 7);
    }

    #[test]
    fn test_transition_rejects_illegal_targets() {
        let mut orchestrator = Orchestrator::default();
        let err = orchestrator.transition(RunState::Complete).unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(orchestrator.state(), RunState::Idle);

        orchestrator.transition(RunState::Discovering).unwrap();
        assert_eq!(orchestrator.state(), RunState::Discovering);
    }

    #[test]
    fn test_enter_error_is_noop_from_complete() {
        let mut orchestrator = Orchestrator::default();
        orchestrator.context.state = RunState::Complete;
        orchestrator.enter_error();
        assert_eq!(orchestrator.state(), RunState::Complete);
    }
}
