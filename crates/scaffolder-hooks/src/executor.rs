use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use scaffolder_config::Config;
use scaffolder_events::{LifecycleObserver, ObserverSet};
use scaffolder_orchestrator::Orchestrator;
use scaffolder_phase_api::{PhaseHandler, SkipPredicate};
use scaffolder_utils::error::ScaffolderError;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

use crate::hook::{ErrorBoundary, Hook, PhaseSelector};
use crate::outcome::RunOutcome;
use crate::pipeline::{CompiledPipeline, Stage, StageHandler, StageRecovery, StageSkip};

/// Façade over an [`Orchestrator`] adding hooks, skip predicates, error
/// boundaries and dry runs.
///
/// Registrations live as long as the executor. Every `run()` and `resume()`
/// compiles them afresh, so anything registered between runs applies to the
/// next one.
///
/// The compiled pipeline owns the orchestrator's handlers, skip conditions
/// and recovery policies: installing it replaces whatever was bound there
/// directly.
pub struct PipelineExecutor {
    orchestrator: Orchestrator,
    handlers: HashMap<PhaseId, Arc<dyn PhaseHandler>>,
    before: Vec<(PhaseSelector, Arc<dyn Hook>)>,
    after: Vec<(PhaseSelector, Arc<dyn Hook>)>,
    skips: Vec<(PhaseSelector, Arc<dyn SkipPredicate>)>,
    boundaries: Vec<(PhaseSelector, Arc<dyn ErrorBoundary>)>,
    pub(crate) observers: ObserverSet,
    dry_run: bool,
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new(Orchestrator::default())
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("orchestrator", &self.orchestrator)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("skips", &self.skips.len())
            .field("boundaries", &self.boundaries.len())
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

/// Wildcard registrations first, then phase-specific ones, each group in
/// registration order.
fn select<T: ?Sized>(entries: &[(PhaseSelector, Arc<T>)], phase: PhaseId) -> Vec<Arc<T>> {
    let wildcard = entries.iter().filter(|(sel, _)| sel.is_wildcard());
    let specific = entries
        .iter()
        .filter(|(sel, _)| !sel.is_wildcard() && sel.matches(phase));
    wildcard.chain(specific).map(|(_, item)| Arc::clone(item)).collect()
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            handlers: HashMap::new(),
            before: Vec::new(),
            after: Vec::new(),
            skips: Vec::new(),
            boundaries: Vec::new(),
            observers: ObserverSet::new(),
            dry_run: false,
        }
    }

    /// Executor over a fresh orchestrator built from `config`, honouring its
    /// `dry_run` flag.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut executor = Self::new(Orchestrator::from_config(config));
        executor.dry_run = config.dry_run;
        executor
    }

    pub fn before<H>(&mut self, selector: impl Into<PhaseSelector>, hook: H) -> &mut Self
    where
        H: Hook + 'static,
    {
        self.before.push((selector.into(), Arc::new(hook)));
        self
    }

    pub fn after<H>(&mut self, selector: impl Into<PhaseSelector>, hook: H) -> &mut Self
    where
        H: Hook + 'static,
    {
        self.after.push((selector.into(), Arc::new(hook)));
        self
    }

    /// Skip matching phases when `predicate` returns true. Several
    /// predicates may apply to one phase; any one of them skips it.
    pub fn skip_when<P>(&mut self, selector: impl Into<PhaseSelector>, predicate: P) -> &mut Self
    where
        P: SkipPredicate + 'static,
    {
        self.skips.push((selector.into(), Arc::new(predicate)));
        self
    }

    /// Let `boundary` absorb handler failures of matching phases.
    ///
    /// Boundaries are tried wildcard-first until one returns `true`. Hook
    /// failures and contract violations are never offered to them.
    pub fn on_phase_error<B>(
        &mut self,
        selector: impl Into<PhaseSelector>,
        boundary: B,
    ) -> &mut Self
    where
        B: ErrorBoundary + 'static,
    {
        self.boundaries.push((selector.into(), Arc::new(boundary)));
        self
    }

    /// Bind `handler` to `phase`, replacing any previous one.
    pub fn register_handler<H>(&mut self, phase: PhaseId, handler: H) -> &mut Self
    where
        H: PhaseHandler + 'static,
    {
        let handler: Arc<dyn PhaseHandler> = Arc::new(handler);
        self.handlers.insert(phase, Arc::clone(&handler));
        self.orchestrator.register_shared_handler(phase, handler);
        self
    }

    pub fn add_observer(&mut self, observer: Arc<dyn LifecycleObserver>) -> &mut Self {
        self.observers.add(Arc::clone(&observer));
        self.orchestrator.add_observer(observer);
        self
    }

    pub fn set_dry_run(&mut self, dry_run: bool) -> &mut Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Direct access for operations the executor does not wrap, such as
    /// `rewind`.
    ///
    /// Handlers, skip conditions and recovery policies bound through this
    /// reference are replaced by the compiled pipeline at the next `run()` or
    /// `resume()`. Register them on the executor instead.
    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    /// Build the per-phase pipeline from the current registrations.
    #[must_use]
    pub fn compile(&self) -> CompiledPipeline {
        let stages = PhaseId::ALL
            .into_iter()
            .map(|phase| Stage {
                phase,
                before: select(&self.before, phase),
                after: select(&self.after, phase),
                skip: select(&self.skips, phase),
                boundaries: select(&self.boundaries, phase),
                handler: self.handlers.get(&phase).cloned(),
            })
            .collect();
        CompiledPipeline { stages }
    }

    fn install(&mut self, pipeline: &CompiledPipeline) {
        for stage in pipeline.stages() {
            let phase = stage.phase();
            match StageHandler::new(stage.clone()) {
                Some(handler) => self
                    .orchestrator
                    .register_shared_handler(phase, Arc::new(handler)),
                None => {
                    self.orchestrator.unregister_handler(phase);
                }
            }
            match StageSkip::new(stage) {
                Some(skip) => self
                    .orchestrator
                    .register_shared_skip_condition(phase, Arc::new(skip)),
                None => self.orchestrator.clear_skip_condition(phase),
            }
            match StageRecovery::new(stage) {
                Some(recovery) => self
                    .orchestrator
                    .register_shared_recovery_policy(phase, Arc::new(recovery)),
                None => self.orchestrator.clear_recovery_policy(phase),
            }
        }
    }

    /// Run the whole pipeline from a fresh run.
    ///
    /// In dry-run mode no handler is called and the orchestrator is left
    /// untouched. Failures are reported in the outcome, never returned.
    pub async fn run(&mut self, initial_data: ContextData) -> RunOutcome {
        if self.dry_run {
            let pipeline = self.compile();
            return self.simulate(&pipeline, initial_data).await;
        }

        self.orchestrator.reset(false);
        let pipeline = self.compile();
        info!(stages = ?pipeline.describe(), "Installing compiled pipeline");
        self.install(&pipeline);

        let result = self.orchestrator.start(initial_data).await;
        self.outcome(result.err().as_ref())
    }

    /// Resume a failed live run.
    ///
    /// Refused (with the refusal reported in the outcome) when the
    /// orchestrator cannot resume.
    pub async fn resume(&mut self, additional_data: ContextData) -> RunOutcome {
        if !self.orchestrator.can_resume() {
            let state = self.orchestrator.state();
            let err = if matches!(state, RunState::Idle | RunState::Complete) {
                ScaffolderError::InvalidState {
                    operation: "resume",
                    state,
                }
            } else {
                ScaffolderError::RetriesExhausted {
                    retry_count: self.orchestrator.retry_count(),
                    max_retries: self.orchestrator.max_retries(),
                }
            };
            return self.outcome(Some(&err));
        }

        let pipeline = self.compile();
        self.install(&pipeline);
        let result = self.orchestrator.resume(additional_data).await;
        self.outcome(result.err().as_ref())
    }

    fn outcome(&self, err: Option<&ScaffolderError>) -> RunOutcome {
        // Phase and validation failures are already in the run's error log.
        let rejected = err.filter(|e| {
            matches!(
                e,
                ScaffolderError::InvalidState { .. } | ScaffolderError::RetriesExhausted { .. }
            )
        });
        RunOutcome::from_context(&self.orchestrator.context(), rejected)
    }
}
