//! Per-run compiled view of the executor's registrations.
//!
//! [`CompiledPipeline`] is a plain value built from the executor's current
//! hooks, predicates, boundaries and handlers. A live run installs one
//! [`StageHandler`], one [`StageSkip`] and one [`StageRecovery`] per phase
//! into the orchestrator; a dry run walks the stages directly.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use scaffolder_phase_api::{ContextSnapshot, PhaseHandler, RecoveryPolicy, SkipPredicate};
use scaffolder_utils::error::{HookError, ScaffolderError};
use scaffolder_utils::types::{ContextData, HookKind, PhaseId};

use crate::hook::{ErrorBoundary, Hook, HookContext};

/// Everything registered for one phase, in execution order.
#[derive(Clone)]
pub struct Stage {
    pub(crate) phase: PhaseId,
    pub(crate) before: Vec<Arc<dyn Hook>>,
    pub(crate) after: Vec<Arc<dyn Hook>>,
    pub(crate) skip: Vec<Arc<dyn SkipPredicate>>,
    pub(crate) boundaries: Vec<Arc<dyn ErrorBoundary>>,
    pub(crate) handler: Option<Arc<dyn PhaseHandler>>,
}

impl Stage {
    #[must_use]
    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    #[must_use]
    pub fn describe(&self) -> StageDescription {
        StageDescription {
            phase: self.phase,
            before_hooks: self.before.len(),
            after_hooks: self.after.len(),
            skip_predicates: self.skip.len(),
            error_boundaries: self.boundaries.len(),
            has_handler: self.has_handler(),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe().fmt(f)
    }
}

/// Counts of what a stage carries. Serializable for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageDescription {
    pub phase: PhaseId,
    pub before_hooks: usize,
    pub after_hooks: usize,
    pub skip_predicates: usize,
    pub error_boundaries: usize,
    pub has_handler: bool,
}

/// One stage per phase, in canonical order.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub(crate) stages: Vec<Stage>,
}

impl CompiledPipeline {
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn stage(&self, phase: PhaseId) -> &Stage {
        &self.stages[phase.order()]
    }

    #[must_use]
    pub fn describe(&self) -> Vec<StageDescription> {
        self.stages.iter().map(Stage::describe).collect()
    }
}

/// A phase handler with its before and after hooks around it.
pub struct StageHandler {
    stage: Stage,
    inner: Arc<dyn PhaseHandler>,
}

impl StageHandler {
    /// `None` when the stage has no handler to wrap.
    #[must_use]
    pub fn new(stage: Stage) -> Option<Self> {
        let inner = stage.handler.clone()?;
        Some(Self { stage, inner })
    }

    fn hook_context(&self, run_id: &str, data: ContextData, kind: HookKind) -> HookContext {
        HookContext {
            phase: self.stage.phase,
            run_id: run_id.to_string(),
            data,
            dry_run: false,
            kind,
        }
    }

    async fn run_hooks(&self, hooks: &[Arc<dyn Hook>], ctx: &HookContext) -> Result<()> {
        for hook in hooks {
            hook.call(ctx).await.map_err(|source| {
                anyhow::Error::new(ScaffolderError::Hook(HookError {
                    kind: ctx.kind,
                    phase: ctx.phase,
                    source,
                }))
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl PhaseHandler for StageHandler {
    async fn handle(&self, snapshot: ContextSnapshot) -> Result<ContextData> {
        let run_id = snapshot.run_id().to_string();
        let data = snapshot.data().clone();

        let before = self.hook_context(&run_id, data.clone(), HookKind::Before);
        self.run_hooks(&self.stage.before, &before).await?;

        // A failing handler skips the after hooks.
        let output = self.inner.handle(snapshot).await?;

        let mut merged = data;
        merged.extend(output.clone());
        let after = self.hook_context(&run_id, merged, HookKind::After);
        self.run_hooks(&self.stage.after, &after).await?;
        Ok(output)
    }
}

/// A stage's error boundaries, consulted in order until one recovers.
///
/// Boundaries see a [`HookContext`] of kind [`HookKind::OnError`] carrying
/// the data the failed handler was given.
pub struct StageRecovery {
    boundaries: Vec<Arc<dyn ErrorBoundary>>,
}

impl StageRecovery {
    /// `None` when the stage has no boundaries.
    #[must_use]
    pub fn new(stage: &Stage) -> Option<Self> {
        if stage.boundaries.is_empty() {
            return None;
        }
        Some(Self {
            boundaries: stage.boundaries.clone(),
        })
    }
}

#[async_trait]
impl RecoveryPolicy for StageRecovery {
    async fn recover(&self, error: &anyhow::Error, snapshot: &ContextSnapshot) -> bool {
        let ctx = HookContext {
            phase: snapshot.phase(),
            run_id: snapshot.run_id().to_string(),
            data: snapshot.data().clone(),
            dry_run: false,
            kind: HookKind::OnError,
        };
        for boundary in &self.boundaries {
            if boundary.recover(error, &ctx).await {
                debug!(phase = %ctx.phase, error = %error, "Error boundary recovered phase");
                return true;
            }
        }
        false
    }
}

/// Any-of combination of a stage's skip predicates.
///
/// Errors propagate, so a failing predicate fails the phase in a live run.
pub struct StageSkip {
    predicates: Vec<Arc<dyn SkipPredicate>>,
}

impl StageSkip {
    /// `None` when the stage has no predicates.
    #[must_use]
    pub fn new(stage: &Stage) -> Option<Self> {
        if stage.skip.is_empty() {
            return None;
        }
        Some(Self {
            predicates: stage.skip.clone(),
        })
    }
}

impl SkipPredicate for StageSkip {
    fn should_skip(&self, data: &ContextData) -> Result<bool> {
        for predicate in &self.predicates {
            if predicate.should_skip(data)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
