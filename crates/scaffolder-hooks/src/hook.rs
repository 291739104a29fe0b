//! Caller-supplied callables wrapped around phase handlers.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::future::Future;

use scaffolder_utils::types::{ContextData, HookKind, PhaseId};

/// Which phases a hook, predicate or boundary applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseSelector {
    /// Every phase (the wildcard).
    Any,
    Phase(PhaseId),
}

impl PhaseSelector {
    #[must_use]
    pub fn matches(&self, phase: PhaseId) -> bool {
        match self {
            Self::Any => true,
            Self::Phase(p) => *p == phase,
        }
    }

    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<PhaseId> for PhaseSelector {
    fn from(phase: PhaseId) -> Self {
        Self::Phase(phase)
    }
}

impl fmt::Display for PhaseSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Phase(p) => write!(f, "{p}"),
        }
    }
}

/// What a hook or error boundary gets to see.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookContext {
    pub phase: PhaseId,
    pub run_id: String,
    /// Copy of the run data. For `after` hooks this includes the phase's output.
    pub data: ContextData,
    pub dry_run: bool,
    pub kind: HookKind,
}

/// Callable run immediately before or after a phase handler.
///
/// An error aborts the phase in live runs and is reported as `HOOK_FAILED`.
/// In dry runs it is collected into the outcome instead.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, ctx: &HookContext) -> Result<()>;
}

pub struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: &HookContext) -> Result<()> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap an async closure as a [`Hook`]. The closure receives its own copy of
/// the context.
pub fn hook_fn<F, Fut>(f: F) -> FnHook<F>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    FnHook(f)
}

pub struct SyncHook<F>(F);

#[async_trait]
impl<F> Hook for SyncHook<F>
where
    F: Fn(&HookContext) -> Result<()> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &HookContext) -> Result<()> {
        (self.0)(ctx)
    }
}

/// Wrap a synchronous closure as a [`Hook`].
pub fn sync_hook<F>(f: F) -> SyncHook<F>
where
    F: Fn(&HookContext) -> Result<()> + Send + Sync + 'static,
{
    SyncHook(f)
}

/// Decides whether a handler failure becomes a no-op success.
///
/// Returning `true` records the phase completed with nothing merged. The
/// context has kind [`HookKind::OnError`] and holds the data the failed
/// handler was given.
#[async_trait]
pub trait ErrorBoundary: Send + Sync {
    async fn recover(&self, error: &anyhow::Error, ctx: &HookContext) -> bool;
}

pub struct FnBoundary<F>(F);

#[async_trait]
impl<F> ErrorBoundary for FnBoundary<F>
where
    F: Fn(&anyhow::Error, &HookContext) -> bool + Send + Sync + 'static,
{
    async fn recover(&self, error: &anyhow::Error, ctx: &HookContext) -> bool {
        (self.0)(error, ctx)
    }
}

/// Wrap a synchronous closure as an [`ErrorBoundary`].
pub fn boundary_fn<F>(f: F) -> FnBoundary<F>
where
    F: Fn(&anyhow::Error, &HookContext) -> bool + Send + Sync + 'static,
{
    FnBoundary(f)
}
