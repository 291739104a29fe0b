//! Phase handler contract for the scaffold orchestrator
//!
//! This crate defines the caller-supplied side of phase execution: the
//! [`PhaseHandler`] trait, the read-only [`ContextSnapshot`] a handler
//! receives, the [`SkipPredicate`] used to bypass a phase, and the
//! [`RecoveryPolicy`] that may absorb a handler failure.
//!
//! # Purpose
//!
//! Handlers, predicates and hooks are supplied by the caller; the core only
//! enforces ordering, contracts and state legality. Keeping the contract in
//! its own crate lets handler implementations depend on it without pulling in
//! the orchestrator.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;

pub use scaffolder_utils::types::{ContextData, PhaseId};

/// Read-only copy of a run's accumulated data, handed to a phase handler.
///
/// The snapshot owns its data; nothing a handler does to it reaches the live
/// run context. Only the map the handler returns is merged back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
    run_id: String,
    phase: PhaseId,
    data: ContextData,
}

impl ContextSnapshot {
    #[must_use]
    pub fn new(run_id: impl Into<String>, phase: PhaseId, data: ContextData) -> Self {
        Self {
            run_id: run_id.into(),
            phase,
            data,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The phase this snapshot was taken for.
    #[must_use]
    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    #[must_use]
    pub fn data(&self) -> &ContextData {
        &self.data
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Consume the snapshot, yielding its data.
    #[must_use]
    pub fn into_data(self) -> ContextData {
        self.data
    }
}

/// Core trait that every phase handler implements.
///
/// A handler receives a snapshot of the accumulated context and returns a
/// partial update, which must contain every output key the phase declares.
/// It may perform internal concurrent work, but the
/// orchestrator awaits it to completion before considering the next phase.
/// Timeouts are the handler's own responsibility.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Execute the phase against a read-only snapshot.
    ///
    /// # Errors
    /// Any error is reported as a handler failure for this phase and moves the
    /// run to `ERROR`, unless a [`RecoveryPolicy`] bound to the phase absorbs
    /// it.
    async fn handle(&self, snapshot: ContextSnapshot) -> Result<ContextData>;
}

/// Decides whether a failed handler call becomes a no-op success.
///
/// Bound per phase on the orchestrator. It is consulted only for the
/// handler's own failures, never for hook failures or contract violations.
#[async_trait]
pub trait RecoveryPolicy: Send + Sync {
    /// Return `true` to record the phase completed with nothing merged.
    ///
    /// `snapshot` is the data the failed handler was given.
    async fn recover(&self, error: &anyhow::Error, snapshot: &ContextSnapshot) -> bool;
}

/// Adapter turning an async closure into a [`PhaseHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> PhaseHandler for FnHandler<F>
where
    F: Fn(ContextSnapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ContextData>> + Send + 'static,
{
    async fn handle(&self, snapshot: ContextSnapshot) -> Result<ContextData> {
        (self.0)(snapshot).await
    }
}

/// Wrap an async closure returning the phase's output map.
///
/// ```rust
/// use scaffolder_phase_api::{ContextData, handler_fn};
///
/// let handler = handler_fn(|snapshot| async move {
///     let mut out = ContextData::new();
///     out.insert("echo".into(), snapshot.get("userInput").cloned().unwrap_or_default());
///     Ok::<_, anyhow::Error>(out)
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ContextSnapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ContextData>> + Send + 'static,
{
    FnHandler(f)
}

/// Adapter turning a synchronous closure into a [`PhaseHandler`].
pub struct SyncHandler<F>(F);

#[async_trait]
impl<F> PhaseHandler for SyncHandler<F>
where
    F: Fn(&ContextSnapshot) -> Result<ContextData> + Send + Sync + 'static,
{
    async fn handle(&self, snapshot: ContextSnapshot) -> Result<ContextData> {
        (self.0)(&snapshot)
    }
}

/// Wrap a synchronous closure returning the phase's output map.
pub fn sync_handler<F>(f: F) -> SyncHandler<F>
where
    F: Fn(&ContextSnapshot) -> Result<ContextData> + Send + Sync + 'static,
{
    SyncHandler(f)
}

/// Boolean test deciding whether a phase is bypassed.
///
/// Expected to be synchronous and side-effect-free. Returning an error is the
/// equivalent of a predicate that throws.
pub trait SkipPredicate: Send + Sync {
    /// # Errors
    /// Returns an error if the predicate cannot be evaluated.
    fn should_skip(&self, data: &ContextData) -> Result<bool>;
}

impl<F> SkipPredicate for F
where
    F: Fn(&ContextData) -> bool + Send + Sync,
{
    fn should_skip(&self, data: &ContextData) -> Result<bool> {
        Ok(self(data))
    }
}

/// Adapter for predicates that can fail.
pub struct FallibleSkip<F>(F);

impl<F> SkipPredicate for FallibleSkip<F>
where
    F: Fn(&ContextData) -> Result<bool> + Send + Sync,
{
    fn should_skip(&self, data: &ContextData) -> Result<bool> {
        (self.0)(data)
    }
}

pub fn fallible_skip<F>(f: F) -> FallibleSkip<F>
where
    F: Fn(&ContextData) -> Result<bool> + Send + Sync,
{
    FallibleSkip(f)
}
