//! Pipeline executor for scaffold runs.
//!
//! [`PipelineExecutor`] wraps an orchestrator and adds cross-cutting
//! behavior without touching the phase handlers themselves:
//!
//! - `before` / `after` hooks, per phase or for every phase
//!   ([`PhaseSelector::Any`]). Wildcard hooks run first on both sides.
//! - `skip_when` predicates; any one returning true skips the phase.
//! - `on_phase_error` boundaries that may turn a handler failure into a
//!   no-op success. They are installed as the orchestrator's recovery
//!   policy, so a handler cannot declare itself recovered.
//! - A dry-run mode that previews sequencing and contracts without calling
//!   any handler.
//!
//! # Failure handling
//!
//! - Live runs: a hook error aborts its phase and is reported as
//!   `HOOK_FAILED`, distinct from `HANDLER_FAILED`.
//! - Live runs: a skip predicate error fails the phase.
//! - Dry runs: predicate errors count as "do not skip", and hook errors are
//!   collected in the outcome. A dry run always finishes.
//!
//! # Example
//!
//! ```rust,no_run
//! use scaffolder_hooks::{PhaseSelector, PipelineExecutor, sync_hook};
//! use scaffolder_utils::types::{ContextData, PhaseId};
//!
//! # async fn demo() {
//! let mut executor = PipelineExecutor::default();
//! executor
//!     .before(PhaseSelector::Any, sync_hook(|ctx| {
//!         tracing::info!(phase = %ctx.phase, "about to run");
//!         Ok(())
//!     }))
//!     .skip_when(PhaseId::Elicit, |data: &ContextData| data.contains_key("requirements"));
//!
//! executor.set_dry_run(true);
//! let outcome = executor.run(ContextData::new()).await;
//! assert!(outcome.dry_run);
//! # }
//! ```

mod dry_run;
mod executor;
mod hook;
mod outcome;
mod pipeline;

pub use dry_run::placeholder;
pub use executor::PipelineExecutor;
pub use hook::{
    ErrorBoundary, FnBoundary, FnHook, Hook, HookContext, PhaseSelector, SyncHook, boundary_fn,
    hook_fn, sync_hook,
};
pub use outcome::{OutcomeError, RunOutcome};
pub use pipeline::{
    CompiledPipeline, Stage, StageDescription, StageHandler, StageRecovery, StageSkip,
};
