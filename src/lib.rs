//! scaffolder - phase-contract orchestration for scaffolded project generation
//!
//! A scaffold run walks five ordered phases:
//!
//! ```text
//! Discover → Elicit → Blueprint → Generate → Integrate
//! ```
//!
//! Each phase is implemented by a caller-supplied handler. This crate only
//! enforces ordering, the per-phase input/output contracts and the legality
//! of every state transition.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scaffolder::{ContextData, PhaseId, PipelineExecutor, handler_fn};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let mut executor = PipelineExecutor::default();
//! executor.register_handler(PhaseId::Discover, handler_fn(|snapshot| async move {
//!     let mut out = ContextData::new();
//!     out.insert("detectedDomain".into(), json!("web"));
//!     out.insert("detectedPatterns".into(), json!(["rest"]));
//!     out.insert("confidence".into(), json!(0.9));
//!     let _ = snapshot;
//!     Ok::<_, anyhow::Error>(out)
//! }));
//! // ... register the remaining phases ...
//!
//! let mut input = ContextData::new();
//! input.insert("userInput".into(), json!("a todo api"));
//! let outcome = executor.run(input).await;
//! if !outcome.success {
//!     for error in &outcome.errors {
//!         eprintln!("{}: {}", error.code, error.message);
//!     }
//! }
//! # }
//! ```
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`PhaseRegistry`] | Stateless phase contracts and transition matrix |
//! | [`Orchestrator`] | One run's state machine, context, resume and rewind |
//! | [`PipelineExecutor`] | Hooks, skip predicates, error boundaries, dry runs |
//!
//! # Logging
//!
//! Runs log through `tracing`. Binaries install a subscriber once, usually
//! with [`Config::init_logging`] so the configured `verbose` flag applies, or
//! with [`init_json_tracing`] for machine-readable output.
//!
//! # Error Handling
//!
//! Every fallible operation returns [`ScaffolderError`], whose
//! [`code()`](ScaffolderError::code) is one of the stable machine codes
//! (`PHASE_INPUT_INVALID`, `HANDLER_FAILED`, ...). The executor reports
//! failures inside [`RunOutcome`] instead of returning them.

pub use scaffolder_config::{Config, ConfigBuilder, ConfigSource, DEFAULT_MAX_RETRIES};
pub use scaffolder_events::{
    LifecycleEvent, LifecycleObserver, LoggingObserver, ObserverSet, RecordingObserver,
};
pub use scaffolder_hooks::{
    CompiledPipeline, ErrorBoundary, Hook, HookContext, OutcomeError, PhaseSelector,
    PipelineExecutor, RunOutcome, StageDescription, boundary_fn, hook_fn, placeholder, sync_hook,
};
pub use scaffolder_orchestrator::{
    ErrorRecord, Orchestrator, OrchestratorConfig, PhaseStep, RunContext, RunMetrics, TimingEntry,
    TimingStatus,
};
pub use scaffolder_phase_api::{
    ContextSnapshot, PhaseHandler, RecoveryPolicy, SkipPredicate, fallible_skip, handler_fn,
    sync_handler,
};
pub use scaffolder_registry::{
    InputValidation, OutputValidation, PhaseDefinition, PhaseRegistry, TransitionCheck,
    default_registry,
};
pub use scaffolder_utils::error::{
    ConfigError, ContractError, ErrorCategory, HookError, ScaffolderError, UserFriendlyError,
};
pub use scaffolder_utils::logging::{init_json_tracing, init_tracing};
pub use scaffolder_utils::types::{ContextData, HookKind, PhaseId, RunState};
