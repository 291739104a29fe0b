use std::fmt;
use thiserror::Error;

use crate::types::{HookKind, PhaseId, RunState};

/// Library-level error type for scaffold orchestration.
///
/// `ScaffolderError` is returned by every fallible registry, orchestrator and
/// executor operation. It provides:
/// - A stable machine code via [`code()`](Self::code)
/// - User-friendly messages with context and suggestions via [`UserFriendlyError`]
/// - The phase the failure belongs to, when there is one
///
/// # Error Categories
///
/// | Category | Variants |
/// |----------|----------|
/// | Contract | `Contract` (input, output, post-run validation) |
/// | Transition | `InvalidTransition` |
/// | Handler | `Handler`, `UnregisteredHandler`, `SkipPredicate` |
/// | Hook | `Hook` |
/// | Lifecycle | `InvalidState`, `RetriesExhausted`, `UnknownPhase` |
/// | Configuration | `Config` |
///
/// Handler and hook failures carry the caller's original `anyhow::Error` as
/// their source.
#[derive(Error, Debug)]
pub enum ScaffolderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: RunState,
        to: RunState,
        reason: String,
    },

    #[error("Phase {phase} handler failed: {source}")]
    Handler {
        phase: PhaseId,
        #[source]
        source: anyhow::Error,
    },

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    #[error("No handler registered for phase {phase}")]
    UnregisteredHandler { phase: PhaseId },

    #[error("Unknown phase: {id}")]
    UnknownPhase { id: String },

    #[error("Cannot {operation} while run is in state {state}")]
    InvalidState {
        operation: &'static str,
        state: RunState,
    },

    #[error("Retry limit reached: {retry_count} of {max_retries} retries used")]
    RetriesExhausted { retry_count: u32, max_retries: u32 },

    #[error("Skip predicate for phase {phase} failed: {reason}")]
    SkipPredicate { phase: PhaseId, reason: String },
}

impl ScaffolderError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_INVALID",
            Self::Contract(e) => e.code(),
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Handler { .. } => "HANDLER_FAILED",
            Self::Hook(_) => "HOOK_FAILED",
            Self::UnregisteredHandler { .. } => "UNREGISTERED_HANDLER",
            Self::UnknownPhase { .. } => "UNKNOWN_PHASE",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            Self::SkipPredicate { .. } => "SKIP_PREDICATE_FAILED",
        }
    }

    /// The phase this error is attributed to, if any.
    #[must_use]
    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::Contract(e) => e.phase(),
            Self::Handler { phase, .. }
            | Self::UnregisteredHandler { phase }
            | Self::SkipPredicate { phase, .. } => Some(*phase),
            Self::Hook(e) => Some(e.phase),
            Self::InvalidTransition { to, .. } => to.phase(),
            _ => None,
        }
    }

    /// Whether this failure came from a before/after hook rather than the phase itself.
    #[must_use]
    pub fn is_hook_error(&self) -> bool {
        matches!(self, Self::Hook(_))
    }
}

/// Phase contract violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Phase {phase} is missing required input(s): {}", .missing.join(", "))]
    PhaseInputInvalid { phase: PhaseId, missing: Vec<String> },

    #[error("Phase {phase} handler omitted declared output(s): {}", .missing.join(", "))]
    PhaseOutputInvalid { phase: PhaseId, missing: Vec<String> },

    #[error("Post-run validation failed: {}", describe_missing(.missing))]
    ValidationFailed {
        missing: Vec<(PhaseId, Vec<String>)>,
    },
}

fn describe_missing(missing: &[(PhaseId, Vec<String>)]) -> String {
    missing
        .iter()
        .map(|(phase, keys)| format!("{phase} lost {}", keys.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ContractError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PhaseInputInvalid { .. } => "PHASE_INPUT_INVALID",
            Self::PhaseOutputInvalid { .. } => "PHASE_OUTPUT_INVALID",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
        }
    }

    #[must_use]
    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::PhaseInputInvalid { phase, .. } | Self::PhaseOutputInvalid { phase, .. } => {
                Some(*phase)
            }
            Self::ValidationFailed { missing } => missing.first().map(|(p, _)| *p),
        }
    }

    /// Keys reported missing by this violation.
    #[must_use]
    pub fn missing_keys(&self) -> Vec<String> {
        match self {
            Self::PhaseInputInvalid { missing, .. } | Self::PhaseOutputInvalid { missing, .. } => {
                missing.clone()
            }
            Self::ValidationFailed { missing } => {
                missing.iter().flat_map(|(_, k)| k.iter().cloned()).collect()
            }
        }
    }
}

/// Failure raised by a before/after hook.
///
/// Always propagated in live runs; swallowed (collected as data) in dry runs.
#[derive(Error, Debug)]
#[error("{kind} hook for phase {phase} failed: {source}")]
pub struct HookError {
    pub kind: HookKind,
    pub phase: PhaseId,
    #[source]
    pub source: anyhow::Error,
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file {path}: {reason}")]
    InvalidFile { path: String, reason: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Contract,
    Transition,
    PhaseExecution,
    Hook,
    Lifecycle,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Contract => write!(f, "Contract"),
            Self::Transition => write!(f, "Transition"),
            Self::PhaseExecution => write!(f, "Phase Execution"),
            Self::Hook => write!(f, "Hook"),
            Self::Lifecycle => write!(f, "Lifecycle"),
        }
    }
}

impl UserFriendlyError for ScaffolderError {
    fn user_message(&self) -> String {
        match self {
            Self::Contract(ContractError::PhaseInputInvalid { phase, missing }) => format!(
                "The {phase} phase cannot start: missing {}",
                missing.join(", ")
            ),
            Self::Contract(ContractError::PhaseOutputInvalid { phase, missing }) => format!(
                "The {phase} handler did not produce {}",
                missing.join(", ")
            ),
            Self::Handler { phase, source } => {
                format!("The {phase} handler reported an error: {source}")
            }
            Self::Hook(e) => format!(
                "A {} hook on the {} phase reported an error: {}",
                e.kind, e.phase, e.source
            ),
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Contract(ContractError::PhaseInputInvalid { .. }) => Some(
                "Required inputs must be present in the run context before a phase runs. \
                 They come from the initial data or from earlier phases' outputs."
                    .to_string(),
            ),
            Self::Contract(ContractError::PhaseOutputInvalid { .. }) => Some(
                "Every declared output key must appear in the handler's returned object; \
                 the output was discarded and the context is unchanged."
                    .to_string(),
            ),
            Self::Contract(ContractError::ValidationFailed { .. }) => Some(
                "The final check found outputs of completed phases missing from the context."
                    .to_string(),
            ),
            Self::RetriesExhausted { .. } => {
                Some("Each resume() consumes one retry from the configured budget.".to_string())
            }
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Contract(ContractError::PhaseInputInvalid { missing, .. }) => vec![
                format!("Provide {} in the initial data", missing.join(", ")),
                "Or supply the keys via resume(additional_data)".to_string(),
            ],
            Self::Contract(ContractError::PhaseOutputInvalid { missing, .. }) => {
                vec![format!("Return {} from the handler", missing.join(", "))]
            }
            Self::UnregisteredHandler { phase } => vec![format!(
                "Register a handler for the {phase} phase before starting the run"
            )],
            Self::RetriesExhausted { .. } | Self::InvalidState { .. } => {
                vec!["Call reset() and start a new run".to_string()]
            }
            Self::Handler { .. } | Self::Hook(_) => vec![
                "Fix the underlying failure and call resume()".to_string(),
                "Register an error boundary to treat this failure as a no-op".to_string(),
            ],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Contract(_) => ErrorCategory::Contract,
            Self::InvalidTransition { .. } => ErrorCategory::Transition,
            Self::Handler { .. }
            | Self::UnregisteredHandler { .. }
            | Self::SkipPredicate { .. } => ErrorCategory::PhaseExecution,
            Self::Hook(_) => ErrorCategory::Hook,
            Self::UnknownPhase { .. }
            | Self::InvalidState { .. }
            | Self::RetriesExhausted { .. } => ErrorCategory::Lifecycle,
        }
    }
}
