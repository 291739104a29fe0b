pub mod error;
pub mod logging;
pub mod types;

pub use error::{
    ConfigError, ContractError, ErrorCategory, HookError, ScaffolderError, UserFriendlyError,
};
pub use types::{ContextData, HookKind, PhaseId, RunState};
