use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Accumulated key-value data shared across the phases of one run.
///
/// Values are plain JSON data, so `Clone` is a full structural copy. Every
/// snapshot handed to a handler or returned from an accessor is independent
/// of the live run state.
pub type ContextData = BTreeMap<String, serde_json::Value>;

/// Phase identifiers for the scaffold generation workflow.
///
/// # Phase Order
///
/// ```text
/// Discover → Elicit → Blueprint → Generate → Integrate
/// ```
///
/// Each phase is bound 1:1 to an "-ING" [`RunState`] which the run occupies
/// while the phase executes.
///
/// # Example
///
/// ```rust
/// use scaffolder_utils::types::{PhaseId, RunState};
///
/// let phase = PhaseId::Discover;
/// assert_eq!(phase.as_str(), "discover");
/// assert_eq!(phase.active_state(), RunState::Discovering);
/// assert_eq!(phase.next(), Some(PhaseId::Elicit));
/// ```
///
/// # Serialization
///
/// `PhaseId` serializes to its lowercase string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseId {
    /// Discover phase: inspects the user's input and detects the project domain.
    Discover,
    /// Elicit phase: gathers requirements and constraints.
    Elicit,
    /// Blueprint phase: selects an archetype and produces the project blueprint.
    Blueprint,
    /// Generate phase: produces the file manifest and generated files.
    Generate,
    /// Integrate phase: wires generated output into the target project.
    Integrate,
}

impl PhaseId {
    /// All phases in canonical execution order.
    pub const ALL: [Self; 5] = [
        Self::Discover,
        Self::Elicit,
        Self::Blueprint,
        Self::Generate,
        Self::Integrate,
    ];

    /// Returns the canonical lowercase name used in logs, events and outcomes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discover => "discover",
            Self::Elicit => "elicit",
            Self::Blueprint => "blueprint",
            Self::Generate => "generate",
            Self::Integrate => "integrate",
        }
    }

    /// Zero-based position in the canonical order.
    #[must_use]
    pub const fn order(&self) -> usize {
        match self {
            Self::Discover => 0,
            Self::Elicit => 1,
            Self::Blueprint => 2,
            Self::Generate => 3,
            Self::Integrate => 4,
        }
    }

    /// The run state the orchestrator occupies while this phase executes.
    #[must_use]
    pub const fn active_state(&self) -> RunState {
        match self {
            Self::Discover => RunState::Discovering,
            Self::Elicit => RunState::Eliciting,
            Self::Blueprint => RunState::Blueprinting,
            Self::Generate => RunState::Generating,
            Self::Integrate => RunState::Integrating,
        }
    }

    #[must_use]
    pub fn next(&self) -> Option<Self> {
        Self::ALL.get(self.order() + 1).copied()
    }

    #[must_use]
    pub fn previous(&self) -> Option<Self> {
        self.order().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// States of the run finite state machine.
///
/// The legal transitions between these states are owned by the phase
/// registry; the orchestrator never moves between states without asking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Discovering,
    Eliciting,
    Blueprinting,
    Generating,
    Integrating,
    Validating,
    Complete,
    Error,
}

impl RunState {
    pub const ALL: [Self; 9] = [
        Self::Idle,
        Self::Discovering,
        Self::Eliciting,
        Self::Blueprinting,
        Self::Generating,
        Self::Integrating,
        Self::Validating,
        Self::Complete,
        Self::Error,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Discovering => "DISCOVERING",
            Self::Eliciting => "ELICITING",
            Self::Blueprinting => "BLUEPRINTING",
            Self::Generating => "GENERATING",
            Self::Integrating => "INTEGRATING",
            Self::Validating => "VALIDATING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        }
    }

    /// The phase bound to this state, if it is one of the "-ING" states.
    #[must_use]
    pub const fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::Discovering => Some(PhaseId::Discover),
            Self::Eliciting => Some(PhaseId::Elicit),
            Self::Blueprinting => Some(PhaseId::Blueprint),
            Self::Generating => Some(PhaseId::Generate),
            Self::Integrating => Some(PhaseId::Integrate),
            _ => None,
        }
    }

    /// Terminal states end a run until it is reset (or resumed from `Error`).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a phase handler a hook runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Before,
    After,
    /// An error boundary consulted after the handler failed.
    OnError,
}

impl HookKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::OnError => "on_error",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
