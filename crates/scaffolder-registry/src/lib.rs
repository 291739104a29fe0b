//! Phase registry: the stateless authority for phase contracts and legal
//! state transitions.
//!
//! A [`PhaseRegistry`] holds one immutable [`PhaseDefinition`] per phase and
//! answers contract questions without touching any run state. Registries are
//! shared between orchestrators (and the dry-run simulator) through `Arc`.
//!
//! All input/output checks are presence-based: a key counts as present when it
//! exists in the map, whatever its value (`null`, `false`, `0` and `""` all
//! count).

mod definitions;
mod transitions;

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;

use scaffolder_utils::error::ScaffolderError;
use scaffolder_utils::types::{ContextData, PhaseId, RunState};

pub use definitions::{PhaseDefinition, standard_definitions};
pub use transitions::{is_legal, legal_targets};

static DEFAULT_REGISTRY: Lazy<Arc<PhaseRegistry>> =
    Lazy::new(|| Arc::new(PhaseRegistry::standard()));

/// Shared registry with the standard scaffold contracts.
///
/// Immutable, so sharing it between concurrent orchestrators is safe.
#[must_use]
pub fn default_registry() -> Arc<PhaseRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Result of [`PhaseRegistry::validate_transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of [`PhaseRegistry::validate_phase_input`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputValidation {
    pub valid: bool,
    /// Required keys absent from the context.
    pub missing: Vec<String>,
    /// Declared optional keys absent from the context (informational).
    pub optional: Vec<String>,
}

/// Result of [`PhaseRegistry::validate_phase_output`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputValidation {
    pub valid: bool,
    /// Declared output keys absent from the handler's result.
    pub missing: Vec<String>,
    /// Keys the handler's result actually contains.
    pub produced: Vec<String>,
}

/// Stateless authority for phase metadata and the transition matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRegistry {
    // Indexed by `PhaseId::order()`.
    definitions: Vec<PhaseDefinition>,
}

impl Default for PhaseRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl PhaseRegistry {
    /// Registry with the standard scaffold contracts.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            definitions: standard_definitions(),
        }
    }

    /// Registry with caller-declared key contracts.
    ///
    /// Phase order and the transition matrix stay fixed; only the key
    /// contracts change.
    ///
    /// # Errors
    /// Returns `ScaffolderError::UnknownPhase` if a phase is missing or
    /// declared twice, or if a definition's state/order disagrees with its id.
    pub fn with_definitions(
        definitions: impl IntoIterator<Item = PhaseDefinition>,
    ) -> Result<Self, ScaffolderError> {
        let mut slots: Vec<Option<PhaseDefinition>> = vec![None; PhaseId::ALL.len()];

        for def in definitions {
            if def.active_state != def.id.active_state() || def.order != def.id.order() {
                return Err(ScaffolderError::UnknownPhase {
                    id: format!("{} (inconsistent state or order)", def.id),
                });
            }
            let slot = &mut slots[def.id.order()];
            if slot.is_some() {
                return Err(ScaffolderError::UnknownPhase {
                    id: format!("{} (declared twice)", def.id),
                });
            }
            *slot = Some(def);
        }

        let definitions = slots
            .into_iter()
            .zip(PhaseId::ALL)
            .map(|(slot, id)| {
                slot.ok_or_else(|| ScaffolderError::UnknownPhase {
                    id: format!("{id} (not declared)"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { definitions })
    }

    /// Definition of a known phase.
    #[must_use]
    pub fn definition(&self, id: PhaseId) -> &PhaseDefinition {
        &self.definitions[id.order()]
    }

    /// Look a definition up by phase name.
    ///
    /// # Errors
    /// Returns `ScaffolderError::UnknownPhase` if the name is not a phase.
    pub fn get_definition(&self, id: &str) -> Result<&PhaseDefinition, ScaffolderError> {
        let phase = id
            .parse::<PhaseId>()
            .map_err(|id| ScaffolderError::UnknownPhase { id })?;
        Ok(self.definition(phase))
    }

    /// All definitions in canonical order.
    #[must_use]
    pub fn definitions(&self) -> &[PhaseDefinition] {
        &self.definitions
    }

    /// Phase ids in canonical order.
    #[must_use]
    pub fn phase_order(&self) -> [PhaseId; 5] {
        PhaseId::ALL
    }

    /// Check a state transition against the matrix. Never fails.
    #[must_use]
    pub fn validate_transition(&self, from: RunState, to: RunState) -> TransitionCheck {
        if is_legal(from, to) {
            return TransitionCheck {
                valid: true,
                reason: None,
            };
        }

        let allowed = legal_targets(from)
            .iter()
            .map(RunState::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        TransitionCheck {
            valid: false,
            reason: Some(format!(
                "{from} cannot transition to {to}; allowed targets: {allowed}"
            )),
        }
    }

    /// Check that every required input of `id` is present in `context`.
    #[must_use]
    pub fn validate_phase_input(&self, id: PhaseId, context: &ContextData) -> InputValidation {
        let def = self.definition(id);
        let missing = absent(&def.required_inputs, context);
        let optional = absent(&def.optional_inputs, context);
        InputValidation {
            valid: missing.is_empty(),
            missing,
            optional,
        }
    }

    /// Check that a handler's result contains every declared output of `id`.
    #[must_use]
    pub fn validate_phase_output(&self, id: PhaseId, output: &ContextData) -> OutputValidation {
        let def = self.definition(id);
        let missing = absent(&def.outputs, output);
        OutputValidation {
            valid: missing.is_empty(),
            missing,
            produced: output.keys().cloned().collect(),
        }
    }

    #[must_use]
    pub fn next_phase(&self, id: PhaseId) -> Option<PhaseId> {
        id.next()
    }

    #[must_use]
    pub fn previous_phase(&self, id: PhaseId) -> Option<PhaseId> {
        id.previous()
    }

    #[must_use]
    pub fn is_first_phase(&self, id: PhaseId) -> bool {
        id.previous().is_none()
    }

    #[must_use]
    pub fn is_last_phase(&self, id: PhaseId) -> bool {
        id.next().is_none()
    }
}

fn absent(keys: &[String], data: &ContextData) -> Vec<String> {
    keys.iter()
        .filter(|k| !data.contains_key(k.as_str()))
        .cloned()
        .collect()
}
