use serde::{Deserialize, Serialize};

use scaffolder_utils::types::{PhaseId, RunState};

/// Immutable contract of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub id: PhaseId,
    /// The "-ING" state occupied while the phase runs.
    pub active_state: RunState,
    /// Keys that must be present in context before the handler is called.
    pub required_inputs: Vec<String>,
    /// Keys the handler may read when present.
    pub optional_inputs: Vec<String>,
    /// Keys every handler result must contain.
    pub outputs: Vec<String>,
    /// Position in the canonical order.
    pub order: usize,
}

impl PhaseDefinition {
    /// Build a definition for `id` with the given key contract.
    ///
    /// `active_state` and `order` are derived from the phase id.
    #[must_use]
    pub fn new(id: PhaseId, required: &[&str], optional: &[&str], outputs: &[&str]) -> Self {
        let owned = |keys: &[&str]| keys.iter().map(|k| (*k).to_string()).collect();
        Self {
            id,
            active_state: id.active_state(),
            required_inputs: owned(required),
            optional_inputs: owned(optional),
            outputs: owned(outputs),
            order: id.order(),
        }
    }
}

/// The standard scaffold contracts.
#[must_use]
pub fn standard_definitions() -> Vec<PhaseDefinition> {
    vec![
        PhaseDefinition::new(
            PhaseId::Discover,
            &["userInput"],
            &["projectPath", "existingFiles"],
            &["detectedDomain", "detectedPatterns", "confidence"],
        ),
        PhaseDefinition::new(
            PhaseId::Elicit,
            &["detectedDomain"],
            &["detectedPatterns", "answers"],
            &["requirements", "constraints"],
        ),
        PhaseDefinition::new(
            PhaseId::Blueprint,
            &["requirements"],
            &["constraints", "preferredArchetype"],
            &["blueprint", "archetype"],
        ),
        PhaseDefinition::new(
            PhaseId::Generate,
            &["blueprint"],
            &["archetype", "outputDir"],
            &["fileManifest", "generatedFiles"],
        ),
        PhaseDefinition::new(
            PhaseId::Integrate,
            &["fileManifest", "generatedFiles"],
            &["outputDir"],
            &["integrationReport"],
        ),
    ]
}
