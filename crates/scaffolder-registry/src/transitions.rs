use scaffolder_utils::types::RunState;

use RunState::{
    Blueprinting, Complete, Discovering, Eliciting, Error, Generating, Idle, Integrating,
    Validating,
};

/// Legal target states for each run state.
///
/// ```text
/// IDLE         -> DISCOVERING, ERROR
/// DISCOVERING  -> ELICITING, VALIDATING, ERROR
/// ELICITING    -> BLUEPRINTING, VALIDATING, ERROR
/// BLUEPRINTING -> GENERATING, VALIDATING, ERROR
/// GENERATING   -> INTEGRATING, VALIDATING, ERROR
/// INTEGRATING  -> VALIDATING, COMPLETE, ERROR
/// VALIDATING   -> any "-ING" state, COMPLETE, ERROR
/// ERROR        -> IDLE, any "-ING" state
/// COMPLETE     -> IDLE
/// ```
#[must_use]
pub const fn legal_targets(from: RunState) -> &'static [RunState] {
    match from {
        Idle => &[Discovering, Error],
        Discovering => &[Eliciting, Validating, Error],
        Eliciting => &[Blueprinting, Validating, Error],
        Blueprinting => &[Generating, Validating, Error],
        Generating => &[Integrating, Validating, Error],
        Integrating => &[Validating, Complete, Error],
        Validating => &[
            Discovering,
            Eliciting,
            Blueprinting,
            Generating,
            Integrating,
            Complete,
            Error,
        ],
        Error => &[Idle, Discovering, Eliciting, Blueprinting, Generating, Integrating],
        Complete => &[Idle],
    }
}

#[must_use]
pub fn is_legal(from: RunState, to: RunState) -> bool {
    legal_targets(from).contains(&to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_count() {
        let edges: usize = RunState::ALL.iter().map(|s| legal_targets(*s).len()).sum();
        assert_eq!(edges, 2 + 3 + 3 + 3 + 3 + 3 + 7 + 6 + 1);
    }

    #[test]
    fn test_no_self_loops() {
        for state in RunState::ALL {
            assert!(!is_legal(state, state), "{state} must not loop to itself");
        }
    }

    #[test]
    fn test_complete_only_returns_to_idle() {
        for state in RunState::ALL {
            assert_eq!(is_legal(RunState::Complete, state), state == RunState::Idle);
        }
    }

    #[test]
    fn test_error_cannot_jump_to_validating_or_complete() {
        assert!(!is_legal(RunState::Error, RunState::Validating));
        assert!(!is_legal(RunState::Error, RunState::Complete));
        assert!(is_legal(RunState::Error, RunState::Blueprinting));
    }

    mod props {
        use crate::transitions::is_legal;
        use proptest::prelude::*;
        use scaffolder_utils::types::RunState;
        use scaffolder_utils::types::RunState::*;

        fn arb_state() -> impl Strategy<Value = RunState> {
            prop::sample::select(RunState::ALL.to_vec())
        }

        proptest! {
            #[test]
            fn prop_terminal_states_only_reset_or_reenter(from in arb_state(), to in arb_state()) {
                if from.is_terminal() && is_legal(from, to) {
                    prop_assert!(matches!(
                        to,
                        Idle | Discovering | Eliciting | Blueprinting | Generating | Integrating
                    ));
                }
            }

            #[test]
            fn prop_every_non_complete_state_can_fail(from in arb_state()) {
                prop_assert_eq!(is_legal(from, Error), from != Complete && from != Error);
            }
        }
    }
}
