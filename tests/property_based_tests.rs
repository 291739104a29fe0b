//! Property-based tests for scaffolder
//!
//! Invariants checked across generated inputs:
//! - Transition checks agree with the documented matrix and explain refusals
//! - Input validation is presence-based, independent of value truthiness
//! - Completed and skipped phase lists stay ordered and disjoint
//! - A failing phase leaves exactly its predecessors completed
//!
//! ## Configuration
//!
//! - `PROPTEST_CASES`: Number of test cases per property (default: 64)
//! - `PROPTEST_MAX_SHRINK_ITERS`: Max shrinking iterations on failure (default: 1000)
//!
//! ```bash
//! PROPTEST_CASES=256 cargo test --test property_based_tests
//! ```

mod test_support;

use proptest::prelude::*;
use serde_json::{Value, json};
use std::env;

use scaffolder::{
    ContextData, Orchestrator, PhaseId, PhaseRegistry, RunState, TimingStatus, default_registry,
};
use test_support::{CountingHandler, FailingHandler, seed};

/// Default number of test cases per property.
const DEFAULT_PROPTEST_CASES: u32 = 64;

/// Default max shrink iterations.
const DEFAULT_MAX_SHRINK_ITERS: u32 = 1000;

/// Creates a ProptestConfig that respects environment variables.
///
/// `max_cases` caps the case count for slow properties even when
/// `PROPTEST_CASES` asks for more.
fn proptest_config(max_cases: Option<u32>) -> ProptestConfig {
    let env_cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);

    let env_shrink_iters = env::var("PROPTEST_MAX_SHRINK_ITERS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_SHRINK_ITERS);

    let cases = match max_cases {
        Some(max) => env_cases.min(max),
        None => env_cases,
    };

    ProptestConfig {
        cases,
        max_shrink_iters: env_shrink_iters,
        max_shrink_time: 30000,
        ..ProptestConfig::default()
    }
}

fn arb_state() -> impl Strategy<Value = RunState> {
    prop::sample::select(RunState::ALL.to_vec())
}

fn arb_phase() -> impl Strategy<Value = PhaseId> {
    prop::sample::select(PhaseId::ALL.to_vec())
}

/// JSON values including the falsy ones.
fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|i| json!(i)),
        "[a-z ]{0,12}".prop_map(Value::String),
        prop::collection::vec("[a-z]{1,6}", 0..3).prop_map(|v| json!(v)),
    ]
}

/// Every key any phase declares, plus some noise.
fn key_universe() -> Vec<String> {
    let registry = default_registry();
    let mut keys: Vec<String> = registry
        .definitions()
        .iter()
        .flat_map(|d| {
            d.required_inputs
                .iter()
                .chain(&d.optional_inputs)
                .chain(&d.outputs)
                .cloned()
        })
        .collect();
    keys.extend(["notes".to_string(), "userinput".to_string()]);
    keys.sort();
    keys.dedup();
    keys
}

fn arb_context() -> impl Strategy<Value = ContextData> {
    let keys = key_universe();
    prop::collection::vec((prop::sample::select(keys), arb_value()), 0..12)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// The matrix written out by rule rather than by table.
fn expected_legal(from: RunState, to: RunState) -> bool {
    use RunState::*;
    let active = to.phase().is_some();
    match from {
        Idle => matches!(to, Discovering | Error),
        Complete => to == Idle,
        Error => to == Idle || active,
        Validating => to == Complete || to == Error || active,
        Integrating => matches!(to, Validating | Complete | Error),
        _ => {
            let next = from.phase().and_then(|p| p.next()).map(|p| p.active_state());
            Some(to) == next || matches!(to, Validating | Error)
        }
    }
}

proptest! {
    #![proptest_config(proptest_config(None))]

    #[test]
    fn prop_transition_check_matches_matrix(from in arb_state(), to in arb_state()) {
        let check = PhaseRegistry::standard().validate_transition(from, to);

        prop_assert_eq!(check.valid, expected_legal(from, to));
        prop_assert_eq!(check.valid, check.reason.is_none());
        if let Some(reason) = check.reason {
            prop_assert!(reason.contains(from.as_str()));
            prop_assert!(reason.contains(to.as_str()));
        }
    }

    #[test]
    fn prop_input_validation_is_presence_based(phase in arb_phase(), data in arb_context()) {
        let registry = default_registry();
        let result = registry.validate_phase_input(phase, &data);

        let expected: Vec<String> = registry
            .definition(phase)
            .required_inputs
            .iter()
            .filter(|k| !data.contains_key(*k))
            .cloned()
            .collect();
        prop_assert_eq!(&result.missing, &expected);
        prop_assert_eq!(result.valid, expected.is_empty());
    }

    #[test]
    fn prop_output_validation_reports_all_produced_keys(
        phase in arb_phase(),
        data in arb_context()
    ) {
        let result = default_registry().validate_phase_output(phase, &data);

        let produced: Vec<String> = data.keys().cloned().collect();
        prop_assert_eq!(result.produced, produced);
        for key in &result.missing {
            prop_assert!(!data.contains_key(key));
        }
    }
}

proptest! {
    #![proptest_config(proptest_config(Some(32)))]

    /// Whatever subset of phases is skipped, every phase lands in exactly one
    /// of the two lists, each in canonical order.
    #[test]
    fn prop_skipped_and_completed_partition_phases(
        skip_mask in prop::collection::vec(any::<bool>(), 5)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let context = runtime.block_on(async {
            let mut orchestrator = Orchestrator::default();
            for phase in PhaseId::ALL {
                orchestrator.register_phase_handler(phase, CountingHandler::new(phase));
                if skip_mask[phase.order()] {
                    orchestrator.register_skip_condition(phase, |_: &ContextData| true);
                }
            }
            // Satisfy every required input up front so any phase may run.
            let mut data = seed();
            for def in default_registry().definitions() {
                for key in &def.required_inputs {
                    data.entry(key.clone()).or_insert(json!("provided"));
                }
            }
            orchestrator.start(data).await
        }).unwrap();

        prop_assert_eq!(context.state, RunState::Complete);
        for phase in PhaseId::ALL {
            let skipped = context.skipped_phases.contains(&phase);
            let completed = context.completed_phases.contains(&phase);
            prop_assert_eq!(skipped, skip_mask[phase.order()]);
            prop_assert!(skipped != completed);
        }
        prop_assert!(context.completed_phases.windows(2).all(|w| w[0].order() < w[1].order()));
        prop_assert!(context.skipped_phases.windows(2).all(|w| w[0].order() < w[1].order()));
        prop_assert_eq!(context.timings.len(), 5);
    }

    /// A handler failing at one phase leaves exactly its predecessors completed.
    #[test]
    fn prop_failure_preserves_prefix(failing in arb_phase()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (err, context) = runtime.block_on(async {
            let mut orchestrator = Orchestrator::default();
            for phase in PhaseId::ALL {
                if phase == failing {
                    orchestrator.register_phase_handler(phase, FailingHandler("injected"));
                } else {
                    orchestrator.register_phase_handler(phase, CountingHandler::new(phase));
                }
            }
            let err = orchestrator.start(seed()).await.unwrap_err();
            (err, orchestrator.context())
        });

        prop_assert_eq!(err.code(), "HANDLER_FAILED");
        prop_assert_eq!(err.phase(), Some(failing));
        prop_assert_eq!(context.state, RunState::Error);
        prop_assert_eq!(context.current_phase, Some(failing));
        let prefix: Vec<PhaseId> = PhaseId::ALL[..failing.order()].to_vec();
        prop_assert_eq!(&context.completed_phases, &prefix);
        let last = context.timings.last().unwrap();
        prop_assert_eq!(last.phase, failing);
        prop_assert_eq!(last.status, TimingStatus::Failed);
    }
}
