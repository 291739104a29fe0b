//! Integration tests for the pipeline executor in live mode
//!
//! Hooks, skip predicates and error boundaries layered over the orchestrator,
//! plus normalization of run results into `RunOutcome`.

mod test_support;

use std::sync::{Arc, Mutex};

use scaffolder::{
    ContextData, HookContext, HookKind, LifecycleEvent, PhaseId, PhaseSelector, PipelineExecutor,
    RecordingObserver, RunState, TimingStatus, boundary_fn, default_registry, fallible_skip,
    hook_fn, sync_handler, sync_hook,
};
use serde_json::json;
use test_support::{CountingHandler, FailingHandler, FlakyHandler, full_output, seed};

fn wired_executor() -> PipelineExecutor {
    let mut executor = PipelineExecutor::default();
    for phase in PhaseId::ALL {
        executor.register_handler(phase, CountingHandler::new(phase));
    }
    executor
}

type Log = Arc<Mutex<Vec<String>>>;

fn logging_hook(log: &Log, label: &'static str) -> impl scaffolder::Hook + 'static {
    let log = Arc::clone(log);
    sync_hook(move |ctx: &HookContext| {
        log.lock().unwrap().push(format!("{label}:{}:{}", ctx.kind, ctx.phase));
        Ok(())
    })
}

/// A clean run reports success with every phase completed
#[tokio::test]
async fn test_run_reports_success() {
    let mut executor = wired_executor();

    let outcome = executor.run(seed()).await;

    assert!(outcome.success);
    assert!(!outcome.dry_run);
    assert_eq!(outcome.state, RunState::Complete);
    assert_eq!(outcome.completed_phases, PhaseId::ALL.to_vec());
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.run_id, executor.orchestrator().run_id());
    assert_eq!(
        outcome.total_duration_ms,
        outcome.timings.iter().map(|t| t.duration_ms).sum::<u64>()
    );
}

/// Failures are captured in the outcome, not returned
#[tokio::test]
async fn test_run_captures_failures() {
    let mut executor = wired_executor();
    executor.register_handler(PhaseId::Elicit, FailingHandler("no answers"));

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.state, RunState::Error);
    assert_eq!(outcome.error_codes(), vec!["HANDLER_FAILED"]);
    assert_eq!(outcome.errors[0].phase, Some(PhaseId::Elicit));
    assert_eq!(outcome.completed_phases, vec![PhaseId::Discover]);
}

/// Wildcard hooks run before phase-specific ones, on both sides of the handler
#[tokio::test]
async fn test_hook_ordering() {
    let log: Log = Arc::default();
    let mut executor = wired_executor();
    executor
        .before(PhaseId::Discover, logging_hook(&log, "specific"))
        .before(PhaseSelector::Any, logging_hook(&log, "wildcard"))
        .after(PhaseId::Discover, logging_hook(&log, "specific"))
        .after(PhaseSelector::Any, logging_hook(&log, "wildcard"));

    let outcome = executor.run(seed()).await;
    assert!(outcome.success);

    let entries = log.lock().unwrap().clone();
    let discover: Vec<&str> = entries
        .iter()
        .filter(|e| e.ends_with(":discover"))
        .map(String::as_str)
        .collect();
    assert_eq!(
        discover,
        vec![
            "wildcard:before:discover",
            "specific:before:discover",
            "wildcard:after:discover",
            "specific:after:discover",
        ]
    );
    // Wildcards fire for every phase.
    assert_eq!(entries.iter().filter(|e| e.starts_with("wildcard:before")).count(), 5);
}

/// After hooks see the phase's output merged into their data
#[tokio::test]
async fn test_after_hook_sees_output() {
    let seen: Arc<Mutex<Option<ContextData>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let mut executor = wired_executor();
    executor.after(
        PhaseId::Blueprint,
        sync_hook(move |ctx: &HookContext| {
            *sink.lock().unwrap() = Some(ctx.data.clone());
            Ok(())
        }),
    );

    executor.run(seed()).await;

    let data = seen.lock().unwrap().clone().unwrap();
    for key in full_output(PhaseId::Blueprint).keys() {
        assert!(data.contains_key(key));
    }
    assert!(!data.contains_key("fileManifest"));
}

/// A failing hook aborts the phase with HOOK_FAILED, not HANDLER_FAILED
#[tokio::test]
async fn test_hook_failure_is_distinct_from_handler_failure() {
    let mut executor = wired_executor();
    let recorder = RecordingObserver::new();
    executor.add_observer(recorder.clone());
    executor.before(
        PhaseId::Generate,
        hook_fn(|ctx: HookContext| async move {
            Err::<(), _>(anyhow::anyhow!("refusing to generate for {}", ctx.run_id))
        }),
    );

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["HOOK_FAILED"]);
    assert_eq!(outcome.errors[0].phase, Some(PhaseId::Generate));
    assert!(!outcome.data.contains_key("fileManifest"));

    let hook_events: Vec<LifecycleEvent> = recorder
        .events()
        .into_iter()
        .filter(|e| e.name() == "hook_failed")
        .collect();
    assert_eq!(hook_events.len(), 1);
    match &hook_events[0] {
        LifecycleEvent::HookFailed { kind, phase, dry_run, .. } => {
            assert_eq!(*kind, HookKind::Before);
            assert_eq!(*phase, PhaseId::Generate);
            assert!(!dry_run);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

/// Any matching predicate skips the phase
#[tokio::test]
async fn test_skip_when_any_predicate_matches() {
    let mut executor = wired_executor();
    executor
        .skip_when(PhaseId::Elicit, |_: &ContextData| false)
        .skip_when(PhaseSelector::Any, |data: &ContextData| {
            data.contains_key("skipElicit") && !data.contains_key("detectedDomain")
        })
        .skip_when(PhaseId::Elicit, |data: &ContextData| data.contains_key("requirements"));

    let mut data = seed();
    data.insert("requirements".to_string(), json!(["export csv"]));
    let outcome = executor.run(data).await;

    assert!(outcome.success);
    assert_eq!(outcome.skipped_phases, vec![PhaseId::Elicit]);
    assert!(!outcome.data.contains_key("constraints"));
    let elicit = outcome
        .timings
        .iter()
        .find(|t| t.phase == PhaseId::Elicit)
        .unwrap();
    assert_eq!(elicit.status, TimingStatus::Skipped);
    assert_eq!(elicit.duration_ms, 0);
}

/// In a live run a failing predicate fails the phase
#[tokio::test]
async fn test_failing_predicate_fails_live_run() {
    let mut executor = wired_executor();
    executor.skip_when(
        PhaseId::Blueprint,
        fallible_skip(|_| Err(anyhow::anyhow!("archetype catalog unreadable"))),
    );

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["SKIP_PREDICATE_FAILED"]);
}

/// A boundary returning true records the phase completed with an empty merge
#[tokio::test]
async fn test_error_boundary_recovers_phase() {
    let mut executor = wired_executor();
    let recorder = RecordingObserver::new();
    executor.add_observer(recorder.clone());
    executor
        .register_handler(PhaseId::Integrate, FailingHandler("git not found"))
        .on_phase_error(
            PhaseId::Integrate,
            boundary_fn(|e: &anyhow::Error, _: &HookContext| e.to_string().contains("git")),
        );

    let outcome = executor.run(seed()).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.completed_phases, PhaseId::ALL.to_vec());
    assert!(!outcome.data.contains_key("integrationReport"));
    assert!(recorder.names().contains(&"phase_recovered"));
}

/// The run proceeds to the next phase after a recovered one
#[tokio::test]
async fn test_recovered_phase_lets_run_continue() {
    let mut executor = wired_executor();
    let generate = CountingHandler::new(PhaseId::Generate);
    executor
        .register_handler(PhaseId::Blueprint, FailingHandler("catalog offline"))
        .register_handler(PhaseId::Generate, generate.clone())
        .on_phase_error(PhaseSelector::Any, boundary_fn(|_: &anyhow::Error, _: &HookContext| true));

    // Blueprint produced nothing, so Generate needs its input from the caller.
    let mut data = seed();
    data.insert("blueprint".to_string(), json!({"layers": ["api", "db"]}));
    let outcome = executor.run(data).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(generate.calls(), 1);
    assert!(!outcome.data.contains_key("archetype"));
}

/// A boundary returning false lets the original error through
#[tokio::test]
async fn test_declining_boundary_propagates_error() {
    let mut executor = wired_executor();
    executor
        .register_handler(PhaseId::Elicit, FailingHandler("user cancelled"))
        .on_phase_error(PhaseId::Elicit, boundary_fn(|_: &anyhow::Error, _: &HookContext| false));

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["HANDLER_FAILED"]);
}

/// A boundary never excuses a handler that returns incomplete output
#[tokio::test]
async fn test_boundary_does_not_excuse_missing_outputs() {
    let mut executor = wired_executor();
    executor
        .register_handler(
            PhaseId::Integrate,
            sync_handler(|_| Ok(ContextData::from([("notes".to_string(), json!("partial"))]))),
        )
        .on_phase_error(PhaseSelector::Any, boundary_fn(|_: &anyhow::Error, _: &HookContext| true));

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["PHASE_OUTPUT_INVALID"]);
    assert_eq!(outcome.state, RunState::Error);
    assert!(!outcome.completed_phases.contains(&PhaseId::Integrate));
}

/// Boundaries are told they run for a failure and see the handler's input
#[tokio::test]
async fn test_boundary_receives_failure_context() {
    let seen: Arc<Mutex<Vec<(HookKind, bool)>>> = Arc::default();
    let mut executor = wired_executor();
    let record = Arc::clone(&seen);
    executor
        .register_handler(PhaseId::Generate, FailingHandler("template missing"))
        .on_phase_error(
            PhaseId::Generate,
            boundary_fn(move |_: &anyhow::Error, ctx: &HookContext| {
                let has_input = ctx.data.contains_key("blueprint");
                record.lock().unwrap().push((ctx.kind, has_input));
                true
            }),
        );

    let outcome = executor.run(seed()).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(*seen.lock().unwrap(), vec![(HookKind::OnError, true)]);
}

/// A registry error raised inside a handler is that handler's failure
#[tokio::test]
async fn test_handler_registry_error_reports_handler_failure() {
    let mut executor = wired_executor();
    executor.register_handler(
        PhaseId::Blueprint,
        sync_handler(|_| {
            let registry = default_registry();
            let definition = registry.get_definition("deploy")?;
            Ok(ContextData::from([(
                "archetype".to_string(),
                json!(definition.id.as_str()),
            )]))
        }),
    );

    let outcome = executor.run(seed()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["HANDLER_FAILED"]);
    assert_eq!(outcome.errors[0].phase, Some(PhaseId::Blueprint));
    assert!(outcome.errors[0].message.contains("deploy"));
}

/// Hooks registered after the first run apply to the next one
#[tokio::test]
async fn test_registrations_apply_to_later_runs() {
    let log: Log = Arc::default();
    let mut executor = wired_executor();

    assert!(executor.run(seed()).await.success);
    assert!(log.lock().unwrap().is_empty());

    executor.before(PhaseSelector::Any, logging_hook(&log, "late"));
    assert!(executor.run(seed()).await.success);
    assert_eq!(log.lock().unwrap().len(), 5);
}

/// Executor resume picks up where a failed run stopped
#[tokio::test]
async fn test_executor_resume() {
    let mut executor = wired_executor();
    executor.register_handler(PhaseId::Generate, FlakyHandler::new(PhaseId::Generate, 1));

    let first = executor.run(seed()).await;
    assert!(!first.success);

    let second = executor.resume(ContextData::new()).await;
    assert!(second.success, "errors: {:?}", second.errors);
    assert_eq!(second.run_id, first.run_id);
    // The failed attempt stays in the run's error log.
    assert_eq!(second.error_codes(), vec!["HANDLER_FAILED"]);
}

/// Executor resume is refused, not thrown, when the run cannot resume
#[tokio::test]
async fn test_executor_resume_refused() {
    let mut executor = wired_executor();
    assert!(executor.run(seed()).await.success);

    let outcome = executor.resume(ContextData::new()).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_codes(), vec!["INVALID_STATE"]);
    assert_eq!(outcome.state, RunState::Complete);
}

/// compile() exposes the per-phase pipeline without running anything
#[test]
fn test_compile_describes_registrations() {
    let mut executor = wired_executor();
    executor
        .before(PhaseSelector::Any, sync_hook(|_| Ok(())))
        .on_phase_error(PhaseId::Generate, boundary_fn(|_: &anyhow::Error, _: &HookContext| true));

    let description = executor.compile().describe();
    assert_eq!(description.len(), 5);
    assert!(description.iter().all(|s| s.has_handler && s.before_hooks == 1));
    assert_eq!(description[PhaseId::Generate.order()].error_boundaries, 1);
    assert_eq!(description[PhaseId::Discover.order()].error_boundaries, 0);
    assert_eq!(executor.orchestrator().state(), RunState::Idle);
}
