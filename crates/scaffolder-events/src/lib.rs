//! Lifecycle notifications for scaffold runs.
//!
//! The orchestrator and pipeline executor publish a [`LifecycleEvent`] at each
//! interesting point of a run (state transitions, phase start/finish, hook
//! failures, dry-run progress). Observers receive a reference to the event and
//! return nothing, so no control-flow decision can ever depend on whether an
//! event was delivered or what an observer did with it.

use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use scaffolder_utils::types::{HookKind, PhaseId, RunState};

/// A named lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    StateChanged {
        run_id: String,
        from: RunState,
        to: RunState,
    },
    RunStarted {
        run_id: String,
    },
    RunResumed {
        run_id: String,
        retry_count: u32,
    },
    RunReset {
        run_id: String,
        preserved_data: bool,
    },
    RunCompleted {
        run_id: String,
        duration_ms: u64,
    },
    RunFailed {
        run_id: String,
        code: String,
        message: String,
    },
    PhaseStarting {
        run_id: String,
        phase: PhaseId,
    },
    PhaseCompleted {
        run_id: String,
        phase: PhaseId,
        duration_ms: u64,
    },
    PhaseFailed {
        run_id: String,
        phase: PhaseId,
        code: String,
        message: String,
    },
    PhaseSkipped {
        run_id: String,
        phase: PhaseId,
    },
    /// An error boundary converted a handler failure into a no-op success.
    PhaseRecovered {
        run_id: String,
        phase: PhaseId,
        error: String,
    },
    HookFailed {
        run_id: String,
        phase: PhaseId,
        kind: HookKind,
        message: String,
        dry_run: bool,
    },
    DryRunStarted {
        run_id: String,
    },
    DryRunPhase {
        run_id: String,
        phase: PhaseId,
        skipped: bool,
        warnings: Vec<String>,
    },
    DryRunCompleted {
        run_id: String,
        success: bool,
        error_count: usize,
    },
}

impl LifecycleEvent {
    /// Stable event name, matching the serialized `event` tag.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::RunStarted { .. } => "run_started",
            Self::RunResumed { .. } => "run_resumed",
            Self::RunReset { .. } => "run_reset",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
            Self::PhaseStarting { .. } => "phase_starting",
            Self::PhaseCompleted { .. } => "phase_completed",
            Self::PhaseFailed { .. } => "phase_failed",
            Self::PhaseSkipped { .. } => "phase_skipped",
            Self::PhaseRecovered { .. } => "phase_recovered",
            Self::HookFailed { .. } => "hook_failed",
            Self::DryRunStarted { .. } => "dry_run_started",
            Self::DryRunPhase { .. } => "dry_run_phase",
            Self::DryRunCompleted { .. } => "dry_run_completed",
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        match self {
            Self::StateChanged { run_id, .. }
            | Self::RunStarted { run_id }
            | Self::RunResumed { run_id, .. }
            | Self::RunReset { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunFailed { run_id, .. }
            | Self::PhaseStarting { run_id, .. }
            | Self::PhaseCompleted { run_id, .. }
            | Self::PhaseFailed { run_id, .. }
            | Self::PhaseSkipped { run_id, .. }
            | Self::PhaseRecovered { run_id, .. }
            | Self::HookFailed { run_id, .. }
            | Self::DryRunStarted { run_id }
            | Self::DryRunPhase { run_id, .. }
            | Self::DryRunCompleted { run_id, .. } => run_id,
        }
    }

    /// The phase this event concerns, if any.
    #[must_use]
    pub fn phase(&self) -> Option<PhaseId> {
        match self {
            Self::PhaseStarting { phase, .. }
            | Self::PhaseCompleted { phase, .. }
            | Self::PhaseFailed { phase, .. }
            | Self::PhaseSkipped { phase, .. }
            | Self::PhaseRecovered { phase, .. }
            | Self::HookFailed { phase, .. }
            | Self::DryRunPhase { phase, .. } => Some(*phase),
            Self::StateChanged { to, .. } => to.phase(),
            _ => None,
        }
    }
}

/// Receiver of lifecycle notifications.
///
/// Implementations must not block for long; they run inline on the run's task.
pub trait LifecycleObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> LifecycleObserver for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event);
    }
}

/// Ordered set of observers sharing one fan-out call.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl ObserverSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    /// Deliver `event` to every observer in registration order.
    pub fn emit(&self, event: &LifecycleEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Observer that keeps every event in memory. Mostly useful in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of every event received so far.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Names of every event received so far, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(LifecycleEvent::name)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Observer that forwards every event to `tracing` at debug level as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl LifecycleObserver for LoggingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        tracing::debug!(
            event = event.name(),
            run_id = %event.run_id(),
            payload = %payload,
            "lifecycle event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LifecycleEvent::PhaseSkipped {
            run_id: "r1".to_string(),
            phase: PhaseId::Elicit,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "phase_skipped");
        assert_eq!(json["phase"], "elicit");
        assert_eq!(json["run_id"], "r1");
        assert_eq!(event.name(), "phase_skipped");
    }

    #[test]
    fn test_state_changed_reports_target_phase() {
        let event = LifecycleEvent::StateChanged {
            run_id: "r".to_string(),
            from: RunState::Idle,
            to: RunState::Discovering,
        };
        assert_eq!(event.phase(), Some(PhaseId::Discover));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["to"], "DISCOVERING");
    }

    #[test]
    fn test_observer_set_fans_out_in_order() {
        let recorder = RecordingObserver::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&counter);

        let mut set = ObserverSet::new();
        set.add(recorder.clone());
        set.add(Arc::new(move |_: &LifecycleEvent| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        set.add(Arc::new(LoggingObserver));
        assert_eq!(set.len(), 3);

        set.emit(&LifecycleEvent::RunStarted {
            run_id: "a".to_string(),
        });
        set.emit(&LifecycleEvent::RunCompleted {
            run_id: "a".to_string(),
            duration_ms: 3,
        });

        assert_eq!(recorder.names(), vec!["run_started", "run_completed"]);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        recorder.clear();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_empty_set_is_noop() {
        let set = ObserverSet::default();
        assert!(set.is_empty());
        set.emit(&LifecycleEvent::DryRunStarted {
            run_id: "x".to_string(),
        });
    }
}
