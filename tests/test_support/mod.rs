//! Shared helpers for integration tests.
//!
//! Handlers here are deterministic: each one emits every declared output key
//! of its phase with a value derived from the phase and key names, so two runs
//! over the same input produce identical contexts.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use scaffolder::{ContextData, ContextSnapshot, PhaseHandler, PhaseId, default_registry};
use serde_json::{Value, json};

/// Deterministic value for `phase.key`.
pub fn value_for(phase: PhaseId, key: &str) -> Value {
    json!(format!("{phase}:{key}"))
}

/// Every declared output of `phase`.
pub fn full_output(phase: PhaseId) -> ContextData {
    default_registry()
        .definition(phase)
        .outputs
        .iter()
        .map(|k| (k.clone(), value_for(phase, k)))
        .collect()
}

/// Initial data satisfying Discover's contract.
pub fn seed() -> ContextData {
    let mut data = ContextData::new();
    data.insert("userInput".to_string(), json!("a todo list api with auth"));
    data
}

/// Handler producing [`full_output`] and counting its calls.
#[derive(Clone)]
pub struct CountingHandler {
    pub phase: PhaseId,
    pub calls: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub fn new(phase: PhaseId) -> Self {
        Self {
            phase,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PhaseHandler for CountingHandler {
    async fn handle(&self, _snapshot: ContextSnapshot) -> Result<ContextData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(full_output(self.phase))
    }
}

/// Handler that fails on its first `failures` calls, then succeeds.
pub struct FlakyHandler {
    pub phase: PhaseId,
    pub failures: usize,
    pub calls: Arc<AtomicUsize>,
}

impl FlakyHandler {
    pub fn new(phase: PhaseId, failures: usize) -> Self {
        Self {
            phase,
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl PhaseHandler for FlakyHandler {
    async fn handle(&self, _snapshot: ContextSnapshot) -> Result<ContextData> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            anyhow::bail!("{} handler failed on attempt {}", self.phase, call + 1);
        }
        Ok(full_output(self.phase))
    }
}

/// Handler that always fails.
pub struct FailingHandler(pub &'static str);

#[async_trait::async_trait]
impl PhaseHandler for FailingHandler {
    async fn handle(&self, _snapshot: ContextSnapshot) -> Result<ContextData> {
        anyhow::bail!("{}", self.0)
    }
}

/// One counting handler per phase, in canonical order.
pub fn counting_handlers() -> Vec<CountingHandler> {
    PhaseId::ALL.into_iter().map(CountingHandler::new).collect()
}
