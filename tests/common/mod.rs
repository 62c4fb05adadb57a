//! Common test utilities for integration tests
//!
//! Shared fixtures for breakers, harnesses and scripted agent operations.

#![allow(dead_code)]

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_reliability::domain::models::{AgentName, HarnessConfig};
use agent_reliability::domain::ports::{AgentOperation, MetricsSink};
use agent_reliability::services::{
    AgentTestHarness, BreakerId, BreakerHandle, CircuitBreakerConfig, InMemoryMetricsSink,
};
use agent_reliability::OperationError;

/// Breaker config with a long monitoring window.
pub fn breaker_config(threshold: u32, reset_ms: u64, half_open: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: threshold,
        reset_timeout: Duration::from_millis(reset_ms),
        half_open_requests: half_open,
        monitoring_window: Duration::from_secs(300),
        enabled: true,
    }
}

pub fn breaker(config: CircuitBreakerConfig) -> (BreakerHandle, Arc<InMemoryMetricsSink>) {
    let sink = Arc::new(InMemoryMetricsSink::new());
    let handle = BreakerHandle::new(
        BreakerId::new(AgentName::Evaluator, "score_answer"),
        config,
        Arc::clone(&sink) as Arc<dyn MetricsSink>,
    );
    (handle, sink)
}

/// One scripted reply of a [`ScriptedOperation`].
#[derive(Debug, Clone)]
pub enum Step {
    Reply(Value),
    Fail(&'static str),
    Hang,
}

/// Agent operation that replays a script, repeating the last step once exhausted.
pub struct ScriptedOperation {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicU32,
}

impl ScriptedOperation {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let next = self.steps.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().unwrap_or(Step::Fail("script is empty")),
        }
    }
}

#[async_trait::async_trait]
impl AgentOperation for ScriptedOperation {
    async fn invoke(&self, _input: Value) -> Result<Value, OperationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::Reply(value) => Ok(value),
            Step::Fail(message) => Err(OperationError::msg(message)),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }
        }
    }
}

/// Harness with short backoff so retry tests stay quick.
pub fn harness(
    operation: Arc<dyn AgentOperation>,
) -> (AgentTestHarness, Arc<InMemoryMetricsSink>) {
    let sink = Arc::new(InMemoryMetricsSink::new());
    let harness = AgentTestHarness::new(
        AgentName::Evaluator,
        operation,
        HarnessConfig {
            default_timeout_ms: 5_000,
            initial_backoff_ms: 20,
            max_backoff_ms: 100,
            ..HarnessConfig::default()
        },
        Arc::clone(&sink) as Arc<dyn MetricsSink>,
    );
    (harness, sink)
}
