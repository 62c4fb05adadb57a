//! Registry of circuit breakers keyed by (agent, operation).
//!
//! The registry is an explicitly owned value handed to callers; there is no process-wide
//! instance. Breakers are created on first use and never removed or recreated.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::errors::OperationError;
use crate::domain::models::AgentName;
use crate::domain::ports::{AgentOperation, MetricsSink};
use crate::services::circuit_breaker::{
    BreakerError, BreakerHandle, BreakerHealth, BreakerId, BreakerMetrics, CircuitBreakerConfig,
};

/// Breaker names grouped by health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    pub healthy: Vec<String>,
    pub degraded: Vec<String>,
    pub failed: Vec<String>,
}

impl HealthSummary {
    pub fn is_all_healthy(&self) -> bool {
        self.degraded.is_empty() && self.failed.is_empty()
    }
}

/// Service owning every breaker in the process.
pub struct BreakerRegistry {
    defaults: CircuitBreakerConfig,
    breakers: Arc<RwLock<HashMap<BreakerId, BreakerHandle>>>,
    sink: Arc<dyn MetricsSink>,
}

impl BreakerRegistry {
    pub fn new(defaults: CircuitBreakerConfig, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            defaults,
            breakers: Arc::new(RwLock::new(HashMap::new())),
            sink,
        }
    }

    pub fn defaults(&self) -> &CircuitBreakerConfig {
        &self.defaults
    }

    /// Look up a breaker, creating it with `config` (or the defaults) on first access.
    ///
    /// A config passed for an existing breaker is ignored.
    pub async fn get_or_create(
        &self,
        agent: AgentName,
        operation: &str,
        config: Option<CircuitBreakerConfig>,
    ) -> BreakerHandle {
        let id = BreakerId::new(agent, operation);
        if let Some(handle) = self.breakers.read().await.get(&id) {
            return handle.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(breaker = %id, "Creating circuit breaker");
                BreakerHandle::new(
                    id.clone(),
                    config.unwrap_or_else(|| self.defaults.clone()),
                    Arc::clone(&self.sink),
                )
            })
            .clone()
    }

    pub async fn get(&self, agent: AgentName, operation: &str) -> Option<BreakerHandle> {
        self.breakers
            .read()
            .await
            .get(&BreakerId::new(agent, operation))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.breakers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.breakers.read().await.is_empty()
    }

    /// Handles sorted by id, cloned out so no registry lock is held while awaiting them.
    async fn handles(&self) -> Vec<BreakerHandle> {
        let mut handles: Vec<_> = self.breakers.read().await.values().cloned().collect();
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        handles
    }

    /// Classify every registered breaker.
    pub async fn health_summary(&self) -> HealthSummary {
        let mut summary = HealthSummary::default();
        for handle in self.handles().await {
            let name = handle.id().to_string();
            match handle.health().await {
                BreakerHealth::Healthy => summary.healthy.push(name),
                BreakerHealth::Degraded => summary.degraded.push(name),
                BreakerHealth::Failed => summary.failed.push(name),
            }
        }
        summary
    }

    pub async fn all_metrics(&self) -> Vec<BreakerMetrics> {
        let mut metrics = Vec::new();
        for handle in self.handles().await {
            metrics.push(handle.metrics().await);
        }
        metrics
    }

    /// Incident response: open every breaker, bypassing normal transitions.
    pub async fn force_open_all(&self) {
        let handles = self.handles().await;
        tracing::warn!(count = handles.len(), "Forcing all circuit breakers open");
        for handle in handles {
            handle.force_open().await;
        }
    }

    /// Incident response: close every breaker and clear failure history.
    pub async fn force_close_all(&self) {
        let handles = self.handles().await;
        tracing::warn!(count = handles.len(), "Forcing all circuit breakers closed");
        for handle in handles {
            handle.force_close().await;
        }
    }

    /// Run `operation` through the keyed breaker with an "unavailable" fallback.
    pub async fn protect<T, Op, Fut>(
        &self,
        agent: AgentName,
        operation_name: &str,
        timeout: Option<Duration>,
        operation: Op,
    ) -> Result<T, BreakerError<OperationError>>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let handle = self.get_or_create(agent, operation_name, None).await;
        handle
            .execute(
                operation,
                || async move { Err(OperationError::unavailable(agent)) },
                timeout,
            )
            .await
    }

    /// [`protect`](Self::protect) for an [`AgentOperation`].
    pub async fn invoke(
        &self,
        agent: AgentName,
        operation_name: &str,
        operation: &dyn AgentOperation,
        input: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, BreakerError<OperationError>> {
        self.protect(agent, operation_name, timeout, || operation.invoke(input))
            .await
    }
}
