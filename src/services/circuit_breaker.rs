//! Circuit breaker pattern for agent operations.
//!
//! [`CircuitBreaker`] is a plain state machine: callers ask it to [`admit`](CircuitBreaker::admit)
//! a call, then report the outcome. It never awaits and never reads the clock itself, so the
//! transition table is testable in isolation. [`BreakerHandle`] shares one breaker between
//! concurrent callers and drives [`execute`](BreakerHandle::execute): the protected call, the
//! optional timeout race, the fallback, and telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::errors::FailureKind;
use crate::domain::models::{AgentName, CircuitBreakerSettings};
use crate::domain::ports::{attributes, Attributes, ErrorEvent, MetricsSink};

/// Configuration for a circuit breaker. Immutable per breaker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive or windowed failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting probes.
    pub reset_timeout: Duration,
    /// Successful probes needed to close; also the cap on concurrent probes.
    pub half_open_requests: u32,
    /// Failures older than this are forgotten.
    pub monitoring_window: Duration,
    /// Disabled breakers pass calls straight through.
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&CircuitBreakerSettings::default())
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
            half_open_requests: settings.half_open_requests.max(1),
            monitoring_window: Duration::from_millis(settings.monitoring_window_ms),
            enabled: settings.enabled,
        }
    }
}

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls fail fast to the fallback.
    Open,
    /// A bounded number of probes test recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a breaker: one per (agent, operation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BreakerId {
    pub agent: AgentName,
    pub operation: String,
}

impl BreakerId {
    pub fn new(agent: AgentName, operation: impl Into<String>) -> Self {
        Self {
            agent,
            operation: operation.into(),
        }
    }
}

impl fmt::Display for BreakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.agent, self.operation)
    }
}

/// Why a call was routed to the fallback without running the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Open and the reset timeout has not elapsed.
    CircuitOpen { retry_after: Duration },
    /// Half-open with every probe slot taken.
    ProbesExhausted,
}

/// Decision returned by [`CircuitBreaker::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Closed circuit; run the operation.
    Call,
    /// Half-open trial call; its outcome decides the next state. `epoch` names the
    /// half-open period that admitted it.
    Probe { epoch: u64 },
    /// Do not run the operation.
    Reject(RejectReason),
}

impl Admission {
    pub fn is_probe(&self) -> bool {
        matches!(self, Self::Probe { .. })
    }
}

/// A state transition, reported so the caller can log and count it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Health classification used by the registry summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerHealth {
    Healthy,
    Degraded,
    Failed,
}

/// Point-in-time metrics for one breaker. Read-only to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerMetrics {
    pub breaker: String,
    pub agent: AgentName,
    pub operation: String,
    pub state: CircuitState,
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub fallbacks: u64,
    pub rejected: u64,
    pub consecutive_failures: u32,
    /// Failures inside the monitoring window
    pub recent_failures: usize,
    pub failure_rate: f64,
    pub open_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub time_since_opened_ms: Option<u64>,
    pub state_changed_at: DateTime<Utc>,
}

/// Failure rate above which a closed breaker counts as degraded.
pub const DEGRADED_FAILURE_RATE: f64 = 0.1;

/// Circuit breaker state machine for a single protected operation.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    id: BreakerId,
    config: CircuitBreakerConfig,
    state: CircuitState,
    total_requests: u64,
    successes: u64,
    failures: u64,
    timeouts: u64,
    fallbacks: u64,
    rejected: u64,
    consecutive_failures: u32,
    failure_window: VecDeque<Instant>,
    opened_at: Option<Instant>,
    opened_at_wall: Option<DateTime<Utc>>,
    state_changed_at: DateTime<Utc>,
    probes_in_flight: u32,
    half_open_successes: u32,
    half_open_epoch: u64,
    open_count: u32,
}

impl CircuitBreaker {
    pub fn new(id: BreakerId, config: CircuitBreakerConfig) -> Self {
        Self {
            id,
            config,
            state: CircuitState::Closed,
            total_requests: 0,
            successes: 0,
            failures: 0,
            timeouts: 0,
            fallbacks: 0,
            rejected: 0,
            consecutive_failures: 0,
            failure_window: VecDeque::new(),
            opened_at: None,
            opened_at_wall: None,
            state_changed_at: Utc::now(),
            probes_in_flight: 0,
            half_open_successes: 0,
            half_open_epoch: 0,
            open_count: 0,
        }
    }

    pub fn id(&self) -> &BreakerId {
        &self.id
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Decide whether a call may run at `now`.
    ///
    /// An open circuit whose reset timeout has elapsed moves to half-open here, so the
    /// returned change must be reported by the caller.
    pub fn admit(&mut self, now: Instant) -> (Admission, Option<StateChange>) {
        self.total_requests += 1;
        let mut change = None;

        if self.state == CircuitState::Open {
            let opened_at = self.opened_at.unwrap_or(now);
            let elapsed = now.saturating_duration_since(opened_at);
            if elapsed < self.config.reset_timeout {
                self.rejected += 1;
                return (
                    Admission::Reject(RejectReason::CircuitOpen {
                        retry_after: self.config.reset_timeout - elapsed,
                    }),
                    None,
                );
            }
            change = self.transition(CircuitState::HalfOpen);
        }

        let admission = match self.state {
            CircuitState::Closed => Admission::Call,
            CircuitState::HalfOpen if self.probes_in_flight < self.config.half_open_requests => {
                self.probes_in_flight += 1;
                Admission::Probe {
                    epoch: self.half_open_epoch,
                }
            }
            CircuitState::HalfOpen | CircuitState::Open => {
                self.rejected += 1;
                Admission::Reject(RejectReason::ProbesExhausted)
            }
        };
        (admission, change)
    }

    /// Record a successful call admitted with `admission`.
    pub fn record_success(&mut self, admission: Admission) -> Option<StateChange> {
        self.successes += 1;
        self.consecutive_failures = 0;

        if !admission.is_probe() || self.is_stale_probe(admission) {
            return None;
        }
        self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
        if self.state != CircuitState::HalfOpen {
            return None;
        }
        self.half_open_successes += 1;
        if self.half_open_successes >= self.config.half_open_requests {
            self.transition(CircuitState::Closed)
        } else {
            None
        }
    }

    /// Record a failed call admitted with `admission`.
    pub fn record_failure(
        &mut self,
        now: Instant,
        admission: Admission,
        kind: FailureKind,
    ) -> Option<StateChange> {
        self.failures += 1;
        if kind == FailureKind::TimeoutFailure {
            self.timeouts += 1;
        }
        let stale = self.is_stale_probe(admission);
        if admission.is_probe() && !stale {
            self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
        }
        self.consecutive_failures += 1;
        self.failure_window.push_back(now);
        self.prune_window(now);

        match self.state {
            CircuitState::HalfOpen if !stale => self.open(now),
            CircuitState::Closed
                if self.consecutive_failures >= self.config.failure_threshold
                    || self.failure_window.len() >= self.config.failure_threshold as usize =>
            {
                self.open(now)
            }
            CircuitState::Closed | CircuitState::HalfOpen | CircuitState::Open => None,
        }
    }

    /// A probe admitted in an earlier half-open period no longer counts toward this one.
    fn is_stale_probe(&self, admission: Admission) -> bool {
        matches!(admission, Admission::Probe { epoch } if epoch != self.half_open_epoch)
    }

    /// Count one fallback invocation.
    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    /// Open the circuit regardless of history.
    pub fn force_open(&mut self, now: Instant) -> Option<StateChange> {
        self.open(now)
    }

    /// Close the circuit and forget failure history.
    pub fn force_close(&mut self) -> Option<StateChange> {
        self.transition(CircuitState::Closed)
    }

    pub fn health(&self) -> BreakerHealth {
        match self.state {
            CircuitState::Open => BreakerHealth::Failed,
            CircuitState::HalfOpen => BreakerHealth::Degraded,
            CircuitState::Closed if self.failure_rate() > DEGRADED_FAILURE_RATE => {
                BreakerHealth::Degraded
            }
            CircuitState::Closed => BreakerHealth::Healthy,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let rate = self.failures as f64 / self.total_requests.max(1) as f64;
        rate
    }

    pub fn snapshot(&self, now: Instant) -> BreakerMetrics {
        let window = self.config.monitoring_window;
        let recent_failures = self
            .failure_window
            .iter()
            .filter(|at| now.saturating_duration_since(**at) <= window)
            .count();
        let time_since_opened_ms = self
            .opened_at
            .map(|at| u64::try_from(now.saturating_duration_since(at).as_millis()).unwrap_or(u64::MAX));

        BreakerMetrics {
            breaker: self.id.to_string(),
            agent: self.id.agent,
            operation: self.id.operation.clone(),
            state: self.state,
            total_requests: self.total_requests,
            successes: self.successes,
            failures: self.failures,
            timeouts: self.timeouts,
            fallbacks: self.fallbacks,
            rejected: self.rejected,
            consecutive_failures: self.consecutive_failures,
            recent_failures,
            failure_rate: self.failure_rate(),
            open_count: self.open_count,
            opened_at: self.opened_at_wall,
            time_since_opened_ms,
            state_changed_at: self.state_changed_at,
        }
    }

    fn prune_window(&mut self, now: Instant) {
        while let Some(oldest) = self.failure_window.front() {
            if now.saturating_duration_since(*oldest) > self.config.monitoring_window {
                self.failure_window.pop_front();
            } else {
                break;
            }
        }
    }

    fn open(&mut self, now: Instant) -> Option<StateChange> {
        self.opened_at = Some(now);
        self.opened_at_wall = Some(Utc::now());
        self.open_count += 1;
        self.transition(CircuitState::Open)
    }

    fn transition(&mut self, to: CircuitState) -> Option<StateChange> {
        // Probe bookkeeping restarts on every state entry.
        self.half_open_successes = 0;
        if to != CircuitState::HalfOpen {
            self.probes_in_flight = 0;
        }
        if to == CircuitState::Closed {
            self.consecutive_failures = 0;
            self.failure_window.clear();
            self.opened_at = None;
            self.opened_at_wall = None;
        }

        let from = self.state;
        if from == to {
            return None;
        }
        if to == CircuitState::HalfOpen {
            self.half_open_epoch += 1;
        }
        self.state = to;
        self.state_changed_at = Utc::now();
        Some(StateChange { from, to })
    }
}

/// What sent a call to the fallback.
#[derive(Debug)]
pub enum FallbackTrigger<E> {
    CircuitOpen,
    ProbesExhausted,
    Operation(E),
    Timeout(Duration),
}

impl<E: fmt::Display> fmt::Display for FallbackTrigger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen => f.write_str("circuit open"),
            Self::ProbesExhausted => f.write_str("half-open probe limit reached"),
            Self::Operation(e) => write!(f, "{e}"),
            Self::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

/// Error from a breaker-protected call.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The operation failed and the circuit stayed closed.
    Operation { breaker: BreakerId, source: E },
    /// The operation missed its deadline and the circuit stayed closed.
    Timeout { breaker: BreakerId, after: Duration },
    /// The fallback failed too; both causes are attached.
    FallbackFailed {
        breaker: BreakerId,
        trigger: FallbackTrigger<E>,
        fallback: E,
    },
}

impl<E> BreakerError<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Operation { .. } => FailureKind::OperationFailure,
            Self::Timeout { .. } => FailureKind::TimeoutFailure,
            Self::FallbackFailed { .. } => FailureKind::FallbackFailure,
        }
    }

    pub fn breaker(&self) -> &BreakerId {
        match self {
            Self::Operation { breaker, .. }
            | Self::Timeout { breaker, .. }
            | Self::FallbackFailed { breaker, .. } => breaker,
        }
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation { breaker, source } => {
                write!(f, "Operation failed in circuit breaker {breaker}: {source}")
            }
            Self::Timeout { breaker, after } => write!(
                f,
                "Operation in circuit breaker {breaker} timed out after {}ms",
                after.as_millis()
            ),
            Self::FallbackFailed {
                breaker,
                trigger,
                fallback,
            } => write!(
                f,
                "Both primary operation and fallback failed in circuit breaker {breaker} \
                 (primary: {trigger}; fallback: {fallback})"
            ),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Operation { source, .. } => Some(source),
            Self::Timeout { .. } => None,
            Self::FallbackFailed { fallback, .. } => Some(fallback),
        }
    }
}

enum Outcome<T, E> {
    Completed(T),
    Failed(E),
    TimedOut(Duration),
}

/// A failed primary call, before deciding between surfacing it and falling back.
enum CallFailure<E> {
    Operation(E),
    Timeout(Duration),
}

impl<E: fmt::Display> CallFailure<E> {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Operation(_) => FailureKind::OperationFailure,
            Self::Timeout(_) => FailureKind::TimeoutFailure,
        }
    }

    fn into_trigger(self) -> FallbackTrigger<E> {
        match self {
            Self::Operation(e) => FallbackTrigger::Operation(e),
            Self::Timeout(after) => FallbackTrigger::Timeout(after),
        }
    }

    fn into_error(self, breaker: BreakerId) -> BreakerError<E> {
        match self {
            Self::Operation(source) => BreakerError::Operation { breaker, source },
            Self::Timeout(after) => BreakerError::Timeout { breaker, after },
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operation(e) => write!(f, "{e}"),
            Self::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

// ============================================================================
// Shared handle
// ============================================================================

/// Shared, cloneable handle to one breaker.
///
/// State mutations happen under a mutex that is never held across the protected call,
/// so concurrent callers see consistent counters.
#[derive(Clone)]
pub struct BreakerHandle {
    id: BreakerId,
    enabled: bool,
    inner: Arc<Mutex<CircuitBreaker>>,
    sink: Arc<dyn MetricsSink>,
}

impl fmt::Debug for BreakerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerHandle")
            .field("id", &self.id)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl BreakerHandle {
    pub fn new(id: BreakerId, config: CircuitBreakerConfig, sink: Arc<dyn MetricsSink>) -> Self {
        let enabled = config.enabled;
        Self {
            inner: Arc::new(Mutex::new(CircuitBreaker::new(id.clone(), config))),
            id,
            enabled,
            sink,
        }
    }

    pub fn id(&self) -> &BreakerId {
        &self.id
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state()
    }

    pub async fn config(&self) -> CircuitBreakerConfig {
        self.inner.lock().await.config().clone()
    }

    pub async fn metrics(&self) -> BreakerMetrics {
        self.inner.lock().await.snapshot(Instant::now())
    }

    pub async fn health(&self) -> BreakerHealth {
        self.inner.lock().await.health()
    }

    pub async fn force_open(&self) {
        let change = self.inner.lock().await.force_open(Instant::now());
        tracing::warn!(breaker = %self.id, "Circuit breaker forced open");
        self.report_change(change);
    }

    pub async fn force_close(&self) {
        let change = self.inner.lock().await.force_close();
        tracing::info!(breaker = %self.id, "Circuit breaker forced closed");
        self.report_change(change);
    }

    /// Run `operation` under the breaker, substituting `fallback` while the circuit is open.
    ///
    /// With a `timeout`, the operation future is raced against a timer and dropped when the
    /// timer wins. Failures are surfaced while the circuit stays closed; once it is (or
    /// becomes) open the fallback's result is returned instead.
    pub async fn execute<T, E, Op, OpFut, Fb, FbFut>(
        &self,
        operation: Op,
        fallback: Fb,
        timeout: Option<Duration>,
    ) -> Result<T, BreakerError<E>>
    where
        Op: FnOnce() -> OpFut,
        OpFut: Future<Output = Result<T, E>>,
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if !self.enabled {
            return match run_with_timeout(operation, timeout).await {
                Outcome::Completed(value) => Ok(value),
                Outcome::Failed(source) => Err(BreakerError::Operation {
                    breaker: self.id.clone(),
                    source,
                }),
                Outcome::TimedOut(after) => Err(BreakerError::Timeout {
                    breaker: self.id.clone(),
                    after,
                }),
            };
        }

        let (admission, change) = self.inner.lock().await.admit(Instant::now());
        self.count("circuit_breaker.requests", None);
        self.report_change(change);

        if let Admission::Reject(reason) = admission {
            self.count("circuit_breaker.rejected", None);
            tracing::debug!(breaker = %self.id, ?reason, "Circuit breaker rejected call");
            let trigger = match reason {
                RejectReason::CircuitOpen { .. } => FallbackTrigger::CircuitOpen,
                RejectReason::ProbesExhausted => FallbackTrigger::ProbesExhausted,
            };
            return self.run_fallback(fallback, trigger).await;
        }

        let failure = match run_with_timeout(operation, timeout).await {
            Outcome::Completed(value) => {
                let change = self.inner.lock().await.record_success(admission);
                self.count("circuit_breaker.success", None);
                self.report_change(change);
                return Ok(value);
            }
            Outcome::Failed(e) => CallFailure::Operation(e),
            Outcome::TimedOut(after) => CallFailure::Timeout(after),
        };
        let kind = failure.kind();
        let message = failure.to_string();

        let (change, state, consecutive) = {
            let mut breaker = self.inner.lock().await;
            let change = breaker.record_failure(Instant::now(), admission, kind);
            (change, breaker.state(), breaker.consecutive_failures())
        };
        self.count("circuit_breaker.failure", Some(kind));
        if kind == FailureKind::TimeoutFailure {
            self.count("circuit_breaker.timeout", None);
        }
        self.report_error(kind, &message, state, consecutive);
        self.report_change(change);

        if state == CircuitState::Open {
            return self.run_fallback(fallback, failure.into_trigger()).await;
        }

        tracing::warn!(
            breaker = %self.id,
            consecutive_failures = consecutive,
            state = %state,
            error = %message,
            "Protected operation failed"
        );
        Err(failure.into_error(self.id.clone()))
    }

    async fn run_fallback<T, E, Fb, FbFut>(
        &self,
        fallback: Fb,
        trigger: FallbackTrigger<E>,
    ) -> Result<T, BreakerError<E>>
    where
        Fb: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.inner.lock().await.record_fallback();
        self.count("circuit_breaker.fallback", None);

        match fallback().await {
            Ok(value) => Ok(value),
            Err(fallback) => {
                let (state, consecutive) = {
                    let breaker = self.inner.lock().await;
                    (breaker.state(), breaker.consecutive_failures())
                };
                let message = format!("primary: {trigger}; fallback: {fallback}");
                self.report_error(FailureKind::FallbackFailure, &message, state, consecutive);
                tracing::error!(breaker = %self.id, error = %message, "Fallback failed");
                Err(BreakerError::FallbackFailed {
                    breaker: self.id.clone(),
                    trigger,
                    fallback,
                })
            }
        }
    }

    fn base_attributes(&self) -> Attributes {
        attributes([
            ("agent", self.id.agent.to_string()),
            ("operation", self.id.operation.clone()),
        ])
    }

    fn count(&self, name: &str, error_type: Option<FailureKind>) {
        let mut attrs = self.base_attributes();
        if let Some(kind) = error_type {
            attrs.insert("error_type".to_string(), kind.to_string());
        }
        self.sink.increment_counter(name, 1, &attrs);
    }

    fn report_change(&self, change: Option<StateChange>) {
        let Some(StateChange { from, to }) = change else {
            return;
        };
        match to {
            CircuitState::Open => {
                tracing::warn!(breaker = %self.id, from = %from, "Circuit breaker opened");
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.id, "Circuit breaker half-open, probing");
            }
            CircuitState::Closed => {
                tracing::info!(breaker = %self.id, from = %from, "Circuit breaker closed");
            }
        }
        let mut attrs = self.base_attributes();
        attrs.insert("from".to_string(), from.to_string());
        attrs.insert("state".to_string(), to.to_string());
        self.sink
            .increment_counter("circuit_breaker.state_change", 1, &attrs);
    }

    fn report_error(&self, kind: FailureKind, message: &str, state: CircuitState, consecutive: u32) {
        self.sink.record_error(ErrorEvent {
            agent: self.id.agent,
            operation: self.id.operation.clone(),
            error_type: kind.to_string(),
            message: message.to_string(),
            attributes: attributes([
                ("breaker", self.id.to_string()),
                ("circuit_state", state.to_string()),
                ("consecutive_failures", consecutive.to_string()),
            ]),
        });
    }
}

async fn run_with_timeout<T, E, Op, OpFut>(operation: Op, timeout: Option<Duration>) -> Outcome<T, E>
where
    Op: FnOnce() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
{
    let result = match timeout {
        Some(after) => match tokio::time::timeout(after, operation()).await {
            Ok(result) => result,
            Err(_) => return Outcome::TimedOut(after),
        },
        None => operation().await,
    };
    match result {
        Ok(value) => Outcome::Completed(value),
        Err(e) => Outcome::Failed(e),
    }
}
