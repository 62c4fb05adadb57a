//! Single test case execution: timeout, retry, validation and cost accounting.

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::domain::errors::{FailureKind, OperationError};
use crate::domain::models::{
    AgentName, HarnessConfig, TestAccuracy, TestCase, TestPerformance, TestResult, ValidationRule,
};
use crate::domain::ports::{attributes, AgentOperation, MetricsSink};
use crate::services::retry::RetryPolicy;
use crate::services::telemetry::token_cost;

/// Fraction of rules that must pass for a case to pass.
pub const PASS_THRESHOLD: f64 = 0.8;

/// Why one attempt produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("{0}")]
    Operation(#[from] OperationError),

    #[error("Test timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Operation panicked: {0}")]
    Panic(String),
}

impl AttemptError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Operation(_) => FailureKind::OperationFailure,
            Self::Timeout(_) => FailureKind::TimeoutFailure,
            Self::Panic(_) => FailureKind::Panic,
        }
    }

    /// Only plain operation failures are retried; timeouts and panics are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Operation(_))
    }
}

/// Outcome of checking one output against a case's expectations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub passed: bool,
    pub score: f64,
    pub errors: Vec<String>,
}

impl From<ValidationReport> for TestAccuracy {
    fn from(report: ValidationReport) -> Self {
        Self {
            score: report.score,
            errors: report.errors,
        }
    }
}

/// Runs test cases against one agent operation.
pub struct AgentTestHarness {
    agent: AgentName,
    operation: Arc<dyn AgentOperation>,
    config: HarnessConfig,
    sink: Arc<dyn MetricsSink>,
}

impl AgentTestHarness {
    pub fn new(
        agent: AgentName,
        operation: Arc<dyn AgentOperation>,
        config: HarnessConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            agent,
            operation,
            config,
            sink,
        }
    }

    pub fn agent(&self) -> AgentName {
        self.agent
    }

    /// Execute one case. Always yields a result; failures are recorded, never raised.
    pub async fn run_test(&self, case: &TestCase) -> TestResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let timeout = Duration::from_millis(
            case.timeout_ms.unwrap_or(self.config.default_timeout_ms),
        );
        let policy = RetryPolicy::new(
            case.retries,
            self.config.initial_backoff_ms,
            self.config.max_backoff_ms,
        );

        tracing::debug!(
            agent = %self.agent,
            test_case = %case.id,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            retries = case.retries,
            "Running test case"
        );

        let outcome = policy
            .execute(
                |_| self.attempt(&case.input, timeout),
                AttemptError::is_retryable,
            )
            .await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome.result {
            Ok(output) => {
                let report = validate_output(case, &output);
                let tokens_used = extract_tokens(&output);
                let cost = token_cost(&self.config.pricing_model, tokens_used);
                TestResult {
                    test_case_id: case.id.clone(),
                    passed: report.passed,
                    performance: TestPerformance {
                        latency_ms,
                        tokens_used,
                        cost,
                    },
                    error_kind: (!report.passed).then_some(FailureKind::ValidationFailure),
                    accuracy: Some(report.into()),
                    output: Some(output),
                    error: None,
                    attempts: outcome.attempts,
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Err(err) => TestResult::failure(
                case.id.clone(),
                err.kind(),
                err.to_string(),
                outcome.attempts,
                started_at,
                latency_ms,
            ),
        };

        if self.config.record_metrics {
            self.record_metrics(case, &result);
        }
        tracing::info!(
            agent = %self.agent,
            test_case = %case.id,
            passed = result.passed,
            attempts = result.attempts,
            latency_ms = result.performance.latency_ms,
            error_kind = ?result.error_kind,
            "Test case finished"
        );
        result
    }

    async fn attempt(&self, input: &Value, timeout: Duration) -> Result<Value, AttemptError> {
        let call = tokio::time::timeout(timeout, self.operation.invoke(input.clone()));
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(AttemptError::Operation(e)),
            Ok(Err(_elapsed)) => Err(AttemptError::Timeout(timeout)),
            Err(panic) => Err(AttemptError::Panic(panic_message(panic.as_ref()))),
        }
    }

    fn record_metrics(&self, case: &TestCase, result: &TestResult) {
        let attrs = attributes([
            ("agent", self.agent.to_string()),
            ("test_case", case.id.clone()),
            ("complexity", case.complexity.to_string()),
        ]);
        self.sink
            .record_histogram("agent.latency_ms", result.performance.latency_ms, &attrs);
        self.sink
            .increment_counter("agent.tokens_used", result.performance.tokens_used, &attrs);
        self.sink
            .record_histogram("agent.operation_cost_usd", result.performance.cost, &attrs);
        let outcome = if result.passed {
            "agent.operation_success"
        } else {
            "agent.operation_failure"
        };
        self.sink.increment_counter(outcome, 1, &attrs);
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Token usage reported by an output, from `tokens_used`, `tokensUsed` or
/// `usage.total_tokens`. Zero when absent.
pub fn extract_tokens(output: &Value) -> u64 {
    [
        output.get("tokens_used"),
        output.get("tokensUsed"),
        output.pointer("/usage/total_tokens"),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_u64)
    .unwrap_or(0)
}

/// Check `output` against a case's rules, or its expected output when it has none.
pub fn validate_output(case: &TestCase, output: &Value) -> ValidationReport {
    let expected = case.expected_output.as_ref().unwrap_or(&Value::Null);

    if case.validation_rules.is_empty() {
        let passed = canonical(output) == canonical(expected);
        return ValidationReport {
            passed,
            score: if passed { 1.0 } else { 0.0 },
            errors: if passed {
                Vec::new()
            } else {
                vec!["Output does not match expected result".to_string()]
            },
        };
    }

    let mut errors = Vec::new();
    let mut satisfied = 0usize;
    for rule in &case.validation_rules {
        let outcome = match rule {
            ValidationRule::ExactMatch => Ok(canonical(output) == canonical(expected)),
            ValidationRule::FuzzyMatch { threshold } => Ok(similarity(
                &canonical(output),
                &canonical(expected),
            ) >= threshold.unwrap_or(ValidationRule::DEFAULT_FUZZY_THRESHOLD)),
            ValidationRule::SchemaMatch => Ok(schema_matches(output, expected)),
            ValidationRule::Custom { validator: None, .. } => Ok(false),
            ValidationRule::Custom {
                validator: Some(validator),
                ..
            } => std::panic::catch_unwind(AssertUnwindSafe(|| {
                validator.check(output, case.expected_output.as_ref())
            }))
            .map_err(|panic| panic_message(panic.as_ref())),
        };
        match outcome {
            Ok(true) => satisfied += 1,
            Ok(false) => errors.push(format!("Validation rule '{}' failed", rule.label())),
            Err(message) => {
                tracing::warn!(rule = rule.label(), %message, "Validation rule panicked");
                errors.push(format!(
                    "Validation rule '{}' threw error: {message}",
                    rule.label()
                ));
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let score = satisfied as f64 / case.validation_rules.len() as f64;
    ValidationReport {
        passed: score >= PASS_THRESHOLD,
        score,
        errors,
    }
}

/// Serialized form used for equality and similarity. Object keys are already sorted.
fn canonical(value: &Value) -> String {
    value.to_string()
}

/// Every key of an expected object is present in the output with the same JSON type.
/// Anything other than two objects matches.
fn schema_matches(output: &Value, expected: &Value) -> bool {
    match (output, expected) {
        (Value::Object(actual), Value::Object(schema)) => schema.iter().all(|(key, want)| {
            actual
                .get(key)
                .is_some_and(|got| json_type(got) == json_type(want))
        }),
        _ => true,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalized edit similarity: `(len(longer) - distance) / len(longer)`, 1.0 for two
/// empty strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    #[allow(clippy::cast_precision_loss)]
    let score = (longer - distance) as f64 / longer as f64;
    score
}

/// Character-level Levenshtein distance, two-row dynamic programming.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
