//! Validation test cases, suites and their results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::agent::{AgentName, ComplexityLevel};
use crate::domain::errors::FailureKind;

/// Broad class a test case belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    #[default]
    Unit,
    Integration,
    E2e,
    Performance,
    Adversarial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

type ValidatorFn = dyn Fn(&Value, Option<&Value>) -> bool + Send + Sync;

/// Caller-supplied predicate over `(actual, expected)`.
#[derive(Clone)]
pub struct CustomValidator(Arc<ValidatorFn>);

impl CustomValidator {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn check(&self, actual: &Value, expected: Option<&Value>) -> bool {
        (self.0)(actual, expected)
    }
}

impl fmt::Debug for CustomValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomValidator(..)")
    }
}

/// One check applied to a test case's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Canonical JSON text of output equals that of the expected output
    ExactMatch,
    /// Normalized edit-distance similarity at or above `threshold` (default 0.8)
    FuzzyMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
    },
    /// Every key of the expected object is present with the same JSON type
    SchemaMatch,
    /// Predicate supplied in code; a rule loaded without one never passes
    Custom {
        name: String,
        #[serde(skip)]
        validator: Option<CustomValidator>,
    },
}

impl ValidationRule {
    pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

    pub fn fuzzy(threshold: f64) -> Self {
        Self::FuzzyMatch {
            threshold: Some(threshold),
        }
    }

    pub fn custom<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            validator: Some(CustomValidator::new(predicate)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::FuzzyMatch { .. } => "fuzzy_match",
            Self::SchemaMatch => "schema_match",
            Self::Custom { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestMetadata {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: TestPriority,
}

impl Default for TestMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            created_by: "system".to_string(),
            tags: Vec::new(),
            priority: TestPriority::default(),
        }
    }
}

/// A single input-and-expectation unit. Immutable once defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub complexity: ComplexityLevel,
    #[serde(default)]
    pub category: TestCategory,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    /// Per-case timeout; the harness default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Extra attempts after the first failed one
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub metadata: TestMetadata,
}

impl TestCase {
    pub fn new(id: impl Into<String>, input: Value) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            complexity: ComplexityLevel::Medium,
            category: TestCategory::default(),
            input,
            expected_output: None,
            validation_rules: Vec::new(),
            timeout_ms: None,
            retries: 0,
            metadata: TestMetadata::default(),
        }
    }

    pub fn expecting(mut self, expected: Value) -> Self {
        self.expected_output = Some(expected);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_complexity(mut self, complexity: ComplexityLevel) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_category(mut self, category: TestCategory) -> Self {
        self.category = category;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestPerformance {
    pub latency_ms: f64,
    pub tokens_used: u64,
    /// Estimated cost in USD
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAccuracy {
    /// Fraction of validation rules satisfied, `[0.0, 1.0]`
    pub score: f64,
    pub errors: Vec<String>,
}

/// Exactly one per executed test case; immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: String,
    pub passed: bool,
    pub performance: TestPerformance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<TestAccuracy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    /// Number of times the operation was invoked
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TestResult {
    /// A failed result that never produced output.
    pub fn failure(
        test_case_id: impl Into<String>,
        kind: FailureKind,
        error: impl Into<String>,
        attempts: u32,
        started_at: DateTime<Utc>,
        latency_ms: f64,
    ) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            passed: false,
            performance: TestPerformance {
                latency_ms,
                ..Default::default()
            },
            accuracy: None,
            output: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            attempts,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Scheduling options for a suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteConfig {
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub stop_on_first_failure: bool,
}

const fn default_max_concurrency() -> usize {
    5
}

impl Default for TestSuiteConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: default_max_concurrency(),
            stop_on_first_failure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuite {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub agent: AgentName,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub configuration: TestSuiteConfig,
}

impl TestSuite {
    pub fn new(id: impl Into<String>, agent: AgentName, test_cases: Vec<TestCase>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            agent,
            test_cases,
            configuration: TestSuiteConfig::default(),
        }
    }

    pub fn parallel(mut self, max_concurrency: usize) -> Self {
        self.configuration.parallel = true;
        self.configuration.max_concurrency = max_concurrency;
        self
    }

    pub fn stop_on_first_failure(mut self) -> Self {
        self.configuration.stop_on_first_failure = true;
        self
    }
}

/// Aggregates over a suite run.
///
/// `total` counts every case in the suite; the remaining figures cover executed cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub executed: usize,
    pub skipped: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_latency_ms: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub suite_id: String,
    pub agent: AgentName,
    pub results: Vec<TestResult>,
    pub summary: TestSummary,
}
