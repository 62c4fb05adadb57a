//! Agent reliability layer
//!
//! Keeps calls to LLM-backed agents well behaved and measurable:
//!
//! - **Circuit breakers** (`services::circuit_breaker`, `services::breaker_registry`):
//!   per (agent, operation) state machines that fail fast to a fallback while a
//!   dependency is unhealthy and probe for recovery after a cool-down.
//! - **Configuration resolution** (`services::config_resolver`, `services::feature_flags`):
//!   compiled defaults layered with environment overrides and deterministic
//!   percentage-rollout feature flags, then adapted to request complexity and load.
//! - **Validation suites** (`services::test_harness`, `services::suite_runner`):
//!   run test cases against agent operations with timeouts, retries and bounded
//!   parallel batches, and aggregate pass rate, latency and cost.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits at the seams
//! - **Service Layer** (`services`): breakers, resolver, harness and runners
//! - **Infrastructure Layer** (`infrastructure`): config loading and logging
//! - **CLI Layer** (`cli`): inspection commands
//!
//! # Example
//!
//! ```ignore
//! use agent_reliability::services::{BreakerRegistry, CircuitBreakerConfig, TracingMetricsSink};
//!
//! let registry = BreakerRegistry::new(CircuitBreakerConfig::default(), Arc::new(TracingMetricsSink));
//! let answer = registry
//!     .protect(AgentName::Evaluator, "score", Some(timeout), || evaluate(input))
//!     .await?;
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{FailureKind, FlagError, OperationError};
pub use domain::models::{
    AgentConfig, AgentName, ComplexityLevel, Config, Environment, EvaluationContext,
    FeatureFlag, FlagEvaluation, SuiteReport, TestCase, TestResult, TestSuite,
};
pub use domain::ports::{AgentOperation, FnOperation, MetricsSink};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AgentTestHarness, BreakerError, BreakerRegistry, CircuitBreakerConfig, CircuitState,
    ConfigResolver, TestSuiteRunner,
};
