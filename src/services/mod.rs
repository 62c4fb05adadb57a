pub mod breaker_registry;
pub mod circuit_breaker;
pub mod config_resolver;
pub mod feature_flags;
pub mod golden_set;
pub mod retry;
pub mod suite_runner;
pub mod telemetry;
pub mod test_harness;

pub use breaker_registry::{BreakerRegistry, HealthSummary};
pub use circuit_breaker::{
    BreakerError, BreakerHandle, BreakerHealth, BreakerId, BreakerMetrics, CircuitBreaker,
    CircuitBreakerConfig, CircuitState, FallbackTrigger,
};
pub use config_resolver::{adapt_config, ConfigResolver, ResolvedBreakerConfig};
pub use feature_flags::{evaluate_flag, in_rollout, rollout_bucket, FeatureFlagSet};
pub use golden_set::GoldenSetRepository;
pub use retry::{RetryOutcome, RetryPolicy};
pub use suite_runner::{summarize, TestSuiteRunner};
pub use telemetry::{InMemoryMetricsSink, NoopMetricsSink, TracingMetricsSink};
pub use test_harness::{validate_output, AgentTestHarness, AttemptError, ValidationReport};
