pub mod agent;
pub mod agent_config;
pub mod config;
pub mod environment_config;
pub mod feature_flag;
pub mod test_case;

pub use agent::{AgentName, ComplexityLevel, Environment, ReasoningStrategy};
pub use agent_config::{
    Adaptation, AdaptiveConfig, AgentConfig, ModelConfig, MonitoringConfig, PromptsConfig,
    ResilienceConfig, RuntimeConfig,
};
pub use config::{CircuitBreakerSettings, Config, HarnessConfig, LoggingConfig, ResolverConfig};
pub use environment_config::{
    EnvironmentApiConfig, EnvironmentConfig, EnvironmentLlmConfig, EnvironmentSecurityConfig,
};
pub use feature_flag::{
    EvaluationContext, FeatureFlag, FlagEvaluation, FlagMetadata, FlagTargeting, FlagUpdate,
};
pub use test_case::{
    CustomValidator, SuiteReport, TestAccuracy, TestCase, TestCategory, TestMetadata,
    TestPerformance, TestPriority, TestResult, TestSuite, TestSuiteConfig, TestSummary,
    ValidationRule,
};
