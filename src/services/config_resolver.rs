//! Effective agent configuration: defaults, environment, flags, then adaptation.
//!
//! Resolved configurations are cached per agent and refreshed on a fixed interval, so a
//! reader may see a configuration up to one interval stale after a flag changes.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::errors::FlagError;
use crate::domain::models::{
    Adaptation, AdaptiveConfig, AgentConfig, AgentName, CircuitBreakerSettings, ComplexityLevel,
    Config, Environment, EnvironmentConfig, EvaluationContext, FeatureFlag, FlagEvaluation,
    FlagUpdate, ReasoningStrategy, ResolverConfig,
};
use crate::services::breaker_registry::BreakerRegistry;
use crate::services::circuit_breaker::{BreakerHandle, CircuitBreakerConfig};
use crate::services::feature_flags::{
    FeatureFlagSet, ADAPTIVE_REASONING, CIRCUIT_BREAKER, ENHANCED_TELEMETRY,
};

/// System load above which timeouts and token ceilings shrink.
pub const HIGH_LOAD_THRESHOLD: f64 = 0.8;

const HIGH_LOAD_TIMEOUT_FACTOR: f64 = 0.7;
const HIGH_LOAD_TOKEN_FACTOR: f64 = 0.8;
const MIN_TIMEOUT_MS: u64 = 10_000;
const MIN_MAX_TOKENS: u32 = 1024;

const LOW_COMPLEXITY_TEMPERATURE_FACTOR: f64 = 0.8;
const LOW_COMPLEXITY_MAX_TEMPERATURE: f64 = 0.5;

const HIGH_COMPLEXITY_FACTOR: f64 = 1.5;
const MAX_TIMEOUT_MS: u64 = 60_000;
const MAX_MAX_TOKENS: u32 = 8192;

/// Breaker settings for one agent, as resolved for first creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBreakerConfig {
    pub config: CircuitBreakerConfig,
    /// Deadline to race each protected call against
    pub operation_timeout: Duration,
}

#[derive(Debug, Clone)]
struct CachedConfig {
    config: AgentConfig,
    loaded_at: Instant,
}

/// Configuration resolver service.
pub struct ConfigResolver {
    environment: Environment,
    environment_config: EnvironmentConfig,
    system_user_id: String,
    refresh_interval: Duration,
    breaker_defaults: CircuitBreakerSettings,
    flags: RwLock<FeatureFlagSet>,
    cache: RwLock<HashMap<AgentName, CachedConfig>>,
}

impl ConfigResolver {
    /// Create a resolver for `environment`, seeded with the default flags.
    pub fn new(
        environment: Environment,
        settings: &ResolverConfig,
        breaker_defaults: CircuitBreakerSettings,
    ) -> Self {
        Self {
            environment,
            environment_config: EnvironmentConfig::for_environment(environment),
            system_user_id: settings.system_user_id.clone(),
            refresh_interval: Duration::from_secs(settings.refresh_interval_secs),
            breaker_defaults,
            flags: RwLock::new(FeatureFlagSet::with_defaults(Utc::now())),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.environment,
            &config.resolver,
            config.circuit_breaker.clone(),
        )
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn environment_config(&self) -> &EnvironmentConfig {
        &self.environment_config
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn system_context(&self, agent: AgentName) -> EvaluationContext {
        EvaluationContext::system(self.system_user_id.clone(), self.environment, agent)
    }

    /// Effective configuration for `agent`, served from cache while fresh.
    pub async fn resolve_agent_config(&self, agent: AgentName) -> AgentConfig {
        if let Some(cached) = self.cache.read().await.get(&agent) {
            if cached.loaded_at.elapsed() < self.refresh_interval {
                return cached.config.clone();
            }
        }

        let config = self.compute(agent).await;
        self.cache.write().await.insert(
            agent,
            CachedConfig {
                config: config.clone(),
                loaded_at: Instant::now(),
            },
        );
        config
    }

    /// Recompute every agent's configuration now.
    pub async fn refresh_all(&self) {
        let mut fresh = HashMap::with_capacity(AgentName::ALL.len());
        for agent in AgentName::ALL {
            fresh.insert(
                agent,
                CachedConfig {
                    config: self.compute(agent).await,
                    loaded_at: Instant::now(),
                },
            );
        }
        *self.cache.write().await = fresh;
        tracing::debug!(environment = %self.environment, "Agent configurations refreshed");
    }

    /// Drop every cached configuration.
    pub async fn invalidate_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Refresh the cache on the configured interval until the handle is aborted.
    pub fn spawn_refresh_task(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.refresh_interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.refresh_all().await;
            }
        })
    }

    async fn compute(&self, agent: AgentName) -> AgentConfig {
        let mut config = AgentConfig::defaults_for(agent);

        let llm = &self.environment_config.llm;
        config.model.model_name.clone_from(&llm.default_model);
        config.model.max_tokens = config.model.max_tokens.min(llm.max_tokens_per_request);

        let context = self.system_context(agent);
        let now = Utc::now();
        let flags = self.flags.read().await;
        if !flags.evaluate(ENHANCED_TELEMETRY, &context, now).enabled {
            config.monitoring.tracing_enabled = false;
        }
        if !flags.evaluate(CIRCUIT_BREAKER, &context, now).enabled {
            config.resilience.circuit_breaker_enabled = false;
        }
        config
    }

    /// Evaluate a flag for a caller-supplied context.
    pub async fn evaluate_flag(&self, name: &str, context: &EvaluationContext) -> FlagEvaluation {
        self.flags.read().await.evaluate(name, context, Utc::now())
    }

    /// Create or update a flag. Cached configurations pick it up on their next refresh.
    pub async fn set_feature_flag(
        &self,
        name: &str,
        update: FlagUpdate,
    ) -> Result<FeatureFlag, FlagError> {
        let mut flags = self.flags.write().await;
        let flag = flags.upsert(name, update, Utc::now())?.clone();
        tracing::info!(
            flag = %flag.name,
            enabled = flag.enabled,
            percentage = flag.targeting.percentage,
            "Feature flag updated"
        );
        Ok(flag)
    }

    pub async fn feature_flags(&self) -> Vec<FeatureFlag> {
        self.flags.read().await.iter().cloned().collect()
    }

    /// Resolve `agent` and adapt it to `complexity` and `system_load` in `[0.0, 1.0]`.
    pub async fn adapt(
        &self,
        agent: AgentName,
        complexity: ComplexityLevel,
        system_load: f64,
    ) -> AdaptiveConfig {
        let config = self.resolve_agent_config(agent).await;
        let adaptive = adapt_config(config, complexity, system_load);
        if !adaptive.adaptations.is_empty() {
            tracing::debug!(
                agent = %agent,
                complexity = %complexity,
                system_load,
                adaptations = ?adaptive.adaptations,
                "Adapted agent configuration"
            );
        }
        adaptive
    }

    /// Prompting strategy for `complexity`; standard unless adaptive reasoning is on.
    pub async fn reasoning_strategy(
        &self,
        agent: AgentName,
        complexity: ComplexityLevel,
    ) -> ReasoningStrategy {
        let context = self.system_context(agent);
        if self.evaluate_flag(ADAPTIVE_REASONING, &context).await.enabled {
            ReasoningStrategy::for_complexity(complexity)
        } else {
            ReasoningStrategy::Standard
        }
    }

    /// Breaker settings for `agent`: application defaults, disabled when the
    /// `circuit_breaker` flag is off, with the resolved call timeout.
    pub async fn breaker_config(&self, agent: AgentName) -> ResolvedBreakerConfig {
        let resolved = self.resolve_agent_config(agent).await;
        let mut config = CircuitBreakerConfig::from(&self.breaker_defaults);
        config.enabled = config.enabled && resolved.resilience.circuit_breaker_enabled;
        ResolvedBreakerConfig {
            config,
            operation_timeout: Duration::from_millis(resolved.runtime.timeout_ms),
        }
    }

    /// The registry's breaker for (agent, operation), created with resolved settings.
    pub async fn breaker(
        &self,
        registry: &BreakerRegistry,
        agent: AgentName,
        operation: &str,
    ) -> BreakerHandle {
        let resolved = self.breaker_config(agent).await;
        registry
            .get_or_create(agent, operation, Some(resolved.config))
            .await
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale_u64(value: u64, factor: f64) -> u64 {
    (value as f64 * factor).floor() as u64
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scale_u32(value: u32, factor: f64) -> u32 {
    (f64::from(value) * factor).floor() as u32
}

/// Apply bounded load and complexity adjustments to a resolved configuration.
pub fn adapt_config(
    mut config: AgentConfig,
    complexity: ComplexityLevel,
    system_load: f64,
) -> AdaptiveConfig {
    let mut adaptations = Vec::new();

    if system_load > HIGH_LOAD_THRESHOLD {
        config.runtime.timeout_ms =
            scale_u64(config.runtime.timeout_ms, HIGH_LOAD_TIMEOUT_FACTOR).max(MIN_TIMEOUT_MS);
        config.model.max_tokens =
            scale_u32(config.model.max_tokens, HIGH_LOAD_TOKEN_FACTOR).max(MIN_MAX_TOKENS);
        adaptations.push(Adaptation::ReducedTimeoutAndTokensDueToHighLoad);
    }

    match complexity {
        ComplexityLevel::Low => {
            config.model.temperature = (config.model.temperature
                * LOW_COMPLEXITY_TEMPERATURE_FACTOR)
                .min(LOW_COMPLEXITY_MAX_TEMPERATURE);
            adaptations.push(Adaptation::ReducedTemperatureForLowComplexity);
        }
        ComplexityLevel::High | ComplexityLevel::VeryHigh => {
            config.runtime.timeout_ms =
                scale_u64(config.runtime.timeout_ms, HIGH_COMPLEXITY_FACTOR).min(MAX_TIMEOUT_MS);
            config.model.max_tokens =
                scale_u32(config.model.max_tokens, HIGH_COMPLEXITY_FACTOR).min(MAX_MAX_TOKENS);
            adaptations.push(Adaptation::IncreasedTimeoutAndTokensForHighComplexity);
        }
        ComplexityLevel::Medium => {}
    }

    AdaptiveConfig {
        config,
        adaptations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(environment: Environment) -> ConfigResolver {
        ConfigResolver::new(
            environment,
            &ResolverConfig::default(),
            CircuitBreakerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_environment_clamps_tokens() {
        let dev = resolver(Environment::Development);
        let prod = resolver(Environment::Production);

        // Evaluator asks for 4096; both tiers allow it.
        assert_eq!(
            dev.resolve_agent_config(AgentName::Evaluator)
                .await
                .model
                .max_tokens,
            4096
        );
        assert_eq!(
            prod.resolve_agent_config(AgentName::Evaluator)
                .await
                .model
                .max_tokens,
            4096
        );
        assert_eq!(
            prod.resolve_agent_config(AgentName::Context)
                .await
                .model
                .model_name,
            "gemini-1.5-pro-latest"
        );
    }

    #[tokio::test]
    async fn test_circuit_breaker_flag_filters_development() {
        let dev = resolver(Environment::Development);
        let staging = resolver(Environment::Staging);

        let dev_config = dev.resolve_agent_config(AgentName::Interviewer).await;
        assert!(!dev_config.resilience.circuit_breaker_enabled);
        assert!(!dev.breaker_config(AgentName::Interviewer).await.config.enabled);

        let staging_config = staging.resolve_agent_config(AgentName::Interviewer).await;
        assert!(staging_config.resilience.circuit_breaker_enabled);
        let resolved = staging.breaker_config(AgentName::Interviewer).await;
        assert!(resolved.config.enabled);
        assert_eq!(resolved.operation_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_telemetry_flag_controls_tracing() {
        let prod = resolver(Environment::Production);
        prod.set_feature_flag(ENHANCED_TELEMETRY, FlagUpdate::rollout("off", 0))
            .await
            .unwrap();
        let config = prod.resolve_agent_config(AgentName::Synthesis).await;
        assert!(!config.monitoring.tracing_enabled);

        let prod = resolver(Environment::Production);
        prod.set_feature_flag(ENHANCED_TELEMETRY, FlagUpdate::rollout("on", 100))
            .await
            .unwrap();
        let config = prod.resolve_agent_config(AgentName::Synthesis).await;
        assert!(config.monitoring.tracing_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_stale_until_refresh_interval() {
        let prod = resolver(Environment::Production);
        assert!(
            prod.resolve_agent_config(AgentName::Context)
                .await
                .resilience
                .circuit_breaker_enabled
        );

        prod.set_feature_flag(
            CIRCUIT_BREAKER,
            FlagUpdate {
                enabled: false,
                ..FlagUpdate::rollout("incident", 100)
            },
        )
        .await
        .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(
            prod.resolve_agent_config(AgentName::Context)
                .await
                .resilience
                .circuit_breaker_enabled
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(
            !prod
                .resolve_agent_config(AgentName::Context)
                .await
                .resilience
                .circuit_breaker_enabled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_task_repopulates_cache() {
        let prod = Arc::new(resolver(Environment::Production));
        prod.resolve_agent_config(AgentName::Evaluator).await;
        prod.set_feature_flag(ENHANCED_TELEMETRY, FlagUpdate::rollout("off", 0))
            .await
            .unwrap();

        let task = Arc::clone(&prod).spawn_refresh_task();
        tokio::time::sleep(Duration::from_secs(301)).await;
        task.abort();

        // Turned back on after the refresh; the refreshed snapshot is still fresh.
        prod.set_feature_flag(ENHANCED_TELEMETRY, FlagUpdate::rollout("on", 100))
            .await
            .unwrap();
        let config = prod.resolve_agent_config(AgentName::Evaluator).await;
        assert!(!config.monitoring.tracing_enabled);
    }

    #[tokio::test]
    async fn test_set_feature_flag_rejects_invalid() {
        let prod = resolver(Environment::Production);
        let err = prod
            .set_feature_flag("", FlagUpdate::rollout("", 10))
            .await
            .unwrap_err();
        assert_eq!(err, FlagError::EmptyName);
        assert_eq!(prod.feature_flags().await.len(), 3);
    }

    #[tokio::test]
    async fn test_reasoning_strategy_follows_flag() {
        let prod = resolver(Environment::Production);
        assert_eq!(
            prod.reasoning_strategy(AgentName::Evaluator, ComplexityLevel::High)
                .await,
            ReasoningStrategy::StepBack
        );
        prod.set_feature_flag(ADAPTIVE_REASONING, FlagUpdate::rollout("off", 0))
            .await
            .unwrap();
        assert_eq!(
            prod.reasoning_strategy(AgentName::Evaluator, ComplexityLevel::High)
                .await,
            ReasoningStrategy::Standard
        );
    }

    #[test]
    fn test_adapt_high_load_respects_floors() {
        let config = AgentConfig::defaults_for(AgentName::Orchestrator); // 15s, 512 tokens
        let adapted = adapt_config(config, ComplexityLevel::Medium, 0.95);
        assert_eq!(adapted.config.runtime.timeout_ms, 10_500);
        assert_eq!(adapted.config.model.max_tokens, 1024);
        assert_eq!(
            adapted.adaptations,
            vec![Adaptation::ReducedTimeoutAndTokensDueToHighLoad]
        );
    }

    #[test]
    fn test_adapt_scaling_truncates() {
        let config = AgentConfig::defaults_for(AgentName::Evaluator); // 45s, 4096 tokens
        let adapted = adapt_config(config, ComplexityLevel::Medium, 0.9);
        // 4096 * 0.8 = 3276.8 and 45000 * 0.7 lands just under 31500
        assert_eq!(adapted.config.model.max_tokens, 3276);
        assert_eq!(adapted.config.runtime.timeout_ms, 31_499);
    }

    #[test]
    fn test_adapt_low_complexity_caps_temperature() {
        let config = AgentConfig::base(AgentName::Interviewer);
        let adapted = adapt_config(config, ComplexityLevel::Low, 0.2);
        assert!((adapted.config.model.temperature - 0.5).abs() < 1e-9);
        assert_eq!(adapted.config.runtime.timeout_ms, 30_000);
    }

    #[test]
    fn test_adapt_high_complexity_respects_ceilings() {
        let config = AgentConfig::defaults_for(AgentName::Evaluator); // 45s, 4096 tokens
        let adapted = adapt_config(config, ComplexityLevel::High, 0.5);
        assert_eq!(adapted.config.runtime.timeout_ms, 60_000);
        assert_eq!(adapted.config.model.max_tokens, 6144);

        let combined = adapt_config(
            AgentConfig::base(AgentName::Synthesis),
            ComplexityLevel::VeryHigh,
            0.9,
        );
        assert_eq!(combined.adaptations.len(), 2);
        // 30s * 0.7 = 21s, then * 1.5 = 31.5s
        assert_eq!(combined.config.runtime.timeout_ms, 31_500);
    }

    #[test]
    fn test_adapt_medium_normal_load_is_identity() {
        let config = AgentConfig::base(AgentName::Context);
        let adapted = adapt_config(config.clone(), ComplexityLevel::Medium, 0.5);
        assert_eq!(adapted.config, config);
        assert!(adapted.adaptations.is_empty());
    }
}
