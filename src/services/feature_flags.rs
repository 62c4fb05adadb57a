//! Feature flag store and evaluation.
//!
//! Evaluation short-circuits in a fixed order: unknown, globally disabled, expired,
//! environment filter, segment filter, percentage rollout, then variant selection.
//! Rollout and variant choice both hash the user id, so a user keeps the same decision
//! for an unchanged flag across processes and restarts.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::errors::FlagError;
use crate::domain::models::{
    Environment, EvaluationContext, FeatureFlag, FlagEvaluation, FlagMetadata, FlagUpdate,
};

/// Flag names the resolver consults.
pub const ADAPTIVE_REASONING: &str = "adaptive_reasoning";
pub const ENHANCED_TELEMETRY: &str = "enhanced_telemetry";
pub const CIRCUIT_BREAKER: &str = "circuit_breaker";

/// Stable 64-bit hash of a rollout key.
///
/// First eight bytes of SHA-256, big-endian. Not a security boundary; SHA-256 is used
/// only because it is stable across builds and evenly distributed.
pub fn rollout_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Rollout bucket in `0..100` for a user id.
pub fn rollout_bucket(user_id: &str) -> u8 {
    // < 100, so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation)]
    let bucket = (rollout_hash(user_id) % 100) as u8;
    bucket
}

/// Whether `user_id` falls inside a `percentage` rollout.
pub fn in_rollout(user_id: &str, percentage: u8) -> bool {
    match percentage {
        0 => false,
        p if p >= 100 => true,
        p => rollout_bucket(user_id) < p,
    }
}

/// Evaluate one flag definition for a context at `now`.
pub fn evaluate_flag(
    flag: Option<&FeatureFlag>,
    context: &EvaluationContext,
    now: DateTime<Utc>,
) -> FlagEvaluation {
    let Some(flag) = flag else {
        return FlagEvaluation::disabled(FlagEvaluation::UNKNOWN);
    };
    if !flag.enabled {
        return FlagEvaluation::disabled(FlagEvaluation::CONTROL);
    }
    if flag.is_expired(now) {
        return FlagEvaluation::disabled(FlagEvaluation::EXPIRED);
    }

    let targeting = &flag.targeting;
    if let Some(environments) = &targeting.environment_filter {
        if !environments.contains(&context.environment) {
            return FlagEvaluation::disabled(FlagEvaluation::ENVIRONMENT_FILTERED);
        }
    }
    if let (Some(wanted), Some(held)) = (&targeting.user_segments, &context.user_segments) {
        if !wanted.iter().any(|segment| held.contains(segment)) {
            return FlagEvaluation::disabled(FlagEvaluation::SEGMENT_FILTERED);
        }
    }
    if !in_rollout(&context.user_id, targeting.percentage) {
        return FlagEvaluation::disabled(FlagEvaluation::PERCENTAGE_FILTERED);
    }

    match &flag.variants {
        Some(variants) if !variants.is_empty() => {
            #[allow(clippy::cast_possible_truncation)]
            let index = (rollout_hash(&context.user_id) % variants.len() as u64) as usize;
            variants
                .iter()
                .nth(index)
                .map_or_else(
                    || FlagEvaluation::enabled(FlagEvaluation::DEFAULT_VARIANT, Value::Bool(true)),
                    |(name, value)| FlagEvaluation::enabled(name.clone(), value.clone()),
                )
        }
        _ => FlagEvaluation::enabled(FlagEvaluation::DEFAULT_VARIANT, Value::Bool(true)),
    }
}

/// In-memory set of flag definitions.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlagSet {
    flags: BTreeMap<String, FeatureFlag>,
}

impl FeatureFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flags every deployment starts with.
    pub fn with_defaults(now: DateTime<Utc>) -> Self {
        let mut set = Self::new();
        let defaults = [
            (
                ADAPTIVE_REASONING,
                FlagUpdate::rollout("Enable adaptive reasoning strategies", 100),
            ),
            (
                ENHANCED_TELEMETRY,
                FlagUpdate::rollout("Enable enhanced telemetry collection", 50),
            ),
            (
                CIRCUIT_BREAKER,
                FlagUpdate::rollout("Enable circuit breaker protection", 100)
                    .with_environments(vec![Environment::Staging, Environment::Production]),
            ),
        ];
        for (name, update) in defaults {
            set.flags
                .insert(name.to_string(), build_flag(name, update, None, now));
        }
        set
    }

    pub fn get(&self, name: &str) -> Option<&FeatureFlag> {
        self.flags.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureFlag> {
        self.flags.values()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn evaluate(
        &self,
        name: &str,
        context: &EvaluationContext,
        now: DateTime<Utc>,
    ) -> FlagEvaluation {
        evaluate_flag(self.flags.get(name), context, now)
    }

    /// Create or replace a flag. An existing flag keeps its creation metadata.
    pub fn upsert(
        &mut self,
        name: &str,
        update: FlagUpdate,
        now: DateTime<Utc>,
    ) -> Result<&FeatureFlag, FlagError> {
        validate_update(name, &update)?;
        let previous = self.flags.remove(name).map(|flag| flag.metadata);
        let flag = build_flag(name, update, previous, now);
        Ok(self.flags.entry(name.to_string()).or_insert(flag))
    }
}

fn validate_update(name: &str, update: &FlagUpdate) -> Result<(), FlagError> {
    if name.trim().is_empty() {
        return Err(FlagError::EmptyName);
    }
    if update.targeting.percentage > 100 {
        return Err(FlagError::InvalidPercentage {
            name: name.to_string(),
            percentage: update.targeting.percentage,
        });
    }
    if update.variants.as_ref().is_some_and(BTreeMap::is_empty) {
        return Err(FlagError::EmptyVariants {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn build_flag(
    name: &str,
    update: FlagUpdate,
    previous: Option<FlagMetadata>,
    now: DateTime<Utc>,
) -> FeatureFlag {
    let (created_at, created_by) = match previous {
        Some(meta) => (meta.created_at, update.created_by.unwrap_or(meta.created_by)),
        None => (now, update.created_by.unwrap_or_else(|| "system".to_string())),
    };
    FeatureFlag {
        name: name.to_string(),
        description: update.description,
        enabled: update.enabled,
        targeting: update.targeting,
        variants: update.variants,
        metadata: FlagMetadata {
            created_at,
            created_by,
            expires_at: update.expires_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn ctx(user: &str, env: Environment) -> EvaluationContext {
        EvaluationContext::new(user, "s1", env)
    }

    fn set_with(name: &str, update: FlagUpdate) -> FeatureFlagSet {
        let mut set = FeatureFlagSet::new();
        set.upsert(name, update, Utc::now()).unwrap();
        set
    }

    #[test]
    fn test_rollout_hash_is_stable() {
        assert_eq!(rollout_hash("user-42"), rollout_hash("user-42"));
        assert_ne!(rollout_hash("user-42"), rollout_hash("user-43"));
        assert!(rollout_bucket("user-42") < 100);
    }

    #[test]
    fn test_in_rollout_bounds() {
        assert!(!in_rollout("anyone", 0));
        assert!(in_rollout("anyone", 100));
    }

    #[test]
    fn test_unknown_and_disabled() {
        let now = Utc::now();
        let set = set_with(
            "off",
            FlagUpdate {
                enabled: false,
                ..FlagUpdate::rollout("", 100)
            },
        );
        let context = ctx("u", Environment::Production);

        let unknown = set.evaluate("missing", &context, now);
        assert!(!unknown.enabled);
        assert_eq!(unknown.variant.as_deref(), Some(FlagEvaluation::UNKNOWN));

        let off = set.evaluate("off", &context, now);
        assert_eq!(off.variant.as_deref(), Some(FlagEvaluation::CONTROL));
    }

    #[test]
    fn test_expired_flag_is_inert() {
        let now = Utc::now();
        let set = set_with(
            "old",
            FlagUpdate::rollout("", 100).expiring_at(now - Duration::minutes(1)),
        );
        let eval = set.evaluate("old", &ctx("u", Environment::Development), now);
        assert_eq!(eval.variant.as_deref(), Some(FlagEvaluation::EXPIRED));
    }

    #[test]
    fn test_environment_filter() {
        let set = FeatureFlagSet::with_defaults(Utc::now());
        let now = Utc::now();
        let dev = set.evaluate(CIRCUIT_BREAKER, &ctx("u", Environment::Development), now);
        assert!(!dev.enabled);
        assert_eq!(
            dev.variant.as_deref(),
            Some(FlagEvaluation::ENVIRONMENT_FILTERED)
        );

        let prod = set.evaluate(CIRCUIT_BREAKER, &ctx("u", Environment::Production), now);
        assert!(prod.enabled);
        assert_eq!(prod.variant.as_deref(), Some(FlagEvaluation::DEFAULT_VARIANT));
        assert_eq!(prod.value, Some(json!(true)));
    }

    #[test]
    fn test_segment_filter_only_when_both_sides_declare() {
        let now = Utc::now();
        let set = set_with(
            "beta",
            FlagUpdate::rollout("", 100).with_segments(vec!["beta".to_string()]),
        );

        let no_segments = set.evaluate("beta", &ctx("u", Environment::Staging), now);
        assert!(no_segments.enabled);

        let outsider = ctx("u", Environment::Staging).with_segments(vec!["free".to_string()]);
        let eval = set.evaluate("beta", &outsider, now);
        assert_eq!(eval.variant.as_deref(), Some(FlagEvaluation::SEGMENT_FILTERED));

        let insider = ctx("u", Environment::Staging)
            .with_segments(vec!["free".to_string(), "beta".to_string()]);
        assert!(set.evaluate("beta", &insider, now).enabled);
    }

    #[test]
    fn test_variant_selection_is_consistent() {
        let now = Utc::now();
        let variants = BTreeMap::from([
            ("a".to_string(), json!("rubric-a")),
            ("b".to_string(), json!("rubric-b")),
            ("c".to_string(), json!("rubric-c")),
        ]);
        let set = set_with("rubric", FlagUpdate::rollout("", 100).with_variants(variants));

        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            let context = ctx(&format!("user-{i}"), Environment::Production);
            let first = set.evaluate("rubric", &context, now);
            let again = set.evaluate("rubric", &context, now);
            assert_eq!(first, again);
            let variant = first.variant.unwrap();
            assert_eq!(first.value, Some(json!(format!("rubric-{variant}"))));
            seen.insert(variant);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_upsert_validation() {
        let mut set = FeatureFlagSet::new();
        let now = Utc::now();
        assert_eq!(
            set.upsert("  ", FlagUpdate::rollout("", 10), now).unwrap_err(),
            FlagError::EmptyName
        );
        assert!(matches!(
            set.upsert("x", FlagUpdate::rollout("", 101), now),
            Err(FlagError::InvalidPercentage { percentage: 101, .. })
        ));
        assert!(matches!(
            set.upsert("x", FlagUpdate::rollout("", 10).with_variants(BTreeMap::new()), now),
            Err(FlagError::EmptyVariants { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_upsert_keeps_creation_metadata() {
        let mut set = FeatureFlagSet::new();
        let created = Utc::now() - Duration::days(3);
        set.upsert("f", FlagUpdate::rollout("first", 10), created)
            .unwrap();
        let updated = set
            .upsert("f", FlagUpdate::rollout("second", 20), Utc::now())
            .unwrap();
        assert_eq!(updated.metadata.created_at, created);
        assert_eq!(updated.description, "second");
        assert_eq!(updated.targeting.percentage, 20);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_default_flags() {
        let set = FeatureFlagSet::with_defaults(Utc::now());
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.get(ENHANCED_TELEMETRY).map(|f| f.targeting.percentage),
            Some(50)
        );
    }
}
