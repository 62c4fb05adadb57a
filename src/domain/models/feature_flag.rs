//! Feature flag definitions and evaluation inputs/outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::agent::{AgentName, Environment};

/// Who a flag applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlagTargeting {
    /// Share of users (0-100) that receive the flag
    #[serde(default)]
    pub percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_filter: Option<Vec<Environment>>,
}

impl FlagTargeting {
    pub fn percentage(percentage: u8) -> Self {
        Self {
            percentage,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagMetadata {
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A named, independently toggleable switch.
///
/// Flags are never deleted; once `expires_at` passes they evaluate as inert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub targeting: FlagTargeting,
    /// Variant name to payload. Ordered so variant bucketing is stable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, Value>>,
    pub metadata: FlagMetadata,
}

impl FeatureFlag {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.expires_at.is_some_and(|expires| expires < now)
    }
}

/// Administrative create/update payload for a flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagUpdate {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub targeting: FlagTargeting,
    #[serde(default)]
    pub variants: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl FlagUpdate {
    /// An enabled flag rolled out to `percentage` of users.
    pub fn rollout(description: impl Into<String>, percentage: u8) -> Self {
        Self {
            description: description.into(),
            enabled: true,
            targeting: FlagTargeting::percentage(percentage),
            ..Default::default()
        }
    }

    pub fn with_environments(mut self, environments: Vec<Environment>) -> Self {
        self.targeting.environment_filter = Some(environments);
        self
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.targeting.user_segments = Some(segments);
        self
    }

    pub fn with_variants(mut self, variants: BTreeMap<String, Value>) -> Self {
        self.variants = Some(variants);
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Per-request identity used to evaluate flags. `user_id` is the rollout key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub user_id: String,
    pub session_id: String,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentName>,
}

impl EvaluationContext {
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        environment: Environment,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            environment,
            user_segments: None,
            agent: None,
        }
    }

    /// Context used when resolving configuration on behalf of the system itself.
    pub fn system(user_id: impl Into<String>, environment: Environment, agent: AgentName) -> Self {
        Self {
            agent: Some(agent),
            ..Self::new(user_id, "config", environment)
        }
    }

    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.user_segments = Some(segments);
        self
    }
}

/// Outcome of a flag evaluation.
///
/// Negative decisions carry a variant label naming the check that rejected them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagEvaluation {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FlagEvaluation {
    pub const UNKNOWN: &'static str = "unknown";
    pub const CONTROL: &'static str = "control";
    pub const EXPIRED: &'static str = "expired";
    pub const ENVIRONMENT_FILTERED: &'static str = "environment_filtered";
    pub const SEGMENT_FILTERED: &'static str = "segment_filtered";
    pub const PERCENTAGE_FILTERED: &'static str = "percentage_filtered";
    pub const DEFAULT_VARIANT: &'static str = "default";

    pub fn disabled(reason: &str) -> Self {
        Self {
            enabled: false,
            variant: Some(reason.to_string()),
            value: None,
        }
    }

    pub fn enabled(variant: impl Into<String>, value: Value) -> Self {
        Self {
            enabled: true,
            variant: Some(variant.into()),
            value: Some(value),
        }
    }
}
