//! Agent identity and classification enums shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment tier the process runs in. Read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown environment '{other}', expected development, staging or production"
            )),
        }
    }
}

/// The agents whose operations this layer protects and validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Orchestrator,
    Context,
    Interviewer,
    Evaluator,
    Synthesis,
}

impl AgentName {
    /// Every known agent, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Orchestrator,
        Self::Context,
        Self::Interviewer,
        Self::Evaluator,
        Self::Synthesis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Context => "context",
            Self::Interviewer => "interviewer",
            Self::Evaluator => "evaluator",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|agent| agent.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown agent '{s}'"))
    }
}

/// Declared complexity of a request or test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "very_high" => Ok(Self::VeryHigh),
            other => Err(format!("unknown complexity '{other}'")),
        }
    }
}

/// Prompting strategy chosen for a given complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStrategy {
    Standard,
    ChainOfThought,
    StepBack,
    SelfReflection,
    MultiAgent,
}

impl ReasoningStrategy {
    /// Strategy used when adaptive reasoning is active.
    pub fn for_complexity(complexity: ComplexityLevel) -> Self {
        match complexity {
            ComplexityLevel::Low => Self::Standard,
            ComplexityLevel::Medium => Self::ChainOfThought,
            ComplexityLevel::High => Self::StepBack,
            ComplexityLevel::VeryHigh => Self::MultiAgent,
        }
    }
}
