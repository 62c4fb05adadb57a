//! Domain errors for the reliability layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed call or test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The protected call returned an error
    OperationFailure,
    /// The deadline passed before the call completed
    TimeoutFailure,
    /// Both the primary call and its fallback failed
    FallbackFailure,
    /// Output did not satisfy the validation rules; recorded, never raised
    ValidationFailure,
    /// The call panicked
    Panic,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OperationFailure => "operation_failure",
            Self::TimeoutFailure => "timeout_failure",
            Self::FallbackFailure => "fallback_failure",
            Self::ValidationFailure => "validation_failure",
            Self::Panic => "panic",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque failure reported by an agent operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct OperationError {
    /// Short machine-readable category, used as the `error_type` metric attribute
    pub kind: String,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("operation_error", message)
    }

    pub fn unavailable(service: impl fmt::Display) -> Self {
        Self::new(
            "service_unavailable",
            format!("service {service} is temporarily unavailable"),
        )
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        Self::msg(format!("{err:#}"))
    }
}

/// Rejected administrative flag updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("Feature flag name cannot be empty")]
    EmptyName,

    #[error("Invalid rollout percentage for '{name}': {percentage}. Must be between 0 and 100")]
    InvalidPercentage { name: String, percentage: u8 },

    #[error("Feature flag '{name}' declares an empty variant map")]
    EmptyVariants { name: String },
}
