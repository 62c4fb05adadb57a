//! Metrics sink port - where counters, histograms and error events go.
//!
//! The reliability layer emits telemetry but never owns its transport. Adapters live in
//! [`crate::services::telemetry`].

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::models::AgentName;

/// String-keyed attributes attached to a data point. Ordered so keys are stable.
pub type Attributes = BTreeMap<String, String>;

/// Build an attribute map from key/value pairs.
pub fn attributes<K, V, I>(pairs: I) -> Attributes
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

/// Structured error event for root-cause analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub agent: AgentName,
    pub operation: String,
    pub error_type: String,
    pub message: String,
    pub attributes: Attributes,
}

/// Receiver of telemetry data points.
///
/// Implementations must be cheap and non-blocking; they are called on the hot path of
/// every protected call.
pub trait MetricsSink: Send + Sync {
    /// Add `value` to the counter `name`.
    fn increment_counter(&self, name: &str, value: u64, attributes: &Attributes);

    /// Record one histogram sample.
    fn record_histogram(&self, name: &str, value: f64, attributes: &Attributes);

    /// Record a structured error event.
    fn record_error(&self, event: ErrorEvent);
}
