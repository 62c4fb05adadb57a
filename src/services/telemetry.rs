//! Metrics sink adapters and cost accounting.
//!
//! - [`TracingMetricsSink`]: every data point becomes a `tracing` event on the
//!   `agent_reliability::metrics` target, so the subscriber decides where it goes.
//! - [`InMemoryMetricsSink`]: keeps everything for inspection and tests.
//! - [`NoopMetricsSink`]: drops everything.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::ports::{Attributes, ErrorEvent, MetricsSink};

/// Tracing target used for metric events.
pub const METRICS_TARGET: &str = "agent_reliability::metrics";

/// Per-token price in USD for Gemini 1.5 Pro.
pub const GEMINI_PRO_TOKEN_PRICE: f64 = 0.001_25;
/// Per-token price in USD for Gemini 1.5 Flash.
pub const GEMINI_FLASH_TOKEN_PRICE: f64 = 0.000_075;

/// Estimated cost of `tokens` on `model`. Unknown models are priced as Pro.
pub fn token_cost(model: &str, tokens: u64) -> f64 {
    let price = match model {
        "gemini-1.5-flash" => GEMINI_FLASH_TOKEN_PRICE,
        _ => GEMINI_PRO_TOKEN_PRICE,
    };
    #[allow(clippy::cast_precision_loss)]
    let tokens = tokens as f64;
    tokens * price
}

/// Emits metrics as structured tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn increment_counter(&self, name: &str, value: u64, attributes: &Attributes) {
        tracing::info!(
            target: METRICS_TARGET,
            metric = name,
            value,
            attributes = ?attributes,
            "counter"
        );
    }

    fn record_histogram(&self, name: &str, value: f64, attributes: &Attributes) {
        tracing::info!(
            target: METRICS_TARGET,
            metric = name,
            value,
            attributes = ?attributes,
            "histogram"
        );
    }

    fn record_error(&self, event: ErrorEvent) {
        tracing::warn!(
            target: METRICS_TARGET,
            agent = %event.agent,
            operation = %event.operation,
            error_type = %event.error_type,
            attributes = ?event.attributes,
            "{}",
            event.message
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn increment_counter(&self, _name: &str, _value: u64, _attributes: &Attributes) {}

    fn record_histogram(&self, _name: &str, _value: f64, _attributes: &Attributes) {}

    fn record_error(&self, _event: ErrorEvent) {}
}

/// One recorded histogram sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    pub name: String,
    pub value: f64,
    pub attributes: Attributes,
}

#[derive(Debug, Default)]
struct Recorded {
    counters: BTreeMap<(String, Attributes), u64>,
    histograms: Vec<HistogramSample>,
    errors: Vec<ErrorEvent>,
}

/// Keeps every data point in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetricsSink {
    recorded: Mutex<Recorded>,
}

impl InMemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // A panic while recording cannot leave the maps half-updated.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sum of a counter across all attribute sets.
    pub fn counter(&self, name: &str) -> u64 {
        self.lock()
            .counters
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, v)| v)
            .sum()
    }

    /// Value of a counter for one exact attribute set.
    pub fn counter_with(&self, name: &str, attributes: &Attributes) -> u64 {
        self.lock()
            .counters
            .get(&(name.to_string(), attributes.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Samples recorded for a histogram, in order.
    pub fn histogram(&self, name: &str) -> Vec<f64> {
        self.lock()
            .histograms
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.value)
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorEvent> {
        self.lock().errors.clone()
    }

    pub fn clear(&self) {
        *self.lock() = Recorded::default();
    }
}

impl MetricsSink for InMemoryMetricsSink {
    fn increment_counter(&self, name: &str, value: u64, attributes: &Attributes) {
        *self
            .lock()
            .counters
            .entry((name.to_string(), attributes.clone()))
            .or_insert(0) += value;
    }

    fn record_histogram(&self, name: &str, value: f64, attributes: &Attributes) {
        self.lock().histograms.push(HistogramSample {
            name: name.to_string(),
            value,
            attributes: attributes.clone(),
        });
    }

    fn record_error(&self, event: ErrorEvent) {
        self.lock().errors.push(event);
    }
}
