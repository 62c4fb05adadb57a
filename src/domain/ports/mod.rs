//! Port trait definitions (Hexagonal Architecture)
//!
//! - AgentOperation: the opaque async call being protected or validated
//! - MetricsSink: receiver of counters, histograms and error events
//!
//! Callers supply operations; infrastructure and services supply sinks.

pub mod agent_operation;
pub mod metrics_sink;

pub use agent_operation::{AgentOperation, FnOperation};
pub use metrics_sink::{attributes, Attributes, ErrorEvent, MetricsSink};
