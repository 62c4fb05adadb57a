//! Domain layer for the agent reliability layer
//!
//! Plain data models, the error taxonomy, and the port traits that infrastructure
//! and callers plug into.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{FailureKind, FlagError, OperationError};
