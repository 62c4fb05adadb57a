//! Infrastructure layer module
//!
//! - Configuration loading (figment)
//! - Logging bootstrap (tracing-subscriber, tracing-appender)

pub mod config;
pub mod logging;
