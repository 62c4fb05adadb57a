//! Inspection and administration CLI over the configuration resolver and feature flags.

pub mod commands;
pub mod output;
pub mod table;
pub mod types;

pub use output::{handle_error, output, CommandOutput};
pub use types::{Cli, Commands};
