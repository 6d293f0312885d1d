//! CLI command implementations

mod run;
mod validate;

pub use run::run_command;
pub use validate::{summarize, validate_command};
