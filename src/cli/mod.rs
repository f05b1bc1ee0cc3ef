//! CLI module for formentry
//!
//! Provides command-line interface for:
//! - validate: check a submission against a form's field rules
//! - submit: run a submission through the pipeline

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_command, submit, validate};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
