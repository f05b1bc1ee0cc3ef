//! CLI argument definitions using clap
//!
//! Commands:
//! - formentry validate --forms-dir <dir> --form <handle>
//! - formentry submit --forms-dir <dir> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// formentry - validate and store form submissions
#[derive(Parser, Debug)]
#[command(name = "formentry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check a submission read from stdin against a form's field rules
    Validate {
        /// Directory holding forms/ and fields/ definitions
        #[arg(long)]
        forms_dir: Option<PathBuf>,

        /// Handle of the form to validate against
        #[arg(long)]
        form: String,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a submission read from stdin through the pipeline
    Submit {
        /// Directory holding forms/ and fields/ definitions
        #[arg(long)]
        forms_dir: Option<PathBuf>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
