//! Code checking and validation command implementation

use crate::commands::common::{pipeline_options, print_ok, run_input};
use crate::{cli::CliConfig, Result};
use clap::Args;
use sq_pipeline::PipelineTarget;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the check command
#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    /// Front-end files to check
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Type-checks and generates code for every input without writing output.
/// All inputs are checked even when an earlier one fails.
pub fn check_command(args: CheckArgs, config: &CliConfig, verbose: bool) -> Result<()> {
    let mut first_error = None;
    for input in &args.inputs {
        info!("Checking '{}'", input.display());
        let options = pipeline_options(config, PipelineTarget::Check, verbose);
        match run_input(input, options) {
            Ok(_) => print_ok("checked", input),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
