//! Run command implementation.

use crate::commands::common::{pipeline_options, run_input};
use crate::{cli::CliConfig, Result};
use clap::Args;
use sq_pipeline::PipelineTarget;
use std::path::PathBuf;
use tracing::info;

/// Arguments for the run command
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Front-end file to run
    pub input: PathBuf,

    /// Arguments handed to the program
    #[arg(last = true)]
    pub args: Vec<String>,
}

pub fn run_command(args: RunArgs, config: &CliConfig, verbose: bool) -> Result<()> {
    info!("Running file '{}'", args.input.display());
    let options = pipeline_options(config, PipelineTarget::Execute { args: args.args }, verbose);
    run_input(&args.input, options)?;
    Ok(())
}
