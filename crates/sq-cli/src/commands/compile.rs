//! Compile command implementation.

use crate::commands::common::{pipeline_options, print_ok, run_input};
use crate::{cli::CliConfig, Result};
use clap::Args;
use sq_pipeline::PipelineTarget;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments for the compile command
#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    /// Front-end file to compile
    pub input: PathBuf,

    /// Output file; `.json` selects JSON output
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log the generated IR
    #[arg(long)]
    pub print_ir: bool,
}

/// Output used when `-o` is not given: the input with its extension
/// replaced.
pub fn default_output(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

pub fn compile_command(args: CompileArgs, config: &CliConfig, verbose: bool) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input, &config.compile.extension));
    info!("Compiling '{}' to '{}'", args.input.display(), output.display());

    let mut options = pipeline_options(config, PipelineTarget::Compile { output }, verbose);
    options.debug.print_ir |= args.print_ir;
    run_input(&args.input, options)?;
    print_ok("compiled", &args.input);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_output_swaps_the_extension() {
        assert_eq!(default_output(Path::new("dir/prog.json"), "ir"), PathBuf::from("dir/prog.ir"));
    }
}
