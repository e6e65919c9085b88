use crate::cli::CliConfig;
use crate::{CliError, Result};
use console::style;
use sq_pipeline::{Driver, PipelineOptions, PipelineTarget, Report};
use std::path::{Path, PathBuf};

pub fn validate_paths_exist(inputs: &[PathBuf], must_be_files: bool) -> Result<()> {
    for input in inputs {
        if !input.exists() {
            return Err(CliError::InvalidInput(format!(
                "Input path does not exist: {}",
                input.display()
            )));
        }
        if must_be_files && !input.is_file() {
            return Err(CliError::InvalidInput(format!(
                "Input path is not a file: {}",
                input.display()
            )));
        }
    }
    Ok(())
}

/// Pipeline options for `target` with the configured diagnostics and error
/// tolerance applied.
pub fn pipeline_options(config: &CliConfig, target: PipelineTarget, verbose: bool) -> PipelineOptions {
    let mut options = PipelineOptions::new(target);
    options.debug.verbose = verbose || config.diagnostics.verbose;
    options.debug.print_ir = config.compile.print_ir;
    options.error_tolerance.continue_on_error = config.errors.continue_on_error;
    options.error_tolerance.max_errors = config.errors.max_errors;
    options.display = config.diagnostics.display_options(verbose);
    options
}

/// Runs `input` through a driver, prints the report and turns failed
/// cases into an error.
pub fn run_input(input: &Path, options: PipelineOptions) -> Result<Report> {
    validate_paths_exist(&[input.to_path_buf()], true)?;
    let display = options.display;
    let report = Driver::new(options).run_file(input)?;
    report.emit(&display);
    finish(report)
}

pub fn finish(report: Report) -> Result<Report> {
    let failed = report.failures();
    if failed > 0 {
        return Err(CliError::CasesFailed {
            failed,
            total: report.cases.len(),
        });
    }
    Ok(report)
}

pub fn print_ok(verb: &str, input: &Path) {
    eprintln!("{} {} {}", style("ok").green().bold(), verb, input.display());
}
