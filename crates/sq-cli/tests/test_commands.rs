use pretty_assertions::assert_eq;
use sq_cli::cli::CliConfig;
use sq_cli::commands::check::CheckArgs;
use sq_cli::commands::compile::CompileArgs;
use sq_cli::commands::common::pipeline_options;
use sq_cli::commands::{check_command, compile_command};
use sq_cli::CliError;
use sq_core::ast::{Expr, Program, Stmt};
use sq_pipeline::PipelineTarget;
use std::path::Path;

fn write_program(dir: &Path, name: &str, value: Expr) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let program = Program {
        files: vec![format!("{}.sq", name)],
        body: vec![Stmt::expr(Expr::call(Expr::ident("print"), vec![value]))],
    };
    let path = dir.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_string(&program)?)?;
    Ok(path)
}

#[test]
fn compile_defaults_output_next_to_input() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let input = write_program(dir.path(), "hello", Expr::str("hi"))?;
    let args = CompileArgs {
        input,
        output: None,
        print_ir: false,
    };
    compile_command(args, &CliConfig::default(), false)?;
    assert!(dir.path().join("hello.ir").is_file());
    Ok(())
}

#[test]
fn check_reports_failed_cases() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let good = write_program(dir.path(), "good", Expr::int(1))?;
    let bad = write_program(dir.path(), "bad", Expr::ident("missing"))?;
    let err = check_command(
        CheckArgs {
            inputs: vec![bad, good],
        },
        &CliConfig::default(),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, CliError::CasesFailed { failed: 1, total: 1 }));
    Ok(())
}

#[test]
fn missing_input_is_invalid() {
    let err = check_command(
        CheckArgs {
            inputs: vec!["/no/such/input.json".into()],
        },
        &CliConfig::default(),
        false,
    )
    .unwrap_err();
    assert!(matches!(err, CliError::InvalidInput(_)));
}

#[test]
fn config_flows_into_pipeline_options() {
    let mut config = CliConfig::default();
    config.errors.continue_on_error = false;
    config.compile.print_ir = true;
    let options = pipeline_options(&config, PipelineTarget::Check, false);
    assert!(!options.error_tolerance.continue_on_error);
    assert!(options.debug.print_ir);
    assert_eq!(options.target, PipelineTarget::Check);
}
