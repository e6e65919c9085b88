//! sq CLI Binary
//!
//! # Usage
//!
//! ```bash
//! # Write the IR of a front-end tree
//! sq compile reads.json -o reads.ir
//!
//! # Run it, handing `a b` to the program
//! sq run reads.json -- a b
//!
//! # Type-check only
//! sq check reads.json other.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use sq_cli::{
    cli::CliConfig,
    commands::{self, check::CheckArgs, compile::CompileArgs, run::RunArgs},
    diagnostics::{render_cli_error, setup_error_reporting},
    Result,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "sq",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compiler middle end for sequence-processing programs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Set log level (overrides --verbose/--quiet)
    #[arg(long, global = true, value_enum)]
    log: Option<LogLevel>,

    /// Set log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a front-end tree to IR
    Compile(CompileArgs),

    /// Compile and execute a front-end tree
    Run(RunArgs),

    /// Type-check and lower without writing output
    Check(CheckArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        render_cli_error(&e);
        if cli.verbose > 0 {
            error!(?e, "detailed error context");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    setup_error_reporting()?;
    setup_logging(cli.verbose, cli.quiet, cli.log, cli.log_format);

    let config = CliConfig::load(cli.config.as_deref())?;
    let verbose = cli.verbose > 0;

    match &cli.command {
        Commands::Compile(args) => commands::compile_command(args.clone(), &config, verbose)?,
        Commands::Run(args) => commands::run_command(args.clone(), &config, verbose)?,
        Commands::Check(args) => commands::check_command(args.clone(), &config, verbose)?,
    }
    if verbose {
        info!("Command completed successfully");
    }
    Ok(())
}

fn setup_logging(verbose: u8, quiet: bool, log_level: Option<LogLevel>, log_format: LogFormat) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if let Some(level) = log_level {
        EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        })
    } else if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true);

    match log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(formatter).with(filter).init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(formatter.json())
                .with(filter)
                .init();
        }
    }
}
