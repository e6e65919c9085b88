//! Command-line front of the sq compiler: configuration, commands and
//! error reporting.

pub mod cli;
pub mod commands;
pub mod diagnostics;

pub mod error {
    use sq_pipeline::PipelineError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CliError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Configuration error: {0}")]
        Config(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error(transparent)]
        Pipeline(#[from] PipelineError),

        #[error("{failed} of {total} cases failed")]
        CasesFailed { failed: usize, total: usize },
    }

    pub type Result<T> = std::result::Result<T, CliError>;
}

pub use error::{CliError, Result};
