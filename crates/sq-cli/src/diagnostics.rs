//! Diagnostic and error reporting utilities

use crate::{CliError, Result};
use miette::Diagnostic;
use thiserror::Error;

/// Set up enhanced error reporting with miette
pub fn setup_error_reporting() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .map_err(|e| CliError::Config(format!("Failed to setup error reporting: {}", e)))?;

    Ok(())
}

/// Command failures as shown to the user
#[derive(Error, Debug, Diagnostic)]
pub enum SqError {
    #[error("{message}")]
    #[diagnostic(code(sq::config), help("Check sq.toml for correct syntax and values"))]
    Config { message: String },

    #[error("{message}")]
    #[diagnostic(code(sq::input))]
    Input { message: String },

    #[error("{message}")]
    #[diagnostic(code(sq::pipeline), help("Diagnostics above name the failing stage"))]
    Pipeline { message: String },

    #[error("{failed} of {total} cases failed")]
    #[diagnostic(code(sq::cases), help("Every other case was still processed"))]
    Cases { failed: usize, total: usize },

    #[error("{message}")]
    #[diagnostic(code(sq::io))]
    Io { message: String },
}

impl From<&CliError> for SqError {
    fn from(error: &CliError) -> Self {
        match error {
            CliError::Config(message) => SqError::Config {
                message: message.clone(),
            },
            CliError::InvalidInput(message) => SqError::Input {
                message: message.clone(),
            },
            CliError::Pipeline(err) => SqError::Pipeline {
                message: err.to_string(),
            },
            CliError::CasesFailed { failed, total } => SqError::Cases {
                failed: *failed,
                total: *total,
            },
            CliError::Io(err) => SqError::Io {
                message: err.to_string(),
            },
        }
    }
}

/// Renders `error` through the installed miette handler.
pub fn render_cli_error(error: &CliError) {
    let report = miette::Report::new(SqError::from(error));
    eprintln!("{:?}", report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn case_failures_keep_their_counts() {
        let error = CliError::CasesFailed { failed: 1, total: 3 };
        let diagnostic = SqError::from(&error);
        assert_eq!(diagnostic.to_string(), "1 of 3 cases failed");
        assert_eq!(
            diagnostic.code().map(|code| code.to_string()),
            Some("sq::cases".to_string())
        );
    }
}
