use crate::span::Span;
use std::result;
use thiserror::Error;

/// Failure categories of the compiler middle end. Each variant carries the
/// span of the offending node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("not found: {message}")]
    NotFound { span: Span, message: String },
    #[error("type mismatch: {message}")]
    TypeMismatch { span: Span, message: String },
    #[error("structural error: {message}")]
    Structural { span: Span, message: String },
    #[error("arity error: {message}")]
    Arity { span: Span, message: String },
    #[error("io error: {0}")]
    Io(String),
    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn not_found(span: Span, message: impl Into<String>) -> Self {
        Error::NotFound {
            span,
            message: message.into(),
        }
    }

    pub fn type_mismatch(span: Span, message: impl Into<String>) -> Self {
        Error::TypeMismatch {
            span,
            message: message.into(),
        }
    }

    pub fn structural(span: Span, message: impl Into<String>) -> Self {
        Error::Structural {
            span,
            message: message.into(),
        }
    }

    pub fn arity(span: Span, message: impl Into<String>) -> Self {
        Error::Arity {
            span,
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Error::NotFound { span, .. }
            | Error::TypeMismatch { span, .. }
            | Error::Structural { span, .. }
            | Error::Arity { span, .. } => Some(*span),
            Error::Io(_) | Error::Generic(_) => None,
        }
    }

    /// Short machine-readable code used by diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not-found",
            Error::TypeMismatch { .. } => "type-mismatch",
            Error::Structural { .. } => "structural",
            Error::Arity { .. } => "arity",
            Error::Io(_) => "io",
            Error::Generic(_) => "generic",
        }
    }

    /// The message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::NotFound { message, .. }
            | Error::TypeMismatch { message, .. }
            | Error::Structural { message, .. }
            | Error::Arity { message, .. } => message,
            Error::Io(message) | Error::Generic(message) => message,
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Generic(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_carries_span_and_code() {
        let err = Error::arity(Span::new(0, 3, 7), "expected 2 arguments, got 1");
        assert_eq!(err.span(), Some(Span::new(0, 3, 7)));
        assert_eq!(err.code(), "arity");
        assert_eq!(err.to_string(), "arity error: expected 2 arguments, got 1");
    }

    #[test]
    fn eyre_reports_become_generic() {
        let err: Error = eyre::eyre!("boom").into();
        assert_eq!(err.span(), None);
        assert_eq!(err.message(), "boom");
    }
}
