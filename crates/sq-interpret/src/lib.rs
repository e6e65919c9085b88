//! Reference interpreter for the control-flow IR.

mod ops;
pub mod source;
pub mod value;
mod vm;

pub use source::{LineSource, MemorySource, RecordSource};
pub use value::{render_value, values_equal, Value};
pub use vm::{OutputBuffer, Vm};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime error: {message}")]
    Runtime { message: String },
    #[error("unsupported operation: {message}")]
    Unsupported { message: String },
    #[error("uncaught exception: {class}")]
    Uncaught { class: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn runtime(message: impl Into<String>) -> Self {
        RuntimeError::Runtime {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        RuntimeError::Unsupported {
            message: message.into(),
        }
    }
}
