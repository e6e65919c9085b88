#[macro_use]
pub mod macros;

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod hir;
pub mod id;
pub mod ir;
pub mod span;
pub mod symbols;
pub mod types;

// Re-export commonly used items for convenience
pub use tracing;

pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
