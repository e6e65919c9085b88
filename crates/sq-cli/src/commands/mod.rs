//! Command implementations for the sq CLI

pub mod check;
pub mod common;
pub mod compile;
pub mod run;

pub use check::check_command;
pub use compile::compile_command;
pub use run::run_command;
