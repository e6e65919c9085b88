//! Driver that takes front-end trees through transform and code generation
//! and then emits or executes the resulting IR.

pub mod cases;
pub mod config;
pub mod driver;
pub mod error;
pub mod pipeline;
pub mod stages;

pub use config::{DebugOptions, ErrorToleranceOptions, PipelineOptions, PipelineTarget};
pub use driver::{compile, execute, execute_with_sources, CaseReport, Driver, Outcome, Report};
pub use error::{PipelineDiagnostics, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
