use sq_core::diagnostics::DiagnosticDisplayOptions;
use std::path::PathBuf;

/// Configuration for one driver run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// What to do with a unit once it compiles
    pub target: PipelineTarget,
    /// Debug options
    pub debug: DebugOptions,
    /// Error tolerance options
    pub error_tolerance: ErrorToleranceOptions,
    /// How collected diagnostics are rendered
    pub display: DiagnosticDisplayOptions,
}

impl PipelineOptions {
    pub fn new(target: PipelineTarget) -> Self {
        Self {
            target,
            debug: DebugOptions::default(),
            error_tolerance: ErrorToleranceOptions::default(),
            display: DiagnosticDisplayOptions::default(),
        }
    }

    pub fn check() -> Self {
        Self::new(PipelineTarget::Check)
    }

    pub fn compile(output: impl Into<PathBuf>) -> Self {
        Self::new(PipelineTarget::Compile {
            output: output.into(),
        })
    }

    pub fn execute(args: Vec<String>) -> Self {
        Self::new(PipelineTarget::Execute { args })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineTarget {
    /// Stop after code generation
    Check,
    /// Write the IR to `output` (JSON when it ends in `.json`)
    Compile { output: PathBuf },
    /// Run the entry function with `args`
    Execute { args: Vec<String> },
}

impl PipelineTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineTarget::Check => "check",
            PipelineTarget::Compile { .. } => "compile",
            PipelineTarget::Execute { .. } => "execute",
        }
    }
}

/// Debug options
#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    /// Show info-level diagnostics
    pub verbose: bool,
    /// Log the rendered IR of every unit
    pub print_ir: bool,
}

/// Error tolerance configuration
#[derive(Debug, Clone)]
pub struct ErrorToleranceOptions {
    /// Keep running later cases after one fails
    pub continue_on_error: bool,
    /// Stop once this many cases failed (0 = unlimited)
    pub max_errors: usize,
}

impl Default for ErrorToleranceOptions {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            max_errors: 0,
        }
    }
}

impl ErrorToleranceOptions {
    pub(crate) fn should_stop(&self, failures: usize) -> bool {
        if failures == 0 {
            return false;
        }
        !self.continue_on_error || (self.max_errors > 0 && failures >= self.max_errors)
    }
}
