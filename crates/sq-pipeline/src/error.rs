use sq_core::diagnostics::{Diagnostic, DiagnosticLevel};
use sq_core::span::SourceMap;
use thiserror::Error;

/// Diagnostics collected while a unit moves through the stages.
#[derive(Debug, Default, Clone)]
pub struct PipelineDiagnostics {
    pub items: Vec<Diagnostic>,
}

impl PipelineDiagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        self.items.extend(diagnostics);
    }

    /// Names `stage` as the context of every diagnostic added since `from`.
    pub fn tag_stage(&mut self, from: usize, stage: &'static str) {
        for diagnostic in self.items.iter_mut().skip(from) {
            if diagnostic.source_context.is_none() {
                diagnostic.source_context = Some(stage.to_string());
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error)
    }

    pub fn into_items(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{stage}] {message}")]
pub struct PipelineError {
    pub stage: &'static str,
    pub message: String,
}

impl PipelineError {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Records `error` as a located diagnostic and turns it into the stage
    /// failure.
    pub fn from_core(
        stage: &'static str,
        error: &sq_core::Error,
        sources: &SourceMap,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Self {
        diagnostics.push(Diagnostic::from_error(error, sources));
        Self::new(stage, error.to_string())
    }
}
