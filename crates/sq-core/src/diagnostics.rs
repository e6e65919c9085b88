use crate::error::Error;
use crate::span::{SourceMap, Span};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

/// Built-in templates supported by the diagnostic manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticTemplate {
    Pretty,
    Plain,
}

/// Runtime configuration for emitting diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticDisplayOptions {
    pub template: DiagnosticTemplate,
    pub verbose_info: bool,
}

impl DiagnosticDisplayOptions {
    pub fn pretty(verbose_info: bool) -> Self {
        Self {
            template: DiagnosticTemplate::Pretty,
            verbose_info,
        }
    }

    pub fn plain(verbose_info: bool) -> Self {
        Self {
            template: DiagnosticTemplate::Plain,
            verbose_info,
        }
    }
}

impl Default for DiagnosticDisplayOptions {
    fn default() -> Self {
        DiagnosticDisplayOptions::pretty(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub suggestions: Vec<String>,
    pub source_context: Option<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    fn with_level(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            location: None,
            suggestions: Vec::new(),
            source_context: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(DiagnosticLevel::Info, message)
    }

    /// Resolves the span against the source map. Null spans are dropped.
    pub fn with_span(mut self, span: Span, sources: &SourceMap) -> Self {
        if !span.is_null() {
            self.location = Some(SourceLocation {
                file: sources.file_name(span.file).to_string(),
                line: span.line,
                column: span.col,
            });
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_source_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn from_error(error: &Error, sources: &SourceMap) -> Self {
        let diagnostic = Diagnostic::error(error.to_string()).with_code(error.code());
        match error.span() {
            Some(span) => diagnostic.with_span(span, sources),
            None => diagnostic,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticManager {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_diagnostic(&self, diagnostic: Diagnostic) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.push(diagnostic);
        }
    }

    pub fn add_diagnostics(&self, mut new_diagnostics: Vec<Diagnostic>) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.append(&mut new_diagnostics);
        }
    }

    pub fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .lock()
            .map(|d| d.iter().any(|diag| diag.level == DiagnosticLevel::Error))
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut diagnostics) = self.diagnostics.lock() {
            diagnostics.clear();
        }
    }

    /// Render diagnostics to lines. The fallback context is used when a
    /// diagnostic does not name one.
    pub fn render(
        diagnostics: &[Diagnostic],
        fallback_context: Option<&str>,
        options: &DiagnosticDisplayOptions,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for diagnostic in diagnostics {
            if diagnostic.level == DiagnosticLevel::Info && !options.verbose_info {
                continue;
            }
            let context = diagnostic
                .source_context
                .as_deref()
                .or(fallback_context)
                .unwrap_or("sq");
            match options.template {
                DiagnosticTemplate::Pretty => render_pretty(&mut lines, diagnostic, context),
                DiagnosticTemplate::Plain => render_plain(&mut lines, diagnostic, context),
            }
        }
        lines
    }

    pub fn emit(
        diagnostics: &[Diagnostic],
        fallback_context: Option<&str>,
        options: &DiagnosticDisplayOptions,
    ) {
        for line in Self::render(diagnostics, fallback_context, options) {
            eprintln!("{}", line);
        }
    }
}

fn render_pretty(lines: &mut Vec<String>, diagnostic: &Diagnostic, context: &str) {
    let prefix = match diagnostic.level {
        DiagnosticLevel::Error => "error",
        DiagnosticLevel::Warning => "warning",
        DiagnosticLevel::Info => "info",
    };
    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("{}[{}] [{}] {}", prefix, code, context, diagnostic.message),
        None => format!("{} [{}] {}", prefix, context, diagnostic.message),
    };
    lines.push(header);
    if let Some(location) = &diagnostic.location {
        lines.push(format!("   --> {}", location));
    }
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("   help: {}", suggestion));
    }
}

fn render_plain(lines: &mut Vec<String>, diagnostic: &Diagnostic, context: &str) {
    let level = match diagnostic.level {
        DiagnosticLevel::Error => "ERROR",
        DiagnosticLevel::Warning => "WARNING",
        DiagnosticLevel::Info => "INFO",
    };
    let header = match diagnostic.code.as_ref() {
        Some(code) => format!("[{}] {}: {} ({})", context, level, diagnostic.message, code),
        None => format!("[{}] {}: {}", context, level, diagnostic.message),
    };
    lines.push(header);
    if let Some(location) = &diagnostic.location {
        lines.push(format!("   at {}", location));
    }
    for suggestion in &diagnostic.suggestions {
        lines.push(format!("   suggestion: {}", suggestion));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_becomes_located_diagnostic() {
        let sources = SourceMap::new(vec!["main.sq".into()]);
        let error = Error::not_found(Span::new(0, 4, 2), "unknown name `foo`");
        let diagnostic = Diagnostic::from_error(&error, &sources);
        assert_eq!(
            diagnostic.location,
            Some(SourceLocation {
                file: "main.sq".into(),
                line: 4,
                column: 2
            })
        );
        assert_eq!(diagnostic.code.as_deref(), Some("not-found"));
    }

    #[test]
    fn plain_template_lists_location() {
        let sources = SourceMap::new(vec!["a.sq".into()]);
        let diagnostic = Diagnostic::error("bad")
            .with_span(Span::new(0, 1, 9), &sources)
            .with_suggestion("try harder");
        let lines = DiagnosticManager::render(
            &[diagnostic],
            Some("transform"),
            &DiagnosticDisplayOptions::plain(false),
        );
        assert_eq!(
            lines,
            vec![
                "[transform] ERROR: bad".to_string(),
                "   at a.sq:1:9".to_string(),
                "   suggestion: try harder".to_string(),
            ]
        );
    }

    #[test]
    fn info_is_hidden_unless_verbose() {
        let lines = DiagnosticManager::render(
            &[Diagnostic::info("note")],
            None,
            &DiagnosticDisplayOptions::pretty(false),
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn manager_tracks_errors() {
        let manager = DiagnosticManager::new();
        manager.add_diagnostic(Diagnostic::warning("w"));
        assert!(!manager.has_errors());
        manager.add_diagnostic(Diagnostic::error("e"));
        assert!(manager.has_errors());
        assert_eq!(manager.get_diagnostics().len(), 2);
    }
}
