use crate::cases::{split_cases, Case};
use crate::config::{PipelineOptions, PipelineTarget};
use crate::error::{PipelineDiagnostics, PipelineError};
use crate::pipeline::PipelineBuilder;
use crate::stages::{
    open_sources, runtime_failure, verify, write_module, CodegenStage, EmitStage, ExecuteStage,
    FrontendStage, OutputSink, SourceUnit, TransformStage, CODEGEN, EMIT, EXECUTE, FRONTEND,
    UNIT_SHAPE,
};
use sq_core::diagnostics::{Diagnostic, DiagnosticDisplayOptions, DiagnosticManager};
use sq_core::ir;
use sq_core::span::SourceMap;
use sq_interpret::{OutputBuffer, RecordSource, Vm};
use sq_stage::SeqModule;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Checked,
    Compiled { path: PathBuf },
    Executed,
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub index: usize,
    pub outcome: Result<Outcome, PipelineError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CaseReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-case outcomes of one driver run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.cases.iter().all(CaseReport::is_success)
    }

    pub fn failures(&self) -> usize {
        self.cases.iter().filter(|case| !case.is_success()).count()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.cases.iter().flat_map(|case| case.diagnostics.iter())
    }

    /// Diagnostics of every case followed, for multi-case inputs, by one
    /// status line per case.
    pub fn render(&self, options: &DiagnosticDisplayOptions) -> Vec<String> {
        let mut lines = Vec::new();
        for case in &self.cases {
            lines.extend(DiagnosticManager::render(&case.diagnostics, None, options));
        }
        if self.cases.len() > 1 {
            for case in &self.cases {
                let status = match &case.outcome {
                    Ok(_) => "ok".to_string(),
                    Err(err) => format!("failed in {}", err.stage),
                };
                lines.push(format!("{} case {}: {}", self.name, case.index, status));
            }
        }
        lines
    }

    pub fn emit(&self, options: &DiagnosticDisplayOptions) {
        for line in self.render(options) {
            eprintln!("{}", line);
        }
    }
}

/// Runs every case of an input through the stage pipeline selected by the
/// options.
pub struct Driver {
    options: PipelineOptions,
    output: OutputSink,
}

impl Driver {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            output: OutputSink::Stdout,
        }
    }

    /// Captures what executed units print instead of writing to stdout.
    pub fn with_output(mut self, buffer: OutputBuffer) -> Self {
        self.output = OutputSink::Buffer(buffer);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn run_file(&self, path: &Path) -> Result<Report, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| PipelineError::new(FRONTEND, format!("cannot read {}: {}", path.display(), err)))?;
        Ok(self.run_text(&path.display().to_string(), &text))
    }

    pub fn run_text(&self, name: &str, text: &str) -> Report {
        let cases = split_cases(text);
        let multiple = cases.len() > 1;
        let mut report = Report {
            name: name.to_string(),
            cases: Vec::with_capacity(cases.len()),
        };
        if cases.is_empty() {
            report.cases.push(CaseReport {
                index: 1,
                outcome: Err(PipelineError::new(FRONTEND, "input is empty")),
                diagnostics: vec![Diagnostic::error(format!("{} holds no units", name))
                    .with_source_context(FRONTEND)
                    .with_suggestion(UNIT_SHAPE)],
            });
            return report;
        }
        for case in cases {
            if self.options.error_tolerance.should_stop(report.failures()) {
                tracing::warn!("[driver] stopping before case {} of {}", case.index, name);
                break;
            }
            report.cases.push(self.run_case(name, case, multiple));
        }
        report
    }

    fn run_case(&self, name: &str, case: Case, multiple: bool) -> CaseReport {
        let index = case.index;
        tracing::info!("[driver] {} case {}: {}", name, index, self.options.target.as_str());
        let unit = SourceUnit {
            name: name.to_string(),
            case,
        };
        let mut diagnostics = PipelineDiagnostics::default();
        let front = PipelineBuilder::new()
            .add_stage(FrontendStage)
            .add_stage(TransformStage)
            .add_stage(CodegenStage);
        let outcome = match &self.options.target {
            PipelineTarget::Check => front
                .build()
                .run(unit, &mut diagnostics, &self.options)
                .map(|_| Outcome::Checked),
            PipelineTarget::Compile { output } => {
                let output = case_output(output, index, multiple);
                front
                    .add_stage(EmitStage { output })
                    .build()
                    .run(unit, &mut diagnostics, &self.options)
                    .map(|path| Outcome::Compiled { path })
            }
            PipelineTarget::Execute { args } => front
                .add_stage(ExecuteStage {
                    args: args.clone(),
                    output: self.output.clone(),
                })
                .build()
                .run(unit, &mut diagnostics, &self.options)
                .map(|()| Outcome::Executed),
        };
        if let Err(err) = &outcome {
            if !diagnostics.has_errors() {
                diagnostics.push(Diagnostic::error(err.message.clone()).with_source_context(err.stage));
            }
        }
        CaseReport {
            index,
            outcome,
            diagnostics: diagnostics.into_items(),
        }
    }
}

/// `out.ir` becomes `out.2.ir` for the second of several cases.
pub fn case_output(output: &Path, index: usize, multiple: bool) -> PathBuf {
    if !multiple {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}.{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}.{}", stem, index),
    };
    output.with_file_name(name)
}

fn compile_module(module: &mut SeqModule, diagnostics: &mut PipelineDiagnostics) -> Result<ir::Module, PipelineError> {
    let sources = SourceMap::new(module.prelude().files.clone());
    let mark = diagnostics.items.len();
    let compiled = module
        .compile()
        .map_err(|err| PipelineError::from_core(CODEGEN, &err, &sources, diagnostics))
        .and_then(|compiled| verify(&compiled, diagnostics).map(|()| compiled));
    diagnostics.tag_stage(mark, CODEGEN);
    compiled
}

/// Compiles `module` and writes its IR to `output`.
pub fn compile(
    module: &mut SeqModule,
    output: &Path,
    diagnostics: &mut PipelineDiagnostics,
) -> Result<(), PipelineError> {
    let compiled = compile_module(module, diagnostics)?;
    write_module(&compiled, output).map_err(|err| {
        let message = format!("cannot write {}: {}", output.display(), err);
        diagnostics.push(
            Diagnostic::error(message.clone())
                .with_code("io")
                .with_source_context(EMIT),
        );
        PipelineError::new(EMIT, message)
    })
}

/// Compiles `module` and runs it over the sources it declares.
pub fn execute(
    module: &mut SeqModule,
    args: Vec<String>,
    diagnostics: &mut PipelineDiagnostics,
) -> Result<(), PipelineError> {
    let compiled = compile_module(module, diagnostics)?;
    let sources = open_sources(&compiled.sources).map_err(|err| {
        diagnostics.push(
            Diagnostic::error(err.clone())
                .with_code("io")
                .with_source_context(EXECUTE),
        );
        PipelineError::new(EXECUTE, err)
    })?;
    run_compiled(&compiled, args, sources, std::io::stdout(), diagnostics)
}

/// [`execute`] with caller-provided readers and output.
pub fn execute_with_sources(
    module: &mut SeqModule,
    args: Vec<String>,
    sources: Vec<Box<dyn RecordSource>>,
    out: impl Write,
    diagnostics: &mut PipelineDiagnostics,
) -> Result<(), PipelineError> {
    let compiled = compile_module(module, diagnostics)?;
    run_compiled(&compiled, args, sources, out, diagnostics)
}

fn run_compiled(
    compiled: &ir::Module,
    args: Vec<String>,
    sources: Vec<Box<dyn RecordSource>>,
    out: impl Write,
    diagnostics: &mut PipelineDiagnostics,
) -> Result<(), PipelineError> {
    let mark = diagnostics.items.len();
    let result = Vm::new(compiled)
        .with_args(args)
        .with_sources(sources)
        .with_output(out)
        .run_main()
        .map(|_| ())
        .map_err(|err| runtime_failure(&err, diagnostics));
    diagnostics.tag_stage(mark, EXECUTE);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_case_output_is_unchanged() {
        assert_eq!(case_output(Path::new("a/out.ir"), 1, false), PathBuf::from("a/out.ir"));
    }

    #[test]
    fn multiple_cases_get_numbered_outputs() {
        assert_eq!(case_output(Path::new("a/out.json"), 2, true), PathBuf::from("a/out.2.json"));
        assert_eq!(case_output(Path::new("out"), 3, true), PathBuf::from("out.3"));
    }

    #[test]
    fn empty_input_is_a_failure() {
        let report = Driver::new(PipelineOptions::check()).run_text("empty.json", "\n\n");
        assert!(!report.is_success());
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn misshapen_units_carry_a_hint() {
        let report = Driver::new(PipelineOptions::check()).run_text("shape.json", r#"{"body": 3}"#);
        assert_eq!(report.failures(), 1);
        let diagnostic = &report.cases[0].diagnostics[0];
        assert_eq!(diagnostic.code.as_deref(), Some("syntax"));
        assert!(diagnostic.location.is_none());
        assert_eq!(diagnostic.suggestions, vec![UNIT_SHAPE.to_string()]);
    }

    #[test]
    fn failures_are_reported_per_case() {
        let mut report = Report {
            name: "in.json".into(),
            cases: vec![],
        };
        report.cases.push(CaseReport {
            index: 1,
            outcome: Ok(Outcome::Checked),
            diagnostics: vec![],
        });
        report.cases.push(CaseReport {
            index: 2,
            outcome: Err(PipelineError::new("transform", "bad")),
            diagnostics: vec![Diagnostic::error("bad").with_source_context("transform")],
        });
        let lines = report.render(&DiagnosticDisplayOptions::plain(false));
        assert_eq!(
            lines,
            vec![
                "[transform] ERROR: bad".to_string(),
                "in.json case 1: ok".to_string(),
                "in.json case 2: failed in transform".to_string(),
            ]
        );
    }

    #[test]
    fn info_needs_verbose_display() {
        let report = Report {
            name: "x".into(),
            cases: vec![CaseReport {
                index: 1,
                outcome: Ok(Outcome::Checked),
                diagnostics: vec![Diagnostic::info("note")],
            }],
        };
        assert!(report.render(&DiagnosticDisplayOptions::plain(false)).is_empty());
        assert_eq!(report.render(&DiagnosticDisplayOptions::plain(true)).len(), 1);
    }
}
