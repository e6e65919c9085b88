//! The stages a unit passes through: `frontend`, `transform`, `codegen`, then
//! `emit` or `execute`.

use crate::cases::Case;
use crate::config::PipelineOptions;
use crate::error::{PipelineDiagnostics, PipelineError};
use crate::pipeline::PipelineStage;
use serde::Deserialize;
use sq_core::ast::Program;
use sq_core::diagnostics::Diagnostic;
use sq_core::hir;
use sq_core::ir::{self, render_module, ModuleBuilder, SourceDecl};
use sq_core::span::{SourceMap, Span};
use sq_core::types::TypeRegistry;
use sq_interpret::{LineSource, OutputBuffer, RecordSource, RuntimeError, Vm};
use sq_optimize::{CodegenVisitor, Transformer};
use sq_stage::{ModuleSpec, SeqModule, DEFAULT_SOURCE};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

pub const FRONTEND: &str = "frontend";
pub const TRANSFORM: &str = "transform";
pub const CODEGEN: &str = "codegen";
pub const EMIT: &str = "emit";
pub const EXECUTE: &str = "execute";

/// Hint for units that are valid JSON but neither a program nor a module.
pub const UNIT_SHAPE: &str =
    "a unit is a program object with a `body` list or a module object with a `main` list";

/// Raw input of the pipeline: one case of an input file.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Name of the input, used for diagnostics and as the module name.
    pub name: String,
    pub case: Case,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrontendUnit {
    Module(ModuleSpec),
    Program(Program),
}

impl FrontendUnit {
    /// Units with a `main` key describe a sequence module, anything else is
    /// a plain program.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("main").is_some() {
            ModuleSpec::deserialize(value).map(FrontendUnit::Module)
        } else {
            Program::deserialize(value).map(FrontendUnit::Program)
        }
    }

    fn files(&self) -> &[String] {
        match self {
            FrontendUnit::Module(spec) => &spec.prelude.files,
            FrontendUnit::Program(program) => &program.files,
        }
    }
}

pub struct ParsedUnit {
    pub name: String,
    pub sources: SourceMap,
    pub unit: FrontendUnit,
}

pub enum LoweredUnit {
    Program {
        transformer: Transformer,
        program: hir::Program,
    },
    Module(SeqModule),
}

pub struct TransformedUnit {
    pub name: String,
    pub sources: SourceMap,
    pub lowered: LoweredUnit,
}

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub name: String,
    pub sources: SourceMap,
    pub module: ir::Module,
}

/// Module name derived from an input name: its file stem, or `main` for
/// stdin.
pub fn module_name(input: &str) -> String {
    Path::new(input)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty() && *stem != DEFAULT_SOURCE)
        .unwrap_or("main")
        .to_string()
}

pub struct FrontendStage;

impl PipelineStage for FrontendStage {
    type SrcCtx = SourceUnit;
    type DstCtx = ParsedUnit;

    fn name(&self) -> &'static str {
        FRONTEND
    }

    fn run(
        &self,
        context: SourceUnit,
        diagnostics: &mut PipelineDiagnostics,
        _options: &PipelineOptions,
    ) -> Result<ParsedUnit, PipelineError> {
        let SourceUnit { name, case } = context;
        let unit = match FrontendUnit::from_json(&case.text) {
            Ok(unit) => unit,
            Err(err) => {
                let mut diagnostic = Diagnostic::error(format!("malformed front-end tree: {}", err))
                    .with_code("syntax");
                // shape errors from an already parsed value carry no position
                if err.line() > 0 {
                    let line = err.line() + case.first_line - 1;
                    let span = Span::new(0, line as u32, err.column() as u32);
                    diagnostic = diagnostic.with_span(span, &SourceMap::new(vec![name.clone()]));
                } else {
                    diagnostic = diagnostic.with_suggestion(UNIT_SHAPE);
                }
                diagnostics.push(diagnostic);
                return Err(PipelineError::new(FRONTEND, err.to_string()));
            }
        };
        let files = unit.files();
        let sources = if files.is_empty() {
            SourceMap::new(vec![name.clone()])
        } else {
            SourceMap::new(files.to_vec())
        };
        let name = match &unit {
            FrontendUnit::Module(spec) => spec.name.clone(),
            FrontendUnit::Program(_) => module_name(&name),
        };
        Ok(ParsedUnit {
            name,
            sources,
            unit,
        })
    }
}

pub struct TransformStage;

impl PipelineStage for TransformStage {
    type SrcCtx = ParsedUnit;
    type DstCtx = TransformedUnit;

    fn name(&self) -> &'static str {
        TRANSFORM
    }

    fn run(
        &self,
        context: ParsedUnit,
        diagnostics: &mut PipelineDiagnostics,
        _options: &PipelineOptions,
    ) -> Result<TransformedUnit, PipelineError> {
        let ParsedUnit {
            name,
            sources,
            unit,
        } = context;
        let lowered = match unit {
            FrontendUnit::Program(program) => {
                let mut transformer = Transformer::new(TypeRegistry::new());
                let program = transformer
                    .transform_program(&program)
                    .map_err(|err| PipelineError::from_core(TRANSFORM, &err, &sources, diagnostics))?;
                LoweredUnit::Program {
                    transformer,
                    program,
                }
            }
            FrontendUnit::Module(spec) => {
                let module = spec
                    .into_module()
                    .map_err(|err| PipelineError::from_core(TRANSFORM, &err, &sources, diagnostics))?;
                LoweredUnit::Module(module)
            }
        };
        Ok(TransformedUnit {
            name,
            sources,
            lowered,
        })
    }
}

pub struct CodegenStage;

impl PipelineStage for CodegenStage {
    type SrcCtx = TransformedUnit;
    type DstCtx = CompiledUnit;

    fn name(&self) -> &'static str {
        CODEGEN
    }

    fn run(
        &self,
        context: TransformedUnit,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<CompiledUnit, PipelineError> {
        let TransformedUnit {
            name,
            sources,
            lowered,
        } = context;
        let module = match lowered {
            LoweredUnit::Program {
                transformer,
                program,
            } => {
                let mut builder = ModuleBuilder::new(name.clone());
                {
                    let mut codegen = CodegenVisitor::new(&mut builder, transformer.cache());
                    codegen
                        .emit_program("main", &program, transformer.args_global())
                        .map_err(|err| PipelineError::from_core(CODEGEN, &err, &sources, diagnostics))?;
                }
                builder.finish()
            }
            LoweredUnit::Module(mut module) => module
                .compile()
                .map_err(|err| PipelineError::from_core(CODEGEN, &err, &sources, diagnostics))?,
        };
        verify(&module, diagnostics)?;
        if options.debug.print_ir {
            tracing::info!("[codegen] {}\n{}", name, render_module(&module));
        }
        Ok(CompiledUnit {
            name,
            sources,
            module,
        })
    }
}

pub(crate) fn verify(module: &ir::Module, diagnostics: &mut PipelineDiagnostics) -> Result<(), PipelineError> {
    module.verify().map_err(|message| {
        diagnostics.push(Diagnostic::error(message.clone()).with_code("invalid-ir"));
        PipelineError::new(CODEGEN, message)
    })
}

pub struct EmitStage {
    pub output: PathBuf,
}

impl PipelineStage for EmitStage {
    type SrcCtx = CompiledUnit;
    type DstCtx = PathBuf;

    fn name(&self) -> &'static str {
        EMIT
    }

    fn run(
        &self,
        context: CompiledUnit,
        diagnostics: &mut PipelineDiagnostics,
        _options: &PipelineOptions,
    ) -> Result<PathBuf, PipelineError> {
        write_module(&context.module, &self.output).map_err(|err| {
            let message = format!("cannot write {}: {}", self.output.display(), err);
            diagnostics.push(Diagnostic::error(message.clone()).with_code("io"));
            PipelineError::new(EMIT, message)
        })?;
        tracing::info!("[emit] wrote {}", self.output.display());
        Ok(self.output.clone())
    }
}

/// Renders `module` as text, or as JSON when `path` ends in `.json`.
pub fn render_output(module: &ir::Module, path: &Path) -> io::Result<String> {
    let json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if json {
        let mut text = serde_json::to_string_pretty(module)?;
        text.push('\n');
        Ok(text)
    } else {
        Ok(render_module(module))
    }
}

/// Writes through a temporary sibling of `path` so a failure never leaves
/// a partial file behind.
pub fn write_module(module: &ir::Module, path: &Path) -> io::Result<()> {
    let text = render_output(module, path)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Where executed programs print.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    Buffer(OutputBuffer),
}

pub struct ExecuteStage {
    pub args: Vec<String>,
    pub output: OutputSink,
}

impl PipelineStage for ExecuteStage {
    type SrcCtx = CompiledUnit;
    type DstCtx = ();

    fn name(&self) -> &'static str {
        EXECUTE
    }

    fn run(
        &self,
        context: CompiledUnit,
        diagnostics: &mut PipelineDiagnostics,
        _options: &PipelineOptions,
    ) -> Result<(), PipelineError> {
        let sources = open_sources(&context.module.sources).map_err(|err| {
            diagnostics.push(Diagnostic::error(err.clone()).with_code("io"));
            PipelineError::new(EXECUTE, err)
        })?;
        let vm = Vm::new(&context.module)
            .with_args(self.args.clone())
            .with_sources(sources);
        let result = match &self.output {
            OutputSink::Stdout => vm.with_output(io::stdout()).run_main(),
            OutputSink::Buffer(buffer) => vm.with_output(buffer.clone()).run_main(),
        };
        result
            .map(|_| ())
            .map_err(|err| runtime_failure(&err, diagnostics))
    }
}

pub(crate) fn runtime_failure(err: &RuntimeError, diagnostics: &mut PipelineDiagnostics) -> PipelineError {
    let code = match err {
        RuntimeError::Uncaught { .. } => "uncaught",
        RuntimeError::Unsupported { .. } => "unsupported",
        RuntimeError::Io(_) => "io",
        RuntimeError::Runtime { .. } => "runtime",
    };
    diagnostics.push(Diagnostic::error(err.to_string()).with_code(code));
    PipelineError::new(EXECUTE, err.to_string())
}

/// Opens every declared source in order: `-` reads stdin, anything else
/// names a file read line by line.
pub fn open_sources(decls: &[SourceDecl]) -> Result<Vec<Box<dyn RecordSource>>, String> {
    decls
        .iter()
        .map(|decl| -> Result<Box<dyn RecordSource>, String> {
            if decl.name == DEFAULT_SOURCE {
                return Ok(Box::new(LineSource::new(BufReader::new(io::stdin()))));
            }
            let file =
                File::open(&decl.name).map_err(|err| format!("cannot open source `{}`: {}", decl.name, err))?;
            Ok(Box::new(LineSource::new(BufReader::new(file))))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn module_names_come_from_the_file_stem() {
        assert_eq!(module_name("dir/reads.json"), "reads");
        assert_eq!(module_name("-"), "main");
        assert_eq!(module_name(""), "main");
    }

    #[test]
    fn units_with_main_are_modules() -> Result<(), serde_json::Error> {
        let unit = FrontendUnit::from_json(r#"{"name": "m", "main": []}"#)?;
        assert!(matches!(unit, FrontendUnit::Module(_)));
        let unit = FrontendUnit::from_json(r#"{"files": ["a.sq"], "body": []}"#)?;
        assert_eq!(
            unit,
            FrontendUnit::Program(Program {
                files: vec!["a.sq".into()],
                body: vec![],
            })
        );
        Ok(())
    }

    #[test]
    fn json_extension_selects_json_output() -> io::Result<()> {
        let module = ir::Module::new("m");
        let text = render_output(&module, Path::new("out.JSON"))?;
        assert!(text.trim_start().starts_with('{'));
        let text = render_output(&module, Path::new("out.ir"))?;
        assert_eq!(text, render_module(&module));
        Ok(())
    }
}
