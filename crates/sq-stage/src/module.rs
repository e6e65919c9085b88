use crate::aggregator::{Aggregator, Phase};
use crate::emit::{LoweredPhases, PhaseEmitter};
use crate::lower::{lower_pipeline, LoweredPipeline, SlotTypes};
use crate::pipeline::Pipeline;
use sq_core::ast::Program;
use sq_core::id::FuncId;
use sq_core::ir::{IrBuilder, Module, ModuleBuilder, SourceDecl};
use sq_core::span::Span;
use sq_core::types::{SeqKind, Type, TypeRegistry};
use sq_core::{structural, Result};
use sq_optimize::{CodegenVisitor, Transformer};

/// Source read when a module registers none.
pub const DEFAULT_SOURCE: &str = "-";

/// A program made of three phase aggregators over a set of record sources.
pub struct SeqModule {
    name: String,
    prelude: Program,
    sources: Vec<SourceDecl>,
    sealed: bool,
    pub once: Aggregator,
    pub main: Aggregator,
    pub last: Aggregator,
}

impl SeqModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prelude: Program::default(),
            sources: Vec::new(),
            sealed: false,
            once: Aggregator::new(Phase::Once),
            main: Aggregator::new(Phase::Main),
            last: Aggregator::new(Phase::Last),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prelude(&self) -> &Program {
        &self.prelude
    }

    /// Statements run before the `once` phase. Their definitions and
    /// module variables are visible to every stage.
    pub fn set_prelude(&mut self, program: Program) -> Result<()> {
        self.ensure_open("the prelude")?;
        self.prelude = program;
        Ok(())
    }

    pub fn source(&mut self, name: impl Into<String>, kind: SeqKind) -> Result<()> {
        self.ensure_open("a source")?;
        self.sources.push(SourceDecl {
            name: name.into(),
            kind,
        });
        Ok(())
    }

    /// Sources in reading order, falling back to [`DEFAULT_SOURCE`].
    pub fn sources(&self) -> Vec<SourceDecl> {
        if self.sources.is_empty() {
            vec![SourceDecl {
                name: DEFAULT_SOURCE.to_string(),
                kind: SeqKind::Str,
            }]
        } else {
            self.sources.clone()
        }
    }

    pub fn aggregator(&mut self, phase: Phase) -> &mut Aggregator {
        match phase {
            Phase::Once => &mut self.once,
            Phase::Main => &mut self.main,
            Phase::Last => &mut self.last,
        }
    }

    /// `module | pipeline` attaches to `main`.
    pub fn add(&mut self, pipeline: impl Into<Pipeline>) -> Result<usize> {
        self.main.add(pipeline)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Lowers and emits the module through `builder`. From here on the
    /// module no longer accepts pipelines or sources.
    pub fn codegen<B: IrBuilder>(&mut self, builder: &mut B) -> Result<FuncId> {
        self.sealed = true;
        self.once.seal();
        self.main.seal();
        self.last.seal();

        let sources = self.sources();
        let mut transformer = Transformer::new(TypeRegistry::new());
        let prelude = transformer.transform_program(&self.prelude)?;

        let once = lower_phase(&mut transformer, &self.once, &SlotTypes::default())?;
        let main = sources
            .iter()
            .map(|source| {
                let record = match source.kind {
                    SeqKind::Seq => Type::seq(),
                    SeqKind::Str => Type::str(),
                };
                lower_phase(&mut transformer, &self.main, &SlotTypes::single(Some(record)))
            })
            .collect::<Result<Vec<_>>>()?;
        let last = lower_phase(&mut transformer, &self.last, &SlotTypes::default())?;
        tracing::debug!(
            "[stage] lowered {}: {} once, {} main x {} sources, {} last",
            self.name,
            once.len(),
            self.main.len(),
            sources.len(),
            last.len()
        );

        let mut codegen = CodegenVisitor::new(builder, transformer.cache());
        codegen.declare_globals(transformer.globals(), transformer.args_global());
        let phases = LoweredPhases {
            prelude: &prelude.body,
            once: &once,
            main: &main,
            last: &last,
        };
        let entry = PhaseEmitter::new(&mut codegen).emit_module(&phases, &sources)?;
        codegen.emit_all_realized()?;
        Ok(entry)
    }

    /// [`Self::codegen`] into a fresh in-memory module.
    pub fn compile(&mut self) -> Result<Module> {
        let mut builder = ModuleBuilder::new(self.name.clone());
        self.codegen(&mut builder)?;
        Ok(builder.finish())
    }

    fn ensure_open(&self, what: &str) -> Result<()> {
        if self.sealed {
            structural!(
                Span::null(),
                "cannot add {} to `{}` after code generation has started",
                what,
                self.name
            );
        }
        Ok(())
    }
}

fn lower_phase(
    transformer: &mut Transformer,
    aggregator: &Aggregator,
    input: &SlotTypes,
) -> Result<Vec<LoweredPipeline>> {
    aggregator
        .pipelines()
        .iter()
        .map(|pipeline| lower_pipeline(transformer, pipeline, input).map(|(lowered, _)| lowered))
        .collect()
}
