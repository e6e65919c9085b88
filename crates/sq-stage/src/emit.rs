//! Phase layout of the module entry function:
//!
//! ```text
//! entry:  prelude; once pipelines
//! next_i: has_next(source i) ? record_i : next_{i+1} (or last)
//! record_i: read; main pipelines; goto next_i
//! last:   last pipelines; goto exit
//! exit:   return
//! ```
//!
//! A halt in `once` or `main` jumps to `last`, one in `last` to `exit`, so
//! the epilogue runs exactly once on every path.

use crate::lower::{LoweredNode, LoweredPipeline, StageOp};
use sq_core::ast::UnOp;
use sq_core::hir;
use sq_core::id::{BlockId, FuncId};
use sq_core::ir::{ForkPoint, Instr, Intrinsic, IrBuilder, Operand, Place, Rvalue, SourceDecl};
use sq_core::types::{Type, SeqKind};
use sq_core::Result;
use sq_optimize::CodegenVisitor;

#[derive(Debug, Clone)]
struct SlotValue {
    value: Operand,
    /// Bool operand; absent means always valid.
    valid: Option<Operand>,
}

impl SlotValue {
    fn valid(value: Operand) -> Self {
        Self { value, valid: None }
    }
}

#[derive(Debug, Clone, Default)]
struct ValueMap {
    default: Option<SlotValue>,
    named: Vec<(String, SlotValue)>,
}

impl ValueMap {
    fn single(slot: Option<SlotValue>) -> Self {
        Self {
            default: slot,
            named: Vec::new(),
        }
    }

    fn select(&self, slot: Option<&str>) -> Option<SlotValue> {
        match slot {
            None => self.default.clone(),
            Some(name) => match self.named.iter().find(|(slot, _)| slot == name) {
                Some((_, value)) => Some(value.clone()),
                None => sq_core::ice!("slot `{}` was not checked during lowering", name),
            },
        }
    }
}

pub(crate) struct LoweredPhases<'l> {
    pub prelude: &'l [hir::Stmt],
    pub once: &'l [LoweredPipeline],
    /// One replica of the `main` pipelines per source.
    pub main: &'l [Vec<LoweredPipeline>],
    pub last: &'l [LoweredPipeline],
}

pub(crate) struct PhaseEmitter<'c, 'a, B: IrBuilder> {
    codegen: &'c mut CodegenVisitor<'a, B>,
}

impl<'c, 'a, B: IrBuilder> PhaseEmitter<'c, 'a, B> {
    pub fn new(codegen: &'c mut CodegenVisitor<'a, B>) -> Self {
        Self { codegen }
    }

    pub fn emit_module(&mut self, phases: &LoweredPhases<'_>, sources: &[SourceDecl]) -> Result<FuncId> {
        let entry = self.codegen.begin_entry("main");
        self.codegen.emit_stmts(phases.prelude)?;
        let epilogue = self.codegen.builder().create_block("last");
        let exit = self.codegen.builder().create_block("exit");

        for pipeline in phases.once {
            self.emit_pipeline(pipeline, ValueMap::default(), epilogue)?;
        }

        let builder = self.codegen.builder();
        let mut loops = Vec::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            let id = builder.declare_source(source.clone());
            let header = builder.create_block(&format!("source{}.next", index));
            let body = builder.create_block(&format!("source{}.record", index));
            loops.push((id, source.kind, header, body));
        }
        let first = loops.first().map(|(_, _, header, _)| *header).unwrap_or(epilogue);
        self.branch_if_open(first);

        for (index, (id, kind, header, body)) in loops.iter().copied().enumerate() {
            let after = loops
                .get(index + 1)
                .map(|(_, _, next, _)| *next)
                .unwrap_or(epilogue);
            let builder = self.codegen.builder();
            builder.position_at_end(header);
            let has_next = builder.create_value(Type::bool(), Some("has_next"));
            builder.append(Instr::Intrinsic {
                dest: Some(has_next),
                op: Intrinsic::SourceHasNext(id),
                args: vec![],
            });
            builder.cond_branch(Operand::Local(has_next), body, after);

            builder.position_at_end(body);
            let ty = match kind {
                SeqKind::Seq => Type::seq(),
                SeqKind::Str => Type::str(),
            };
            let record = builder.create_value(ty, Some("record"));
            builder.append(Instr::Intrinsic {
                dest: Some(record),
                op: Intrinsic::SourceRead(id),
                args: vec![],
            });
            let input = ValueMap::single(Some(SlotValue::valid(Operand::Local(record))));
            let pipelines = phases.main.get(index).map(Vec::as_slice).unwrap_or(&[]);
            for pipeline in pipelines {
                self.emit_pipeline(pipeline, input.clone(), epilogue)?;
            }
            self.branch_if_open(header);
        }

        self.codegen.builder().position_at_end(epilogue);
        for pipeline in phases.last {
            self.emit_pipeline(pipeline, ValueMap::default(), exit)?;
        }
        self.branch_if_open(exit);
        let builder = self.codegen.builder();
        builder.position_at_end(exit);
        builder.ret(None);
        Ok(entry)
    }

    fn branch_if_open(&mut self, target: BlockId) {
        let builder = self.codegen.builder();
        if !builder.is_terminated() {
            builder.branch(target);
        }
    }

    /// Emits one chain; a failed guard skips to the end of the chain.
    fn emit_pipeline(&mut self, pipeline: &LoweredPipeline, input: ValueMap, halt: BlockId) -> Result<()> {
        let end = self.codegen.builder().create_block("pipe.end");
        let mut current = input;
        for link in &pipeline.links {
            let selected = current.select(link.slot.as_deref());
            if link.guard {
                if let Some(valid) = selected.as_ref().and_then(|slot| slot.valid.clone()) {
                    let builder = self.codegen.builder();
                    let next = builder.create_block("pipe.valid");
                    builder.cond_branch(valid, next, end);
                    builder.position_at_end(next);
                }
            }
            match &link.node {
                LoweredNode::Stage(op) => {
                    current = self.emit_stage(op, selected, halt)?;
                }
                LoweredNode::Fork(branches) => {
                    let branch_input = match link.slot {
                        None => current.clone(),
                        Some(_) => ValueMap::single(selected),
                    };
                    let builder = self.codegen.builder();
                    let function = builder.current_function();
                    let block = builder.current_block();
                    let mut entries = Vec::with_capacity(branches.len());
                    for branch in branches {
                        let entry = self.codegen.builder().create_block("fork.branch");
                        self.branch_if_open(entry);
                        self.codegen.builder().position_at_end(entry);
                        entries.push(entry);
                        self.emit_pipeline(branch, branch_input.clone(), halt)?;
                    }
                    self.codegen.builder().record_fork(ForkPoint {
                        function,
                        block,
                        branches: entries,
                    });
                }
            }
        }
        self.branch_if_open(end);
        self.codegen.builder().position_at_end(end);
        Ok(())
    }

    fn emit_stage(&mut self, op: &StageOp, input: Option<SlotValue>, halt: BlockId) -> Result<ValueMap> {
        let value = input
            .as_ref()
            .map(|slot| slot.value.clone())
            .unwrap_or_else(Operand::unit);
        let passthrough = ValueMap::single(input.clone());
        match op {
            StageOp::Expr(expr) => {
                let result = self.codegen.emit_with_input(expr, value)?;
                let output = (!expr.ty.is_void()).then(|| SlotValue::valid(result));
                Ok(ValueMap::single(output))
            }
            StageOp::Filter(pred) => {
                let valid = self.codegen.emit_with_input(pred, value.clone())?;
                Ok(ValueMap::single(Some(SlotValue {
                    value,
                    valid: Some(valid),
                })))
            }
            StageOp::Partition(pred) => {
                let pass = self.codegen.emit_with_input(pred, value.clone())?;
                let builder = self.codegen.builder();
                let fail = builder.create_value(Type::bool(), None);
                builder.append(Instr::Assign {
                    dest: fail,
                    value: Rvalue::Unary(UnOp::Not, pass.clone()),
                });
                Ok(ValueMap {
                    default: Some(SlotValue::valid(value.clone())),
                    named: vec![
                        (
                            crate::stage::PASS.to_string(),
                            SlotValue {
                                value: value.clone(),
                                valid: Some(pass),
                            },
                        ),
                        (
                            crate::stage::FAIL.to_string(),
                            SlotValue {
                                value,
                                valid: Some(Operand::Local(fail)),
                            },
                        ),
                    ],
                })
            }
            StageOp::Branch(arms) => {
                let mut named = Vec::with_capacity(arms.len());
                for (name, arm) in arms {
                    let result = self.codegen.emit_with_input(arm, value.clone())?;
                    named.push((name.clone(), SlotValue::valid(result)));
                }
                Ok(ValueMap {
                    default: input,
                    named,
                })
            }
            StageOp::Cell(global, ty) => {
                let builder = self.codegen.builder();
                let local = builder.create_value(ty.clone(), None);
                builder.append(Instr::Assign {
                    dest: local,
                    value: Rvalue::Load(Place::Global(*global)),
                });
                Ok(ValueMap::single(Some(SlotValue::valid(Operand::Local(local)))))
            }
            StageOp::Assign(global, expr) => {
                let result = self.codegen.emit_with_input(expr, value)?;
                self.codegen.builder().append(Instr::Store {
                    place: Place::Global(*global),
                    value: result,
                });
                Ok(passthrough)
            }
            StageOp::Print => {
                self.codegen.builder().append(Instr::Intrinsic {
                    dest: None,
                    op: Intrinsic::Print,
                    args: vec![value],
                });
                Ok(passthrough)
            }
            StageOp::Halt(cond) => {
                let cond = match cond {
                    Some(cond) => Some(self.codegen.emit_with_input(cond, value)?),
                    None => None,
                };
                let builder = self.codegen.builder();
                match cond {
                    Some(cond) => {
                        let cont = builder.create_block("halt.cont");
                        builder.cond_branch(cond, halt, cont);
                        builder.position_at_end(cont);
                    }
                    None => {
                        builder.branch(halt);
                        let dead = builder.create_block("halt.dead");
                        builder.position_at_end(dead);
                    }
                }
                Ok(passthrough)
            }
        }
    }
}
