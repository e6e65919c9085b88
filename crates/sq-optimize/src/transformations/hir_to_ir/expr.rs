use super::CodegenVisitor;
use sq_core::ast::{BinOp, UnOp};
use sq_core::hir::{self, Callee, ExprKind, Literal};
use sq_core::ir::{self, Constant, Instr, Intrinsic, IrBuilder, Operand, Place, Rvalue};
use sq_core::symbols::{Binding, Builtin};
use sq_core::types::{AtomicKind, SeqKind, Type};
use sq_core::Result;

impl<'a, B: IrBuilder> CodegenVisitor<'a, B> {
    /// Emits `expr` and returns the operand holding its value. Void
    /// expressions yield the unit constant.
    pub fn emit_expr(&mut self, expr: &hir::Expr) -> Result<Operand> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Operand::Const(match literal {
                Literal::Bool(value) => Constant::Bool(*value),
                Literal::Int(value) => Constant::Int(*value),
                Literal::Float(value) => Constant::Float(*value),
                Literal::Str(value) => Constant::Str(value.clone()),
                Literal::Seq(value) => Constant::Seq(value.clone()),
            })),
            ExprKind::Var { binding, name } => match binding {
                Binding::Local(var) => match self.state.lookup(*var) {
                    Some(local) => Ok(Operand::Local(local)),
                    None => sq_core::ice!("local `{}` ({}) used before it was emitted", name, var),
                },
                Binding::Global(global) => {
                    Ok(self.assign(expr.ty.clone(), Rvalue::Load(Place::Global(*global))))
                }
            },
            ExprKind::FuncRef(handle) => {
                let id = self.realize_func(*handle)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::FuncRef(id)))
            }
            ExprKind::Call { callee, args } => self.emit_call(callee, args, &expr.ty),
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.emit_expr(cond)?;
                let then_block = self.builder.create_block("cond.then");
                let else_block = self.builder.create_block("cond.else");
                let merge = self.builder.create_block("cond.end");
                let result = (!expr.ty.is_void()).then(|| self.builder.create_value(expr.ty.clone(), None));
                self.builder.cond_branch(cond, then_block, else_block);
                for (block, arm) in [(then_block, then), (else_block, otherwise)] {
                    self.builder.position_at_end(block);
                    let value = self.emit_expr(arm)?;
                    if let Some(result) = result {
                        self.builder.append(Instr::Assign {
                            dest: result,
                            value: Rvalue::Use(value),
                        });
                    }
                    if !self.builder.is_terminated() {
                        self.builder.branch(merge);
                    }
                }
                self.builder.position_at_end(merge);
                Ok(result.map(Operand::Local).unwrap_or_else(Operand::unit))
            }
            ExprKind::Dot { base, index, .. } => {
                let base = self.emit_expr(base)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::Load(Place::Field(base, *index))))
            }
            ExprKind::Index { base, index } => {
                let base = self.emit_expr(base)?;
                let index = self.emit_expr(index)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::Load(Place::Index(base, index))))
            }
            ExprKind::Binary { op, lhs, rhs } if op.is_logical() => {
                self.emit_short_circuit(*op, lhs, rhs)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.emit_expr(lhs)?;
                let rhs = self.emit_expr(rhs)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::Binary(*op, lhs, rhs)))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.emit_expr(operand)?;
                let value = match op {
                    UnOp::Deref => Rvalue::Load(Place::Deref(operand)),
                    op => Rvalue::Unary(*op, operand),
                };
                Ok(self.assign(expr.ty.clone(), value))
            }
            ExprKind::Ptr { var, name } => match self.state.lookup(*var) {
                Some(local) => Ok(self.assign(expr.ty.clone(), Rvalue::AddressOf(local))),
                None => sq_core::ice!("address of `{}` taken before it was emitted", name),
            },
            ExprKind::StackAlloc { elem, len } => {
                let len = self.emit_expr(len)?;
                Ok(self.assign(
                    expr.ty.clone(),
                    Rvalue::StackAlloc {
                        elem: elem.clone(),
                        len,
                    },
                ))
            }
            ExprKind::Array(items) => {
                let items = self.emit_exprs(items)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::Array(items)))
            }
            ExprKind::Record(items) => {
                let items = self.emit_exprs(items)?;
                Ok(self.assign(expr.ty.clone(), Rvalue::Record(items)))
            }
            ExprKind::New { class, fields } => {
                self.declare_class(*class);
                let fields = self.emit_exprs(fields)?;
                Ok(self.assign(
                    expr.ty.clone(),
                    Rvalue::New {
                        class: *class,
                        fields,
                    },
                ))
            }
            ExprKind::Construct { class, init, args } => {
                self.declare_class(*class);
                let defaults = self
                    .cache
                    .class(*class)
                    .fields
                    .iter()
                    .map(|(_, ty)| default_operand(ty))
                    .collect();
                let object = self.assign(
                    expr.ty.clone(),
                    Rvalue::New {
                        class: *class,
                        fields: defaults,
                    },
                );
                let init = self.realize_func(*init)?;
                let mut operands = vec![object.clone()];
                operands.extend(self.emit_exprs(args)?);
                self.builder.append(Instr::Call {
                    dest: None,
                    callee: ir::Callee::Direct(init),
                    args: operands,
                });
                Ok(object)
            }
            ExprKind::Pipe(stages) => {
                let Some((source, rest)) = stages.split_first() else {
                    sq_core::ice!("empty pipe reached codegen");
                };
                let mut value = self.emit_expr(source)?;
                for stage in rest {
                    value = self.emit_with_input(stage, value)?;
                }
                Ok(value)
            }
            ExprKind::Ellipsis => match self.state.ellipsis.last() {
                Some(value) => Ok(value.clone()),
                None => sq_core::ice!("`...` reached codegen without an input"),
            },
            ExprKind::Yield(value) => {
                let value = match value {
                    Some(value) => self.emit_expr(value)?,
                    None => Operand::unit(),
                };
                self.builder.append(Instr::Yield(value));
                Ok(Operand::unit())
            }
            ExprKind::StmtExpr { stmts, value } => {
                self.state.push_scope();
                let result = self
                    .emit_stmts(stmts)
                    .and_then(|()| self.emit_expr(value));
                self.state.pop_scope();
                result
            }
        }
    }

    pub(crate) fn emit_exprs(&mut self, exprs: &[hir::Expr]) -> Result<Vec<Operand>> {
        exprs.iter().map(|expr| self.emit_expr(expr)).collect()
    }

    /// Assigns `value` to a fresh local of type `ty`.
    pub(crate) fn assign(&mut self, ty: Type, value: Rvalue) -> Operand {
        let dest = self.builder.create_value(ty, None);
        self.builder.append(Instr::Assign { dest, value });
        Operand::Local(dest)
    }

    fn emit_call(&mut self, callee: &Callee, args: &[hir::Expr], ty: &Type) -> Result<Operand> {
        match callee {
            Callee::Builtin(builtin) => {
                let args = self.emit_exprs(args)?;
                let op = match builtin {
                    Builtin::Print => Intrinsic::Print,
                    Builtin::Len => Intrinsic::Len,
                    Builtin::Str => Intrinsic::ToStr,
                };
                let dest = (!ty.is_void()).then(|| self.builder.create_value(ty.clone(), None));
                self.builder.append(Instr::Intrinsic { dest, op, args });
                Ok(dest.map(Operand::Local).unwrap_or_else(Operand::unit))
            }
            Callee::Func(handle) => {
                let id = self.realize_func(*handle)?;
                let args = self.emit_exprs(args)?;
                Ok(self.call(ir::Callee::Direct(id), args, ty))
            }
            Callee::Value(value) => {
                let target = self.emit_expr(value)?;
                let args = self.emit_exprs(args)?;
                Ok(self.call(ir::Callee::Indirect(target), args, ty))
            }
        }
    }

    fn call(&mut self, callee: ir::Callee, args: Vec<Operand>, ty: &Type) -> Operand {
        let dest = (!ty.is_void()).then(|| self.builder.create_value(ty.clone(), None));
        self.builder.append(Instr::Call { dest, callee, args });
        dest.map(Operand::Local).unwrap_or_else(Operand::unit)
    }

    fn emit_short_circuit(&mut self, op: BinOp, lhs: &hir::Expr, rhs: &hir::Expr) -> Result<Operand> {
        let result = self.builder.create_value(Type::bool(), None);
        let lhs = self.emit_expr(lhs)?;
        self.builder.append(Instr::Assign {
            dest: result,
            value: Rvalue::Use(lhs),
        });
        let rhs_block = self.builder.create_block("logic.rhs");
        let merge = self.builder.create_block("logic.end");
        let cond = Operand::Local(result);
        match op {
            BinOp::And => self.builder.cond_branch(cond, rhs_block, merge),
            _ => self.builder.cond_branch(cond, merge, rhs_block),
        }
        self.builder.position_at_end(rhs_block);
        let rhs = self.emit_expr(rhs)?;
        self.builder.append(Instr::Assign {
            dest: result,
            value: Rvalue::Use(rhs),
        });
        self.builder.branch(merge);
        self.builder.position_at_end(merge);
        Ok(Operand::Local(result))
    }
}

/// Initial field value of an object built before `__init__` runs.
fn default_operand(ty: &Type) -> Operand {
    Operand::Const(match ty {
        Type::Atomic(AtomicKind::Int) | Type::Atomic(AtomicKind::Byte) => Constant::Int(0),
        Type::Atomic(AtomicKind::Float) => Constant::Float(0.0),
        Type::Atomic(AtomicKind::Bool) => Constant::Bool(false),
        Type::Sequence(SeqKind::Str) => Constant::Str(String::new()),
        Type::Sequence(SeqKind::Seq) => Constant::Seq(String::new()),
        _ => Constant::Unit,
    })
}
