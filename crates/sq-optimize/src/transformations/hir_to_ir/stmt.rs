use super::context::{LoopTarget, TryFrame};
use super::CodegenVisitor;
use sq_core::hir::{self, StmtKind};
use sq_core::ir::{Instr, Intrinsic, IrBuilder, Operand, Place, Rvalue, Terminator};
use sq_core::symbols::Binding;
use sq_core::types::Type;
use sq_core::Result;

impl<'a, B: IrBuilder> CodegenVisitor<'a, B> {
    pub fn emit_stmts(&mut self, stmts: &[hir::Stmt]) -> Result<()> {
        for stmt in stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_block(&mut self, stmts: &[hir::Stmt]) -> Result<()> {
        self.state.push_scope();
        let result = self.emit_stmts(stmts);
        self.state.pop_scope();
        result
    }

    fn emit_stmt(&mut self, stmt: &hir::Stmt) -> Result<()> {
        if self.builder.is_terminated() {
            // Code after a jump still needs somewhere to go.
            let dead = self.builder.create_block("dead");
            self.builder.position_at_end(dead);
        }
        match &stmt.kind {
            StmtKind::Block(body) => self.emit_block(body)?,
            StmtKind::Pass => {}
            StmtKind::Break | StmtKind::Continue => {
                let Some(target) = self.state.loops.last().copied() else {
                    sq_core::ice!("loop jump outside of a loop reached codegen");
                };
                self.unwind_to(target.try_depth)?;
                if !self.builder.is_terminated() {
                    let block = if matches!(stmt.kind, StmtKind::Break) {
                        target.break_block
                    } else {
                        target.continue_block
                    };
                    self.builder.branch(block);
                }
            }
            StmtKind::Expr(expr) => {
                self.emit_expr(expr)?;
            }
            StmtKind::Assign {
                target,
                name,
                declare,
                value,
            } => {
                let ty = value.ty.clone();
                let value = self.emit_expr(value)?;
                self.store_binding(*target, name, *declare, &ty, value);
            }
            StmtKind::AssignMember { base, index, value } => {
                let base = self.emit_expr(base)?;
                let value = self.emit_expr(value)?;
                self.builder.append(Instr::Store {
                    place: Place::Field(base, *index),
                    value,
                });
            }
            StmtKind::AssignIndex { base, index, value } => {
                let base = self.emit_expr(base)?;
                let index = self.emit_expr(index)?;
                let value = self.emit_expr(value)?;
                self.builder.append(Instr::Store {
                    place: Place::Index(base, index),
                    value,
                });
            }
            StmtKind::AssignDeref { target, value } => {
                let target = self.emit_expr(target)?;
                let value = self.emit_expr(value)?;
                self.builder.append(Instr::Store {
                    place: Place::Deref(target),
                    value,
                });
            }
            StmtKind::Update {
                target,
                name,
                op,
                value,
            } => {
                let ty = value.ty.clone();
                let rhs = self.emit_expr(value)?;
                let current = match target {
                    Binding::Local(var) => match self.state.lookup(*var) {
                        Some(local) => Operand::Local(local),
                        None => sq_core::ice!("update of unknown local `{}`", name),
                    },
                    Binding::Global(global) => {
                        self.assign(ty.clone(), Rvalue::Load(Place::Global(*global)))
                    }
                };
                let updated = self.assign(ty.clone(), Rvalue::Binary(*op, current, rhs));
                self.store_binding(*target, name, false, &ty, updated);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(value) => Some(self.emit_expr(value)?),
                    None => None,
                };
                self.unwind_to(0)?;
                if !self.builder.is_terminated() {
                    if self.state.generator {
                        self.builder.ret(None);
                    } else {
                        self.builder.ret(value);
                    }
                }
            }
            StmtKind::Yield(value) => {
                let value = match value {
                    Some(value) => self.emit_expr(value)?,
                    None => Operand::unit(),
                };
                self.builder.append(Instr::Yield(value));
            }
            StmtKind::While { cond, body } => {
                let header = self.builder.create_block("while.cond");
                let body_block = self.builder.create_block("while.body");
                let exit = self.builder.create_block("while.end");
                self.builder.branch(header);
                self.builder.position_at_end(header);
                let cond = self.emit_expr(cond)?;
                self.builder.cond_branch(cond, body_block, exit);
                self.builder.position_at_end(body_block);
                self.emit_loop_body(body, header, exit)?;
                self.builder.position_at_end(exit);
            }
            StmtKind::For {
                var,
                name,
                iter,
                body,
            } => {
                let elem_ty = iter.ty.element().unwrap_or(Type::Any);
                let iter = self.emit_expr(iter)?;
                let len = self.builder.create_value(Type::int(), None);
                self.builder.append(Instr::Intrinsic {
                    dest: Some(len),
                    op: Intrinsic::Len,
                    args: vec![iter.clone()],
                });
                let index = self.builder.create_value(Type::int(), None);
                self.builder.append(Instr::Assign {
                    dest: index,
                    value: Rvalue::Use(Operand::int(0)),
                });
                let header = self.builder.create_block("for.cond");
                let body_block = self.builder.create_block("for.body");
                let step = self.builder.create_block("for.step");
                let exit = self.builder.create_block("for.end");
                self.builder.branch(header);

                self.builder.position_at_end(header);
                let more = self.assign(
                    Type::bool(),
                    Rvalue::Binary(
                        sq_core::ast::BinOp::Lt,
                        Operand::Local(index),
                        Operand::Local(len),
                    ),
                );
                self.builder.cond_branch(more, body_block, exit);

                self.builder.position_at_end(body_block);
                let elem = self.builder.create_value(elem_ty, Some(name.as_str()));
                self.builder.append(Instr::Assign {
                    dest: elem,
                    value: Rvalue::Load(Place::Index(iter, Operand::Local(index))),
                });
                self.state.push_scope();
                self.state.bind(*var, elem);
                let result = self.emit_loop_body(body, step, exit);
                self.state.pop_scope();
                result?;

                self.builder.position_at_end(step);
                self.builder.append(Instr::Assign {
                    dest: index,
                    value: Rvalue::Binary(
                        sq_core::ast::BinOp::Add,
                        Operand::Local(index),
                        Operand::int(1),
                    ),
                });
                self.builder.branch(header);
                self.builder.position_at_end(exit);
            }
            StmtKind::If { branches, otherwise } => {
                let merge = self.builder.create_block("if.end");
                for branch in branches {
                    let cond = self.emit_expr(&branch.cond)?;
                    let then_block = self.builder.create_block("if.then");
                    let next = self.builder.create_block("if.else");
                    self.builder.cond_branch(cond, then_block, next);
                    self.builder.position_at_end(then_block);
                    self.emit_block(&branch.body)?;
                    if !self.builder.is_terminated() {
                        self.builder.branch(merge);
                    }
                    self.builder.position_at_end(next);
                }
                if let Some(body) = otherwise {
                    self.emit_block(body)?;
                }
                if !self.builder.is_terminated() {
                    self.builder.branch(merge);
                }
                self.builder.position_at_end(merge);
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.emit_try(body, catches, finally.as_deref())?,
            StmtKind::Throw(value) => {
                let value = self.emit_expr(value)?;
                self.builder.terminate(Terminator::Throw(value));
            }
            StmtKind::FuncDecl { template, .. } => self.emit_template(*template)?,
            StmtKind::ClassDecl { template, .. } => self.emit_class_template(*template)?,
        }
        Ok(())
    }

    fn store_binding(&mut self, target: Binding, name: &str, declare: bool, ty: &Type, value: Operand) {
        match target {
            Binding::Local(var) => {
                let local = match (declare, self.state.lookup(var)) {
                    (false, Some(local)) => local,
                    _ => {
                        let local = self.builder.create_value(ty.clone(), Some(name));
                        self.state.bind(var, local);
                        local
                    }
                };
                self.builder.append(Instr::Assign {
                    dest: local,
                    value: Rvalue::Use(value),
                });
            }
            Binding::Global(global) => self.builder.append(Instr::Store {
                place: Place::Global(global),
                value,
            }),
        }
    }

    fn emit_loop_body(
        &mut self,
        body: &[hir::Stmt],
        continue_block: sq_core::id::BlockId,
        break_block: sq_core::id::BlockId,
    ) -> Result<()> {
        self.state.loops.push(LoopTarget {
            continue_block,
            break_block,
            try_depth: self.state.tries.len(),
        });
        let result = self.emit_block(body);
        self.state.loops.pop();
        result?;
        if !self.builder.is_terminated() {
            self.builder.branch(continue_block);
        }
        Ok(())
    }

    /// Leaves every `try` above `depth`: handlers still installed are popped
    /// and `finally` bodies run innermost first.
    fn unwind_to(&mut self, depth: usize) -> Result<()> {
        for index in (depth..self.state.tries.len()).rev() {
            if self.builder.is_terminated() {
                break;
            }
            let frame = self.state.tries[index].clone();
            if frame.handler_active {
                self.builder.append(Instr::PopHandler);
            }
            if let Some(finally) = &frame.finally {
                self.emit_finally(index, finally)?;
            }
        }
        Ok(())
    }

    /// Emits a `finally` body outside of the frame that owns it.
    fn emit_finally(&mut self, depth: usize, finally: &[hir::Stmt]) -> Result<()> {
        let outer = self.state.tries.split_off(depth);
        let result = self.emit_block(finally);
        self.state.tries.extend(outer);
        result
    }

    fn emit_try(
        &mut self,
        body: &[hir::Stmt],
        catches: &[hir::Catch],
        finally: Option<&[hir::Stmt]>,
    ) -> Result<()> {
        let depth = self.state.tries.len();
        let exn = self.builder.create_value(Type::Any, Some("exn"));
        let handler = self.builder.create_block("try.handler");
        let cont = self.builder.create_block("try.end");

        self.builder.append(Instr::PushHandler { handler, exn });
        self.state.tries.push(TryFrame {
            handler_active: true,
            finally: finally.map(<[hir::Stmt]>::to_vec),
        });
        let result = self.emit_block(body);
        self.state.tries.pop();
        result?;
        if !self.builder.is_terminated() {
            self.builder.append(Instr::PopHandler);
            self.emit_optional_finally(depth, finally)?;
            if !self.builder.is_terminated() {
                self.builder.branch(cont);
            }
        }

        // A throw removes the handler before jumping here. With a finally
        // body, exceptions escaping a catch clause pass through `cleanup`.
        self.builder.position_at_end(handler);
        let cleanup = match finally {
            Some(_) => {
                let pending = self.builder.create_value(Type::Any, Some("exn"));
                let cleanup = self.builder.create_block("try.cleanup");
                self.builder.append(Instr::PushHandler {
                    handler: cleanup,
                    exn: pending,
                });
                Some((cleanup, pending))
            }
            None => None,
        };
        self.state.tries.push(TryFrame {
            handler_active: cleanup.is_some(),
            finally: finally.map(<[hir::Stmt]>::to_vec),
        });
        let result = self.emit_catches(catches, exn, cont, depth, finally, cleanup.is_some());
        self.state.tries.pop();
        result?;

        if let Some((cleanup, pending)) = cleanup {
            self.builder.position_at_end(cleanup);
            self.emit_optional_finally(depth, finally)?;
            if !self.builder.is_terminated() {
                self.builder.terminate(Terminator::Throw(Operand::Local(pending)));
            }
        }
        self.builder.position_at_end(cont);
        Ok(())
    }

    fn emit_catches(
        &mut self,
        catches: &[hir::Catch],
        exn: sq_core::id::LocalId,
        cont: sq_core::id::BlockId,
        depth: usize,
        finally: Option<&[hir::Stmt]>,
        cleanup_installed: bool,
    ) -> Result<()> {
        for catch in catches {
            let next = match catch.class {
                Some(class) => {
                    let matches = self.assign(
                        Type::bool(),
                        Rvalue::InstanceOf {
                            value: Operand::Local(exn),
                            class,
                        },
                    );
                    let clause = self.builder.create_block("catch");
                    let next = self.builder.create_block("catch.next");
                    self.builder.cond_branch(matches, clause, next);
                    self.builder.position_at_end(clause);
                    Some(next)
                }
                None => None,
            };
            self.state.push_scope();
            if let (Some((var, name)), Some(class)) = (&catch.var, catch.class) {
                let ty = self.cache.class(class).ty.clone();
                let local = self.builder.create_value(ty, Some(name.as_str()));
                self.builder.append(Instr::Assign {
                    dest: local,
                    value: Rvalue::Use(Operand::Local(exn)),
                });
                self.state.bind(*var, local);
            }
            let result = self.emit_stmts(&catch.body);
            self.state.pop_scope();
            result?;
            if !self.builder.is_terminated() {
                if cleanup_installed {
                    self.builder.append(Instr::PopHandler);
                }
                self.emit_optional_finally(depth, finally)?;
                if !self.builder.is_terminated() {
                    self.builder.branch(cont);
                }
            }
            match next {
                Some(next) => self.builder.position_at_end(next),
                // A catch-all clause ends dispatch.
                None => return Ok(()),
            }
        }
        if cleanup_installed {
            self.builder.append(Instr::PopHandler);
        }
        self.emit_optional_finally(depth, finally)?;
        if !self.builder.is_terminated() {
            self.builder.terminate(Terminator::Throw(Operand::Local(exn)));
        }
        Ok(())
    }

    fn emit_optional_finally(&mut self, depth: usize, finally: Option<&[hir::Stmt]>) -> Result<()> {
        match finally {
            Some(finally) => self.emit_finally(depth, finally),
            None => Ok(()),
        }
    }
}
