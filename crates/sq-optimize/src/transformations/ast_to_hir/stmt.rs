use super::{contains_yield, Pending, Transformer};
use crate::error::{ensure_type, expected_type};
use sq_core::ast::{self, StmtKind};
use sq_core::hir;
use sq_core::symbols::{SymbolEntry, Variable};
use sq_core::types::Type;
use sq_core::{not_found, structural, type_mismatch, Result};
use std::collections::HashMap;

impl Transformer {
    /// Transforms statements in the current scope.
    pub(crate) fn transform_stmts(&mut self, stmts: &[ast::Stmt]) -> Result<Vec<hir::Stmt>> {
        stmts.iter().map(|stmt| self.transform_stmt(stmt)).collect()
    }

    /// Transforms statements in a fresh scope.
    pub(crate) fn transform_block(&mut self, stmts: &[ast::Stmt]) -> Result<Vec<hir::Stmt>> {
        self.scoped(|this| this.transform_stmts(stmts))
    }

    fn transform_stmt(&mut self, stmt: &ast::Stmt) -> Result<hir::Stmt> {
        let span = stmt.span;
        let kind = match &stmt.kind {
            StmtKind::Pass => hir::StmtKind::Pass,
            StmtKind::Break => {
                if !self.in_loop() {
                    structural!(span, "`break` outside of a loop");
                }
                hir::StmtKind::Break
            }
            StmtKind::Continue => {
                if !self.in_loop() {
                    structural!(span, "`continue` outside of a loop");
                }
                hir::StmtKind::Continue
            }
            StmtKind::Expr(expr) => hir::StmtKind::Expr(self.transform_expr(expr)?),
            StmtKind::Block(body) => hir::StmtKind::Block(self.transform_block(body)?),
            StmtKind::Assign { target, ty, value } => {
                self.transform_assign(target, ty.as_ref(), value, span)?
            }
            StmtKind::AssignMember { base, field, value } => {
                let base = self.transform_expr(base)?;
                let value = self.transform_expr(value)?;
                let (index, field_ty) = self.member_slot(&base.ty, field, span)?;
                ensure_type(value.span, "field assignment", &field_ty, &value.ty)?;
                hir::StmtKind::AssignMember { base, index, value }
            }
            StmtKind::AssignIndex { base, index, value } => {
                let base = self.transform_expr(base)?;
                let index = self.transform_expr(index)?;
                let value = self.transform_expr(value)?;
                let Type::Array(elem) = &base.ty else {
                    type_mismatch!(span, "cannot assign into an element of `{}`", base.ty);
                };
                ensure_type(index.span, "array index", &Type::int(), &index.ty)?;
                ensure_type(value.span, "element assignment", elem, &value.ty)?;
                hir::StmtKind::AssignIndex { base, index, value }
            }
            StmtKind::AssignDeref { target, value } => {
                let target = self.transform_expr(target)?;
                let value = self.transform_expr(value)?;
                let Type::Ptr(pointee) = &target.ty else {
                    type_mismatch!(span, "cannot store through `{}`", target.ty);
                };
                ensure_type(value.span, "store through pointer", pointee, &value.ty)?;
                hir::StmtKind::AssignDeref { target, value }
            }
            StmtKind::Update { target, op, value } => {
                let value = self.transform_expr(value)?;
                let Some(SymbolEntry::Variable(Variable { ty, binding })) =
                    self.symbols.lookup(target).cloned()
                else {
                    not_found!(span, "cannot update unknown variable `{}`", target);
                };
                let result = self.binary_type(*op, &ty, &value.ty, span)?;
                ensure_type(span, "augmented assignment", &ty, &result)?;
                hir::StmtKind::Update {
                    target: binding,
                    name: target.clone(),
                    op: *op,
                    value,
                }
            }
            StmtKind::Return(value) => self.transform_return(value.as_ref(), span)?,
            StmtKind::Yield(value) => hir::StmtKind::Yield(self.transform_yield(value.as_ref(), span)?),
            StmtKind::If { branches, otherwise } => {
                let branches = branches
                    .iter()
                    .map(|branch| {
                        let cond = self.transform_condition(&branch.cond)?;
                        let body = self.transform_block(&branch.body)?;
                        Ok(hir::IfBranch { cond, body })
                    })
                    .collect::<Result<Vec<_>>>()?;
                let otherwise = match otherwise {
                    Some(body) => Some(self.transform_block(body)?),
                    None => None,
                };
                hir::StmtKind::If { branches, otherwise }
            }
            StmtKind::While { cond, body } => {
                let cond = self.transform_condition(cond)?;
                let body = self.with_loop(|this| this.transform_block(body))?;
                hir::StmtKind::While { cond, body }
            }
            StmtKind::For { var, iter, body } => {
                let iter = self.transform_expr(iter)?;
                let Some(elem) = iter.ty.element() else {
                    type_mismatch!(iter.span, "cannot iterate over `{}`", iter.ty);
                };
                let (id, body) = self.scoped(|this| {
                    let id = this.declare_local(var, elem);
                    let body = this.with_loop(|this| this.transform_stmts(body))?;
                    Ok((id, body))
                })?;
                hir::StmtKind::For {
                    var: id,
                    name: var.clone(),
                    iter,
                    body,
                }
            }
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                let body = self.transform_block(body)?;
                let catches = catches
                    .iter()
                    .map(|clause| self.transform_catch(clause))
                    .collect::<Result<Vec<_>>>()?;
                let finally = match finally {
                    Some(body) => Some(self.transform_block(body)?),
                    None => None,
                };
                hir::StmtKind::Try {
                    body,
                    catches,
                    finally,
                }
            }
            StmtKind::Throw(value) => {
                let value = self.transform_expr(value)?;
                if value.ty.as_class().is_none() {
                    type_mismatch!(value.span, "can only throw class objects, found `{}`", value.ty);
                }
                hir::StmtKind::Throw(value)
            }
            StmtKind::FuncDef(def) => self.declare_function(def)?,
            StmtKind::ClassDef(def) => self.declare_class(def)?,
        };
        Ok(hir::Stmt::new(kind, span))
    }

    fn transform_assign(
        &mut self,
        target: &str,
        annotation: Option<&ast::TypeExpr>,
        value: &ast::Expr,
        span: sq_core::span::Span,
    ) -> Result<hir::StmtKind> {
        let value = self.transform_expr(value)?;
        if value.ty.is_void() {
            type_mismatch!(value.span, "cannot assign a void value to `{}`", target);
        }
        if let Some(annotation) = annotation {
            let declared = self.resolve_type(annotation, self.type_env(), span)?;
            ensure_type(value.span, "annotated assignment", &declared, &value.ty)?;
            let binding = self.declare_binding(target, declared);
            return Ok(hir::StmtKind::Assign {
                target: binding,
                name: target.to_string(),
                declare: true,
                value,
            });
        }
        if let Some(SymbolEntry::Variable(Variable { ty, binding })) =
            self.symbols.lookup(target).cloned()
        {
            if ty != value.ty {
                return Err(expected_type(
                    value.span,
                    &format!("assignment to `{}`", target),
                    &ty,
                    &value.ty,
                ));
            }
            return Ok(hir::StmtKind::Assign {
                target: binding,
                name: target.to_string(),
                declare: false,
                value,
            });
        }
        let binding = self.declare_binding(target, value.ty.clone());
        Ok(hir::StmtKind::Assign {
            target: binding,
            name: target.to_string(),
            declare: true,
            value,
        })
    }

    pub(crate) fn transform_condition(&mut self, cond: &ast::Expr) -> Result<hir::Expr> {
        let cond = self.transform_expr(cond)?;
        ensure_type(cond.span, "condition", &Type::bool(), &cond.ty)?;
        Ok(cond)
    }

    fn transform_return(
        &mut self,
        value: Option<&ast::Expr>,
        span: sq_core::span::Span,
    ) -> Result<hir::StmtKind> {
        let Some(frame) = self.current_function() else {
            structural!(span, "`return` outside of a function");
        };
        let (generator, declared, name) = (frame.generator, frame.ret.clone(), frame.name.clone());
        let value = match value {
            Some(value) => Some(self.transform_expr(value)?),
            None => None,
        };
        let found = value.as_ref().map(|v| v.ty.clone()).unwrap_or(Type::Void);
        if generator {
            if value.is_some() {
                structural!(span, "generator `{}` cannot return a value", name);
            }
            return Ok(hir::StmtKind::Return(None));
        }
        match declared {
            Some(expected) => ensure_type(span, &format!("return from `{}`", name), &expected, &found)?,
            None => self.set_return_type(found),
        }
        Ok(hir::StmtKind::Return(value))
    }

    pub(crate) fn transform_yield(
        &mut self,
        value: Option<&ast::Expr>,
        span: sq_core::span::Span,
    ) -> Result<Option<hir::Expr>> {
        let Some(frame) = self.current_function() else {
            structural!(span, "`yield` outside of a function");
        };
        if !frame.generator {
            sq_core::ice!("yield in `{}` which was not marked as a generator", frame.name);
        }
        let (declared, name) = (frame.ret.clone(), frame.name.clone());
        let value = match value {
            Some(value) => Some(self.transform_expr(value)?),
            None => None,
        };
        let found = value.as_ref().map(|v| v.ty.clone()).unwrap_or(Type::Void);
        let found = Type::array(found);
        match declared {
            Some(expected) => ensure_type(span, &format!("yield from `{}`", name), &expected, &found)?,
            None => self.set_return_type(found),
        }
        Ok(value)
    }

    fn set_return_type(&mut self, ty: Type) {
        let Some(frame) = self.current_function_mut() else {
            return;
        };
        frame.ret = Some(ty.clone());
        let handle = frame.handle;
        self.cache.set_return_type(handle, ty);
    }

    fn transform_catch(&mut self, clause: &ast::CatchClause) -> Result<hir::Catch> {
        self.scoped(|this| {
            let class = match &clause.class {
                Some(class) => {
                    let ty = this.resolve_type(class, this.type_env(), clause.span)?;
                    let Some(class_ref) = ty.as_class().cloned() else {
                        type_mismatch!(clause.span, "can only catch class types, found `{}`", ty);
                    };
                    Some((this.realize_class(class_ref.template, class_ref.args, clause.span)?, ty))
                }
                None => None,
            };
            let var = match (&clause.var, &class) {
                (Some(name), Some((_, ty))) => Some((this.declare_local(name, ty.clone()), name.clone())),
                (Some(name), None) => {
                    structural!(clause.span, "catch-all clause cannot bind `{}`", name)
                }
                (None, _) => None,
            };
            let body = this.transform_stmts(&clause.body)?;
            Ok(hir::Catch {
                class: class.map(|(handle, _)| handle),
                var,
                body,
            })
        })
    }

    fn declare_function(&mut self, def: &ast::FuncDef) -> Result<hir::StmtKind> {
        let generator = contains_yield(&def.body);
        let reserved = self.cache.next_template_id();
        self.symbols.define(def.name.clone(), SymbolEntry::Function(reserved));
        let scope = self.symbols.visible_declarations();
        let template = self.cache.add_function_template(def.clone(), None, generator, scope);
        if template != reserved {
            sq_core::ice!("function template id {} != reserved {}", template, reserved);
        }
        if def.generics.is_empty() {
            self.pending.push(Pending::Function(template));
        }
        Ok(hir::StmtKind::FuncDecl {
            template,
            name: def.name.clone(),
        })
    }

    fn declare_class(&mut self, def: &ast::ClassDef) -> Result<hir::StmtKind> {
        // Methods are registered first; the class takes the id after them.
        let class_id = sq_core::id::TemplateId(
            self.cache.next_template_id().0 + def.methods.len() as u32,
        );
        self.symbols.define(def.name.clone(), SymbolEntry::Class(class_id));
        let scope = self.symbols.visible_declarations();
        let mut methods = HashMap::new();
        for method in &def.methods {
            if !method.generics.is_empty() {
                structural!(
                    method.span,
                    "method `{}.{}` cannot declare its own type parameters",
                    def.name,
                    method.name
                );
            }
            if methods.contains_key(&method.name) {
                structural!(method.span, "duplicate method `{}.{}`", def.name, method.name);
            }
            let generator = contains_yield(&method.body);
            let id = self
                .cache
                .add_function_template(method.clone(), Some(class_id), generator, scope.clone());
            methods.insert(method.name.clone(), id);
        }
        let template = self.cache.add_class_template(def.clone(), methods, scope);
        if template != class_id {
            sq_core::ice!("class template id {} != reserved {}", template, class_id);
        }
        if def.generics.is_empty() {
            self.pending.push(Pending::Class(template));
        }
        Ok(hir::StmtKind::ClassDecl {
            template,
            name: def.name.clone(),
        })
    }
}
