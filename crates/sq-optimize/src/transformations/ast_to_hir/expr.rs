use super::Transformer;
use crate::error::ensure_type;
use sq_core::ast::{self, BinOp, ExprKind, UnOp};
use sq_core::hir;
use sq_core::span::Span;
use sq_core::symbols::{Binding, SymbolEntry, Variable};
use sq_core::types::{AtomicKind, Type};
use sq_core::{not_found, structural, type_mismatch, Result};

impl Transformer {
    pub fn transform_expr(&mut self, expr: &ast::Expr) -> Result<hir::Expr> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Bool(value) => Ok(literal(hir::Literal::Bool(*value), Type::bool(), span)),
            ExprKind::Int(value) => Ok(literal(hir::Literal::Int(*value), Type::int(), span)),
            ExprKind::Float(value) => {
                Ok(literal(hir::Literal::Float(*value), Type::float(), span))
            }
            ExprKind::Str(value) => {
                Ok(literal(hir::Literal::Str(value.clone()), Type::str(), span))
            }
            ExprKind::Seq(value) => {
                Ok(literal(hir::Literal::Seq(value.clone()), Type::seq(), span))
            }
            ExprKind::Ident(name) => self.transform_ident(name, span),
            ExprKind::Instantiate { base, args } => self.transform_instantiated_value(base, args, span),
            ExprKind::Call { callee, args } => self.transform_call(callee, args, span),
            ExprKind::Dot { base, field } => {
                let base = self.transform_expr(base)?;
                let (index, ty) = self.member_slot(&base.ty, field, span)?;
                Ok(hir::Expr::new(
                    hir::ExprKind::Dot {
                        base: Box::new(base),
                        index,
                        field: field.clone(),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::Index { base, index } => {
                let base = self.transform_expr(base)?;
                let index = self.transform_expr(index)?;
                ensure_type(index.span, "index", &Type::int(), &index.ty)?;
                let ty = match &base.ty {
                    Type::Array(elem) => elem.as_ref().clone(),
                    Type::Sequence(kind) => Type::Sequence(*kind),
                    other => type_mismatch!(span, "cannot index into `{}`", other),
                };
                Ok(hir::Expr::new(
                    hir::ExprKind::Index {
                        base: Box::new(base),
                        index: Box::new(index),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.transform_expr(lhs)?;
                let rhs = self.transform_expr(rhs)?;
                let ty = self.binary_type(*op, &lhs.ty, &rhs.ty, span)?;
                Ok(hir::Expr::new(
                    hir::ExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.transform_expr(operand)?;
                let ty = match (op, &operand.ty) {
                    (UnOp::Neg, ty) if ty.is_numeric() => ty.clone(),
                    (UnOp::Not, Type::Atomic(AtomicKind::Bool)) => Type::bool(),
                    (UnOp::Deref, Type::Ptr(pointee)) => pointee.as_ref().clone(),
                    (op, ty) => type_mismatch!(span, "operator {:?} cannot be applied to `{}`", op, ty),
                };
                Ok(hir::Expr::new(
                    hir::ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.transform_condition(cond)?;
                let then = self.transform_expr(then)?;
                let otherwise = self.transform_expr(otherwise)?;
                ensure_type(otherwise.span, "conditional branches", &then.ty, &otherwise.ty)?;
                let ty = then.ty.clone();
                Ok(hir::Expr::new(
                    hir::ExprKind::Cond {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    ty,
                    span,
                ))
            }
            ExprKind::Ptr(name) => match self.symbols.lookup(name) {
                Some(SymbolEntry::Variable(Variable {
                    ty,
                    binding: Binding::Local(var),
                })) => Ok(hir::Expr::new(
                    hir::ExprKind::Ptr {
                        var: *var,
                        name: name.clone(),
                    },
                    Type::ptr(ty.clone()),
                    span,
                )),
                Some(SymbolEntry::Variable(_)) => {
                    structural!(span, "cannot take the address of global `{}`", name)
                }
                Some(_) => type_mismatch!(span, "`{}` is not a variable", name),
                None => not_found!(span, "unknown variable `{}`", name),
            },
            ExprKind::Array(items) => {
                let items = self.transform_exprs(items)?;
                let Some(first) = items.first() else {
                    type_mismatch!(span, "cannot infer the element type of an empty array literal");
                };
                let elem = first.ty.clone();
                for item in &items[1..] {
                    ensure_type(item.span, "array element", &elem, &item.ty)?;
                }
                Ok(hir::Expr::new(hir::ExprKind::Array(items), Type::array(elem), span))
            }
            ExprKind::Record(items) => {
                let items = self.transform_exprs(items)?;
                let ty = Type::Record(items.iter().map(|item| item.ty.clone()).collect());
                Ok(hir::Expr::new(hir::ExprKind::Record(items), ty, span))
            }
            ExprKind::StackAlloc { elem, len } => {
                let elem = self.resolve_type(elem, self.type_env(), span)?;
                let len = self.transform_expr(len)?;
                ensure_type(len.span, "array length", &Type::int(), &len.ty)?;
                Ok(hir::Expr::new(
                    hir::ExprKind::StackAlloc {
                        elem: elem.clone(),
                        len: Box::new(len),
                    },
                    Type::array(elem),
                    span,
                ))
            }
            ExprKind::Pipe(stages) => self.transform_pipe(stages, span),
            ExprKind::Ellipsis => match self.ellipsis_type() {
                Some(ty) => Ok(hir::Expr::new(hir::ExprKind::Ellipsis, ty.clone(), span)),
                None => structural!(span, "`...` used outside of a pipe or stage"),
            },
            ExprKind::Yield(value) => {
                let value = self.transform_yield(value.as_deref(), span)?;
                Ok(hir::Expr::new(
                    hir::ExprKind::Yield(value.map(Box::new)),
                    Type::Void,
                    span,
                ))
            }
            ExprKind::StmtExpr { stmts, value } => {
                let (stmts, value) = self.scoped(|this| {
                    let stmts = this.transform_stmts(stmts)?;
                    let value = this.transform_expr(value)?;
                    Ok((stmts, value))
                })?;
                let ty = value.ty.clone();
                Ok(hir::Expr::new(
                    hir::ExprKind::StmtExpr {
                        stmts,
                        value: Box::new(value),
                    },
                    ty,
                    span,
                ))
            }
        }
    }

    pub(crate) fn transform_exprs(&mut self, exprs: &[ast::Expr]) -> Result<Vec<hir::Expr>> {
        exprs.iter().map(|expr| self.transform_expr(expr)).collect()
    }

    fn transform_ident(&mut self, name: &str, span: Span) -> Result<hir::Expr> {
        match self.symbols.lookup(name).cloned() {
            Some(SymbolEntry::Variable(Variable { ty, binding })) => Ok(hir::Expr::new(
                hir::ExprKind::Var {
                    binding,
                    name: name.to_string(),
                },
                ty,
                span,
            )),
            Some(SymbolEntry::Function(template)) => self.function_value(template, Vec::new(), span),
            Some(SymbolEntry::Builtin(builtin)) => type_mismatch!(
                span,
                "builtin `{}` can only be called directly",
                builtin.name()
            ),
            Some(SymbolEntry::Class(_)) => {
                type_mismatch!(span, "class `{}` cannot be used as a value", name)
            }
            None => not_found!(span, "unknown name `{}`", name),
        }
    }

    fn transform_instantiated_value(
        &mut self,
        base: &str,
        args: &[ast::TypeExpr],
        span: Span,
    ) -> Result<hir::Expr> {
        match self.symbols.lookup(base).cloned() {
            Some(SymbolEntry::Function(template)) => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type(arg, self.type_env(), span))
                    .collect::<Result<Vec<_>>>()?;
                self.function_value(template, args, span)
            }
            Some(SymbolEntry::Class(_)) => {
                type_mismatch!(span, "class `{}` cannot be used as a value", base)
            }
            Some(_) => type_mismatch!(span, "`{}` does not take type arguments", base),
            None => not_found!(span, "unknown name `{}`", base),
        }
    }

    /// A realized function used as a first-class value.
    fn function_value(
        &mut self,
        template: sq_core::id::TemplateId,
        args: Vec<Type>,
        span: Span,
    ) -> Result<hir::Expr> {
        let def_generics = self.cache.function_template(template).def.generics.len();
        if def_generics != args.len() {
            let name = self.cache.function_template(template).def.name.clone();
            if args.is_empty() {
                type_mismatch!(
                    span,
                    "generic function `{}` needs explicit type arguments to be used as a value",
                    name
                );
            }
            return Err(crate::error::argument_count(
                span,
                &format!("type parameters of `{}`", name),
                def_generics,
                args.len(),
            ));
        }
        let handle = self.realize_function(template, args, span)?;
        let function = self.cache.function(handle);
        let Some(ty) = function.func_type() else {
            type_mismatch!(
                span,
                "type of recursive function `{}` is not known yet; add a return annotation",
                function.name
            );
        };
        Ok(hir::Expr::new(hir::ExprKind::FuncRef(handle), ty, span))
    }

    fn transform_pipe(&mut self, stages: &[ast::Expr], span: Span) -> Result<hir::Expr> {
        let Some((source, rest)) = stages.split_first() else {
            structural!(span, "empty pipe expression");
        };
        let mut lowered = vec![self.transform_expr(source)?];
        for stage in rest {
            let input = lowered
                .last()
                .map(|prev| prev.ty.clone())
                .unwrap_or(Type::Void);
            let call = pipe_stage_call(stage);
            let stage = self.with_ellipsis(input, |this| this.transform_expr(&call))?;
            lowered.push(stage);
        }
        let ty = lowered.last().map(|e| e.ty.clone()).unwrap_or(Type::Void);
        Ok(hir::Expr::new(hir::ExprKind::Pipe(lowered), ty, span))
    }

    /// Position and type of a field of a class object or record.
    pub(crate) fn member_slot(&mut self, base: &Type, field: &str, span: Span) -> Result<(usize, Type)> {
        match base {
            Type::Class(class) => {
                let handle = self.realize_class(class.template, class.args.clone(), span)?;
                let realized = self.cache.class(handle);
                match realized.field(field) {
                    Some((index, ty)) => Ok((index, ty.clone())),
                    None => not_found!(span, "class `{}` has no field `{}`", realized.name, field),
                }
            }
            Type::Record(items) => {
                let Ok(index) = field.parse::<usize>() else {
                    type_mismatch!(span, "record fields are positional, found `.{}`", field);
                };
                match items.get(index) {
                    Some(ty) => Ok((index, ty.clone())),
                    None => not_found!(span, "`{}` has no field {}", base, index),
                }
            }
            other => type_mismatch!(span, "`{}` has no fields", other),
        }
    }

    pub(crate) fn binary_type(&self, op: BinOp, lhs: &Type, rhs: &Type, span: Span) -> Result<Type> {
        if op.is_logical() {
            ensure_type(span, &format!("left operand of `{}`", op.symbol()), &Type::bool(), lhs)?;
            ensure_type(span, &format!("right operand of `{}`", op.symbol()), &Type::bool(), rhs)?;
            return Ok(Type::bool());
        }
        if lhs != rhs {
            type_mismatch!(
                span,
                "operands of `{}` differ: `{}` and `{}`",
                op.symbol(),
                lhs,
                rhs
            );
        }
        match op {
            BinOp::Eq | BinOp::Ne if !lhs.is_void() => Ok(Type::bool()),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
                if lhs.is_numeric() || lhs.is_sequence() =>
            {
                Ok(Type::bool())
            }
            BinOp::Add if lhs.is_numeric() || lhs.is_sequence() => Ok(lhs.clone()),
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem if lhs.is_numeric() => Ok(lhs.clone()),
            _ => type_mismatch!(
                span,
                "operator `{}` is not defined for `{}`",
                op.symbol(),
                lhs
            ),
        }
    }
}

fn literal(value: hir::Literal, ty: Type, span: Span) -> hir::Expr {
    hir::Expr::new(hir::ExprKind::Literal(value), ty, span)
}

/// Rewrites a pipe stage so it reads the flowing value through `...`.
/// A call without `...` receives it as its first argument and a callable
/// name is called with it. Literals and other expressions are left alone
/// and ignore the flowing value.
pub(crate) fn pipe_stage_call(stage: &ast::Expr) -> ast::Expr {
    if stage.mentions_ellipsis() {
        return stage.clone();
    }
    let ellipsis = ast::Expr::new(ExprKind::Ellipsis, stage.span);
    match &stage.kind {
        ExprKind::Call { callee, args } => {
            let mut with_input = vec![ellipsis];
            with_input.extend(args.iter().cloned());
            ast::Expr::new(
                ExprKind::Call {
                    callee: callee.clone(),
                    args: with_input,
                },
                stage.span,
            )
        }
        ExprKind::Ident(_) | ExprKind::Instantiate { .. } | ExprKind::Dot { .. } => ast::Expr::new(
            ExprKind::Call {
                callee: Box::new(stage.clone()),
                args: vec![ellipsis],
            },
            stage.span,
        ),
        _ => stage.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> ast::Expr {
        ast::Expr::new(ExprKind::Ident(name.into()), Span::null())
    }

    #[test]
    fn bare_stage_is_called_with_input() {
        let call = pipe_stage_call(&ident("f"));
        match call.kind {
            ExprKind::Call { callee, args } => {
                assert_eq!(callee.kind, ExprKind::Ident("f".into()));
                assert_eq!(args.len(), 1);
                assert_eq!(args[0].kind, ExprKind::Ellipsis);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn call_stage_gets_input_prepended() {
        let stage = ast::Expr::new(
            ExprKind::Call {
                callee: Box::new(ident("g")),
                args: vec![ast::Expr::new(ExprKind::Int(2), Span::null())],
            },
            Span::null(),
        );
        let ExprKind::Call { args, .. } = pipe_stage_call(&stage).kind else {
            panic!("expected call");
        };
        assert_eq!(args[0].kind, ExprKind::Ellipsis);
        assert_eq!(args[1].kind, ExprKind::Int(2));
    }

    #[test]
    fn literal_stage_is_left_alone() {
        let stage = ast::Expr::new(ExprKind::Int(7), Span::null());
        assert_eq!(pipe_stage_call(&stage), stage);
    }
}
