use super::types::{bound_env, symbolic_env};
use super::{FunctionFrame, TargetContext, Transformer};
use crate::error::{argument_count, ensure_type, unify_error};
use crate::realize::{EntityId, FunctionTemplate, RealizationKey, RealizedParam};
use sq_core::ast::{self, ExprKind, GenericParam, TypeExpr};
use sq_core::error::Error;
use sq_core::hir;
use sq_core::id::{ClassHandle, FuncHandle, TemplateId};
use sq_core::span::Span;
use sq_core::symbols::{Binding, Builtin, SymbolEntry, Variable};
use sq_core::types::{ClassRef, Type};
use sq_core::{not_found, type_mismatch, Result};
use sq_typing::{instance_name, unify, Substitution};
use std::rc::Rc;

impl Transformer {
    pub(crate) fn transform_call(
        &mut self,
        callee: &ast::Expr,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<hir::Expr> {
        match &callee.kind {
            ExprKind::Ident(name) => match self.symbols.lookup(name).cloned() {
                Some(SymbolEntry::Builtin(builtin)) => self.call_builtin(builtin, args, span),
                Some(SymbolEntry::Function(template)) => {
                    self.call_template(template, None, args, span)
                }
                Some(SymbolEntry::Class(template)) => self.construct(template, None, args, span),
                Some(SymbolEntry::Variable(_)) => {
                    let callee = self.transform_expr(callee)?;
                    self.indirect_call(callee, args, span)
                }
                None => not_found!(callee.span, "unknown function `{}`", name),
            },
            ExprKind::Instantiate {
                base,
                args: type_args,
            } => {
                let entry = self.symbols.lookup(base).cloned();
                let type_args = type_args
                    .iter()
                    .map(|arg| self.resolve_type(arg, self.type_env(), span))
                    .collect::<Result<Vec<_>>>()?;
                match entry {
                    Some(SymbolEntry::Function(template)) => {
                        self.call_template(template, Some(type_args), args, span)
                    }
                    Some(SymbolEntry::Class(template)) => {
                        self.construct(template, Some(type_args), args, span)
                    }
                    Some(_) => type_mismatch!(span, "`{}` does not take type arguments", base),
                    None => not_found!(span, "unknown function `{}`", base),
                }
            }
            ExprKind::Dot { base, field } => {
                let receiver = self.transform_expr(base)?;
                if let Some(class) = receiver.ty.as_class() {
                    let method = self
                        .cache
                        .class_template(class.template)
                        .methods
                        .get(field)
                        .copied();
                    if let Some(method) = method {
                        return self.call_method(method, receiver, field, args, span);
                    }
                }
                let (index, ty) = self.member_slot(&receiver.ty, field, span)?;
                let value = hir::Expr::new(
                    hir::ExprKind::Dot {
                        base: Box::new(receiver),
                        index,
                        field: field.clone(),
                    },
                    ty,
                    span,
                );
                self.indirect_call(value, args, span)
            }
            _ => {
                let callee = self.transform_expr(callee)?;
                self.indirect_call(callee, args, span)
            }
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[ast::Expr], span: Span) -> Result<hir::Expr> {
        let args = self.transform_exprs(args)?;
        if args.len() != builtin.arity() {
            return Err(argument_count(
                span,
                &format!("builtin `{}`", builtin.name()),
                builtin.arity(),
                args.len(),
            ));
        }
        let arg = &args[0];
        if arg.ty.is_void() {
            type_mismatch!(arg.span, "cannot pass a void value to `{}`", builtin.name());
        }
        let ty = match builtin {
            Builtin::Print => Type::Void,
            Builtin::Len => {
                if arg.ty.element().is_none() {
                    type_mismatch!(arg.span, "`len` expects an array or sequence, found `{}`", arg.ty);
                }
                Type::int()
            }
            Builtin::Str => Type::str(),
        };
        Ok(hir::Expr::new(
            hir::ExprKind::Call {
                callee: hir::Callee::Builtin(builtin),
                args,
            },
            ty,
            span,
        ))
    }

    fn call_template(
        &mut self,
        template: TemplateId,
        explicit: Option<Vec<Type>>,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<hir::Expr> {
        let function = self.cache.function_template(template);
        let args = self.transform_exprs(args)?;
        let what = format!("function `{}`", function.def.name);
        if function.def.params.len() != args.len() {
            return Err(argument_count(span, &what, function.def.params.len(), args.len()));
        }
        let patterns = function
            .def
            .params
            .iter()
            .map(|param| param.ty.clone())
            .collect::<Vec<_>>();
        let bound = self.bind_generics(
            &function.def.name,
            &function.def.generics,
            explicit,
            &patterns,
            &args,
            span,
        )?;
        let handle = self.realize_function(template, bound, span)?;
        self.direct_call(handle, args, span)
    }

    fn call_method(
        &mut self,
        method: TemplateId,
        receiver: hir::Expr,
        name: &str,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<hir::Expr> {
        let handle = self.realize_method(method, &receiver.ty, span)?;
        let args = self.transform_exprs(args)?;
        let expected = self.cache.function(handle).params.len().saturating_sub(1);
        if expected != args.len() {
            let what = format!("method `{}.{}`", receiver.ty, name);
            return Err(argument_count(span, &what, expected, args.len()));
        }
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver);
        all.extend(args);
        self.direct_call(handle, all, span)
    }

    fn direct_call(&self, handle: FuncHandle, args: Vec<hir::Expr>, span: Span) -> Result<hir::Expr> {
        let function = self.cache.function(handle);
        for (param, arg) in function.params.iter().zip(&args) {
            ensure_type(
                arg.span,
                &format!("argument `{}` of `{}`", param.name, function.name),
                &param.ty,
                &arg.ty,
            )?;
        }
        let Some(ret) = function.ret.clone() else {
            type_mismatch!(
                span,
                "return type of `{}` is not known at this recursive call; add a return annotation",
                function.name
            );
        };
        Ok(hir::Expr::new(
            hir::ExprKind::Call {
                callee: hir::Callee::Func(handle),
                args,
            },
            ret,
            span,
        ))
    }

    fn indirect_call(&mut self, callee: hir::Expr, args: &[ast::Expr], span: Span) -> Result<hir::Expr> {
        let Type::Func(func) = callee.ty.clone() else {
            type_mismatch!(span, "value of type `{}` is not callable", callee.ty);
        };
        let args = self.transform_exprs(args)?;
        if func.params.len() != args.len() {
            return Err(argument_count(span, "function value", func.params.len(), args.len()));
        }
        for (param, arg) in func.params.iter().zip(&args) {
            ensure_type(arg.span, "argument of function value", param, &arg.ty)?;
        }
        Ok(hir::Expr::new(
            hir::ExprKind::Call {
                callee: hir::Callee::Value(Box::new(callee)),
                args,
            },
            *func.ret,
            span,
        ))
    }

    /// Bound arguments for a generic call site, either given explicitly or
    /// inferred by unifying parameter patterns with argument types.
    fn bind_generics(
        &self,
        owner: &str,
        generics: &[GenericParam],
        explicit: Option<Vec<Type>>,
        patterns: &[TypeExpr],
        args: &[hir::Expr],
        span: Span,
    ) -> Result<Vec<Type>> {
        if let Some(explicit) = explicit {
            if explicit.len() != generics.len() {
                return Err(argument_count(
                    span,
                    &format!("type parameters of `{}`", owner),
                    generics.len(),
                    explicit.len(),
                ));
            }
            return Ok(explicit);
        }
        if generics.is_empty() {
            return Ok(Vec::new());
        }
        let env = symbolic_env(generics);
        let mut subst = Substitution::new();
        for (pattern, arg) in patterns.iter().zip(args) {
            let pattern = self.resolve_type(pattern, &env, span)?;
            unify(&pattern, &arg.ty, &mut subst)
                .map_err(|err| unify_error(arg.span, &format!("argument of `{}`", owner), err))?;
        }
        let names = generics.iter().map(|g| g.name.clone()).collect::<Vec<_>>();
        subst.ordered(&names).map_err(|missing| {
            Error::type_mismatch(
                span,
                format!("cannot infer type parameter `{}` of `{}`", missing, owner),
            )
        })
    }

    fn construct(
        &mut self,
        template: TemplateId,
        explicit: Option<Vec<Type>>,
        args: &[ast::Expr],
        span: Span,
    ) -> Result<hir::Expr> {
        let class = self.cache.class_template(template);
        let args = self.transform_exprs(args)?;
        let init = class.methods.get("__init__").copied();
        let patterns = match init {
            Some(init) => self
                .cache
                .function_template(init)
                .def
                .params
                .iter()
                .map(|param| param.ty.clone())
                .collect::<Vec<_>>(),
            None => class.def.fields.iter().map(|field| field.ty.clone()).collect(),
        };
        if patterns.len() != args.len() {
            return Err(argument_count(
                span,
                &format!("constructor of `{}`", class.def.name),
                patterns.len(),
                args.len(),
            ));
        }
        let bound = self.bind_generics(
            &class.def.name,
            &class.def.generics,
            explicit,
            &patterns,
            &args,
            span,
        )?;
        let handle = self.realize_class(template, bound, span)?;
        let realized = self.cache.class(handle);
        let ty = realized.ty.clone();
        match init {
            Some(init) => {
                let init = self.realize_method(init, &ty, span)?;
                let function = self.cache.function(init);
                for (param, arg) in function.params.iter().skip(1).zip(&args) {
                    ensure_type(
                        arg.span,
                        &format!("argument `{}` of `{}`", param.name, function.name),
                        &param.ty,
                        &arg.ty,
                    )?;
                }
                Ok(hir::Expr::new(
                    hir::ExprKind::Construct {
                        class: handle,
                        init,
                        args,
                    },
                    ty,
                    span,
                ))
            }
            None => {
                for ((name, field_ty), arg) in realized.fields.iter().zip(&args) {
                    ensure_type(
                        arg.span,
                        &format!("field `{}` of `{}`", name, realized.name),
                        field_ty,
                        &arg.ty,
                    )?;
                }
                Ok(hir::Expr::new(
                    hir::ExprKind::New {
                        class: handle,
                        fields: args,
                    },
                    ty,
                    span,
                ))
            }
        }
    }

    /// Realizes a function or method template for concrete bound arguments.
    /// For methods the arguments are those of the owning class.
    pub(crate) fn realize_function(
        &mut self,
        template: TemplateId,
        args: Vec<Type>,
        span: Span,
    ) -> Result<FuncHandle> {
        let function = self.cache.function_template(template);
        let (entity, generics, receiver) = match function.owner {
            Some(owner) => {
                let class = self.cache.class_template(owner);
                let receiver = Type::Class(ClassRef {
                    template: owner,
                    name: class.def.name.clone(),
                    args: args.clone(),
                });
                (EntityId::Method(template), class.def.generics.clone(), Some(receiver))
            }
            None => (EntityId::Function(template), function.def.generics.clone(), None),
        };
        if generics.len() != args.len() {
            return Err(argument_count(
                span,
                &format!("type parameters of `{}`", function.def.name),
                generics.len(),
                args.len(),
            ));
        }
        let key = RealizationKey::new(entity, args.clone());
        if let Some(handle) = self.cache.lookup_function(&key) {
            return Ok(handle);
        }
        let name = match &receiver {
            Some(receiver) => format!("{}.{}", receiver, function.def.name),
            None => instance_name(&function.def.name, &args),
        };
        self.check_bounds(&name, &generics, &args, span)?;
        self.enter_realization(&name, span)?;
        let env = bound_env(&generics, &args);
        let result = self.realize_function_body(&function, key, name, env, receiver);
        self.leave_realization();
        result
    }

    fn realize_function_body(
        &mut self,
        function: &Rc<FunctionTemplate>,
        key: RealizationKey,
        name: String,
        env: super::TypeEnv,
        receiver: Option<Type>,
    ) -> Result<FuncHandle> {
        let ellipsis = std::mem::take(&mut self.ellipsis);
        self.symbols.push_function_scope(function.scope.clone());
        self.type_envs.push(env.clone());
        let result = self.realize_in_function_scope(function, key, name, &env, receiver);
        self.type_envs.pop();
        self.symbols.pop_scope();
        self.ellipsis = ellipsis;
        result
    }

    fn realize_in_function_scope(
        &mut self,
        function: &Rc<FunctionTemplate>,
        key: RealizationKey,
        name: String,
        env: &super::TypeEnv,
        receiver: Option<Type>,
    ) -> Result<FuncHandle> {
        let def = &function.def;
        let mut params = Vec::with_capacity(def.params.len() + 1);
        if let Some(receiver) = receiver {
            params.push(RealizedParam {
                var: self.fresh_var(),
                name: "self".into(),
                ty: receiver,
            });
        }
        for param in &def.params {
            let ty = self.resolve_type(&param.ty, env, def.span)?;
            params.push(RealizedParam {
                var: self.fresh_var(),
                name: param.name.clone(),
                ty,
            });
        }
        let declared = match &def.ret {
            Some(ret) => {
                let ty = self.resolve_type(ret, env, def.span)?;
                Some(if function.generator { Type::array(ty) } else { ty })
            }
            None => None,
        };
        let handle = self.cache.insert_function(
            key,
            name.clone(),
            params.clone(),
            declared.clone(),
            function.generator,
        );
        tracing::debug!("[realize] instantiated {} -> {}", def.name, name);

        self.contexts.push(TargetContext {
            loop_depth: 0,
            function: Some(FunctionFrame {
                handle,
                name,
                ret: declared,
                generator: function.generator,
            }),
        });
        for param in &params {
            self.symbols.define(
                param.name.clone(),
                SymbolEntry::Variable(Variable {
                    ty: param.ty.clone(),
                    binding: Binding::Local(param.var),
                }),
            );
        }
        let body = self.transform_stmts(&def.body);
        let context = self.contexts.pop();
        let body = body?;

        let ret = context
            .and_then(|context| context.function)
            .and_then(|frame| frame.ret)
            .unwrap_or(if function.generator {
                Type::array(Type::Void)
            } else {
                Type::Void
            });
        self.cache.complete_function(handle, body, ret);
        Ok(handle)
    }

    pub(crate) fn realize_method(
        &mut self,
        method: TemplateId,
        receiver: &Type,
        span: Span,
    ) -> Result<FuncHandle> {
        let Some(class) = receiver.as_class() else {
            sq_core::ice!("method receiver `{}` is not a class", receiver);
        };
        self.realize_function(method, class.args.clone(), span)
    }

    pub(crate) fn realize_class(
        &mut self,
        template: TemplateId,
        args: Vec<Type>,
        span: Span,
    ) -> Result<ClassHandle> {
        let class = self.cache.class_template(template);
        let generics = &class.def.generics;
        if generics.len() != args.len() {
            return Err(argument_count(
                span,
                &format!("type parameters of class `{}`", class.def.name),
                generics.len(),
                args.len(),
            ));
        }
        let key = RealizationKey::new(EntityId::Class(template), args.clone());
        if let Some(handle) = self.cache.lookup_class(&key) {
            return Ok(handle);
        }
        let name = instance_name(&class.def.name, &args);
        self.check_bounds(&name, generics, &args, span)?;
        let ty = Type::Class(ClassRef {
            template,
            name: class.def.name.clone(),
            args: args.clone(),
        });
        let handle = self.cache.insert_class(key, name.clone(), ty);
        tracing::debug!("[realize] instantiated {} -> {}", class.def.name, name);
        let env = bound_env(generics, &args);
        self.symbols.push_function_scope(class.scope.clone());
        let fields = class
            .def
            .fields
            .iter()
            .map(|field| Ok((field.name.clone(), self.resolve_type(&field.ty, &env, class.def.span)?)))
            .collect::<Result<Vec<_>>>();
        self.symbols.pop_scope();
        let fields = fields?;
        self.cache.complete_class(handle, fields);
        Ok(handle)
    }
}
