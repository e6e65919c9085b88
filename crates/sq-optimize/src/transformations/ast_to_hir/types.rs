use super::Transformer;
use sq_core::ast::{GenericParam, TypeExpr};
use sq_core::span::Span;
use sq_core::symbols::SymbolEntry;
use sq_core::types::{ClassRef, Type};
use sq_core::{arity, not_found, type_mismatch, Result};
use std::collections::HashMap;

/// Generic parameters in scope while resolving a type expression.
pub type TypeEnv = HashMap<String, Type>;

/// Environment in which every parameter stays symbolic, used to build the
/// pattern side of call-site unification.
pub fn symbolic_env(generics: &[GenericParam]) -> TypeEnv {
    generics
        .iter()
        .map(|g| (g.name.clone(), Type::generic(g.name.clone())))
        .collect()
}

pub fn bound_env(generics: &[GenericParam], args: &[Type]) -> TypeEnv {
    generics
        .iter()
        .map(|g| g.name.clone())
        .zip(args.iter().cloned())
        .collect()
}

impl Transformer {
    pub fn resolve_type(&self, expr: &TypeExpr, env: &TypeEnv, span: Span) -> Result<Type> {
        match expr {
            TypeExpr::Name(name) => {
                if let Some(ty) = env.get(name) {
                    return Ok(ty.clone());
                }
                if let Some(ty) = self.registry.lookup(name) {
                    return Ok(ty.clone());
                }
                if self.registry.is_constructor(name) {
                    arity!(span, "type `{}` requires type arguments", name);
                }
                self.class_type(name, Vec::new(), span)
            }
            TypeExpr::Apply { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.resolve_type(arg, env, span))
                    .collect::<Result<Vec<_>>>()?;
                match name.as_str() {
                    "array" | "ptr" => {
                        if args.len() != 1 {
                            arity!(span, "`{}` takes 1 type argument, found {}", name, args.len());
                        }
                        let elem = args.into_iter().next().unwrap_or(Type::Void);
                        Ok(if name == "array" {
                            Type::array(elem)
                        } else {
                            Type::ptr(elem)
                        })
                    }
                    "record" => Ok(Type::Record(args)),
                    "function" => {
                        let mut args = args;
                        let Some(ret) = args.pop() else {
                            arity!(span, "`function` needs at least a return type");
                        };
                        Ok(Type::func(args, ret))
                    }
                    _ if self.registry.is_builtin(name) => {
                        type_mismatch!(span, "type `{}` does not take type arguments", name)
                    }
                    _ => self.class_type(name, args, span),
                }
            }
        }
    }

    fn class_type(&self, name: &str, args: Vec<Type>, span: Span) -> Result<Type> {
        match self.symbols.lookup(name) {
            Some(SymbolEntry::Class(template)) => {
                let template = self.cache.class_template(*template);
                let expected = template.def.generics.len();
                if expected != args.len() {
                    arity!(
                        span,
                        "class `{}` takes {} type argument{}, found {}",
                        name,
                        expected,
                        if expected == 1 { "" } else { "s" },
                        args.len()
                    );
                }
                Ok(Type::Class(ClassRef {
                    template: template.id,
                    name: name.to_string(),
                    args,
                }))
            }
            Some(_) => type_mismatch!(span, "`{}` is not a type", name),
            None => not_found!(span, "unknown type `{}`", name),
        }
    }

    /// Checks bound arguments against their parameters' allowed-type lists.
    pub(crate) fn check_bounds(
        &self,
        owner: &str,
        generics: &[GenericParam],
        args: &[Type],
        span: Span,
    ) -> Result<()> {
        for (param, arg) in generics.iter().zip(args) {
            if arg.is_generic() {
                type_mismatch!(
                    span,
                    "cannot realize `{}` with unresolved type `{}`",
                    owner,
                    arg
                );
            }
            if param.bound.is_empty() {
                continue;
            }
            let allowed = param
                .bound
                .iter()
                .map(|bound| self.resolve_type(bound, &TypeEnv::new(), span))
                .collect::<Result<Vec<_>>>()?;
            if !allowed.contains(arg) {
                type_mismatch!(
                    span,
                    "type `{}` does not satisfy the constraint on `{}` of `{}`",
                    arg,
                    param.name,
                    owner
                );
            }
        }
        Ok(())
    }
}
