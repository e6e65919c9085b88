use itertools::Itertools;
use sq_core::types::{ClassRef, FuncType, Type};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnifyError {
    #[error("expected `{expected}`, found `{found}`")]
    Mismatch { expected: Type, found: Type },
    #[error("expected {expected} elements, found {found}")]
    Length { expected: usize, found: usize },
    #[error("`{param}` would contain itself in `{ty}`")]
    Occurs { param: String, ty: Type },
}

/// Bindings of generic parameter names to types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Substitution {
    bindings: BTreeMap<String, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(params: &[String], args: &[Type]) -> Self {
        let bindings = params.iter().cloned().zip(args.iter().cloned()).collect();
        Self { bindings }
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bound arguments in the given parameter order, or the first missing name.
    pub fn ordered(&self, params: &[String]) -> Result<Vec<Type>, String> {
        params
            .iter()
            .map(|name| self.get(name).cloned().ok_or_else(|| name.clone()))
            .collect()
    }
}

pub fn is_generic(ty: &Type) -> bool {
    ty.is_generic()
}

fn occurs(param: &str, ty: &Type) -> bool {
    match ty {
        Type::Generic(name) => name == param,
        Type::Array(inner) | Type::Ptr(inner) => occurs(param, inner),
        Type::Record(items) => items.iter().any(|item| occurs(param, item)),
        Type::Func(func) => {
            func.params.iter().any(|item| occurs(param, item)) || occurs(param, &func.ret)
        }
        Type::Class(class) => class.args.iter().any(|item| occurs(param, item)),
        Type::Any | Type::Void | Type::Atomic(_) | Type::Sequence(_) => false,
    }
}

fn bind_param(name: &str, ty: &Type, subst: &mut Substitution) -> Result<Type, UnifyError> {
    if let Some(bound) = subst.get(name).cloned() {
        return unify(&bound, ty, subst);
    }
    if let Type::Generic(other) = ty {
        if other == name {
            return Ok(ty.clone());
        }
    }
    if occurs(name, ty) {
        return Err(UnifyError::Occurs {
            param: name.to_string(),
            ty: ty.clone(),
        });
    }
    subst.bind(name, ty.clone());
    Ok(ty.clone())
}

fn unify_all(
    expected: &[Type],
    found: &[Type],
    subst: &mut Substitution,
) -> Result<Vec<Type>, UnifyError> {
    if expected.len() != found.len() {
        return Err(UnifyError::Length {
            expected: expected.len(),
            found: found.len(),
        });
    }
    expected
        .iter()
        .zip(found)
        .map(|(a, b)| unify(a, b, subst))
        .collect()
}

/// Structural unification. Free generic parameters are bound on their first
/// occurrence and checked for consistency on every later one.
pub fn unify(expected: &Type, found: &Type, subst: &mut Substitution) -> Result<Type, UnifyError> {
    match (expected, found) {
        (Type::Generic(name), other) | (other, Type::Generic(name)) => {
            bind_param(name, other, subst)
        }
        (Type::Any, other) | (other, Type::Any) => Ok(other.clone()),
        (Type::Array(a), Type::Array(b)) => Ok(Type::Array(Box::new(unify(a, b, subst)?))),
        (Type::Ptr(a), Type::Ptr(b)) => Ok(Type::Ptr(Box::new(unify(a, b, subst)?))),
        (Type::Record(a), Type::Record(b)) => Ok(Type::Record(unify_all(a, b, subst)?)),
        (Type::Func(a), Type::Func(b)) => {
            let params = unify_all(&a.params, &b.params, subst)?;
            let ret = unify(&a.ret, &b.ret, subst)?;
            Ok(Type::Func(FuncType {
                params,
                ret: Box::new(ret),
            }))
        }
        (Type::Class(a), Type::Class(b)) if a.template == b.template => {
            let args = unify_all(&a.args, &b.args, subst)?;
            Ok(Type::Class(ClassRef {
                template: a.template,
                name: a.name.clone(),
                args,
            }))
        }
        (a, b) if a == b => Ok(a.clone()),
        (a, b) => Err(UnifyError::Mismatch {
            expected: a.clone(),
            found: b.clone(),
        }),
    }
}

/// Replaces bound parameters; unbound ones are left in place.
pub fn substitute(ty: &Type, subst: &Substitution) -> Type {
    match ty {
        Type::Generic(name) => match subst.get(name) {
            Some(bound) => substitute(bound, subst),
            None => ty.clone(),
        },
        Type::Array(inner) => Type::Array(Box::new(substitute(inner, subst))),
        Type::Ptr(inner) => Type::Ptr(Box::new(substitute(inner, subst))),
        Type::Record(items) => Type::Record(items.iter().map(|t| substitute(t, subst)).collect()),
        Type::Func(func) => Type::Func(FuncType {
            params: func.params.iter().map(|t| substitute(t, subst)).collect(),
            ret: Box::new(substitute(&func.ret, subst)),
        }),
        Type::Class(class) => Type::Class(ClassRef {
            template: class.template,
            name: class.name.clone(),
            args: class.args.iter().map(|t| substitute(t, subst)).collect(),
        }),
        Type::Any | Type::Void | Type::Atomic(_) | Type::Sequence(_) => ty.clone(),
    }
}

/// Deterministic display name of a realization, `id[int]`.
pub fn instance_name(base: &str, args: &[Type]) -> String {
    if args.is_empty() {
        base.to_string()
    } else {
        format!("{}[{}]", base, args.iter().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sq_core::id::TemplateId;

    fn list_of(arg: Type) -> Type {
        Type::Class(ClassRef {
            template: TemplateId(7),
            name: "List".into(),
            args: vec![arg],
        })
    }

    #[test]
    fn binds_on_first_occurrence() {
        let mut subst = Substitution::new();
        let pattern = Type::func(vec![Type::generic("T"), Type::generic("T")], Type::generic("T"));
        let actual = Type::func(vec![Type::int(), Type::int()], Type::int());
        let unified = unify(&pattern, &actual, &mut subst).expect("unify");
        assert_eq!(unified, actual);
        assert_eq!(subst.get("T"), Some(&Type::int()));
    }

    #[test]
    fn rejects_inconsistent_rebinding() {
        let mut subst = Substitution::new();
        let pattern = Type::Record(vec![Type::generic("T"), Type::generic("T")]);
        let actual = Type::Record(vec![Type::int(), Type::bool()]);
        let err = unify(&pattern, &actual, &mut subst).expect_err("mismatch");
        assert_eq!(
            err,
            UnifyError::Mismatch {
                expected: Type::int(),
                found: Type::bool()
            }
        );
    }

    #[test]
    fn unifies_through_class_arguments() {
        let mut subst = Substitution::new();
        unify(&list_of(Type::generic("T")), &list_of(Type::seq()), &mut subst).expect("unify");
        assert_eq!(
            substitute(&Type::array(Type::generic("T")), &subst),
            Type::array(Type::seq())
        );
    }

    #[test]
    fn occurs_check_prevents_infinite_types() {
        let mut subst = Substitution::new();
        let err = unify(&Type::generic("T"), &Type::array(Type::generic("T")), &mut subst)
            .expect_err("occurs");
        assert!(matches!(err, UnifyError::Occurs { .. }));
    }

    #[test]
    fn substitution_leaves_unbound_params() {
        let mut subst = Substitution::new();
        subst.bind("T", Type::int());
        let ty = Type::Record(vec![Type::generic("T"), Type::generic("U")]);
        let result = substitute(&ty, &subst);
        assert_eq!(result, Type::Record(vec![Type::int(), Type::generic("U")]));
        assert!(is_generic(&result));
    }

    #[test]
    fn ordered_reports_missing_param() {
        let mut subst = Substitution::new();
        subst.bind("T", Type::int());
        let params = vec!["T".to_string(), "U".to_string()];
        assert_eq!(subst.ordered(&params), Err("U".to_string()));
    }

    #[test]
    fn instance_names_are_deterministic() {
        assert_eq!(instance_name("id", &[Type::int()]), "id[int]");
        assert_eq!(instance_name("main", &[]), "main");
    }
}
