use crate::id::TemplateId;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicKind {
    Int,
    Float,
    Bool,
    Byte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeqKind {
    /// Nucleotide sequence.
    Seq,
    Str,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

/// A class type. Realized classes are identified by their template and
/// concrete arguments; their fields live in the realization cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassRef {
    pub template: TemplateId,
    pub name: String,
    pub args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Top type. Only used for caught exception slots and builtin parameters.
    Any,
    Void,
    Atomic(AtomicKind),
    Sequence(SeqKind),
    Array(Box<Type>),
    Ptr(Box<Type>),
    Record(Vec<Type>),
    Func(FuncType),
    Generic(String),
    Class(ClassRef),
}

impl Type {
    pub fn int() -> Type {
        Type::Atomic(AtomicKind::Int)
    }

    pub fn float() -> Type {
        Type::Atomic(AtomicKind::Float)
    }

    pub fn bool() -> Type {
        Type::Atomic(AtomicKind::Bool)
    }

    pub fn byte() -> Type {
        Type::Atomic(AtomicKind::Byte)
    }

    pub fn str() -> Type {
        Type::Sequence(SeqKind::Str)
    }

    pub fn seq() -> Type {
        Type::Sequence(SeqKind::Seq)
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn ptr(elem: Type) -> Type {
        Type::Ptr(Box::new(elem))
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func(FuncType {
            params,
            ret: Box::new(ret),
        })
    }

    pub fn generic(name: impl Into<String>) -> Type {
        Type::Generic(name.into())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Atomic(AtomicKind::Int | AtomicKind::Float | AtomicKind::Byte)
        )
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Type::Sequence(_))
    }

    /// True while any generic parameter remains unbound.
    pub fn is_generic(&self) -> bool {
        match self {
            Type::Generic(_) => true,
            Type::Array(inner) | Type::Ptr(inner) => inner.is_generic(),
            Type::Record(items) => items.iter().any(Type::is_generic),
            Type::Func(func) => func.params.iter().any(Type::is_generic) || func.ret.is_generic(),
            Type::Class(class) => class.args.iter().any(Type::is_generic),
            Type::Any | Type::Void | Type::Atomic(_) | Type::Sequence(_) => false,
        }
    }

    /// Element type produced by indexing or iterating.
    pub fn element(&self) -> Option<Type> {
        match self {
            Type::Array(inner) => Some(inner.as_ref().clone()),
            Type::Sequence(kind) => Some(Type::Sequence(*kind)),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Type::Class(class) => Some(class),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Void => write!(f, "void"),
            Type::Atomic(AtomicKind::Int) => write!(f, "int"),
            Type::Atomic(AtomicKind::Float) => write!(f, "float"),
            Type::Atomic(AtomicKind::Bool) => write!(f, "bool"),
            Type::Atomic(AtomicKind::Byte) => write!(f, "byte"),
            Type::Sequence(SeqKind::Seq) => write!(f, "seq"),
            Type::Sequence(SeqKind::Str) => write!(f, "str"),
            Type::Array(inner) => write!(f, "array[{}]", inner),
            Type::Ptr(inner) => write!(f, "ptr[{}]", inner),
            Type::Record(items) => write!(f, "record[{}]", items.iter().join(",")),
            Type::Func(func) => write!(
                f,
                "function[{}]",
                func.params
                    .iter()
                    .chain(std::iter::once(func.ret.as_ref()))
                    .join(",")
            ),
            Type::Generic(name) => write!(f, "{}", name),
            Type::Class(class) if class.args.is_empty() => write!(f, "{}", class.name),
            Type::Class(class) => write!(f, "{}[{}]", class.name, class.args.iter().join(",")),
        }
    }
}

/// The builtin atomic and sequence types of one compilation run.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    builtins: HashMap<&'static str, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let builtins = [
            ("any", Type::Any),
            ("void", Type::Void),
            ("int", Type::int()),
            ("float", Type::float()),
            ("bool", Type::bool()),
            ("byte", Type::byte()),
            ("seq", Type::seq()),
            ("str", Type::str()),
        ]
        .into_iter()
        .collect();
        Self { builtins }
    }

    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.builtins.get(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Names of the parameterized builtin constructors.
    pub fn is_constructor(&self, name: &str) -> bool {
        matches!(name, "array" | "ptr" | "record" | "function")
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_nested_types() {
        let node = Type::Class(ClassRef {
            template: TemplateId(0),
            name: "Node".into(),
            args: vec![Type::int()],
        });
        assert_eq!(Type::array(node).to_string(), "array[Node[int]]");
        assert_eq!(
            Type::func(vec![Type::str()], Type::bool()).to_string(),
            "function[str,bool]"
        );
    }

    #[test]
    fn generic_detection_is_structural() {
        assert!(Type::array(Type::generic("T")).is_generic());
        assert!(!Type::Record(vec![Type::int(), Type::seq()]).is_generic());
    }

    #[test]
    fn registry_holds_builtins() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.lookup("seq"), Some(&Type::seq()));
        assert!(registry.lookup("Node").is_none());
    }
}
