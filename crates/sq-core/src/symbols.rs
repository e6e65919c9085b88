use crate::id::{GlobalId, TemplateId, VarId};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a variable's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    Local(VarId),
    Global(GlobalId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub ty: Type,
    pub binding: Binding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Builtin {
    Print,
    Len,
    Str,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
        }
    }

    pub fn arity(self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolEntry {
    Variable(Variable),
    Function(TemplateId),
    Builtin(Builtin),
    Class(TemplateId),
}

/// Functions and classes visible at the point a template was declared.
pub type Declarations = HashMap<String, SymbolEntry>;

#[derive(Debug, Default)]
struct Scope {
    names: HashMap<String, SymbolEntry>,
    /// Lookups that reach a barrier consult `captured`, then the root scope.
    barrier: bool,
    captured: Declarations,
}

/// Chain of lexical scopes. The innermost scope wins; the root scope holds
/// builtins and module globals for the lifetime of one compilation unit.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut root = Scope::default();
        for builtin in [Builtin::Print, Builtin::Len, Builtin::Str] {
            root.names
                .insert(builtin.name().to_string(), SymbolEntry::Builtin(builtin));
        }
        Self { scopes: vec![root] }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Opens the outermost scope of a function body. Enclosing non-root
    /// scopes become invisible until it is popped; only the `captured`
    /// declarations of the defining site and the root scope stay visible.
    pub fn push_function_scope(&mut self, captured: Declarations) {
        self.scopes.push(Scope {
            names: HashMap::new(),
            barrier: true,
            captured,
        });
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() == 1 {
            crate::ice!("attempted to pop the root scope");
        }
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_root(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn define(&mut self, name: impl Into<String>, entry: SymbolEntry) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.into(), entry);
        }
    }

    pub fn define_root(&mut self, name: impl Into<String>, entry: SymbolEntry) {
        self.scopes[0].names.insert(name.into(), entry);
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        for scope in self.scopes.iter().skip(1).rev() {
            if let Some(entry) = scope.names.get(name) {
                return Some(entry);
            }
            if scope.barrier {
                if let Some(entry) = scope.captured.get(name) {
                    return Some(entry);
                }
                break;
            }
        }
        self.scopes[0].names.get(name)
    }

    /// Non-root function and class entries visible from the current scope,
    /// innermost first. Root entries are left out since every body sees them.
    pub fn visible_declarations(&self) -> Declarations {
        let mut visible = Declarations::new();
        let mut keep = |names: &HashMap<String, SymbolEntry>| {
            for (name, entry) in names {
                if matches!(entry, SymbolEntry::Function(_) | SymbolEntry::Class(_)) {
                    visible.entry(name.clone()).or_insert_with(|| entry.clone());
                }
            }
        };
        for scope in self.scopes.iter().skip(1).rev() {
            keep(&scope.names);
            if scope.barrier {
                keep(&scope.captured);
                break;
            }
        }
        visible
    }

    pub fn lookup_in_current(&self, name: &str) -> Option<&SymbolEntry> {
        self.scopes.last().and_then(|scope| scope.names.get(name))
    }

    pub fn lookup_root(&self, name: &str) -> Option<&SymbolEntry> {
        self.scopes[0].names.get(name)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: u32) -> SymbolEntry {
        SymbolEntry::Variable(Variable {
            ty: Type::int(),
            binding: Binding::Local(VarId(id)),
        })
    }

    #[test]
    fn innermost_scope_shadows() {
        let mut table = SymbolTable::new();
        table.define("x", local(0));
        table.push_scope();
        table.define("x", local(1));
        assert_eq!(table.lookup("x"), Some(&local(1)));
        table.pop_scope();
        assert_eq!(table.lookup("x"), Some(&local(0)));
    }

    #[test]
    fn popped_names_are_gone() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.define("tmp", local(3));
        table.pop_scope();
        assert!(table.lookup("tmp").is_none());
    }

    #[test]
    fn function_scope_sees_only_root() {
        let mut table = SymbolTable::new();
        table.define("global", local(0));
        table.push_scope();
        table.define("outer", local(1));
        table.push_function_scope(Declarations::new());
        table.define("param", local(2));
        table.push_scope();
        assert!(table.lookup("param").is_some());
        assert!(table.lookup("global").is_some());
        assert!(table.lookup("outer").is_none());
        assert!(matches!(table.lookup("print"), Some(SymbolEntry::Builtin(Builtin::Print))));
    }

    #[test]
    fn function_scope_sees_captured_declarations() {
        let mut table = SymbolTable::new();
        table.push_scope();
        table.define("helper", SymbolEntry::Function(TemplateId(4)));
        table.define("outer", local(1));
        let captured = table.visible_declarations();
        assert!(captured.get("outer").is_none());

        // the call site has its own unrelated block in scope
        table.pop_scope();
        table.push_scope();
        table.define("stray", SymbolEntry::Function(TemplateId(9)));
        table.push_function_scope(captured);
        assert_eq!(table.lookup("helper"), Some(&SymbolEntry::Function(TemplateId(4))));
        assert!(table.lookup("stray").is_none());

        // nested declarations inherit what the enclosing body captured
        table.define("inner", SymbolEntry::Class(TemplateId(5)));
        let nested = table.visible_declarations();
        assert_eq!(nested.len(), 2);
        assert!(nested.contains_key("helper"));
        assert!(nested.contains_key("inner"));
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn popping_root_is_an_internal_error() {
        let mut table = SymbolTable::new();
        table.pop_scope();
    }
}
