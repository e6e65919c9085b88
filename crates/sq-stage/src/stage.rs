use serde::{Deserialize, Serialize};
use sq_core::ast::Expr;

/// Named slot of a [`StageKind::Partition`] carrying the records that
/// satisfy the predicate.
pub const PASS: &str = "pass";
/// Named slot of a [`StageKind::Partition`] carrying the rest.
pub const FAIL: &str = "fail";

/// A unit of per-record computation. Besides its default output a stage may
/// expose named side channels; every output slot carries an optional
/// validity flag that validating combinators branch on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Evaluates an expression in which `...` is the stage input. An
    /// expression that never mentions `...` is applied to the input.
    Expr(Expr),
    /// Passes the input through; valid when the predicate holds.
    Filter(Expr),
    /// Passes the input through on the default slot and on [`PASS`] and
    /// [`FAIL`], which are valid when the predicate holds and fails.
    Partition(Expr),
    /// One named slot per arm, each computed from the input.
    Branch(Vec<(String, Expr)>),
    /// Outputs the current value of a module global.
    Cell(String),
    /// Stores a value into a module global and passes the input through.
    Assign { global: String, value: Expr },
    Print,
    /// Stops consuming input when the condition holds (or always); control
    /// continues in the `last` phase.
    Halt(Option<Expr>),
}

impl Stage {
    pub fn new(name: impl Into<String>, kind: StageKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new("expr", StageKind::Expr(expr))
    }

    pub fn filter(pred: Expr) -> Self {
        Self::new("filter", StageKind::Filter(pred))
    }

    pub fn partition(pred: Expr) -> Self {
        Self::new("partition", StageKind::Partition(pred))
    }

    pub fn branch(arms: Vec<(String, Expr)>) -> Self {
        Self::new("branch", StageKind::Branch(arms))
    }

    pub fn cell(global: impl Into<String>) -> Self {
        Self::new("cell", StageKind::Cell(global.into()))
    }

    pub fn assign(global: impl Into<String>, value: Expr) -> Self {
        Self::new(
            "assign",
            StageKind::Assign {
                global: global.into(),
                value,
            },
        )
    }

    pub fn print() -> Self {
        Self::new("print", StageKind::Print)
    }

    pub fn halt() -> Self {
        Self::new("halt", StageKind::Halt(None))
    }

    pub fn halt_when(cond: Expr) -> Self {
        Self::new("halt", StageKind::Halt(Some(cond)))
    }

    /// Renames the stage; names only appear in diagnostics.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
