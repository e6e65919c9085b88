//! Raw syntax tree as delivered by the external front end (JSON).

use crate::span::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeExpr {
    Name(String),
    /// `name[args..]`, covering both builtins (`array[int]`) and classes.
    Apply { name: String, args: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn name(name: impl Into<String>) -> Self {
        TypeExpr::Name(name.into())
    }

    pub fn apply(name: impl Into<String>, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Apply {
            name: name.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnOp {
    Neg,
    Not,
    Deref,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(String),
    Ident(String),
    /// Explicit instantiation, `f[int]` or `Node[int]`.
    Instantiate {
        base: String,
        args: Vec<TypeExpr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Dot {
        base: Box<Expr>,
        field: String,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Address of a named variable.
    Ptr(String),
    Array(Vec<Expr>),
    Record(Vec<Expr>),
    StackAlloc {
        elem: TypeExpr,
        len: Box<Expr>,
    },
    /// `value |> stage |> stage ...`
    Pipe(Vec<Expr>),
    /// `...`, the value flowing into the enclosing pipe or stage.
    Ellipsis,
    Yield(Option<Box<Expr>>),
    StmtExpr {
        stmts: Vec<Stmt>,
        value: Box<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// True if an ellipsis placeholder occurs anywhere below this node,
    /// not counting nested pipes which bind their own.
    pub fn mentions_ellipsis(&self) -> bool {
        match &self.kind {
            ExprKind::Ellipsis => true,
            ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Seq(_)
            | ExprKind::Ident(_)
            | ExprKind::Instantiate { .. }
            | ExprKind::Ptr(_)
            | ExprKind::Pipe(_)
            | ExprKind::StmtExpr { .. } => false,
            ExprKind::Call { callee, args } => {
                callee.mentions_ellipsis() || args.iter().any(Expr::mentions_ellipsis)
            }
            ExprKind::Dot { base, .. } => base.mentions_ellipsis(),
            ExprKind::Index { base, index } => base.mentions_ellipsis() || index.mentions_ellipsis(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.mentions_ellipsis() || rhs.mentions_ellipsis(),
            ExprKind::Unary { operand, .. } => operand.mentions_ellipsis(),
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => cond.mentions_ellipsis() || then.mentions_ellipsis() || otherwise.mentions_ellipsis(),
            ExprKind::Array(items) | ExprKind::Record(items) => {
                items.iter().any(Expr::mentions_ellipsis)
            }
            ExprKind::StackAlloc { len, .. } => len.mentions_ellipsis(),
            ExprKind::Yield(value) => value.as_ref().is_some_and(|v| v.mentions_ellipsis()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn expr(expr: Expr) -> Self {
        let span = expr.span;
        Self::new(StmtKind::Expr(expr), span)
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        let span = value.span;
        Self::new(
            StmtKind::Assign {
                target: target.into(),
                ty: None,
                value,
            },
            span,
        )
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(value), Span::null())
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// Shorthand constructors with null spans.
impl Expr {
    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value), Span::null())
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value), Span::null())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(value.into()), Span::null())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(name.into()), Span::null())
    }

    pub fn ellipsis() -> Self {
        Self::new(ExprKind::Ellipsis, Span::null())
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            Span::null(),
        )
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Span::null(),
        )
    }

    pub fn dot(base: Expr, field: impl Into<String>) -> Self {
        Self::new(
            ExprKind::Dot {
                base: Box::new(base),
                field: field.into(),
            },
            Span::null(),
        )
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// `None` catches everything.
    #[serde(default)]
    pub class: Option<TypeExpr>,
    #[serde(default)]
    pub var: Option<String>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericParam {
    pub name: String,
    /// Allowed types, `T: int | float`. Empty means unconstrained.
    #[serde(default)]
    pub bound: Vec<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub generics: Vec<GenericParam>,
    #[serde(default)]
    pub fields: Vec<Param>,
    #[serde(default)]
    pub methods: Vec<FuncDef>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtKind {
    Pass,
    Break,
    Continue,
    Expr(Expr),
    Assign {
        target: String,
        #[serde(default)]
        ty: Option<TypeExpr>,
        value: Expr,
    },
    AssignMember {
        base: Expr,
        field: String,
        value: Expr,
    },
    AssignIndex {
        base: Expr,
        index: Expr,
        value: Expr,
    },
    /// Store through a pointer, `*p = value`.
    AssignDeref {
        target: Expr,
        value: Expr,
    },
    /// Augmented assignment, `x += 1`.
    Update {
        target: String,
        op: BinOp,
        value: Expr,
    },
    Return(Option<Expr>),
    Yield(Option<Expr>),
    Block(Vec<Stmt>),
    If {
        branches: Vec<IfBranch>,
        #[serde(default)]
        otherwise: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        #[serde(default)]
        catches: Vec<CatchClause>,
        #[serde(default)]
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    FuncDef(FuncDef),
    ClassDef(ClassDef),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_front_end_json() -> crate::Result<()> {
        let json = r#"{
            "files": ["a.sq"],
            "body": [
                {"kind": {"assign": {"target": "x", "value": {"kind": {"int": 3}, "span": {"line": 1, "col": 5}}}},
                 "span": {"line": 1, "col": 1}},
                {"kind": {"expr": {"kind": {"call": {
                    "callee": {"kind": {"ident": "print"}},
                    "args": [{"kind": {"ident": "x"}}]
                }}}}}
            ]
        }"#;
        let program: Program = serde_json::from_str(json)?;
        assert_eq!(program.files, vec!["a.sq".to_string()]);
        assert_eq!(program.body.len(), 2);
        assert_eq!(program.body[0].span, Span::new(0, 1, 1));
        match &program.body[0].kind {
            StmtKind::Assign { target, ty, value } => {
                assert_eq!(target, "x");
                assert_eq!(ty, &None);
                assert_eq!(value.kind, ExprKind::Int(3));
            }
            other => panic!("unexpected statement {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn ellipsis_detection_stops_at_nested_pipes() {
        let ellipsis = Expr::new(ExprKind::Ellipsis, Span::null());
        let call = Expr::new(
            ExprKind::Call {
                callee: Box::new(Expr::new(ExprKind::Ident("f".into()), Span::null())),
                args: vec![ellipsis.clone()],
            },
            Span::null(),
        );
        assert!(call.mentions_ellipsis());
        let nested = Expr::new(ExprKind::Pipe(vec![ellipsis]), Span::null());
        assert!(!nested.mentions_ellipsis());
    }
}
