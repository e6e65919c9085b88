//! Canonical tree produced by the transform stage. Every generic reference is
//! resolved to a realized entity and every expression carries its type.

use crate::ast::{BinOp, UnOp};
use crate::id::{ClassHandle, FuncHandle, GlobalId, TemplateId, VarId};
use crate::span::Span;
use crate::symbols::{Binding, Builtin};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub globals: Vec<GlobalDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
    pub id: GlobalId,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Func(FuncHandle),
    Builtin(Builtin),
    /// A first-class function value.
    Value(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Var {
        binding: Binding,
        name: String,
    },
    FuncRef(FuncHandle),
    Call {
        callee: Callee,
        args: Vec<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Field of a class object or record, resolved to its position.
    Dot {
        base: Box<Expr>,
        index: usize,
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
    Ptr {
        var: VarId,
        name: String,
    },
    StackAlloc {
        elem: Type,
        len: Box<Expr>,
    },
    Array(Vec<Expr>),
    Record(Vec<Expr>),
    /// Allocation of a class object with its fields in declaration order.
    New {
        class: ClassHandle,
        fields: Vec<Expr>,
    },
    /// Allocation with default fields followed by a call to the realized
    /// `__init__` method, which receives the new object first.
    Construct {
        class: ClassHandle,
        init: FuncHandle,
        args: Vec<Expr>,
    },
    /// `stages[0]` is the source value; each later stage reads the previous
    /// one through [`ExprKind::Ellipsis`].
    Pipe(Vec<Expr>),
    Ellipsis,
    Yield(Option<Box<Expr>>),
    StmtExpr {
        stmts: Vec<Stmt>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catch {
    pub class: Option<ClassHandle>,
    pub var: Option<(VarId, String)>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Vec<Stmt>),
    Pass,
    Break,
    Continue,
    Expr(Expr),
    Assign {
        target: Binding,
        name: String,
        /// First binding of a local in its scope.
        declare: bool,
        value: Expr,
    },
    AssignMember {
        base: Expr,
        index: usize,
        value: Expr,
    },
    AssignIndex {
        base: Expr,
        index: Expr,
        value: Expr,
    },
    AssignDeref {
        target: Expr,
        value: Expr,
    },
    Update {
        target: Binding,
        name: String,
        op: BinOp,
        value: Expr,
    },
    Return(Option<Expr>),
    Yield(Option<Expr>),
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: VarId,
        name: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    If {
        branches: Vec<IfBranch>,
        otherwise: Option<Vec<Stmt>>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<Catch>,
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    /// Point of declaration. Codegen emits every realization of the template
    /// known at that time.
    FuncDecl {
        template: TemplateId,
        name: String,
    },
    ClassDecl {
        template: TemplateId,
        name: String,
    },
}
