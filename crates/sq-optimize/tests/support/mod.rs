#![allow(dead_code)]
use sq_core::ast::{ClassDef, Expr, FuncDef, GenericParam, IfBranch, Param, Program, Stmt, StmtKind, TypeExpr};
use sq_core::hir;
use sq_core::ir::{Module, ModuleBuilder};
use sq_core::span::Span;
use sq_core::types::TypeRegistry;
use sq_core::Result;
use sq_optimize::{CodegenVisitor, Transformer};

pub fn param(name: &str, ty: TypeExpr) -> Param {
    Param {
        name: name.into(),
        ty,
    }
}

pub fn generic(name: &str) -> GenericParam {
    GenericParam {
        name: name.into(),
        bound: vec![],
    }
}

pub fn func(name: &str, generics: Vec<GenericParam>, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::FuncDef(FuncDef {
            name: name.into(),
            generics,
            params,
            ret,
            body,
            span: Span::null(),
        }),
        Span::null(),
    )
}

pub fn class(name: &str, generics: Vec<GenericParam>, fields: Vec<Param>, methods: Vec<FuncDef>) -> Stmt {
    Stmt::new(
        StmtKind::ClassDef(ClassDef {
            name: name.into(),
            generics,
            fields,
            methods,
            span: Span::null(),
        }),
        Span::null(),
    )
}

pub fn method(name: &str, params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> FuncDef {
    FuncDef {
        name: name.into(),
        generics: vec![],
        params,
        ret,
        body,
        span: Span::null(),
    }
}

pub fn if_then(cond: Expr, body: Vec<Stmt>, otherwise: Option<Vec<Stmt>>) -> Stmt {
    Stmt::new(
        StmtKind::If {
            branches: vec![IfBranch { cond, body }],
            otherwise,
        },
        Span::null(),
    )
}

pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::While { cond, body }, Span::null())
}

pub fn print(value: Expr) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident("print"), vec![value]))
}

/// `def id[T](x: T): return x`
pub fn identity() -> Stmt {
    func(
        "id",
        vec![generic("T")],
        vec![param("x", TypeExpr::name("T"))],
        None,
        vec![Stmt::ret(Some(Expr::ident("x")))],
    )
}

pub fn program(body: Vec<Stmt>) -> Program {
    Program {
        files: vec!["test.sq".into()],
        body,
    }
}

pub fn transform(body: Vec<Stmt>) -> Result<(Transformer, hir::Program)> {
    let mut transformer = Transformer::new(TypeRegistry::new());
    let program = transformer.transform_program(&program(body))?;
    Ok((transformer, program))
}

pub fn compile(body: Vec<Stmt>) -> Result<Module> {
    let (transformer, program) = transform(body)?;
    let mut builder = ModuleBuilder::new("test");
    let mut codegen = CodegenVisitor::new(&mut builder, transformer.cache());
    codegen.emit_program("main", &program, transformer.args_global())?;
    Ok(builder.finish())
}
