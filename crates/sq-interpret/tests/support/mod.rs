#![allow(dead_code)]
use sq_core::ast::{Expr, FuncDef, IfBranch, Param, Program, Stmt, StmtKind, TypeExpr};
use sq_core::ir::{Module, ModuleBuilder};
use sq_core::span::Span;
use sq_core::types::TypeRegistry;
use sq_interpret::{OutputBuffer, Vm};
use sq_optimize::{CodegenVisitor, Transformer};

pub fn param(name: &str, ty: &str) -> Param {
    Param {
        name: name.into(),
        ty: TypeExpr::name(ty),
    }
}

pub fn def(name: &str, params: Vec<Param>, ret: Option<&str>, body: Vec<Stmt>) -> FuncDef {
    FuncDef {
        name: name.into(),
        generics: vec![],
        params,
        ret: ret.map(TypeExpr::name),
        body,
        span: Span::null(),
    }
}

pub fn func(def: FuncDef) -> Stmt {
    Stmt::new(StmtKind::FuncDef(def), Span::null())
}

pub fn if_else(cond: Expr, body: Vec<Stmt>, otherwise: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::If {
            branches: vec![IfBranch { cond, body }],
            otherwise: Some(otherwise),
        },
        Span::null(),
    )
}

pub fn print(value: Expr) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident("print"), vec![value]))
}

pub fn compile(body: Vec<Stmt>) -> sq_core::Result<Module> {
    let mut transformer = Transformer::new(TypeRegistry::new());
    let program = transformer.transform_program(&Program {
        files: vec!["test.sq".into()],
        body,
    })?;
    let mut builder = ModuleBuilder::new("test");
    let mut codegen = CodegenVisitor::new(&mut builder, transformer.cache());
    codegen.emit_program("main", &program, transformer.args_global())?;
    Ok(builder.finish())
}

/// Compiles and runs `body`, returning everything it printed.
pub fn run_with_args(body: Vec<Stmt>, args: Vec<String>) -> eyre::Result<String> {
    let module = compile(body)?;
    let out = OutputBuffer::new();
    Vm::new(&module)
        .with_output(out.clone())
        .with_args(args)
        .run_main()?;
    Ok(out.contents())
}

pub fn run(body: Vec<Stmt>) -> eyre::Result<String> {
    run_with_args(body, Vec::new())
}
