#![allow(dead_code)]
use sq_core::ast::{Expr, Program, Stmt};
use sq_stage::ModuleSpec;

pub fn print(value: Expr) -> Stmt {
    Stmt::expr(Expr::call(Expr::ident("print"), vec![value]))
}

/// A front-end program unit over the single file `prog.sq`.
pub fn program_json(body: Vec<Stmt>) -> eyre::Result<String> {
    let program = Program {
        files: vec!["prog.sq".into()],
        body,
    };
    Ok(serde_json::to_string_pretty(&program)?)
}

pub fn module_json(spec: &ModuleSpec) -> eyre::Result<String> {
    Ok(serde_json::to_string_pretty(spec)?)
}

/// Joins units with separator lines.
pub fn cases(units: &[String]) -> String {
    units.join("\n--\n")
}
