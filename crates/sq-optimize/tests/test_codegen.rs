use pretty_assertions::assert_eq;
use sq_core::ast::{BinOp, CatchClause, Expr, Stmt, StmtKind, TypeExpr};
use sq_core::error::Error;
use sq_core::ir::{Function, Instr, Intrinsic, Terminator};
use sq_core::span::Span;
use sq_core::Result;
use support::*;

mod support;

fn entry(module: &sq_core::ir::Module) -> &Function {
    match module.entry.and_then(|id| module.function(id)) {
        Some(function) => function,
        None => panic!("module has no entry function"),
    }
}

fn try_stmt(body: Vec<Stmt>, catches: Vec<CatchClause>, finally: Option<Vec<Stmt>>) -> Stmt {
    Stmt::new(
        StmtKind::Try {
            body,
            catches,
            finally,
        },
        Span::null(),
    )
}

fn increment(name: &str) -> Stmt {
    Stmt::new(
        StmtKind::Update {
            target: name.into(),
            op: BinOp::Add,
            value: Expr::int(1),
        },
        Span::null(),
    )
}

#[test]
fn every_block_is_terminated() -> Result<()> {
    let module = compile(vec![
        Stmt::assign("i", Expr::int(0)),
        while_loop(
            Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(3)),
            vec![
                if_then(
                    Expr::binary(BinOp::Eq, Expr::ident("i"), Expr::int(1)),
                    vec![increment("i"), Stmt::new(StmtKind::Continue, Span::null())],
                    None,
                ),
                print(Expr::ident("i")),
                increment("i"),
            ],
        ),
    ])?;
    module.verify().map_err(Error::Generic)?;
    Ok(())
}

#[test]
fn break_out_of_try_runs_finally_before_leaving_the_loop() -> Result<()> {
    // while true:
    //     try: break
    //     finally: print(1)
    let module = compile(vec![while_loop(
        Expr::bool(true),
        vec![try_stmt(
            vec![Stmt::new(StmtKind::Break, Span::null())],
            vec![],
            Some(vec![print(Expr::int(1))]),
        )],
    )])?;
    module.verify().map_err(Error::Generic)?;
    let main = entry(&module);
    let leaves_loop = main.blocks.iter().any(|block| {
        let pops = block.instrs.iter().position(|i| matches!(i, Instr::PopHandler));
        let prints = block.instrs.iter().position(|i| {
            matches!(i, Instr::Intrinsic { op: Intrinsic::Print, .. })
        });
        let to_exit = match &block.terminator {
            Some(Terminator::Goto(target)) => main
                .block(*target)
                .is_some_and(|b| b.label == "while.end"),
            _ => false,
        };
        matches!((pops, prints), (Some(p), Some(q)) if p < q) && to_exit
    });
    assert!(leaves_loop);
    Ok(())
}

#[test]
fn unmatched_exception_is_rethrown_after_finally() -> Result<()> {
    // class E: pass
    // try: throw E()
    // catch E as e: print(1)
    // finally: print(2)
    let module = compile(vec![
        class("E", vec![], vec![], vec![]),
        try_stmt(
            vec![Stmt::new(
                StmtKind::Throw(Expr::call(Expr::ident("E"), vec![])),
                Span::null(),
            )],
            vec![CatchClause {
                class: Some(TypeExpr::name("E")),
                var: Some("e".into()),
                body: vec![print(Expr::int(1))],
                span: Span::null(),
            }],
            Some(vec![print(Expr::int(2))]),
        ),
    ])?;
    module.verify().map_err(Error::Generic)?;
    let main = entry(&module);
    let rethrows = main
        .blocks
        .iter()
        .filter(|b| matches!(b.terminator, Some(Terminator::Throw(_))))
        .count();
    // the user throw, the no-match path and the cleanup path
    assert_eq!(rethrows, 3);
    assert_eq!(module.classes.len(), 1);
    Ok(())
}

#[test]
fn catch_all_cannot_bind_a_variable() {
    let result = compile(vec![try_stmt(
        vec![Stmt::new(StmtKind::Pass, Span::null())],
        vec![CatchClause {
            class: None,
            var: Some("e".into()),
            body: vec![],
            span: Span::null(),
        }],
        None,
    )]);
    assert_eq!(result.err().map(|e| e.code()), Some("structural"));
}

#[test]
fn non_void_function_ends_unreachable_and_void_returns() -> Result<()> {
    let module = compile(vec![
        func(
            "pick",
            vec![],
            vec![param("b", TypeExpr::name("bool"))],
            Some(TypeExpr::name("int")),
            vec![if_then(
                Expr::ident("b"),
                vec![Stmt::ret(Some(Expr::int(1)))],
                Some(vec![Stmt::ret(Some(Expr::int(2)))]),
            )],
        ),
        func("noop", vec![], vec![], None, vec![Stmt::new(StmtKind::Pass, Span::null())]),
    ])?;
    module.verify().map_err(Error::Generic)?;
    let noop = module.function_by_name("noop").map(|f| f.ret.clone());
    assert_eq!(noop, Some(sq_core::types::Type::Void));
    let pick = module
        .function_by_name("pick")
        .map(|f| f.blocks.iter().any(|b| b.terminator == Some(Terminator::Unreachable)));
    assert_eq!(pick, Some(true));
    Ok(())
}

#[test]
fn generator_collects_yields() -> Result<()> {
    // def upto(n: int):
    //     i = 0
    //     while i < n: yield i; i += 1
    let module = compile(vec![func(
        "upto",
        vec![],
        vec![param("n", TypeExpr::name("int"))],
        None,
        vec![
            Stmt::assign("i", Expr::int(0)),
            while_loop(
                Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::ident("n")),
                vec![
                    Stmt::new(StmtKind::Yield(Some(Expr::ident("i"))), Span::null()),
                    increment("i"),
                ],
            ),
        ],
    )])?;
    let upto = module
        .function_by_name("upto")
        .map(|f| (f.generator, f.ret.to_string()));
    assert_eq!(upto, Some((true, "array[int]".to_string())));
    Ok(())
}
