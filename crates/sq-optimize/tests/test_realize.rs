use pretty_assertions::assert_eq;
use sq_core::ast::{BinOp, Expr, ExprKind, GenericParam, Stmt, StmtKind, TypeExpr};
use sq_core::error::Error;
use sq_core::span::Span;
use sq_core::Result;
use support::*;

mod support;

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::ident(name), args)
}

#[test]
fn identity_is_realized_once_per_argument_type() -> Result<()> {
    let (transformer, _) = transform(vec![
        identity(),
        print(call("id", vec![Expr::int(1)])),
        print(call("id", vec![Expr::bool(true)])),
        print(call("id", vec![Expr::int(2)])),
    ])?;
    let names = transformer
        .cache()
        .functions()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["id[int]".to_string(), "id[bool]".to_string()]);
    Ok(())
}

#[test]
fn each_realization_is_emitted_once() -> Result<()> {
    let module = compile(vec![
        identity(),
        print(call("id", vec![Expr::int(1)])),
        print(call("id", vec![Expr::bool(true)])),
        print(call("id", vec![Expr::int(2)])),
    ])?;
    let count = |name: &str| module.functions.iter().filter(|f| f.name == name).count();
    assert_eq!(count("id[int]"), 1);
    assert_eq!(count("id[bool]"), 1);
    assert_eq!(module.functions.len(), 3);
    module.verify().map_err(Error::Generic)?;
    Ok(())
}

#[test]
fn recursive_function_terminates() -> Result<()> {
    // def fact(n: int) -> int:
    //     if n <= 1: return 1
    //     return n * fact(n - 1)
    let body = vec![
        if_then(
            Expr::binary(BinOp::Le, Expr::ident("n"), Expr::int(1)),
            vec![Stmt::ret(Some(Expr::int(1)))],
            None,
        ),
        Stmt::ret(Some(Expr::binary(
            BinOp::Mul,
            Expr::ident("n"),
            call("fact", vec![Expr::binary(BinOp::Sub, Expr::ident("n"), Expr::int(1))]),
        ))),
    ];
    let module = compile(vec![
        func(
            "fact",
            vec![],
            vec![param("n", TypeExpr::name("int"))],
            Some(TypeExpr::name("int")),
            body,
        ),
        print(call("fact", vec![Expr::int(5)])),
    ])?;
    assert_eq!(module.functions.iter().filter(|f| f.name == "fact").count(), 1);
    Ok(())
}

#[test]
fn inferred_return_type_is_visible_to_later_recursive_calls() -> Result<()> {
    // def count(n: int):
    //     if n == 0: return 0
    //     return count(n - 1)
    let (transformer, _) = transform(vec![func(
        "count",
        vec![],
        vec![param("n", TypeExpr::name("int"))],
        None,
        vec![
            if_then(
                Expr::binary(BinOp::Eq, Expr::ident("n"), Expr::int(0)),
                vec![Stmt::ret(Some(Expr::int(0)))],
                None,
            ),
            Stmt::ret(Some(call(
                "count",
                vec![Expr::binary(BinOp::Sub, Expr::ident("n"), Expr::int(1))],
            ))),
        ],
    )])?;
    let count = transformer.cache().functions().next().map(|f| f.ret.clone());
    assert_eq!(count, Some(Some(sq_core::types::Type::int())));
    Ok(())
}

#[test]
fn mutually_recursive_generics_share_realizations() -> Result<()> {
    // def even[T](x: T, n: int) -> bool: return true if n == 0 else odd(x, n - 1)
    // def odd[T](x: T, n: int) -> bool:  return false if n == 0 else even(x, n - 1)
    let branch = |other: &str, base: bool| {
        Stmt::ret(Some(Expr::new(
            ExprKind::Cond {
                cond: Box::new(Expr::binary(BinOp::Eq, Expr::ident("n"), Expr::int(0))),
                then: Box::new(Expr::bool(base)),
                otherwise: Box::new(call(
                    other,
                    vec![
                        Expr::ident("x"),
                        Expr::binary(BinOp::Sub, Expr::ident("n"), Expr::int(1)),
                    ],
                )),
            },
            Span::null(),
        )))
    };
    let params = || {
        vec![
            param("x", TypeExpr::name("T")),
            param("n", TypeExpr::name("int")),
        ]
    };
    let (transformer, _) = transform(vec![
        func("even", vec![generic("T")], params(), Some(TypeExpr::name("bool")), vec![branch("odd", true)]),
        func("odd", vec![generic("T")], params(), Some(TypeExpr::name("bool")), vec![branch("even", false)]),
        print(call("even", vec![Expr::str("s"), Expr::int(4)])),
    ])?;
    let mut names = transformer
        .cache()
        .functions()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["even[str]".to_string(), "odd[str]".to_string()]);
    Ok(())
}

#[test]
fn polymorphic_recursion_hits_the_depth_limit() {
    // def grow[T](x: T) -> int: return grow([x])
    let result = transform(vec![
        func(
            "grow",
            vec![generic("T")],
            vec![param("x", TypeExpr::name("T"))],
            Some(TypeExpr::name("int")),
            vec![Stmt::ret(Some(call(
                "grow",
                vec![Expr::new(ExprKind::Array(vec![Expr::ident("x")]), Span::null())],
            )))],
        ),
        print(call("grow", vec![Expr::int(1)])),
    ]);
    let err = result.err().map(|e| e.code());
    assert_eq!(err, Some("structural"));
}

#[test]
fn constraint_violation_is_a_type_mismatch() {
    let constrained = func(
        "num",
        vec![GenericParam {
            name: "T".into(),
            bound: vec![TypeExpr::name("int"), TypeExpr::name("float")],
        }],
        vec![param("x", TypeExpr::name("T"))],
        None,
        vec![Stmt::ret(Some(Expr::ident("x")))],
    );
    let ok = transform(vec![constrained.clone(), print(call("num", vec![Expr::int(1)]))]);
    assert!(ok.is_ok());
    let err = transform(vec![constrained, print(call("num", vec![Expr::str("a")]))])
        .err()
        .map(|e| e.code());
    assert_eq!(err, Some("type-mismatch"));
}

#[test]
fn wrong_argument_counts_are_arity_errors() {
    let too_many = transform(vec![identity(), print(call("id", vec![Expr::int(1), Expr::int(2)]))]);
    assert_eq!(too_many.err().map(|e| e.code()), Some("arity"));

    let explicit = Expr::call(
        Expr::new(
            ExprKind::Instantiate {
                base: "id".into(),
                args: vec![TypeExpr::name("int"), TypeExpr::name("bool")],
            },
            Span::null(),
        ),
        vec![Expr::int(1)],
    );
    let too_many_types = transform(vec![identity(), print(explicit)]);
    assert_eq!(too_many_types.err().map(|e| e.code()), Some("arity"));

    let builtin = transform(vec![print(call("len", vec![]))]);
    assert_eq!(builtin.err().map(|e| e.code()), Some("arity"));
}

#[test]
fn uninferable_parameter_is_reported() {
    let make = func("make", vec![generic("T")], vec![], Some(TypeExpr::name("int")), vec![Stmt::ret(Some(Expr::int(0)))]);
    let err = transform(vec![make, print(call("make", vec![]))]).err();
    match err {
        Some(Error::TypeMismatch { message, .. }) => assert!(message.contains("cannot infer")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn misplaced_control_flow_is_structural() {
    let brk = transform(vec![Stmt::new(StmtKind::Break, Span::new(0, 3, 1))]);
    match brk {
        Err(Error::Structural { span, .. }) => assert_eq!(span, Span::new(0, 3, 1)),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
    let ret = transform(vec![Stmt::ret(Some(Expr::int(1)))]);
    assert_eq!(ret.err().map(|e| e.code()), Some("structural"));

    // def g(): yield 1; return 2
    let mixed = transform(vec![func(
        "g",
        vec![],
        vec![],
        None,
        vec![
            Stmt::new(StmtKind::Yield(Some(Expr::int(1))), Span::null()),
            Stmt::ret(Some(Expr::int(2))),
        ],
    )]);
    assert_eq!(mixed.err().map(|e| e.code()), Some("structural"));
}

#[test]
fn bindings_do_not_escape_their_block() {
    let result = transform(vec![
        if_then(Expr::bool(true), vec![Stmt::assign("y", Expr::int(1))], None),
        print(Expr::ident("y")),
    ]);
    assert_eq!(result.err().map(|e| e.code()), Some("not-found"));
}

#[test]
fn binding_type_never_changes() {
    let result = transform(vec![
        Stmt::assign("x", Expr::int(1)),
        Stmt::assign("x", Expr::str("one")),
    ]);
    assert_eq!(result.err().map(|e| e.code()), Some("type-mismatch"));
}

#[test]
fn function_bodies_cannot_see_enclosing_locals() {
    // if true:
    //     hidden = 1
    //     def peek() -> int: return hidden
    let result = transform(vec![if_then(
        Expr::bool(true),
        vec![
            Stmt::assign("hidden", Expr::int(1)),
            func("peek", vec![], vec![], Some(TypeExpr::name("int")), vec![Stmt::ret(Some(Expr::ident("hidden")))]),
        ],
        None,
    )]);
    assert_eq!(result.err().map(|e| e.code()), Some("not-found"));
}

#[test]
fn function_declared_in_a_block_can_call_itself() -> Result<()> {
    // if true:
    //     def countdown(n: int) -> int:
    //         if n <= 0: return 0
    //         return countdown(n - 1)
    //     print(countdown(3))
    let countdown = func(
        "countdown",
        vec![],
        vec![param("n", TypeExpr::name("int"))],
        Some(TypeExpr::name("int")),
        vec![
            if_then(
                Expr::binary(BinOp::Le, Expr::ident("n"), Expr::int(0)),
                vec![Stmt::ret(Some(Expr::int(0)))],
                None,
            ),
            Stmt::ret(Some(call(
                "countdown",
                vec![Expr::binary(BinOp::Sub, Expr::ident("n"), Expr::int(1))],
            ))),
        ],
    );
    let module = compile(vec![if_then(
        Expr::bool(true),
        vec![countdown, print(call("countdown", vec![Expr::int(3)]))],
        None,
    )])?;
    assert_eq!(module.functions.iter().filter(|f| f.name == "countdown").count(), 1);
    module.verify().map_err(Error::Generic)?;
    Ok(())
}

#[test]
fn nested_functions_see_their_siblings() -> Result<()> {
    // def outer() -> int:
    //     def leaf() -> int: return 1
    //     def via() -> int: return leaf()
    //     return via()
    // print(outer())
    let int = || Some(TypeExpr::name("int"));
    let outer = func(
        "outer",
        vec![],
        vec![],
        int(),
        vec![
            func("leaf", vec![], vec![], int(), vec![Stmt::ret(Some(Expr::int(1)))]),
            func("via", vec![], vec![], int(), vec![Stmt::ret(Some(call("leaf", vec![])))]),
            Stmt::ret(Some(call("via", vec![]))),
        ],
    );
    let (transformer, _) = transform(vec![outer, print(call("outer", vec![]))])?;
    let mut names = transformer
        .cache()
        .functions()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["leaf".to_string(), "outer".to_string(), "via".to_string()]);
    Ok(())
}

#[test]
fn block_class_is_visible_to_functions_beside_it() -> Result<()> {
    // while true:
    //     class Pair:
    //         left: int
    //     def make() -> Pair: return Pair(1)
    //     print(make().left)
    //     break
    let (transformer, _) = transform(vec![while_loop(
        Expr::bool(true),
        vec![
            class("Pair", vec![], vec![param("left", TypeExpr::name("int"))], vec![]),
            func(
                "make",
                vec![],
                vec![],
                Some(TypeExpr::name("Pair")),
                vec![Stmt::ret(Some(call("Pair", vec![Expr::int(1)])))],
            ),
            print(Expr::dot(call("make", vec![]), "left")),
            Stmt::new(StmtKind::Break, Span::null()),
        ],
    )])?;
    let classes = transformer.cache().classes().map(|c| c.name.clone()).collect::<Vec<_>>();
    assert_eq!(classes, vec!["Pair".to_string()]);
    Ok(())
}

#[test]
fn self_referential_generic_class_is_realized_once() -> Result<()> {
    // class Node[T]:
    //     value: T
    //     rest: array[Node[T]]
    //     def size() -> int: return len(self.rest)
    // leaf = Node(1, <empty array[Node[int]]>)
    // print(Node(2, [leaf]).size())
    let node_of_t = TypeExpr::apply("Node", vec![TypeExpr::name("T")]);
    let size = method(
        "size",
        vec![],
        Some(TypeExpr::name("int")),
        vec![Stmt::ret(Some(call("len", vec![Expr::dot(Expr::ident("self"), "rest")])))],
    );
    let empty = Expr::new(
        ExprKind::StackAlloc {
            elem: TypeExpr::apply("Node", vec![TypeExpr::name("int")]),
            len: Box::new(Expr::int(0)),
        },
        Span::null(),
    );
    let (transformer, _) = transform(vec![
        class(
            "Node",
            vec![generic("T")],
            vec![
                param("value", TypeExpr::name("T")),
                param("rest", TypeExpr::apply("array", vec![node_of_t])),
            ],
            vec![size],
        ),
        Stmt::assign("leaf", call("Node", vec![Expr::int(1), empty])),
        print(Expr::call(
            Expr::dot(
                call(
                    "Node",
                    vec![Expr::int(2), Expr::new(ExprKind::Array(vec![Expr::ident("leaf")]), Span::null())],
                ),
                "size",
            ),
            vec![],
        )),
    ])?;
    let classes = transformer.cache().classes().map(|c| c.name.clone()).collect::<Vec<_>>();
    assert_eq!(classes, vec!["Node[int]".to_string()]);
    let realized = transformer.cache().classes().next().map(|c| c.fields.clone());
    let node_int = transformer.cache().classes().next().map(|c| c.ty.clone());
    assert_eq!(
        realized.and_then(|fields| fields.get(1).map(|(_, ty)| ty.clone())),
        node_int.map(sq_core::types::Type::array)
    );
    let functions = transformer.cache().functions().map(|f| f.name.clone()).collect::<Vec<_>>();
    assert_eq!(functions, vec!["Node[int].size".to_string()]);
    Ok(())
}

#[test]
fn generic_class_methods_are_realized_with_the_receiver_arguments() -> Result<()> {
    // class Box[T]:
    //     value: T
    //     def get() -> T: return self.value
    // print(Box(3).get())
    let get = method(
        "get",
        vec![],
        Some(TypeExpr::name("T")),
        vec![Stmt::ret(Some(Expr::dot(Expr::ident("self"), "value")))],
    );
    let (transformer, _) = transform(vec![
        class("Box", vec![generic("T")], vec![param("value", TypeExpr::name("T"))], vec![get]),
        print(Expr::call(Expr::dot(call("Box", vec![Expr::int(3)]), "get"), vec![])),
    ])?;
    let classes = transformer.cache().classes().map(|c| c.name.clone()).collect::<Vec<_>>();
    assert_eq!(classes, vec!["Box[int]".to_string()]);
    let functions = transformer.cache().functions().map(|f| f.name.clone()).collect::<Vec<_>>();
    assert_eq!(functions, vec!["Box[int].get".to_string()]);
    Ok(())
}

#[test]
fn pipe_feeds_each_stage() -> Result<()> {
    // print(2 |> double |> add(1))
    let double = func(
        "double",
        vec![],
        vec![param("x", TypeExpr::name("int"))],
        None,
        vec![Stmt::ret(Some(Expr::binary(BinOp::Mul, Expr::ident("x"), Expr::int(2))))],
    );
    let add = func(
        "add",
        vec![],
        vec![param("x", TypeExpr::name("int")), param("y", TypeExpr::name("int"))],
        None,
        vec![Stmt::ret(Some(Expr::binary(BinOp::Add, Expr::ident("x"), Expr::ident("y"))))],
    );
    let pipe = Expr::new(
        ExprKind::Pipe(vec![Expr::int(2), Expr::ident("double"), call("add", vec![Expr::int(1)])]),
        Span::null(),
    );
    let (_, program) = transform(vec![double, add, print(pipe)])?;
    let sq_core::hir::StmtKind::Expr(expr) = &program.body[2].kind else {
        panic!("expected expression statement");
    };
    let sq_core::hir::ExprKind::Call { args, .. } = &expr.kind else {
        panic!("expected print call");
    };
    assert_eq!(args[0].ty, sq_core::types::Type::int());
    Ok(())
}
