//! End-to-end pipeline tests through `DuskAssembly` with a stub frontend.

use dusk_compiler::il::{artifact_opcodes, OpCode};
use dusk_compiler::{BuildError, DuskAssembly, ParsedFile, PrebuiltFrontend};
use dusk_core::{
    AffixType, Ast, AstKind, AstNode, CollectingSink, NumberValue, TypeRef,
};

fn dec(name: &str, ty: Option<TypeRef>, value: Option<AstNode>) -> AstNode {
    AstNode::new(
        AstKind::Dec {
            name: name.into(),
            declared_type: ty,
            value: value.map(Box::new),
            immutable: false,
        },
        1,
        1,
    )
}

fn binary(op: &str, lhs: AstNode, rhs: AstNode) -> AstNode {
    AstNode::new(
        AstKind::BinaryExpr {
            op: op.into(),
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            mangled: false,
            mangled_name: None,
        },
        1,
        1,
    )
}

fn fn_node(name: &str, params: Vec<AstNode>, ret: Option<TypeRef>, body: Option<AstNode>) -> AstNode {
    AstNode::new(
        AstKind::Fn {
            name: name.into(),
            mangled: None,
            type_self: None,
            params,
            return_type: ret,
            body: body.map(Box::new),
        },
        1,
        1,
    )
}

/// Compile a set of (path, root-block) files; return the artifact or the
/// failure, plus the reported diagnostics.
fn compile(
    files: Vec<(&str, AstNode)>,
) -> (Result<Vec<u8>, BuildError>, CollectingSink) {
    let mut frontend = PrebuiltFrontend::new();
    let mut paths = Vec::new();
    for (path, root) in files {
        frontend.insert(path, ParsedFile::clean(Ast::new(root)));
        paths.push(path.to_string());
    }
    let mut assembly = DuskAssembly::new(frontend);
    for path in paths {
        assembly.queue_file(path);
    }

    let mut sink = CollectingSink::default();
    let mut out = Vec::new();
    let result = assembly
        .compile_write(&mut out, &mut sink)
        .map(|_| out);
    (result, sink)
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

#[test]
fn arithmetic_declaration_compiles() {
    // let x: i32 = 41 + 1;
    let root = AstNode::block(
        vec![dec(
            "x",
            Some(TypeRef::named("i32")),
            Some(binary("+", AstNode::int(41, 1, 14), AstNode::int(1, 1, 19))),
        )],
        1,
        1,
    );
    let (result, sink) = compile(vec![("main.dusk", root)]);
    let artifact = result.expect("compiles cleanly");
    assert!(sink.diagnostics.is_empty());
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![OpCode::PushI32, OpCode::PushI32, OpCode::AddI32, OpCode::Store]
    );
}

#[test]
fn main_function_mangles_and_returns() {
    // fn main(): i32 { return 0; }
    let body = AstNode::block(
        vec![AstNode::new(
            AstKind::Return {
                expr: Some(Box::new(AstNode::int(0, 1, 25))),
            },
            1,
            18,
        )],
        1,
        16,
    );
    let root = AstNode::block(
        vec![fn_node("main", vec![], Some(TypeRef::named("i32")), Some(body))],
        1,
        1,
    );
    let (result, sink) = compile(vec![("main.dusk", root)]);
    let artifact = result.expect("compiles cleanly");
    assert!(sink.diagnostics.is_empty());
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![OpCode::Func, OpCode::PushI32, OpCode::Ret, OpCode::Ret]
    );
    assert_eq!(count_occurrences(&artifact, b"main__i32"), 1);
}

#[test]
fn break_outside_loop_fails() {
    // if true { break; }
    let root = AstNode::block(
        vec![AstNode::new(
            AstKind::If {
                condition: Box::new(AstNode::boolean(true, 1, 4)),
                true_block: Box::new(AstNode::block(
                    vec![AstNode::new(AstKind::Break, 1, 11)],
                    1,
                    9,
                )),
                false_block: None,
            },
            1,
            1,
        )],
        1,
        1,
    );
    let (result, sink) = compile(vec![("main.dusk", root)]);
    assert!(matches!(
        result,
        Err(BuildError::CompilationFailed { errors: 1 })
    ));
    assert_eq!(sink.diagnostics.len(), 1);
    assert!(sink.diagnostics[0].message.contains("'break' outside loop"));
}

#[test]
fn undeclared_symbol_skips_code_generation() {
    // let x = y;
    let root = AstNode::block(
        vec![dec("x", None, Some(AstNode::symbol("y", 3, 9)))],
        3,
        1,
    );
    let (result, sink) = compile(vec![("main.dusk", root)]);
    assert!(matches!(result, Err(BuildError::CompilationFailed { .. })));
    assert_eq!(sink.diagnostics.len(), 1);
    let diagnostic = &sink.diagnostics[0];
    assert!(diagnostic.message.contains("unknown symbol 'y'"));
    assert_eq!(diagnostic.line, 3);
    assert_eq!(diagnostic.column, 9);
}

#[test]
fn loop_with_break_closes_labels() {
    // let cond: bool = true; loop { if cond { break; } }
    let if_node = AstNode::new(
        AstKind::If {
            condition: Box::new(AstNode::symbol("cond", 2, 10)),
            true_block: Box::new(AstNode::block(
                vec![AstNode::new(AstKind::Break, 2, 17)],
                2,
                15,
            )),
            false_block: None,
        },
        2,
        7,
    );
    let root = AstNode::block(
        vec![
            dec(
                "cond",
                Some(TypeRef::bool()),
                Some(AstNode::boolean(true, 1, 18)),
            ),
            AstNode::new(
                AstKind::Loop {
                    body: Box::new(AstNode::block(vec![if_node], 2, 5)),
                    induction: None,
                    expr: None,
                    is_foreach: false,
                    induction_slot: None,
                    index_slot: None,
                    array_slot: None,
                },
                2,
                1,
            ),
        ],
        1,
        1,
    );
    let (result, _) = compile(vec![("main.dusk", root)]);
    let artifact = result.expect("compiles cleanly");
    // Every label bound, no fixups: finish() succeeded, and the stream is
    // exactly head/test/break/back-edge.
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![
            OpCode::PushTrue,
            OpCode::Store,
            OpCode::Load,
            OpCode::BranchIfFalse,
            OpCode::Jump,
            OpCode::Jump,
        ]
    );
}

#[test]
fn namespace_use_resolves_across_files() {
    // a.dusk: namespace A { fn f(): i32 { return 1; } }
    let f_body = AstNode::block(
        vec![AstNode::new(
            AstKind::Return {
                expr: Some(Box::new(AstNode::int(1, 1, 40))),
            },
            1,
            33,
        )],
        1,
        31,
    );
    let file_a = AstNode::block(
        vec![AstNode::new(
            AstKind::Namespace {
                name: "A".into(),
                block: Box::new(AstNode::block(
                    vec![fn_node("f", vec![], Some(TypeRef::named("i32")), Some(f_body))],
                    1,
                    13,
                )),
            },
            1,
            1,
        )],
        1,
        1,
    );
    // b.dusk: use A; f();
    let file_b = AstNode::block(
        vec![
            AstNode::new(AstKind::Use { name: "A".into() }, 1, 1),
            AstNode::new(
                AstKind::FnCall {
                    name: "f".into(),
                    args: vec![],
                    mangled: false,
                    mangled_name: None,
                },
                2,
                1,
            ),
        ],
        1,
        1,
    );
    let (result, sink) = compile(vec![("a.dusk", file_a), ("b.dusk", file_b)]);
    let artifact = result.expect("compiles cleanly");
    assert!(sink.diagnostics.is_empty());
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![OpCode::Func, OpCode::PushI32, OpCode::Ret, OpCode::Ret, OpCode::Call]
    );
    // Once in the Func record, once as the Call operand.
    assert_eq!(count_occurrences(&artifact, b"A__f__i32"), 2);
}

#[test]
fn parse_errors_gate_the_pipeline() {
    let clean = AstNode::block(vec![dec("x", None, Some(AstNode::int(1, 1, 9)))], 1, 1);
    let broken = ParsedFile {
        ast: Ast::new(AstNode::block(vec![], 1, 1)),
        errors: vec![dusk_core::Diagnostic {
            message: "unexpected token".into(),
            line: 7,
            column: 3,
            offset: 41,
            count: 2,
        }],
    };

    let frontend = PrebuiltFrontend::new()
        .with("clean.dusk", ParsedFile::clean(Ast::new(clean)))
        .with("broken.dusk", broken);
    let mut assembly = DuskAssembly::new(frontend);
    assembly.queue_file("clean.dusk");
    assembly.queue_file("broken.dusk");

    let mut sink = CollectingSink::default();
    let mut out = Vec::new();
    let result = assembly.compile_write(&mut out, &mut sink);

    assert!(matches!(
        result,
        Err(BuildError::CompilationFailed { errors: 1 })
    ));
    assert!(out.is_empty(), "no artifact on failure");
    assert_eq!(sink.diagnostics.len(), 1);
    assert_eq!(sink.diagnostics[0].offset, 41);
}

#[test]
fn compilation_is_deterministic() {
    let make = || {
        let body = AstNode::block(
            vec![AstNode::new(
                AstKind::Return {
                    expr: Some(Box::new(binary(
                        "*",
                        AstNode::symbol("a", 1, 30),
                        AstNode::int(2, 1, 34),
                    ))),
                },
                1,
                23,
            )],
            1,
            21,
        );
        AstNode::block(
            vec![
                fn_node(
                    "double",
                    vec![dec("a", Some(TypeRef::named("i32")), None)],
                    Some(TypeRef::named("i32")),
                    Some(body),
                ),
                AstNode::new(
                    AstKind::FnCall {
                        name: "double".into(),
                        args: vec![AstNode::int(21, 2, 8)],
                        mangled: false,
                        mangled_name: None,
                    },
                    2,
                    1,
                ),
            ],
            1,
            1,
        )
    };

    let (first, _) = compile(vec![("main.dusk", make())]);
    let (second, _) = compile(vec![("main.dusk", make())]);
    assert_eq!(first.unwrap(), second.unwrap());
}

#[test]
fn affix_call_reaches_the_artifact() {
    // infix ** (a: i32, b: i32): i32 { return a; }   then   2 ** 3;
    let affix = AstNode::new(
        AstKind::Affix {
            affix_type: AffixType::Infix,
            name: "**".into(),
            mangled: None,
            params: vec![
                dec("a", Some(TypeRef::named("i32")), None),
                dec("b", Some(TypeRef::named("i32")), None),
            ],
            return_type: Some(TypeRef::named("i32")),
            body: Some(Box::new(AstNode::block(
                vec![AstNode::new(
                    AstKind::Return {
                        expr: Some(Box::new(AstNode::symbol("a", 1, 45))),
                    },
                    1,
                    38,
                )],
                1,
                36,
            ))),
        },
        1,
        1,
    );
    let expr = binary("**", AstNode::int(2, 2, 1), AstNode::int(3, 2, 7));
    let root = AstNode::block(vec![affix, expr], 1, 1);

    let (result, _) = compile(vec![("main.dusk", root)]);
    let artifact = result.expect("compiles cleanly");
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![
            OpCode::Func,
            OpCode::Load,
            OpCode::Ret,
            OpCode::Ret,
            OpCode::PushI32,
            OpCode::PushI32,
            OpCode::Call,
        ]
    );
    assert_eq!(count_occurrences(&artifact, b"**__i32__i32__i32"), 2);
}

#[test]
fn number_widths_use_typed_constants() {
    let root = AstNode::block(
        vec![
            dec(
                "a",
                Some(TypeRef::named("i64")),
                Some(AstNode::new(
                    AstKind::Number {
                        value: NumberValue::Int(1),
                        is_signed: true,
                        bits: 64,
                    },
                    1,
                    14,
                )),
            ),
            dec(
                "b",
                Some(TypeRef::named("f64")),
                Some(AstNode::new(
                    AstKind::Number {
                        value: NumberValue::Float(2.5),
                        is_signed: true,
                        bits: 64,
                    },
                    2,
                    14,
                )),
            ),
        ],
        1,
        1,
    );
    let (result, _) = compile(vec![("main.dusk", root)]);
    let artifact = result.expect("compiles cleanly");
    assert_eq!(
        artifact_opcodes(&artifact),
        vec![OpCode::PushI64, OpCode::Store, OpCode::PushF64, OpCode::Store]
    );
}
