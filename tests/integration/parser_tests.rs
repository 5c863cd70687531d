use quill::parser::ast::{BinOp, ExprKind, Stmt};
use quill::registry::{Ty, TypeKind, PROGRAM_TYPE};
use quill::span::SourceMap;
use quill::{parse_source, Parsed};

fn parsed(src: &str) -> Parsed {
    match parse_source(src) {
        Ok(p) => p,
        Err(err) => panic!("parse failed: {err}"),
    }
}

fn parse_error(src: &str) -> String {
    match parse_source(src) {
        Ok(_) => panic!("parse should have failed"),
        Err(err) => {
            let mut sources = SourceMap::new();
            sources.add("main.ql", src);
            err.located(&sources)
        }
    }
}

#[test]
fn program_sections_are_separated() {
    let p = parsed(
        "use Math\n\
         type Pt {\n int x\n}\n\
         enum Color { Red, Green }\n\
         int twice(int n) {\n return n * 2\n}\n\
         var a = twice(3)\n\
         println(a)\n",
    );
    assert_eq!(p.program.uses.len(), 1);
    assert_eq!(p.program.types.len(), 1);
    assert_eq!(p.program.enums.len(), 1);
    assert_eq!(p.program.functions.len(), 1);
    assert_eq!(p.program.main.len(), 2);
}

#[test]
fn types_are_registered_while_parsing() {
    let p = parsed("type Animal {\n string name\n}\ntype Dog : Animal {\n void bark() {\n }\n}");
    let dog = p.registry.lookup("Dog").unwrap();
    assert_eq!(p.registry.ty(dog).kind, TypeKind::User);
    assert_eq!(p.registry.ty(dog).parent.as_deref(), Some("Animal"));
    assert!(p.registry.has_method_named(dog, "bark"));
}

#[test]
fn functions_become_program_statics() {
    let p = parsed("float half(float x) {\n return x / 2\n}");
    let program = p.registry.lookup(PROGRAM_TYPE).unwrap();
    let m = p.registry.ty(program).methods_named("half")[0];
    let entry = p.registry.method(m);
    assert!(entry.is_static);
    assert_eq!(entry.ret, Ty::Float);
    assert_eq!(entry.signature(), "half(float)");
}

#[test]
fn top_level_call_is_a_statement_not_a_header() {
    let p = parsed("println(1)\nx.go()");
    assert_eq!(p.program.functions.len(), 0);
    assert_eq!(p.program.main.len(), 2);
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    let p = parsed("var ok = 1 + 2 < 4 * 5");
    let Stmt::Var { value: Some(value), .. } = &p.program.main[0].node else {
        panic!("expected var");
    };
    let ExprKind::BinOp { op, lhs, rhs } = &value.node.kind else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinOp::Lt);
    assert!(matches!(lhs.node.kind, ExprKind::BinOp { op: BinOp::Add, .. }));
    assert!(matches!(rhs.node.kind, ExprKind::BinOp { op: BinOp::Mul, .. }));
}

#[test]
fn in_operator_parses_at_comparison_level() {
    let p = parsed("var found = 2 + 1 in xs");
    let Stmt::Var { value: Some(value), .. } = &p.program.main[0].node else {
        panic!("expected var");
    };
    assert!(matches!(value.node.kind, ExprKind::BinOp { op: BinOp::In, .. }));
}

#[test]
fn dictionary_type_annotations() {
    let p = parsed("var d: {string:int[]} = {}");
    let Stmt::Var { ty: Some(ty), .. } = &p.program.main[0].node else {
        panic!("expected var");
    };
    assert_eq!(ty.node, Ty::dict_of(Ty::String, Ty::array_of(Ty::Int)));
}

#[test]
fn nested_array_new() {
    let p = parsed("var grid = new int[][3]");
    let Stmt::Var { value: Some(value), .. } = &p.program.main[0].node else {
        panic!("expected var");
    };
    let ExprKind::NewArray { elem, .. } = &value.node.kind else {
        panic!("expected new array");
    };
    assert_eq!(elem.node, Ty::array_of(Ty::Int));
}

#[test]
fn multiline_literals() {
    let p = parsed("var xs = [\n 1,\n 2,\n 3\n]\nvar d = {\n \"a\": 1\n}");
    assert_eq!(p.program.main.len(), 2);
}

#[test]
fn simulate_without_clauses() {
    let p = parsed("simulate");
    assert!(matches!(p.program.main[0].node, Stmt::Simulate { duration: None, planner: None }));
}

#[test]
fn statement_needs_terminator() {
    let err = parse_error("var a = 1 var b = 2");
    assert_eq!(err, "main.ql:1:11: syntax error: expected end of statement, found 'var'");
}

#[test]
fn missing_closing_brace() {
    let err = parse_error("if true {\n println(1)\n");
    assert!(err.contains("syntax error: expected '}'"), "{err}");
}

#[test]
fn redo_outside_loop() {
    let err = parse_error("redo");
    assert!(err.ends_with("'redo' is only allowed inside a loop body"), "{err}");
}

#[test]
fn type_inside_function_body_is_rejected() {
    let err = parse_error("void f() {\n type T {\n }\n}");
    assert!(err.contains("only allowed at the top level"), "{err}");
}

#[test]
fn duplicate_method_signature() {
    let err = parse_error("type T {\n void f(int a) {\n }\n void f(int b) {\n }\n}");
    assert!(err.contains("method 'T.f(int)' is already defined"), "{err}");
}

#[test]
fn duplicate_field() {
    let err = parse_error("type T {\n int a\n float a\n}");
    assert!(err.contains("field 'a' is already defined in type 'T'"), "{err}");
}

#[test]
fn user_type_cannot_redeclare_builtin() {
    let err = parse_error("type string {\n}");
    assert!(err.contains("type 'string' is already defined"), "{err}");
}

#[test]
fn splat_default_requires_expression() {
    let err = parse_error("var [a, b =] = xs");
    assert!(err.contains("syntax error"), "{err}");
}
