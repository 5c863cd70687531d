//! Exact text of the single reported error.

mod common;

use common::compile_err;
use quill::diagnostics::CompileError;
use quill::span::SourceMap;

#[test]
fn unknown_identifier_points_at_the_name() {
    insta::assert_snapshot!(compile_err("var x = y"), @"main.ql:1:9: semantic error: unknown identifier 'y'");
}

#[test]
fn unexpected_character() {
    insta::assert_snapshot!(compile_err("var a = 1 $ 2"), @"main.ql:1:11: lex error: unexpected character '$'");
}

#[test]
fn number_glued_to_name() {
    insta::assert_snapshot!(
        compile_err("var n = 12abc"),
        @"main.ql:1:9: lex error: invalid numeric literal: identifier characters after a number"
    );
}

#[test]
fn missing_terminator() {
    insta::assert_snapshot!(
        compile_err("var a = 1 var b = 2"),
        @"main.ql:1:11: syntax error: expected end of statement, found 'var'"
    );
}

#[test]
fn declared_type_mismatch_points_at_value() {
    insta::assert_snapshot!(
        compile_err("var x: int = \"a\""),
        @"main.ql:1:14: semantic error: cannot assign 'string' to variable 'x' of type 'int'"
    );
}

#[test]
fn condition_on_second_line() {
    insta::assert_snapshot!(
        compile_err("var a = 1\nif a {\n}"),
        @"main.ql:2:4: semantic error: condition must be 'bool', found 'int'"
    );
}

#[test]
fn ambiguous_call_points_at_callee() {
    insta::assert_snapshot!(
        compile_err("void k(long a, int b) {\n}\nvoid k(int a, long b) {\n}\nk(1, 1)"),
        @"main.ql:5:1: semantic error: ambiguous call to 'k': $Program.k(long, int) and $Program.k(int, long)"
    );
}

#[test]
fn closured_field_inside_method() {
    insta::assert_snapshot!(
        compile_err("type Shop {\n int stock\n void open() {\n emit stock every 1.0\n }\n}"),
        @"main.ql:4:7: semantic error: closured member 'stock' cannot be used inside a deferred block"
    );
}

#[test]
fn entry_point_name_is_reserved() {
    insta::assert_snapshot!(
        compile_err("var a = 1\nvoid main() {\n}"),
        @"main.ql:2:6: semantic error: 'main()' is reserved for the program entry point"
    );
}

#[test]
fn main_with_parameters_is_an_ordinary_function() {
    let module = common::compile_ok("void main(int n) {\n}\nmain(1)");
    assert!(module.method("$Program", "main(int)").is_some());
}

#[test]
fn error_without_position() {
    let sources = SourceMap::new();
    insta::assert_snapshot!(CompileError::unlocated("boom").located(&sources), @"semantic error: boom");
}

#[test]
fn io_errors_name_the_path() {
    let sources = SourceMap::new();
    let err = CompileError::io("could not read source: missing", "lib/util.ql");
    insta::assert_snapshot!(err.located(&sources), @"lib/util.ql: io error: could not read source: missing");
}

#[test]
fn display_carries_kind_prefix() {
    let err = quill::compile_source("var x = y").unwrap_err();
    assert_eq!(err.to_string(), "Semantic error: unknown identifier 'y'");
}
