use quill::diagnostics::CompileError;
use quill::lexer::{lex, token::Token};

fn kinds(src: &str) -> Vec<Token> {
    lex(src, 0).unwrap().into_iter().map(|t| t.node).collect()
}

#[test]
fn type_declaration_tokens() {
    let toks = kinds("autoconstruct type Pt : Base {\n int x\n}");
    assert_eq!(toks, vec![
        Token::Autoconstruct,
        Token::Type,
        Token::Ident("Pt".into()),
        Token::Colon,
        Token::Ident("Base".into()),
        Token::LBrace,
        Token::Newline,
        Token::Ident("int".into()),
        Token::Ident("x".into()),
        Token::Newline,
        Token::RBrace,
        Token::Eof,
    ]);
}

#[test]
fn emit_clause_keywords() {
    let toks = kinds("emit new Car() every 2.5 with d limit 10 until done");
    assert_eq!(toks[0], Token::Emit);
    assert!(toks.contains(&Token::Every));
    assert!(toks.contains(&Token::With));
    assert!(toks.contains(&Token::Limit));
    assert!(toks.contains(&Token::Until));
}

#[test]
fn compound_and_shorthand_operators() {
    let toks = kinds("a += 1\nb **= 2\nc++\nd--\ne <<= 3");
    assert!(toks.contains(&Token::PlusEq));
    assert!(toks.contains(&Token::StarStarEq));
    assert!(toks.contains(&Token::PlusPlus));
    assert!(toks.contains(&Token::MinusMinus));
    assert!(toks.contains(&Token::ShlEq));
}

#[test]
fn symbolic_logical_operators() {
    let toks = kinds("a && b || !c");
    assert_eq!(&toks[..6], &[
        Token::Ident("a".into()),
        Token::AmpAmp,
        Token::Ident("b".into()),
        Token::PipePipe,
        Token::Bang,
        Token::Ident("c".into()),
    ]);
}

#[test]
fn multiline_comment_yields_no_newline() {
    let toks = kinds("var a = 1 /* one\ntwo\nthree */ var b = 2");
    assert!(!toks.contains(&Token::Newline));
}

#[test]
fn binary_literal_uses_all_32_bits() {
    let toks = kinds("0b10000000000000000000000000000000");
    assert_eq!(toks[0], Token::IntLit(i32::MIN));
}

#[test]
fn long_overflow_is_lex_error() {
    let err = lex("99999999999999999999L", 0).unwrap_err();
    assert!(matches!(err, CompileError::Lex { .. }));
}

#[test]
fn number_glued_to_identifier_is_error() {
    let err = lex("var x = 12abc", 0).unwrap_err();
    assert!(err.message().starts_with("invalid numeric literal"));
}

#[test]
fn string_cannot_span_lines() {
    assert!(lex("\"abc\ndef\"", 0).is_err());
}

#[test]
fn spans_cover_token_text() {
    let src = "var total = 10";
    let toks = lex(src, 0).unwrap();
    let total = &toks[1];
    assert_eq!(&src[total.span.start..total.span.end], "total");
    assert_eq!(total.span.col, 5);
}
