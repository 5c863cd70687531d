// Property tests for the lexer: it must never panic, must be deterministic,
// and every successful token stream must be well formed.

use proptest::prelude::*;
use quill::lexer::{lex, token::Token};

#[test]
fn prop_lexer_never_panics() {
    proptest!(|(source in "\\PC{0,600}")| {
        let _ = lex(&source, 0);
    });
}

#[test]
fn prop_lexing_is_deterministic() {
    proptest!(|(source in "\\PC{0,300}")| {
        let first = lex(&source, 0);
        let second = lex(&source, 0);
        prop_assert_eq!(first.is_ok(), second.is_ok());
        if let (Ok(a), Ok(b)) = (first, second) {
            prop_assert_eq!(a.len(), b.len());
            for (x, y) in a.iter().zip(b.iter()) {
                prop_assert_eq!(&x.node, &y.node);
                prop_assert_eq!(x.span, y.span);
            }
        }
    });
}

#[test]
fn prop_stream_ends_with_single_eof() {
    proptest!(|(source in "[a-z0-9 +*/=(){}\\n.-]{0,200}")| {
        if let Ok(tokens) = lex(&source, 0) {
            prop_assert!(matches!(tokens.last().map(|t| &t.node), Some(Token::Eof)));
            let eofs = tokens.iter().filter(|t| matches!(t.node, Token::Eof)).count();
            prop_assert_eq!(eofs, 1);
        }
    });
}

#[test]
fn prop_spans_are_ordered_and_in_bounds() {
    proptest!(|(source in "[a-z0-9 +*<>=!(){}\\[\\]\\n]{0,200}")| {
        if let Ok(tokens) = lex(&source, 0) {
            let mut last_end = 0;
            for tok in &tokens {
                prop_assert!(tok.span.start <= tok.span.end);
                prop_assert!(tok.span.end <= source.len());
                prop_assert!(tok.span.start >= last_end, "overlap at {:?}", tok.span);
                last_end = tok.span.end;
            }
        }
    });
}

// =============================================================================
// Generated literals
// =============================================================================

#[test]
fn prop_int_literals_keep_their_value() {
    proptest!(|(n in 0i32..=i32::MAX)| {
        let tokens = lex(&n.to_string(), 0).unwrap();
        prop_assert_eq!(&tokens[0].node, &Token::IntLit(n));
    });
}

#[test]
fn prop_identifiers_lex_as_one_token() {
    proptest!(|(name in "[a-z_][a-zA-Z0-9_]{0,20}")| {
        prop_assume!(!quill::lexer::is_keyword(&name));
        let tokens = lex(&name, 0).unwrap();
        prop_assert_eq!(tokens.len(), 2);
        prop_assert_eq!(&tokens[0].node, &Token::Ident(name.clone()));
    });
}

#[test]
fn prop_number_glued_to_name_is_rejected() {
    proptest!(|(n in 1u16.., name in "[a-z][a-z]{0,5}")| {
        let source = format!("{n}{name}");
        let rejected = lex(&source, 0).is_err();
        // `2i` and `2j` are imaginary literals, `2L` is a long.
        let literal_suffix = name == "i" || name == "j";
        prop_assert_eq!(rejected, !literal_suffix);
    });
}
