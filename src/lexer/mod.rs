pub mod token;
pub use token::{is_keyword, LexErrorKind};

use logos::Logos;
use crate::span::{LineIndex, Span, Spanned};
use crate::diagnostics::CompileError;
use token::Token;

/// Tokenize one source file. Comments are dropped, newline runs are kept as
/// statement terminators, and the result always ends with `Token::Eof`.
pub fn lex(source: &str, file_id: u32) -> Result<Vec<Spanned<Token>>, CompileError> {
    let index = LineIndex::new(source);
    let locate = |start: usize, end: usize| {
        let (line, col) = index.line_col(start);
        Span::located(start, end, line, col, file_id)
    };

    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = locate(range.start, range.end);
        match result {
            Ok(Token::Comment) => {}
            Ok(tok) => tokens.push(Spanned::new(tok, span)),
            Err(LexErrorKind::NumericOverflow) => {
                return Err(CompileError::lex(
                    format!("numeric literal out of range '{}'", lexer.slice()),
                    span,
                ));
            }
            Err(LexErrorKind::UnexpectedCharacter) => {
                let ch = source[range.start..].chars().next().unwrap_or(' ');
                return Err(CompileError::lex(format!("unexpected character '{ch}'"), span));
            }
        }
    }

    // A number glued to an identifier (`12abc`) is never valid.
    for pair in tokens.windows(2) {
        let numeric = matches!(
            pair[0].node,
            Token::IntLit(_) | Token::LongLit(_) | Token::FloatLit(_) | Token::ImaginaryLit(_)
        );
        if numeric && matches!(pair[1].node, Token::Ident(_)) && pair[0].span.end == pair[1].span.start {
            return Err(CompileError::lex(
                "invalid numeric literal: identifier characters after a number",
                pair[0].span.to(pair[1].span),
            ));
        }
    }

    let eof = locate(source.len(), source.len());
    tokens.push(Spanned::new(Token::Eof, eof));
    Ok(tokens)
}
