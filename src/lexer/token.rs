use logos::{Lexer, Logos};

/// Why the lexer rejected a slice of input.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LexErrorKind {
    #[default]
    UnexpectedCharacter,
    NumericOverflow,
}

fn split_radix(s: &str) -> (&str, u32) {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if let Some(bin) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (bin, 2)
    } else {
        (s, 10)
    }
}

fn int_literal(lex: &mut Lexer<Token>) -> Result<i32, LexErrorKind> {
    let (digits, radix) = split_radix(lex.slice());
    if radix == 10 {
        digits.parse::<i32>().map_err(|_| LexErrorKind::NumericOverflow)
    } else {
        // Hex and binary literals cover the full 32-bit pattern.
        u32::from_str_radix(digits, radix)
            .map(|v| v as i32)
            .map_err(|_| LexErrorKind::NumericOverflow)
    }
}

fn long_literal(lex: &mut Lexer<Token>) -> Result<i64, LexErrorKind> {
    let slice = lex.slice();
    let (digits, radix) = split_radix(&slice[..slice.len() - 1]);
    if radix == 10 {
        digits.parse::<i64>().map_err(|_| LexErrorKind::NumericOverflow)
    } else {
        u64::from_str_radix(digits, radix)
            .map(|v| v as i64)
            .map_err(|_| LexErrorKind::NumericOverflow)
    }
}

fn float_literal(text: &str) -> Result<f64, LexErrorKind> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(LexErrorKind::NumericOverflow),
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(error = LexErrorKind)]
pub enum Token {
    // Keywords
    #[token("type")]
    Type,
    #[token("enum")]
    Enum,
    #[token("autoconstruct")]
    Autoconstruct,
    #[token("static")]
    Static,
    #[token("private")]
    Private,
    #[token("var")]
    Var,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("redo")]
    Redo,
    #[token("return")]
    Return,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("use")]
    Use,
    #[token("include")]
    Include,
    #[token("emit")]
    Emit,
    #[token("every")]
    Every,
    #[token("with")]
    With,
    #[token("limit")]
    Limit,
    #[token("until")]
    Until,
    #[token("simulate")]
    Simulate,
    #[token("planner")]
    Planner,

    // Literals
    #[regex(r"0[xX][0-9a-fA-F]+|0[bB][01]+|[0-9]+", int_literal)]
    IntLit(i32),

    #[regex(r"(0[xX][0-9a-fA-F]+|0[bB][01]+|[0-9]+)L", long_literal)]
    LongLit(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+", |lex| float_literal(lex.slice()))]
    FloatLit(f64),

    #[regex(r"([0-9]+\.[0-9]+|[0-9]+)[ij]", |lex| {
        let s = lex.slice();
        float_literal(&s[..s.len() - 1])
    })]
    ImaginaryLit(f64),

    #[regex(r#""[^"\n]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    StringLit(String),

    // Identifiers
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice()[1..].to_string())]
    FieldIdent(String),

    // Operators
    #[token("++")]
    PlusPlus,
    #[token("+")]
    Plus,
    #[token("--")]
    MinusMinus,
    #[token("-")]
    Minus,
    #[token("**")]
    StarStar,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("**=")]
    StarStarEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("!")]
    Bang,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("..")]
    DotDot,
    #[token(".")]
    Dot,

    // A run of line breaks (and the blank space between them) ends a statement.
    #[regex(r"\n[ \t\r\n]*")]
    Newline,

    #[regex(r"//[^\n]*")]
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    Comment,

    /// Appended by `lex` after the last real token.
    Eof,
}

/// Returns true if the given string is a Quill keyword.
pub fn is_keyword(s: &str) -> bool {
    matches!(s, "type" | "enum" | "autoconstruct" | "static" | "private" | "var" | "if"
        | "else" | "while" | "for" | "in" | "break" | "redo" | "return" | "new" | "this"
        | "null" | "true" | "false" | "and" | "or" | "not" | "use" | "include" | "emit"
        | "every" | "with" | "limit" | "until" | "simulate" | "planner")
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Type => "type",
            Token::Enum => "enum",
            Token::Autoconstruct => "autoconstruct",
            Token::Static => "static",
            Token::Private => "private",
            Token::Var => "var",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::In => "in",
            Token::Break => "break",
            Token::Redo => "redo",
            Token::Return => "return",
            Token::New => "new",
            Token::This => "this",
            Token::Null => "null",
            Token::True => "true",
            Token::False => "false",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Use => "use",
            Token::Include => "include",
            Token::Emit => "emit",
            Token::Every => "every",
            Token::With => "with",
            Token::Limit => "limit",
            Token::Until => "until",
            Token::Simulate => "simulate",
            Token::Planner => "planner",
            Token::IntLit(n) => return write!(f, "{n}"),
            Token::LongLit(n) => return write!(f, "{n}L"),
            Token::FloatLit(n) => return write!(f, "{n}"),
            Token::ImaginaryLit(n) => return write!(f, "{n}i"),
            Token::StringLit(s) => return write!(f, "\"{s}\""),
            Token::Ident(name) => return write!(f, "identifier '{name}'"),
            Token::FieldIdent(name) => return write!(f, "'@{name}'"),
            Token::PlusPlus => "++",
            Token::Plus => "+",
            Token::MinusMinus => "--",
            Token::Minus => "-",
            Token::StarStar => "**",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarStarEq => "**=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::PercentEq => "%=",
            Token::AmpEq => "&=",
            Token::PipeEq => "|=",
            Token::CaretEq => "^=",
            Token::ShlEq => "<<=",
            Token::ShrEq => ">>=",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::Bang => "!",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::DotDot => "..",
            Token::Dot => ".",
            Token::Newline => "newline",
            Token::Comment => "comment",
            Token::Eof => "end of file",
        };
        if matches!(self, Token::Newline | Token::Comment | Token::Eof) {
            write!(f, "{text}")
        } else {
            write!(f, "'{text}'")
        }
    }
}
