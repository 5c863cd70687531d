use crate::span::{SourceMap, Span};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Lex error: {msg}")]
    Lex { msg: String, span: Span },

    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    #[error("Semantic error: {msg}")]
    Semantic { msg: String, span: Option<Span> },

    #[error("I/O error: {msg}")]
    Io { msg: String, path: PathBuf },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },
}

impl CompileError {
    pub fn lex(msg: impl Into<String>, span: Span) -> Self {
        Self::Lex { msg: msg.into(), span }
    }

    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    pub fn semantic(msg: impl Into<String>, span: Span) -> Self {
        Self::Semantic { msg: msg.into(), span: Some(span) }
    }

    /// A semantic error whose position is filled in by the caller.
    pub fn unlocated(msg: impl Into<String>) -> Self {
        Self::Semantic { msg: msg.into(), span: None }
    }

    pub fn io(msg: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Io { msg: msg.into(), path: path.into() }
    }

    pub fn config(msg: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Config { msg: msg.into(), path: path.into() }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Lex { msg, .. }
            | Self::Syntax { msg, .. }
            | Self::Semantic { msg, .. }
            | Self::Io { msg, .. }
            | Self::Config { msg, .. } => msg,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Lex { span, .. } | Self::Syntax { span, .. } => Some(*span),
            Self::Semantic { span, .. } => *span,
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }

    fn kind_str(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "lex",
            Self::Syntax { .. } => "syntax",
            Self::Semantic { .. } => "semantic",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
        }
    }

    /// Attach `span` to a semantic error raised without one.
    pub fn with_span_if_missing(self, span: Span) -> Self {
        match self {
            Self::Semantic { msg, span: None } => Self::Semantic { msg, span: Some(span) },
            other => other,
        }
    }

    /// `file:line:col: kind error: message`, or `kind error: message` when the
    /// error has no position.
    pub fn located(&self, sources: &SourceMap) -> String {
        let kind = self.kind_str();
        match self {
            Self::Io { msg, path } | Self::Config { msg, path } => {
                format!("{}: {kind} error: {msg}", path.display())
            }
            _ => match self.span() {
                Some(span) => {
                    let file = sources
                        .path(span.file_id)
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    format!("{file}:{}:{}: {kind} error: {}", span.line, span.col, self.message())
                }
                None => format!("{kind} error: {}", self.message()),
            },
        }
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(sources: &SourceMap, err: &CompileError) -> std::io::Result<()> {
    use ariadne::{Label, Report, ReportKind, Source};

    let located = err
        .span()
        .and_then(|span| sources.get(span.file_id).map(|file| (span, file)));

    match located {
        Some((span, file)) => {
            let end = span.end.max(span.start + 1).min(file.source.len().max(span.start));
            Report::build(ReportKind::Error, (), span.start)
                .with_message(format!("{} error in {}", err.kind_str(), file.path.display()))
                .with_label(Label::new(span.start..end).with_message(err.message()))
                .finish()
                .eprint(Source::from(file.source.as_str()))
        }
        None => {
            eprintln!("error: {}", err.located(sources));
            Ok(())
        }
    }
}
