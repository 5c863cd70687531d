use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Byte-offset span in a source file, with the 1-based line and column of
/// its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub col: u32,
    pub file_id: u32,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end, line: 1, col: 1, file_id: 0 }
    }

    pub fn located(start: usize, end: usize, line: u32, col: u32, file_id: u32) -> Self {
        Self { start, end, line, col, file_id }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, col: 0, file_id: 0 }
    }

    /// Span from the start of `self` to the end of `other`. Both must belong
    /// to the same file; position info is taken from `self`.
    pub fn to(self, other: Span) -> Span {
        Span { end: other.end.max(self.end), ..self }
    }
}

/// A value annotated with its source span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self { node, span: Span::dummy() }
    }
}

/// Maps byte offsets of one source text to line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// 1-based (line, column) of `offset`. Columns count bytes.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col as u32 + 1)
    }
}

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
}

/// Every file taking part in one compilation, indexed by `Span::file_id`.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> u32 {
        self.files.push(SourceFile { path: path.into(), source: source.into() });
        (self.files.len() - 1) as u32
    }

    pub fn get(&self, file_id: u32) -> Option<&SourceFile> {
        self.files.get(file_id as usize)
    }

    pub fn path(&self, file_id: u32) -> Option<&Path> {
        self.get(file_id).map(|f| f.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
