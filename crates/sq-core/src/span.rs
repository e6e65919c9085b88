use serde::{Deserialize, Serialize};
use std::fmt;

pub type FileId = u32;

/// Source position attached to every front-end node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub file: FileId,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub col: u32,
}

impl Span {
    pub fn new(file: FileId, line: u32, col: u32) -> Span {
        Span { file, line, col }
    }

    pub fn null() -> Span {
        Span::default()
    }

    pub fn is_null(&self) -> bool {
        self.line == 0 && self.col == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// Maps file ids to the names reported by the front end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<String>,
}

impl SourceMap {
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }

    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        self.files.push(name.into());
        (self.files.len() - 1) as FileId
    }

    pub fn file_name(&self, file: FileId) -> &str {
        self.files
            .get(file as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    /// Renders `file:line:col` using the file name instead of the id.
    pub fn describe(&self, span: &Span) -> String {
        format!("{}:{}:{}", self.file_name(span.file), span.line, span.col)
    }
}
