//! Source bookkeeping for one resolution.
//!
//! Every file (and every command-line definition) that contributes tokens is registered
//! here once; tokens only carry the small [`SourceId`], and diagnostics look the text up
//! again when an error has to be rendered.

use crate::lexer::Token;
use crate::utils::get_line_and_column;
use miette::{NamedSource, SourceSpan};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Index of a registered source inside a [`SourceMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceId(pub usize);

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub path: Option<PathBuf>,
    pub text: Arc<String>,
}

/// Everything an error variant needs to point at a location.
#[derive(Debug)]
pub struct Snippet {
    pub file: String,
    pub line: usize,
    pub src: NamedSource<String>,
    pub span: SourceSpan,
}

#[derive(Debug, Default, Clone)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, path: Option<PathBuf>, text: String) -> SourceId {
        let id = SourceId(self.files.len());
        self.files.push(SourceFile {
            name: name.into(),
            path,
            text: Arc::new(text),
        });
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }

    pub fn name(&self, id: SourceId) -> &str {
        self.get(id).map_or("<unknown>", |f| f.name.as_str())
    }

    pub fn path(&self, id: SourceId) -> Option<&Path> {
        self.get(id).and_then(|f| f.path.as_deref())
    }

    pub fn text(&self, id: SourceId) -> &str {
        self.get(id).map_or("", |f| f.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn named_source(&self, id: SourceId) -> NamedSource<String> {
        NamedSource::new(self.name(id), self.text(id).to_string())
    }

    /// Location of a token, ready to be moved into an error variant.
    pub fn snippet(&self, token: &Token) -> Snippet {
        Snippet {
            file: self.name(token.source).to_string(),
            line: token.line,
            src: self.named_source(token.source),
            span: (token.pos_start, token.pos_end.saturating_sub(token.pos_start)).into(),
        }
    }

    /// Location of a raw byte range, used before tokens exist (lexing).
    pub fn snippet_at(&self, id: SourceId, pos_start: usize, pos_end: usize) -> Snippet {
        let (line, _) = get_line_and_column(self.text(id), pos_start);
        Snippet {
            file: self.name(id).to_string(),
            line,
            src: self.named_source(id),
            span: (pos_start, pos_end.saturating_sub(pos_start)).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_at_reports_line() {
        let mut sources = SourceMap::new();
        let id = sources.add("a.js", None, "{\n  \"a\": 1,\n  oops\n}".to_string());
        let snippet = sources.snippet_at(id, 15, 19);
        assert_eq!(snippet.file, "a.js");
        assert_eq!(snippet.line, 3);
    }

    #[test]
    fn test_unknown_id_is_harmless() {
        let sources = SourceMap::new();
        assert_eq!(sources.name(SourceId(4)), "<unknown>");
        assert_eq!(sources.text(SourceId(4)), "");
    }
}
