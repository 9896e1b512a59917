//! Locating, reading and tokenizing included files, and tracking the active inclusion chain.

use crate::error::ResolveError;
use crate::lexer::{Lexer, Token};
use crate::source::{Snippet, SourceId, SourceMap};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The operand of an `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSpec {
    pub path: String,
    /// `#include <x>`: the including file's directory is not searched.
    pub angled: bool,
}

#[derive(Debug)]
pub struct IncludedFile {
    pub id: SourceId,
    pub path: PathBuf,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Default)]
pub struct InclusionContext {
    search_dirs: Vec<PathBuf>,
    /// Files currently being expanded, outermost first: (canonical path, display name).
    chain: Vec<(PathBuf, String)>,
    /// Every file pulled in by `#include`, in first-inclusion order.
    included: Vec<PathBuf>,
}

impl InclusionContext {
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        InclusionContext {
            search_dirs,
            ..Default::default()
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    pub fn included(&self) -> &[PathBuf] {
        &self.included
    }

    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// Reads and tokenizes the root template. A root that cannot be read is reported
    /// against the command line since there is no including file.
    pub fn open_root(&mut self, path: &Path, sources: &mut SourceMap) -> Result<IncludedFile, ResolveError> {
        let display = path.display().to_string();
        let canonical = canonical(path);
        let id = load_source(path, display.clone(), canonical.clone(), sources, |sources, e| {
            let id = sources.add("<command line>", None, display.clone());
            read_failure(sources.snippet_at(id, 0, display.len()), display.clone(), e)
        })?;
        let tokens = tokenize(id, sources)?;
        Ok(IncludedFile {
            id,
            path: canonical,
            tokens,
        })
    }

    /// Finds the file named by `spec`: relative to `including_dir` first (unless angled),
    /// then in each search directory. Absolute paths are used as they are.
    ///
    /// On failure, returns the candidate paths that were tried.
    pub fn locate(&self, spec: &IncludeSpec, including_dir: Option<&Path>) -> Result<PathBuf, Vec<String>> {
        let requested = Path::new(&spec.path);
        if requested.is_absolute() {
            return if requested.is_file() {
                Ok(requested.to_path_buf())
            } else {
                Err(vec![spec.path.clone()])
            };
        }

        let mut dirs: Vec<&Path> = Vec::new();
        if !spec.angled {
            dirs.push(including_dir.unwrap_or_else(|| Path::new(".")));
        }
        dirs.extend(self.search_dirs.iter().map(PathBuf::as_path));

        let mut tried = Vec::new();
        for dir in dirs {
            let candidate = dir.join(requested);
            if candidate.is_file() {
                return Ok(candidate);
            }
            tried.push(dir.display().to_string());
        }
        Err(tried)
    }

    /// Resolves an `#include` operand to a tokenized file. `directive` locates the request
    /// for diagnostics and decides the including directory.
    ///
    /// # Errors
    /// `FileNotFound` if no candidate exists, `Read` if it cannot be read,
    /// `CyclicInclusion` if the file is already being expanded, or a `Lex` error from the
    /// included text (including text that is not UTF-8).
    pub fn resolve(
        &mut self,
        spec: &IncludeSpec,
        directive: &Token,
        sources: &mut SourceMap,
    ) -> Result<IncludedFile, ResolveError> {
        let including_dir = sources
            .path(directive.source)
            .and_then(Path::parent)
            .map(Path::to_path_buf);

        let found = self
            .locate(spec, including_dir.as_deref())
            .map_err(|tried| {
                ResolveError::not_found(
                    sources.snippet(directive),
                    spec.path.clone(),
                    "file not found",
                    tried,
                )
            })?;
        let canonical = canonical(&found);
        let display = found.display().to_string();

        if self.chain.iter().any(|(p, _)| p == &canonical) {
            let mut cycle: Vec<String> = self.chain.iter().map(|(_, name)| name.clone()).collect();
            cycle.push(display);
            return Err(ResolveError::cyclic(sources.snippet(directive), cycle));
        }

        debug!("include {} (from {}:{})", display, sources.name(directive.source), directive.line);
        let id = load_source(&found, display, canonical.clone(), sources, |sources, e| {
            read_failure(sources.snippet(directive), spec.path.clone(), e)
        })?;
        if !self.included.contains(&canonical) {
            self.included.push(canonical.clone());
        }
        let tokens = tokenize(id, sources)?;
        Ok(IncludedFile {
            id,
            path: canonical,
            tokens,
        })
    }

    /// Marks a file as being expanded.
    pub fn enter(&mut self, path: PathBuf, name: impl Into<String>) {
        self.chain.push((path, name.into()));
    }

    pub fn leave(&mut self) {
        self.chain.pop();
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Reads a template into the source map. Text that is not UTF-8 is stored lossily so
/// the `Lex` error can point at the first invalid byte.
fn load_source(
    path: &Path,
    display: String,
    canonical: PathBuf,
    sources: &mut SourceMap,
    io_error: impl FnOnce(&mut SourceMap, io::Error) -> ResolveError,
) -> Result<SourceId, ResolveError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return Err(io_error(sources, e)),
    };
    match String::from_utf8(bytes) {
        Ok(text) => Ok(sources.add(display, Some(canonical), text)),
        Err(e) => {
            let offset = e.utf8_error().valid_up_to();
            let text = String::from_utf8_lossy(e.as_bytes()).into_owned();
            let id = sources.add(display, Some(canonical), text);
            Err(ResolveError::lex(
                sources.snippet_at(id, offset, offset + char::REPLACEMENT_CHARACTER.len_utf8()),
                "file is not valid UTF-8 text",
            ))
        }
    }
}

fn read_failure(at: Snippet, path: String, e: io::Error) -> ResolveError {
    if e.kind() == io::ErrorKind::NotFound {
        ResolveError::not_found(at, path, e.to_string(), Vec::new())
    } else {
        ResolveError::read(at, path, e.to_string())
    }
}

pub(crate) fn tokenize(id: SourceId, sources: &SourceMap) -> Result<Vec<Token>, ResolveError> {
    Lexer::new_with_name(sources.text(id), id, sources.name(id)).lex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_locate_prefers_including_directory() {
        let dir = tempdir().unwrap();
        let local = dir.path().join("local");
        let shared = dir.path().join("shared");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&shared).unwrap();
        fs::write(local.join("conf.h"), "").unwrap();
        fs::write(shared.join("conf.h"), "").unwrap();

        let ctx = InclusionContext::new(vec![shared.clone()]);
        let quoted = IncludeSpec { path: "conf.h".to_string(), angled: false };
        assert_eq!(ctx.locate(&quoted, Some(&local)).unwrap(), local.join("conf.h"));

        let angled = IncludeSpec { path: "conf.h".to_string(), angled: true };
        assert_eq!(ctx.locate(&angled, Some(&local)).unwrap(), shared.join("conf.h"));
    }

    #[test]
    fn test_locate_reports_directories_tried() {
        let dir = tempdir().unwrap();
        let ctx = InclusionContext::new(vec![dir.path().join("inc")]);
        let spec = IncludeSpec { path: "missing.js".to_string(), angled: false };
        let tried = ctx.locate(&spec, Some(dir.path())).unwrap_err();
        assert_eq!(tried.len(), 2);
        assert!(tried[1].ends_with("inc"));
    }

    #[test]
    fn test_open_missing_root() {
        let mut sources = SourceMap::new();
        let mut ctx = InclusionContext::default();
        let err = ctx
            .open_root(Path::new("/definitely/not/here.js"), &mut sources)
            .unwrap_err();
        assert!(matches!(err, ResolveError::FileNotFound { .. }));
        assert_eq!(err.file(), "<command line>");
    }

    #[test]
    fn test_root_that_is_not_utf8() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("run.js");
        fs::write(&root, b"{\n\"a\": \"\xff\xfe\" }").unwrap();
        let mut sources = SourceMap::new();
        let err = InclusionContext::default().open_root(&root, &mut sources).unwrap_err();
        match &err {
            ResolveError::Lex { message, line, .. } => {
                assert!(message.contains("UTF-8"));
                assert_eq!(*line, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.file().ends_with("run.js"));
    }

    #[test]
    fn test_directory_root_is_a_read_error() {
        let dir = tempdir().unwrap();
        let mut sources = SourceMap::new();
        let err = InclusionContext::default().open_root(dir.path(), &mut sources).unwrap_err();
        assert!(matches!(err, ResolveError::Read { .. }), "{err:?}");
        assert_eq!(err.file(), "<command line>");
    }
}
