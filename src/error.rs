use crate::source::Snippet;
use crate::utils::format_chain;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ConfcError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationReport),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {path}: {reason}")]
    #[diagnostic(code(confc::output))]
    Output { path: String, reason: String },

    #[error("resolving {path} was aborted: {reason}")]
    #[diagnostic(code(confc::aborted))]
    Aborted { path: String, reason: String },
}

/// Fatal errors of one resolution. Every variant knows the file and 1-based line it
/// refers to, and carries the source text so `miette` can render the offending line.
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ResolveError {
    #[error("{message}")]
    #[diagnostic(code(confc::lex))]
    Lex {
        file: String,
        line: usize,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("starts here")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(confc::syntax))]
    Syntax {
        file: String,
        line: usize,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("cyclic inclusion: {}", format_chain(.chain))]
    #[diagnostic(
        code(confc::cyclic_inclusion),
        help("A file may not include itself, directly or through other files.")
    )]
    CyclicInclusion {
        file: String,
        line: usize,
        chain: Vec<String>,
        #[source_code]
        src: NamedSource<String>,
        #[label("this include closes the cycle")]
        span: SourceSpan,
    },

    #[error("cannot include `{path}`: {reason}")]
    #[diagnostic(code(confc::file_not_found))]
    FileNotFound {
        file: String,
        line: usize,
        path: String,
        reason: String,
        tried: Vec<String>,
        #[source_code]
        src: NamedSource<String>,
        #[label("requested here")]
        span: SourceSpan,
        #[help]
        searched: Option<String>,
    },

    #[error("cannot read `{path}`: {reason}")]
    #[diagnostic(code(confc::read))]
    Read {
        file: String,
        line: usize,
        path: String,
        reason: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("requested here")]
        span: SourceSpan,
    },

    #[error("recursive expansion of macro `{name}` ({})", format_chain(.chain))]
    #[diagnostic(
        code(confc::recursive_macro),
        help("A macro cannot expand to an invocation of itself.")
    )]
    RecursiveMacro {
        file: String,
        line: usize,
        name: String,
        chain: Vec<String>,
        #[source_code]
        src: NamedSource<String>,
        #[label("expanded again here")]
        span: SourceSpan,
    },

    #[error("macro `{name}` expands to `{expansion}`, which is not an integer expression")]
    #[diagnostic(
        code(confc::non_integer_condition),
        help("Conditions compare integers; define the macro to a number to test its value.")
    )]
    NonIntegerCondition {
        file: String,
        line: usize,
        name: String,
        expansion: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("used in a condition here")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(confc::unbalanced_conditional))]
    UnbalancedConditional {
        file: String,
        line: usize,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(confc::directive))]
    Directive {
        file: String,
        line: usize,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
    },

    #[error("{message}")]
    #[diagnostic(code(confc::macro_invocation))]
    Macro {
        file: String,
        line: usize,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: SourceSpan,
    },
}

impl ResolveError {
    pub fn lex(at: Snippet, message: impl Into<String>) -> Self {
        ResolveError::Lex {
            file: at.file,
            line: at.line,
            message: message.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn syntax(at: Snippet, message: impl Into<String>) -> Self {
        ResolveError::Syntax {
            file: at.file,
            line: at.line,
            message: message.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn unbalanced(at: Snippet, message: impl Into<String>) -> Self {
        ResolveError::UnbalancedConditional {
            file: at.file,
            line: at.line,
            message: message.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn directive(at: Snippet, message: impl Into<String>) -> Self {
        ResolveError::Directive {
            file: at.file,
            line: at.line,
            message: message.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn macro_error(at: Snippet, message: impl Into<String>) -> Self {
        ResolveError::Macro {
            file: at.file,
            line: at.line,
            message: message.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn cyclic(at: Snippet, chain: Vec<String>) -> Self {
        ResolveError::CyclicInclusion {
            file: at.file,
            line: at.line,
            chain,
            src: at.src,
            span: at.span,
        }
    }

    pub fn not_found(at: Snippet, path: impl Into<String>, reason: impl Into<String>, tried: Vec<String>) -> Self {
        let searched = if tried.is_empty() {
            None
        } else {
            Some(format!("searched: {}", tried.join(", ")))
        };
        ResolveError::FileNotFound {
            file: at.file,
            line: at.line,
            path: path.into(),
            reason: reason.into(),
            tried,
            src: at.src,
            span: at.span,
            searched,
        }
    }

    pub fn read(at: Snippet, path: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolveError::Read {
            file: at.file,
            line: at.line,
            path: path.into(),
            reason: reason.into(),
            src: at.src,
            span: at.span,
        }
    }

    pub fn recursive(at: Snippet, name: impl Into<String>, chain: Vec<String>) -> Self {
        ResolveError::RecursiveMacro {
            file: at.file,
            line: at.line,
            name: name.into(),
            chain,
            src: at.src,
            span: at.span,
        }
    }

    pub fn non_integer(at: Snippet, name: impl Into<String>, expansion: impl Into<String>) -> Self {
        ResolveError::NonIntegerCondition {
            file: at.file,
            line: at.line,
            name: name.into(),
            expansion: expansion.into(),
            src: at.src,
            span: at.span,
        }
    }

    /// The file the error points into.
    pub fn file(&self) -> &str {
        match self {
            ResolveError::Lex { file, .. }
            | ResolveError::Syntax { file, .. }
            | ResolveError::CyclicInclusion { file, .. }
            | ResolveError::FileNotFound { file, .. }
            | ResolveError::Read { file, .. }
            | ResolveError::RecursiveMacro { file, .. }
            | ResolveError::NonIntegerCondition { file, .. }
            | ResolveError::UnbalancedConditional { file, .. }
            | ResolveError::Directive { file, .. }
            | ResolveError::Macro { file, .. } => file,
        }
    }

    /// 1-based line inside [`ResolveError::file`].
    pub fn line(&self) -> usize {
        match self {
            ResolveError::Lex { line, .. }
            | ResolveError::Syntax { line, .. }
            | ResolveError::CyclicInclusion { line, .. }
            | ResolveError::FileNotFound { line, .. }
            | ResolveError::Read { line, .. }
            | ResolveError::RecursiveMacro { line, .. }
            | ResolveError::NonIntegerCondition { line, .. }
            | ResolveError::UnbalancedConditional { line, .. }
            | ResolveError::Directive { line, .. }
            | ResolveError::Macro { line, .. } => *line,
        }
    }

    /// One-line `file:line: message` rendering for logs and plain-text reports.
    pub fn summary(&self) -> String {
        format!("{}:{}: {}", self.file(), self.line(), self)
    }
}

/// A schema violation at a concrete key path such as `output[3].file.fmt`.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq, Serialize)]
#[error("{path}: {message}")]
#[diagnostic(code(confc::validation))]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// All violations found in one document, reported together.
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{} failed validation with {} error(s)", .document, .errors.len())]
#[diagnostic(code(confc::invalid_document))]
pub struct ValidationReport {
    pub document: String,
    #[related]
    pub errors: Vec<ValidationError>,
}

#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    #[error("cannot read schema {path}: {reason}")]
    #[diagnostic(code(confc::schema::io))]
    Io { path: String, reason: String },

    #[error("invalid JSON schema {path}: {source}")]
    #[diagnostic(code(confc::schema::json))]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML schema {path}: {source}")]
    #[diagnostic(code(confc::schema::yaml))]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid rule `{path}`: {message}")]
    #[diagnostic(code(confc::schema::rule))]
    InvalidRule { path: String, message: String },
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid macro definition `{0}`")]
    #[diagnostic(
        code(confc::config::definition),
        help("Use NAME or NAME=VALUE, where NAME is an identifier.")
    )]
    InvalidDefinition(String),

    #[error("option `{0}` expects a value")]
    #[diagnostic(code(confc::config::missing_value))]
    MissingValue(String),

    #[error("unsupported option `{0}`")]
    #[diagnostic(
        code(confc::config::unknown_option),
        help("Only -D and -I options are accepted here.")
    )]
    UnknownOption(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceMap;

    #[test]
    fn test_summary_has_file_and_line() {
        let mut sources = SourceMap::new();
        let id = sources.add("main.js", None, "{\n #bogus\n}".to_string());
        let err = ResolveError::directive(sources.snippet_at(id, 4, 9), "unknown directive `bogus`");
        assert_eq!(err.summary(), "main.js:2: unknown directive `bogus`");
    }

    #[test]
    fn test_cycle_message_shows_chain() {
        let mut sources = SourceMap::new();
        let id = sources.add("a.js", None, "#include \"a.js\"".to_string());
        let err = ResolveError::cyclic(
            sources.snippet_at(id, 9, 15),
            vec!["a.js".to_string(), "a.js".to_string()],
        );
        assert_eq!(err.to_string(), "cyclic inclusion: a.js -> a.js");
    }

    #[test]
    fn test_validation_report_counts() {
        let report = ValidationReport {
            document: "lpjml.js".to_string(),
            errors: vec![ValidationError {
                path: "input.soil.fmt".to_string(),
                message: "missing required key".to_string(),
            }],
        };
        assert_eq!(report.to_string(), "lpjml.js failed validation with 1 error(s)");
    }
}
