use crate::ast::DocumentNode;
use crate::config::ResolveOptions;
use crate::error::{ConfcError, ResolveError, ValidationError, ValidationReport};
use crate::expander::Expander;
use crate::include::tokenize;
use crate::macros::MacroTable;
use crate::parser::Parser;
use crate::schema::Schema;
use crate::serialization::to_value;
use crate::source::SourceMap;
use log::debug;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};

/// How a resolved document is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    JsonCompact,
    Yaml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json | OutputFormat::JsonCompact => "json",
            OutputFormat::Yaml => "yaml",
        }
    }
}

/// The result of a successful resolution.
/// This struct contains the assembled document together with what was
/// learned while producing it: the files pulled in and the final macro table.
#[derive(Debug)]
pub struct Resolution {
    /// Name of the root template, as given.
    pub name: String,
    pub document: DocumentNode,
    /// Included files in first-inclusion order.
    pub includes: Vec<PathBuf>,
    /// Macro definitions in effect at the end of the root file.
    pub macros: MacroTable,
}

impl Serialize for Resolution {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.document.serialize(serializer)
    }
}

impl Resolution {
    /// Converts the resolved document into a `serde_json::Value`, keys in document order.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        to_value(&self.document)
    }

    /// Serializes the resolved document into a pretty-printed JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// Serializes the resolved document into a single-line JSON string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }

    /// Serializes the resolved document into a YAML string.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }

    /// Renders the document completely in memory.
    pub fn render(&self, format: OutputFormat) -> Result<String, ConfcError> {
        let rendered = match format {
            OutputFormat::Json => self.to_json().map_err(|e| e.to_string()),
            OutputFormat::JsonCompact => self.to_json_compact().map_err(|e| e.to_string()),
            OutputFormat::Yaml => self.to_yaml().map_err(|e| e.to_string()),
        };
        rendered.map_err(|reason| ConfcError::Output {
            path: self.name.clone(),
            reason,
        })
    }

    /// Every schema violation of the document, in rule order.
    #[must_use]
    pub fn validation_errors(&self, schema: &Schema) -> Vec<ValidationError> {
        schema.validate(&self.document)
    }

    /// Validates the document, bundling all violations into one report.
    ///
    /// # Errors
    /// Returns a `ValidationReport` listing every violation if there is at least one.
    pub fn validate(&self, schema: &Schema) -> Result<(), ValidationReport> {
        let errors = self.validation_errors(schema);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport {
                document: self.name.clone(),
                errors,
            })
        }
    }
}

/// Resolves a root template file: runs its directives, splices includes, expands macros
/// and parses the result into one document.
///
/// # Arguments
///
/// * `path` - The root template.
/// * `options` - Search directories, pre-definitions and mode switches.
///
/// # Errors
///
/// Returns the first `ResolveError` met; resolution stops there.
pub fn resolve_file(path: &Path, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    let name = path.display().to_string();
    let mut expander = Expander::new(options);
    if options.no_preprocess {
        let root = expander.includes.open_root(path, &mut expander.sources)?;
        let document = Parser::new(root.tokens, &expander.sources).parse_document()?;
        return Ok(finish(name, document, expander));
    }
    expander.predefine(&options.definitions)?;
    let tokens = expander.expand_root(path)?;
    let document = Parser::new(tokens, &expander.sources).parse_document()?;
    Ok(finish(name, document, expander))
}

/// Resolves template text held in memory. Relative includes are searched from the
/// current directory and then the configured search directories.
///
/// # Errors
///
/// Returns the first `ResolveError` met.
pub fn resolve_str(source: &str, file_name: &str, options: &ResolveOptions) -> Result<Resolution, ResolveError> {
    let mut expander = Expander::new(options);
    if options.no_preprocess {
        let mut sources = SourceMap::new();
        let id = sources.add(file_name, None, source.to_string());
        let tokens = tokenize(id, &sources)?;
        let document = Parser::new(tokens, &sources).parse_document()?;
        return Ok(finish(file_name.to_string(), document, expander));
    }
    expander.predefine(&options.definitions)?;
    let tokens = expander.expand_str(file_name, source)?;
    let document = Parser::new(tokens, &expander.sources).parse_document()?;
    Ok(finish(file_name.to_string(), document, expander))
}

fn finish(name: String, document: DocumentNode, expander: Expander) -> Resolution {
    let includes = expander.includes.included().to_vec();
    debug!(
        "resolved {} ({} include(s), {} macro(s))",
        name,
        includes.len(),
        expander.macros.len()
    );
    Resolution {
        name,
        document,
        includes,
        macros: expander.macros,
    }
}
