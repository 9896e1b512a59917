//! Resolution options and their sources: command-line flags and the environment.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

/// Directory appended to the include search path.
pub const ROOT_ENV: &str = "CONFC_ROOT";
/// Extra `-D`/`-I` options, applied before the command-line ones.
pub const OPTIONS_ENV: &str = "CONFC_OPTIONS";

pub const DEFAULT_MAX_EXPANSION_DEPTH: usize = 256;

/// A `-D NAME` or `-D NAME=VALUE` definition. A bare name is defined to `1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreDefinition {
    pub name: String,
    pub value: String,
}

impl PreDefinition {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        PreDefinition {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl FromStr for PreDefinition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name, value),
            None => (s, "1"),
        };
        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::InvalidDefinition(s.to_string()));
        }
        Ok(PreDefinition::new(name, value))
    }
}

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Searched in order after the including file's directory.
    pub search_dirs: Vec<PathBuf>,
    pub definitions: Vec<PreDefinition>,
    /// Parse roots as plain documents, without running directives.
    pub no_preprocess: bool,
    pub max_expansion_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            search_dirs: Vec::new(),
            definitions: Vec::new(),
            no_preprocess: false,
            max_expansion_depth: DEFAULT_MAX_EXPANSION_DEPTH,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.definitions.push(PreDefinition::new(name, value));
        self
    }

    pub fn no_preprocess(mut self, enabled: bool) -> Self {
        self.no_preprocess = enabled;
        self
    }

    pub fn max_expansion_depth(mut self, depth: usize) -> Self {
        self.max_expansion_depth = depth;
        self
    }

    /// Applies whitespace-separated `-DNAME[=VALUE]`, `-D NAME`, `-IDIR` and `-I DIR`
    /// options, as found in [`OPTIONS_ENV`].
    pub fn apply_option_string(&mut self, text: &str) -> Result<(), ConfigError> {
        let mut words = text.split_whitespace();
        while let Some(word) = words.next() {
            let (flag, inline) = match word.get(..2) {
                Some(flag @ ("-D" | "-I")) => (flag, &word[2..]),
                _ => return Err(ConfigError::UnknownOption(word.to_string())),
            };
            let value = if inline.is_empty() {
                words
                    .next()
                    .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?
            } else {
                inline
            };
            if flag == "-D" {
                self.definitions.push(value.parse()?);
            } else {
                self.search_dirs.push(PathBuf::from(value));
            }
        }
        Ok(())
    }

    /// Layers the sources in order: options from [`OPTIONS_ENV`], then the given
    /// command-line values, then [`ROOT_ENV`] at the end of the search path.
    pub fn layered<F>(
        env: F,
        search_dirs: Vec<PathBuf>,
        definitions: Vec<PreDefinition>,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = ResolveOptions::default();
        if let Some(extra) = env(OPTIONS_ENV) {
            options.apply_option_string(&extra)?;
        }
        options.search_dirs.extend(search_dirs);
        options.definitions.extend(definitions);
        if let Some(root) = env(ROOT_ENV).filter(|r| !r.is_empty()) {
            options.search_dirs.push(PathBuf::from(root));
        }
        Ok(options)
    }

    /// [`ResolveOptions::layered`] over the process environment.
    pub fn from_env(search_dirs: Vec<PathBuf>, definitions: Vec<PreDefinition>) -> Result<Self, ConfigError> {
        Self::layered(|key| std::env::var(key).ok(), search_dirs, definitions)
    }
}
