//! Declarative validation of resolved documents.
//!
//! A schema is a flat list of rules, each addressing values by a dotted key path in which
//! `*` stands for every key of an object or every element of an array. Validation never
//! stops at the first problem: it returns every violation with the concrete path
//! (`output[3].file.fmt`) at which it was found.

use crate::ast::{DocumentNode, Number, Scalar, ValueKind};
use crate::error::{SchemaError, ValidationError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub rules: Vec<SchemaRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRule {
    pub path: String,
    #[serde(default)]
    pub required: bool,
    /// Accepted kinds; empty accepts anything.
    #[serde(default, rename = "type")]
    pub kinds: Vec<ValueKind>,
    /// Accepted literals; empty accepts anything.
    #[serde(default, rename = "enum")]
    pub allowed: Vec<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The rule only applies where the sibling `key` holds one of `one_of`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub one_of: Vec<Scalar>,
}

impl SchemaRule {
    pub fn new(path: impl Into<String>) -> Self {
        SchemaRule {
            path: path.into(),
            required: false,
            kinds: Vec::new(),
            allowed: Vec::new(),
            when: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kinds(mut self, kinds: &[ValueKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn allowed(mut self, allowed: Vec<Scalar>) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn when(mut self, key: impl Into<String>, one_of: Vec<Scalar>) -> Self {
        self.when = Some(Condition {
            key: key.into(),
            one_of,
        });
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn split(&self) -> (Vec<&str>, &str) {
        let mut segments: Vec<&str> = self.path.split('.').collect();
        let last = segments.pop().unwrap_or("");
        (segments, last)
    }
}

/// Input/output file formats understood by the simulation model, by name and by code.
const FORMATS: [&str; 8] = ["raw", "clm", "clm2", "txt", "fms", "meta", "cdf", "sock"];
const FMS: i64 = 4;
const CDF: i64 = 6;

fn format_literals() -> Vec<Scalar> {
    FORMATS
        .iter()
        .map(|f| Scalar::String(f.to_string()))
        .chain((0..FORMATS.len() as i64).map(|code| Scalar::Number(Number::Integer(code))))
        .collect()
}

fn format_literals_except(excluded: i64) -> Vec<Scalar> {
    format_literals()
        .into_iter()
        .filter(|lit| !matches!(lit, Scalar::Number(Number::Integer(c)) if *c == excluded))
        .filter(|lit| !matches!(lit, Scalar::String(s) if s == FORMATS[excluded as usize]))
        .collect()
}

fn format_literal(code: i64) -> Vec<Scalar> {
    vec![
        Scalar::String(FORMATS[code as usize].to_string()),
        Scalar::Number(Number::Integer(code)),
    ]
}

fn file_record_rules(prefix: &str) -> Vec<SchemaRule> {
    vec![
        SchemaRule::new(format!("{prefix}.fmt"))
            .required()
            .allowed(format_literals())
            .describe("file format"),
        SchemaRule::new(format!("{prefix}.name"))
            .required()
            .kinds(&[ValueKind::String])
            .when("fmt", format_literals_except(FMS))
            .describe("file name, not used by the fms format"),
        SchemaRule::new(format!("{prefix}.var"))
            .required()
            .kinds(&[ValueKind::String])
            .when("fmt", format_literal(CDF))
            .describe("variable name inside a NetCDF file"),
        SchemaRule::new(format!("{prefix}.unit")).kinds(&[ValueKind::String]),
        SchemaRule::new(format!("{prefix}.timestep")).kinds(&[ValueKind::Integer, ValueKind::String]),
    ]
}

impl Schema {
    pub fn new(rules: Vec<SchemaRule>) -> Self {
        Schema { rules }
    }

    /// Layout of a simulation run description.
    pub fn simulation() -> Self {
        let mut rules = vec![
            SchemaRule::new("sim_name").required().kinds(&[ValueKind::String]),
            SchemaRule::new("firstyear").required().kinds(&[ValueKind::Number]),
            SchemaRule::new("lastyear").required().kinds(&[ValueKind::Number]),
            SchemaRule::new("input").required().kinds(&[ValueKind::Object]),
            SchemaRule::new("input.*").kinds(&[ValueKind::Object]),
        ];
        rules.extend(file_record_rules("input.*"));
        rules.extend([
            SchemaRule::new("output").kinds(&[ValueKind::Array]),
            SchemaRule::new("output.*").kinds(&[ValueKind::Object]),
            SchemaRule::new("output.*.id")
                .required()
                .kinds(&[ValueKind::String, ValueKind::Integer]),
            SchemaRule::new("output.*.file").required().kinds(&[ValueKind::Object]),
        ]);
        rules.extend(file_record_rules("output.*.file"));
        Schema { rules }
    }

    /// Loads a schema from a `.yaml`/`.yml` file or, for any other extension, JSON.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let schema: Schema = if yaml {
            serde_yaml::from_str(&text).map_err(|source| SchemaError::Yaml {
                path: display.clone(),
                source,
            })?
        } else {
            serde_json::from_str(&text).map_err(|source| SchemaError::Json {
                path: display.clone(),
                source,
            })?
        };
        schema.check()?;
        debug!("loaded schema {} with {} rule(s)", display, schema.rules.len());
        Ok(schema)
    }

    fn check(&self) -> Result<(), SchemaError> {
        for rule in &self.rules {
            if rule.path.split('.').any(str::is_empty) {
                return Err(SchemaError::InvalidRule {
                    path: rule.path.clone(),
                    message: "path segments must not be empty".to_string(),
                });
            }
            if rule.required && rule.path.ends_with('*') {
                return Err(SchemaError::InvalidRule {
                    path: rule.path.clone(),
                    message: "a wildcard cannot be required".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Checks `document` against every rule and returns all violations.
    pub fn validate(&self, document: &DocumentNode) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            validate_rule(rule, document, &mut errors);
        }
        errors
    }
}

fn validate_rule(rule: &SchemaRule, document: &DocumentNode, errors: &mut Vec<ValidationError>) {
    let (parents, last) = rule.split();
    let mut scopes = Vec::new();
    select(document, &parents, String::new(), &mut scopes);

    for (parent_path, parent) in scopes {
        if let Some(condition) = &rule.when {
            let triggered = parent
                .get(&condition.key)
                .and_then(DocumentNode::as_scalar)
                .is_some_and(|value| condition.one_of.iter().any(|lit| lit.matches(value)));
            if !triggered {
                continue;
            }
        }

        if last == "*" {
            for (path, child) in children(parent, &parent_path) {
                check_value(rule, &path, child, errors);
            }
            continue;
        }

        match child(parent, last) {
            Some(value) => check_value(rule, &join(&parent_path, parent, last), value, errors),
            None if rule.required && parent.as_object().is_some() => {
                let mut message = format!("missing required key `{}`", last);
                if let Some(condition) = &rule.when {
                    if let Some(value) = parent.get(&condition.key).and_then(DocumentNode::as_scalar) {
                        message.push_str(&format!(" (required when {} is {})", condition.key, value));
                    }
                }
                errors.push(ValidationError {
                    path: join(&parent_path, parent, last),
                    message,
                });
            }
            None => {}
        }
    }
}

fn check_value(rule: &SchemaRule, path: &str, value: &DocumentNode, errors: &mut Vec<ValidationError>) {
    if !rule.kinds.is_empty() && !rule.kinds.iter().any(|k| value.is_kind(*k)) {
        let expected: Vec<String> = rule.kinds.iter().map(ToString::to_string).collect();
        errors.push(ValidationError {
            path: path.to_string(),
            message: format!("expected {}, found {}", expected.join(" or "), value.kind_name()),
        });
        return;
    }
    if !rule.allowed.is_empty() {
        let accepted = value
            .as_scalar()
            .is_some_and(|v| rule.allowed.iter().any(|lit| lit.matches(v)));
        if !accepted {
            let shown = value
                .as_scalar()
                .map_or_else(|| value.kind_name().to_string(), ToString::to_string);
            let allowed: Vec<String> = rule.allowed.iter().map(ToString::to_string).collect();
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("{} is not one of {}", shown, allowed.join(", ")),
            });
        }
    }
}

/// Collects every node addressed by `segments`, with its concrete path.
fn select<'d>(
    node: &'d DocumentNode,
    segments: &[&str],
    path: String,
    out: &mut Vec<(String, &'d DocumentNode)>,
) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push((path, node));
        return;
    };
    if *segment == "*" {
        for (child_path, child) in children(node, &path) {
            select(child, rest, child_path, out);
        }
    } else if let Some(next) = child(node, segment) {
        let child_path = join(&path, node, segment);
        select(next, rest, child_path, out);
    }
}

fn child<'d>(node: &'d DocumentNode, segment: &str) -> Option<&'d DocumentNode> {
    match node {
        DocumentNode::Object(map) => map.get(segment),
        DocumentNode::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        DocumentNode::Scalar(_) => None,
    }
}

fn children<'d>(node: &'d DocumentNode, path: &str) -> Vec<(String, &'d DocumentNode)> {
    match node {
        DocumentNode::Object(map) => map
            .iter()
            .map(|(key, value)| (join(path, node, key), value))
            .collect(),
        DocumentNode::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, value)| (format!("{}[{}]", path, i), value))
            .collect(),
        DocumentNode::Scalar(_) => Vec::new(),
    }
}

fn join(path: &str, parent: &DocumentNode, segment: &str) -> String {
    match parent {
        DocumentNode::Array(_) => format!("{}[{}]", path, segment),
        _ if path.is_empty() => segment.to_string(),
        _ => format!("{}.{}", path, segment),
    }
}
