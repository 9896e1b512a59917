use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved document value. Objects keep their keys in first-occurrence order.
#[derive(Debug, PartialEq, Clone)]
pub enum DocumentNode {
    Object(IndexMap<String, DocumentNode>),
    Array(Vec<DocumentNode>),
    Scalar(Scalar),
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Number(Number),
    String(String),
}

/// Numbers keep the integer/float distinction of their literal.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    /// Integers above `i64::MAX`.
    Unsigned(u64),
    Float(f64),
}

/// The kinds a schema rule can ask for.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Object,
    Array,
}

impl DocumentNode {
    pub fn empty_object() -> Self {
        DocumentNode::Object(IndexMap::new())
    }

    pub fn string(value: impl Into<String>) -> Self {
        DocumentNode::Scalar(Scalar::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        DocumentNode::Scalar(Scalar::Number(Number::Integer(value)))
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, DocumentNode>> {
        match self {
            DocumentNode::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DocumentNode]> {
        match self {
            DocumentNode::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            DocumentNode::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocumentNode::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DocumentNode> {
        self.as_object()?.get(key)
    }

    /// Looks up a dotted path such as `input.soil.fmt` or `output.3.file`.
    pub fn pointer(&self, path: &str) -> Option<&DocumentNode> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| match node {
                DocumentNode::Object(map) => map.get(segment),
                DocumentNode::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                DocumentNode::Scalar(_) => None,
            })
    }

    /// Whether the node is acceptable where `kind` is expected. Integers are numbers too.
    pub fn is_kind(&self, kind: ValueKind) -> bool {
        match (self, kind) {
            (DocumentNode::Object(_), ValueKind::Object) => true,
            (DocumentNode::Array(_), ValueKind::Array) => true,
            (DocumentNode::Scalar(Scalar::String(_)), ValueKind::String) => true,
            (DocumentNode::Scalar(Scalar::Boolean(_)), ValueKind::Boolean) => true,
            (DocumentNode::Scalar(Scalar::Null), ValueKind::Null) => true,
            (DocumentNode::Scalar(Scalar::Number(_)), ValueKind::Number) => true,
            (DocumentNode::Scalar(Scalar::Number(n)), ValueKind::Integer) => n.is_integer(),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DocumentNode::Object(_) => "object",
            DocumentNode::Array(_) => "array",
            DocumentNode::Scalar(Scalar::String(_)) => "string",
            DocumentNode::Scalar(Scalar::Number(Number::Float(_))) => "number",
            DocumentNode::Scalar(Scalar::Number(_)) => "integer",
            DocumentNode::Scalar(Scalar::Boolean(_)) => "boolean",
            DocumentNode::Scalar(Scalar::Null) => "null",
        }
    }
}

impl Scalar {
    /// Equality for schema literals: `6` and `6.0` are the same number.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => match (a.as_i128(), b.as_i128()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            _ => self == other,
        }
    }
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Unsigned(u) => u as f64,
            Number::Float(f) => f,
        }
    }

    fn as_i128(self) -> Option<i128> {
        match self {
            Number::Integer(i) => Some(i128::from(i)),
            Number::Unsigned(u) => Some(i128::from(u)),
            Number::Float(_) => None,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Number::Float(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{}", i),
            Number::Unsigned(u) => write!(f, "{}", u),
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Null => "null",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
        };
        f.write_str(name)
    }
}
