use crate::ast::{DocumentNode, Number, Scalar};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

// Objects are written in key order of first occurrence, for JSON and YAML alike.
impl Serialize for DocumentNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DocumentNode::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            DocumentNode::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            DocumentNode::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

/// Converts a document into a `serde_json::Value` with the same key order.
pub(crate) fn to_value(node: &DocumentNode) -> serde_json::Value {
    match node {
        DocumentNode::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), to_value(value)))
                .collect(),
        ),
        DocumentNode::Array(items) => serde_json::Value::Array(items.iter().map(to_value).collect()),
        DocumentNode::Scalar(Scalar::Null) => serde_json::Value::Null,
        DocumentNode::Scalar(Scalar::Boolean(b)) => serde_json::Value::Bool(*b),
        DocumentNode::Scalar(Scalar::String(s)) => serde_json::Value::String(s.clone()),
        DocumentNode::Scalar(Scalar::Number(Number::Integer(i))) => serde_json::Value::from(*i),
        DocumentNode::Scalar(Scalar::Number(Number::Unsigned(u))) => serde_json::Value::from(*u),
        DocumentNode::Scalar(Scalar::Number(Number::Float(f))) => serde_json::Number::from_f64(*f)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn sample() -> DocumentNode {
        let mut map = IndexMap::new();
        map.insert("zeta".to_string(), DocumentNode::integer(1));
        map.insert(
            "alpha".to_string(),
            DocumentNode::Array(vec![
                DocumentNode::Scalar(Scalar::Number(Number::Float(1.0))),
                DocumentNode::Scalar(Scalar::Null),
            ]),
        );
        DocumentNode::Object(map)
    }

    #[test]
    fn test_json_keeps_key_order() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":[1.0,null]}"#);
    }

    #[test]
    fn test_yaml_keeps_key_order() {
        let yaml = serde_yaml::to_string(&sample()).unwrap();
        assert!(yaml.find("zeta").unwrap() < yaml.find("alpha").unwrap());
    }

    #[test]
    fn test_to_value_matches_serializer() {
        let node = sample();
        assert_eq!(to_value(&node), serde_json::to_value(&node).unwrap());
    }
}
