//! Dynamic record cell values.
//!
//! A `Value` is one decoded cell of a record batch: a primitive, a byte
//! blob, a list, or a string-keyed map (nested records and dict fields both
//! decode to maps). Ontology payloads convert to and from this shape at the
//! transport boundary, so readers can consume heterogeneous topics without
//! knowing the concrete payload type up front.

use bytes::Bytes;
use std::collections::BTreeMap;

/// A heterogeneous record cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
    Bytes(Bytes),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Looks up a direct child of a map value.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(name))
    }

    /// Walks a dot-joined path through nested maps.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut cur = self;
        for part in path.split('.') {
            cur = cur.field(part)?;
        }
        Some(cur)
    }

    /// Converts a JSON value into the record cell representation.
    ///
    /// Numbers become `I64` when integral, `F64` otherwise. Byte blobs have
    /// no JSON source shape and never come out of this conversion.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else {
                    Value::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> Value {
        let mut status = BTreeMap::new();
        status.insert("service".to_string(), Value::I64(2));
        let mut root = BTreeMap::new();
        root.insert("latitude".to_string(), Value::F64(45.07));
        root.insert("status".to_string(), Value::Map(status));
        Value::Map(root)
    }

    #[test]
    fn test_get_path_nested() {
        let v = sample_map();
        assert_eq!(v.get_path("status.service"), Some(&Value::I64(2)));
        assert_eq!(v.get_path("latitude"), Some(&Value::F64(45.07)));
        assert_eq!(v.get_path("status.missing"), None);
    }

    #[test]
    fn test_as_f64_widens_integers() {
        assert_eq!(Value::I64(3).as_f64(), Some(3.0));
        assert_eq!(Value::F64(3.5).as_f64(), Some(3.5));
        assert_eq!(Value::Str("3".into()).as_f64(), None);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"a": 1, "b": 2.5, "c": ["x", true]});
        let v = Value::from_json(&json);
        assert_eq!(v.get_path("a"), Some(&Value::I64(1)));
        assert_eq!(v.get_path("b"), Some(&Value::F64(2.5)));
        assert_eq!(
            v.field("c"),
            Some(&Value::List(vec![Value::Str("x".into()), Value::Bool(true)]))
        );
    }
}
