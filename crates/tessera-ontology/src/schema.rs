//! Schema descriptors.
//!
//! A `Schema` enumerates the fields of one record type with primitive type
//! tags. The query layer walks schemas recursively at registration time to
//! derive the attribute-path table backing typed field access: nested
//! records recurse with a dot-joined prefix, dict fields become dynamic
//! (untyped) leaves, and containers are skipped - they are not queryable.

use serde::{Deserialize, Serialize};

/// Primitive type tag of one schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    I64,
    F64,
    Bool,
    String,
    /// Opaque byte blob (images, encoded payloads). Not queryable.
    Bytes,
    /// Nested record with its own schema.
    Nested(Schema),
    /// Free-form string-keyed map; queryable without type checks.
    Dict,
    /// Homogeneous container. Not queryable.
    List(Box<FieldType>),
}

/// One named field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered field list describing one record type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

/// Kind of a queryable leaf, deciding which operators apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// i64 / f64: full ordering operators.
    Numeric,
    /// Strings: equality, membership and pattern match.
    Text,
    /// Booleans: equality only.
    Boolean,
    /// Dict entries: every operator, no type check.
    Dynamic,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Walks the schema producing `(dot_joined_path, kind)` for every
    /// queryable leaf.
    pub fn leaf_paths(&self) -> Vec<(String, LeafKind)> {
        let mut leaves = Vec::new();
        self.collect_leaves("", &mut leaves);
        leaves
    }

    fn collect_leaves(&self, prefix: &str, out: &mut Vec<(String, LeafKind)>) {
        for field in &self.fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{prefix}.{}", field.name)
            };
            match &field.ty {
                FieldType::I64 | FieldType::F64 => out.push((path, LeafKind::Numeric)),
                FieldType::String => out.push((path, LeafKind::Text)),
                FieldType::Bool => out.push((path, LeafKind::Boolean)),
                FieldType::Dict => out.push((path, LeafKind::Dynamic)),
                FieldType::Nested(schema) => schema.collect_leaves(&path, out),
                FieldType::Bytes | FieldType::List(_) => {}
            }
        }
    }
}
