//! Field access and query expressions.
//!
//! At registration time every ontology schema is walked into a table of
//! attribute paths with leaf kinds; [`OntologyQuery`] navigates that table
//! and hands out [`FieldLeaf`]s whose operator methods are constrained by
//! kind:
//!
//! | Leaf kind | Operators |
//! |---|---|
//! | Numeric   | eq, neq, lt, leq, gt, geq, between, is_in |
//! | Text      | eq, neq, matches, is_in |
//! | Boolean   | eq |
//! | Dynamic   | all of the above (no type check) |
//!
//! Dict-shaped fields (including user metadata) support key access with
//! dotted traversal of nested maps. Invoking an operator never touches the
//! platform; the result is a plain `(path, op, value)` triple.

use crate::error::{ClientError, Result};
use crate::query::FilterClause;
use std::collections::BTreeMap;
use tessera_ontology::{registry, LeafKind, Ontology, Schema};

/// Operator of a query expression, named by its wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    Between,
    In,
    Match,
}

impl OpCode {
    /// Wire encoding of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            OpCode::Eq => "$eq",
            OpCode::Neq => "$ne",
            OpCode::Lt => "$lt",
            OpCode::Leq => "$lte",
            OpCode::Gt => "$gt",
            OpCode::Geq => "$gte",
            OpCode::Between => "$between",
            OpCode::In => "$in",
            OpCode::Match => "$match",
        }
    }
}

/// A single `(path, op, value)` constraint. Pure value, no side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    pub path: String,
    pub op: OpCode,
    pub value: serde_json::Value,
}

impl QueryExpression {
    pub fn new(path: impl Into<String>, op: OpCode, value: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            op,
            value,
        }
    }

    /// First dot-separated segment of the path (the scope or ontology tag).
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    pub(crate) fn to_clause(&self) -> FilterClause {
        FilterClause {
            path: self.path.clone(),
            op: self.op.as_str().to_string(),
            value: self.value.clone(),
        }
    }
}

fn kind_supports(kind: LeafKind, op: OpCode) -> bool {
    match kind {
        LeafKind::Dynamic => true,
        LeafKind::Numeric => matches!(
            op,
            OpCode::Eq
                | OpCode::Neq
                | OpCode::Lt
                | OpCode::Leq
                | OpCode::Gt
                | OpCode::Geq
                | OpCode::Between
                | OpCode::In
        ),
        LeafKind::Text => matches!(op, OpCode::Eq | OpCode::Neq | OpCode::Match | OpCode::In),
        LeafKind::Boolean => matches!(op, OpCode::Eq),
    }
}

/// A typed field resolved from a schema; factory for expressions.
#[derive(Debug, Clone)]
pub struct FieldLeaf {
    path: String,
    kind: LeafKind,
}

impl FieldLeaf {
    pub(crate) fn new(path: impl Into<String>, kind: LeafKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> LeafKind {
        self.kind
    }

    /// Key access into a dict-shaped field. The key may itself be dotted to
    /// traverse nested maps (`"environment.visibility"`).
    pub fn key(&self, key: &str) -> Result<FieldLeaf> {
        if self.kind != LeafKind::Dynamic {
            return Err(ClientError::UnsupportedOperator {
                path: self.path.clone(),
                op: "[key]",
            });
        }
        Ok(FieldLeaf::new(format!("{}.{key}", self.path), LeafKind::Dynamic))
    }

    fn expr(&self, op: OpCode, value: serde_json::Value) -> Result<QueryExpression> {
        if !kind_supports(self.kind, op) {
            return Err(ClientError::UnsupportedOperator {
                path: self.path.clone(),
                op: op.as_str(),
            });
        }
        Ok(QueryExpression::new(self.path.clone(), op, value))
    }

    pub fn eq(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Eq, value.into())
    }

    pub fn neq(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Neq, value.into())
    }

    pub fn lt(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Lt, value.into())
    }

    pub fn leq(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Leq, value.into())
    }

    pub fn gt(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Gt, value.into())
    }

    pub fn geq(&self, value: impl Into<serde_json::Value>) -> Result<QueryExpression> {
        self.expr(OpCode::Geq, value.into())
    }

    /// Inclusive range; serialized as a two-element array `[min, max]`.
    pub fn between(
        &self,
        min: impl Into<serde_json::Value>,
        max: impl Into<serde_json::Value>,
    ) -> Result<QueryExpression> {
        self.expr(
            OpCode::Between,
            serde_json::Value::Array(vec![min.into(), max.into()]),
        )
    }

    /// Set membership; serialized as an array.
    pub fn is_in<V: Into<serde_json::Value>>(&self, values: Vec<V>) -> Result<QueryExpression> {
        self.expr(
            OpCode::In,
            serde_json::Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Substring / pattern match on text fields.
    pub fn matches(&self, pattern: impl Into<String>) -> Result<QueryExpression> {
        self.expr(OpCode::Match, serde_json::Value::String(pattern.into()))
    }
}

/// Navigable field tree of one ontology, generated from its schema.
#[derive(Debug, Clone)]
pub struct OntologyQuery {
    tag: String,
    leaves: BTreeMap<String, LeafKind>,
}

impl OntologyQuery {
    /// Builds the field tree of a statically known ontology.
    pub fn of<T: Ontology>() -> Self {
        Self::from_schema(T::TAG, &T::schema())
    }

    /// Builds the field tree of a registered ontology by tag.
    pub fn by_tag(tag: &str) -> Result<Self> {
        let schema = registry::schema_of(tag)?;
        Ok(Self::from_schema(tag, &schema))
    }

    fn from_schema(tag: &str, schema: &Schema) -> Self {
        Self {
            tag: tag.to_string(),
            leaves: schema.leaf_paths().into_iter().collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Resolves a dot-joined attribute path to its typed leaf.
    ///
    /// The path is relative to the ontology root; the produced expression
    /// path carries the tag prefix (`"imu.acceleration.x"`). Paths reaching
    /// into a dict field resolve to dynamic leaves.
    pub fn field(&self, path: &str) -> Result<FieldLeaf> {
        if let Some(kind) = self.leaves.get(path) {
            return Ok(FieldLeaf::new(format!("{}.{path}", self.tag), *kind));
        }
        // A dotted path may continue inside a dict leaf.
        for (leaf_path, kind) in &self.leaves {
            if *kind == LeafKind::Dynamic && path.starts_with(&format!("{leaf_path}.")) {
                return Ok(FieldLeaf::new(format!("{}.{path}", self.tag), LeafKind::Dynamic));
            }
        }
        Err(ClientError::UnknownField {
            tag: self.tag.clone(),
            path: path.to_string(),
        })
    }

    /// Leaf for the platform reception timestamp of this ontology's rows.
    pub fn message_timestamp(&self) -> FieldLeaf {
        FieldLeaf::new(format!("{}.timestamp_ns", self.tag), LeafKind::Numeric)
    }

    /// Leaf for the data-generation stamp carried by message headers,
    /// expressed in nanoseconds.
    pub fn data_timestamp(&self) -> FieldLeaf {
        FieldLeaf::new(format!("{}.header.stamp", self.tag), LeafKind::Numeric)
    }
}

/// Field access for sequence attributes.
pub struct SequenceFields;

impl SequenceFields {
    pub fn name() -> FieldLeaf {
        FieldLeaf::new("sequence.name", LeafKind::Text)
    }

    /// Creation timestamp, milliseconds since the epoch.
    pub fn created() -> FieldLeaf {
        FieldLeaf::new("sequence.created", LeafKind::Numeric)
    }

    /// User-metadata entry; the key may be dotted for nested maps.
    pub fn user_metadata(key: &str) -> FieldLeaf {
        FieldLeaf::new(format!("sequence.user_metadata.{key}"), LeafKind::Dynamic)
    }
}

/// Field access for topic attributes.
pub struct TopicFields;

impl TopicFields {
    pub fn name() -> FieldLeaf {
        FieldLeaf::new("topic.name", LeafKind::Text)
    }

    pub fn created() -> FieldLeaf {
        FieldLeaf::new("topic.created", LeafKind::Numeric)
    }

    pub fn ontology_tag() -> FieldLeaf {
        FieldLeaf::new("topic.ontology_tag", LeafKind::Text)
    }

    pub fn user_metadata(key: &str) -> FieldLeaf {
        FieldLeaf::new(format!("topic.user_metadata.{key}"), LeafKind::Dynamic)
    }
}
