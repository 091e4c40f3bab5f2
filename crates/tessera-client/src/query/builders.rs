//! Query builders.
//!
//! Three builders share one shape: a list of expressions plus convenience
//! slots for the common fields (name, timestamps, ontology tag). All
//! methods chain; construction is pure and the platform is only contacted
//! when the composed [`Query`] is executed.
//!
//! Two invariants are enforced at add time:
//!
//! - **single occurrence**: no two expressions in one builder may share a
//!   path (`DuplicateField`; use `between`/`is_in` for ranges and sets);
//! - **homogeneous catalog**: every expression added to a catalog builder
//!   must share one root ontology tag (`HeterogeneousCatalogQuery`).

use crate::error::{ClientError, Result};
use crate::query::expression::{
    FieldLeaf, QueryExpression, SequenceFields, TopicFields,
};
use crate::query::{QueryBranch, QuerySpec};
use std::collections::HashSet;

const SEQUENCE_METADATA_ROOT: &str = "sequence.user_metadata.";
const TOPIC_METADATA_ROOT: &str = "topic.user_metadata.";

fn range_expr(leaf: FieldLeaf, start: Option<i64>, end: Option<i64>) -> Result<QueryExpression> {
    match (start, end) {
        (Some(start), None) => leaf.gt(start),
        (None, Some(end)) => leaf.lt(end),
        (Some(start), Some(end)) => leaf.between(start, end),
        (None, None) => Err(ClientError::InvalidQuery(
            "timestamp range requires at least one bound".to_string(),
        )),
    }
}

/// Shared expression list with the single-occurrence invariant.
#[derive(Debug, Clone, Default)]
struct ExpressionSet {
    exprs: Vec<QueryExpression>,
    paths: HashSet<String>,
}

impl ExpressionSet {
    fn add(&mut self, expr: QueryExpression) -> Result<()> {
        if !self.paths.insert(expr.path.clone()) {
            return Err(ClientError::DuplicateField { path: expr.path });
        }
        self.exprs.push(expr);
        Ok(())
    }

    fn to_branch(&self, scope: &str) -> QueryBranch {
        QueryBranch {
            scope: scope.to_string(),
            filters: self.exprs.iter().map(QueryExpression::to_clause).collect(),
        }
    }
}

/// Filters over sequence attributes.
#[derive(Debug, Clone, Default)]
pub struct QuerySequence {
    set: ExpressionSet,
}

impl QuerySequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact sequence name.
    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self> {
        self.set.add(SequenceFields::name().eq(name.into())?)?;
        Ok(self)
    }

    /// Substring match on the sequence name.
    pub fn with_name_match(mut self, pattern: impl Into<String>) -> Result<Self> {
        self.set.add(SequenceFields::name().matches(pattern)?)?;
        Ok(self)
    }

    /// Creation-time bound: `(start, None)` → after, `(None, end)` → before,
    /// both → inclusive between.
    pub fn with_created_timestamp(mut self, start: Option<i64>, end: Option<i64>) -> Result<Self> {
        self.set.add(range_expr(SequenceFields::created(), start, end)?)?;
        Ok(self)
    }

    /// Adds a user-metadata expression. Only paths rooted at the sequence
    /// user metadata are accepted here.
    pub fn with_expression(mut self, expr: QueryExpression) -> Result<Self> {
        if !expr.path.starts_with(SEQUENCE_METADATA_ROOT) {
            return Err(ClientError::InvalidQuery(format!(
                "sequence queries accept user-metadata expressions only, got '{}'",
                expr.path
            )));
        }
        self.set.add(expr)?;
        Ok(self)
    }

    /// Adds a pre-validated expression (chaining factories).
    pub(crate) fn with_inner(mut self, expr: QueryExpression) -> Result<Self> {
        self.set.add(expr)?;
        Ok(self)
    }

    pub fn expressions(&self) -> &[QueryExpression] {
        &self.set.exprs
    }

    pub(crate) fn to_branch(&self) -> QueryBranch {
        self.set.to_branch("sequence")
    }
}

/// Filters over topic attributes.
#[derive(Debug, Clone, Default)]
pub struct QueryTopic {
    set: ExpressionSet,
}

impl QueryTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact topic path (normalized with a leading `/` by the platform).
    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self> {
        self.set.add(TopicFields::name().eq(name.into())?)?;
        Ok(self)
    }

    /// Substring match on the topic path.
    pub fn with_name_match(mut self, pattern: impl Into<String>) -> Result<Self> {
        self.set.add(TopicFields::name().matches(pattern)?)?;
        Ok(self)
    }

    /// Exact ontology tag carried by the topic.
    pub fn with_ontology_tag(mut self, tag: impl Into<String>) -> Result<Self> {
        self.set.add(TopicFields::ontology_tag().eq(tag.into())?)?;
        Ok(self)
    }

    pub fn with_created_timestamp(mut self, start: Option<i64>, end: Option<i64>) -> Result<Self> {
        self.set.add(range_expr(TopicFields::created(), start, end)?)?;
        Ok(self)
    }

    /// Adds a user-metadata expression. Only paths rooted at the topic user
    /// metadata are accepted here.
    pub fn with_expression(mut self, expr: QueryExpression) -> Result<Self> {
        if !expr.path.starts_with(TOPIC_METADATA_ROOT) {
            return Err(ClientError::InvalidQuery(format!(
                "topic queries accept user-metadata expressions only, got '{}'",
                expr.path
            )));
        }
        self.set.add(expr)?;
        Ok(self)
    }

    pub(crate) fn with_inner(mut self, expr: QueryExpression) -> Result<Self> {
        self.set.add(expr)?;
        Ok(self)
    }

    pub fn expressions(&self) -> &[QueryExpression] {
        &self.set.exprs
    }

    pub(crate) fn to_branch(&self) -> QueryBranch {
        self.set.to_branch("topic")
    }
}

/// Filters over ontology data in the catalog.
///
/// Every expression must target one ontology; the first one added pins the
/// tag for the whole builder.
#[derive(Debug, Clone, Default)]
pub struct QueryOntologyCatalog {
    set: ExpressionSet,
    tag: Option<String>,
}

impl QueryOntologyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_tag(&mut self, root: &str) -> Result<()> {
        match &self.tag {
            None => {
                self.tag = Some(root.to_string());
                Ok(())
            }
            Some(tag) if tag == root => Ok(()),
            Some(tag) => Err(ClientError::HeterogeneousCatalogQuery {
                expected: tag.clone(),
                found: root.to_string(),
            }),
        }
    }

    /// Adds an ontology field expression (any field of the pinned ontology).
    pub fn with_expression(mut self, expr: QueryExpression) -> Result<Self> {
        let root = expr.root().to_string();
        self.check_tag(&root)?;
        self.set.add(expr)?;
        Ok(self)
    }

    /// Bound on the platform reception timestamp of the ontology's rows.
    pub fn with_message_timestamp(
        mut self,
        tag: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Self> {
        self.check_tag(tag)?;
        let leaf = FieldLeaf::new(
            format!("{tag}.timestamp_ns"),
            tessera_ontology::LeafKind::Numeric,
        );
        self.set.add(range_expr(leaf, start, end)?)?;
        Ok(self)
    }

    /// Bound on the data-generation stamp (header), in nanoseconds.
    pub fn with_data_timestamp(
        mut self,
        tag: &str,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Self> {
        self.check_tag(tag)?;
        let leaf = FieldLeaf::new(
            format!("{tag}.header.stamp"),
            tessera_ontology::LeafKind::Numeric,
        );
        self.set.add(range_expr(leaf, start, end)?)?;
        Ok(self)
    }

    /// The ontology tag this builder is pinned to, once any expression was
    /// added.
    pub fn ontology_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn expressions(&self) -> &[QueryExpression] {
        &self.set.exprs
    }

    pub(crate) fn to_branch(&self) -> QueryBranch {
        self.set.to_branch("catalog")
    }
}

/// A composite query: up to one builder per scope, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct Query {
    sequence: Option<QuerySequence>,
    topic: Option<QueryTopic>,
    catalog: Option<QueryOntologyCatalog>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequence(mut self, builder: QuerySequence) -> Self {
        self.sequence = Some(builder);
        self
    }

    pub fn topic(mut self, builder: QueryTopic) -> Self {
        self.topic = Some(builder);
        self
    }

    pub fn catalog(mut self, builder: QueryOntologyCatalog) -> Self {
        self.catalog = Some(builder);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_none() && self.topic.is_none() && self.catalog.is_none()
    }

    /// Serializes to the platform's filter document.
    pub fn to_spec(&self) -> QuerySpec {
        let mut branches = Vec::new();
        if let Some(builder) = &self.sequence {
            branches.push(builder.to_branch());
        }
        if let Some(builder) = &self.topic {
            branches.push(builder.to_branch());
        }
        if let Some(builder) = &self.catalog {
            branches.push(builder.to_branch());
        }
        QuerySpec { query: branches }
    }
}

impl From<QuerySequence> for Query {
    fn from(builder: QuerySequence) -> Self {
        Query::new().sequence(builder)
    }
}

impl From<QueryTopic> for Query {
    fn from(builder: QueryTopic) -> Self {
        Query::new().topic(builder)
    }
}

impl From<QueryOntologyCatalog> for Query {
    fn from(builder: QueryOntologyCatalog) -> Self {
        Query::new().catalog(builder)
    }
}
