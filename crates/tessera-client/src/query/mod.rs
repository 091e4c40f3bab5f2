//! Typed query facility.
//!
//! Queries are built in three steps:
//!
//! 1. **Field access** - [`OntologyQuery`], [`SequenceFields`] and
//!    [`TopicFields`] resolve attribute paths against a schema and hand out
//!    operator-constrained [`FieldLeaf`]s.
//! 2. **Expressions** - invoking an operator on a leaf produces a pure
//!    [`QueryExpression`] `(path, op, value)`.
//! 3. **Builders** - [`QuerySequence`], [`QueryTopic`] and
//!    [`QueryOntologyCatalog`] collect expressions (one per path), add the
//!    convenience slots, and serialize to the platform's filter document.
//!
//! Responses come back as [`QueryResponse`], whose chaining factories build
//! follow-up queries narrowed to the returned resources (the restricted
//! query pattern).

mod builders;
mod expression;
mod response;

pub use builders::{Query, QueryOntologyCatalog, QuerySequence, QueryTopic};
pub use expression::{FieldLeaf, OntologyQuery, OpCode, QueryExpression, SequenceFields, TopicFields};
pub use response::{QueryResponse, QueryResponseItem};

use serde::{Deserialize, Serialize};

/// One serialized filter clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub path: String,
    pub op: String,
    pub value: serde_json::Value,
}

/// One builder's worth of filters: a logical AND of clauses in one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBranch {
    /// `"sequence"`, `"topic"` or `"catalog"`.
    pub scope: String,
    pub filters: Vec<FilterClause>,
}

/// The complete query document: an outer AND of per-scope branches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: Vec<QueryBranch>,
}

impl QuerySpec {
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}
