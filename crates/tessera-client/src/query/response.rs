//! Query responses and chaining factories.
//!
//! The platform returns matches as full resource paths
//! (`"{sequence}/{topic}"`); response items store the relative topic paths
//! with the sequence prefix stripped and a leading `/` enforced. The
//! chaining factories implement the restricted-query pattern: a follow-up
//! builder whose search domain is narrowed with an `$in` filter over the
//! resources already found.

use crate::error::{ClientError, Result};
use crate::query::builders::{QuerySequence, QueryTopic};
use crate::query::expression::{OpCode, QueryExpression};
use crate::transport::QueryHit;
use std::ops::Index;

/// One response row: a sequence and its matching topics (relative paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponseItem {
    pub sequence: String,
    pub topics: Vec<String>,
}

impl QueryResponseItem {
    /// Builds an item from already-relative topic paths.
    pub fn new(sequence: impl Into<String>, topics: Vec<String>) -> Result<Self> {
        let mut normalized = Vec::with_capacity(topics.len());
        for topic in &topics {
            normalized.push(tessera_core::topic::normalize_topic_name(topic)?);
        }
        Ok(Self {
            sequence: sequence.into(),
            topics: normalized,
        })
    }

    /// Builds an item from a platform hit carrying full resource paths.
    pub(crate) fn from_hit(hit: QueryHit) -> Result<Self> {
        let mut topics = Vec::with_capacity(hit.topics.len());
        for full_path in &hit.topics {
            let (sequence, topic) = tessera_core::topic::unpack_topic_full_path(full_path)
                .map_err(|_| ClientError::Data(format!("invalid topic path in response: {full_path}")))?;
            if sequence != hit.sequence {
                return Err(ClientError::Data(format!(
                    "topic '{full_path}' does not belong to sequence '{}'",
                    hit.sequence
                )));
            }
            topics.push(topic);
        }
        Ok(Self {
            sequence: hit.sequence,
            topics,
        })
    }
}

/// Ordered list of query matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    items: Vec<QueryResponseItem>,
}

impl QueryResponse {
    pub fn new(items: Vec<QueryResponseItem>) -> Self {
        Self { items }
    }

    pub(crate) fn from_hits(hits: Vec<QueryHit>) -> Result<Self> {
        let items = hits
            .into_iter()
            .map(QueryResponseItem::from_hit)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { items })
    }

    pub fn items(&self) -> &[QueryResponseItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryResponseItem> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&QueryResponseItem> {
        self.items.get(index)
    }

    /// A sequence query restricted to the sequences present in this
    /// response.
    pub fn to_query_sequence(&self) -> Result<QuerySequence> {
        let names: Vec<serde_json::Value> = self
            .items
            .iter()
            .map(|item| serde_json::Value::String(item.sequence.clone()))
            .collect();
        QuerySequence::new().with_inner(QueryExpression::new(
            "sequence.name",
            OpCode::In,
            serde_json::Value::Array(names),
        ))
    }

    /// A topic query restricted to the topic paths present in this
    /// response.
    pub fn to_query_topic(&self) -> Result<QueryTopic> {
        let names: Vec<serde_json::Value> = self
            .items
            .iter()
            .flat_map(|item| item.topics.iter())
            .map(|topic| serde_json::Value::String(topic.clone()))
            .collect();
        QueryTopic::new().with_inner(QueryExpression::new(
            "topic.name",
            OpCode::In,
            serde_json::Value::Array(names),
        ))
    }
}

impl Index<usize> for QueryResponse {
    type Output = QueryResponseItem;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a QueryResponse {
    type Item = &'a QueryResponseItem;
    type IntoIter = std::slice::Iter<'a, QueryResponseItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for QueryResponse {
    type Item = QueryResponseItem;
    type IntoIter = std::vec::IntoIter<QueryResponseItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_response() -> QueryResponse {
        QueryResponse::new(vec![
            QueryResponseItem::new("seq1", vec!["/a".to_string()]).unwrap(),
            QueryResponseItem::new("seq2", vec!["/b".to_string(), "/c".to_string()]).unwrap(),
        ])
    }

    #[test]
    fn test_from_hit_strips_sequence_prefix() {
        let item = QueryResponseItem::from_hit(QueryHit {
            sequence: "seq1".to_string(),
            topics: vec!["seq1/imu/front".to_string(), "seq1/camera".to_string()],
        })
        .unwrap();
        assert_eq!(item.topics, vec!["/imu/front", "/camera"]);
    }

    #[test]
    fn test_from_hit_rejects_foreign_topic() {
        let result = QueryResponseItem::from_hit(QueryHit {
            sequence: "seq1".to_string(),
            topics: vec!["other/topic".to_string()],
        });
        assert!(matches!(result, Err(ClientError::Data(_))));
    }

    #[test]
    fn test_list_protocol() {
        let resp = sample_response();
        assert_eq!(resp.len(), 2);
        assert!(!resp.is_empty());
        assert_eq!(resp[0].sequence, "seq1");
        assert_eq!(resp.iter().count(), 2);
        assert!(QueryResponse::default().is_empty());
    }

    #[test]
    fn test_to_query_sequence_builds_in_filter() {
        let builder = sample_response().to_query_sequence().unwrap();
        let branch = builder.to_branch();
        assert_eq!(branch.filters.len(), 1);
        assert_eq!(branch.filters[0].path, "sequence.name");
        assert_eq!(branch.filters[0].op, "$in");
        assert_eq!(branch.filters[0].value, json!(["seq1", "seq2"]));
    }

    #[test]
    fn test_to_query_topic_collects_all_topics() {
        let builder = sample_response().to_query_topic().unwrap();
        let branch = builder.to_branch();
        assert_eq!(branch.filters[0].path, "topic.name");
        assert_eq!(branch.filters[0].value, json!(["/a", "/b", "/c"]));
    }

    #[test]
    fn test_chained_builder_can_be_narrowed_further() {
        let builder = sample_response()
            .to_query_topic()
            .unwrap()
            .with_ontology_tag("imu")
            .unwrap();
        assert_eq!(builder.to_branch().filters.len(), 2);
    }
}
