//! In-process transport backend.
//!
//! A complete platform stand-in backed by plain maps: sequence lifecycle
//! with key-checked finalize/abort, per-topic frame storage (batches travel
//! through the real wire codec), chunk metadata accounting, and query
//! evaluation over sequence attributes, topic attributes and decoded rows.
//!
//! Tests inject transport failures per topic with [`InMemoryTransport::fail_puts`],
//! which makes every subsequent batch send on that channel report
//! `Unavailable`.

use crate::query::{FilterClause, QuerySpec};
use crate::transport::{
    Action, ActionResponse, BatchSink, BatchSource, ChannelDescriptor, QueryHit, SequenceInfo,
    SequenceStatus, TopicInfo, Transport, TransportError,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tessera_core::{codec, topic as topic_path, RecordBatch, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

#[derive(Debug)]
struct TopicEntry {
    ontology_tag: String,
    user_metadata: serde_json::Value,
    created_at: i64,
    /// Framed record batches in arrival order.
    frames: Vec<Bytes>,
    size_bytes: i64,
    row_count: i64,
}

#[derive(Debug)]
struct SequenceEntry {
    key: Uuid,
    status: SequenceStatus,
    user_metadata: serde_json::Value,
    created_at: i64,
    topics: BTreeMap<String, TopicEntry>,
}

#[derive(Debug, Default)]
struct PlatformState {
    sequences: BTreeMap<String, SequenceEntry>,
    /// Full resource paths whose put channels fail on send.
    failing_puts: HashSet<String>,
}

/// In-memory implementation of [`Transport`].
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<PlatformState>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every batch send to `(sequence, topic)` fail with
    /// `Unavailable` until [`Self::heal_puts`] is called.
    pub async fn fail_puts(&self, sequence: &str, topic: &str) {
        let mut state = self.state.lock().await;
        state.failing_puts.insert(format!("{sequence}{topic}"));
    }

    /// Clears an injected put failure.
    pub async fn heal_puts(&self, sequence: &str, topic: &str) {
        let mut state = self.state.lock().await;
        state.failing_puts.remove(&format!("{sequence}{topic}"));
    }

    /// Status of a stored sequence, if present.
    pub async fn sequence_status(&self, name: &str) -> Option<SequenceStatus> {
        let state = self.state.lock().await;
        state.sequences.get(name).map(|entry| entry.status)
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn sequence_info(name: &str, entry: &SequenceEntry) -> SequenceInfo {
        SequenceInfo {
            name: name.to_string(),
            status: entry.status,
            user_metadata: entry.user_metadata.clone(),
            created_at: entry.created_at,
            size_bytes: entry.topics.values().map(|t| t.size_bytes).sum(),
        }
    }

    fn topic_info(name: &str, entry: &TopicEntry) -> TopicInfo {
        TopicInfo {
            name: name.to_string(),
            ontology_tag: entry.ontology_tag.clone(),
            user_metadata: entry.user_metadata.clone(),
            created_at: entry.created_at,
            size_bytes: entry.size_bytes,
            row_count: entry.row_count,
        }
    }

    async fn evaluate_query(&self, spec: &QuerySpec) -> Result<Vec<QueryHit>, TransportError> {
        let state = self.state.lock().await;

        // Candidate map: sequence -> matching topics. Branches intersect.
        let mut candidates: BTreeMap<String, BTreeSet<String>> = state
            .sequences
            .iter()
            .map(|(name, entry)| (name.clone(), entry.topics.keys().cloned().collect()))
            .collect();

        for branch in &spec.query {
            match branch.scope.as_str() {
                "sequence" => {
                    candidates.retain(|name, _| {
                        let entry = &state.sequences[name];
                        branch.filters.iter().all(|clause| {
                            sequence_field(name, entry, &clause.path)
                                .map(|actual| eval_clause(&actual, clause))
                                .unwrap_or(false)
                        })
                    });
                }
                "topic" => {
                    for (name, topics) in candidates.iter_mut() {
                        let entry = &state.sequences[name];
                        topics.retain(|topic| {
                            let topic_entry = &entry.topics[topic];
                            branch.filters.iter().all(|clause| {
                                topic_field(topic, topic_entry, &clause.path)
                                    .map(|actual| eval_clause(&actual, clause))
                                    .unwrap_or(false)
                            })
                        });
                    }
                }
                "catalog" => {
                    let tag = branch
                        .filters
                        .first()
                        .and_then(|clause| clause.path.split('.').next())
                        .unwrap_or_default()
                        .to_string();
                    for (name, topics) in candidates.iter_mut() {
                        let entry = &state.sequences[name];
                        let mut matched = BTreeSet::new();
                        for topic in topics.iter() {
                            let topic_entry = &entry.topics[topic];
                            if topic_entry.ontology_tag != tag {
                                continue;
                            }
                            if topic_matches_catalog(topic_entry, &branch.filters, &tag)? {
                                matched.insert(topic.clone());
                            }
                        }
                        *topics = matched;
                    }
                }
                other => {
                    return Err(TransportError::invalid_argument(format!(
                        "unknown query scope '{other}'"
                    )));
                }
            }
            candidates.retain(|_, topics| !topics.is_empty());
        }

        let mut hits = Vec::new();
        for (sequence, topics) in candidates {
            let full_paths = topics
                .iter()
                .map(|topic| format!("{sequence}{topic}"))
                .collect();
            hits.push(QueryHit {
                sequence,
                topics: full_paths,
            });
        }
        debug!(hits = hits.len(), "Query evaluated");
        Ok(hits)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn do_action(&self, action: Action) -> Result<ActionResponse, TransportError> {
        match action {
            Action::SequenceCreate {
                name,
                user_metadata,
            } => {
                topic_path::validate_sequence_name(&name)
                    .map_err(|e| TransportError::invalid_argument(e.to_string()))?;
                let mut state = self.state.lock().await;
                if state.sequences.contains_key(&name) {
                    return Err(TransportError::already_exists(format!(
                        "sequence '{name}' already exists"
                    )));
                }
                let key = Uuid::new_v4();
                info!(sequence = %name, "Sequence created");
                state.sequences.insert(
                    name,
                    SequenceEntry {
                        key,
                        status: SequenceStatus::Pending,
                        user_metadata,
                        created_at: Self::now_ms(),
                        topics: BTreeMap::new(),
                    },
                );
                Ok(ActionResponse::Created { key })
            }

            Action::SequenceFinalize { name, key } => {
                let mut state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get_mut(&name)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{name}'")))?;
                if entry.key != key {
                    return Err(TransportError::invalid_argument("sequence key mismatch"));
                }
                if entry.status != SequenceStatus::Pending {
                    return Err(TransportError::failed_precondition(format!(
                        "sequence '{name}' is locked"
                    )));
                }
                entry.status = SequenceStatus::Finalized;
                info!(sequence = %name, "Sequence finalized");
                Ok(ActionResponse::Empty)
            }

            Action::SequenceAbort { name, key } => {
                let mut state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get(&name)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{name}'")))?;
                if entry.status == SequenceStatus::Finalized {
                    return Err(TransportError::failed_precondition(format!(
                        "sequence '{name}' is locked"
                    )));
                }
                if entry.key != key {
                    return Err(TransportError::invalid_argument("sequence key mismatch"));
                }
                state.sequences.remove(&name);
                warn!(sequence = %name, "Sequence aborted, data purged");
                Ok(ActionResponse::Empty)
            }

            Action::SequenceUnlock { name, key } => {
                let mut state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get_mut(&name)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{name}'")))?;
                if entry.key != key {
                    return Err(TransportError::invalid_argument("sequence key mismatch"));
                }
                entry.status = SequenceStatus::Unlocked;
                warn!(sequence = %name, "Sequence unlocked, partial data preserved");
                Ok(ActionResponse::Empty)
            }

            Action::TopicCreate {
                sequence,
                topic,
                ontology_tag,
                user_metadata,
            } => {
                let mut state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get_mut(&sequence)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{sequence}'")))?;
                if entry.status != SequenceStatus::Pending {
                    return Err(TransportError::failed_precondition(format!(
                        "sequence '{sequence}' is locked"
                    )));
                }
                if entry.topics.contains_key(&topic) {
                    return Err(TransportError::already_exists(format!(
                        "topic '{topic}' already exists"
                    )));
                }
                info!(sequence = %sequence, topic = %topic, tag = %ontology_tag, "Topic created");
                entry.topics.insert(
                    topic,
                    TopicEntry {
                        ontology_tag,
                        user_metadata,
                        created_at: Self::now_ms(),
                        frames: Vec::new(),
                        size_bytes: 0,
                        row_count: 0,
                    },
                );
                Ok(ActionResponse::Empty)
            }

            Action::SequenceInfo { name } => {
                let state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get(&name)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{name}'")))?;
                Ok(ActionResponse::Sequence(Self::sequence_info(&name, entry)))
            }

            Action::TopicInfo { sequence, topic } => {
                let state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get(&sequence)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{sequence}'")))?;
                let topic_entry = entry
                    .topics
                    .get(&topic)
                    .ok_or_else(|| TransportError::not_found(format!("topic '{topic}'")))?;
                Ok(ActionResponse::Topic(Self::topic_info(&topic, topic_entry)))
            }

            Action::ListTopics { sequence } => {
                let state = self.state.lock().await;
                let entry = state
                    .sequences
                    .get(&sequence)
                    .ok_or_else(|| TransportError::not_found(format!("sequence '{sequence}'")))?;
                Ok(ActionResponse::Topics(
                    entry
                        .topics
                        .iter()
                        .map(|(name, topic_entry)| Self::topic_info(name, topic_entry))
                        .collect(),
                ))
            }

            Action::Query { spec } => {
                let hits = self.evaluate_query(&spec).await?;
                Ok(ActionResponse::Query(hits))
            }
        }
    }

    async fn open_put(
        &self,
        descriptor: ChannelDescriptor,
    ) -> Result<Box<dyn BatchSink>, TransportError> {
        let state = self.state.lock().await;
        let entry = state.sequences.get(&descriptor.sequence).ok_or_else(|| {
            TransportError::not_found(format!("sequence '{}'", descriptor.sequence))
        })?;
        if entry.status != SequenceStatus::Pending {
            return Err(TransportError::failed_precondition(format!(
                "sequence '{}' is locked",
                descriptor.sequence
            )));
        }
        if !entry.topics.contains_key(&descriptor.topic) {
            return Err(TransportError::not_found(format!(
                "topic '{}'",
                descriptor.topic
            )));
        }
        trace!(sequence = %descriptor.sequence, topic = %descriptor.topic, "Put channel opened");
        Ok(Box::new(MemorySink {
            state: Arc::clone(&self.state),
            descriptor,
            finished: false,
        }))
    }

    async fn open_get(
        &self,
        descriptor: ChannelDescriptor,
        max_batch_bytes: usize,
    ) -> Result<Box<dyn BatchSource>, TransportError> {
        let state = self.state.lock().await;
        let entry = state.sequences.get(&descriptor.sequence).ok_or_else(|| {
            TransportError::not_found(format!("sequence '{}'", descriptor.sequence))
        })?;
        let topic_entry = entry.topics.get(&descriptor.topic).ok_or_else(|| {
            TransportError::not_found(format!("topic '{}'", descriptor.topic))
        })?;
        trace!(sequence = %descriptor.sequence, topic = %descriptor.topic, "Get channel opened");
        Ok(Box::new(MemorySource {
            frames: topic_entry.frames.clone(),
            next: 0,
            pending: std::collections::VecDeque::new(),
            max_batch_bytes: max_batch_bytes.max(1),
            closed: false,
        }))
    }
}

struct MemorySink {
    state: Arc<Mutex<PlatformState>>,
    descriptor: ChannelDescriptor,
    finished: bool,
}

#[async_trait]
impl BatchSink for MemorySink {
    async fn send(&mut self, batch: RecordBatch) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::cancelled("sink already finished"));
        }
        let full_path = format!("{}{}", self.descriptor.sequence, self.descriptor.topic);
        let mut state = self.state.lock().await;
        if state.failing_puts.contains(&full_path) {
            return Err(TransportError::unavailable(format!(
                "injected failure on '{full_path}'"
            )));
        }
        let entry = state
            .sequences
            .get_mut(&self.descriptor.sequence)
            .ok_or_else(|| {
                TransportError::not_found(format!("sequence '{}'", self.descriptor.sequence))
            })?;
        if entry.status != SequenceStatus::Pending {
            return Err(TransportError::failed_precondition(format!(
                "sequence '{}' is locked",
                self.descriptor.sequence
            )));
        }
        let topic_entry = entry
            .topics
            .get_mut(&self.descriptor.topic)
            .ok_or_else(|| {
                TransportError::not_found(format!("topic '{}'", self.descriptor.topic))
            })?;

        topic_entry.size_bytes += batch.size_bytes() as i64;
        topic_entry.row_count += batch.row_count() as i64;
        topic_entry.frames.push(codec::frame_batch(&batch));
        trace!(
            topic = %self.descriptor.topic,
            rows = batch.row_count(),
            bytes = batch.size_bytes(),
            "Batch stored"
        );
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<(), TransportError> {
        self.finished = true;
        trace!(topic = %self.descriptor.topic, "Put channel half-closed");
        Ok(())
    }
}

struct MemorySource {
    frames: Vec<Bytes>,
    next: usize,
    /// Splits of an oversized stored batch, served one per fetch.
    pending: std::collections::VecDeque<RecordBatch>,
    max_batch_bytes: usize,
    closed: bool,
}

/// Re-chunks a stored batch against the reader budget. Rows are never
/// split; a single row larger than the budget travels alone.
fn split_batch(batch: RecordBatch, budget: usize) -> Vec<RecordBatch> {
    let tag = batch.tag().to_string();
    let mut out = Vec::new();
    let mut rows = Vec::new();
    let mut size = 0usize;
    for row in batch.into_rows() {
        let row_size = row.encoded_size();
        if !rows.is_empty() && size + row_size > budget {
            out.push(RecordBatch::new(tag.clone(), std::mem::take(&mut rows)));
            size = 0;
        }
        size += row_size;
        rows.push(row);
    }
    if !rows.is_empty() {
        out.push(RecordBatch::new(tag, rows));
    }
    out
}

#[async_trait]
impl BatchSource for MemorySource {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>, TransportError> {
        if self.closed {
            return Err(TransportError::cancelled("source closed"));
        }
        if let Some(batch) = self.pending.pop_front() {
            return Ok(Some(batch));
        }
        let Some(frame) = self.frames.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let mut buf = &frame[..];
        let payload = codec::read_frame(&mut buf)
            .map_err(|e| TransportError::internal(e.to_string()))?
            .ok_or_else(|| TransportError::internal("unexpected end-of-stream frame"))?;
        let batch =
            codec::decode_batch(&payload).map_err(|e| TransportError::internal(e.to_string()))?;
        if batch.size_bytes() > self.max_batch_bytes && batch.row_count() > 1 {
            self.pending = split_batch(batch, self.max_batch_bytes).into();
            return Ok(self.pending.pop_front());
        }
        Ok(Some(batch))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

// ---------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------

fn json_lookup<'a>(json: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(json, |acc, key| acc.get(key))
}

fn sequence_field(name: &str, entry: &SequenceEntry, path: &str) -> Option<Value> {
    let rest = path.strip_prefix("sequence.")?;
    match rest {
        "name" => Some(Value::Str(name.to_string())),
        "created" => Some(Value::I64(entry.created_at)),
        _ => {
            let key = rest.strip_prefix("user_metadata.")?;
            json_lookup(&entry.user_metadata, key).map(Value::from_json)
        }
    }
}

fn topic_field(name: &str, entry: &TopicEntry, path: &str) -> Option<Value> {
    let rest = path.strip_prefix("topic.")?;
    match rest {
        "name" => Some(Value::Str(name.to_string())),
        "created" => Some(Value::I64(entry.created_at)),
        "ontology_tag" => Some(Value::Str(entry.ontology_tag.clone())),
        _ => {
            let key = rest.strip_prefix("user_metadata.")?;
            json_lookup(&entry.user_metadata, key).map(Value::from_json)
        }
    }
}

fn topic_matches_catalog(
    entry: &TopicEntry,
    filters: &[FilterClause],
    tag: &str,
) -> Result<bool, TransportError> {
    let prefix = format!("{tag}.");
    for frame in &entry.frames {
        let mut buf = &frame[..];
        let payload = codec::read_frame(&mut buf)
            .map_err(|e| TransportError::internal(e.to_string()))?
            .ok_or_else(|| TransportError::internal("unexpected end-of-stream frame"))?;
        let batch =
            codec::decode_batch(&payload).map_err(|e| TransportError::internal(e.to_string()))?;
        for row in batch.rows() {
            let all_match = filters.iter().all(|clause| {
                let Some(rest) = clause.path.strip_prefix(&prefix) else {
                    return false;
                };
                let actual = match rest {
                    "timestamp_ns" => Some(Value::I64(row.timestamp_ns)),
                    "header.stamp" => row
                        .header
                        .as_ref()
                        .map(|header| Value::I64(header.stamp.as_nanos())),
                    _ => row.data.value.get_path(rest).cloned(),
                };
                actual
                    .map(|actual| eval_clause(&actual, clause))
                    .unwrap_or(false)
            });
            if all_match {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn value_eq(actual: &Value, expected: &serde_json::Value) -> bool {
    match (actual, expected) {
        (Value::Bool(a), serde_json::Value::Bool(b)) => a == b,
        (Value::Str(a), serde_json::Value::String(b)) => a == b,
        (_, serde_json::Value::Number(_)) => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

fn value_cmp(actual: &Value, expected: &serde_json::Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) {
        return Some(a.cmp(b));
    }
    None
}

fn eval_clause(actual: &Value, clause: &FilterClause) -> bool {
    use std::cmp::Ordering;
    match clause.op.as_str() {
        "$eq" => value_eq(actual, &clause.value),
        "$ne" => !value_eq(actual, &clause.value),
        "$lt" => value_cmp(actual, &clause.value) == Some(Ordering::Less),
        "$lte" => matches!(
            value_cmp(actual, &clause.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "$gt" => value_cmp(actual, &clause.value) == Some(Ordering::Greater),
        "$gte" => matches!(
            value_cmp(actual, &clause.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$between" => match clause.value.as_array() {
            Some(bounds) if bounds.len() == 2 => {
                matches!(
                    value_cmp(actual, &bounds[0]),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    value_cmp(actual, &bounds[1]),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            _ => false,
        },
        "$in" => clause
            .value
            .as_array()
            .map(|items| items.iter().any(|item| value_eq(actual, item)))
            .unwrap_or(false),
        "$match" => match (actual.as_str(), clause.value.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        _ => false,
    }
}
