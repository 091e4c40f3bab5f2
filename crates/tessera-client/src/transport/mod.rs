//! Record-batch channel transport.
//!
//! The platform is reached through two planes:
//!
//! - a **control plane** of actions (`SEQUENCE_CREATE`, `SEQUENCE_FINALIZE`,
//!   `SEQUENCE_ABORT`, `SEQUENCE_UNLOCK`, `TOPIC_CREATE`, `QUERY`, plus
//!   metadata reads), and
//! - a **data plane** of push/pull record-batch channels, one per
//!   `(sequence, topic)` pair.
//!
//! The SDK talks to `Arc<dyn Transport>`; concrete backends implement the
//! trait. [`memory::InMemoryTransport`] is the in-process backend used by
//! tests and local tooling. Payloads travel as length-prefixed encoded
//! record batches followed by an end-of-stream marker (the core codec); the
//! structs here stay at the batch granularity.

pub mod memory;

use crate::query::QuerySpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::RecordBatch;
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryTransport;

/// Addresses one record-batch channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelDescriptor {
    pub sequence: String,
    /// Canonical topic path (leading `/`).
    pub topic: String,
}

impl ChannelDescriptor {
    pub fn new(sequence: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            topic: topic.into(),
        }
    }
}

/// Control-plane requests.
#[derive(Debug, Clone)]
pub enum Action {
    SequenceCreate {
        name: String,
        user_metadata: serde_json::Value,
    },
    /// Finalizes and locks a sequence; the key must match the one returned
    /// by `SequenceCreate`.
    SequenceFinalize { name: String, key: Uuid },
    /// Aborts an open sequence; the server purges all of its data.
    SequenceAbort { name: String, key: Uuid },
    /// Marks a failed sequence as unlocked; partial data persists.
    SequenceUnlock { name: String, key: Uuid },
    TopicCreate {
        sequence: String,
        /// Canonical topic path (leading `/`).
        topic: String,
        ontology_tag: String,
        user_metadata: serde_json::Value,
    },
    SequenceInfo { name: String },
    TopicInfo { sequence: String, topic: String },
    ListTopics { sequence: String },
    Query { spec: QuerySpec },
}

/// Control-plane responses.
#[derive(Debug, Clone)]
pub enum ActionResponse {
    /// Resource created; `key` authorizes finalize/abort on it.
    Created { key: Uuid },
    Sequence(SequenceInfo),
    Topic(TopicInfo),
    Topics(Vec<TopicInfo>),
    Query(Vec<QueryHit>),
    Empty,
}

/// One query result row as returned by the platform: a sequence plus the
/// matching topics as full resource paths (`"{sequence}{topic}"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHit {
    pub sequence: String,
    pub topics: Vec<String>,
}

/// Lifecycle status of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceStatus {
    /// Open for writing.
    Pending,
    /// Cleanly closed; immutable.
    Finalized,
    /// Failed with the `Delete` policy; data purged.
    Error,
    /// Failed with the `Report` policy; partial data preserved.
    Unlocked,
}

/// Sequence metadata as stored by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceInfo {
    pub name: String,
    pub status: SequenceStatus,
    pub user_metadata: serde_json::Value,
    /// Creation time, milliseconds since the epoch.
    pub created_at: i64,
    /// Total stored bytes across all topics.
    pub size_bytes: i64,
}

/// Topic metadata as stored by the platform.
///
/// `size_bytes` and `row_count` are mandatory chunk-metadata columns: the
/// platform tracks them so readers can size fetches without probing storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Relative topic path (leading `/`).
    pub name: String,
    pub ontology_tag: String,
    pub user_metadata: serde_json::Value,
    /// Creation time, milliseconds since the epoch.
    pub created_at: i64,
    pub size_bytes: i64,
    pub row_count: i64,
}

/// Status code of a transport failure.
///
/// The retryable half mirrors the usual RPC classification: transient
/// conditions that a single retry may clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCode {
    /// Endpoint temporarily down or restarting. Retryable.
    Unavailable,
    /// Per-batch timeout expired. Retryable.
    DeadlineExceeded,
    /// Endpoint at capacity (backpressure). Retryable.
    ResourceExhausted,
    /// Transient server-side error. Retryable.
    Internal,
    /// Resource does not exist.
    NotFound,
    /// Resource already exists.
    AlreadyExists,
    /// Request was malformed or violates a server-side rule.
    InvalidArgument,
    /// Resource state forbids the operation (e.g. locked sequence).
    FailedPrecondition,
    /// Channel closed under the caller.
    Cancelled,
}

/// A transport failure with its status code.
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct TransportError {
    pub code: TransportCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(TransportCode::Unavailable, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(TransportCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(TransportCode::AlreadyExists, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(TransportCode::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(TransportCode::FailedPrecondition, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(TransportCode::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(TransportCode::Internal, message)
    }
}

/// Push side of a record-batch channel.
#[async_trait]
pub trait BatchSink: Send {
    /// Sends one record batch. Batches arrive at the server in send order.
    async fn send(&mut self, batch: RecordBatch) -> Result<(), TransportError>;

    /// Half-closes the sender after the end-of-stream marker.
    async fn finish(self: Box<Self>) -> Result<(), TransportError>;
}

/// Pull side of a record-batch channel.
#[async_trait]
pub trait BatchSource: Send {
    /// Fetches the next record batch; `Ok(None)` is end-of-stream.
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>, TransportError>;

    /// Releases the channel. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A connection to the platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one control-plane action.
    async fn do_action(&self, action: Action) -> Result<ActionResponse, TransportError>;

    /// Opens a push channel to a `(sequence, topic)` endpoint.
    async fn open_put(
        &self,
        descriptor: ChannelDescriptor,
    ) -> Result<Box<dyn BatchSink>, TransportError>;

    /// Opens a pull channel from a `(sequence, topic)` endpoint.
    ///
    /// `max_batch_bytes` is the reader's per-fetch budget; the platform
    /// sizes returned batches against it using the stored chunk metadata
    /// (`size_bytes`, `row_count`), never splitting a single row.
    async fn open_get(
        &self,
        descriptor: ChannelDescriptor,
        max_batch_bytes: usize,
    ) -> Result<Box<dyn BatchSource>, TransportError>;
}
