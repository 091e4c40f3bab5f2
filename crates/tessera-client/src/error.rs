//! Error types for client operations.
//!
//! ## Error Handling Strategy
//!
//! - **Lifecycle errors**: `UnsafeLifecycle`, `WriterClosed`,
//!   `SequenceClosed` - misuse of the writer scope; fatal, surfaced
//!   immediately at the offending call.
//! - **Validation errors**: `DuplicateTopic`, `OntologyMismatch`,
//!   `DuplicateField`, `HeterogeneousCatalogQuery`, ... - returned
//!   synchronously at the offending call.
//! - **Transport errors**: recovered at most once when the code is
//!   idempotent-retryable, otherwise propagated; background flush failures
//!   are sticky per writer and surface on the next `push`/`finalize` as
//!   `FlushFailed` with the cause preserved.
//! - **Data errors**: decode failures on read; the streamer becomes
//!   unusable afterwards (`StreamerPoisoned`).
//! - **Cancelled**: explicit close or client shutdown; blocking calls
//!   unwind cleanly.

use crate::transport::{SequenceStatus, TransportError};
use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Comprehensive error type for Tessera client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    // --- Lifecycle -------------------------------------------------

    /// The sequence writer was used outside its acquisition scope.
    #[error("sequence writer must be used within a sequence scope")]
    UnsafeLifecycle,

    /// Push or finalize on a topic writer that was already finalized.
    #[error("topic writer for '{topic}' is closed")]
    WriterClosed { topic: String },

    /// Operation on a sequence that is no longer pending.
    #[error("sequence '{name}' is not open for writing (status: {status:?})")]
    SequenceClosed {
        name: String,
        status: SequenceStatus,
    },

    // --- Validation ------------------------------------------------

    /// A topic with the same normalized name already exists.
    #[error("topic '{topic}' already exists in sequence '{sequence}'")]
    DuplicateTopic { sequence: String, topic: String },

    /// Payload ontology tag differs from the topic's tag.
    #[error("ontology mismatch on '{topic}': topic carries '{expected}', payload is '{found}'")]
    OntologyMismatch {
        topic: String,
        expected: String,
        found: String,
    },

    /// Reception timestamps are non-negative by contract.
    #[error("negative timestamp {timestamp_ns} pushed to topic '{topic}'")]
    NegativeTimestamp { topic: String, timestamp_ns: i64 },

    /// Two expressions in one builder constrain the same path.
    ///
    /// Use `between` or `is_in` to express multiple constraints on a field.
    #[error("field '{path}' is already constrained in this query")]
    DuplicateField { path: String },

    /// A catalog query mixed expressions from two ontologies.
    #[error("catalog query mixes ontology '{expected}' with '{found}'")]
    HeterogeneousCatalogQuery { expected: String, found: String },

    /// Operator not available for the field's kind.
    #[error("operator {op} is not supported on field '{path}'")]
    UnsupportedOperator { path: String, op: &'static str },

    /// Attribute path not present in the ontology schema.
    #[error("unknown field '{path}' on ontology '{tag}'")]
    UnknownField { tag: String, path: String },

    /// Malformed query construction (empty ranges and the like).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Name validation and wire decode errors from the core layer.
    #[error(transparent)]
    Core(#[from] tessera_core::Error),

    /// Ontology registration or payload decode failures.
    #[error(transparent)]
    Ontology(#[from] tessera_ontology::OntologyError),

    // --- Ingestion -------------------------------------------------

    /// The per-topic work queue was full and `block_on_overflow` is off.
    #[error("work queue for topic '{topic}' is at capacity")]
    BufferOverflow { topic: String },

    /// A background flush failed; sticky until the writer is finalized.
    #[error("background flush for topic '{topic}' failed")]
    FlushFailed {
        topic: String,
        #[source]
        source: TransportError,
    },

    // --- Transport / data -----------------------------------------

    /// Control-plane or channel-setup failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A topic stream failed while the merge was pulling from it.
    #[error("stream for topic '{topic}' failed")]
    TopicStream {
        topic: String,
        #[source]
        source: TransportError,
    },

    /// Corrupted or schema-mismatched data on the read path.
    #[error("data error: {0}")]
    Data(String),

    /// The streamer saw a failure earlier and refuses further reads.
    #[error("streamer for '{topic}' is unusable after a previous failure")]
    StreamerPoisoned { topic: String },

    /// Explicit close or shutdown unwound a blocking call.
    #[error("operation cancelled")]
    Cancelled,

    /// Invariant violation inside the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Kind string used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::UnsafeLifecycle
            | ClientError::WriterClosed { .. }
            | ClientError::SequenceClosed { .. } => "lifecycle",
            ClientError::DuplicateTopic { .. }
            | ClientError::OntologyMismatch { .. }
            | ClientError::NegativeTimestamp { .. }
            | ClientError::DuplicateField { .. }
            | ClientError::HeterogeneousCatalogQuery { .. }
            | ClientError::UnsupportedOperator { .. }
            | ClientError::UnknownField { .. }
            | ClientError::InvalidQuery(_)
            | ClientError::Config(_)
            | ClientError::Core(_)
            | ClientError::Ontology(_) => "validation",
            ClientError::BufferOverflow { .. }
            | ClientError::FlushFailed { .. }
            | ClientError::Transport(_)
            | ClientError::TopicStream { .. } => "transport",
            ClientError::Data(_) | ClientError::StreamerPoisoned { .. } => "data",
            ClientError::Cancelled => "cancelled",
            ClientError::Internal(_) => "internal",
        }
    }
}
