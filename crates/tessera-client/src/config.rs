//! Client, writer and reader configuration.
//!
//! All knobs have workable defaults; builders expose the ones callers
//! commonly tune. Batch thresholds balance throughput against latency the
//! same way producer batching does everywhere: bigger batches amortize the
//! channel round-trip, smaller ones bound the replay window.

use std::time::Duration;

/// String-keyed map of arbitrary JSON-compatible values.
pub type UserMetadata = serde_json::Map<String, serde_json::Value>;

/// What to do with a sequence whose scope exits on the error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnErrorPolicy {
    /// Abort the sequence; the server purges all of its data.
    Delete,
    /// Unlock the sequence; partial data persists and can be removed later.
    #[default]
    Report,
}

/// Configuration of a topic writer's batching pipeline.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Byte threshold triggering a flush of the pending batch.
    pub max_batch_size_bytes: usize,

    /// Record-count threshold triggering a flush of the pending batch.
    pub max_batch_size_records: usize,

    /// High-water mark of the per-topic work queue feeding the background
    /// flusher.
    pub queue_depth: usize,

    /// Whether `push` blocks when the work queue is full. When disabled a
    /// full queue fails the push with `BufferOverflow`.
    pub block_on_overflow: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_batch_size_bytes: 1024 * 1024,
            max_batch_size_records: 100,
            queue_depth: 8,
            block_on_overflow: true,
        }
    }
}

/// Configuration of the read-side streamers.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Per-topic resident budget: at most one record batch up to this many
    /// bytes is held in memory per topic streamer.
    pub max_batch_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_batch_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Per-sequence options passed to the scoped writer.
#[derive(Debug, Clone, Default)]
pub struct SequenceConfig {
    /// User metadata attached to the sequence at creation.
    pub user_metadata: UserMetadata,

    /// Error policy applied when the scope exits on the error path.
    pub on_error: OnErrorPolicy,

    /// Writer pipeline overrides; the client default applies when `None`.
    pub writer: Option<WriterConfig>,
}

impl SequenceConfig {
    pub fn new(user_metadata: UserMetadata, on_error: OnErrorPolicy) -> Self {
        Self {
            user_metadata,
            on_error,
            writer: None,
        }
    }

    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = Some(writer);
        self
    }
}

/// Client-scoped configuration shared by all sequences and handlers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub writer: WriterConfig,
    pub reader: ReaderConfig,

    /// Timeout applied per batch send on the transport.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            writer: WriterConfig::default(),
            reader: ReaderConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
