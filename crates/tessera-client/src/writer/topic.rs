//! Per-topic buffered writer.
//!
//! `TopicWriter` accumulates messages into a pending batch; when either the
//! byte or the record threshold trips, the batch moves onto a bounded work
//! queue consumed by a single background flusher task. Push serialization is
//! channel-based: producers may enqueue from any thread, but the flusher is
//! singleton, so batches reach the server in push order.
//!
//! ## State machine
//!
//! `Open → Flushing* → Closed`. Flushes are internal transitions; `finalize`
//! is the only way to `Closed`, after which every push fails with
//! `WriterClosed`.
//!
//! ## Failure semantics
//!
//! A transport error on the flusher is retried once when the code is
//! idempotent-retryable, then recorded on a sticky flag and the task stops.
//! The next `push` or `finalize` observes the flag and fails fast with the
//! cause preserved. A full work queue either blocks the pusher
//! (`block_on_overflow`, the default) or fails the push with
//! `BufferOverflow` while keeping the rows pending.

use crate::config::WriterConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;
use crate::transport::{BatchSink, TransportCode, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tessera_core::{Header, Message, RecordBatch, RecordBatchBuilder};
use tessera_ontology::Ontology;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct WriterState {
    open: bool,
    pending: RecordBatchBuilder,
    tx: Option<mpsc::Sender<RecordBatch>>,
    flusher: Option<JoinHandle<()>>,
}

struct TopicWriterInner {
    sequence: String,
    topic: String,
    ontology_tag: String,
    block_on_overflow: bool,
    state: Mutex<WriterState>,
    /// First background failure; observed by the next push/finalize.
    sticky: Arc<Mutex<Option<TransportError>>>,
}

/// Buffered writer for one topic of an open sequence.
///
/// Cheap to clone; all clones share the same pipeline. The single-writer
/// contract is per topic: callers must not interleave pushes that depend on
/// each other's order from different tasks.
#[derive(Clone)]
pub struct TopicWriter {
    inner: Arc<TopicWriterInner>,
}

impl std::fmt::Debug for TopicWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicWriter")
            .field("sequence", &self.inner.sequence)
            .field("topic", &self.inner.topic)
            .field("ontology_tag", &self.inner.ontology_tag)
            .finish()
    }
}

impl TopicWriter {
    /// Allocates the work queue and the background flusher over an open
    /// channel.
    pub(crate) fn spawn(
        sequence: String,
        topic: String,
        ontology_tag: String,
        config: &WriterConfig,
        request_timeout: Duration,
        sink: Box<dyn BatchSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let sticky = Arc::new(Mutex::new(None));
        let flusher = tokio::spawn(run_flusher(
            topic.clone(),
            rx,
            sink,
            RetryPolicy::single(),
            request_timeout,
            Arc::clone(&sticky),
        ));
        Self {
            inner: Arc::new(TopicWriterInner {
                sequence,
                topic: topic.clone(),
                ontology_tag: ontology_tag.clone(),
                block_on_overflow: config.block_on_overflow,
                state: Mutex::new(WriterState {
                    open: true,
                    pending: RecordBatchBuilder::new(
                        ontology_tag,
                        config.max_batch_size_bytes,
                        config.max_batch_size_records,
                    ),
                    tx: Some(tx),
                    flusher: Some(flusher),
                }),
                sticky,
            }),
        }
    }

    /// Canonical topic path (leading `/`).
    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    pub fn ontology_tag(&self) -> &str {
        &self.inner.ontology_tag
    }

    /// Appends a message to the pending batch.
    ///
    /// Validates that the writer is open, the payload tag matches the
    /// topic's ontology, and the timestamp is non-negative. Blocks only when
    /// the work queue is full and `block_on_overflow` is enabled.
    ///
    /// # Errors
    ///
    /// - `WriterClosed` after finalize
    /// - `OntologyMismatch` when the payload tag differs from the topic's
    /// - `NegativeTimestamp` for timestamps before the epoch
    /// - `BufferOverflow` when the queue is full and blocking is disabled
    /// - `FlushFailed` when a background flush already failed
    pub async fn push(&self, message: Message) -> Result<()> {
        if let Some(source) = self.inner.sticky.lock().await.clone() {
            return Err(ClientError::FlushFailed {
                topic: self.inner.topic.clone(),
                source,
            });
        }

        let mut state = self.inner.state.lock().await;
        if !state.open {
            return Err(ClientError::WriterClosed {
                topic: self.inner.topic.clone(),
            });
        }
        if message.data.tag != self.inner.ontology_tag {
            return Err(ClientError::OntologyMismatch {
                topic: self.inner.topic.clone(),
                expected: self.inner.ontology_tag.clone(),
                found: message.data.tag,
            });
        }
        if message.timestamp_ns < 0 {
            return Err(ClientError::NegativeTimestamp {
                topic: self.inner.topic.clone(),
                timestamp_ns: message.timestamp_ns,
            });
        }

        state.pending.push(message);
        if state.pending.should_flush() {
            let batch = state.pending.drain();
            self.enqueue(&mut state, batch).await?;
        }
        Ok(())
    }

    /// Builds a message from an ontology payload and pushes it.
    pub async fn push_payload<T: Ontology>(
        &self,
        payload: T,
        timestamp_ns: i64,
        header: Option<Header>,
    ) -> Result<()> {
        let message = match header {
            Some(header) => payload.into_message_with_header(timestamp_ns, header),
            None => payload.into_message(timestamp_ns),
        };
        self.push(message).await
    }

    async fn enqueue(&self, state: &mut WriterState, batch: RecordBatch) -> Result<()> {
        let Some(tx) = state.tx.as_ref() else {
            return Err(ClientError::WriterClosed {
                topic: self.inner.topic.clone(),
            });
        };
        if self.inner.block_on_overflow {
            if tx.send(batch).await.is_err() {
                return Err(self.flush_failure().await);
            }
        } else {
            match tx.try_send(batch) {
                Ok(()) => {}
                Err(TrySendError::Full(batch)) => {
                    state.pending.refill(batch);
                    return Err(ClientError::BufferOverflow {
                        topic: self.inner.topic.clone(),
                    });
                }
                Err(TrySendError::Closed(_)) => return Err(self.flush_failure().await),
            }
        }
        Ok(())
    }

    /// Maps a dead work queue to its cause: the flusher's sticky error, or
    /// cancellation when the queue was closed under the pusher.
    async fn flush_failure(&self) -> ClientError {
        match self.inner.sticky.lock().await.clone() {
            Some(source) => ClientError::FlushFailed {
                topic: self.inner.topic.clone(),
                source,
            },
            None => ClientError::Cancelled,
        }
    }

    /// Closes the writer: flushes the pending batch (unless finalizing on
    /// the error path, which drops it), joins the flusher and half-closes
    /// the channel. Idempotent.
    pub async fn finalize(&self, with_error: bool) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if !state.open && state.flusher.is_none() {
            return Ok(());
        }
        state.open = false;

        if with_error {
            let dropped = state.pending.len();
            if dropped > 0 {
                warn!(
                    topic = %self.inner.topic,
                    dropped,
                    "Dropping open batch on error finalize"
                );
            }
            state.pending.clear();
        } else if !state.pending.is_empty() {
            let batch = state.pending.drain();
            if let Some(tx) = state.tx.as_ref() {
                // A refused send means the flusher died; the sticky flag
                // below reports the cause.
                let _ = tx.send(batch).await;
            }
        }

        state.tx = None;
        let flusher = state.flusher.take();
        drop(state);

        if let Some(handle) = flusher {
            if handle.await.is_err() {
                return Err(ClientError::Internal(format!(
                    "flusher task for '{}' panicked",
                    self.inner.topic
                )));
            }
        }

        if let Some(source) = self.inner.sticky.lock().await.clone() {
            return Err(ClientError::FlushFailed {
                topic: self.inner.topic.clone(),
                source,
            });
        }
        debug!(sequence = %self.inner.sequence, topic = %self.inner.topic, "Topic writer finalized");
        Ok(())
    }
}

async fn run_flusher(
    topic: String,
    mut rx: mpsc::Receiver<RecordBatch>,
    mut sink: Box<dyn BatchSink>,
    retry: RetryPolicy,
    request_timeout: Duration,
    sticky: Arc<Mutex<Option<TransportError>>>,
) {
    while let Some(batch) = rx.recv().await {
        let rows = batch.row_count();
        let bytes = batch.size_bytes();
        match send_with_single_retry(&mut sink, batch, &retry, request_timeout).await {
            Ok(()) => {
                debug!(topic = %topic, rows, bytes, "Flushed batch");
            }
            Err(error) => {
                warn!(topic = %topic, error = %error, "Batch flush failed, writer poisoned");
                *sticky.lock().await = Some(error);
                // Dropping the receiver unblocks pushers waiting on the
                // queue; they observe the sticky flag.
                break;
            }
        }
    }
    drop(rx);

    if let Err(error) = sink.finish().await {
        warn!(topic = %topic, error = %error, "Channel half-close failed");
        let mut sticky = sticky.lock().await;
        if sticky.is_none() {
            *sticky = Some(error);
        }
    }
}

/// Sends one batch under the per-batch transport timeout.
async fn send_timed(
    sink: &mut Box<dyn BatchSink>,
    batch: RecordBatch,
    request_timeout: Duration,
) -> std::result::Result<(), TransportError> {
    match tokio::time::timeout(request_timeout, sink.send(batch)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::new(
            TransportCode::DeadlineExceeded,
            format!("batch send timed out after {request_timeout:?}"),
        )),
    }
}

/// One retry, and only for idempotent-retryable transport codes.
async fn send_with_single_retry(
    sink: &mut Box<dyn BatchSink>,
    batch: RecordBatch,
    retry: &RetryPolicy,
    request_timeout: Duration,
) -> std::result::Result<(), TransportError> {
    match send_timed(sink, batch.clone(), request_timeout).await {
        Ok(()) => Ok(()),
        Err(error) if retry.is_retryable(&error) => {
            warn!(error = %error, "Retrying failed batch once");
            tokio::time::sleep(retry.backoff(0)).await;
            send_timed(sink, batch, request_timeout).await
        }
        Err(error) => Err(error),
    }
}
