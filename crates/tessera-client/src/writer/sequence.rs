//! Sequence writer: lifecycle owner of the write path.
//!
//! A sequence writer is created Pending, hands out topic writers, and owns
//! the terminal transition on scope exit:
//!
//! - clean exit → finalize every topic writer, `SEQUENCE_FINALIZE`, status
//!   `Finalized`;
//! - error exit with the `Delete` policy → `SEQUENCE_ABORT` (server purges
//!   all data), status `Error`;
//! - error exit with the `Report` policy → `SEQUENCE_UNLOCK` (partial data
//!   preserved), status `Unlocked`.
//!
//! Scoped acquisition is mandatory: writers are only obtained through
//! `TesseraClient::with_sequence`, whose wrapper marks the writer entered
//! and guarantees the terminal transition on every exit path. Using a
//! writer that never entered a scope fails with `UnsafeLifecycle`.

use crate::config::{OnErrorPolicy, UserMetadata, WriterConfig};
use crate::error::{ClientError, Result};
use crate::transport::{
    Action, ChannelDescriptor, SequenceStatus, Transport, TransportError,
};
use crate::writer::topic::TopicWriter;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::topic::normalize_topic_name;
use tessera_ontology::{registry, Ontology};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

struct SequenceWriterState {
    status: SequenceStatus,
    entered: bool,
    topics: BTreeMap<String, TopicWriter>,
}

struct SequenceWriterInner {
    name: String,
    /// Key returned by `SEQUENCE_CREATE`; authorizes the terminal action.
    key: Uuid,
    user_metadata: UserMetadata,
    on_error: OnErrorPolicy,
    writer_config: WriterConfig,
    request_timeout: std::time::Duration,
    transport: Arc<dyn Transport>,
    state: Mutex<SequenceWriterState>,
}

/// Writer for one open sequence. Cheap to clone.
#[derive(Clone)]
pub struct SequenceWriter {
    inner: Arc<SequenceWriterInner>,
}

impl std::fmt::Debug for SequenceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceWriter")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .finish()
    }
}

impl SequenceWriter {
    pub(crate) fn new(
        name: String,
        key: Uuid,
        user_metadata: UserMetadata,
        on_error: OnErrorPolicy,
        writer_config: WriterConfig,
        request_timeout: std::time::Duration,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(SequenceWriterInner {
                name,
                key,
                user_metadata,
                on_error,
                writer_config,
                request_timeout,
                transport,
                state: Mutex::new(SequenceWriterState {
                    status: SequenceStatus::Pending,
                    entered: false,
                    topics: BTreeMap::new(),
                }),
            }),
        }
    }

    pub(crate) async fn mark_entered(&self) {
        self.inner.state.lock().await.entered = true;
    }

    /// Runs `body` inside the writer's acquisition scope.
    ///
    /// The terminal transition is guaranteed on every exit path: a clean
    /// return finalizes the sequence, an error or a panic runs the
    /// configured error policy (and a panic resumes unwinding afterwards).
    pub async fn scope<F, Fut, T>(self, body: F) -> Result<T>
    where
        F: FnOnce(SequenceWriter) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        use futures::FutureExt;

        self.mark_entered().await;
        let result = std::panic::AssertUnwindSafe(body(self.clone()))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(value)) => {
                self.close().await?;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.fail().await;
                Err(err)
            }
            Err(panic) => {
                self.fail().await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn user_metadata(&self) -> &UserMetadata {
        &self.inner.user_metadata
    }

    /// Current lifecycle status of this sequence.
    pub async fn sequence_status(&self) -> SequenceStatus {
        self.inner.state.lock().await.status
    }

    /// Whether a topic with this (normalized) name was created.
    pub async fn topic_exists(&self, name: &str) -> bool {
        match normalize_topic_name(name) {
            Ok(topic) => self.inner.state.lock().await.topics.contains_key(&topic),
            Err(_) => false,
        }
    }

    /// Canonical paths of all created topics.
    pub async fn list_topics(&self) -> Vec<String> {
        self.inner.state.lock().await.topics.keys().cloned().collect()
    }

    /// The writer for an already-created topic.
    pub async fn get_topic(&self, name: &str) -> Option<TopicWriter> {
        let topic = normalize_topic_name(name).ok()?;
        self.inner.state.lock().await.topics.get(&topic).cloned()
    }

    /// Registers a topic on the platform and allocates its writer pipeline
    /// (record-batch channel plus background flusher).
    ///
    /// The name is normalized to its leading-`/` form first.
    ///
    /// # Errors
    ///
    /// - `UnsafeLifecycle` outside a sequence scope
    /// - `SequenceClosed` when the sequence already left `Pending`
    /// - `DuplicateTopic` when the normalized name exists
    pub async fn topic_create<T: Ontology>(
        &self,
        name: &str,
        user_metadata: Option<UserMetadata>,
    ) -> Result<TopicWriter> {
        let topic = normalize_topic_name(name)?;

        let mut state = self.inner.state.lock().await;
        if !state.entered {
            return Err(ClientError::UnsafeLifecycle);
        }
        if state.status != SequenceStatus::Pending {
            return Err(ClientError::SequenceClosed {
                name: self.inner.name.clone(),
                status: state.status,
            });
        }
        if state.topics.contains_key(&topic) {
            return Err(ClientError::DuplicateTopic {
                sequence: self.inner.name.clone(),
                topic,
            });
        }

        // Keep the registry current so catalog queries resolve the tag.
        registry::register::<T>()?;

        let metadata = user_metadata.unwrap_or_default();
        self.inner
            .transport
            .do_action(Action::TopicCreate {
                sequence: self.inner.name.clone(),
                topic: topic.clone(),
                ontology_tag: T::TAG.to_string(),
                user_metadata: serde_json::Value::Object(metadata),
            })
            .await?;

        let sink = self
            .inner
            .transport
            .open_put(ChannelDescriptor::new(&self.inner.name, &topic))
            .await?;
        let writer = TopicWriter::spawn(
            self.inner.name.clone(),
            topic.clone(),
            T::TAG.to_string(),
            &self.inner.writer_config,
            self.inner.request_timeout,
            sink,
        );
        info!(sequence = %self.inner.name, topic = %topic, tag = T::TAG, "Topic writer created");
        state.topics.insert(topic, writer.clone());
        Ok(writer)
    }

    /// Clean close: finalize every topic writer, then finalize the sequence.
    ///
    /// When any topic finalize fails, the configured error policy runs
    /// instead and the first failure is returned.
    pub(crate) async fn close(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.status != SequenceStatus::Pending {
            return Ok(());
        }

        let topics: Vec<(String, TopicWriter)> = state
            .topics
            .iter()
            .map(|(name, writer)| (name.clone(), writer.clone()))
            .collect();

        let mut first_error = None;
        for (name, writer) in topics {
            if let Err(err) = writer.finalize(false).await {
                error!(
                    sequence = %self.inner.name,
                    topic = %name,
                    kind = err.kind(),
                    error = %err,
                    "Topic finalize failed"
                );
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            None => {
                self.inner
                    .transport
                    .do_action(Action::SequenceFinalize {
                        name: self.inner.name.clone(),
                        key: self.inner.key,
                    })
                    .await?;
                state.status = SequenceStatus::Finalized;
                info!(sequence = %self.inner.name, "Sequence finalized");
                Ok(())
            }
            Some(err) => {
                if let Err(policy_err) = self.apply_error_policy(&mut state).await {
                    error!(
                        sequence = %self.inner.name,
                        error = %policy_err,
                        "Error policy action failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Error-path close: drop open batches, then run the error policy.
    pub(crate) async fn fail(&self) {
        let mut state = self.inner.state.lock().await;
        if state.status != SequenceStatus::Pending {
            return;
        }

        let topics: Vec<TopicWriter> = state.topics.values().cloned().collect();
        for writer in topics {
            if let Err(err) = writer.finalize(true).await {
                // Expected when the failure originated on this topic.
                warn!(sequence = %self.inner.name, error = %err, "Topic finalize on error path");
            }
        }

        if let Err(err) = self.apply_error_policy(&mut state).await {
            error!(sequence = %self.inner.name, error = %err, "Error policy action failed");
        }
    }

    async fn apply_error_policy(
        &self,
        state: &mut SequenceWriterState,
    ) -> std::result::Result<(), TransportError> {
        match self.inner.on_error {
            OnErrorPolicy::Delete => {
                self.inner
                    .transport
                    .do_action(Action::SequenceAbort {
                        name: self.inner.name.clone(),
                        key: self.inner.key,
                    })
                    .await?;
                state.status = SequenceStatus::Error;
                warn!(sequence = %self.inner.name, "Sequence aborted (Delete policy)");
            }
            OnErrorPolicy::Report => {
                self.inner
                    .transport
                    .do_action(Action::SequenceUnlock {
                        name: self.inner.name.clone(),
                        key: self.inner.key,
                    })
                    .await?;
                state.status = SequenceStatus::Unlocked;
                warn!(sequence = %self.inner.name, "Sequence unlocked (Report policy)");
            }
        }
        Ok(())
    }
}
