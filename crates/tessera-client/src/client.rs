//! Client entry point.
//!
//! `TesseraClient` holds the shared transport connection and the
//! client-scoped configuration. It hands out scoped sequence writers on the
//! write side, handlers on the read side, and executes catalog queries.
//!
//! Sequence writers are only usable inside an acquisition scope
//! ([`TesseraClient::with_sequence`], or `sequence_create` followed by
//! [`SequenceWriter::scope`]); the scope guarantees the terminal lifecycle
//! transition on every exit path, including panics.

use crate::config::{ClientConfig, ReaderConfig, SequenceConfig, WriterConfig};
use crate::error::{ClientError, Result};
use crate::handler::{SequenceHandler, TopicHandler};
use crate::query::{Query, QueryResponse};
use crate::retry::{retry_with_jittered_backoff, RetryPolicy};
use crate::transport::{
    Action, ActionResponse, InMemoryTransport, Transport, TransportCode,
};
use crate::writer::SequenceWriter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connection to a Tessera platform instance.
pub struct TesseraClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TesseraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesseraClient")
            .field("config", &self.config)
            .finish()
    }
}

impl TesseraClient {
    pub fn builder() -> TesseraClientBuilder {
        TesseraClientBuilder::new()
    }

    /// A client over a fresh in-process platform, plus a handle to it.
    ///
    /// The transport handle keeps working after the client is dropped;
    /// tests use it for fault injection and server-side assertions.
    pub fn in_memory() -> (Self, InMemoryTransport) {
        let transport = InMemoryTransport::new();
        let client = Self {
            transport: Arc::new(transport.clone()),
            config: ClientConfig::default(),
            retry: RetryPolicy::default(),
        };
        (client, transport)
    }

    /// Creates a sequence on the platform and returns its writer.
    ///
    /// The writer is not yet inside an acquisition scope: every
    /// data-carrying operation fails with `UnsafeLifecycle` until it runs
    /// under [`SequenceWriter::scope`]. Prefer
    /// [`TesseraClient::with_sequence`], which combines both steps.
    pub async fn sequence_create(
        &self,
        name: &str,
        config: SequenceConfig,
    ) -> Result<SequenceWriter> {
        tessera_core::topic::validate_sequence_name(name)?;
        let response = self
            .transport
            .do_action(Action::SequenceCreate {
                name: name.to_string(),
                user_metadata: serde_json::Value::Object(config.user_metadata.clone()),
            })
            .await?;
        let ActionResponse::Created { key } = response else {
            return Err(unexpected_response());
        };
        let writer_config = config
            .writer
            .unwrap_or_else(|| self.config.writer.clone());
        Ok(SequenceWriter::new(
            name.to_string(),
            key,
            config.user_metadata,
            config.on_error,
            writer_config,
            self.config.request_timeout,
            Arc::clone(&self.transport),
        ))
    }

    /// Opens a sequence for writing and runs `body` inside its scope.
    ///
    /// On clean return the sequence is finalized; on error or panic the
    /// configured `OnErrorPolicy` decides between abort (`Delete`) and
    /// unlock (`Report`).
    pub async fn with_sequence<F, Fut, T>(
        &self,
        name: &str,
        config: SequenceConfig,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(SequenceWriter) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let writer = self.sequence_create(name, config).await?;
        writer.scope(body).await
    }

    /// Looks up a sequence; `Ok(None)` when it does not exist.
    pub async fn sequence_handler(&self, name: &str) -> Result<Option<SequenceHandler>> {
        let info = match retry_with_jittered_backoff(&self.retry, || {
            let action = Action::SequenceInfo {
                name: name.to_string(),
            };
            async move { self.transport.do_action(action).await }
        })
        .await
        {
            Ok(ActionResponse::Sequence(info)) => info,
            Ok(_) => return Err(unexpected_response()),
            Err(err) if err.code == TransportCode::NotFound => {
                debug!(sequence = %name, "Sequence not found");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let response = self
            .transport
            .do_action(Action::ListTopics {
                sequence: name.to_string(),
            })
            .await?;
        let ActionResponse::Topics(topics) = response else {
            return Err(unexpected_response());
        };

        Ok(Some(SequenceHandler::new(
            info,
            topics,
            self.config.reader.clone(),
            Arc::clone(&self.transport),
        )))
    }

    /// Looks up one topic of a sequence; `Ok(None)` when either does not
    /// exist.
    pub async fn topic_handler(
        &self,
        sequence_name: &str,
        topic_name: &str,
    ) -> Result<Option<TopicHandler>> {
        let topic = tessera_core::topic::normalize_topic_name(topic_name)?;
        match retry_with_jittered_backoff(&self.retry, || {
            let action = Action::TopicInfo {
                sequence: sequence_name.to_string(),
                topic: topic.clone(),
            };
            async move { self.transport.do_action(action).await }
        })
        .await
        {
            Ok(ActionResponse::Topic(info)) => Ok(Some(TopicHandler::new(
                sequence_name.to_string(),
                info,
                self.config.reader.clone(),
                Arc::clone(&self.transport),
            ))),
            Ok(_) => Err(unexpected_response()),
            Err(err) if err.code == TransportCode::NotFound => {
                debug!(sequence = %sequence_name, topic = %topic, "Topic not found");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Executes a query and returns the matching resources.
    ///
    /// Accepts a single builder or a composed [`Query`].
    pub async fn query(&self, query: impl Into<Query>) -> Result<QueryResponse> {
        let spec = query.into().to_spec();
        let response = retry_with_jittered_backoff(&self.retry, || {
            let spec = spec.clone();
            async move { self.transport.do_action(Action::Query { spec }).await }
        })
        .await?;
        let ActionResponse::Query(hits) = response else {
            return Err(unexpected_response());
        };
        QueryResponse::from_hits(hits)
    }

    /// Marks the client as closed. Deliberately a no-op: the client holds
    /// no channels of its own. The transport is shared and
    /// reference-counted and is released when the last handle drops;
    /// sequence writers tear down through their acquisition scope, and
    /// handlers release their channels via their own `close()`.
    pub async fn close(&self) -> Result<()> {
        debug!("Client closed");
        Ok(())
    }
}

fn unexpected_response() -> ClientError {
    ClientError::Internal("unexpected control-plane response".to_string())
}

/// Builder for configuring and creating a [`TesseraClient`].
pub struct TesseraClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    config: ClientConfig,
    retry: RetryPolicy,
}

impl TesseraClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            config: ClientConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the transport backend (required).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Default writer pipeline configuration for new sequences.
    pub fn writer_config(mut self, writer: WriterConfig) -> Self {
        self.config.writer = writer;
        self
    }

    /// Streamer configuration for handlers created by this client.
    pub fn reader_config(mut self, reader: ReaderConfig) -> Self {
        self.config.reader = reader;
        self
    }

    /// Retry policy for idempotent control-plane calls.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-batch transport timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TesseraClient> {
        let transport = self
            .transport
            .ok_or_else(|| ClientError::Config("transport is required".to_string()))?;
        Ok(TesseraClient {
            transport,
            config: self.config,
            retry: self.retry,
        })
    }
}

impl Default for TesseraClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
