//! Pull-mode iterator over one topic.
//!
//! Messages are served from an internal row buffer; when it runs dry the
//! next record batch is fetched from the transport and decoded in schema
//! order. Previously yielded rows are released as they are consumed, so at
//! most one batch is resident per streamer.
//!
//! The platform guarantees per-topic delivery in non-decreasing
//! `timestamp_ns` order; the merge layer relies on it, so a regression in
//! the stream is treated as corruption and poisons the streamer.

use crate::error::{ClientError, Result};
use crate::transport::{BatchSource, TransportCode};
use std::collections::VecDeque;
use tessera_core::Message;
use tracing::trace;

/// Streaming reader for one topic of a sequence.
pub struct TopicDataStreamer {
    topic: String,
    ontology_tag: String,
    source: Option<Box<dyn BatchSource>>,
    buffer: VecDeque<Message>,
    end_of_stream: bool,
    poisoned: bool,
    last_timestamp: Option<i64>,
}

impl TopicDataStreamer {
    pub(crate) fn new(
        topic: impl Into<String>,
        ontology_tag: impl Into<String>,
        source: Box<dyn BatchSource>,
    ) -> Self {
        Self {
            topic: topic.into(),
            ontology_tag: ontology_tag.into(),
            source: Some(source),
            buffer: VecDeque::new(),
            end_of_stream: false,
            poisoned: false,
            last_timestamp: None,
        }
    }

    /// Relative topic path (leading `/`).
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn ontology_tag(&self) -> &str {
        &self.ontology_tag
    }

    /// Fetches and decodes batches until the buffer holds a row or the
    /// stream ends.
    async fn fill(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(ClientError::StreamerPoisoned {
                topic: self.topic.clone(),
            });
        }
        while self.buffer.is_empty() && !self.end_of_stream {
            let Some(source) = self.source.as_mut() else {
                self.end_of_stream = true;
                break;
            };
            match source.next_batch().await {
                Ok(Some(batch)) => {
                    if batch.tag() != self.ontology_tag {
                        self.poisoned = true;
                        return Err(ClientError::Data(format!(
                            "topic '{}' carries '{}' but batch is tagged '{}'",
                            self.topic,
                            self.ontology_tag,
                            batch.tag()
                        )));
                    }
                    trace!(
                        topic = %self.topic,
                        rows = batch.row_count(),
                        bytes = batch.size_bytes(),
                        "Fetched batch"
                    );
                    self.buffer.extend(batch.into_rows());
                }
                Ok(None) => {
                    self.end_of_stream = true;
                    // Release the channel eagerly; the buffer may still
                    // hold the tail rows.
                    let mut source = match self.source.take() {
                        Some(source) => source,
                        None => break,
                    };
                    let _ = source.close().await;
                }
                Err(error) => {
                    self.poisoned = true;
                    if error.code == TransportCode::Cancelled {
                        return Err(ClientError::Cancelled);
                    }
                    return Err(ClientError::TopicStream {
                        topic: self.topic.clone(),
                        source: error,
                    });
                }
            }
        }
        Ok(())
    }

    /// Next message, or `Ok(None)` at end-of-stream.
    pub async fn next(&mut self) -> Result<Option<Message>> {
        self.fill().await?;
        let Some(message) = self.buffer.pop_front() else {
            return Ok(None);
        };
        if let Some(last) = self.last_timestamp {
            if message.timestamp_ns < last {
                self.poisoned = true;
                return Err(ClientError::Data(format!(
                    "timestamp regression on topic '{}': {} after {}",
                    self.topic, message.timestamp_ns, last
                )));
            }
        }
        self.last_timestamp = Some(message.timestamp_ns);
        Ok(Some(message))
    }

    /// Timestamp of the head message without consuming it; fetches a batch
    /// when the buffer is empty. `Ok(None)` at end-of-stream.
    pub async fn next_timestamp(&mut self) -> Result<Option<i64>> {
        self.fill().await?;
        Ok(self.buffer.front().map(|message| message.timestamp_ns))
    }

    /// Releases the transport channel. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut source) = self.source.take() {
            source.close().await.map_err(ClientError::from)?;
        }
        self.end_of_stream = true;
        Ok(())
    }
}
