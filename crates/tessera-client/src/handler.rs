//! Server-resource proxies for reading.
//!
//! Handlers are thin: they hold the metadata fetched at lookup time and act
//! as factories for streamers. Each handler caches one streamer instance;
//! requesting a fresh one (`force_new_instance`) closes the cached streamer
//! and opens new channels. `close()` releases everything the handler holds.

use crate::config::ReaderConfig;
use crate::error::{ClientError, Result};
use crate::streamer::{SequenceDataStreamer, TopicDataStreamer};
use crate::transport::{ChannelDescriptor, SequenceInfo, TopicInfo, Transport};
use std::sync::Arc;
use tracing::debug;

/// Read-side proxy for one topic.
pub struct TopicHandler {
    sequence: String,
    info: TopicInfo,
    reader: ReaderConfig,
    transport: Arc<dyn Transport>,
    cached: Option<TopicDataStreamer>,
}

impl TopicHandler {
    pub(crate) fn new(
        sequence: String,
        info: TopicInfo,
        reader: ReaderConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            sequence,
            info,
            reader,
            transport,
            cached: None,
        }
    }

    /// Relative topic path (leading `/`).
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn topic_info(&self) -> &TopicInfo {
        &self.info
    }

    pub fn user_metadata(&self) -> &serde_json::Value {
        &self.info.user_metadata
    }

    pub fn ontology_tag(&self) -> &str {
        &self.info.ontology_tag
    }

    /// The streamer for this topic, opening a channel on first use.
    ///
    /// `force_new_instance` closes the cached streamer and starts over with
    /// a fresh channel.
    pub async fn data_streamer(&mut self, force_new_instance: bool) -> Result<&mut TopicDataStreamer> {
        if force_new_instance {
            if let Some(mut streamer) = self.cached.take() {
                streamer.close().await?;
            }
        }
        if self.cached.is_none() {
            let source = self
                .transport
                .open_get(
                    ChannelDescriptor::new(&self.sequence, &self.info.name),
                    self.reader.max_batch_bytes,
                )
                .await?;
            self.cached = Some(TopicDataStreamer::new(
                self.info.name.clone(),
                self.info.ontology_tag.clone(),
                source,
            ));
            debug!(sequence = %self.sequence, topic = %self.info.name, "Topic streamer opened");
        }
        self.cached
            .as_mut()
            .ok_or_else(|| ClientError::Internal("topic streamer cache empty".to_string()))
    }

    /// Releases all cached resources. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut streamer) = self.cached.take() {
            streamer.close().await?;
        }
        Ok(())
    }
}

/// Read-side proxy for one sequence and its topics.
pub struct SequenceHandler {
    info: SequenceInfo,
    topics: Vec<TopicInfo>,
    reader: ReaderConfig,
    transport: Arc<dyn Transport>,
    cached: Option<SequenceDataStreamer>,
}

impl SequenceHandler {
    pub(crate) fn new(
        info: SequenceInfo,
        topics: Vec<TopicInfo>,
        reader: ReaderConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            info,
            topics,
            reader,
            transport,
            cached: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn sequence_info(&self) -> &SequenceInfo {
        &self.info
    }

    pub fn user_metadata(&self) -> &serde_json::Value {
        &self.info.user_metadata
    }

    /// Metadata of every topic in this sequence.
    pub fn topics(&self) -> &[TopicInfo] {
        &self.topics
    }

    /// A handler scoped to one of this sequence's topics, by (normalized)
    /// name.
    pub fn topic_handler(&self, name: &str) -> Result<Option<TopicHandler>> {
        let topic = tessera_core::topic::normalize_topic_name(name)?;
        Ok(self.topics.iter().find(|info| info.name == topic).map(|info| {
            TopicHandler::new(
                self.info.name.clone(),
                info.clone(),
                self.reader.clone(),
                Arc::clone(&self.transport),
            )
        }))
    }

    /// The merged streamer over all topics, opening one channel per topic
    /// on first use.
    ///
    /// `force_new_instance` closes the cached streamer and starts over with
    /// fresh channels.
    pub async fn data_streamer(
        &mut self,
        force_new_instance: bool,
    ) -> Result<&mut SequenceDataStreamer> {
        if force_new_instance {
            if let Some(mut streamer) = self.cached.take() {
                streamer.close().await?;
            }
        }
        if self.cached.is_none() {
            let mut streamers = Vec::with_capacity(self.topics.len());
            for info in &self.topics {
                let source = self
                    .transport
                    .open_get(
                        ChannelDescriptor::new(&self.info.name, &info.name),
                        self.reader.max_batch_bytes,
                    )
                    .await?;
                streamers.push(TopicDataStreamer::new(
                    info.name.clone(),
                    info.ontology_tag.clone(),
                    source,
                ));
            }
            self.cached = Some(SequenceDataStreamer::open(streamers).await?);
            debug!(sequence = %self.info.name, topics = self.topics.len(), "Sequence streamer opened");
        }
        self.cached
            .as_mut()
            .ok_or_else(|| ClientError::Internal("sequence streamer cache empty".to_string()))
    }

    /// Releases all cached resources. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut streamer) = self.cached.take() {
            streamer.close().await?;
        }
        Ok(())
    }
}
