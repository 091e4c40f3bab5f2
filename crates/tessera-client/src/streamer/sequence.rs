//! K-way merge over all topic streamers of a sequence.
//!
//! An explicit min-heap keyed `(timestamp_ns, topic)` keeps the merge at
//! O(log N) per yielded message across N topics - not a recursive merge.
//! Ties break deterministically by ascending topic path, so the merged
//! timeline is a total order.
//!
//! At initialization every topic streamer is polled for its head timestamp;
//! empty topics are left out of the heap permanently. Each pop pulls the
//! head message of the winning topic and re-inserts the topic with its new
//! lookahead timestamp. The memory contract follows from the children: one
//! resident batch per topic, nothing pre-buffered by the merge itself.

use crate::error::{ClientError, Result};
use crate::streamer::topic::TopicDataStreamer;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tessera_core::Message;
use tracing::debug;

#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
    timestamp_ns: i64,
    topic: String,
}

impl Ord for HeapEntry {
    // Reversed so the std max-heap pops the smallest (timestamp, topic).
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp_ns
            .cmp(&self.timestamp_ns)
            .then_with(|| other.topic.cmp(&self.topic))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Chronologically merged view over all topics of a sequence.
///
/// Yields `(topic, message)` pairs in non-decreasing `timestamp_ns` order.
/// A failure on any child aborts the merge with the offending topic name;
/// messages already returned remain valid.
pub struct SequenceDataStreamer {
    streamers: BTreeMap<String, TopicDataStreamer>,
    heap: BinaryHeap<HeapEntry>,
    /// Topic whose failure aborted the merge.
    failed: Option<String>,
}

impl SequenceDataStreamer {
    /// Primes the heap with each topic's head timestamp.
    pub(crate) async fn open(streamers: Vec<TopicDataStreamer>) -> Result<Self> {
        let mut map = BTreeMap::new();
        let mut heap = BinaryHeap::with_capacity(streamers.len());
        for mut streamer in streamers {
            let topic = streamer.topic().to_string();
            match streamer.next_timestamp().await {
                Ok(Some(timestamp_ns)) => heap.push(HeapEntry {
                    timestamp_ns,
                    topic: topic.clone(),
                }),
                // Empty topics never enter the heap.
                Ok(None) => {}
                Err(err) => return Err(err),
            }
            map.insert(topic, streamer);
        }
        debug!(topics = map.len(), active = heap.len(), "Sequence streamer opened");
        Ok(Self {
            streamers: map,
            heap,
            failed: None,
        })
    }

    /// Number of topics that still have messages pending.
    pub fn active_topics(&self) -> usize {
        self.heap.len()
    }

    /// Next `(topic, message)` in the merged timeline, or `Ok(None)` when
    /// every topic is exhausted.
    pub async fn next(&mut self) -> Result<Option<(String, Message)>> {
        if let Some(topic) = &self.failed {
            return Err(ClientError::StreamerPoisoned {
                topic: topic.clone(),
            });
        }
        let Some(entry) = self.heap.pop() else {
            return Ok(None);
        };
        let streamer = self.streamers.get_mut(&entry.topic).ok_or_else(|| {
            ClientError::Internal(format!("no streamer for heap topic '{}'", entry.topic))
        })?;

        let message = match streamer.next().await {
            Ok(Some(message)) => message,
            Ok(None) => {
                self.failed = Some(entry.topic.clone());
                return Err(ClientError::Internal(format!(
                    "topic '{}' drained behind its lookahead",
                    entry.topic
                )));
            }
            Err(err) => {
                self.failed = Some(entry.topic.clone());
                return Err(err);
            }
        };
        debug_assert_eq!(message.timestamp_ns, entry.timestamp_ns);

        match streamer.next_timestamp().await {
            Ok(Some(timestamp_ns)) => self.heap.push(HeapEntry {
                timestamp_ns,
                topic: entry.topic.clone(),
            }),
            // Exhausted: the topic leaves the heap permanently.
            Ok(None) => {}
            Err(err) => {
                self.failed = Some(entry.topic.clone());
                return Err(err);
            }
        }

        Ok(Some((entry.topic, message)))
    }

    /// Timestamp at the heap root without consuming anything; `None` when
    /// the merge is exhausted.
    pub fn next_timestamp(&self) -> Option<i64> {
        self.heap.peek().map(|entry| entry.timestamp_ns)
    }

    /// Closes every child streamer. Idempotent; the first close error is
    /// reported after all children were released.
    pub async fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for streamer in self.streamers.values_mut() {
            if let Err(err) = streamer.close().await {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        self.heap.clear();
        match first_error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}
