//! Record batches - the columnar transport unit.
//!
//! A `RecordBatch` packs an ordered run of messages for one topic (one
//! ontology tag) for transmission. The write path accumulates messages in a
//! [`RecordBatchBuilder`] bounded by byte and record thresholds; either
//! threshold tripping hands the batch to the background flusher and starts a
//! fresh one.
//!
//! Ordering invariant: rows keep the order they were appended in, and the
//! single-flusher-per-topic write path preserves batch order end to end.

use crate::message::Message;

/// An immutable, ordered run of messages for one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    tag: String,
    rows: Vec<Message>,
    size_bytes: usize,
}

impl RecordBatch {
    pub fn new(tag: impl Into<String>, rows: Vec<Message>) -> Self {
        let size_bytes = rows.iter().map(Message::encoded_size).sum();
        Self {
            tag: tag.into(),
            rows,
            size_bytes,
        }
    }

    /// Ontology tag shared by every row in this batch.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn rows(&self) -> &[Message] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Message> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Estimated encoded payload size.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Accumulates messages until a byte or record threshold trips.
#[derive(Debug)]
pub struct RecordBatchBuilder {
    tag: String,
    rows: Vec<Message>,
    size_bytes: usize,
    max_batch_size_bytes: usize,
    max_batch_size_records: usize,
}

impl RecordBatchBuilder {
    pub fn new(
        tag: impl Into<String>,
        max_batch_size_bytes: usize,
        max_batch_size_records: usize,
    ) -> Self {
        Self {
            tag: tag.into(),
            rows: Vec::new(),
            size_bytes: 0,
            max_batch_size_bytes,
            max_batch_size_records,
        }
    }

    /// Appends a message, keeping the running byte total current.
    pub fn push(&mut self, message: Message) {
        self.size_bytes += message.encoded_size();
        self.rows.push(message);
    }

    /// True when either the byte or the record threshold has been reached.
    pub fn should_flush(&self) -> bool {
        if self.rows.is_empty() {
            return false;
        }
        self.rows.len() >= self.max_batch_size_records
            || self.size_bytes >= self.max_batch_size_bytes
    }

    /// Takes the accumulated rows as a batch and resets the builder.
    pub fn drain(&mut self) -> RecordBatch {
        let rows = std::mem::take(&mut self.rows);
        let size_bytes = std::mem::take(&mut self.size_bytes);
        RecordBatch {
            tag: self.tag.clone(),
            rows,
            size_bytes,
        }
    }

    /// Discards the accumulated rows without producing a batch.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.size_bytes = 0;
    }

    /// Puts a drained batch back in front of the buffered rows.
    ///
    /// Used when the work queue refuses a batch: nothing is lost, the rows
    /// simply stay pending until the queue drains.
    pub fn refill(&mut self, batch: RecordBatch) {
        let mut rows = batch.rows;
        self.size_bytes += batch.size_bytes;
        rows.append(&mut self.rows);
        self.rows = rows;
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::OntologyRecord;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn msg(ts: i64) -> Message {
        let mut map = BTreeMap::new();
        map.insert("value".to_string(), Value::F64(ts as f64));
        Message::new(ts, None, OntologyRecord::new("scalar", Value::Map(map)))
    }

    #[test]
    fn test_flush_on_record_count() {
        let mut builder = RecordBatchBuilder::new("scalar", 1024 * 1024, 2);
        builder.push(msg(1));
        assert!(!builder.should_flush());
        builder.push(msg(2));
        assert!(builder.should_flush());
    }

    #[test]
    fn test_flush_on_bytes() {
        let one = msg(1).encoded_size();
        let mut builder = RecordBatchBuilder::new("scalar", one * 3, 1000);
        builder.push(msg(1));
        builder.push(msg(2));
        assert!(!builder.should_flush());
        builder.push(msg(3));
        assert!(builder.should_flush());
    }

    #[test]
    fn test_drain_resets_and_preserves_order() {
        let mut builder = RecordBatchBuilder::new("scalar", 1024, 100);
        builder.push(msg(10));
        builder.push(msg(20));
        let batch = builder.drain();
        assert!(builder.is_empty());
        assert_eq!(builder.size_bytes(), 0);
        assert_eq!(batch.row_count(), 2);
        assert_eq!(batch.rows()[0].timestamp_ns, 10);
        assert_eq!(batch.rows()[1].timestamp_ns, 20);
    }

    #[test]
    fn test_empty_builder_never_flushes() {
        let builder = RecordBatchBuilder::new("scalar", 0, 0);
        assert!(!builder.should_flush());
    }

    #[test]
    fn test_clear_discards_rows() {
        let mut builder = RecordBatchBuilder::new("scalar", 1024, 100);
        builder.push(msg(1));
        builder.clear();
        assert!(builder.is_empty());
        assert!(builder.drain().is_empty());
    }
}
