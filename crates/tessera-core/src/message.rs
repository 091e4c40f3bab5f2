//! Message - the unit of ingestion and delivery.
//!
//! Each message carries:
//! - `timestamp_ns`: platform reception time, signed nanoseconds since the
//!   epoch; the ordering key for every streamer
//! - `header`: optional data-generation stamp plus a frame id
//! - `data`: one ontology payload, decoded to its dynamic record shape
//!
//! The payload travels as an [`OntologyRecord`]: the stable ontology tag plus
//! the record's `Value` tree. Typed encode/decode lives in
//! `tessera-ontology`; this type stays payload-agnostic so record batches can
//! move through the transport without generic plumbing.

use crate::codec;
use crate::time::Time;
use crate::value::Value;

/// Optional per-message header with the data-generation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    /// When the data was generated at the source.
    pub stamp: Time,
    /// Frame of reference the data is expressed in (may be empty).
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Time, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// A tagged dynamic payload conforming to one ontology schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OntologyRecord {
    /// Stable ontology tag identifying the record schema.
    pub tag: String,
    /// Decoded record value (a map of field name to cell).
    pub value: Value,
}

impl OntologyRecord {
    pub fn new(tag: impl Into<String>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }
}

/// One record: reception timestamp, optional header, typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Platform reception time in nanoseconds since the epoch.
    pub timestamp_ns: i64,
    /// Optional data-generation header.
    pub header: Option<Header>,
    /// Ontology payload.
    pub data: OntologyRecord,
}

impl Message {
    pub fn new(timestamp_ns: i64, header: Option<Header>, data: OntologyRecord) -> Self {
        Self {
            timestamp_ns,
            header,
            data,
        }
    }

    /// Estimated encoded size of this message on the wire.
    ///
    /// Used by the write path for batch byte accounting; exact for the
    /// current codec.
    pub fn encoded_size(&self) -> usize {
        codec::message_encoded_len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn scalar_record(v: f64) -> OntologyRecord {
        let mut map = BTreeMap::new();
        map.insert("value".to_string(), Value::F64(v));
        OntologyRecord::new("scalar", Value::Map(map))
    }

    #[test]
    fn test_new_without_header() {
        let msg = Message::new(100, None, scalar_record(1.0));
        assert_eq!(msg.timestamp_ns, 100);
        assert!(msg.header.is_none());
        assert_eq!(msg.data.tag, "scalar");
    }

    #[test]
    fn test_new_with_header() {
        let header = Header::new(Time::from_nanos(42), "base_link");
        let msg = Message::new(100, Some(header.clone()), scalar_record(2.0));
        assert_eq!(msg.header, Some(header));
    }

    #[test]
    fn test_encoded_size_grows_with_payload() {
        let small = Message::new(1, None, scalar_record(1.0));
        let big = Message::new(
            1,
            Some(Header::new(Time::from_nanos(1), "a-much-longer-frame-id")),
            scalar_record(1.0),
        );
        assert!(big.encoded_size() > small.encoded_size());
    }
}
