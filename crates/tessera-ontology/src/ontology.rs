//! The `Ontology` trait - the contract every payload type fulfils.

use crate::error::OntologyError;
use crate::schema::Schema;
use tessera_core::{Header, Message, OntologyRecord, Value};

/// A record type with a stable tag, a schema descriptor, and encode/decode
/// to the dynamic record shape used on the wire.
///
/// All messages on a topic share one ontology; the topic's tag is fixed at
/// `topic_create` time and every push validates the payload tag against it.
///
/// Implementations are plain data structs; see `sensors::Gps` for the
/// canonical shape. Custom types register with [`crate::registry::register`]
/// so catalog queries can resolve their schema by tag string.
pub trait Ontology: Sized + Send + 'static {
    /// Stable tag identifying this record schema on the platform.
    const TAG: &'static str;

    /// Schema descriptor enumerating field paths with primitive type tags.
    fn schema() -> Schema;

    /// Encodes this payload into its dynamic record value (a field map).
    fn to_value(&self) -> Value;

    /// Decodes a dynamic record value back into the typed payload.
    fn from_value(value: &Value) -> Result<Self, OntologyError>;

    /// Wraps this payload into a tagged record.
    fn into_record(self) -> OntologyRecord {
        OntologyRecord::new(Self::TAG, self.to_value())
    }

    /// Decodes a tagged record, validating the tag first.
    fn from_record(record: &OntologyRecord) -> Result<Self, OntologyError> {
        if record.tag != Self::TAG {
            return Err(OntologyError::TagMismatch {
                expected: Self::TAG.to_string(),
                found: record.tag.clone(),
            });
        }
        Self::from_value(&record.value)
    }

    /// Builds a message carrying this payload.
    fn into_message(self, timestamp_ns: i64) -> Message {
        Message::new(timestamp_ns, None, self.into_record())
    }

    /// Builds a message carrying this payload and a data-generation header.
    fn into_message_with_header(self, timestamp_ns: i64, header: Header) -> Message {
        Message::new(timestamp_ns, Some(header), self.into_record())
    }
}

/// Field access helpers shared by `from_value` implementations.
pub(crate) mod read {
    use super::*;

    pub fn f64(value: &Value, name: &str) -> Result<f64, OntologyError> {
        value
            .field(name)
            .ok_or_else(|| OntologyError::MissingField(name.to_string()))?
            .as_f64()
            .ok_or_else(|| OntologyError::WrongType(name.to_string()))
    }

    pub fn i64(value: &Value, name: &str) -> Result<i64, OntologyError> {
        value
            .field(name)
            .ok_or_else(|| OntologyError::MissingField(name.to_string()))?
            .as_i64()
            .ok_or_else(|| OntologyError::WrongType(name.to_string()))
    }

    pub fn string(value: &Value, name: &str) -> Result<String, OntologyError> {
        Ok(value
            .field(name)
            .ok_or_else(|| OntologyError::MissingField(name.to_string()))?
            .as_str()
            .ok_or_else(|| OntologyError::WrongType(name.to_string()))?
            .to_string())
    }

    pub fn bytes(value: &Value, name: &str) -> Result<bytes::Bytes, OntologyError> {
        Ok(value
            .field(name)
            .ok_or_else(|| OntologyError::MissingField(name.to_string()))?
            .as_bytes()
            .ok_or_else(|| OntologyError::WrongType(name.to_string()))?
            .clone())
    }

    pub fn nested<'v>(value: &'v Value, name: &str) -> Result<&'v Value, OntologyError> {
        value
            .field(name)
            .ok_or_else(|| OntologyError::MissingField(name.to_string()))
    }
}
