//! Error types for ontology registration and payload decoding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OntologyError {
    /// Payload tag does not match the expected ontology.
    #[error("ontology tag mismatch: expected '{expected}', found '{found}'")]
    TagMismatch { expected: String, found: String },

    /// A schema field is absent from the decoded record.
    #[error("missing field '{0}' in record")]
    MissingField(String),

    /// A field decoded to a different primitive than the schema declares.
    #[error("wrong type for field '{0}'")]
    WrongType(String),

    /// A different schema is already registered under this tag.
    #[error("ontology tag '{0}' already registered with a different schema")]
    ConflictingTag(String),

    /// No schema registered under this tag.
    #[error("unknown ontology tag '{0}'")]
    UnknownTag(String),
}
