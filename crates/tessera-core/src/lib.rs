//! Tessera Core - shared types and wire codec
//!
//! This crate defines the leaf types shared by every Tessera component:
//!
//! - `Message` / `Header` / `Time`: the unit of ingestion and delivery
//! - `Value` / `OntologyRecord`: the dynamic payload representation
//! - `RecordBatch`: the columnar transport unit (messages packed for one topic)
//! - the binary codec framing record batches for the push/pull channel
//! - topic and sequence name handling (normalization, full-path packing)
//!
//! Higher layers (`tessera-ontology`, `tessera-client`) build typed payloads
//! and the read/write pipelines on top of these types.

pub mod batch;
pub mod codec;
pub mod error;
pub mod message;
pub mod time;
pub mod topic;
pub mod value;

pub use batch::{RecordBatch, RecordBatchBuilder};
pub use error::{Error, Result};
pub use message::{Header, Message, OntologyRecord};
pub use time::Time;
pub use value::Value;
