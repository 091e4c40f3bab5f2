//! Tessera Ontology - payload schemas and the type registry
//!
//! An ontology is a record-type schema identified by a stable tag; every
//! message on a topic shares one ontology. This crate provides:
//!
//! - the [`Ontology`] trait: tag, schema descriptor, encode/decode to the
//!   dynamic record shape used on the wire
//! - [`Schema`] / [`FieldType`]: the descriptor enumerating field paths with
//!   primitive type tags, walked by the query layer to build typed field
//!   trees
//! - the process-wide registry resolving tag → schema
//! - built-in geometry and sensor payloads (GPS, IMU, magnetometer,
//!   compressed images, scalar channels)
//!
//! Custom payloads implement [`Ontology`] and register themselves once with
//! [`registry::register`]; from then on they behave exactly like the
//! built-ins, including catalog queries by tag.

pub mod error;
pub mod geometry;
pub mod ontology;
pub mod registry;
pub mod schema;
pub mod sensors;

pub use error::OntologyError;
pub use geometry::{Pose, Quaternion, Vector3};
pub use ontology::Ontology;
pub use schema::{Field, FieldType, LeafKind, Schema};
pub use sensors::{CompressedImage, Gps, GpsStatus, Imu, Magnetometer, Scalar};
