//! Process-wide ontology registry.
//!
//! The registry resolves a stable tag string to its schema descriptor. It is
//! populated once per process: built-ins on first access, custom types via
//! [`register`]. Lookups after that point see an effectively immutable table,
//! which is what lets catalog queries build typed field trees from a tag
//! string alone.

use crate::error::OntologyError;
use crate::ontology::Ontology;
use crate::schema::Schema;
use crate::sensors::{CompressedImage, Gps, Imu, Magnetometer, Scalar};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

static REGISTRY: OnceLock<RwLock<HashMap<&'static str, Schema>>> = OnceLock::new();

fn table() -> &'static RwLock<HashMap<&'static str, Schema>> {
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(Gps::TAG, Gps::schema());
        map.insert(Imu::TAG, Imu::schema());
        map.insert(Magnetometer::TAG, Magnetometer::schema());
        map.insert(CompressedImage::TAG, CompressedImage::schema());
        map.insert(Scalar::TAG, Scalar::schema());
        RwLock::new(map)
    })
}

/// Registers an ontology type.
///
/// Re-registering the same type is a no-op; registering a different schema
/// under an existing tag fails with `ConflictingTag`.
pub fn register<T: Ontology>() -> Result<(), OntologyError> {
    let schema = T::schema();
    let mut map = match table().write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    match map.get(T::TAG) {
        Some(existing) if *existing == schema => Ok(()),
        Some(_) => Err(OntologyError::ConflictingTag(T::TAG.to_string())),
        None => {
            map.insert(T::TAG, schema);
            Ok(())
        }
    }
}

/// Resolves a tag to its schema.
pub fn schema_of(tag: &str) -> Result<Schema, OntologyError> {
    let map = match table().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(tag)
        .cloned()
        .ok_or_else(|| OntologyError::UnknownTag(tag.to_string()))
}

/// Whether a tag is known to the registry.
pub fn is_registered(tag: &str) -> bool {
    let map = match table().read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.contains_key(tag)
}
