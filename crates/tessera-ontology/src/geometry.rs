//! Geometric value types nested inside sensor payloads.
//!
//! These are not ontologies themselves; they appear as nested record fields
//! (e.g. IMU acceleration) and carry their own sub-schema.

use crate::error::OntologyError;
use crate::ontology::read;
use crate::schema::{Field, FieldType, Schema};
use std::collections::BTreeMap;
use tessera_core::Value;

/// A 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn schema() -> Schema {
        Schema::new(vec![
            Field::new("x", FieldType::F64),
            Field::new("y", FieldType::F64),
            Field::new("z", FieldType::F64),
        ])
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::F64(self.x));
        map.insert("y".to_string(), Value::F64(self.y));
        map.insert("z".to_string(), Value::F64(self.z));
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            x: read::f64(value, "x")?,
            y: read::f64(value, "y")?,
            z: read::f64(value, "z")?,
        })
    }
}

/// A unit quaternion orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn schema() -> Schema {
        Schema::new(vec![
            Field::new("x", FieldType::F64),
            Field::new("y", FieldType::F64),
            Field::new("z", FieldType::F64),
            Field::new("w", FieldType::F64),
        ])
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Value::F64(self.x));
        map.insert("y".to_string(), Value::F64(self.y));
        map.insert("z".to_string(), Value::F64(self.z));
        map.insert("w".to_string(), Value::F64(self.w));
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            x: read::f64(value, "x")?,
            y: read::f64(value, "y")?,
            z: read::f64(value, "z")?,
            w: read::f64(value, "w")?,
        })
    }
}

/// A position plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub fn schema() -> Schema {
        Schema::new(vec![
            Field::new("position", FieldType::Nested(Vector3::schema())),
            Field::new("orientation", FieldType::Nested(Quaternion::schema())),
        ])
    }

    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("position".to_string(), self.position.to_value());
        map.insert("orientation".to_string(), self.orientation.to_value());
        Value::Map(map)
    }

    pub fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            position: Vector3::from_value(read::nested(value, "position")?)?,
            orientation: Quaternion::from_value(read::nested(value, "orientation")?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector3_roundtrip() {
        let v = Vector3::new(1.0, -2.0, 0.5);
        assert_eq!(Vector3::from_value(&v.to_value()).unwrap(), v);
    }

    #[test]
    fn test_quaternion_default_is_identity() {
        let q = Quaternion::default();
        assert_eq!(q.w, 1.0);
        assert_eq!(Quaternion::from_value(&q.to_value()).unwrap(), q);
    }

    #[test]
    fn test_pose_roundtrip() {
        let pose = Pose::new(
            Vector3::new(1.0, 2.0, 0.0),
            Quaternion::new(0.0, 0.0, 0.7071, 0.7071),
        );
        assert_eq!(Pose::from_value(&pose.to_value()).unwrap(), pose);
    }

    #[test]
    fn test_pose_schema_exposes_nested_leaves() {
        let leaves = Pose::schema().leaf_paths();
        assert!(leaves
            .iter()
            .any(|(path, _)| path == "position.x"));
        assert!(leaves
            .iter()
            .any(|(path, _)| path == "orientation.w"));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let err = Vector3::from_value(&Value::Map(Default::default())).unwrap_err();
        assert!(matches!(err, OntologyError::MissingField(f) if f == "x"));

        let err = Pose::from_value(&Value::Map(Default::default())).unwrap_err();
        assert!(matches!(err, OntologyError::MissingField(f) if f == "position"));
    }
}
