//! Built-in sensor ontologies.
//!
//! A representative catalog of payload types for robotics recording:
//! GPS fixes, IMU samples, magnetometer readings, compressed images and
//! plain scalar channels. Each type is a plain struct implementing
//! [`Ontology`]; the registry knows all of them by tag out of the box.

use crate::error::OntologyError;
use crate::geometry::{Quaternion, Vector3};
use crate::ontology::{read, Ontology};
use crate::schema::{Field, FieldType, Schema};
use bytes::Bytes;
use std::collections::BTreeMap;
use tessera_core::Value;

/// Fix status information attached to a GPS reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GpsStatus {
    /// Fix status (no fix, fix, with augmentation, ...).
    pub status: i64,
    /// Positioning service in use (GPS, GLONASS, ...).
    pub service: i64,
}

impl GpsStatus {
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("status", FieldType::I64),
            Field::new("service", FieldType::I64),
        ])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("status".to_string(), Value::I64(self.status));
        map.insert("service".to_string(), Value::I64(self.service));
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            status: read::i64(value, "status")?,
            service: read::i64(value, "service")?,
        })
    }
}

/// A GPS fix.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub status: GpsStatus,
}

impl Ontology for Gps {
    const TAG: &'static str = "gps";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("latitude", FieldType::F64),
            Field::new("longitude", FieldType::F64),
            Field::new("altitude", FieldType::F64),
            Field::new("status", FieldType::Nested(GpsStatus::schema())),
        ])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("latitude".to_string(), Value::F64(self.latitude));
        map.insert("longitude".to_string(), Value::F64(self.longitude));
        map.insert("altitude".to_string(), Value::F64(self.altitude));
        map.insert("status".to_string(), self.status.to_value());
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            latitude: read::f64(value, "latitude")?,
            longitude: read::f64(value, "longitude")?,
            altitude: read::f64(value, "altitude")?,
            status: GpsStatus::from_value(read::nested(value, "status")?)?,
        })
    }
}

/// An inertial measurement sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Imu {
    pub orientation: Quaternion,
    pub angular_velocity: Vector3,
    pub acceleration: Vector3,
}

impl Ontology for Imu {
    const TAG: &'static str = "imu";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("orientation", FieldType::Nested(Quaternion::schema())),
            Field::new("angular_velocity", FieldType::Nested(Vector3::schema())),
            Field::new("acceleration", FieldType::Nested(Vector3::schema())),
        ])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("orientation".to_string(), self.orientation.to_value());
        map.insert(
            "angular_velocity".to_string(),
            self.angular_velocity.to_value(),
        );
        map.insert("acceleration".to_string(), self.acceleration.to_value());
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            orientation: Quaternion::from_value(read::nested(value, "orientation")?)?,
            angular_velocity: Vector3::from_value(read::nested(value, "angular_velocity")?)?,
            acceleration: Vector3::from_value(read::nested(value, "acceleration")?)?,
        })
    }
}

/// A magnetometer reading in teslas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Magnetometer {
    pub magnetic_field: Vector3,
}

impl Ontology for Magnetometer {
    const TAG: &'static str = "magnetometer";

    fn schema() -> Schema {
        Schema::new(vec![Field::new(
            "magnetic_field",
            FieldType::Nested(Vector3::schema()),
        )])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("magnetic_field".to_string(), self.magnetic_field.to_value());
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            magnetic_field: Vector3::from_value(read::nested(value, "magnetic_field")?)?,
        })
    }
}

/// An encoded camera frame.
///
/// The pixel payload is an opaque blob and therefore not queryable; the
/// format string is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompressedImage {
    /// Encoding of the payload ("jpeg", "png", ...).
    pub format: String,
    pub data: Bytes,
}

impl Ontology for CompressedImage {
    const TAG: &'static str = "compressed_image";

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("format", FieldType::String),
            Field::new("data", FieldType::Bytes),
        ])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("format".to_string(), Value::Str(self.format.clone()));
        map.insert("data".to_string(), Value::Bytes(self.data.clone()));
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            format: read::string(value, "format")?,
            data: read::bytes(value, "data")?,
        })
    }
}

/// A single scalar channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scalar {
    pub value: f64,
}

impl Scalar {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Ontology for Scalar {
    const TAG: &'static str = "scalar";

    fn schema() -> Schema {
        Schema::new(vec![Field::new("value", FieldType::F64)])
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("value".to_string(), Value::F64(self.value));
        Value::Map(map)
    }

    fn from_value(value: &Value) -> Result<Self, OntologyError> {
        Ok(Self {
            value: read::f64(value, "value")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_roundtrip() {
        let fix = Gps {
            latitude: 45.07,
            longitude: 7.69,
            altitude: 240.0,
            status: GpsStatus {
                status: 1,
                service: 2,
            },
        };
        let record = fix.into_record();
        assert_eq!(record.tag, "gps");
        assert_eq!(Gps::from_record(&record).unwrap(), fix);
    }

    #[test]
    fn test_imu_roundtrip() {
        let sample = Imu {
            orientation: Quaternion::default(),
            angular_velocity: Vector3::new(0.1, 0.2, 0.3),
            acceleration: Vector3::new(0.0, 0.0, 9.81),
        };
        let record = sample.into_record();
        assert_eq!(Imu::from_record(&record).unwrap(), sample);
    }

    #[test]
    fn test_from_record_rejects_wrong_tag() {
        let record = Scalar::new(1.0).into_record();
        let err = Gps::from_record(&record).unwrap_err();
        assert!(matches!(err, OntologyError::TagMismatch { .. }));
    }

    #[test]
    fn test_compressed_image_keeps_blob() {
        let img = CompressedImage {
            format: "jpeg".to_string(),
            data: Bytes::from_static(b"\xff\xd8\xff"),
        };
        let back = CompressedImage::from_record(&img.clone().into_record()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_scalar_message_helper() {
        let msg = Scalar::new(2.5).into_message(100);
        assert_eq!(msg.timestamp_ns, 100);
        assert_eq!(msg.data.tag, "scalar");
        assert_eq!(msg.data.value.get_path("value"), Some(&Value::F64(2.5)));
    }

    #[test]
    fn test_image_blob_not_in_leaf_paths() {
        let leaves = CompressedImage::schema().leaf_paths();
        assert!(leaves.iter().any(|(p, _)| p == "format"));
        assert!(leaves.iter().all(|(p, _)| p != "data"));
    }
}
