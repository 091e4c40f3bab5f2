//! Split-second timestamp used by message headers.
//!
//! `Time` carries the data-generation instant as `{sec, nanosec}`, the shape
//! most robotics middlewares stamp their messages with. The platform
//! reception timestamp on `Message` stays a flat `i64` nanosecond count; this
//! type only appears inside the optional header.

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A `{sec, nanosec}` timestamp relative to the Unix epoch.
///
/// `nanosec` is always normalized into `[0, 1_000_000_000)`; times before the
/// epoch are represented with a negative `sec` and a positive `nanosec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time {
    pub sec: i64,
    pub nanosec: i32,
}

impl Time {
    pub fn new(sec: i64, nanosec: i32) -> Self {
        Self::from_nanos(sec.saturating_mul(NANOS_PER_SEC).saturating_add(nanosec as i64))
    }

    /// Builds a `Time` from a flat nanosecond count since the epoch.
    pub fn from_nanos(nanos: i64) -> Self {
        Self {
            sec: nanos.div_euclid(NANOS_PER_SEC),
            nanosec: nanos.rem_euclid(NANOS_PER_SEC) as i32,
        }
    }

    /// Builds a `Time` from fractional seconds since the epoch.
    pub fn from_float(seconds: f64) -> Self {
        Self::from_nanos((seconds * NANOS_PER_SEC as f64).round() as i64)
    }

    /// Flat nanosecond count since the epoch.
    pub fn as_nanos(&self) -> i64 {
        self.sec * NANOS_PER_SEC + self.nanosec as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_nanos_roundtrip() {
        let t = Time::from_nanos(1_700_000_000_260_000_000);
        assert_eq!(t.sec, 1_700_000_000);
        assert_eq!(t.nanosec, 260_000_000);
        assert_eq!(t.as_nanos(), 1_700_000_000_260_000_000);
    }

    #[test]
    fn test_from_float() {
        let t = Time::from_float(1_700_000_000.26);
        assert_eq!(t.sec, 1_700_000_000);
        // 0.26s within float rounding of the nanosecond field
        assert!((t.nanosec - 260_000_000).abs() < 1_000);
    }

    #[test]
    fn test_negative_nanos_normalized() {
        let t = Time::from_nanos(-1);
        assert_eq!(t.sec, -1);
        assert_eq!(t.nanosec, 999_999_999);
        assert_eq!(t.as_nanos(), -1);
    }

    #[test]
    fn test_new_normalizes_overflowing_nanosec() {
        let t = Time::new(1, 1_500_000_000);
        assert_eq!(t.sec, 2);
        assert_eq!(t.nanosec, 500_000_000);
    }
}
