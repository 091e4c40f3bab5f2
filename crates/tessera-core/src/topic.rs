//! Topic and sequence name handling.
//!
//! Topic names are accepted with or without a leading `/` and always stored
//! and returned in the canonical form `"/" + name`. Full resource paths pack
//! the owning sequence in front of the canonical topic name
//! (`"{sequence}{topic}"`); query responses unpack them back to relative
//! topic paths. Sequence names must not contain `/`.

use crate::error::{Error, Result};

/// Normalizes a topic name to its canonical leading-`/` form.
///
/// Idempotent: `normalize_topic_name(normalize_topic_name(x)) ==
/// normalize_topic_name(x)`. Repeated leading slashes collapse to one.
pub fn normalize_topic_name(name: &str) -> Result<String> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidTopicName(name.to_string()));
    }
    Ok(format!("/{trimmed}"))
}

/// Validates a sequence name: non-empty, no `/` anywhere.
pub fn validate_sequence_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidSequenceName(name.to_string()));
    }
    if name.contains('/') {
        return Err(Error::InvalidSequenceName(name.to_string()));
    }
    Ok(())
}

/// Packs a sequence name and a topic name into a full resource path.
pub fn pack_topic_full_path(sequence: &str, topic: &str) -> Result<String> {
    validate_sequence_name(sequence)?;
    let topic = normalize_topic_name(topic)?;
    Ok(format!("{sequence}{topic}"))
}

/// Unpacks a full resource path into `(sequence, topic)`.
///
/// The returned topic is relative and guaranteed to start with `/`.
pub fn unpack_topic_full_path(full_path: &str) -> Result<(String, String)> {
    let slash = full_path
        .find('/')
        .ok_or_else(|| Error::InvalidTopicName(full_path.to_string()))?;
    if slash == 0 {
        // No sequence prefix present.
        return Err(Error::InvalidTopicName(full_path.to_string()));
    }
    let (sequence, topic) = full_path.split_at(slash);
    Ok((sequence.to_string(), normalize_topic_name(topic)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_leading_slash() {
        assert_eq!(normalize_topic_name("imu/front").unwrap(), "/imu/front");
        assert_eq!(normalize_topic_name("/imu/front").unwrap(), "/imu/front");
        assert_eq!(normalize_topic_name("//imu").unwrap(), "/imu");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_topic_name("a/b").unwrap();
        let twice = normalize_topic_name(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(normalize_topic_name("").is_err());
        assert!(normalize_topic_name("/").is_err());
    }

    #[test]
    fn test_sequence_name_rejects_slash() {
        assert!(validate_sequence_name("run-2026-02-11").is_ok());
        assert!(validate_sequence_name("invalid/name").is_err());
        assert!(validate_sequence_name("/invalid").is_err());
        assert!(validate_sequence_name("").is_err());
    }

    #[test]
    fn test_pack_unpack_roundtrip() {
        let full = pack_topic_full_path("seq1", "imu/front").unwrap();
        assert_eq!(full, "seq1/imu/front");
        let (seq, topic) = unpack_topic_full_path(&full).unwrap();
        assert_eq!(seq, "seq1");
        assert_eq!(topic, "/imu/front");
    }

    #[test]
    fn test_unpack_rejects_missing_sequence() {
        assert!(unpack_topic_full_path("/topic-only").is_err());
        assert!(unpack_topic_full_path("no-slash").is_err());
    }
}
