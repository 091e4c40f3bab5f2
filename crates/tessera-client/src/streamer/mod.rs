//! Read path: memory-bounded pull streamers.
//!
//! ```text
//! channel ──batches──▶ TopicDataStreamer ─┐
//! channel ──batches──▶ TopicDataStreamer ─┤──▶ min-heap ──▶ caller
//! channel ──batches──▶ TopicDataStreamer ─┘   (ts, topic)
//! ```
//!
//! Each topic streamer holds at most one record batch; the sequence
//! streamer fuses N topic streams into a single non-decreasing timeline
//! with lookahead, so overall resident memory stays at
//! `topics × per-topic batch budget`.

pub mod sequence;
pub mod topic;

pub use sequence::SequenceDataStreamer;
pub use topic::TopicDataStreamer;
