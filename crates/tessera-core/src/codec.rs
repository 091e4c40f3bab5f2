//! Binary wire codec for record-batch channels.
//!
//! ## Stream Layout
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Stream header               │  magic "TSRB" + u16 version
//! ├──────────────────────────────┤
//! │  Frame                       │  uvarint payload_len | payload | crc32
//! │  Frame                       │
//! │  ...                         │
//! ├──────────────────────────────┤
//! │  End-of-stream marker        │  uvarint 0
//! └──────────────────────────────┘
//! ```
//!
//! Each frame payload is one encoded record batch: the ontology tag, a row
//! count, then the rows. Rows encode the message timestamp (zigzag varint),
//! the optional header, and the payload value tree. The CRC32 covers the
//! frame payload; a mismatch surfaces as `Error::CrcMismatch` and poisons the
//! reading streamer.
//!
//! Varints use LEB128 with zigzag mapping for signed values, so the common
//! small deltas and flags stay single-byte.

use crate::batch::RecordBatch;
use crate::error::{Error, Result};
use crate::message::{Header, Message, OntologyRecord};
use crate::time::Time;
use crate::value::Value;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

/// Magic bytes opening every record-batch stream.
pub const STREAM_MAGIC: [u8; 4] = *b"TSRB";
/// Current wire version.
pub const WIRE_VERSION: u16 = 1;

const TAG_NULL: u8 = 0;
const TAG_I64: u8 = 1;
const TAG_F64: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_BYTES: u8 = 5;
const TAG_LIST: u8 = 6;
const TAG_MAP: u8 = 7;

// ---------------------------------------------------------------
// Varint primitives
// ---------------------------------------------------------------

/// Writes an unsigned LEB128 varint.
pub fn put_uvarint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Reads an unsigned LEB128 varint.
pub fn get_uvarint(buf: &mut impl Buf) -> Result<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        if !buf.has_remaining() {
            return Err(Error::Truncated { context: "varint" });
        }
        if shift >= 64 {
            return Err(Error::MalformedBatch("varint overflow".to_string()));
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

/// Encoded length of an unsigned varint.
pub fn uvarint_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    (64 - value.leading_zeros() as usize).div_ceil(7)
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes a signed varint (zigzag + LEB128).
pub fn put_ivarint(buf: &mut impl BufMut, value: i64) {
    put_uvarint(buf, zigzag_encode(value));
}

/// Reads a signed varint (zigzag + LEB128).
pub fn get_ivarint(buf: &mut impl Buf) -> Result<i64> {
    Ok(zigzag_decode(get_uvarint(buf)?))
}

fn ivarint_len(value: i64) -> usize {
    uvarint_len(zigzag_encode(value))
}

// ---------------------------------------------------------------
// Strings and values
// ---------------------------------------------------------------

fn put_str(buf: &mut impl BufMut, s: &str) {
    put_uvarint(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut impl Buf) -> Result<String> {
    let len = get_uvarint(buf)? as usize;
    if buf.remaining() < len {
        return Err(Error::Truncated { context: "string" });
    }
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| Error::MalformedBatch("invalid utf-8".to_string()))
}

fn str_len(s: &str) -> usize {
    uvarint_len(s.len() as u64) + s.len()
}

fn put_value(buf: &mut impl BufMut, value: &Value) {
    match value {
        Value::Null => buf.put_u8(TAG_NULL),
        Value::I64(v) => {
            buf.put_u8(TAG_I64);
            put_ivarint(buf, *v);
        }
        Value::F64(v) => {
            buf.put_u8(TAG_F64);
            buf.put_f64(*v);
        }
        Value::Bool(v) => {
            buf.put_u8(TAG_BOOL);
            buf.put_u8(u8::from(*v));
        }
        Value::Str(v) => {
            buf.put_u8(TAG_STR);
            put_str(buf, v);
        }
        Value::Bytes(v) => {
            buf.put_u8(TAG_BYTES);
            put_uvarint(buf, v.len() as u64);
            buf.put_slice(v);
        }
        Value::List(items) => {
            buf.put_u8(TAG_LIST);
            put_uvarint(buf, items.len() as u64);
            for item in items {
                put_value(buf, item);
            }
        }
        Value::Map(map) => {
            buf.put_u8(TAG_MAP);
            put_uvarint(buf, map.len() as u64);
            for (key, item) in map {
                put_str(buf, key);
                put_value(buf, item);
            }
        }
    }
}

fn get_value(buf: &mut impl Buf) -> Result<Value> {
    if !buf.has_remaining() {
        return Err(Error::Truncated { context: "value tag" });
    }
    match buf.get_u8() {
        TAG_NULL => Ok(Value::Null),
        TAG_I64 => Ok(Value::I64(get_ivarint(buf)?)),
        TAG_F64 => {
            if buf.remaining() < 8 {
                return Err(Error::Truncated { context: "f64" });
            }
            Ok(Value::F64(buf.get_f64()))
        }
        TAG_BOOL => {
            if !buf.has_remaining() {
                return Err(Error::Truncated { context: "bool" });
            }
            Ok(Value::Bool(buf.get_u8() != 0))
        }
        TAG_STR => Ok(Value::Str(get_str(buf)?)),
        TAG_BYTES => {
            let len = get_uvarint(buf)? as usize;
            if buf.remaining() < len {
                return Err(Error::Truncated { context: "bytes" });
            }
            Ok(Value::Bytes(buf.copy_to_bytes(len)))
        }
        TAG_LIST => {
            let count = get_uvarint(buf)? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(get_value(buf)?);
            }
            Ok(Value::List(items))
        }
        TAG_MAP => {
            let count = get_uvarint(buf)? as usize;
            let mut map = BTreeMap::new();
            for _ in 0..count {
                let key = get_str(buf)?;
                map.insert(key, get_value(buf)?);
            }
            Ok(Value::Map(map))
        }
        other => Err(Error::MalformedBatch(format!("unknown value tag {other}"))),
    }
}

fn value_len(value: &Value) -> usize {
    1 + match value {
        Value::Null => 0,
        Value::I64(v) => ivarint_len(*v),
        Value::F64(_) => 8,
        Value::Bool(_) => 1,
        Value::Str(v) => str_len(v),
        Value::Bytes(v) => uvarint_len(v.len() as u64) + v.len(),
        Value::List(items) => {
            uvarint_len(items.len() as u64) + items.iter().map(value_len).sum::<usize>()
        }
        Value::Map(map) => {
            uvarint_len(map.len() as u64)
                + map
                    .iter()
                    .map(|(k, v)| str_len(k) + value_len(v))
                    .sum::<usize>()
        }
    }
}

// ---------------------------------------------------------------
// Messages and batches
// ---------------------------------------------------------------

fn put_message(buf: &mut impl BufMut, message: &Message) {
    put_ivarint(buf, message.timestamp_ns);
    match &message.header {
        None => buf.put_u8(0),
        Some(header) => {
            buf.put_u8(1);
            put_ivarint(buf, header.stamp.sec);
            put_ivarint(buf, header.stamp.nanosec as i64);
            put_str(buf, &header.frame_id);
        }
    }
    put_value(buf, &message.data.value);
}

fn get_message(buf: &mut impl Buf, tag: &str) -> Result<Message> {
    let timestamp_ns = get_ivarint(buf)?;
    if !buf.has_remaining() {
        return Err(Error::Truncated { context: "header flag" });
    }
    let header = match buf.get_u8() {
        0 => None,
        1 => {
            let sec = get_ivarint(buf)?;
            let nanosec = get_ivarint(buf)? as i32;
            let frame_id = get_str(buf)?;
            Some(Header::new(Time { sec, nanosec }, frame_id))
        }
        other => {
            return Err(Error::MalformedBatch(format!("bad header flag {other}")));
        }
    };
    let value = get_value(buf)?;
    Ok(Message::new(
        timestamp_ns,
        header,
        OntologyRecord::new(tag, value),
    ))
}

/// Exact encoded length of one message row.
pub fn message_encoded_len(message: &Message) -> usize {
    let header_len = match &message.header {
        None => 1,
        Some(h) => {
            1 + ivarint_len(h.stamp.sec) + ivarint_len(h.stamp.nanosec as i64)
                + str_len(&h.frame_id)
        }
    };
    ivarint_len(message.timestamp_ns) + header_len + value_len(&message.data.value)
}

/// Encodes a record batch into its frame payload.
pub fn encode_batch(batch: &RecordBatch) -> Bytes {
    let mut buf = BytesMut::with_capacity(str_len(batch.tag()) + 8 + batch.size_bytes());
    put_str(&mut buf, batch.tag());
    put_uvarint(&mut buf, batch.row_count() as u64);
    for row in batch.rows() {
        put_message(&mut buf, row);
    }
    buf.freeze()
}

/// Decodes a frame payload back into a record batch.
pub fn decode_batch(payload: &[u8]) -> Result<RecordBatch> {
    let mut buf = payload;
    let tag = get_str(&mut buf)?;
    let row_count = get_uvarint(&mut buf)? as usize;
    let mut rows = Vec::with_capacity(row_count.min(4096));
    for _ in 0..row_count {
        rows.push(get_message(&mut buf, &tag)?);
    }
    if buf.has_remaining() {
        return Err(Error::MalformedBatch("trailing bytes after rows".to_string()));
    }
    Ok(RecordBatch::new(tag, rows))
}

// ---------------------------------------------------------------
// Framing
// ---------------------------------------------------------------

/// Frames an encoded batch: `uvarint len | payload | crc32`.
pub fn frame_batch(batch: &RecordBatch) -> Bytes {
    let payload = encode_batch(batch);
    let mut buf = BytesMut::with_capacity(uvarint_len(payload.len() as u64) + payload.len() + 4);
    put_uvarint(&mut buf, payload.len() as u64);
    buf.put_slice(&payload);
    buf.put_u32(crc32fast::hash(&payload));
    buf.freeze()
}

/// The end-of-stream marker: a zero-length frame.
pub fn eos_frame() -> Bytes {
    Bytes::from_static(&[0])
}

/// Reads one frame; `Ok(None)` is the end-of-stream marker.
pub fn read_frame(buf: &mut impl Buf) -> Result<Option<Bytes>> {
    let len = get_uvarint(buf)? as usize;
    if len == 0 {
        return Ok(None);
    }
    if buf.remaining() < len + 4 {
        return Err(Error::Truncated { context: "frame" });
    }
    let payload = buf.copy_to_bytes(len);
    let crc = buf.get_u32();
    if crc != crc32fast::hash(&payload) {
        return Err(Error::CrcMismatch);
    }
    Ok(Some(payload))
}

/// Writes the stream header (magic + version).
pub fn put_stream_header(buf: &mut impl BufMut) {
    buf.put_slice(&STREAM_MAGIC);
    buf.put_u16(WIRE_VERSION);
}

/// Validates the stream header.
pub fn read_stream_header(buf: &mut impl Buf) -> Result<()> {
    if buf.remaining() < 6 {
        return Err(Error::Truncated { context: "stream header" });
    }
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if magic != STREAM_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = buf.get_u16();
    if version > WIRE_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(())
}

/// Encodes a complete stream: header, one frame per batch, EOS marker.
pub fn encode_batch_stream(batches: &[RecordBatch]) -> Bytes {
    let mut buf = BytesMut::new();
    put_stream_header(&mut buf);
    for batch in batches {
        buf.put_slice(&frame_batch(batch));
    }
    buf.put_slice(&eos_frame());
    buf.freeze()
}

/// Decodes a complete stream back into its batches.
pub fn decode_batch_stream(data: &[u8]) -> Result<Vec<RecordBatch>> {
    let mut buf = data;
    read_stream_header(&mut buf)?;
    let mut batches = Vec::new();
    while let Some(payload) = read_frame(&mut buf)? {
        batches.push(decode_batch(&payload)?);
    }
    Ok(batches)
}
