//! Value codecs: stored field values, posting payloads, norms, and the
//! meta-column term list.

use memchr::memmem;

use crate::error::{Error, Result};
use crate::index::keys::DELIMITER;
use crate::index::types::{FieldValue, Term};
use crate::utils::encoding::{decode_varint, delta_decode, delta_encode, encode_varint};

/// Trailing tag byte marking a stored value as opaque bytes.
pub const BINARY_TAG: u8 = 0x7F;
/// Trailing tag byte marking a stored value as UTF-8 text.
pub const STRING_TAG: u8 = 0x80;

/// Encode one or more text values into a single tagged column value.
/// Multiple values are joined with the internal delimiter and split back on
/// read.
pub fn encode_text_value(values: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.iter().map(|v| v.len()).sum::<usize>() + 1);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(DELIMITER);
        }
        out.extend_from_slice(value.as_bytes());
    }
    out.push(STRING_TAG);
    out
}

/// Encode an opaque binary value.
pub fn encode_binary_value(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.extend_from_slice(bytes);
    out.push(BINARY_TAG);
    out
}

/// Decode a tagged column value back into its field values.
///
/// An unrecognized tag byte is a data-integrity failure, surfaced as
/// [`Error::CorruptField`]; callers must not substitute a default.
pub fn decode_field_value(field: &str, raw: &[u8]) -> Result<Vec<FieldValue>> {
    let (&tag, payload) = raw
        .split_last()
        .ok_or_else(|| Error::decode("field value", format!("empty value for field {field:?}")))?;

    match tag {
        BINARY_TAG => Ok(vec![FieldValue::Binary(payload.to_vec())]),
        STRING_TAG => {
            let mut values = Vec::new();
            let mut start = 0;
            for hit in memmem::find_iter(payload, DELIMITER) {
                values.push(text_value(field, &payload[start..hit])?);
                start = hit + DELIMITER.len();
            }
            values.push(text_value(field, &payload[start..])?);
            Ok(values)
        }
        other => Err(Error::CorruptField { field: field.to_string(), tag: other }),
    }
}

fn text_value(field: &str, bytes: &[u8]) -> Result<FieldValue> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::decode("field value", format!("non-UTF-8 text in field {field:?}")))?;
    Ok(FieldValue::Text(text.to_string()))
}

/// The structured record stored in one (term row, document) column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingPayload {
    pub freq: u32,
    /// Ascending token positions; empty for presence-only postings.
    pub positions: Vec<u32>,
    /// (start, end) byte offset pairs.
    pub offsets: Vec<(u32, u32)>,
    pub norm: Option<u8>,
}

const FLAG_NORM: u8 = 0b0000_0001;

/// Wire layout: flags byte, varint freq, varint position count,
/// delta-encoded positions, varint offset-pair count, raw varint pairs,
/// then the norm byte when flagged.
pub fn encode_posting(payload: &PostingPayload) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.positions.len() + 2 * payload.offsets.len());
    let flags = if payload.norm.is_some() { FLAG_NORM } else { 0 };
    buf.push(flags);
    encode_varint(payload.freq, &mut buf);
    encode_varint(payload.positions.len() as u32, &mut buf);
    delta_encode(&payload.positions, &mut buf);
    encode_varint(payload.offsets.len() as u32, &mut buf);
    for &(start, end) in &payload.offsets {
        encode_varint(start, &mut buf);
        encode_varint(end, &mut buf);
    }
    if let Some(norm) = payload.norm {
        buf.push(norm);
    }
    buf
}

pub fn decode_posting(buf: &[u8]) -> Result<PostingPayload> {
    let err = |message: &str| Error::decode("posting payload", message.to_string());

    let (&flags, mut rest) = buf.split_first().ok_or_else(|| err("empty payload"))?;

    let mut read_varint = |rest: &mut &[u8]| -> Result<u32> {
        let (value, consumed) = decode_varint(rest).ok_or_else(|| err("truncated varint"))?;
        *rest = &rest[consumed..];
        Ok(value)
    };

    let freq = read_varint(&mut rest)?;

    let pos_count = read_varint(&mut rest)? as usize;
    if pos_count > rest.len() {
        // each encoded position needs at least one byte
        return Err(err("position count exceeds payload"));
    }
    let (positions, consumed) =
        delta_decode(rest, pos_count).ok_or_else(|| err("truncated position list"))?;
    rest = &rest[consumed..];

    let off_count = read_varint(&mut rest)? as usize;
    if off_count > rest.len() {
        return Err(err("offset count exceeds payload"));
    }
    let mut offsets = Vec::with_capacity(off_count);
    for _ in 0..off_count {
        let start = read_varint(&mut rest)?;
        let end = read_varint(&mut rest)?;
        offsets.push((start, end));
    }

    let norm = if flags & FLAG_NORM != 0 {
        let (&n, tail) = rest.split_first().ok_or_else(|| err("missing norm byte"))?;
        rest = tail;
        Some(n)
    } else {
        None
    };

    if !rest.is_empty() {
        return Err(err("trailing bytes"));
    }

    Ok(PostingPayload { freq, positions, offsets, norm })
}

/// Serialize the meta-column term list.
pub fn encode_term_list(terms: &[Term]) -> Result<Vec<u8>> {
    serde_json::to_vec(terms).map_err(|e| Error::decode("term list", e.to_string()))
}

/// Decode the meta-column term list. Malformed content is fatal: deletion
/// must abort rather than silently skip postings.
pub fn decode_term_list(raw: &[u8]) -> Result<Vec<Term>> {
    serde_json::from_slice(raw).map_err(|e| Error::decode("term list", e.to_string()))
}

/// Encode a length-normalization factor into the single-byte norm format
/// (3-bit mantissa, 5-bit exponent, 15-bit zero point).
pub fn encode_norm(f: f32) -> u8 {
    let bits = f.to_bits() as i32;
    let small = bits >> (24 - 3);
    if small <= (63 - 15) << 3 {
        if bits <= 0 { 0 } else { 1 }
    } else if small >= ((63 - 15) << 3) + 0x100 {
        255
    } else {
        (small - ((63 - 15) << 3)) as u8
    }
}

pub fn decode_norm(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let bits = ((b as u32) << (24 - 3)) + ((63 - 15) << 24);
    f32::from_bits(bits)
}

/// Length normalization: `1 / sqrt(token_count)`.
pub fn length_norm(token_count: u32) -> f32 {
    if token_count == 0 { 0.0 } else { 1.0 / (token_count as f32).sqrt() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_value_roundtrip() {
        let raw = encode_text_value(&["http://x"]);
        let values = decode_field_value("url", &raw).unwrap();
        assert_eq!(values, vec![FieldValue::Text("http://x".into())]);
    }

    #[test]
    fn test_multi_value_split() {
        let raw = encode_text_value(&["a", "b"]);
        let values = decode_field_value("tag", &raw).unwrap();
        assert_eq!(
            values,
            vec![FieldValue::Text("a".into()), FieldValue::Text("b".into())]
        );
    }

    #[test]
    fn test_binary_value_keeps_tag() {
        let raw = encode_binary_value(&[0, 159, 255]);
        let values = decode_field_value("blob", &raw).unwrap();
        assert_eq!(values, vec![FieldValue::Binary(vec![0, 159, 255])]);
    }

    #[test]
    fn test_corrupt_tag_is_fatal() {
        let err = decode_field_value("title", b"abc\x42").unwrap_err();
        assert!(matches!(err, Error::CorruptField { tag: 0x42, .. }));
    }

    #[test]
    fn test_posting_roundtrip() {
        let payload = PostingPayload {
            freq: 3,
            positions: vec![1, 4, 9],
            offsets: vec![(0, 5), (10, 15), (20, 25)],
            norm: Some(124),
        };
        let decoded = decode_posting(&encode_posting(&payload)).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_presence_only_posting() {
        let payload = PostingPayload::default();
        let encoded = encode_posting(&payload);
        assert_eq!(decode_posting(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_truncated_posting_is_decode_error() {
        let encoded = encode_posting(&PostingPayload {
            freq: 2,
            positions: vec![5, 9],
            offsets: vec![],
            norm: Some(124),
        });
        for cut in 0..encoded.len() {
            assert!(decode_posting(&encoded[..cut]).is_err(), "cut at {cut} decoded");
        }
    }

    #[test]
    fn test_norm_unit_value() {
        assert_eq!(encode_norm(1.0), 124);
        assert_eq!(decode_norm(124), 1.0);
        assert_eq!(decode_norm(0), 0.0);
    }

    #[test]
    fn test_norm_monotonic() {
        let mut last = decode_norm(1);
        for b in 2..=255u8 {
            let f = decode_norm(b);
            assert!(f > last, "norm table not monotonic at {b}");
            last = f;
        }
    }

    #[test]
    fn test_term_list_roundtrip() {
        let terms = vec![Term::new("body", "abc"), Term::new("title", "x")];
        let raw = encode_term_list(&terms).unwrap();
        assert_eq!(decode_term_list(&raw).unwrap(), terms);
    }

    #[test]
    fn test_malformed_term_list_is_fatal() {
        assert!(decode_term_list(b"{not json").is_err());
    }
}
