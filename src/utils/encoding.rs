/// Encode a u32 as a variable-length integer
pub fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        if value < 0x80 {
            buf.push(value as u8);
            break;
        }
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
}

/// Decode a variable-length integer from a slice
/// Returns (value, bytes_consumed)
pub fn decode_varint(buf: &[u8]) -> Option<(u32, usize)> {
    let mut result: u32 = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if shift >= 32 {
            return None; // Overflow
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }

        shift += 7;
    }

    None // Incomplete
}

/// Delta-encode a sorted list of u32s
pub fn delta_encode(values: &[u32], buf: &mut Vec<u8>) {
    let mut prev = 0u32;
    for &value in values {
        let delta = value.wrapping_sub(prev);
        encode_varint(delta, buf);
        prev = value;
    }
}

/// Delta-decode `count` u32s from the front of a slice.
/// Returns the values and the number of bytes consumed, or None if the
/// input is truncated.
pub fn delta_decode(buf: &[u8], count: usize) -> Option<(Vec<u32>, usize)> {
    let mut result = Vec::with_capacity(count);
    let mut prev = 0u32;
    let mut pos = 0;

    for _ in 0..count {
        let (delta, consumed) = decode_varint(buf.get(pos..)?)?;
        prev = prev.saturating_add(delta);
        result.push(prev);
        pos += consumed;
    }

    Some((result, pos))
}
