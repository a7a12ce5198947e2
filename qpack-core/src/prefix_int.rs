//! Prefix integer encoding and decoding per RFC 7541 Section 5.1.
//! Used throughout QPACK for indexes, lengths, counts and stream ids.
//!
//! Decoding is incremental: `Ok(None)` means the input ends before the
//! integer does and the caller should retry with more bytes.

use bytes::BufMut;

use crate::error::WireError;

/// Largest value QPACK needs to represent (2^62 - 1).
pub const MAX_INTEGER: u64 = (1u64 << 62) - 1;

/// Decode a prefix integer from a byte slice.
///
/// # Arguments
/// * `data` - Input byte slice, starting at the byte carrying the prefix
/// * `prefix_bits` - Number of low bits in the first byte used for the integer (1-8)
///
/// # Returns
/// `Some((value, bytes_consumed))`, or `None` if more input is needed.
#[inline]
pub fn decode_int(data: &[u8], prefix_bits: u8) -> Result<Option<(u64, usize)>, WireError> {
    debug_assert!(prefix_bits > 0 && prefix_bits <= 8);

    let Some(&first) = data.first() else {
        return Ok(None);
    };

    let mask = if prefix_bits == 8 {
        0xFF
    } else {
        (1u8 << prefix_bits) - 1
    };
    let mut value = (first & mask) as u64;

    // Fast path: value fits in prefix
    if value < mask as u64 {
        return Ok(Some((value, 1)));
    }

    let mut offset = 1;
    let mut shift = 0u32;

    loop {
        let Some(&byte) = data.get(offset) else {
            return Ok(None);
        };
        offset += 1;

        if shift > 56 {
            return Err(WireError::IntegerOverflow);
        }

        value = value
            .checked_add(((byte & 0x7F) as u64) << shift)
            .ok_or(WireError::IntegerOverflow)?;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }
    }

    if value > MAX_INTEGER {
        return Err(WireError::IntegerOverflow);
    }

    Ok(Some((value, offset)))
}

/// Encode an integer with a given prefix.
///
/// # Arguments
/// * `buf` - Output buffer
/// * `value` - Value to encode
/// * `prefix_bits` - Number of bits available in first byte
/// * `flags` - High bits of the first byte (bits that are not part of the integer)
#[inline]
pub fn encode_int<B: BufMut>(buf: &mut B, value: u64, prefix_bits: u8, flags: u8) {
    debug_assert!(prefix_bits > 0 && prefix_bits <= 8);
    debug_assert!(value <= MAX_INTEGER);

    let max_first_byte = if prefix_bits == 8 {
        0xFF
    } else {
        (1u64 << prefix_bits) - 1
    };

    if value < max_first_byte {
        buf.put_u8(flags | value as u8);
        return;
    }

    buf.put_u8(flags | max_first_byte as u8);
    let mut remaining = value - max_first_byte;

    while remaining >= 128 {
        buf.put_u8(0x80 | (remaining & 0x7F) as u8);
        remaining >>= 7;
    }

    buf.put_u8(remaining as u8);
}

/// Number of bytes [`encode_int`] produces for `value`.
pub fn encoded_len(value: u64, prefix_bits: u8) -> usize {
    let max_first_byte = if prefix_bits == 8 {
        0xFF
    } else {
        (1u64 << prefix_bits) - 1
    };

    if value < max_first_byte {
        return 1;
    }

    let mut remaining = value - max_first_byte;
    let mut len = 2;
    while remaining >= 128 {
        remaining >>= 7;
        len += 1;
    }
    len
}
