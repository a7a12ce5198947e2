//! String literals (RFC 9204 Section 4.1.2).
//!
//! A literal is an H flag, a prefixed length and the raw octets. The flag sits
//! right above the length prefix, so its position depends on the
//! representation carrying the literal. Only raw literals are produced;
//! Huffman-coded input is rejected.

use bytes::{BufMut, Bytes};

use crate::error::WireError;
use crate::prefix_int::{decode_int, encode_int, encoded_len};

/// Encode a raw literal whose length uses `prefix_bits` bits of the first byte.
///
/// `flags` holds the representation bits above the H flag.
pub fn encode_literal<B: BufMut>(buf: &mut B, data: &[u8], prefix_bits: u8, flags: u8) {
    encode_int(buf, data.len() as u64, prefix_bits, flags);
    buf.put_slice(data);
}

/// Number of bytes [`encode_literal`] produces.
pub fn literal_len(data: &[u8], prefix_bits: u8) -> usize {
    encoded_len(data.len() as u64, prefix_bits) + data.len()
}

/// Decode a literal whose length uses `prefix_bits` bits of the first byte.
///
/// Returns `Ok(None)` when `data` ends inside the literal.
pub fn decode_literal(data: &[u8], prefix_bits: u8) -> Result<Option<(Bytes, usize)>, WireError> {
    decode_literal_bounded(data, prefix_bits, usize::MAX)
}

/// Like [`decode_literal`], but fails with [`WireError::EntryTooLarge`] as
/// soon as the length prefix exceeds `max_len`, before the octets arrive.
pub fn decode_literal_bounded(
    data: &[u8],
    prefix_bits: u8,
    max_len: usize,
) -> Result<Option<(Bytes, usize)>, WireError> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };

    let huffman = first & (1u8 << prefix_bits) != 0;

    let Some((len, offset)) = decode_int(data, prefix_bits)? else {
        return Ok(None);
    };
    let len = usize::try_from(len).map_err(|_| WireError::LengthOverflow)?;
    if len > max_len {
        return Err(WireError::EntryTooLarge);
    }
    let end = offset.checked_add(len).ok_or(WireError::LengthOverflow)?;

    if data.len() < end {
        return Ok(None);
    }

    if huffman {
        return Err(WireError::HuffmanUnsupported);
    }

    Ok(Some((Bytes::copy_from_slice(&data[offset..end]), end)))
}
