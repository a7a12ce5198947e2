//! Encoded field section wire format (RFC 9204 Section 4.5).
//!
//! A field section starts with a prefix carrying the Required Insert Count
//! and the Base, followed by field line representations that reference the
//! static table, the dynamic table relative to the Base, entries inserted
//! after the Base, or carry literal names.

use bytes::{BufMut, Bytes};

use crate::error::WireError;
use crate::literal::{decode_literal, encode_literal};
use crate::prefix_int::{decode_int, encode_int};

/// Field section prefix (RFC 9204 Section 4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSectionPrefix {
    pub required_insert_count: u64,
    pub base: u64,
}

impl FieldSectionPrefix {
    pub fn new(required_insert_count: u64, base: u64) -> Self {
        Self {
            required_insert_count,
            base,
        }
    }

    /// Encode the prefix.
    ///
    /// `max_entries` is the peer's maximum table capacity divided by 32.
    pub fn encode<B: BufMut>(&self, max_entries: u64, buf: &mut B) {
        let ric = self.required_insert_count;

        if ric == 0 {
            buf.put_u8(0);
            buf.put_u8(0);
            return;
        }

        debug_assert!(max_entries > 0);
        encode_int(buf, ric % (2 * max_entries) + 1, 8, 0x00);

        if self.base >= ric {
            encode_int(buf, self.base - ric, 7, 0x00);
        } else {
            encode_int(buf, ric - self.base - 1, 7, 0x80);
        }
    }

    /// Decode the prefix.
    ///
    /// `max_entries` is our maximum table capacity divided by 32 and
    /// `total_inserts` the number of insertions seen so far on the encoder
    /// stream. Returns `Ok(None)` if `data` ends inside the prefix.
    pub fn decode(
        data: &[u8],
        max_entries: u64,
        total_inserts: u64,
    ) -> Result<Option<(Self, usize)>, WireError> {
        let Some((encoded_ric, mut pos)) = decode_int(data, 8)? else {
            return Ok(None);
        };

        let required_insert_count = if encoded_ric == 0 {
            0
        } else {
            let full_range = 2 * max_entries;
            if encoded_ric > full_range {
                return Err(WireError::InvalidRequiredInsertCount);
            }

            let max_value = total_inserts + max_entries;
            let max_wrapped = (max_value / full_range) * full_range;
            let mut ric = max_wrapped + encoded_ric - 1;

            if ric > max_value {
                if ric <= full_range {
                    return Err(WireError::InvalidRequiredInsertCount);
                }
                ric -= full_range;
            }

            if ric == 0 {
                return Err(WireError::InvalidRequiredInsertCount);
            }
            ric
        };

        let Some(&first) = data.get(pos) else {
            return Ok(None);
        };
        let negative = first & 0x80 != 0;
        let Some((delta_base, n)) = decode_int(&data[pos..], 7)? else {
            return Ok(None);
        };
        pos += n;

        let base = if negative {
            required_insert_count
                .checked_sub(delta_base)
                .and_then(|v| v.checked_sub(1))
                .ok_or(WireError::InvalidBase)?
        } else {
            required_insert_count
                .checked_add(delta_base)
                .ok_or(WireError::InvalidBase)?
        };

        Ok(Some((Self::new(required_insert_count, base), pos)))
    }
}

/// One field line representation (RFC 9204 Sections 4.5.2 - 4.5.6).
///
/// Dynamic references are relative to the section's Base: `relative` counts
/// back from `base - 1`, `index` on post-base forms counts forward from `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLineRepr {
    /// Indexed field line, static table. Pattern: 11xxxxxx
    IndexedStatic { index: u64 },

    /// Indexed field line, dynamic table. Pattern: 10xxxxxx
    IndexedDynamic { relative: u64 },

    /// Indexed field line with post-base index. Pattern: 0001xxxx
    IndexedPostBase { index: u64 },

    /// Literal with static name reference. Pattern: 01N1xxxx
    LiteralStaticName {
        index: u64,
        value: Bytes,
        never_indexed: bool,
    },

    /// Literal with dynamic name reference. Pattern: 01N0xxxx
    LiteralDynamicName {
        relative: u64,
        value: Bytes,
        never_indexed: bool,
    },

    /// Literal with post-base name reference. Pattern: 0000Nxxx
    LiteralPostBaseName {
        index: u64,
        value: Bytes,
        never_indexed: bool,
    },

    /// Literal with literal name. Pattern: 001NHxxx
    LiteralName {
        name: Bytes,
        value: Bytes,
        never_indexed: bool,
    },
}

impl FieldLineRepr {
    /// Append the wire form of this representation to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            FieldLineRepr::IndexedStatic { index } => encode_int(buf, *index, 6, 0xC0),
            FieldLineRepr::IndexedDynamic { relative } => encode_int(buf, *relative, 6, 0x80),
            FieldLineRepr::IndexedPostBase { index } => encode_int(buf, *index, 4, 0x10),

            FieldLineRepr::LiteralStaticName {
                index,
                value,
                never_indexed,
            } => {
                let n = if *never_indexed { 0x20 } else { 0x00 };
                encode_int(buf, *index, 4, 0x50 | n);
                encode_literal(buf, value, 7, 0x00);
            }

            FieldLineRepr::LiteralDynamicName {
                relative,
                value,
                never_indexed,
            } => {
                let n = if *never_indexed { 0x20 } else { 0x00 };
                encode_int(buf, *relative, 4, 0x40 | n);
                encode_literal(buf, value, 7, 0x00);
            }

            FieldLineRepr::LiteralPostBaseName {
                index,
                value,
                never_indexed,
            } => {
                let n = if *never_indexed { 0x08 } else { 0x00 };
                encode_int(buf, *index, 3, n);
                encode_literal(buf, value, 7, 0x00);
            }

            FieldLineRepr::LiteralName {
                name,
                value,
                never_indexed,
            } => {
                let n = if *never_indexed { 0x10 } else { 0x00 };
                encode_literal(buf, name, 3, 0x20 | n);
                encode_literal(buf, value, 7, 0x00);
            }
        }
    }

    /// Decode one representation from the front of `data`.
    /// Returns `Ok(None)` if `data` ends inside it.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        let Some(&first) = data.first() else {
            return Ok(None);
        };

        if first & 0x80 != 0 {
            let is_static = first & 0x40 != 0;
            let decoded = decode_int(data, 6)?.map(|(index, n)| {
                let repr = if is_static {
                    FieldLineRepr::IndexedStatic { index }
                } else {
                    FieldLineRepr::IndexedDynamic { relative: index }
                };
                (repr, n)
            });
            return Ok(decoded);
        }

        if first & 0xC0 == 0x40 {
            let never_indexed = first & 0x20 != 0;
            let is_static = first & 0x10 != 0;
            let Some((index, n)) = decode_int(data, 4)? else {
                return Ok(None);
            };
            let Some((value, m)) = decode_literal(&data[n..], 7)? else {
                return Ok(None);
            };

            let repr = if is_static {
                FieldLineRepr::LiteralStaticName {
                    index,
                    value,
                    never_indexed,
                }
            } else {
                FieldLineRepr::LiteralDynamicName {
                    relative: index,
                    value,
                    never_indexed,
                }
            };
            return Ok(Some((repr, n + m)));
        }

        if first & 0xE0 == 0x20 {
            let never_indexed = first & 0x10 != 0;
            let Some((name, n)) = decode_literal(data, 3)? else {
                return Ok(None);
            };
            let Some((value, m)) = decode_literal(&data[n..], 7)? else {
                return Ok(None);
            };

            return Ok(Some((
                FieldLineRepr::LiteralName {
                    name,
                    value,
                    never_indexed,
                },
                n + m,
            )));
        }

        if first & 0xF0 == 0x10 {
            return Ok(decode_int(data, 4)?
                .map(|(index, n)| (FieldLineRepr::IndexedPostBase { index }, n)));
        }

        let never_indexed = first & 0x08 != 0;
        let Some((index, n)) = decode_int(data, 3)? else {
            return Ok(None);
        };
        let Some((value, m)) = decode_literal(&data[n..], 7)? else {
            return Ok(None);
        };

        Ok(Some((
            FieldLineRepr::LiteralPostBaseName {
                index,
                value,
                never_indexed,
            },
            n + m,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_wire(prefix: FieldSectionPrefix, max_entries: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        prefix.encode(max_entries, &mut buf);
        buf
    }

    fn repr_wire(repr: &FieldLineRepr) -> Vec<u8> {
        let mut buf = Vec::new();
        repr.encode(&mut buf);
        buf
    }

    #[test]
    fn test_empty_prefix() {
        let wire = prefix_wire(FieldSectionPrefix::default(), 0);
        assert_eq!(wire, vec![0x00, 0x00]);
        assert_eq!(
            FieldSectionPrefix::decode(&wire, 0, 0).unwrap(),
            Some((FieldSectionPrefix::default(), 2))
        );
    }

    #[test]
    fn test_prefix_rfc_example() {
        // RFC 9204 B.2: capacity 220 (max entries 6), RIC 2, base 0
        let prefix = FieldSectionPrefix::new(2, 0);
        let wire = prefix_wire(prefix, 6);
        assert_eq!(wire, vec![0x03, 0x81]);
        assert_eq!(
            FieldSectionPrefix::decode(&wire, 6, 2).unwrap(),
            Some((prefix, 2))
        );
    }

    #[test]
    fn test_prefix_post_base() {
        // RIC 5 with base 0: four of the references are post-base
        let prefix = FieldSectionPrefix::new(5, 0);
        let wire = prefix_wire(prefix, 128);
        assert_eq!(wire, vec![0x06, 0x84]);
        assert_eq!(
            FieldSectionPrefix::decode(&wire, 128, 5).unwrap(),
            Some((prefix, 2))
        );
    }

    #[test]
    fn test_prefix_wraps_required_insert_count() {
        // With 4 entries the encoded count wraps every 8 insertions
        let prefix = FieldSectionPrefix::new(10, 10);
        let wire = prefix_wire(prefix, 4);
        assert_eq!(wire, vec![0x03, 0x00]);
        assert_eq!(
            FieldSectionPrefix::decode(&wire, 4, 9).unwrap(),
            Some((prefix, 2))
        );
    }

    #[test]
    fn test_prefix_rejects_invalid_count() {
        assert_eq!(
            FieldSectionPrefix::decode(&[0x0a, 0x00], 4, 0),
            Err(WireError::InvalidRequiredInsertCount)
        );
        // Any non-zero count needs a dynamic table
        assert_eq!(
            FieldSectionPrefix::decode(&[0x01, 0x00], 0, 0),
            Err(WireError::InvalidRequiredInsertCount)
        );
    }

    #[test]
    fn test_prefix_rejects_negative_base() {
        // RIC 1, sign set, delta 1 -> base -1
        assert_eq!(
            FieldSectionPrefix::decode(&[0x02, 0x81], 16, 1),
            Err(WireError::InvalidBase)
        );
    }

    #[test]
    fn test_prefix_incomplete() {
        assert_eq!(FieldSectionPrefix::decode(&[], 16, 0).unwrap(), None);
        assert_eq!(FieldSectionPrefix::decode(&[0x02], 16, 1).unwrap(), None);
    }

    #[test]
    fn test_indexed_representations() {
        // RFC 9204 B.1: :path / is static index 1
        let wire = repr_wire(&FieldLineRepr::IndexedStatic { index: 1 });
        assert_eq!(wire, vec![0xc1]);

        let wire = repr_wire(&FieldLineRepr::IndexedDynamic { relative: 0 });
        assert_eq!(wire, vec![0x80]);

        let wire = repr_wire(&FieldLineRepr::IndexedPostBase { index: 0 });
        assert_eq!(wire, vec![0x10]);
        assert_eq!(
            FieldLineRepr::decode(&wire).unwrap(),
            Some((FieldLineRepr::IndexedPostBase { index: 0 }, 1))
        );
    }

    #[test]
    fn test_literal_representations() {
        let reprs = [
            FieldLineRepr::LiteralStaticName {
                index: 2,
                value: Bytes::from_static(b"42"),
                never_indexed: false,
            },
            FieldLineRepr::LiteralDynamicName {
                relative: 17,
                value: Bytes::from_static(b"v"),
                never_indexed: true,
            },
            FieldLineRepr::LiteralPostBaseName {
                index: 9,
                value: Bytes::from_static(b"post"),
                never_indexed: true,
            },
            FieldLineRepr::LiteralName {
                name: Bytes::from_static(b"x-custom-name"),
                value: Bytes::from_static(b"custom"),
                never_indexed: true,
            },
        ];

        for repr in reprs {
            let wire = repr_wire(&repr);
            assert_eq!(
                FieldLineRepr::decode(&wire).unwrap(),
                Some((repr.clone(), wire.len()))
            );
            assert_eq!(FieldLineRepr::decode(&wire[..wire.len() - 1]).unwrap(), None);
        }
    }

    #[test]
    fn test_never_indexed_bits() {
        let wire = repr_wire(&FieldLineRepr::LiteralStaticName {
            index: 0,
            value: Bytes::new(),
            never_indexed: true,
        });
        assert_eq!(wire[0], 0x70);

        let wire = repr_wire(&FieldLineRepr::LiteralName {
            name: Bytes::from_static(b"a"),
            value: Bytes::new(),
            never_indexed: true,
        });
        assert_eq!(wire[0], 0x31);
    }
}
