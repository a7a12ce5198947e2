//! QPACK encoder and decoder stream instructions per RFC 9204.
//!
//! Encoder stream instructions (Section 4.3):
//! - Set Dynamic Table Capacity
//! - Insert With Name Reference
//! - Insert With Literal Name
//! - Duplicate
//!
//! Decoder stream instructions (Section 4.4):
//! - Section Acknowledgement
//! - Stream Cancellation
//! - Insert Count Increment
//!
//! Both streams are unframed byte sequences, so decoding is incremental:
//! `Ok(None)` means the buffer ends inside an instruction.

use bytes::{BufMut, Bytes};

use crate::error::WireError;
use crate::field_line::ENTRY_OVERHEAD;
use crate::literal::{decode_literal_bounded, encode_literal, literal_len};
use crate::prefix_int::{decode_int, encode_int, encoded_len};

/// Encoder stream instruction types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderInstruction {
    /// Set Dynamic Table Capacity.
    /// Pattern: 001xxxxx (capacity with 5-bit prefix)
    SetCapacity { capacity: u64 },

    /// Insert With Name Reference.
    /// Pattern: 1Txxxxxx (T=1 static, T=0 dynamic relative to the insert count)
    InsertWithNameRef {
        is_static: bool,
        name_index: u64,
        value: Bytes,
    },

    /// Insert With Literal Name.
    /// Pattern: 01Hxxxxx (name length with 5-bit prefix)
    InsertLiteral { name: Bytes, value: Bytes },

    /// Duplicate an existing entry, relative to the insert count.
    /// Pattern: 000xxxxx (index with 5-bit prefix)
    Duplicate { index: u64 },
}

impl EncoderInstruction {
    /// Append the wire form of this instruction to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            EncoderInstruction::SetCapacity { capacity } => {
                encode_int(buf, *capacity, 5, 0x20);
            }

            EncoderInstruction::InsertWithNameRef {
                is_static,
                name_index,
                value,
            } => {
                let flags = if *is_static { 0xC0 } else { 0x80 };
                encode_int(buf, *name_index, 6, flags);
                encode_literal(buf, value, 7, 0x00);
            }

            EncoderInstruction::InsertLiteral { name, value } => {
                encode_literal(buf, name, 5, 0x40);
                encode_literal(buf, value, 7, 0x00);
            }

            EncoderInstruction::Duplicate { index } => {
                encode_int(buf, *index, 5, 0x00);
            }
        }
    }

    /// Size of the wire form in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            EncoderInstruction::SetCapacity { capacity } => encoded_len(*capacity, 5),
            EncoderInstruction::InsertWithNameRef {
                name_index, value, ..
            } => encoded_len(*name_index, 6) + literal_len(value, 7),
            EncoderInstruction::InsertLiteral { name, value } => {
                literal_len(name, 5) + literal_len(value, 7)
            }
            EncoderInstruction::Duplicate { index } => encoded_len(*index, 5),
        }
    }

    /// Decode one instruction from the front of `data`.
    /// Returns (instruction, bytes_consumed), or `None` if incomplete.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        Self::decode_with_limit(data, usize::MAX)
    }

    /// Like [`decode`](Self::decode), but an insertion whose literals cannot
    /// fit in an entry of `max_entry_size` bytes fails as soon as the length
    /// prefix is read, before any of the literal is buffered.
    pub fn decode_with_limit(
        data: &[u8],
        max_entry_size: usize,
    ) -> Result<Option<(Self, usize)>, WireError> {
        let Some(&first) = data.first() else {
            return Ok(None);
        };
        let max_len = max_entry_size.saturating_sub(ENTRY_OVERHEAD);

        if first & 0x80 != 0 {
            let is_static = first & 0x40 != 0;
            let Some((name_index, n)) = decode_int(data, 6)? else {
                return Ok(None);
            };
            let Some((value, m)) = decode_literal_bounded(&data[n..], 7, max_len)? else {
                return Ok(None);
            };

            Ok(Some((
                EncoderInstruction::InsertWithNameRef {
                    is_static,
                    name_index,
                    value,
                },
                n + m,
            )))
        } else if first & 0xC0 == 0x40 {
            let Some((name, n)) = decode_literal_bounded(data, 5, max_len)? else {
                return Ok(None);
            };
            let Some((value, m)) = decode_literal_bounded(&data[n..], 7, max_len - name.len())?
            else {
                return Ok(None);
            };

            Ok(Some((EncoderInstruction::InsertLiteral { name, value }, n + m)))
        } else if first & 0xE0 == 0x20 {
            Ok(decode_int(data, 5)?
                .map(|(capacity, n)| (EncoderInstruction::SetCapacity { capacity }, n)))
        } else {
            Ok(decode_int(data, 5)?.map(|(index, n)| (EncoderInstruction::Duplicate { index }, n)))
        }
    }
}

/// Decoder stream instruction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderInstruction {
    /// Section Acknowledgement.
    /// Pattern: 1xxxxxxx (stream ID with 7-bit prefix)
    SectionAck { stream_id: u64 },

    /// Stream Cancellation.
    /// Pattern: 01xxxxxx (stream ID with 6-bit prefix)
    StreamCancel { stream_id: u64 },

    /// Insert Count Increment.
    /// Pattern: 00xxxxxx (increment with 6-bit prefix)
    InsertCountIncrement { increment: u64 },
}

impl DecoderInstruction {
    /// Append the wire form of this instruction to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            DecoderInstruction::SectionAck { stream_id } => encode_int(buf, *stream_id, 7, 0x80),
            DecoderInstruction::StreamCancel { stream_id } => encode_int(buf, *stream_id, 6, 0x40),
            DecoderInstruction::InsertCountIncrement { increment } => {
                encode_int(buf, *increment, 6, 0x00)
            }
        }
    }

    /// Size of the wire form in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            DecoderInstruction::SectionAck { stream_id } => encoded_len(*stream_id, 7),
            DecoderInstruction::StreamCancel { stream_id } => encoded_len(*stream_id, 6),
            DecoderInstruction::InsertCountIncrement { increment } => encoded_len(*increment, 6),
        }
    }

    /// Decode one instruction from the front of `data`.
    /// Returns (instruction, bytes_consumed), or `None` if incomplete.
    pub fn decode(data: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        let Some(&first) = data.first() else {
            return Ok(None);
        };

        let decoded = if first & 0x80 != 0 {
            decode_int(data, 7)?
                .map(|(stream_id, n)| (DecoderInstruction::SectionAck { stream_id }, n))
        } else if first & 0xC0 == 0x40 {
            decode_int(data, 6)?
                .map(|(stream_id, n)| (DecoderInstruction::StreamCancel { stream_id }, n))
        } else {
            decode_int(data, 6)?
                .map(|(increment, n)| (DecoderInstruction::InsertCountIncrement { increment }, n))
        };

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder_wire(inst: &EncoderInstruction) -> Vec<u8> {
        let mut buf = Vec::new();
        inst.encode(&mut buf);
        assert_eq!(buf.len(), inst.encoded_len());
        buf
    }

    #[test]
    fn test_set_capacity_wire() {
        // RFC 9204 B.2: Set Dynamic Table Capacity 220
        let inst = EncoderInstruction::SetCapacity { capacity: 220 };
        let wire = encoder_wire(&inst);
        assert_eq!(wire, vec![0x3f, 0xbd, 0x01]);
        assert_eq!(
            EncoderInstruction::decode(&wire).unwrap(),
            Some((inst, 3))
        );
    }

    #[test]
    fn test_insert_with_static_name_ref_wire() {
        // RFC 9204 B.2: Insert With Name Reference, static 0, "www.example.com"
        let inst = EncoderInstruction::InsertWithNameRef {
            is_static: true,
            name_index: 0,
            value: Bytes::from_static(b"www.example.com"),
        };
        let wire = encoder_wire(&inst);
        assert_eq!(wire[0], 0xc0);
        assert_eq!(wire[1], 0x0f);
        assert_eq!(&wire[2..], b"www.example.com");
        assert_eq!(
            EncoderInstruction::decode(&wire).unwrap(),
            Some((inst, wire.len()))
        );
    }

    #[test]
    fn test_insert_literal_and_duplicate_wire() {
        let inst = EncoderInstruction::InsertLiteral {
            name: Bytes::from_static(b"custom-key"),
            value: Bytes::from_static(b"custom-value"),
        };
        let wire = encoder_wire(&inst);
        assert_eq!(wire[0], 0x4a);
        assert_eq!(
            EncoderInstruction::decode(&wire).unwrap(),
            Some((inst, wire.len()))
        );

        // RFC 9204 B.4: Duplicate relative index 2
        let inst = EncoderInstruction::Duplicate { index: 2 };
        assert_eq!(encoder_wire(&inst), vec![0x02]);
    }

    #[test]
    fn test_encoder_instruction_split_across_reads() {
        let inst = EncoderInstruction::InsertWithNameRef {
            is_static: false,
            name_index: 3,
            value: Bytes::from_static(b"split-value"),
        };
        let wire = encoder_wire(&inst);

        for cut in 0..wire.len() {
            assert_eq!(EncoderInstruction::decode(&wire[..cut]).unwrap(), None);
        }
        assert_eq!(
            EncoderInstruction::decode(&wire).unwrap(),
            Some((inst, wire.len()))
        );
    }

    #[test]
    fn test_oversized_insert_rejected_before_buffering() {
        // Insert With Literal Name, name length 2^30, no name octets yet
        let mut wire = Vec::new();
        encode_int(&mut wire, 1 << 30, 5, 0x40);
        assert_eq!(EncoderInstruction::decode(&wire).unwrap(), None);
        assert_eq!(
            EncoderInstruction::decode_with_limit(&wire, 4096),
            Err(WireError::EntryTooLarge)
        );

        // name fits, but name + value does not
        let inst = EncoderInstruction::InsertLiteral {
            name: Bytes::from_static(b"abcd"),
            value: Bytes::from_static(b"efgh"),
        };
        let wire = encoder_wire(&inst);
        assert_eq!(
            EncoderInstruction::decode_with_limit(&wire, 40).unwrap(),
            Some((inst, wire.len()))
        );
        assert_eq!(
            EncoderInstruction::decode_with_limit(&wire, 39),
            Err(WireError::EntryTooLarge)
        );

        // name reference value of 4192 bytes, rejected on its length prefix
        let wire = [0xc0, 0x7f, 0xe1, 0x1f];
        assert_eq!(
            EncoderInstruction::decode_with_limit(&wire, 4096),
            Err(WireError::EntryTooLarge)
        );
    }

    #[test]
    fn test_decoder_instruction_wire() {
        // RFC 9204 B.1 / B.2
        let mut buf = Vec::new();
        DecoderInstruction::SectionAck { stream_id: 4 }.encode(&mut buf);
        DecoderInstruction::InsertCountIncrement { increment: 2 }.encode(&mut buf);
        DecoderInstruction::StreamCancel { stream_id: 8 }.encode(&mut buf);
        assert_eq!(buf, vec![0x84, 0x02, 0x48]);

        let (inst, n) = DecoderInstruction::decode(&buf).unwrap().unwrap();
        assert_eq!(inst, DecoderInstruction::SectionAck { stream_id: 4 });
        assert_eq!(n, 1);
        let (inst, _) = DecoderInstruction::decode(&buf[1..]).unwrap().unwrap();
        assert_eq!(inst, DecoderInstruction::InsertCountIncrement { increment: 2 });
        let (inst, _) = DecoderInstruction::decode(&buf[2..]).unwrap().unwrap();
        assert_eq!(inst, DecoderInstruction::StreamCancel { stream_id: 8 });
    }

    #[test]
    fn test_large_stream_id() {
        let inst = DecoderInstruction::SectionAck { stream_id: 1_000_000 };
        let mut buf = Vec::new();
        inst.encode(&mut buf);
        assert_eq!(buf.len(), inst.encoded_len());
        assert_eq!(DecoderInstruction::decode(&buf[..2]).unwrap(), None);
        assert_eq!(
            DecoderInstruction::decode(&buf).unwrap(),
            Some((inst, buf.len()))
        );
    }
}
