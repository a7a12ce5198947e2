//! QPACK encoder per RFC 9204.
//!
//! Encodes field sections against the static table and the dynamic table,
//! emitting encoder stream instructions for every insertion, and tracks
//! which sections the peer has acknowledged so that it never:
//! - blocks more streams than the peer allows
//! - evicts an entry an unacknowledged section still references
//! - shrinks the table below entries it cannot evict yet

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::QpackConfig;
use crate::context::EncoderContext;
use crate::error::{Error, Result};
use crate::field_line::FieldLine;
use crate::header_block::{FieldLineRepr, FieldSectionPrefix};
use crate::instructions::{DecoderInstruction, EncoderInstruction};
use crate::ledger::{AckLedger, HeaderBlockRef};
use crate::static_table;
use crate::table::DynamicTable;

/// Output of [`Encoder::encode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFieldSection {
    /// Field section prefix (Required Insert Count and Base).
    pub prefix: Bytes,
    /// Field line representations.
    pub field_lines: Bytes,
    /// Instructions to append to the encoder stream before the section is sent.
    pub encoder_stream: Bytes,
}

impl EncodedFieldSection {
    /// Prefix and field lines as one buffer, the payload of a HEADERS frame.
    pub fn header_block(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.prefix.len() + self.field_lines.len());
        buf.extend_from_slice(&self.prefix);
        buf.extend_from_slice(&self.field_lines);
        buf.freeze()
    }
}

/// How a field may use the dynamic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexingMode {
    /// Reuse or insert entries.
    Store,
    /// Reuse entries but never insert.
    Literal,
    /// Literal only, never matched against full entries.
    Never,
}

/// Decides how a field uses the dynamic table given the effective capacity.
fn indexing_mode(field: &FieldLine, capacity: usize) -> IndexingMode {
    if field.never_index {
        return IndexingMode::Never;
    }

    match &field.name[..] {
        b"authorization" => return IndexingMode::Never,
        b"cookie" if field.value.len() < 20 => return IndexingMode::Never,
        b":path" | b"age" | b"content-length" | b"etag" | b"if-modified-since"
        | b"if-none-match" | b"location" | b"set-cookie" => return IndexingMode::Literal,
        _ => {}
    }

    if field.size() > capacity * 3 / 4 {
        return IndexingMode::Literal;
    }

    IndexingMode::Store
}

/// References made by the section being encoded.
struct Section {
    base: u64,
    allow_blocking: bool,
    max_cnt: u64,
    min_cnt: Option<u64>,
}

impl Section {
    fn reference(&mut self, absidx: u64) {
        self.max_cnt = self.max_cnt.max(absidx + 1);
        self.min_cnt = Some(self.min_cnt.map_or(absidx + 1, |cnt| cnt.min(absidx + 1)));
    }

    fn indexed(&self, absidx: u64) -> FieldLineRepr {
        if absidx < self.base {
            FieldLineRepr::IndexedDynamic {
                relative: self.base - 1 - absidx,
            }
        } else {
            FieldLineRepr::IndexedPostBase {
                index: absidx - self.base,
            }
        }
    }

    fn literal_with_name(&self, absidx: u64, value: Bytes, never_indexed: bool) -> FieldLineRepr {
        if absidx < self.base {
            FieldLineRepr::LiteralDynamicName {
                relative: self.base - 1 - absidx,
                value,
                never_indexed,
            }
        } else {
            FieldLineRepr::LiteralPostBaseName {
                index: absidx - self.base,
                value,
                never_indexed,
            }
        }
    }
}

/// QPACK encoder state.
#[derive(Debug)]
pub struct Encoder {
    ctx: EncoderContext,
    ledger: AckLedger,
    max_blocked_streams: usize,
    /// Capacity most recently requested through `set_max_dtable_capacity`.
    last_max_capacity_update: usize,
    /// Smallest capacity requested since the last announcement.
    min_capacity_update: Option<usize>,
    /// Partial instruction left over from the last decoder stream read.
    decoder_stream_buf: BytesMut,
}

impl Encoder {
    /// Creates an encoder for a peer that advertised the given
    /// SETTINGS_QPACK_MAX_TABLE_CAPACITY and SETTINGS_QPACK_BLOCKED_STREAMS.
    ///
    /// The dynamic table starts at capacity 0; call
    /// [`set_max_dtable_capacity`](Encoder::set_max_dtable_capacity) to use it.
    pub fn new(max_table_capacity: usize, max_blocked_streams: usize) -> Self {
        Self {
            ctx: EncoderContext::new(max_table_capacity),
            ledger: AckLedger::new(),
            max_blocked_streams,
            last_max_capacity_update: 0,
            min_capacity_update: None,
            decoder_stream_buf: BytesMut::new(),
        }
    }

    /// Creates an encoder for the peer's settings and applies the local
    /// table capacity preference from `config`.
    pub fn with_config(
        peer_max_table_capacity: usize,
        peer_max_blocked_streams: usize,
        config: &QpackConfig,
    ) -> Self {
        let mut encoder = Self::new(peer_max_table_capacity, peer_max_blocked_streams);
        let capacity = config
            .encoder_table_capacity
            .unwrap_or(peer_max_table_capacity);
        encoder.set_max_dtable_capacity(capacity);
        encoder
    }

    pub fn table(&self) -> &DynamicTable {
        self.ctx.table()
    }

    /// Capacity the encoder currently keeps the table within.
    pub fn max_table_capacity(&self) -> usize {
        self.ctx.effective_capacity()
    }

    /// The peer's SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    pub fn hard_max_table_capacity(&self) -> usize {
        self.ctx.hard_max_capacity()
    }

    pub fn last_max_capacity_update(&self) -> usize {
        self.last_max_capacity_update
    }

    /// Smallest capacity requested and not yet announced, if any.
    pub fn min_capacity_update(&self) -> Option<usize> {
        self.min_capacity_update
    }

    pub fn known_received_count(&self) -> u64 {
        self.ledger.known_received_count()
    }

    /// Smallest `min_cnt` over all unacknowledged sections.
    pub fn min_cnt(&self) -> Option<u64> {
        self.ledger.min_cnt()
    }

    /// Number of streams the peer may currently be blocked on.
    pub fn num_blocked(&self) -> usize {
        self.ledger.num_blocked()
    }

    pub fn is_blocked(&self, stream_id: u64) -> bool {
        self.ledger.is_blocked(stream_id)
    }

    /// Number of streams with unacknowledged sections.
    pub fn num_streams(&self) -> usize {
        self.ledger.num_streams()
    }

    /// Unacknowledged sections of a stream, oldest first.
    pub fn stream_refs(&self, stream_id: u64) -> impl Iterator<Item = &HeaderBlockRef> + '_ {
        self.ledger.stream_refs(stream_id)
    }

    pub fn stream_max_cnt(&self, stream_id: u64) -> Option<u64> {
        self.ledger.stream_max_cnt(stream_id)
    }

    /// Requests a new dynamic table capacity, clamped to the peer's maximum.
    ///
    /// The change is announced at the start of the next `encode`. A decrease
    /// takes effect for new insertions immediately but is only announced once
    /// every entry beyond the new capacity can be evicted.
    pub fn set_max_dtable_capacity(&mut self, capacity: usize) {
        let capacity = capacity.min(self.ctx.hard_max_capacity());

        if self.ctx.effective_capacity() == capacity {
            return;
        }

        if self.min_capacity_update.map_or(true, |min| min > capacity) {
            self.min_capacity_update = Some(capacity);
            self.ctx.set_effective_capacity(capacity);
        }
        self.last_max_capacity_update = capacity;

        debug!(
            capacity,
            effective = self.ctx.effective_capacity(),
            "dynamic table capacity update requested"
        );
    }

    /// Encodes a field section for `stream_id`.
    pub fn encode(&mut self, stream_id: u64, fields: &[FieldLine]) -> Result<EncodedFieldSection> {
        let mut prefix = BytesMut::with_capacity(4);
        let mut field_lines = BytesMut::new();
        let mut encoder_stream = BytesMut::new();

        self.encode_into(
            stream_id,
            fields,
            &mut prefix,
            &mut field_lines,
            &mut encoder_stream,
        )?;

        Ok(EncodedFieldSection {
            prefix: prefix.freeze(),
            field_lines: field_lines.freeze(),
            encoder_stream: encoder_stream.freeze(),
        })
    }

    /// Encodes a field section, appending to caller-owned buffers.
    pub fn encode_into(
        &mut self,
        stream_id: u64,
        fields: &[FieldLine],
        prefix: &mut BytesMut,
        field_lines: &mut BytesMut,
        encoder_stream: &mut BytesMut,
    ) -> Result<()> {
        self.apply_pending_capacity(encoder_stream);

        let mut section = Section {
            base: self.ctx.table().insert_count(),
            allow_blocking: self.ledger.is_blocked(stream_id)
                || self.ledger.num_blocked() < self.max_blocked_streams,
            max_cnt: 0,
            min_cnt: None,
        };

        for field in fields {
            self.encode_field(&mut section, field, field_lines, encoder_stream)?;
        }

        if let Some(min_cnt) = section.min_cnt {
            self.ledger.track(stream_id, section.max_cnt, min_cnt);
        }

        FieldSectionPrefix::new(section.max_cnt, section.base)
            .encode(self.ctx.max_entries(), prefix);

        trace!(
            stream_id,
            required_insert_count = section.max_cnt,
            base = section.base,
            fields = fields.len(),
            "encoded field section"
        );

        Ok(())
    }

    fn encode_field(
        &mut self,
        section: &mut Section,
        field: &FieldLine,
        field_lines: &mut BytesMut,
        encoder_stream: &mut BytesMut,
    ) -> Result<()> {
        let mode = indexing_mode(field, self.ctx.effective_capacity());

        if mode != IndexingMode::Never {
            if let Some(index) = static_table::find_exact(&field.name, &field.value) {
                FieldLineRepr::IndexedStatic {
                    index: index as u64,
                }
                .encode(field_lines);
                return Ok(());
            }

            if let Some(absidx) = self.ctx.find_exact(&field.name, &field.value) {
                if self.is_referenceable(absidx, section.allow_blocking) {
                    section.reference(absidx);
                    section.indexed(absidx).encode(field_lines);
                    return Ok(());
                }

                let protected_from = self.protected_from(section);
                if mode == IndexingMode::Store
                    && section.allow_blocking
                    && self.ctx.is_draining(absidx)
                    && self.ctx.can_insert(field.size(), protected_from)
                {
                    EncoderInstruction::Duplicate {
                        index: self.ctx.table().insert_count() - 1 - absidx,
                    }
                    .encode(encoder_stream);

                    let entry = FieldLine::new(field.name.clone(), field.value.clone());
                    let absidx = self.ctx.insert(entry, protected_from)?;
                    section.reference(absidx);
                    section.indexed(absidx).encode(field_lines);
                    return Ok(());
                }
            }
        }

        let static_name = static_table::find_name(&field.name);
        let dynamic_name = match static_name {
            Some(_) => None,
            None => self.ctx.find_name(&field.name),
        };

        if mode == IndexingMode::Store && section.allow_blocking {
            let protected_from = self.protected_from(section);

            if self.ctx.can_insert(field.size(), protected_from) {
                let value = field.value.clone();
                let inst = match (static_name, dynamic_name) {
                    (Some(index), _) => EncoderInstruction::InsertWithNameRef {
                        is_static: true,
                        name_index: index as u64,
                        value,
                    },
                    (None, Some(absidx)) => EncoderInstruction::InsertWithNameRef {
                        is_static: false,
                        name_index: self.ctx.table().insert_count() - 1 - absidx,
                        value,
                    },
                    (None, None) => EncoderInstruction::InsertLiteral {
                        name: field.name.clone(),
                        value,
                    },
                };
                inst.encode(encoder_stream);

                let entry = FieldLine::new(field.name.clone(), field.value.clone());
                let absidx = self.ctx.insert(entry, protected_from)?;
                section.reference(absidx);
                section.indexed(absidx).encode(field_lines);
                return Ok(());
            }
        }

        let value = field.value.clone();
        let never_indexed = field.never_index;
        let repr = match (static_name, dynamic_name) {
            (Some(index), _) => FieldLineRepr::LiteralStaticName {
                index: index as u64,
                value,
                never_indexed,
            },
            (None, Some(absidx)) if self.is_referenceable(absidx, section.allow_blocking) => {
                section.reference(absidx);
                section.literal_with_name(absidx, value, never_indexed)
            }
            _ => FieldLineRepr::LiteralName {
                name: field.name.clone(),
                value,
                never_indexed,
            },
        };
        repr.encode(field_lines);

        Ok(())
    }

    /// True if a new section may point at the entry.
    fn is_referenceable(&self, absidx: u64, allow_blocking: bool) -> bool {
        !self.ctx.is_draining(absidx)
            && (absidx < self.ledger.known_received_count() || allow_blocking)
    }

    /// Lowest absolute index that must not be evicted.
    fn protected_from(&self, section: &Section) -> u64 {
        self.ledger
            .min_cnt()
            .into_iter()
            .chain(section.min_cnt)
            .min()
            .map_or(u64::MAX, |cnt| cnt - 1)
    }

    /// Evicts toward a requested capacity and announces it once the table
    /// fits.
    fn apply_pending_capacity(&mut self, encoder_stream: &mut BytesMut) {
        let Some(min) = self.min_capacity_update else {
            return;
        };

        let protected_from = self.ledger.min_cnt().map_or(u64::MAX, |cnt| cnt - 1);
        if !self.ctx.shrink(protected_from) {
            debug!(
                size = self.ctx.table().size(),
                capacity = min,
                "capacity update deferred until referenced entries are acknowledged"
            );
            return;
        }

        let last = self.last_max_capacity_update;
        if min < last {
            EncoderInstruction::SetCapacity {
                capacity: min as u64,
            }
            .encode(encoder_stream);
        }
        EncoderInstruction::SetCapacity {
            capacity: last as u64,
        }
        .encode(encoder_stream);

        self.ctx.announce_capacity(last);
        self.ctx.set_effective_capacity(last);
        self.min_capacity_update = None;

        debug!(min, capacity = last, "dynamic table capacity announced");
    }

    /// Processes bytes from the peer's decoder stream.
    ///
    /// A trailing partial instruction is kept until the next call, so the
    /// whole input is always consumed.
    pub fn read_decoder(&mut self, data: &[u8]) -> Result<usize> {
        let mut buf = std::mem::take(&mut self.decoder_stream_buf);
        buf.extend_from_slice(data);

        let mut pos = 0;
        while let Some((inst, n)) = DecoderInstruction::decode(&buf[pos..]).map_err(|e| {
            warn!(error = %e, "malformed decoder stream instruction");
            Error::decoder_stream(e)
        })? {
            pos += n;

            match inst {
                DecoderInstruction::SectionAck { stream_id } => self.ack_header(stream_id)?,
                DecoderInstruction::StreamCancel { stream_id } => self.cancel_stream(stream_id),
                DecoderInstruction::InsertCountIncrement { increment } => {
                    self.insert_count_increment(increment)?
                }
            }
        }

        buf.advance(pos);
        self.decoder_stream_buf = buf;

        Ok(data.len())
    }

    /// Handles a Section Acknowledgment for `stream_id`.
    pub fn ack_header(&mut self, stream_id: u64) -> Result<()> {
        self.ledger.acknowledge(stream_id).map(|_| ())
    }

    /// Handles a Stream Cancellation for `stream_id`.
    pub fn cancel_stream(&mut self, stream_id: u64) {
        self.ledger.cancel(stream_id);
    }

    /// Handles an Insert Count Increment.
    pub fn insert_count_increment(&mut self, increment: u64) -> Result<()> {
        self.ledger
            .increment(increment, self.ctx.table().insert_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(capacity: usize, max_blocked: usize) -> Encoder {
        let mut encoder = Encoder::new(capacity, max_blocked);
        encoder.set_max_dtable_capacity(capacity);
        encoder
    }

    #[test]
    fn test_indexing_mode() {
        let mode = |name: &'static str, value: &'static str| {
            indexing_mode(&FieldLine::new(name, value), 4096)
        };

        assert_eq!(mode("authorization", "secret"), IndexingMode::Never);
        assert_eq!(mode("cookie", "short"), IndexingMode::Never);
        assert_eq!(
            mode("cookie", "a-rather-long-session-value"),
            IndexingMode::Store
        );
        assert_eq!(mode(":path", "/index.html"), IndexingMode::Literal);
        assert_eq!(mode("content-length", "42"), IndexingMode::Literal);
        assert_eq!(mode("x-custom", "value"), IndexingMode::Store);
        assert_eq!(
            indexing_mode(&FieldLine::sensitive("x-custom", "value"), 4096),
            IndexingMode::Never
        );
        assert_eq!(
            indexing_mode(&FieldLine::new("x-custom", "value"), 40),
            IndexingMode::Literal
        );
    }

    #[test]
    fn test_encode_static_only() {
        let mut encoder = Encoder::new(4096, 100);
        let fields = [
            FieldLine::new(":method", "GET"),
            FieldLine::new(":scheme", "https"),
        ];

        let encoded = encoder.encode(0, &fields).unwrap();
        assert_eq!(&encoded.prefix[..], &[0x00, 0x00]);
        assert_eq!(&encoded.field_lines[..], &[0xd1, 0xd7]);
        assert!(encoded.encoder_stream.is_empty());
        assert_eq!(encoder.num_streams(), 0);
    }

    #[test]
    fn test_encode_with_insertion() {
        let mut encoder = encoder(4096, 100);
        let encoded = encoder.encode(0, &[FieldLine::new("foo", "bar")]).unwrap();

        // Set Dynamic Table Capacity 4096, then Insert With Literal Name
        assert_eq!(&encoded.encoder_stream[..3], &[0x3f, 0xe1, 0x1f]);
        assert_eq!(encoded.encoder_stream[3], 0x43);
        assert_eq!(&encoded.field_lines[..], &[0x10]);
        assert_eq!(&encoded.prefix[..], &[0x02, 0x80]);

        assert_eq!(encoder.table().insert_count(), 1);
        assert_eq!(encoder.table().capacity(), 4096);
        assert!(encoder.is_blocked(0));
        assert_eq!(encoder.min_cnt(), Some(1));
    }

    #[test]
    fn test_literal_only_fields_are_not_inserted() {
        let mut encoder = encoder(4096, 100);
        let encoded = encoder
            .encode(0, &[FieldLine::new(":path", "/index.html")])
            .unwrap();

        assert_eq!(encoded.field_lines[0], 0x51);
        assert_eq!(encoder.table().insert_count(), 0);
    }

    #[test]
    fn test_never_index_field() {
        let mut encoder = encoder(4096, 100);
        let encoded = encoder
            .encode(0, &[FieldLine::sensitive("x-secret", "hunter2")])
            .unwrap();

        // literal name with the N bit set
        assert_eq!(encoded.field_lines[0] & 0xf0, 0x30);
        assert_eq!(encoder.table().insert_count(), 0);

        // a static exact match still becomes a literal
        let encoded = encoder
            .encode(4, &[FieldLine::sensitive(":method", "GET")])
            .unwrap();
        assert_eq!(encoded.field_lines[0], 0x7f);
    }

    #[test]
    fn test_blocked_stream_limit() {
        let mut encoder = encoder(4096, 1);
        encoder.encode(0, &[FieldLine::new("foo", "bar")]).unwrap();
        assert_eq!(encoder.num_blocked(), 1);

        // stream 4 may not block: no insertion and no reference to entry 0
        let encoded = encoder.encode(4, &[FieldLine::new("foo", "bar")]).unwrap();
        assert!(encoded.encoder_stream.is_empty());
        assert_eq!(&encoded.prefix[..], &[0x00, 0x00]);
        assert_eq!(encoder.num_streams(), 1);

        // stream 0 is already blocked and can keep referencing new entries
        let encoded = encoder.encode(0, &[FieldLine::new("foo", "baz")]).unwrap();
        assert!(!encoded.encoder_stream.is_empty());
        assert_eq!(encoder.stream_max_cnt(0), Some(2));
        assert_eq!(encoder.num_blocked(), 1);
    }

    #[test]
    fn test_duplicate_draining_entry() {
        let mut encoder = encoder(128, 10);
        encoder.encode(0, &[FieldLine::new("foo1", "bar1")]).unwrap();
        encoder.encode(4, &[FieldLine::new("foo2", "bar2")]).unwrap();
        encoder.encode(8, &[FieldLine::new("foo3", "bar3")]).unwrap();
        for stream_id in [0, 4, 8] {
            encoder.ack_header(stream_id).unwrap();
        }

        let encoded = encoder.encode(12, &[FieldLine::new("foo1", "bar1")]).unwrap();
        assert_eq!(&encoded.encoder_stream[..], &[0x02]);
        assert_eq!(&encoded.field_lines[..], &[0x10]);
        assert_eq!(&encoded.prefix[..], &[0x05, 0x80]);
        assert_eq!(encoder.table().insert_count(), 4);
        assert_eq!(encoder.table().oldest_absidx(), Some(1));
    }

    #[test]
    fn test_draining_entry_not_duplicated_for_literal_field() {
        let mut encoder = encoder(256, 10);
        let filler = FieldLine::new("x-b", "b".repeat(45));
        let large = FieldLine::new("x-a", "a".repeat(55));
        assert_eq!(large.size(), 90);
        encoder.encode(0, &[filler, large.clone()]).unwrap();
        encoder.ack_header(0).unwrap();

        // at capacity 100 the field is too large to store, and its entry
        // drains once the filler is evicted
        encoder.set_max_dtable_capacity(100);
        let encoded = encoder.encode(4, &[large]).unwrap();
        assert_eq!(&encoded.encoder_stream[..], &[0x3f, 0x45]);
        assert_eq!(encoder.table().insert_count(), 2);
        assert_eq!(encoder.table().oldest_absidx(), Some(1));
        assert_eq!(encoded.field_lines[0] & 0xe0, 0x20);
        assert_eq!(encoder.num_streams(), 0);
    }

    #[test]
    fn test_read_decoder_partial_instruction() {
        let mut encoder = encoder(4096, 100);
        encoder.encode(0, &[FieldLine::new("foo", "bar")]).unwrap();

        // Section Acknowledgement for stream 200 needs two bytes
        encoder.cancel_stream(0);
        encoder.encode(200, &[FieldLine::new("foo", "bar")]).unwrap();

        let mut wire = Vec::new();
        DecoderInstruction::SectionAck { stream_id: 200 }.encode(&mut wire);
        assert_eq!(wire.len(), 2);

        assert_eq!(encoder.read_decoder(&wire[..1]).unwrap(), 1);
        assert_eq!(encoder.num_streams(), 1);
        assert_eq!(encoder.read_decoder(&wire[1..]).unwrap(), 1);
        assert_eq!(encoder.num_streams(), 0);
        assert_eq!(encoder.known_received_count(), 1);
    }

    #[test]
    fn test_decoder_stream_errors() {
        let mut encoder = encoder(4096, 100);
        encoder.encode(0, &[FieldLine::new("foo", "bar")]).unwrap();

        let err = encoder.read_decoder(&[0x84]).unwrap_err();
        assert_eq!(err.error_code(), Some(0x0202));

        let mut encoder = Encoder::new(4096, 100);
        assert!(encoder.insert_count_increment(1).is_err());
        assert!(encoder.read_decoder(&[0x00]).is_err());
    }

    #[test]
    fn test_cancel_stream_keeps_known_received_count() {
        let mut encoder = encoder(4096, 100);
        encoder.encode(0, &[FieldLine::new("foo", "bar")]).unwrap();

        encoder.cancel_stream(0);
        assert_eq!(encoder.num_blocked(), 0);
        assert_eq!(encoder.known_received_count(), 0);
        assert_eq!(encoder.min_cnt(), None);
    }

    #[test]
    fn test_capacity_is_clamped() {
        let mut encoder = Encoder::new(1024, 100);
        encoder.set_max_dtable_capacity(8192);
        assert_eq!(encoder.max_table_capacity(), 1024);
        assert_eq!(encoder.last_max_capacity_update(), 1024);
        assert_eq!(encoder.min_capacity_update(), Some(1024));

        let encoded = encoder.encode(0, &[]).unwrap();
        let mut expected = Vec::new();
        EncoderInstruction::SetCapacity { capacity: 1024 }.encode(&mut expected);
        assert_eq!(&encoded.encoder_stream[..], &expected[..]);
        assert_eq!(encoder.min_capacity_update(), None);
    }

    #[test]
    fn test_with_config_uses_local_capacity() {
        let config = QpackConfig {
            encoder_table_capacity: Some(1024),
            ..QpackConfig::default()
        };
        let encoder = Encoder::with_config(4096, 16, &config);
        assert_eq!(encoder.max_table_capacity(), 1024);
        assert_eq!(encoder.hard_max_table_capacity(), 4096);
    }
}
