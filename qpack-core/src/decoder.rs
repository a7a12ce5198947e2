//! QPACK decoder per RFC 9204.
//!
//! Applies the peer's encoder stream to a local copy of the dynamic table and
//! decodes field sections incrementally, one field line per call. A section
//! whose Required Insert Count is ahead of the table blocks until enough
//! insertions arrive; the decoder reports it instead of failing.
//!
//! Feedback for the peer's encoder (Section Acknowledgments, Stream
//! Cancellations, Insert Count Increments) is queued and written out by
//! [`Decoder::write_decoder`].

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::QpackConfig;
use crate::error::{Error, Result};
use crate::field_line::FieldLine;
use crate::header_block::{FieldLineRepr, FieldSectionPrefix};
use crate::instructions::{DecoderInstruction, EncoderInstruction};
use crate::ledger::BlockedStreams;
use crate::static_table;
use crate::table::DynamicTable;

/// Flags describing the result of [`Decoder::read_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeFlags(u8);

impl DecodeFlags {
    pub const NONE: DecodeFlags = DecodeFlags(0);
    /// A field line was decoded.
    pub const EMIT: DecodeFlags = DecodeFlags(0x01);
    /// The field section is complete.
    pub const FINAL: DecodeFlags = DecodeFlags(0x02);
    /// The section references entries not received yet.
    pub const BLOCKED: DecodeFlags = DecodeFlags(0x04);

    pub fn contains(self, other: DecodeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Result of one [`Decoder::read_request`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes of the input taken, including bytes held back for a partial
    /// representation. Always zero when blocked.
    pub consumed: usize,
    pub flags: DecodeFlags,
    /// Set together with [`DecodeFlags::EMIT`].
    pub field: Option<FieldLine>,
}

impl ReadOutcome {
    fn new(consumed: usize, flags: DecodeFlags) -> Self {
        Self {
            consumed,
            flags,
            field: None,
        }
    }
}

/// Where a stream is in its field section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    #[default]
    AwaitingPrefix,
    /// Prefix read; the table is behind the Required Insert Count.
    AwaitingEntries,
    Consuming,
    Done,
}

/// Per-stream decoding state, owned by the caller.
#[derive(Debug, Clone)]
pub struct StreamContext {
    stream_id: u64,
    state: DecodeState,
    prefix: FieldSectionPrefix,
    /// Encoded length of the prefix. While blocked the prefix is left
    /// unconsumed at the front of the input.
    prefix_len: usize,
    /// Bytes of an incomplete prefix or representation.
    partial: BytesMut,
    /// Largest absolute index referenced so far.
    max_ref: Option<u64>,
}

impl StreamContext {
    pub fn new(stream_id: u64) -> Self {
        Self {
            stream_id,
            state: DecodeState::AwaitingPrefix,
            prefix: FieldSectionPrefix::default(),
            prefix_len: 0,
            partial: BytesMut::new(),
            max_ref: None,
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Required Insert Count, once the prefix has been read.
    pub fn required_insert_count(&self) -> u64 {
        self.prefix.required_insert_count
    }

    pub fn base(&self) -> u64 {
        self.prefix.base
    }

    /// Prepares the context for the next field section on the same stream,
    /// such as trailers.
    pub fn reset(&mut self) {
        *self = Self::new(self.stream_id);
    }
}

/// Outcome of one step over the buffered input.
enum Step {
    Emit(FieldLine, usize),
    /// Nothing consumed; the prefix stays at the front of the input.
    Blocked,
    Final(usize),
    NeedMore(usize),
}

impl Step {
    /// Bytes of the step's input taken.
    fn used(&self) -> usize {
        match self {
            Step::Emit(_, used) | Step::Final(used) | Step::NeedMore(used) => *used,
            Step::Blocked => 0,
        }
    }
}

/// QPACK decoder state.
#[derive(Debug)]
pub struct Decoder {
    table: DynamicTable,
    /// Our SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    max_table_capacity: usize,
    /// Our SETTINGS_QPACK_BLOCKED_STREAMS.
    max_blocked_streams: usize,
    blocked: BlockedStreams,
    /// Partial instruction left over from the last encoder stream read.
    encoder_stream_buf: BytesMut,
    /// Section Acknowledgments and Stream Cancellations not yet written.
    feedback: Vec<DecoderInstruction>,
    /// Insert count the peer is known to have been told about.
    written_icnt: u64,
}

impl Decoder {
    /// Creates a decoder advertising the given table capacity and blocked
    /// stream limit.
    pub fn new(max_table_capacity: usize, max_blocked_streams: usize) -> Self {
        Self {
            table: DynamicTable::new(0),
            max_table_capacity,
            max_blocked_streams,
            blocked: BlockedStreams::new(),
            encoder_stream_buf: BytesMut::new(),
            feedback: Vec::new(),
            written_icnt: 0,
        }
    }

    pub fn with_config(config: &QpackConfig) -> Self {
        Self::new(config.max_table_capacity, config.max_blocked_streams)
    }

    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    pub fn max_table_capacity(&self) -> usize {
        self.max_table_capacity
    }

    pub fn insert_count(&self) -> u64 {
        self.table.insert_count()
    }

    /// Insert count already reported to the peer.
    pub fn written_icnt(&self) -> u64 {
        self.written_icnt
    }

    pub fn num_blocked(&self) -> usize {
        self.blocked.len()
    }

    fn max_entries(&self) -> u64 {
        (self.max_table_capacity / 32) as u64
    }

    /// Processes bytes from the peer's encoder stream.
    ///
    /// A trailing partial instruction is kept until the next call, so the
    /// whole input is always consumed.
    pub fn read_encoder(&mut self, data: &[u8]) -> Result<usize> {
        let mut buf = std::mem::take(&mut self.encoder_stream_buf);
        buf.extend_from_slice(data);

        let mut pos = 0;
        // the capacity only changes between instructions, so it bounds the
        // literals of the one being decoded
        while let Some((inst, n)) =
            EncoderInstruction::decode_with_limit(&buf[pos..], self.table.capacity()).map_err(
                |e| {
                    warn!(error = %e, "malformed encoder stream instruction");
                    Error::encoder_stream(e)
                },
            )?
        {
            pos += n;
            self.apply(inst)?;
        }

        buf.advance(pos);
        self.encoder_stream_buf = buf;

        Ok(data.len())
    }

    fn apply(&mut self, inst: EncoderInstruction) -> Result<()> {
        let field = match inst {
            EncoderInstruction::SetCapacity { capacity } => {
                if capacity > self.max_table_capacity as u64 {
                    warn!(capacity, max = self.max_table_capacity, "capacity above our maximum");
                    return Err(Error::EncoderStreamError(format!(
                        "dynamic table capacity {} exceeds maximum {}",
                        capacity, self.max_table_capacity
                    )));
                }
                self.table.set_capacity(capacity as usize);
                debug!(capacity, "dynamic table capacity set");
                return Ok(());
            }

            EncoderInstruction::InsertWithNameRef {
                is_static: true,
                name_index,
                value,
            } => {
                let entry = static_table::get(name_index).ok_or_else(|| {
                    warn!(name_index, "insert references invalid static entry");
                    Error::EncoderStreamError(format!("invalid static index {}", name_index))
                })?;
                FieldLine::new(Bytes::from_static(entry.name), value)
            }

            EncoderInstruction::InsertWithNameRef {
                is_static: false,
                name_index,
                value,
            } => {
                let name = self.encoder_stream_entry(name_index)?.name.clone();
                FieldLine::new(name, value)
            }

            EncoderInstruction::InsertLiteral { name, value } => FieldLine::new(name, value),

            EncoderInstruction::Duplicate { index } => {
                let entry = self.encoder_stream_entry(index)?;
                FieldLine::new(entry.name.clone(), entry.value.clone())
            }
        };

        let size = field.size();
        let insert_count = self.table.insert_count();
        if self.table.insert(field, insert_count)?.is_none() {
            warn!(size, capacity = self.table.capacity(), "inserted entry does not fit");
            return Err(Error::EncoderStreamError(format!(
                "entry of {} bytes exceeds table capacity {}",
                size,
                self.table.capacity()
            )));
        }

        Ok(())
    }

    /// Entry referenced by an encoder stream relative index.
    fn encoder_stream_entry(&self, relative: u64) -> Result<&FieldLine> {
        self.table
            .get_relative(relative, self.table.insert_count())
            .map(|entry| entry.field())
            .ok_or_else(|| {
                warn!(relative, "encoder stream references missing entry");
                Error::EncoderStreamError(format!("invalid relative index {}", relative))
            })
    }

    /// Decodes the next piece of a field section.
    ///
    /// `data` continues where the previous call's `consumed` left off and
    /// `fin` marks the end of the section. Each call emits at most one field
    /// line. A blocked call consumes nothing, even when part of the prefix
    /// arrived in earlier calls; retry with the same `data` once
    /// [`unblocked_streams`](Decoder::unblocked_streams) lists the stream.
    pub fn read_request(
        &mut self,
        ctx: &mut StreamContext,
        data: &[u8],
        fin: bool,
    ) -> Result<ReadOutcome> {
        let (step, consumed) = if ctx.partial.is_empty() {
            let step = self.step(ctx, data, fin)?;
            let used = step.used();
            if matches!(step, Step::NeedMore(_)) && !fin && used < data.len() {
                ctx.partial.extend_from_slice(&data[used..]);
                return Ok(ReadOutcome::new(data.len(), DecodeFlags::NONE));
            }
            (step, used)
        } else {
            let mut buf = std::mem::take(&mut ctx.partial);
            let buffered = buf.len();
            buf.extend_from_slice(data);
            let step = self.step(ctx, &buf, fin)?;
            if matches!(step, Step::Blocked) {
                // the caller presents `data` again on retry
                buf.truncate(buffered);
                ctx.partial = buf;
                (step, 0)
            } else {
                buf.advance(step.used());
                ctx.partial = buf;
                (step, data.len())
            }
        };

        match step {
            Step::Emit(field, _) => Ok(ReadOutcome {
                consumed,
                flags: DecodeFlags::EMIT,
                field: Some(field),
            }),
            Step::Blocked => Ok(ReadOutcome::new(consumed, DecodeFlags::BLOCKED)),
            Step::Final(_) => Ok(ReadOutcome::new(consumed, DecodeFlags::FINAL)),
            Step::NeedMore(_) if fin => {
                warn!(stream_id = ctx.stream_id, "field section truncated");
                Err(Error::DecompressionFailed(format!(
                    "field section on stream {} ends inside a representation",
                    ctx.stream_id
                )))
            }
            Step::NeedMore(_) => Ok(ReadOutcome::new(consumed, DecodeFlags::NONE)),
        }
    }

    fn step(&mut self, ctx: &mut StreamContext, buf: &[u8], fin: bool) -> Result<Step> {
        let mut pos = 0;

        loop {
            match ctx.state {
                DecodeState::AwaitingPrefix => {
                    let decoded = FieldSectionPrefix::decode(
                        &buf[pos..],
                        self.max_entries(),
                        self.table.insert_count(),
                    )
                    .map_err(|e| {
                        warn!(stream_id = ctx.stream_id, error = %e, "invalid field section prefix");
                        Error::decompression(e)
                    })?;

                    let Some((prefix, n)) = decoded else {
                        return Ok(Step::NeedMore(pos));
                    };
                    pos += n;
                    ctx.prefix = prefix;
                    ctx.prefix_len = n;
                    ctx.state = DecodeState::AwaitingEntries;
                }

                DecodeState::AwaitingEntries => {
                    let ric = ctx.prefix.required_insert_count;
                    if ric > self.table.insert_count() {
                        self.block(ctx.stream_id, ric)?;
                        return Ok(Step::Blocked);
                    }

                    if self.blocked.remove(ctx.stream_id) {
                        debug!(stream_id = ctx.stream_id, "stream unblocked");
                    }
                    pos = ctx.prefix_len;
                    ctx.state = DecodeState::Consuming;
                }

                DecodeState::Consuming => {
                    if pos == buf.len() {
                        if fin {
                            self.finish(ctx)?;
                            return Ok(Step::Final(pos));
                        }
                        return Ok(Step::NeedMore(pos));
                    }

                    let decoded = FieldLineRepr::decode(&buf[pos..]).map_err(|e| {
                        warn!(stream_id = ctx.stream_id, error = %e, "invalid field line");
                        Error::decompression(e)
                    })?;

                    let Some((repr, n)) = decoded else {
                        return Ok(Step::NeedMore(pos));
                    };
                    let field = self.resolve(ctx, repr)?;
                    return Ok(Step::Emit(field, pos + n));
                }

                DecodeState::Done => {
                    if pos < buf.len() {
                        warn!(stream_id = ctx.stream_id, "data after end of field section");
                        return Err(Error::DecompressionFailed(format!(
                            "data after end of field section on stream {}",
                            ctx.stream_id
                        )));
                    }
                    return Ok(Step::Final(pos));
                }
            }
        }
    }

    fn block(&mut self, stream_id: u64, ric: u64) -> Result<()> {
        if self.blocked.contains(stream_id) {
            return Ok(());
        }

        if self.blocked.len() >= self.max_blocked_streams {
            warn!(
                stream_id,
                max = self.max_blocked_streams,
                "blocked stream limit exceeded"
            );
            return Err(Error::DecompressionFailed(format!(
                "stream {} would exceed the limit of {} blocked streams",
                stream_id, self.max_blocked_streams
            )));
        }

        self.blocked.insert(stream_id, ric);
        debug!(
            stream_id,
            required_insert_count = ric,
            insert_count = self.table.insert_count(),
            "stream blocked"
        );
        Ok(())
    }

    /// Turns a representation into a field line, checking every dynamic
    /// reference against the section's Required Insert Count.
    fn resolve(&self, ctx: &mut StreamContext, repr: FieldLineRepr) -> Result<FieldLine> {
        let base = ctx.prefix.base;

        let field = match repr {
            FieldLineRepr::IndexedStatic { index } => {
                let entry = self.static_entry(ctx, index)?;
                FieldLine::new(
                    Bytes::from_static(entry.name),
                    Bytes::from_static(entry.value),
                )
            }

            FieldLineRepr::IndexedDynamic { relative } => {
                let absidx = relative_to_absolute(base, relative);
                let field = self.dynamic_entry(ctx, absidx)?;
                FieldLine::new(field.name.clone(), field.value.clone())
            }

            FieldLineRepr::IndexedPostBase { index } => {
                let absidx = base.checked_add(index);
                let field = self.dynamic_entry(ctx, absidx)?;
                FieldLine::new(field.name.clone(), field.value.clone())
            }

            FieldLineRepr::LiteralStaticName {
                index,
                value,
                never_indexed,
            } => {
                let entry = self.static_entry(ctx, index)?;
                literal(Bytes::from_static(entry.name), value, never_indexed)
            }

            FieldLineRepr::LiteralDynamicName {
                relative,
                value,
                never_indexed,
            } => {
                let absidx = relative_to_absolute(base, relative);
                let name = self.dynamic_entry(ctx, absidx)?.name.clone();
                literal(name, value, never_indexed)
            }

            FieldLineRepr::LiteralPostBaseName {
                index,
                value,
                never_indexed,
            } => {
                let absidx = base.checked_add(index);
                let name = self.dynamic_entry(ctx, absidx)?.name.clone();
                literal(name, value, never_indexed)
            }

            FieldLineRepr::LiteralName {
                name,
                value,
                never_indexed,
            } => literal(name, value, never_indexed),
        };

        trace!(stream_id = ctx.stream_id, ?field, "decoded field line");
        Ok(field)
    }

    fn static_entry(
        &self,
        ctx: &StreamContext,
        index: u64,
    ) -> Result<&'static static_table::StaticEntry> {
        static_table::get(index).ok_or_else(|| {
            warn!(stream_id = ctx.stream_id, index, "invalid static table index");
            Error::DecompressionFailed(format!("invalid static table index {}", index))
        })
    }

    fn dynamic_entry(&self, ctx: &mut StreamContext, absidx: Option<u64>) -> Result<&FieldLine> {
        let ric = ctx.prefix.required_insert_count;

        let Some(absidx) = absidx.filter(|&abs| abs < ric) else {
            warn!(
                stream_id = ctx.stream_id,
                required_insert_count = ric,
                "reference outside the required insert count"
            );
            return Err(Error::DecompressionFailed(format!(
                "dynamic reference on stream {} outside required insert count {}",
                ctx.stream_id, ric
            )));
        };

        let entry = self.table.get(absidx).ok_or_else(|| {
            warn!(stream_id = ctx.stream_id, absidx, "reference to evicted entry");
            Error::DecompressionFailed(format!("reference to evicted entry {}", absidx))
        })?;

        ctx.max_ref = Some(ctx.max_ref.map_or(absidx, |max| max.max(absidx)));
        Ok(entry.field())
    }

    /// Validates the finished section and queues its acknowledgment.
    fn finish(&mut self, ctx: &mut StreamContext) -> Result<()> {
        let ric = ctx.prefix.required_insert_count;

        if ric > 0 {
            if ctx.max_ref.map(|max| max + 1) != Some(ric) {
                warn!(
                    stream_id = ctx.stream_id,
                    required_insert_count = ric,
                    "required insert count larger than referenced entries"
                );
                return Err(Error::DecompressionFailed(format!(
                    "required insert count {} on stream {} not matched by any reference",
                    ric, ctx.stream_id
                )));
            }

            self.feedback.push(DecoderInstruction::SectionAck {
                stream_id: ctx.stream_id,
            });
            self.written_icnt = self.written_icnt.max(ric);
        }

        ctx.state = DecodeState::Done;
        trace!(stream_id = ctx.stream_id, "field section complete");
        Ok(())
    }

    /// Streams that were blocked and can now make progress.
    pub fn unblocked_streams(&self) -> Vec<u64> {
        self.blocked.ready(self.table.insert_count()).collect()
    }

    /// Abandons decoding on a stream, e.g. after it was reset.
    ///
    /// Queues a Stream Cancellation unless the dynamic table is disabled.
    pub fn cancel_stream(&mut self, stream_id: u64) {
        self.blocked.remove(stream_id);

        if self.max_table_capacity == 0 {
            return;
        }

        self.feedback
            .push(DecoderInstruction::StreamCancel { stream_id });
        debug!(stream_id, "stream cancellation queued");
    }

    fn pending_increment(&self) -> Option<DecoderInstruction> {
        let increment = self.table.insert_count() - self.written_icnt;
        (increment > 0).then_some(DecoderInstruction::InsertCountIncrement { increment })
    }

    /// Bytes [`write_decoder`](Decoder::write_decoder) would produce now.
    pub fn decoder_stream_len(&self) -> usize {
        self.feedback
            .iter()
            .chain(self.pending_increment().as_ref())
            .map(DecoderInstruction::encoded_len)
            .sum()
    }

    /// Writes pending decoder stream instructions into `buf`.
    ///
    /// Fails with [`Error::BufferTooSmall`] without consuming anything if
    /// `buf` cannot hold all of them.
    pub fn write_decoder(&mut self, buf: &mut [u8]) -> Result<usize> {
        let needed = self.decoder_stream_len();
        if buf.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        let mut out = &mut buf[..];
        self.drain_feedback(&mut out);
        Ok(needed)
    }

    /// Takes pending decoder stream instructions as one buffer.
    pub fn take_decoder_stream(&mut self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.decoder_stream_len());
        self.drain_feedback(&mut buf);
        buf.freeze()
    }

    fn drain_feedback<B: bytes::BufMut>(&mut self, buf: &mut B) {
        for inst in self.feedback.drain(..) {
            inst.encode(buf);
        }

        if let Some(inst) = self.pending_increment() {
            inst.encode(buf);
            self.written_icnt = self.table.insert_count();
        }
    }
}

fn relative_to_absolute(base: u64, relative: u64) -> Option<u64> {
    base.checked_sub(relative)?.checked_sub(1)
}

fn literal(name: Bytes, value: Bytes, never_index: bool) -> FieldLine {
    FieldLine {
        name,
        value,
        never_index,
    }
}
