//! QPACK encoder/decoder pair for one HTTP/3 connection.
//!
//! Owns the encoder and decoder along with their unidirectional streams
//! (RFC 9204 Section 4.2):
//! - encoder stream (type 0x02) carrying our dynamic table updates
//! - decoder stream (type 0x03) carrying our acknowledgments
//!
//! Field sections that arrive before the insertions they depend on are parked
//! and completed once the peer's encoder stream catches up.

use std::collections::HashMap;

use bytes::{Buf, Bytes, BytesMut};
use tracing::debug;

use crate::config::QpackConfig;
use crate::decoder::{DecodeFlags, Decoder, StreamContext};
use crate::encoder::Encoder;
use crate::error::Result;
use crate::field_line::FieldLine;

/// Result of decoding a field section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSection {
    Complete(Vec<FieldLine>),
    /// Waiting for encoder stream data; delivered by
    /// [`QpackConnection::process_encoder_stream_data`].
    Blocked,
}

/// A field section waiting on the dynamic table.
#[derive(Debug)]
struct ParkedSection {
    ctx: StreamContext,
    fields: Vec<FieldLine>,
    remaining: Bytes,
}

/// QPACK state for one HTTP/3 connection.
#[derive(Debug)]
pub struct QpackConnection {
    encoder: Encoder,
    decoder: Decoder,
    encoder_stream_id: Option<u64>,
    decoder_stream_id: Option<u64>,
    /// Encoder stream bytes not yet handed to the transport.
    encoder_instructions_buffer: BytesMut,
    parked: HashMap<u64, ParkedSection>,
}

impl QpackConnection {
    /// Creates the QPACK state once the peer's SETTINGS are known.
    pub fn new(
        config: &QpackConfig,
        peer_max_table_capacity: usize,
        peer_max_blocked_streams: usize,
    ) -> Self {
        Self {
            encoder: Encoder::with_config(
                peer_max_table_capacity,
                peer_max_blocked_streams,
                config,
            ),
            decoder: Decoder::with_config(config),
            encoder_stream_id: None,
            decoder_stream_id: None,
            encoder_instructions_buffer: BytesMut::new(),
            parked: HashMap::new(),
        }
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Register the encoder stream ID.
    ///
    /// Called when the encoder stream (type 0x02) is opened.
    pub fn set_encoder_stream(&mut self, stream_id: u64) {
        self.encoder_stream_id = Some(stream_id);
    }

    /// Register the decoder stream ID.
    ///
    /// Called when the decoder stream (type 0x03) is opened.
    pub fn set_decoder_stream(&mut self, stream_id: u64) {
        self.decoder_stream_id = Some(stream_id);
    }

    pub fn encoder_stream_id(&self) -> Option<u64> {
        self.encoder_stream_id
    }

    pub fn decoder_stream_id(&self) -> Option<u64> {
        self.decoder_stream_id
    }

    /// Encode a field section for a request or response on `stream_id`.
    ///
    /// Returns the HEADERS frame payload. Encoder stream instructions are
    /// buffered; send them before or with the frame.
    pub fn encode_field_section(&mut self, stream_id: u64, fields: &[FieldLine]) -> Result<Bytes> {
        let encoded = self.encoder.encode(stream_id, fields)?;
        self.encoder_instructions_buffer
            .extend_from_slice(&encoded.encoder_stream);
        Ok(encoded.header_block())
    }

    /// Decode a complete field section received on `stream_id`.
    pub fn decode_field_section(&mut self, stream_id: u64, encoded: Bytes) -> Result<FieldSection> {
        let mut section = ParkedSection {
            ctx: StreamContext::new(stream_id),
            fields: Vec::new(),
            remaining: encoded,
        };

        if self.drive(&mut section)? {
            return Ok(FieldSection::Complete(section.fields));
        }

        debug!(
            stream_id,
            required_insert_count = section.ctx.required_insert_count(),
            "field section parked"
        );
        self.parked.insert(stream_id, section);
        Ok(FieldSection::Blocked)
    }

    /// Runs the decoder until the section completes (true) or blocks (false).
    fn drive(&mut self, section: &mut ParkedSection) -> Result<bool> {
        loop {
            let outcome = self
                .decoder
                .read_request(&mut section.ctx, &section.remaining, true)?;
            section.remaining.advance(outcome.consumed);

            if let Some(field) = outcome.field {
                section.fields.push(field);
            }
            if outcome.flags.contains(DecodeFlags::FINAL) {
                return Ok(true);
            }
            if outcome.flags.contains(DecodeFlags::BLOCKED) {
                return Ok(false);
            }
        }
    }

    /// Process data received on the peer's encoder stream.
    ///
    /// Returns the field sections this data unblocked, by stream ID.
    pub fn process_encoder_stream_data(
        &mut self,
        data: &[u8],
    ) -> Result<Vec<(u64, Vec<FieldLine>)>> {
        self.decoder.read_encoder(data)?;

        let mut completed = Vec::new();
        for stream_id in self.decoder.unblocked_streams() {
            let Some(mut section) = self.parked.remove(&stream_id) else {
                continue;
            };

            if self.drive(&mut section)? {
                debug!(stream_id, "parked field section completed");
                completed.push((stream_id, section.fields));
            } else {
                self.parked.insert(stream_id, section);
            }
        }

        Ok(completed)
    }

    /// Process data received on the peer's decoder stream.
    pub fn process_decoder_stream_data(&mut self, data: &[u8]) -> Result<()> {
        self.encoder.read_decoder(data).map(|_| ())
    }

    /// Forget a request stream the peer or the application reset.
    pub fn reset_stream(&mut self, stream_id: u64) {
        self.parked.remove(&stream_id);
        self.decoder.cancel_stream(stream_id);
    }

    /// Number of field sections waiting for encoder stream data.
    pub fn num_parked(&self) -> usize {
        self.parked.len()
    }

    /// Get buffered encoder stream instructions to send.
    ///
    /// Returns instructions and clears the buffer.
    pub fn take_encoder_instructions(&mut self) -> Option<Bytes> {
        if self.encoder_instructions_buffer.is_empty() {
            None
        } else {
            Some(self.encoder_instructions_buffer.split().freeze())
        }
    }

    /// Get pending decoder stream instructions to send.
    pub fn take_decoder_instructions(&mut self) -> Option<Bytes> {
        if self.decoder.decoder_stream_len() == 0 {
            None
        } else {
            Some(self.decoder.take_decoder_stream())
        }
    }
}
