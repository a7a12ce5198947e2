//! Error types for QPACK operations.
//!
//! Protocol errors map to the HTTP/3 error codes of RFC 9204 Section 6.
//! Local conditions (a short output buffer, a failed allocation, a rejected
//! configuration) carry no wire code and are reported to the caller as-is.
//!
//! A blocked header block is not an error. The decoder signals it through
//! [`DecodeFlags::BLOCKED`](crate::decoder::DecodeFlags::BLOCKED).

use std::collections::TryReserveError;
use thiserror::Error;

/// Result type for QPACK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during QPACK operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Decoding of a field section failed.
    ///
    /// Maps to `QPACK_DECOMPRESSION_FAILED` (0x0200). Raised for:
    /// - invalid static or dynamic table references
    /// - an invalid Required Insert Count or Base
    /// - a truncated or malformed field line representation
    /// - exceeding the blocked stream budget
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// The peer's encoder stream carried an invalid instruction.
    ///
    /// Maps to `QPACK_ENCODER_STREAM_ERROR` (0x0201).
    #[error("encoder stream error: {0}")]
    EncoderStreamError(String),

    /// The peer's decoder stream carried an invalid instruction.
    ///
    /// Maps to `QPACK_DECODER_STREAM_ERROR` (0x0202).
    #[error("decoder stream error: {0}")]
    DecoderStreamError(String),

    /// The caller supplied an output buffer that cannot hold the result.
    ///
    /// Nothing was written and no state changed; retry with a larger buffer.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Growing an internal buffer failed.
    #[error("allocation failed: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Low-level wire format errors.
///
/// Produced by the integer, literal and instruction codecs, which do not know
/// which stream the bytes came from. Callers translate them into the matching
/// protocol error with [`Error::decompression`], [`Error::encoder_stream`] or
/// [`Error::decoder_stream`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("integer exceeds 62 bits")]
    IntegerOverflow,

    #[error("huffman-coded literals are not supported")]
    HuffmanUnsupported,

    #[error("length exceeds addressable memory")]
    LengthOverflow,

    #[error("literal longer than any entry the table can hold")]
    EntryTooLarge,

    #[error("invalid required insert count")]
    InvalidRequiredInsertCount,

    #[error("invalid base")]
    InvalidBase,
}

impl Error {
    /// Returns the HTTP/3 error code for protocol errors.
    pub fn error_code(&self) -> Option<u64> {
        match self {
            Error::DecompressionFailed(_) => Some(0x0200),
            Error::EncoderStreamError(_) => Some(0x0201),
            Error::DecoderStreamError(_) => Some(0x0202),
            _ => None,
        }
    }

    /// Returns true if retrying the same call with more room can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::BufferTooSmall { .. })
    }

    /// Returns true if the error must tear down the stream or connection.
    pub fn is_protocol_error(&self) -> bool {
        self.error_code().is_some()
    }

    pub(crate) fn decompression(err: WireError) -> Self {
        Error::DecompressionFailed(err.to_string())
    }

    pub(crate) fn encoder_stream(err: WireError) -> Self {
        Error::EncoderStreamError(err.to_string())
    }

    pub(crate) fn decoder_stream(err: WireError) -> Self {
        Error::DecoderStreamError(err.to_string())
    }
}
