//! QPACK: Field Compression for HTTP/3 (RFC 9204)
//!
//! This crate implements the dynamic table and acknowledgment engine of
//! QPACK: an [`Encoder`] that decides how each field line is represented and
//! which entries to insert, a [`Decoder`] that rebuilds field sections and
//! parks the ones waiting on the dynamic table, and the bookkeeping that keeps
//! both sides from evicting entries the other still needs.
//!
//! # Features
//!
//! - Static table (99 entries) and dynamic table with eviction.
//! - Encoder and decoder stream instructions, including partial reads.
//! - Blocked stream accounting on both sides.
//! - Deferred capacity reductions that never evict unacknowledged entries.
//!
//! Huffman-coded string literals are rejected.
//!
//! # Example
//!
//! ```rust
//! use qpack_core::{FieldLine, FieldSection, QpackConfig, QpackConnection};
//!
//! let config = QpackConfig::default();
//! let mut client = QpackConnection::new(&config, 4096, 100);
//! let mut server = QpackConnection::new(&config, 4096, 100);
//!
//! let fields = vec![
//!     FieldLine::new(":method", "GET"),
//!     FieldLine::new(":path", "/"),
//!     FieldLine::new("user-agent", "qpack-core"),
//! ];
//! let block = client.encode_field_section(0, &fields).unwrap();
//!
//! if let Some(instructions) = client.take_encoder_instructions() {
//!     server.process_encoder_stream_data(&instructions).unwrap();
//! }
//! let decoded = server.decode_field_section(0, block).unwrap();
//! assert_eq!(decoded, FieldSection::Complete(fields));
//! ```

pub mod config;
pub mod connection;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod field_line;
pub mod header_block;
pub mod instructions;
pub mod ledger;
pub mod literal;
pub mod prefix_int;
pub mod static_table;
pub mod table;

// Re-export main types
pub use config::QpackConfig;
pub use connection::{FieldSection, QpackConnection};
pub use decoder::{DecodeFlags, DecodeState, Decoder, ReadOutcome, StreamContext};
pub use encoder::{EncodedFieldSection, Encoder};
pub use error::{Error, Result, WireError};
pub use field_line::FieldLine;
pub use instructions::{DecoderInstruction, EncoderInstruction};
pub use table::DynamicTable;

// Re-export utilities for benchmarking and testing
pub use prefix_int::{decode_int, encode_int};
