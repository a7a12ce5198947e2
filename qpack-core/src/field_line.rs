//! Field line representation.
//!
//! Represents an HTTP header or trailer field as a name-value pair. Names and
//! values are [`Bytes`], so a decoded field and the dynamic table entry it came
//! from share one allocation; the buffer is released once both are dropped.

use bytes::Bytes;
use std::fmt;

/// Per-entry overhead for dynamic table accounting (RFC 9204 Section 3.2.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// An HTTP field line (name-value pair).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldLine {
    pub name: Bytes,
    pub value: Bytes,
    /// Never insert this field into a dynamic table, on this hop or the next.
    pub never_index: bool,
}

impl FieldLine {
    /// Creates a new field line.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            never_index: false,
        }
    }

    /// Creates a field line that must always be sent as a literal.
    pub fn sensitive(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            never_index: true,
            ..Self::new(name, value)
        }
    }

    /// Returns the size of this field line for dynamic table accounting.
    pub fn size(&self) -> usize {
        entry_size(&self.name, &self.value)
    }
}

/// Size of a table entry with the given name and value.
#[inline]
pub fn entry_size(name: &[u8], value: &[u8]) -> usize {
    name.len() + value.len() + ENTRY_OVERHEAD
}

impl fmt::Debug for FieldLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldLine({:?}: {:?}{})",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value),
            if self.never_index { ", never-index" } else { "" }
        )
    }
}

impl From<(&'static str, &'static str)> for FieldLine {
    fn from((name, value): (&'static str, &'static str)) -> Self {
        Self::new(name, value)
    }
}
