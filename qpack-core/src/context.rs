//! Encoder side view of the dynamic table.
//!
//! Wraps the table with lookup indices so the encoder can find reusable
//! entries by name or by name and value, and owns the capacities the encoder
//! works with:
//! - the hard maximum, from the peer's SETTINGS_QPACK_MAX_TABLE_CAPACITY
//! - the announced capacity, last sent in Set Dynamic Table Capacity
//! - the effective capacity, which the encoder keeps the table within
//!
//! The effective capacity drops below the announced one while a capacity
//! decrease waits for referenced entries to be acknowledged.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::Result;
use crate::field_line::FieldLine;
use crate::table::{DynamicTable, Entry};

/// Entries sharing one name.
#[derive(Debug, Default)]
struct NameSlot {
    /// Newest entry with this name.
    newest: u64,
    /// Newest entry per value.
    values: HashMap<Bytes, u64>,
}

/// Dynamic table plus the lookup state the encoder needs.
#[derive(Debug)]
pub struct EncoderContext {
    table: DynamicTable,
    names: HashMap<Bytes, NameSlot>,
    hard_max_capacity: usize,
    effective_capacity: usize,
}

impl EncoderContext {
    pub fn new(hard_max_capacity: usize) -> Self {
        Self {
            table: DynamicTable::new(0),
            names: HashMap::new(),
            hard_max_capacity,
            effective_capacity: 0,
        }
    }

    pub fn table(&self) -> &DynamicTable {
        &self.table
    }

    pub fn hard_max_capacity(&self) -> usize {
        self.hard_max_capacity
    }

    /// MaxEntries from RFC 9204 Section 3.2.2, used to encode the Required
    /// Insert Count.
    pub fn max_entries(&self) -> u64 {
        (self.hard_max_capacity / 32) as u64
    }

    pub fn effective_capacity(&self) -> usize {
        self.effective_capacity
    }

    pub fn set_effective_capacity(&mut self, capacity: usize) {
        debug_assert!(capacity <= self.hard_max_capacity);
        self.effective_capacity = capacity;
    }

    /// Records a capacity sent to the peer. The table must already fit.
    pub fn announce_capacity(&mut self, capacity: usize) {
        debug_assert!(self.table.size() <= capacity);
        self.table.set_capacity(capacity);
    }

    /// Newest live entry with this name and value.
    pub fn find_exact(&self, name: &[u8], value: &[u8]) -> Option<u64> {
        self.names.get(name)?.values.get(value).copied()
    }

    /// Newest live entry with this name.
    pub fn find_name(&self, name: &[u8]) -> Option<u64> {
        self.names.get(name).map(|slot| slot.newest)
    }

    pub fn get(&self, absidx: u64) -> Option<&Entry> {
        self.table.get(absidx)
    }

    /// True if the entry is close enough to eviction that new sections should
    /// stop referencing it.
    ///
    /// An entry drains once the bytes inserted from it onwards exceed the
    /// effective capacity minus a margin of an eighth of the capacity, at
    /// most 512 bytes.
    pub fn is_draining(&self, absidx: u64) -> bool {
        let Some(entry) = self.table.get(absidx) else {
            return true;
        };

        let cap = self.effective_capacity;
        let safe = cap - (cap / 8).min(512);
        self.table.inserted_bytes() - entry.sum() > safe as u64
    }

    /// True if an entry of `size` bytes fits within the effective capacity
    /// without evicting anything at or above `protected_from`.
    pub fn can_insert(&self, size: usize, protected_from: u64) -> bool {
        if size > self.effective_capacity {
            return false;
        }

        let needed = self.table.size() + size;
        needed <= self.effective_capacity
            || needed - self.effective_capacity <= self.table.evictable_space(protected_from)
    }

    /// Inserts a field, evicting old entries. Check [`can_insert`] first.
    ///
    /// [`can_insert`]: EncoderContext::can_insert
    pub fn insert(&mut self, field: FieldLine, protected_from: u64) -> Result<u64> {
        let size = field.size();
        debug_assert!(self.can_insert(size, protected_from));

        while self.table.size() + size > self.effective_capacity {
            if !self.evict_oldest() {
                break;
            }
        }

        let name = field.name.clone();
        let value = field.value.clone();
        let absidx = self.table.push(field)?;

        self.names.try_reserve(1)?;
        let slot = self.names.entry(name).or_default();
        slot.newest = absidx;
        slot.values.try_reserve(1)?;
        slot.values.insert(value, absidx);

        Ok(absidx)
    }

    /// Evicts entries below `protected_from` until the table fits the
    /// effective capacity. Returns true if it fits.
    pub fn shrink(&mut self, protected_from: u64) -> bool {
        while self.table.size() > self.effective_capacity {
            match self.table.oldest_absidx() {
                Some(oldest) if oldest < protected_from => {
                    self.evict_oldest();
                }
                _ => break,
            }
        }

        self.table.size() <= self.effective_capacity
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(entry) = self.table.evict_oldest() else {
            return false;
        };

        let field = entry.field();
        if let Some(slot) = self.names.get_mut(&field.name) {
            if slot.newest == entry.absidx() {
                self.names.remove(&field.name);
            } else if slot.values.get(&field.value) == Some(&entry.absidx()) {
                slot.values.remove(&field.value);
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(capacity: usize) -> EncoderContext {
        let mut ctx = EncoderContext::new(capacity);
        ctx.set_effective_capacity(capacity);
        ctx.announce_capacity(capacity);
        ctx
    }

    #[test]
    fn test_lookup_tracks_newest_entry() {
        let mut ctx = context(4096);
        ctx.insert(("foo", "a").into(), u64::MAX).unwrap();
        ctx.insert(("foo", "b").into(), u64::MAX).unwrap();
        ctx.insert(("foo", "a").into(), u64::MAX).unwrap();

        assert_eq!(ctx.find_exact(b"foo", b"a"), Some(2));
        assert_eq!(ctx.find_exact(b"foo", b"b"), Some(1));
        assert_eq!(ctx.find_name(b"foo"), Some(2));
        assert_eq!(ctx.find_name(b"bar"), None);
    }

    #[test]
    fn test_eviction_updates_lookup() {
        // room for two 34-byte entries
        let mut ctx = context(70);
        ctx.insert(("a", "1").into(), u64::MAX).unwrap();
        ctx.insert(("b", "1").into(), u64::MAX).unwrap();
        ctx.insert(("a", "2").into(), u64::MAX).unwrap();

        assert_eq!(ctx.find_exact(b"a", b"1"), None);
        assert_eq!(ctx.find_exact(b"a", b"2"), Some(2));
        assert_eq!(ctx.find_name(b"a"), Some(2));

        ctx.insert(("c", "1").into(), u64::MAX).unwrap();
        assert_eq!(ctx.find_name(b"b"), None);
    }

    #[test]
    fn test_can_insert_respects_protection() {
        let mut ctx = context(70);
        ctx.insert(("a", "1").into(), u64::MAX).unwrap();
        ctx.insert(("b", "1").into(), u64::MAX).unwrap();

        assert!(!ctx.can_insert(34, 0));
        assert!(ctx.can_insert(34, 1));
        assert!(!ctx.can_insert(71, u64::MAX));
    }

    #[test]
    fn test_draining() {
        let mut ctx = context(4096);
        ctx.insert(("foo1", "bar1").into(), u64::MAX).unwrap();
        ctx.insert(("foo2", "bar2").into(), u64::MAX).unwrap();
        assert!(!ctx.is_draining(0));

        // capacity 0: every entry with bytes after it drains
        ctx.set_effective_capacity(0);
        assert!(ctx.is_draining(0));
        assert!(ctx.is_draining(1));
    }

    #[test]
    fn test_shrink_stops_at_protected_entry() {
        let mut ctx = context(4096);
        ctx.insert(("foo1", "bar1").into(), u64::MAX).unwrap();
        ctx.insert(("foo2", "bar2").into(), u64::MAX).unwrap();

        ctx.set_effective_capacity(0);
        assert!(!ctx.shrink(1));
        assert_eq!(ctx.table().size(), 40);
        assert_eq!(ctx.find_name(b"foo1"), None);

        assert!(ctx.shrink(u64::MAX));
        assert!(ctx.table().is_empty());
        assert_eq!(ctx.table().insert_count(), 2);
    }
}
