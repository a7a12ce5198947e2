//! Dynamic table implementation.
//!
//! The dynamic table is a FIFO of field lines addressed by absolute index
//! (RFC 9204 Section 3.2). Absolute indexes are never reused: the first entry
//! ever inserted is 0 and every insertion takes the next one, so the
//! insert count always equals the next absolute index.
//!
//! Both peers keep one. The decoder mirrors whatever the encoder stream tells
//! it; the encoder context drives eviction itself so that entries still
//! referenced by unacknowledged sections stay in place.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::Result;
use crate::field_line::FieldLine;

/// Entry in the dynamic table.
#[derive(Debug, Clone)]
pub struct Entry {
    field: FieldLine,
    absidx: u64,
    /// Bytes inserted into the table before this entry.
    sum: u64,
}

impl Entry {
    pub fn field(&self) -> &FieldLine {
        &self.field
    }

    pub fn absidx(&self) -> u64 {
        self.absidx
    }

    /// Total bytes inserted into the table before this entry.
    pub fn sum(&self) -> u64 {
        self.sum
    }

    pub fn size(&self) -> usize {
        self.field.size()
    }
}

/// The dynamic table.
#[derive(Debug, Default)]
pub struct DynamicTable {
    entries: VecDeque<Entry>,
    capacity: usize,
    size: usize,
    next_absidx: u64,
    inserted_bytes: u64,
}

impl DynamicTable {
    /// Creates an empty table with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Number of insertions so far, which is also the next absolute index.
    pub fn insert_count(&self) -> u64 {
        self.next_absidx
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of entry sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes ever inserted, evicted entries included.
    pub fn inserted_bytes(&self) -> u64 {
        self.inserted_bytes
    }

    /// Absolute index of the oldest live entry.
    pub fn oldest_absidx(&self) -> Option<u64> {
        self.entries.front().map(|e| e.absidx)
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.iter()
    }

    /// Sets a new capacity, evicting entries until the table fits.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.size > self.capacity {
            if self.evict_oldest().is_none() {
                break;
            }
        }
    }

    /// Inserts a field line, evicting old entries to make room.
    ///
    /// Entries with an absolute index at or above `protected_from` are never
    /// evicted. Returns `Ok(None)` without touching the table when the entry
    /// cannot fit.
    pub fn insert(&mut self, field: FieldLine, protected_from: u64) -> Result<Option<u64>> {
        let size = field.size();

        if size > self.capacity {
            return Ok(None);
        }

        let free = self.capacity - self.size;
        if free < size && free + self.evictable_space(protected_from) < size {
            return Ok(None);
        }

        while self.size + size > self.capacity {
            self.evict_oldest();
        }

        self.push(field).map(Some)
    }

    /// Appends an entry without evicting. The caller guarantees room.
    pub fn push(&mut self, field: FieldLine) -> Result<u64> {
        let size = field.size();
        debug_assert!(self.size + size <= self.capacity);

        self.entries.try_reserve(1)?;

        let absidx = self.next_absidx;
        trace!(absidx, size, "dynamic table insert");

        self.entries.push_back(Entry {
            field,
            absidx,
            sum: self.inserted_bytes,
        });
        self.size += size;
        self.next_absidx += 1;
        self.inserted_bytes += size as u64;

        Ok(absidx)
    }

    /// Removes the oldest entry.
    pub fn evict_oldest(&mut self) -> Option<Entry> {
        let entry = self.entries.pop_front()?;
        self.size -= entry.size();
        trace!(absidx = entry.absidx, size = entry.size(), "dynamic table evict");
        Some(entry)
    }

    /// Bytes that can be freed by evicting from the front without touching
    /// any entry at or above `protected_from`.
    pub fn evictable_space(&self, protected_from: u64) -> usize {
        self.entries
            .iter()
            .take_while(|e| e.absidx < protected_from)
            .map(Entry::size)
            .sum()
    }

    /// Gets an entry by absolute index.
    pub fn get(&self, absidx: u64) -> Option<&Entry> {
        let oldest = self.oldest_absidx()?;
        let offset = absidx.checked_sub(oldest)?;
        self.entries.get(usize::try_from(offset).ok()?)
    }

    /// Gets an entry by index relative to `base` (0 is `base - 1`).
    pub fn get_relative(&self, relative: u64, base: u64) -> Option<&Entry> {
        let absidx = base.checked_sub(relative)?.checked_sub(1)?;
        self.get(absidx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(capacity: usize, fields: &[(&'static str, &'static str)]) -> DynamicTable {
        let mut table = DynamicTable::new(capacity);
        for &field in fields {
            let next = table.insert_count();
            table.insert(field.into(), next).unwrap().unwrap();
        }
        table
    }

    #[test]
    fn test_insert_and_get() {
        let table = table_with(1000, &[("name", "value")]);

        assert_eq!(table.insert_count(), 1);
        assert_eq!(table.size(), 41);
        assert_eq!(&table.get(0).unwrap().field().name[..], b"name");
        assert!(table.get(1).is_none());
    }

    #[test]
    fn test_eviction() {
        // each entry is 1 + 1 + 32 = 34 bytes
        let table = table_with(100, &[("a", "b"), ("c", "d"), ("e", "f")]);

        assert!(table.get(0).is_none());
        assert!(table.get(1).is_some());
        assert!(table.get(2).is_some());
        assert_eq!(table.size(), 68);
        assert_eq!(table.insert_count(), 3);
    }

    #[test]
    fn test_relative_index() {
        let table = table_with(1000, &[("a", "1"), ("b", "2"), ("c", "3")]);

        assert_eq!(&table.get_relative(0, 2).unwrap().field().name[..], b"b");
        assert_eq!(&table.get_relative(1, 2).unwrap().field().name[..], b"a");
        assert!(table.get_relative(2, 2).is_none());
    }

    #[test]
    fn test_protected_entries_block_insert() {
        let mut table = table_with(100, &[("a", "b"), ("c", "d")]);

        // entry 0 is still referenced: nothing can be evicted
        assert_eq!(table.insert(("e", "f").into(), 0).unwrap(), None);
        assert_eq!(table.insert_count(), 2);
        assert_eq!(table.evictable_space(0), 0);
        assert_eq!(table.evictable_space(1), 34);

        assert_eq!(table.insert(("e", "f").into(), 1).unwrap(), Some(2));
        assert_eq!(table.oldest_absidx(), Some(1));
    }

    #[test]
    fn test_entry_larger_than_capacity() {
        let mut table = DynamicTable::new(40);
        assert_eq!(table.insert(("name", "value").into(), 0).unwrap(), None);
        assert_eq!(table.insert_count(), 0);
    }

    #[test]
    fn test_capacity_change() {
        let mut table = table_with(100, &[("a", "b")]);

        table.set_capacity(200);
        assert_eq!(table.capacity(), 200);
        assert_eq!(table.len(), 1);

        table.set_capacity(30);
        assert_eq!(table.capacity(), 30);
        assert!(table.is_empty());
        assert_eq!(table.size(), 0);
        assert_eq!(table.insert_count(), 1);
    }

    #[test]
    fn test_insertion_offsets() {
        let table = table_with(1000, &[("foo1", "bar1"), ("foo2", "bar2")]);

        assert_eq!(table.get(0).unwrap().sum(), 0);
        assert_eq!(table.get(1).unwrap().sum(), 40);
        assert_eq!(table.inserted_bytes(), 80);
    }
}
