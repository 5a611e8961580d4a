//! Interned-name hash table
//!
//! Keys are owned strings with their hash cached in the entry, so a probe
//! rejects most mismatches on the cached hash without touching the bytes.
//! Tables can be pre-sized for a known entry count, which matters for the
//! symbol-table use where the population is known up front.

use super::core::{Found, RawTable};
use super::{LOAD_FACTOR, UNI_MIN_SIZE_BASE_2};
use crate::error::oops;

use std::hash::Hasher;

/// The externally provided string hash for this table family
#[inline]
fn name_hash_code(name: &str) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}

#[derive(Clone, Default)]
struct NameEntry {
    key: Option<Box<str>>,
    hash: u64,
    value: i64,
}

/// Hash table from interned names to word values
#[derive(Default)]
pub struct NameHashTable {
    table: Option<RawTable<NameEntry>>,
}

/// Log2 of the official size needed to hold `entries` under the load factor
fn size_log2_for(entries: u32) -> u32 {
    if entries == 0 {
        return UNI_MIN_SIZE_BASE_2;
    }
    let min_needed = ((entries as f64) * (1.0 / LOAD_FACTOR)).ceil() as u32;
    let size_log2 = min_needed.next_power_of_two().trailing_zeros();
    size_log2.max(UNI_MIN_SIZE_BASE_2)
}

impl NameHashTable {
    /// Create an empty table; storage is allocated on first insertion
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-sized so that `entries` insertions never grow it
    pub fn with_capacity(entries: u32) -> Self {
        Self {
            table: Some(RawTable::with_size_log2(size_log2_for(entries))),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.table
            .as_ref()
            .map_or(0, |t| t.control.cur_items as usize)
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a name
    pub fn fetch(&self, name: &str) -> Option<i64> {
        let table = self.table.as_ref()?;
        let hash = name_hash_code(name);
        let slot = table.probe(hash, |e| e.hash == hash && e.key.as_deref() == Some(name))?;
        Some(table.entry(slot).value)
    }

    /// Insert a name/value pair. Re-inserting a name with the value it
    /// already maps to is a no-op; a conflicting value is a fatal error.
    pub fn insert(&mut self, name: &str, value: i64) {
        let (entry, fresh) = self.lvalue_entry(name);
        if fresh {
            entry.value = value;
        } else if entry.value != value {
            oops!(
                "hash: insert conflict, {:?} already maps to {} != {}",
                name,
                entry.value,
                value
            );
        }
    }

    /// Fetch the value slot for a name, inserting a zero value if absent
    pub fn lvalue_fetch(&mut self, name: &str) -> &mut i64 {
        let (entry, _) = self.lvalue_entry(name);
        &mut entry.value
    }

    /// Check the table's layout invariants; returns the violation count
    pub fn fsck(&self) -> u64 {
        match &self.table {
            None => 0,
            Some(table) => table.fsck(|e| e.hash),
        }
    }

    fn lvalue_entry(&mut self, name: &str) -> (&mut NameEntry, bool) {
        let hash = name_hash_code(name);
        let at_capacity = self
            .table
            .as_ref()
            .map_or(false, |t| t.control.cur_items >= t.control.max_items);
        let mut found = None;
        if at_capacity {
            // A fetch that finds its key must not grow: growth invalidates
            // iteration.
            found = self.table.as_ref().and_then(|t| {
                t.probe(hash, |e| e.hash == hash && e.key.as_deref() == Some(name))
            });
            if found.is_none() {
                self.grow();
            }
        }
        let table = self
            .table
            .get_or_insert_with(|| RawTable::with_size_log2(UNI_MIN_SIZE_BASE_2));
        if let Some(slot) = found {
            return (table.entry_mut(slot), false);
        }
        match table.insert(hash, |e| e.hash == hash && e.key.as_deref() == Some(name)) {
            Found::Existing(slot) => (table.entry_mut(slot), false),
            Found::Fresh(slot) => {
                table.control.cur_items += 1;
                let entry = table.entry_mut(slot);
                entry.key = Some(name.into());
                entry.hash = hash;
                (entry, true)
            }
        }
    }

    fn grow(&mut self) {
        let Some(old) = self.table.take() else {
            oops!("hash: grow on an unallocated table");
        };
        let size_log2 = old.control.official_size.trailing_zeros() + 1;
        let mut table = RawTable::with_size_log2(size_log2);
        table.control.cur_items = old.control.cur_items;
        for entry in old.into_occupied() {
            match table.insert(entry.hash, |_| false) {
                Found::Fresh(slot) => *table.entry_mut(slot) = entry,
                Found::Existing(_) => oops!("hash: duplicate entry while growing"),
            }
        }
        self.table = Some(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_fetch() {
        let mut table = NameHashTable::new();
        table.insert("alpha", 1);
        table.insert("beta", 2);
        assert_eq!(table.fetch("alpha"), Some(1));
        assert_eq!(table.fetch("beta"), Some(2));
        assert_eq!(table.fetch("gamma"), None);
    }

    #[test]
    fn test_with_capacity_never_grows() {
        let mut table = NameHashTable::with_capacity(64);
        for i in 0..64 {
            table.insert(&format!("name{}", i), i);
        }
        assert_eq!(table.len(), 64);
        assert_eq!(table.fsck(), 0);
        for i in 0..64 {
            assert_eq!(table.fetch(&format!("name{}", i)), Some(i));
        }
    }

    #[test]
    fn test_lvalue_fetch_defaults_to_zero() {
        let mut table = NameHashTable::new();
        assert_eq!(*table.lvalue_fetch("counter"), 0);
        *table.lvalue_fetch("counter") += 5;
        assert_eq!(table.fetch("counter"), Some(5));
    }

    #[test]
    #[should_panic(expected = "insert conflict")]
    fn test_insert_conflict_aborts() {
        let mut table = NameHashTable::new();
        table.insert("dup", 1);
        table.insert("dup", 2);
    }

    #[test]
    fn test_growth_from_minimum_size() {
        let mut table = NameHashTable::new();
        for i in 0..200 {
            table.insert(&format!("sym-{}", i), i * 3);
        }
        assert_eq!(table.len(), 200);
        assert_eq!(table.fsck(), 0);
        assert_eq!(table.fetch("sym-123"), Some(369));
    }

    #[test]
    fn test_capacity_sizing() {
        assert_eq!(size_log2_for(0), 3);
        assert_eq!(size_log2_for(6), 3);
        assert_eq!(size_log2_for(7), 4);
        assert_eq!(size_log2_for(48), 6);
        assert_eq!(size_log2_for(49), 7);
    }
}
