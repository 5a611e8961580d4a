//! String-to-index hash table
//!
//! Entries store nothing but a `u32` index into an external interned-string
//! list; every operation takes that list as a parameter and key comparison
//! re-reads the interned string through it. This keeps the table a quarter
//! the size of one that stores keys inline, at the price of threading the
//! list through the call sites, and it is the backing structure for string
//! interning itself.

use std::rc::Rc;

use super::core::{Found, RawTable};
use super::{LOAD_FACTOR, UNI_MIN_SIZE_BASE_2};
use crate::error::oops;
use crate::strings::VmString;

#[derive(Clone, Copy, Default)]
struct IndexEntry {
    index: u32,
}

/// Hash table from interned strings to their list index
#[derive(Default)]
pub struct IndexHashTable {
    table: Option<RawTable<IndexEntry>>,
}

fn size_log2_for(entries: u32) -> u32 {
    if entries == 0 {
        return UNI_MIN_SIZE_BASE_2;
    }
    let min_needed = ((entries as f64) * (1.0 / LOAD_FACTOR)).ceil() as u32;
    min_needed
        .next_power_of_two()
        .trailing_zeros()
        .max(UNI_MIN_SIZE_BASE_2)
}

#[inline]
fn entry_matches(list: &[Rc<VmString>], entry: &IndexEntry, want: &VmString) -> bool {
    let key = &list[entry.index as usize];
    std::ptr::eq(key.as_ref(), want) || key.equals(want)
}

impl IndexHashTable {
    /// Create an empty, unallocated table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-sized so that `entries` insertions never grow it
    pub fn with_capacity(entries: u32) -> Self {
        Self {
            table: Some(RawTable::with_size_log2(size_log2_for(entries))),
        }
    }

    /// Whether storage has been allocated
    pub fn built(&self) -> bool {
        self.table.is_some()
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

    /// Look up a string, returning its index in `list`
    pub fn fetch(&self, list: &[Rc<VmString>], want: &VmString) -> Option<u32> {
        let table = self.table.as_ref()?;
        let slot = table.probe(want.hash_code(), |e| entry_matches(list, e, want))?;
        Some(table.entry(slot).index)
    }

    /// Record that `list[index]` is interned. The string must already be in
    /// the list; inserting an index twice is a fatal error.
    pub fn insert(&mut self, list: &[Rc<VmString>], index: u32) {
        let want = &list[index as usize];
        let hash = want.hash_code();
        let at_capacity = self
            .table
            .as_ref()
            .map_or(false, |t| t.control.cur_items >= t.control.max_items);
        if at_capacity {
            self.grow(list);
        }
        let table = self
            .table
            .get_or_insert_with(|| RawTable::with_size_log2(UNI_MIN_SIZE_BASE_2));
        match table.insert(hash, |e| entry_matches(list, e, want)) {
            Found::Existing(_) => oops!("hash: index {} inserted twice", index),
            Found::Fresh(slot) => {
                table.control.cur_items += 1;
                table.entry_mut(slot).index = index;
            }
        }
    }

    /// Check the table's layout invariants; returns the violation count
    pub fn fsck(&self, list: &[Rc<VmString>]) -> u64 {
        match &self.table {
            None => 0,
            Some(table) => table.fsck(|e| list[e.index as usize].hash_code()),
        }
    }

    fn grow(&mut self, list: &[Rc<VmString>]) {
        let Some(old) = self.table.take() else {
            oops!("hash: grow on an unallocated table");
        };
        let size_log2 = old.control.official_size.trailing_zeros() + 1;
        let mut table = RawTable::with_size_log2(size_log2);
        table.control.cur_items = old.control.cur_items;
        for entry in old.into_occupied() {
            let hash = list[entry.index as usize].hash_code();
            match table.insert(hash, |_| false) {
                Found::Fresh(slot) => *table.entry_mut(slot) = entry,
                Found::Existing(_) => oops!("hash: duplicate entry while growing"),
            }
        }
        self.table = Some(table);
    }
}
