//! Pointer-keyed hash table
//!
//! Keys are copyable handles exposing a machine-word address. Handles are
//! not under an external user's control, so a cryptographic hash would buy
//! nothing; multiplying by the golden-ratio constant mixes every bit of the
//! word, which covers the usual failure modes (aligned low bits, repetitive
//! high bits), and the bucket is taken from the top of the product.

use super::core::{Found, RawTable};
use super::{PHI_64, PTR_INITIAL_SIZE};
use crate::error::oops;

/// A copyable identity key with a machine-word address
pub trait PtrKey: Copy + Eq {
    /// The word fed to the Fibonacci hash
    fn address(self) -> u64;
}

impl PtrKey for usize {
    #[inline]
    fn address(self) -> u64 {
        self as u64
    }
}

#[inline]
fn ptr_hash_code<K: PtrKey>(key: K) -> u64 {
    key.address().wrapping_mul(PHI_64)
}

#[derive(Clone)]
struct PtrEntry<K> {
    key: Option<K>,
    value: u64,
}

impl<K> Default for PtrEntry<K> {
    fn default() -> Self {
        Self {
            key: None,
            value: 0,
        }
    }
}

/// Hash table from pointer-identity keys to word values
pub struct PtrHashTable<K: PtrKey> {
    table: Option<RawTable<PtrEntry<K>>>,
}

impl<K: PtrKey> PtrHashTable<K> {
    /// Create an empty table; storage is allocated on first insertion
    pub fn new() -> Self {
        Self { table: None }
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

    /// Look up a key
    pub fn fetch(&self, key: K) -> Option<u64> {
        let table = self.table.as_ref()?;
        let slot = table.probe(ptr_hash_code(key), |e| e.key == Some(key))?;
        Some(table.entry(slot).value)
    }

    /// Insert a key/value pair. Re-inserting a key with the value it already
    /// maps to is a no-op; a conflicting value for an existing key is a
    /// fatal error.
    pub fn insert(&mut self, key: K, value: u64) {
        let (entry, fresh) = self.lvalue_entry(key);
        if fresh {
            entry.key = Some(key);
            entry.value = value;
        } else if entry.value != value {
            oops!(
                "hash: insert conflict, key already maps to {} != {}",
                entry.value,
                value
            );
        }
    }

    /// Fetch the value for a key, inserting a zero value first if absent
    pub fn lvalue_fetch(&mut self, key: K) -> &mut u64 {
        let (entry, fresh) = self.lvalue_entry(key);
        if fresh {
            entry.key = Some(key);
        }
        &mut entry.value
    }

    /// Delete a key, returning the value it mapped to
    pub fn fetch_and_delete(&mut self, key: K) -> Option<u64> {
        let table = self.table.as_mut()?;
        let slot = table.probe(ptr_hash_code(key), |e| e.key == Some(key))?;
        let value = table.entry(slot).value;
        table.delete_at(slot);
        Some(value)
    }

    /// Check the table's layout invariants; returns the violation count
    pub fn fsck(&self) -> u64 {
        match &self.table {
            None => 0,
            Some(table) => table.fsck(|e| e.key.map(ptr_hash_code).unwrap_or(0)),
        }
    }

    /// Resolve the entry for a key, allocating, growing, and making room as
    /// needed. `true` means the slot is fresh and the caller owns filling it.
    fn lvalue_entry(&mut self, key: K) -> (&mut PtrEntry<K>, bool) {
        let hash = ptr_hash_code(key);
        let at_capacity = self
            .table
            .as_ref()
            .map_or(false, |t| t.control.cur_items >= t.control.max_items);
        let mut found = None;
        if at_capacity {
            // Growing is expensive and invalidates iteration, so a fetch
            // that does not need to create its key must not grow.
            found = self
                .table
                .as_ref()
                .and_then(|t| t.probe(hash, |e| e.key == Some(key)));
            if found.is_none() {
                self.grow();
            }
        }
        let table = self
            .table
            .get_or_insert_with(|| RawTable::with_size_log2(PTR_INITIAL_SIZE.trailing_zeros()));
        if let Some(slot) = found {
            return (table.entry_mut(slot), false);
        }
        match table.insert(hash, |e| e.key == Some(key)) {
            Found::Existing(slot) => (table.entry_mut(slot), false),
            Found::Fresh(slot) => {
                table.control.cur_items += 1;
                (table.entry_mut(slot), true)
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
            let hash = entry.key.map(ptr_hash_code).unwrap_or(0);
            match table.insert(hash, |_| false) {
                Found::Fresh(slot) => *table.entry_mut(slot) = entry,
                Found::Existing(_) => oops!("hash: duplicate entry while growing"),
            }
        }
        self.table = Some(table);
    }
}

impl<K: PtrKey> Default for PtrHashTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
