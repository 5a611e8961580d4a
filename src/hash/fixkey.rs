//! Fixed-key hash table with boxed payloads
//!
//! Entries hold a boxed payload whose key field is read through the
//! [`FixKeyed`] trait. The indirection is the point: a payload's address is
//! stable across grows, so the rest of the VM can keep raw references to
//! payloads while the table resizes underneath them.
//!
//! `lvalue_fetch` returns the payload for a key, allocating a default one on
//! first sight. A freshly allocated payload has a `None` key, and the caller
//! is required to fill it in before the next operation on the table; the
//! `None` key is what marks "freshly allocated", so there is no separate
//! found/created return value to thread around.

use std::rc::Rc;

use super::core::{Found, RawTable};
use super::{PHI_64, UNI_MIN_SIZE_BASE_2};
use crate::error::oops;
use crate::strings::VmString;

/// A payload whose first concern is the interned string that keys it
pub trait FixKeyed: Default {
    /// The key field; `None` marks a freshly allocated payload whose caller
    /// has not filled it in yet
    fn key(&self) -> Option<&Rc<VmString>>;
}

/// Interned-string hashes benefit from extra mixing before the top bits are
/// taken, so this variant post-multiplies by the golden-ratio constant.
#[inline]
fn fixkey_hash_code(key: &VmString) -> u64 {
    key.hash_code().wrapping_mul(PHI_64)
}

fn payload_matches<P: FixKeyed>(entry: &Option<Box<P>>, want: &VmString) -> bool {
    match entry {
        Some(payload) => match payload.key() {
            Some(key) => std::ptr::eq(key.as_ref(), want) || key.equals(want),
            None => false,
        },
        None => false,
    }
}

/// Hash table from interned strings to payloads with stable addresses
pub struct FixKeyHashTable<P: FixKeyed> {
    table: Option<RawTable<Option<Box<P>>>>,
}

impl<P: FixKeyed> FixKeyHashTable<P> {
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

    /// Look up the payload for a key
    pub fn fetch(&self, key: &VmString) -> Option<&P> {
        let table = self.table.as_ref()?;
        let slot = table.probe(fixkey_hash_code(key), |e| payload_matches(e, key))?;
        table.entry(slot).as_deref()
    }

    /// Fetch the payload for a key, allocating a default payload on first
    /// sight. A returned payload with a `None` key is freshly allocated and
    /// the caller must fill the key in.
    pub fn lvalue_fetch(&mut self, key: &Rc<VmString>) -> &mut P {
        let hash = fixkey_hash_code(key);
        let at_capacity = self
            .table
            .as_ref()
            .map_or(false, |t| t.control.cur_items >= t.control.max_items);
        let mut found = None;
        if at_capacity {
            // Lookups must not invalidate payload references held elsewhere,
            // so only grow when the key is genuinely absent.
            found = self
                .table
                .as_ref()
                .and_then(|t| t.probe(hash, |e| payload_matches(e, key)));
            if found.is_none() {
                self.grow();
            }
        }
        let table = self
            .table
            .get_or_insert_with(|| RawTable::with_size_log2(UNI_MIN_SIZE_BASE_2));
        let slot = match found {
            Some(slot) => slot,
            None => match table.insert(hash, |e| payload_matches(e, key)) {
                Found::Existing(slot) => slot,
                Found::Fresh(slot) => {
                    table.control.cur_items += 1;
                    *table.entry_mut(slot) = Some(Box::default());
                    slot
                }
            },
        };
        match table.entry_mut(slot).as_deref_mut() {
            Some(payload) => payload,
            None => oops!("hash: occupied slot with no payload"),
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
            let hash = match entry.as_ref().and_then(|p| p.key()) {
                Some(key) => fixkey_hash_code(key),
                None => oops!("hash: grow found a payload whose key was never filled in"),
            };
            match table.insert(hash, |_| false) {
                Found::Fresh(slot) => *table.entry_mut(slot) = entry,
                Found::Existing(_) => oops!("hash: duplicate entry while growing"),
            }
        }
        self.table = Some(table);
    }
}

impl<P: FixKeyed> Default for FixKeyHashTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
