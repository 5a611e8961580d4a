//! The layout recipe and probing core shared by every table variant
//!
//! Conceptually a table is one contiguous allocation:
//!
//! ```text
//! ---+---+---+---+---------+---+---+---+---+---+---+---
//! ...| C | B | A | control | 1 | a | b | c | ... | 1 |
//! ---+---+---+---+---------+---+---+---+---+---+---+---
//!     entries, descending    metadata, ascending
//! ```
//!
//! Entry slots run *descending* in memory (slot 0 sits just below the
//! control block, the last slot sits lowest), while the metadata bytes run
//! ascending on the other side. The reversal means that "shift this run of
//! entries one slot along the probe sequence" is a single contiguous block
//! move at the storage level. The safe rendering here keeps the control
//! block and the two regions as fields of one struct, with slot `s`'s entry
//! at `entries[true_size - 1 - s]`, and expresses block moves as slice
//! rotations over the displaced range.
//!
//! Instead of wrapping probe sequences around modulo the bucket count, the
//! allocation carries extra overflow slots past the official range, sized by
//! the worst permitted probe distance. A probe can therefore scan with plain
//! increments until it hits a slot that answers the question.
//!
//! The metadata byte for a slot is 0 when the slot is empty, otherwise
//! `1 + actual_slot - ideal_slot` for the entry stored there. One sentinel
//! byte of value 1 sits at each end of the metadata, marking a fictitious
//! occupied slot at its ideal position; probe loops terminate on it without
//! a bounds branch.

use super::{LOAD_FACTOR, MAX_PROBE_DISTANCE};
use crate::error::oops;

/// Bookkeeping shared by all variants
pub(super) struct Control {
    /// Live entries
    pub cur_items: u32,
    /// Grow once `cur_items` reaches this; zero forces a grow before the
    /// next insertion regardless of occupancy
    pub max_items: u32,
    /// Official bucket count; always a power of two
    pub official_size: u32,
    /// Bucket index is the hash shifted right by this, so the *top* bits of
    /// the hash pick the bucket
    pub key_right_shift: u8,
    /// Extra slots past the official range, covering the worst permitted
    /// probe distance
    pub probe_overflow_size: u8,
}

/// Where an insertion probe landed
pub(super) enum Found {
    /// The key is already present at this slot
    Existing(usize),
    /// Room has been made at this slot; the caller writes the entry and
    /// accounts for it
    Fresh(usize),
}

/// The storage and algorithms common to every variant
pub(super) struct RawTable<E> {
    pub control: Control,
    /// Slot `s` lives at index `true_size - 1 - s`
    entries: Box<[E]>,
    /// `true_size + 2` bytes; index 0 and index `true_size + 1` are the
    /// sentinels
    metadata: Box<[u8]>,
}

impl<E: Default> RawTable<E> {
    /// Allocate a table with `2^size_log2` official buckets
    pub fn with_size_log2(size_log2: u32) -> Self {
        let official_size = 1u32 << size_log2;
        let max_items = (official_size as f64 * LOAD_FACTOR) as u32;
        // Probe distance 1 is the ideal bucket itself, so the worst case
        // needs one slot fewer than the maximum occupancy.
        let overflow = max_items - 1;
        let probe_overflow_size = overflow.min(MAX_PROBE_DISTANCE as u32 - 1) as u8;
        let true_size = (official_size + probe_overflow_size as u32) as usize;

        let entries: Box<[E]> = (0..true_size).map(|_| E::default()).collect();
        let mut metadata = vec![0u8; true_size + 2].into_boxed_slice();
        metadata[0] = 1;
        metadata[true_size + 1] = 1;

        Self {
            control: Control {
                cur_items: 0,
                max_items,
                official_size,
                key_right_shift: (64 - size_log2) as u8,
                probe_overflow_size,
            },
            entries,
            metadata,
        }
    }

    /// Official plus overflow slots
    #[inline]
    pub fn true_size(&self) -> usize {
        self.control.official_size as usize + self.control.probe_overflow_size as usize
    }

    /// The ideal slot for a hash: its top bits on the official-size scale
    #[inline]
    pub fn bucket_of(&self, hash: u64) -> usize {
        (hash >> self.control.key_right_shift) as usize
    }

    #[inline]
    fn entry_index(&self, slot: usize) -> usize {
        self.true_size() - 1 - slot
    }

    /// The entry stored at a slot
    #[inline]
    pub fn entry(&self, slot: usize) -> &E {
        &self.entries[self.entry_index(slot)]
    }

    /// The entry stored at a slot, mutably
    #[inline]
    pub fn entry_mut(&mut self, slot: usize) -> &mut E {
        let index = self.entry_index(slot);
        &mut self.entries[index]
    }

    /// The probe-distance byte for a slot; `slot == true_size` reads the
    /// trailing sentinel
    #[inline]
    pub fn meta(&self, slot: usize) -> u8 {
        self.metadata[slot + 1]
    }

    #[inline]
    fn set_meta(&mut self, slot: usize, value: u8) {
        self.metadata[slot + 1] = value;
    }

    /// Probe for a key. Returns the slot holding it, or `None` once a slot
    /// with a shorter probe distance shows the key cannot be present: had it
    /// been inserted, it would have displaced that slot's occupant.
    pub fn probe<F: FnMut(&E) -> bool>(&self, hash: u64, mut eq: F) -> Option<usize> {
        let mut probe_distance = 1u32;
        let mut slot = self.bucket_of(hash);
        loop {
            let meta = self.meta(slot) as u32;
            if meta == probe_distance && eq(self.entry(slot)) {
                return Some(slot);
            }
            // The trailing sentinel guarantees this terminates.
            if meta < probe_distance {
                return None;
            }
            probe_distance += 1;
            slot += 1;
            debug_assert!(probe_distance <= MAX_PROBE_DISTANCE as u32);
            debug_assert!(slot <= self.true_size());
        }
    }

    /// Probe for a key, making room for it at its rightful slot if absent.
    /// The caller must have ruled out the need to grow first; on a fresh
    /// slot the caller writes the entry and bumps `cur_items`.
    pub fn insert<F: FnMut(&E) -> bool>(&mut self, hash: u64, mut eq: F) -> Found {
        if self.control.cur_items >= self.control.max_items {
            oops!("hash: insertion attempted while a grow is required");
        }

        let mut probe_distance = 1u32;
        let mut slot = self.bucket_of(hash);
        loop {
            let meta = self.meta(slot) as u32;
            if meta < probe_distance {
                // This slot is the key's rightful place, occupied or not.
                if meta != 0 {
                    // Make room. The occupant and everything after it with a
                    // distance in order moves one slot along; bumping every
                    // metadata byte by one and shifting the entries as a
                    // block maintains the ordering invariant without
                    // swap-and-reinsert.
                    let mut gap = slot;
                    let mut displaced = self.meta(gap);
                    loop {
                        let bumped = displaced + 1;
                        if bumped == MAX_PROBE_DISTANCE {
                            // Force a grow before the next insertion so this
                            // loop never has to handle overflow itself.
                            self.control.max_items = 0;
                        }
                        gap += 1;
                        displaced = self.meta(gap);
                        self.set_meta(gap, bumped);
                        if displaced == 0 {
                            break;
                        }
                    }
                    // Slots [slot, gap) move to [slot + 1, gap]; with the
                    // descending layout that is one block rotation, and the
                    // stale entry from the gap lands in the freed slot.
                    let lo = self.entry_index(gap);
                    let hi = self.entry_index(slot);
                    self.entries[lo..=hi].rotate_left(1);
                }

                if probe_distance == MAX_PROBE_DISTANCE as u32 {
                    self.control.max_items = 0;
                }
                self.set_meta(slot, probe_distance as u8);
                return Found::Fresh(slot);
            }

            if meta == probe_distance && eq(self.entry(slot)) {
                return Found::Existing(slot);
            }

            probe_distance += 1;
            slot += 1;
            debug_assert!(probe_distance <= MAX_PROBE_DISTANCE as u32);
            debug_assert!(slot <= self.true_size());
        }
    }

    /// Remove the entry at `slot`, shifting the following run back to keep
    /// probe distances tight
    pub fn delete_at(&mut self, slot: usize) {
        let mut target = slot;
        loop {
            let next = self.meta(target + 1);
            if next <= 1 {
                break;
            }
            self.set_meta(target, next - 1);
            target += 1;
        }
        if target != slot {
            // Slots (slot, target] move back one; the dead entry rotates to
            // the vacated end.
            let lo = self.entry_index(target);
            let hi = self.entry_index(slot);
            self.entries[lo..=hi].rotate_right(1);
        }
        self.set_meta(target, 0);
        *self.entry_mut(target) = E::default();
        self.control.cur_items -= 1;
    }

    /// Consume the table, yielding every live entry (for reinsertion after
    /// a grow)
    pub fn into_occupied(self) -> impl Iterator<Item = E> {
        let true_size = self.true_size();
        let metadata = self.metadata;
        self.entries
            .into_vec()
            .into_iter()
            .enumerate()
            .filter_map(move |(index, entry)| {
                let slot = true_size - 1 - index;
                (metadata[slot + 1] != 0).then_some(entry)
            })
    }

    /// Walk the whole table checking the stored-probe-distance and ordering
    /// invariants. Returns the number of violations; details go to the log.
    pub fn fsck<F: Fn(&E) -> u64>(&self, hash_of: F) -> u64 {
        let mut errors = 0u64;
        let mut seen = 0u64;
        let mut prev_offset = 0i64;
        for slot in 0..self.true_size() {
            let meta = self.meta(slot);
            if meta == 0 {
                prev_offset = 0;
                continue;
            }
            seen += 1;
            let ideal = self.bucket_of(hash_of(self.entry(slot))) as i64;
            let offset = 1 + slot as i64 - ideal;
            let wrong_slot = offset != meta as i64;
            let wrong_order = offset < 1 || offset > prev_offset + 1;
            if wrong_slot {
                log::warn!(
                    "hash fsck: slot {} stores distance {} but sits {} from ideal",
                    slot,
                    meta,
                    offset
                );
                errors += 1;
            }
            if wrong_order {
                log::warn!(
                    "hash fsck: slot {} breaks probe ordering ({} after {})",
                    slot,
                    offset,
                    prev_offset
                );
                errors += 1;
            }
            prev_offset = offset;
        }
        if self.meta(self.true_size()) != 1 {
            log::warn!("hash fsck: trailing sentinel clobbered");
            errors += 1;
        }
        if seen != self.control.cur_items as u64 {
            log::warn!(
                "hash fsck: {} live entries found but cur_items is {}",
                seen,
                self.control.cur_items
            );
            errors += 1;
        }
        errors
    }
}
