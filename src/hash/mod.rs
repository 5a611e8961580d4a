//! Open-addressed Robin Hood hash table family
//!
//! Four table variants built from a single layout recipe, differing only in
//! key shape:
//!
//! | Variant | Keys | Values |
//! |---------|------|--------|
//! | [`PtrHashTable`] | copyable handles with a word address | `u64` |
//! | [`NameHashTable`] | owned interned names, hash cached in the entry | `i64` |
//! | [`IndexHashTable`] | strings resolved through an external interned list | `u32` index |
//! | [`FixKeyHashTable`] | interned strings | boxed payload with a stable address |
//!
//! All variants share the probing discipline: open addressing with Robin
//! Hood displacement, per-slot probe distances in a metadata byte array, and
//! overflow slots past the official bucket range instead of modulo
//! wrap-around. A displaced run is shifted in memory as a block, so the
//! Robin Hood invariant (probe distances never decrease along a run) is
//! maintained without element-by-element stealing.
//!
//! Tables are single-writer: reads may interleave with reads, never with
//! writes. Growing a table invalidates outstanding iteration, which is why
//! fetch-or-insert performs a pure lookup before it ever considers growing.

mod core;
mod fixkey;
mod index;
mod name;
mod ptr;

pub use fixkey::{FixKeyHashTable, FixKeyed};
pub use index::IndexHashTable;
pub use name::NameHashTable;
pub use ptr::{PtrHashTable, PtrKey};

/// Load factor at which a table grows
pub const LOAD_FACTOR: f64 = 0.75;

/// Hard ceiling on probe distances; reaching it forces a grow before the
/// next insertion rather than being handled mid-insert
pub const MAX_PROBE_DISTANCE: u8 = 255;

/// Official size of a freshly allocated pointer table
pub const PTR_INITIAL_SIZE: u32 = 8;

/// Log2 of the smallest official size for capacity-built tables
pub const UNI_MIN_SIZE_BASE_2: u32 = 3;

/// 2^64 divided by the golden ratio, rounded to the nearest odd number.
/// Multiplying by it mixes all bits of a machine word, which matters for
/// keys with aligned low bits or repetitive high bits.
pub(crate) const PHI_64: u64 = 11_400_714_819_323_198_485;
