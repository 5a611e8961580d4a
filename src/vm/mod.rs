//! The VM context
//!
//! Everything the statistics core reads or writes hangs off one [`Vm`]
//! value: the heap, the frame and callsite tables, the string heap, the
//! profiling configuration, and the statistics version counter. Passing the
//! context explicitly keeps the core free of global state and makes tests
//! trivially isolated from each other.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::{ArgFlags, CallsiteId, CallsiteTable, StaticFrameId, StaticFrameTable};
use crate::heap::Heap;
use crate::strings::StringHeap;

/// Profiling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// How many versions a frame's statistics may lag before aging out
    pub max_age: u64,
    /// Mark the thread "in specializer" around updates, for GC assertions
    pub debug_gc: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            debug_gc: false,
        }
    }
}

/// The single context value the core operates on
pub struct Vm {
    /// The collector-managed heap
    pub heap: Heap,
    /// All static frames
    pub frames: StaticFrameTable,
    /// Interned callsite descriptors
    pub callsites: CallsiteTable,
    /// Interned strings
    pub strings: StringHeap,
    /// Profiling configuration
    pub config: ProfileConfig,
    /// Advanced by the embedder between flush cycles; statistics stamp it
    /// into `last_update` and aging compares against it
    pub(crate) stats_version: u64,
}

impl Vm {
    /// Create a context with default configuration
    pub fn new() -> Self {
        Self::with_config(ProfileConfig::default())
    }

    /// Create a context with the given configuration
    pub fn with_config(config: ProfileConfig) -> Self {
        Self {
            heap: Heap::new(),
            frames: StaticFrameTable::new(),
            callsites: CallsiteTable::new(),
            strings: StringHeap::new(),
            config,
            stats_version: 1,
        }
    }

    /// The current statistics version
    pub fn stats_version(&self) -> u64 {
        self.stats_version
    }

    /// Advance the statistics version; called between flush cycles
    pub fn bump_stats_version(&mut self) -> u64 {
        self.stats_version += 1;
        self.stats_version
    }

    /// Register a static frame, allocating its tenured barrier-owner
    /// container
    pub fn new_static_frame(&mut self, name: &str) -> StaticFrameId {
        let container = self.heap.alloc_plain();
        self.heap.tenure(container);
        self.frames.create(name, container)
    }

    /// Intern a callsite shape
    pub fn new_callsite(&mut self, num_pos: u16, arg_flags: &[ArgFlags]) -> Result<CallsiteId> {
        self.callsites.intern(num_pos, arg_flags)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
