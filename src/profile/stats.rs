//! The per-static-frame statistics tree
//!
//! Statistics nest four deep: a frame's [`ProfileStats`] holds one
//! [`ByCallsite`] per distinct callsite seen entering it, each of which
//! holds one [`ByType`] per distinct argument-type tuple, each of which
//! holds one [`ByOffset`] per bytecode offset with observations. The
//! specializer reads the tree to decide which tuples are hot, which call
//! targets dominate a callsite, and which offsets consistently see a single
//! type or value.
//!
//! Every sub-tree is exclusively owned by its parent, so destroying a
//! frame's statistics is dropping the `ProfileStats`. Type and value handles
//! are borrowed references into the GC heap: each is published through the
//! owning frame's write barrier when installed, and reported to the
//! collector by [`gc_mark`].

use serde::Serialize;

use crate::frame::CallsiteId;
use crate::heap::{Heap, ObjRef, Worklist};

/// One argument slot of an observed type tuple
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct ArgType {
    /// The observed type, if logged
    pub ty: Option<ObjRef>,
    /// Whether the observed value was concrete
    pub ty_concrete: bool,
    /// The type inside the container, for container-typed arguments
    pub decont_ty: Option<ObjRef>,
    /// Whether the decontainerized value was concrete
    pub decont_ty_concrete: bool,
}

/// Count of a (type, concreteness) observation at an offset
#[derive(Clone, Copy, Debug)]
pub struct TypeCount {
    /// The observed type
    pub ty: ObjRef,
    /// Whether the observation was concrete
    pub concrete: bool,
    /// Times observed
    pub count: u64,
}

/// Count of an invocation-target observation at an offset
#[derive(Clone, Copy, Debug)]
pub struct ValueCount {
    /// The observed code object
    pub value: ObjRef,
    /// Times observed
    pub count: u64,
}

/// Count of a type tuple a call was made with at an offset
#[derive(Clone, Debug)]
pub struct TypeTupleCount {
    /// The callee's callsite
    pub cs: CallsiteId,
    /// An owned copy of the tuple the call was made with
    pub arg_types: Box<[ArgType]>,
    /// Times observed
    pub count: u64,
}

/// A lexical or constant value observed at an offset; first observation wins
#[derive(Clone, Copy, Debug)]
pub struct StaticValue {
    /// Where in the bytecode the value was read
    pub bytecode_offset: u32,
    /// The observed value
    pub value: ObjRef,
}

/// Observations keyed by a single bytecode offset
#[derive(Default, Debug)]
pub struct ByOffset {
    /// The bytecode offset these observations attach to
    pub bytecode_offset: u32,
    /// Types observed here, including attributed callee return types
    pub types: Vec<TypeCount>,
    /// Invocation targets observed here
    pub values: Vec<ValueCount>,
    /// Type tuples calls from here were made with
    pub type_tuples: Vec<TypeTupleCount>,
}

impl ByOffset {
    /// Merge in a type observation, publishing the reference on append
    pub fn record_type(&mut self, heap: &mut Heap, container: ObjRef, ty: ObjRef, concrete: bool) {
        for existing in &mut self.types {
            if existing.ty == ty && existing.concrete == concrete {
                existing.count += 1;
                return;
            }
        }
        heap.write_barrier(container, ty);
        self.types.push(TypeCount {
            ty,
            concrete,
            count: 1,
        });
    }

    /// Merge in an invocation-target observation, publishing the reference
    /// on append
    pub fn record_value(&mut self, heap: &mut Heap, container: ObjRef, value: ObjRef) {
        for existing in &mut self.values {
            if existing.value == value {
                existing.count += 1;
                return;
            }
        }
        heap.write_barrier(container, value);
        self.values.push(ValueCount { value, count: 1 });
    }

    /// Merge in a call's type tuple, copying it and publishing every handle
    /// on append
    pub fn record_type_tuple(
        &mut self,
        heap: &mut Heap,
        container: ObjRef,
        cs: CallsiteId,
        arg_types: &[ArgType],
    ) {
        for existing in &mut self.type_tuples {
            if existing.cs == cs && existing.arg_types.as_ref() == arg_types {
                existing.count += 1;
                return;
            }
        }
        for arg in arg_types {
            if let Some(ty) = arg.ty {
                heap.write_barrier(container, ty);
            }
            if let Some(decont) = arg.decont_ty {
                heap.write_barrier(container, decont);
            }
        }
        self.type_tuples.push(TypeTupleCount {
            cs,
            arg_types: arg_types.into(),
            count: 1,
        });
    }
}

/// Statistics for one observed argument-type tuple
#[derive(Default, Debug)]
pub struct ByType {
    /// The tuple, owned; one entry per callsite flag
    pub arg_types: Box<[ArgType]>,
    /// Entries with this tuple
    pub hits: u64,
    /// OSR crossings with this tuple
    pub osr_hits: u64,
    /// Deepest simulated call depth seen with this tuple
    pub max_depth: u32,
    /// Per-offset observations
    pub by_offset: Vec<ByOffset>,
}

impl ByType {
    /// Index of the [`ByOffset`] for an offset, adding it if missing
    pub fn offset_index(&mut self, bytecode_offset: u32) -> usize {
        if let Some(found) = self
            .by_offset
            .iter()
            .position(|o| o.bytecode_offset == bytecode_offset)
        {
            return found;
        }
        self.by_offset.push(ByOffset {
            bytecode_offset,
            ..Default::default()
        });
        self.by_offset.len() - 1
    }
}

/// Statistics for one callsite a frame was entered through
#[derive(Default, Debug)]
pub struct ByCallsite {
    /// The callsite, or `None` for the no-callsite entry path
    pub cs: Option<CallsiteId>,
    /// Entries through this callsite
    pub hits: u64,
    /// OSR crossings under this callsite
    pub osr_hits: u64,
    /// Deepest simulated call depth seen under this callsite
    pub max_depth: u32,
    /// Per-type-tuple statistics; tuples are pairwise distinct
    pub by_type: Vec<ByType>,
}

/// All statistics gathered for one static frame
#[derive(Default, Debug)]
pub struct ProfileStats {
    /// Total entries to the frame
    pub hits: u64,
    /// Total OSR crossings in the frame
    pub osr_hits: u64,
    /// The statistics version current when last updated; frames whose
    /// version lags too far behind are aged out
    pub last_update: u64,
    /// Per-callsite statistics; callsites are pairwise distinct
    pub by_callsite: Vec<ByCallsite>,
    /// First-observation-wins static values, by offset
    pub static_values: Vec<StaticValue>,
}

impl ProfileStats {
    /// Index of the [`ByCallsite`] for a callsite, adding it if missing
    pub fn callsite_index(&mut self, cs: Option<CallsiteId>) -> usize {
        if let Some(found) = self.by_callsite.iter().position(|c| c.cs == cs) {
            return found;
        }
        self.by_callsite.push(ByCallsite {
            cs,
            ..Default::default()
        });
        self.by_callsite.len() - 1
    }

    /// Record a static value unless the offset already has one; returns
    /// whether the value was recorded (and so needs publishing)
    pub fn record_static_value(&mut self, bytecode_offset: u32, value: ObjRef) -> bool {
        if self
            .static_values
            .iter()
            .any(|sv| sv.bytecode_offset == bytecode_offset)
        {
            return false;
        }
        self.static_values.push(StaticValue {
            bytecode_offset,
            value,
        });
        true
    }

    /// A machine-readable summary of the tree's shape and counters
    pub fn report(&self) -> StatsReport {
        StatsReport {
            hits: self.hits,
            osr_hits: self.osr_hits,
            last_update: self.last_update,
            static_values: self.static_values.len(),
            callsites: self
                .by_callsite
                .iter()
                .map(|by_cs| CallsiteReport {
                    callsite: by_cs.cs.map(|cs| cs.as_raw()),
                    hits: by_cs.hits,
                    osr_hits: by_cs.osr_hits,
                    max_depth: by_cs.max_depth,
                    type_tuples: by_cs
                        .by_type
                        .iter()
                        .map(|by_type| TypeTupleReport {
                            hits: by_type.hits,
                            osr_hits: by_type.osr_hits,
                            max_depth: by_type.max_depth,
                            offsets: by_type.by_offset.len(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// A human-readable dump of the same summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "Hits: {} (OSR: {}), last update at version {}\n",
            self.hits, self.osr_hits, self.last_update
        ));
        s.push_str(&format!("Static values: {}\n", self.static_values.len()));
        for (i, by_cs) in self.by_callsite.iter().enumerate() {
            match by_cs.cs {
                Some(cs) => s.push_str(&format!(
                    "Callsite {} (#{}): {} hits, {} OSR, max depth {}\n",
                    i,
                    cs.as_raw(),
                    by_cs.hits,
                    by_cs.osr_hits,
                    by_cs.max_depth
                )),
                None => s.push_str(&format!(
                    "Callsite {} (none): {} hits, {} OSR, max depth {}\n",
                    i, by_cs.hits, by_cs.osr_hits, by_cs.max_depth
                )),
            }
            for by_type in &by_cs.by_type {
                s.push_str(&format!(
                    "  Tuple of {} args: {} hits, {} offsets with observations\n",
                    by_type.arg_types.len(),
                    by_type.hits,
                    by_type.by_offset.len()
                ));
            }
        }
        s
    }
}

/// Serializable summary of a frame's statistics
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub hits: u64,
    pub osr_hits: u64,
    pub last_update: u64,
    pub static_values: usize,
    pub callsites: Vec<CallsiteReport>,
}

/// Serializable summary of one callsite's statistics
#[derive(Debug, Serialize)]
pub struct CallsiteReport {
    pub callsite: Option<u32>,
    pub hits: u64,
    pub osr_hits: u64,
    pub max_depth: u32,
    pub type_tuples: Vec<TypeTupleReport>,
}

/// Serializable summary of one type tuple's statistics
#[derive(Debug, Serialize)]
pub struct TypeTupleReport {
    pub hits: u64,
    pub osr_hits: u64,
    pub max_depth: u32,
    pub offsets: usize,
}

/// Enqueue every type, decont-type, and value handle reachable from the
/// tree onto the collector's worklist
pub fn gc_mark(stats: &ProfileStats, worklist: &mut Worklist) {
    for by_cs in &stats.by_callsite {
        for by_type in &by_cs.by_type {
            for arg in by_type.arg_types.iter() {
                worklist.add(arg.ty);
                worklist.add(arg.decont_ty);
            }
            for by_offset in &by_type.by_offset {
                for tc in &by_offset.types {
                    worklist.add(Some(tc.ty));
                }
                for vc in &by_offset.values {
                    worklist.add(Some(vc.value));
                }
                for tt in &by_offset.type_tuples {
                    for arg in tt.arg_types.iter() {
                        worklist.add(arg.ty);
                        worklist.add(arg.decont_ty);
                    }
                }
            }
        }
    }
    for sv in &stats.static_values {
        worklist.add(Some(sv.value));
    }
}
