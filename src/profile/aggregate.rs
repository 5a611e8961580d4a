//! The stack-simulation aggregator
//!
//! A profile log is a flat recording: events from many nested invocations
//! interleave, tied together only by correlation ids. To attribute an event
//! to the right statistics, the aggregator replays the log against a
//! simulated call stack. Frames are pushed on entry events and popped either
//! by their return event or implicitly: logs may lose intermediate returns,
//! but observing any deeper frame's event implies every shallower frame
//! already returned, so finding a correlation id below the top pops
//! everything above it.
//!
//! A frame's argument-type tuple is not complete until all of its parameter
//! events have arrived, which is in general after the first offset-keyed
//! observations. Offset events are therefore buffered on the simulated
//! frame and folded into the statistics at pop time, when the destination
//! tuple is known. Return-type observations are attributed one level up, to
//! the caller's most recent invoke offset, when the caller demonstrably
//! invoked the returning frame.

use crate::error::oops;
use crate::frame::{Callsite, CallsiteId, CallsiteTable, StaticFrameId, StaticFrameTable};
use crate::heap::{Heap, ObjRef, Repr};
use crate::profile::log::{LogBuffer, LogEvent};
use crate::profile::stats::{ArgType, ByType, ProfileStats};
use crate::vm::Vm;

/// A type tuple observed in a callee, held for the caller's pop, at which
/// point it is folded into the caller's per-offset callsite type stats
struct SimCallType {
    bytecode_offset: u32,
    cs: CallsiteId,
    arg_types: Box<[ArgType]>,
}

/// An offset-keyed observation buffered until the owning frame pops
enum OffsetEvent {
    Type {
        bytecode_offset: u32,
        ty: ObjRef,
        concrete: bool,
    },
    Invoke {
        bytecode_offset: u32,
        value: ObjRef,
    },
    Return {
        bytecode_offset: u32,
        ty: ObjRef,
        concrete: bool,
    },
}

/// One frame of the simulated call stack
struct SimFrame {
    /// The static frame entered
    sf: StaticFrameId,
    /// Correlation id tying later events back to this invocation
    cid: u32,
    /// The callsite entered through, if any
    cs: Option<CallsiteId>,
    /// Index into the frame's `by_callsite` (stable across growth)
    callsite_idx: usize,
    /// The tuple being filled by parameter events; sized by the callsite's
    /// flag count, absent for the no-callsite entry path
    arg_types: Option<Box<[ArgType]>>,
    /// Buffered offset observations, folded in at pop
    offset_events: Vec<OffsetEvent>,
    /// Callee type tuples awaiting this frame's pop
    call_infos: Vec<SimCallType>,
    /// OSR crossings observed in this invocation
    osr_hits: u64,
    /// Offset of the most recent invoke observation
    last_invoke_offset: u32,
    /// Target of the most recent invoke observation
    last_invoke_code: Option<ObjRef>,
}

/// The simulated call stack, rebuilt per update
struct SimStack {
    frames: Vec<SimFrame>,
    depth: u32,
}

impl SimStack {
    fn new() -> Self {
        Self {
            frames: Vec::with_capacity(32),
            depth: 0,
        }
    }

    fn push(&mut self, frame: SimFrame) {
        self.frames.push(frame);
        self.depth += 1;
    }

    /// Find the frame for a correlation id, popping any frames above it.
    /// `None` means the entry event for this id was never seen (the log
    /// started mid-execution) and the event should be dropped.
    fn find(
        &mut self,
        cid: u32,
        heap: &mut Heap,
        frames: &mut StaticFrameTable,
        callsites: &CallsiteTable,
    ) -> Option<usize> {
        let mut found_at = self.frames.len();
        while found_at > 0 {
            found_at -= 1;
            if self.frames[found_at].cid == cid {
                let pops = self.frames.len() - found_at - 1;
                for _ in 0..pops {
                    self.pop(heap, frames, callsites);
                }
                return Some(found_at);
            }
        }
        None
    }

    /// Pop the top frame, folding everything it buffered into the
    /// statistics tree
    fn pop(&mut self, heap: &mut Heap, frames: &mut StaticFrameTable, callsites: &CallsiteTable) {
        let Some(simf) = self.frames.pop() else {
            oops!("profile stats: cannot pop an empty simulation stack");
        };
        let frame_depth = self.depth;
        self.depth -= 1;

        let frame = frames.get_mut(simf.sf);
        let container = frame.container();
        let Some(ss) = frame.stats.as_deref_mut() else {
            oops!("profile stats: popped frame has no statistics");
        };

        // OSR hits and depth fold in at the callsite level whether or not a
        // usable type tuple exists.
        if simf.osr_hits > 0 {
            ss.osr_hits += simf.osr_hits;
            ss.by_callsite[simf.callsite_idx].osr_hits += simf.osr_hits;
        }
        if frame_depth > ss.by_callsite[simf.callsite_idx].max_depth {
            ss.by_callsite[simf.callsite_idx].max_depth = frame_depth;
        }

        let Some(type_idx) =
            resolve_by_type(heap, callsites, ss, simf.callsite_idx, simf.arg_types)
        else {
            return;
        };

        let cs = ss.by_callsite[simf.callsite_idx].cs;
        let tss = &mut ss.by_callsite[simf.callsite_idx].by_type[type_idx];

        for event in &simf.offset_events {
            match *event {
                OffsetEvent::Type {
                    bytecode_offset,
                    ty,
                    concrete,
                }
                | OffsetEvent::Return {
                    bytecode_offset,
                    ty,
                    concrete,
                } => {
                    let oi = tss.offset_index(bytecode_offset);
                    tss.by_offset[oi].record_type(heap, container, ty, concrete);
                }
                OffsetEvent::Invoke {
                    bytecode_offset,
                    value,
                } => {
                    let oi = tss.offset_index(bytecode_offset);
                    tss.by_offset[oi].record_value(heap, container, value);
                }
            }
        }

        for info in &simf.call_infos {
            let oi = tss.offset_index(info.bytecode_offset);
            tss.by_offset[oi].record_type_tuple(heap, container, info.cs, &info.arg_types);
        }

        tss.hits += 1;
        tss.osr_hits += simf.osr_hits;
        if frame_depth > tss.max_depth {
            tss.max_depth = frame_depth;
        }

        // If the caller's most recent invoke demonstrably targeted this
        // frame, hold the tuple for the caller's own pop, where it becomes
        // per-offset callsite type stats.
        if let Some(caller) = self.frames.last_mut() {
            if let Some(lic) = caller.last_invoke_code {
                if heap.is_concrete(lic)
                    && heap.repr(lic) == Repr::Code
                    && heap.code_frame(lic) == Some(simf.sf)
                {
                    if let Some(cs) = cs {
                        caller.call_infos.push(SimCallType {
                            bytecode_offset: caller.last_invoke_offset,
                            cs,
                            arg_types: tss.arg_types.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Pop every remaining frame at end of log
    fn teardown(
        &mut self,
        heap: &mut Heap,
        frames: &mut StaticFrameTable,
        callsites: &CallsiteTable,
    ) {
        while !self.frames.is_empty() {
            self.pop(heap, frames, callsites);
        }
    }
}

/// Whether a tuple is unusable: some object argument has no type logged, or
/// a concrete container-typed argument has no decont type. Truncated logs
/// produce such tuples; keying statistics on them would be unsound.
fn incomplete_type_tuple(heap: &Heap, cs: &Callsite, arg_types: &[ArgType]) -> bool {
    for (flag, arg) in cs.arg_flags().iter().zip(arg_types.iter()) {
        if flag.is_obj() {
            match arg.ty {
                None => return true,
                Some(ty) => {
                    if arg.ty_concrete && heap.has_container_spec(ty) && arg.decont_ty.is_none() {
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Resolve the `ByType` a popping frame's observations belong to, taking
/// ownership of the transient tuple: it either moves into a fresh `ByType`
/// or is dropped here (reused tuples, incomplete tuples, and tuple-free
/// entry paths all drop it).
fn resolve_by_type(
    heap: &Heap,
    callsites: &CallsiteTable,
    ss: &mut ProfileStats,
    callsite_idx: usize,
    arg_types: Option<Box<[ArgType]>>,
) -> Option<usize> {
    let cs_id = ss.by_callsite[callsite_idx].cs?;
    let arg_types = arg_types?;
    let cs = callsites.get(cs_id);
    if !cs.has_object_args() {
        return None;
    }
    if incomplete_type_tuple(heap, cs, &arg_types) {
        log::trace!(
            "profile stats: discarding incomplete type tuple for callsite {}",
            cs_id.as_raw()
        );
        return None;
    }
    let by_cs = &mut ss.by_callsite[callsite_idx];
    if let Some(found) = by_cs
        .by_type
        .iter()
        .position(|bt| bt.arg_types.as_ref() == arg_types.as_ref())
    {
        return Some(found);
    }
    by_cs.by_type.push(ByType {
        arg_types,
        ..Default::default()
    });
    Some(by_cs.by_type.len() - 1)
}

/// Map a parameter event's argument index to the flag slot it fills:
/// positionals map one-to-one, named arguments sit in pairs after the
/// positionals with the value in the odd position. Returns `None` for
/// non-object flags and for the no-callsite entry path.
fn param_flag_index(
    callsites: &CallsiteTable,
    cs: Option<CallsiteId>,
    arg_idx: u16,
) -> Option<usize> {
    let cs = callsites.get(cs?);
    let idx = arg_idx as i64;
    let num_pos = cs.num_pos() as i64;
    let flag_idx = if idx < num_pos {
        idx
    } else {
        num_pos + (idx - 1 - num_pos) / 2
    };
    if flag_idx < 0 || flag_idx as usize >= cs.flag_count() {
        oops!("profile stats: argument flag index out of bounds");
    }
    let flag_idx = flag_idx as usize;
    cs.arg_flags()[flag_idx].is_obj().then_some(flag_idx)
}

/// Consume a sealed log, folding every event into the statistics of the
/// frames it concerns. Each static frame whose statistics change during the
/// call is pushed exactly once into `updated`.
pub fn update(vm: &mut Vm, log: &LogBuffer, updated: &mut Vec<StaticFrameId>) {
    if !log.is_sealed() {
        oops!("profile stats: update requires a sealed log");
    }
    let Vm {
        heap,
        frames,
        callsites,
        config,
        stats_version,
        ..
    } = vm;
    let version = *stats_version;
    if config.debug_gc {
        heap.set_in_specializer(true);
    }

    let mut sims = SimStack::new();
    for event in log.entries() {
        match *event {
            LogEvent::Entry { id, sf, cs } => {
                let frame = frames.get_mut(sf);
                let ss = frame.stats.get_or_insert_with(Default::default);
                if ss.last_update != version {
                    ss.last_update = version;
                    updated.push(sf);
                }
                ss.hits += 1;
                let callsite_idx = ss.callsite_index(cs);
                ss.by_callsite[callsite_idx].hits += 1;
                let arg_types = cs.map(|cs_id| {
                    vec![ArgType::default(); callsites.get(cs_id).flag_count()].into_boxed_slice()
                });
                sims.push(SimFrame {
                    sf,
                    cid: id,
                    cs,
                    callsite_idx,
                    arg_types,
                    offset_events: Vec::new(),
                    call_infos: Vec::new(),
                    osr_hits: 0,
                    last_invoke_offset: 0,
                    last_invoke_code: None,
                });
            }
            LogEvent::Parameter {
                id,
                arg_idx,
                ty,
                concrete,
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: parameter event for unknown correlation id {id}");
                    continue;
                };
                let simf = &mut sims.frames[found];
                if let Some(flag_idx) = param_flag_index(callsites, simf.cs, arg_idx) {
                    let container = frames.get(simf.sf).container();
                    if let Some(arg_types) = simf.arg_types.as_deref_mut() {
                        arg_types[flag_idx].ty = Some(ty);
                        arg_types[flag_idx].ty_concrete = concrete;
                        heap.write_barrier(container, ty);
                    }
                }
            }
            LogEvent::ParameterDecont {
                id,
                arg_idx,
                ty,
                concrete,
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: decont event for unknown correlation id {id}");
                    continue;
                };
                let simf = &mut sims.frames[found];
                if let Some(flag_idx) = param_flag_index(callsites, simf.cs, arg_idx) {
                    let container = frames.get(simf.sf).container();
                    if let Some(arg_types) = simf.arg_types.as_deref_mut() {
                        arg_types[flag_idx].decont_ty = Some(ty);
                        arg_types[flag_idx].decont_ty_concrete = concrete;
                        heap.write_barrier(container, ty);
                    }
                }
            }
            LogEvent::Type {
                id,
                bytecode_offset,
                ty,
                concrete,
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: type event for unknown correlation id {id}");
                    continue;
                };
                sims.frames[found].offset_events.push(OffsetEvent::Type {
                    bytecode_offset,
                    ty,
                    concrete,
                });
            }
            LogEvent::Invoke {
                id,
                bytecode_offset,
                value,
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: invoke event for unknown correlation id {id}");
                    continue;
                };
                let simf = &mut sims.frames[found];
                simf.offset_events.push(OffsetEvent::Invoke {
                    bytecode_offset,
                    value,
                });
                simf.last_invoke_offset = bytecode_offset;
                simf.last_invoke_code = Some(value);
            }
            LogEvent::Osr { id } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: OSR event for unknown correlation id {id}");
                    continue;
                };
                sims.frames[found].osr_hits += 1;
            }
            LogEvent::StaticValue {
                id,
                bytecode_offset,
                value,
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: static event for unknown correlation id {id}");
                    continue;
                };
                let sf = sims.frames[found].sf;
                let frame = frames.get_mut(sf);
                let container = frame.container();
                let Some(ss) = frame.stats.as_deref_mut() else {
                    oops!("profile stats: live simulated frame has no statistics");
                };
                if ss.record_static_value(bytecode_offset, value) {
                    heap.write_barrier(container, value);
                }
            }
            LogEvent::Return {
                id, ty, concrete, ..
            } => {
                let Some(found) = sims.find(id, heap, frames, callsites) else {
                    log::trace!("profile stats: return event for unknown correlation id {id}");
                    continue;
                };
                debug_assert_eq!(found, sims.frames.len() - 1);
                let called_sf = sims.frames[found].sf;
                sims.pop(heap, frames, callsites);
                // Attribute the return type to the caller's invoke offset
                // when the caller's last invoke targeted the frame that
                // just returned.
                if let Some(ty) = ty {
                    if let Some(caller) = sims.frames.last_mut() {
                        if let Some(lic) = caller.last_invoke_code {
                            if heap.is_concrete(lic)
                                && heap.repr(lic) == Repr::Code
                                && heap.code_frame(lic) == Some(called_sf)
                            {
                                let bytecode_offset = caller.last_invoke_offset;
                                caller.offset_events.push(OffsetEvent::Return {
                                    bytecode_offset,
                                    ty,
                                    concrete,
                                });
                            }
                        }
                    }
                }
            }
        }
    }
    sims.teardown(heap, frames, callsites);

    if config.debug_gc {
        heap.set_in_specializer(false);
    }
    log::debug!(
        "profile stats: folded {} events, {} frames updated",
        log.len(),
        updated.len()
    );
}

/// Age out stale statistics. Frames whose statistics are gone are dropped
/// from `candidates`; frames whose statistics lag the current version by
/// more than the configured age have them destroyed and are dropped too;
/// the rest are retained in place.
pub fn cleanup(vm: &mut Vm, candidates: &mut Vec<StaticFrameId>) {
    let version = vm.stats_version;
    let max_age = vm.config.max_age;
    let frames = &mut vm.frames;
    candidates.retain(|&sf| {
        let frame = frames.get_mut(sf);
        let Some(stats) = frame.stats.as_deref() else {
            return false;
        };
        if version - stats.last_update > max_age {
            log::debug!(
                "profile stats: aging out {:?} (last update {}, version {})",
                sf,
                stats.last_update,
                version
            );
            frame.stats = None;
            false
        } else {
            true
        }
    });
}
