//! Profile statistics: log consumption, aggregation, and aging
//!
//! The mutator's instrumentation records what actually happens as code runs:
//! which frames are entered through which callsites, what types arguments
//! have, what values invocations target, where OSR points are crossed. This
//! module turns those flat recordings into per-static-frame statistics the
//! specializer can act on.
//!
//! The flow is `LogBuffer` → [`update`] → the [`ProfileStats`] trees hanging
//! off static frames, with [`cleanup`] aging stale trees out and [`gc_mark`]
//! reporting every borrowed heap reference to the collector.

mod aggregate;
mod log;
mod stats;

pub use aggregate::{cleanup, update};
pub use log::{LogBuffer, LogEvent};
pub use stats::{
    gc_mark, ArgType, ByCallsite, ByOffset, ByType, CallsiteReport, ProfileStats, StaticValue,
    StatsReport, TypeCount, TypeTupleCount, TypeTupleReport, ValueCount,
};
