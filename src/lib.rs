//! Argent: profile-driven specialization statistics for a dynamic-language VM
//!
//! Argent is the statistics core of a speculative specializer. Running
//! threads record what actually happens as code executes; this crate folds
//! those recordings into per-static-frame statistics (by callsite, by
//! argument-type tuple, by bytecode offset) that drive specialization
//! decisions, and provides the open-addressed Robin Hood hash table family
//! the wider VM builds its symbol tables and interning indexes on.
//!
//! # Quick Start
//!
//! ```
//! use argent::frame::ArgFlags;
//! use argent::profile::{self, LogBuffer, LogEvent};
//! use argent::vm::Vm;
//!
//! let mut vm = Vm::new();
//! let sf = vm.new_static_frame("main");
//! let cs = vm.new_callsite(1, &[ArgFlags::OBJ]).unwrap();
//! let ty = vm.heap.alloc_type(false);
//!
//! let mut log = LogBuffer::new();
//! log.push(LogEvent::Entry { id: 1, sf, cs: Some(cs) }).unwrap();
//! log.push(LogEvent::Parameter { id: 1, arg_idx: 0, ty, concrete: true }).unwrap();
//! log.seal();
//!
//! let mut updated = Vec::new();
//! profile::update(&mut vm, &log, &mut updated);
//! assert_eq!(vm.frames.get(sf).stats().unwrap().hits, 1);
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Statistics** | [`profile`] (log buffer, aggregator, stats trees, aging) |
//! | **Hash tables** | [`hash`] (pointer, name, index, and fixed-key variants) |
//! | **Substrate** | [`heap`], [`frame`], [`strings`], [`vm`] |

pub mod frame;
pub mod hash;
pub mod heap;
pub mod profile;
pub mod strings;
pub mod vm;

mod error;

pub use error::{Error, Result};
pub use vm::{ProfileConfig, Vm};

/// Argent version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
