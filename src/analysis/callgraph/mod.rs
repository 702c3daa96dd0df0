//! Inter-procedural call graph construction and the inliner's call graph index.
//!
//! # Components
//!
//! - [`CallGraph`]: Function-level call graph; recursion and propagation order
//! - [`CallGraphIndex`]: Frequency-annotated call sites over a single arena
//! - [`CallSiteRecord`]: Bookkeeping for one call instruction
//! - [`FunctionRecord`]: Bookkeeping for one function
//! - [`CallSiteId`]: Stable handle of a record within one index generation
//!
//! # Example
//!
//! ```rust
//! use profinline::analysis::{CallGraph, CallGraphIndex};
//! use profinline::ir::{Instruction, Module, Profiler, StaticProfiler};
//!
//! let mut module = Module::new();
//! let main = module.add_function("main");
//! let fib = module.add_function("fib");
//! module.set_root(main, 1)?;
//! module.push(module.entry(main)?, Instruction::Call(fib))?;
//! module.push(module.entry(fib)?, Instruction::Call(fib))?;
//!
//! let graph = CallGraph::build(&module)?;
//! assert_eq!(graph.recursive_functions(), vec![fib]);
//!
//! let profile = StaticProfiler::default().profile(&module)?;
//! let index = CallGraphIndex::build(&module, &profile)?;
//! for (id, record) in index.records_in_order() {
//!     println!("{id}: {} -> {} x{}", record.caller, record.callee, record.frequency);
//! }
//! # Ok::<(), profinline::Error>(())
//! ```

mod graph;
mod index;
mod site;

pub use graph::CallGraph;
pub use index::{CallGraphIndex, CallGraphIndexStats};
pub use site::{CallSiteId, CallSiteRecord, FunctionRecord};
