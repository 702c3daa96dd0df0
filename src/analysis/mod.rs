//! Program analysis infrastructure for the inliner.
//!
//! This module builds upon the generic graph infrastructure in
//! [`crate::utils::graph`] to provide the call-graph views inlining decisions
//! are made on.
//!
//! - [`callgraph`] - Function call graph and the frequency-annotated call graph index

pub mod callgraph;

pub use callgraph::{
    CallGraph, CallGraphIndex, CallGraphIndexStats, CallSiteId, CallSiteRecord, FunctionRecord,
};
