//! Shared utilities.
//!
//! - [`graph`] - Directed graph infrastructure and the algorithms the call
//!   graph relies on (recursion detection, propagation order)
//! - [`escape_dot`] - Escaping for Graphviz output

mod dot;
pub mod graph;

pub use dot::escape_dot;
