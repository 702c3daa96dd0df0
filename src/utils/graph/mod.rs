//! Generic directed graph infrastructure for call-graph analysis.
//!
//! This module provides a small, reusable directed graph used by the call
//! graph index (recursion detection) and the reference profiler (propagation
//! order over the call graph).
//!
//! # Key Components
//!
//! - [`NodeId`] - Strongly-typed node identifier
//! - [`DirectedGraph`] - Adjacency-list directed graph with node payloads
//! - [`GraphBase`], [`Successors`] - Traits the algorithms are written against
//! - [`algorithms`] - Strongly connected components
//!
//! # Example
//!
//! ```rust
//! use profinline::utils::graph::{algorithms, DirectedGraph};
//!
//! let mut graph: DirectedGraph<&str, ()> = DirectedGraph::new();
//! let a = graph.add_node("A");
//! let b = graph.add_node("B");
//! graph.add_edge(a, b, ())?;
//! graph.add_edge(b, a, ())?;
//!
//! let sccs = algorithms::strongly_connected_components(&graph);
//! assert_eq!(sccs.len(), 1);
//! # Ok::<(), profinline::Error>(())
//! ```

pub mod algorithms;
mod directed;
mod node;
mod traits;

pub use directed::DirectedGraph;
pub use node::NodeId;
pub use traits::{GraphBase, Successors};
