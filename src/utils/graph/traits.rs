//! Trait definitions for graph abstractions.
//!
//! Algorithms in [`crate::utils::graph::algorithms`] are written against these
//! traits rather than a concrete graph type.

use crate::utils::graph::NodeId;

/// Core graph properties: node count and node iteration.
pub trait GraphBase {
    /// Returns the number of nodes in the graph.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node ids, in ascending order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns the targets of the outgoing edges of `node`.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}
