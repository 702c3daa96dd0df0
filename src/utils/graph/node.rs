//! Node identifier implementation for directed graphs.

use std::fmt;

/// A strongly-typed identifier for nodes within a [`DirectedGraph`](crate::utils::graph::DirectedGraph).
///
/// Node ids are assigned sequentially starting from 0 as nodes are added, so
/// they double as indices into per-node side tables.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::graph::NodeId;

    #[test]
    fn test_node_id_roundtrip() {
        let node = NodeId::new(5);
        assert_eq!(node.index(), 5);
        assert_eq!(node.to_string(), "n5");
        assert_eq!(format!("{node:?}"), "NodeId(5)");
        assert!(NodeId::new(1) < NodeId::new(2));
    }
}
