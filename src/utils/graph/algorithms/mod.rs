//! Graph algorithms for call-graph analysis.
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | SCC | O(V + E) | Recursion detection, propagation order |

mod scc;

pub use scc::strongly_connected_components;
