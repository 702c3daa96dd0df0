//! Strongly connected components, Tarjan's algorithm.
//!
//! On a call graph every component with more than one member is a group of
//! mutually recursive functions; a single function is recursive only if it
//! calls itself.
//!
//! The depth-first walk keeps its own frame stack instead of recursing, so
//! long call chains cannot overflow the native stack.

use crate::utils::graph::{NodeId, Successors};

/// Computes the strongly connected components of `graph`.
///
/// Components come out in **reverse topological order**: if an edge leads
/// from component A to component B, B is listed before A. Within a component
/// nodes are listed in the order they leave the Tarjan stack.
///
/// # Complexity
///
/// O(V + E) time, O(V) space.
pub fn strongly_connected_components<G>(graph: &G) -> Vec<Vec<NodeId>>
where
    G: Successors,
{
    let mut walk = Walk::new(graph.node_count());
    for root in graph.node_ids() {
        if walk.order[root.index()].is_none() {
            walk.run(graph, root);
        }
    }
    walk.components
}

/// One pending node of the depth-first walk and its unexplored successors.
type Frame = (NodeId, std::vec::IntoIter<NodeId>);

struct Walk {
    /// Discovery order of each node, `None` until visited.
    order: Vec<Option<usize>>,
    /// Smallest discovery order reachable through the node's subtree.
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<NodeId>,
    next_order: usize,
    components: Vec<Vec<NodeId>>,
}

impl Walk {
    fn new(node_count: usize) -> Self {
        Self {
            order: vec![None; node_count],
            low: vec![0; node_count],
            on_stack: vec![false; node_count],
            stack: Vec::new(),
            next_order: 0,
            components: Vec::new(),
        }
    }

    fn enter<G: Successors>(&mut self, graph: &G, node: NodeId, frames: &mut Vec<Frame>) {
        let i = node.index();
        self.order[i] = Some(self.next_order);
        self.low[i] = self.next_order;
        self.next_order += 1;
        self.stack.push(node);
        self.on_stack[i] = true;

        let successors: Vec<NodeId> = graph.successors(node).collect();
        frames.push((node, successors.into_iter()));
    }

    fn run<G: Successors>(&mut self, graph: &G, root: NodeId) {
        let mut frames = Vec::new();
        self.enter(graph, root, &mut frames);

        loop {
            let Some(frame) = frames.last_mut() else {
                break;
            };
            let node = frame.0;

            match frame.1.next() {
                Some(next) => match self.order[next.index()] {
                    None => self.enter(graph, next, &mut frames),
                    Some(order) if self.on_stack[next.index()] => {
                        let low = &mut self.low[node.index()];
                        *low = (*low).min(order);
                    }
                    Some(_) => {}
                },
                None => {
                    frames.pop();
                    let low = self.low[node.index()];
                    if let Some((parent, _)) = frames.last() {
                        let parent_low = &mut self.low[parent.index()];
                        *parent_low = (*parent_low).min(low);
                    }
                    if self.order[node.index()] == Some(low) {
                        self.close(node);
                    }
                }
            }
        }
    }

    /// Pops the component rooted at `root` off the stack.
    fn close(&mut self, root: NodeId) {
        let mut component = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack[member.index()] = false;
            component.push(member);
            if member == root {
                break;
            }
        }
        self.components.push(component);
    }
}
