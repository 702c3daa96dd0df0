//! Function-level call graph.
//!
//! [`CallGraph`] captures which functions call which, ignoring call-site
//! multiplicity. It is built from any [`Program`] and answers the two
//! structural questions the inliner asks of the whole program: which
//! functions are recursive, and in which order frequencies flow from callers
//! to callees.
//!
//! The implementation sits on the generic [`DirectedGraph`] from
//! `utils/graph`, and recursion is derived from its strongly connected
//! components.

use std::collections::{HashMap, HashSet};

use crate::{
    ir::{FunctionId, Program},
    utils::graph::{algorithms::strongly_connected_components, DirectedGraph, NodeId},
    Result,
};

/// Inter-procedural call graph over the functions of a program.
///
/// Only structurally inlineable calls (direct and closure calls) produce
/// edges, and only when the callee is itself a function of the program.
///
/// # Example
///
/// ```rust
/// use profinline::analysis::CallGraph;
/// use profinline::ir::{Instruction, Module};
///
/// let mut module = Module::new();
/// let main = module.add_function("main");
/// let fact = module.add_function("fact");
/// module.push(module.entry(main)?, Instruction::Call(fact))?;
/// module.push(module.entry(fact)?, Instruction::Call(fact))?;
///
/// let graph = CallGraph::build(&module)?;
/// assert!(graph.is_recursive(fact));
/// assert!(!graph.is_recursive(main));
/// assert_eq!(graph.topological_order()[0], main);
/// # Ok::<(), profinline::Error>(())
/// ```
#[derive(Debug)]
pub struct CallGraph {
    /// Nodes are functions, edges are "calls at least once".
    graph: DirectedGraph<FunctionId, ()>,
    /// Map from function id to node id in the graph.
    function_to_node: HashMap<FunctionId, NodeId>,
    /// Strongly connected components, callees before callers.
    sccs: Vec<Vec<FunctionId>>,
    /// Functions that are self-recursive or part of a cycle.
    recursive: HashSet<FunctionId>,
}

impl CallGraph {
    /// Builds the call graph of `program`.
    ///
    /// # Arguments
    ///
    /// * `program` - The program to scan for call instructions
    ///
    /// # Errors
    ///
    /// Returns an error if an edge refers to a node that was never added,
    /// which indicates an internal bug.
    pub fn build<P: Program + ?Sized>(program: &P) -> Result<Self> {
        let functions = program.functions();
        let mut graph = DirectedGraph::with_capacity(functions.len(), functions.len());
        let mut function_to_node = HashMap::with_capacity(functions.len());

        for &function in &functions {
            function_to_node.insert(function, graph.add_node(function));
        }

        for &caller in &functions {
            let Some(&from) = function_to_node.get(&caller) else {
                continue;
            };
            for call in program.call_instructions(caller) {
                let Some(callee) = call.shape.inlineable_callee() else {
                    continue;
                };
                if let Some(&to) = function_to_node.get(&callee) {
                    if !graph.has_edge(from, to) {
                        graph.add_edge(from, to, ())?;
                    }
                }
            }
        }

        let mut sccs = Vec::new();
        let mut recursive = HashSet::new();
        for component in strongly_connected_components(&graph) {
            let cyclic = component.len() > 1
                || component.iter().any(|&node| graph.has_edge(node, node));

            let members: Vec<FunctionId> = component
                .iter()
                .filter_map(|&node| graph.node(node).copied())
                .collect();
            if cyclic {
                recursive.extend(members.iter().copied());
            }
            sccs.push(members);
        }

        Ok(Self {
            graph,
            function_to_node,
            sccs,
            recursive,
        })
    }

    /// Returns the number of functions in the graph.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of distinct caller/callee pairs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the distinct functions called by `caller`.
    #[must_use]
    pub fn callees(&self, caller: FunctionId) -> Vec<FunctionId> {
        let Some(&node) = self.function_to_node.get(&caller) else {
            return Vec::new();
        };
        self.graph
            .successors(node)
            .filter_map(|succ| self.graph.node(succ).copied())
            .collect()
    }

    /// Returns the strongly connected components in reverse topological order
    /// (callees before callers).
    #[must_use]
    pub fn sccs(&self) -> &[Vec<FunctionId>] {
        &self.sccs
    }

    /// Returns every function ordered so that callers precede callees.
    ///
    /// Members of one component appear together, in no particular order.
    #[must_use]
    pub fn topological_order(&self) -> Vec<FunctionId> {
        self.sccs.iter().rev().flatten().copied().collect()
    }

    /// Returns `true` if `function` calls itself, directly or through a cycle.
    #[must_use]
    pub fn is_recursive(&self, function: FunctionId) -> bool {
        self.recursive.contains(&function)
    }

    /// Returns all recursive functions, sorted by id.
    #[must_use]
    pub fn recursive_functions(&self) -> Vec<FunctionId> {
        let mut functions: Vec<FunctionId> = self.recursive.iter().copied().collect();
        functions.sort_unstable();
        functions
    }

    /// Returns `true` if any function is recursive.
    #[must_use]
    pub fn has_recursion(&self) -> bool {
        !self.recursive.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::CallGraph,
        ir::{Instruction, Module},
    };

    #[test]
    fn test_mutual_recursion_detected() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let even = module.add_function("even");
        let odd = module.add_function("odd");
        let leaf = module.add_function("leaf");

        module.push(module.entry(main).unwrap(), Instruction::Call(even)).unwrap();
        module.push(module.entry(even).unwrap(), Instruction::Call(odd)).unwrap();
        module.push(module.entry(odd).unwrap(), Instruction::CallClosure(even)).unwrap();
        module.push(module.entry(odd).unwrap(), Instruction::Call(leaf)).unwrap();

        let graph = CallGraph::build(&module).unwrap();
        assert!(graph.has_recursion());
        assert_eq!(graph.recursive_functions(), vec![even, odd]);
        assert!(!graph.is_recursive(leaf));
        assert_eq!(graph.function_count(), 4);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn test_callers_precede_callees() {
        let mut module = Module::new();
        let a = module.add_function("a");
        let b = module.add_function("b");
        let c = module.add_function("c");
        // Calls point backwards in id order on purpose.
        module.push(module.entry(c).unwrap(), Instruction::Call(b)).unwrap();
        module.push(module.entry(b).unwrap(), Instruction::Call(a)).unwrap();
        module.push(module.entry(b).unwrap(), Instruction::Call(a)).unwrap();

        let graph = CallGraph::build(&module).unwrap();
        assert_eq!(graph.topological_order(), vec![c, b, a]);
        assert_eq!(graph.callees(b), vec![a]);
        assert_eq!(graph.edge_count(), 2);
        assert!(!graph.has_recursion());
    }

    #[test]
    fn test_non_call_instructions_add_no_edges() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let entry = module.entry(main).unwrap();
        module.push(entry, Instruction::Branch).unwrap();
        module.push(entry, Instruction::Inlined(main)).unwrap();

        let graph = CallGraph::build(&module).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.is_recursive(main));
    }
}
