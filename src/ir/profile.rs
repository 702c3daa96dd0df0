//! Block frequency tables and the static profiler of the reference IR.
//!
//! [`StaticProfiler`] estimates how often each block of a [`Module`] runs
//! without executing anything. Frequencies flow from the module's roots along
//! call instructions:
//!
//! - a root function is entered as often as its root count says;
//! - every call instruction enters its callee once per execution of the
//!   calling block;
//! - a block runs `entry * weight / 1000` times, rounded down.
//!
//! Functions are visited callers-first, component by component. Inside a
//! recursive component the estimate is refined by a fixed number of rounds,
//! each one feeding the previous round's entry frequencies around the cycle.

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use num_traits::Zero;

use crate::{
    analysis::CallGraph,
    ir::{module::ENTRY_WEIGHT, BlockId, FrequencyOracle, FunctionId, Module, Profiler},
    Result,
};

/// Absolute execution frequency of every profiled block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    frequencies: HashMap<BlockId, BigUint>,
}

impl FrequencyTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the frequency of `block`, replacing any previous value.
    pub fn insert(&mut self, block: BlockId, frequency: impl Into<BigUint>) {
        self.frequencies.insert(block, frequency.into());
    }

    /// Returns the frequency of `block`.
    #[must_use]
    pub fn get(&self, block: BlockId) -> Option<&BigUint> {
        self.frequencies.get(&block)
    }

    /// Returns the number of profiled blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Returns `true` if no block has been profiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

impl FrequencyOracle for FrequencyTable {
    fn block_frequency(&self, block: BlockId) -> Option<BigUint> {
        self.frequencies.get(&block).cloned()
    }
}

impl<B: Into<BigUint>> FromIterator<(BlockId, B)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (BlockId, B)>>(iter: I) -> Self {
        Self {
            frequencies: iter.into_iter().map(|(b, f)| (b, f.into())).collect(),
        }
    }
}

/// Static, weight-based profiler for [`Module`].
#[derive(Debug, Clone)]
pub struct StaticProfiler {
    /// Refinement rounds applied inside each recursive component.
    rounds: usize,
}

impl Default for StaticProfiler {
    fn default() -> Self {
        Self::new(4)
    }
}

impl StaticProfiler {
    /// Creates a profiler that refines recursive components `rounds` times.
    #[must_use]
    pub fn new(rounds: usize) -> Self {
        Self { rounds }
    }

    /// Returns the number of refinement rounds.
    #[must_use]
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

/// Frequency of a block of weight `weight` in a function entered `entry` times.
fn block_frequency(entry: &BigUint, weight: u32) -> BigUint {
    entry * weight / ENTRY_WEIGHT
}

/// Entries contributed by `function` to each callee it calls, one per call.
fn call_contributions(
    module: &Module,
    function: FunctionId,
    entry: &BigUint,
) -> Vec<(FunctionId, BigUint)> {
    let Some(func) = module.function(function) else {
        return Vec::new();
    };

    let mut contributions = Vec::new();
    for block in &func.blocks {
        let freq = block_frequency(entry, block.weight);
        for callee in block.instructions.iter().filter_map(|i| i.callee()) {
            contributions.push((callee, freq.clone()));
        }
    }
    contributions
}

impl Profiler<Module> for StaticProfiler {
    fn profile(&mut self, module: &Module) -> Result<FrequencyTable> {
        let graph = CallGraph::build(module)?;

        let mut incoming: HashMap<FunctionId, BigUint> = HashMap::new();
        for (root, count) in module.roots() {
            *incoming.entry(root).or_default() += count;
        }

        let mut entries: HashMap<FunctionId, BigUint> = HashMap::new();
        for component in graph.sccs().iter().rev() {
            let members: HashSet<FunctionId> = component.iter().copied().collect();
            let base: HashMap<FunctionId, BigUint> = component
                .iter()
                .map(|f| (*f, incoming.remove(f).unwrap_or_default()))
                .collect();

            let mut current = base.clone();
            if component.iter().any(|&f| graph.is_recursive(f)) {
                for _ in 0..self.rounds {
                    let mut next = base.clone();
                    for &function in component {
                        let entry = current.get(&function).cloned().unwrap_or_default();
                        for (callee, freq) in call_contributions(module, function, &entry) {
                            if members.contains(&callee) {
                                *next.entry(callee).or_default() += freq;
                            }
                        }
                    }
                    current = next;
                }
            }

            for &function in component {
                let entry = current.remove(&function).unwrap_or_default();
                for (callee, freq) in call_contributions(module, function, &entry) {
                    if !members.contains(&callee) && !freq.is_zero() {
                        *incoming.entry(callee).or_default() += freq;
                    }
                }
                entries.insert(function, entry);
            }
        }

        let mut table = FrequencyTable::new();
        for func in module.iter() {
            let entry = entries.get(&func.id).cloned().unwrap_or_default();
            for block in &func.blocks {
                table.insert(block.id, block_frequency(&entry, block.weight));
            }
        }

        log::debug!(
            "static profile: {} functions, {} blocks",
            module.function_count(),
            table.len()
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use crate::ir::{
        FrequencyOracle, FrequencyTable, Instruction, Module, Profiler, StaticProfiler,
    };

    #[test]
    fn test_root_and_call_propagation() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let helper = module.add_function("helper");
        module.set_root(main, 100).unwrap();

        let entry = module.entry(main).unwrap();
        let loop_body = module.add_block(main, 5000).unwrap();
        module.push(entry, Instruction::Call(helper)).unwrap();
        module.push(loop_body, Instruction::Call(helper)).unwrap();

        let table = StaticProfiler::default().profile(&module).unwrap();
        assert_eq!(table.block_frequency(entry), Some(BigUint::from(100u32)));
        assert_eq!(table.block_frequency(loop_body), Some(BigUint::from(500u32)));

        let helper_entry = module.entry(helper).unwrap();
        assert_eq!(table.block_frequency(helper_entry), Some(BigUint::from(600u32)));
    }

    #[test]
    fn test_unreachable_function_has_zero_frequency() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let dead = module.add_function("dead");
        module.set_root(main, 7).unwrap();

        let table = StaticProfiler::default().profile(&module).unwrap();
        let dead_entry = module.entry(dead).unwrap();
        assert_eq!(table.block_frequency(dead_entry), Some(BigUint::from(0u32)));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_recursive_component_is_refined() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let rec = module.add_function("rec");
        module.set_root(main, 1000).unwrap();
        module.push(module.entry(main).unwrap(), Instruction::Call(rec)).unwrap();

        // rec calls itself from a block that runs half the time.
        let recurse = module.add_block(rec, 500).unwrap();
        module.push(recurse, Instruction::Call(rec)).unwrap();

        let table = StaticProfiler::new(2).profile(&module).unwrap();
        let rec_entry = module.entry(rec).unwrap();
        // 1000 -> 1000 + 500 -> 1000 + 750
        assert_eq!(table.block_frequency(rec_entry), Some(BigUint::from(1750u32)));
    }

    #[test]
    fn test_table_from_iter() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let entry = module.entry(main).unwrap();

        let table: FrequencyTable = [(entry, 42u32)].into_iter().collect();
        assert_eq!(table.get(entry), Some(&BigUint::from(42u32)));
        assert!(!table.is_empty());
    }
}
