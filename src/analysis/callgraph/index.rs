//! The call graph index: frequency-annotated call sites over one arena.

use std::{
    collections::{BTreeMap, HashSet},
    fmt::Write,
};

use crate::{
    analysis::callgraph::{CallGraph, CallSiteId, CallSiteRecord, FunctionRecord},
    ir::{FrequencyOracle, FunctionId, Location, Program},
    utils::escape_dot,
    Error, Result,
};

/// Frequency- and size-annotated view of every call site in a program.
///
/// All [`CallSiteRecord`]s live in a single arena and are addressed by
/// [`CallSiteId`]. Two views index the arena: the per-function map in each
/// [`FunctionRecord`] and the program-wide map ordered by [`Location`].
/// Inserting through [`CallGraphIndex::insert_call_sites`] updates both, so
/// they can never disagree.
///
/// A rebuild throws the whole generation away, including every `inlined`
/// marker and every issued [`CallSiteId`].
///
/// # Example
///
/// ```rust
/// use profinline::analysis::CallGraphIndex;
/// use profinline::ir::{Instruction, Module, Profiler, StaticProfiler};
///
/// let mut module = Module::new();
/// let main = module.add_function("main");
/// let helper = module.add_function("helper");
/// module.set_root(main, 50)?;
/// module.push(module.entry(main)?, Instruction::Call(helper))?;
///
/// let profile = StaticProfiler::default().profile(&module)?;
/// let index = CallGraphIndex::build(&module, &profile)?;
/// assert_eq!(index.call_site_count(), 1);
/// assert_eq!(index.function(helper).map(|f| f.frequency.clone()), Some(50u32.into()));
/// # Ok::<(), profinline::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallGraphIndex {
    /// Arena of call site records.
    records: Vec<CallSiteRecord>,
    /// Per-function records, in function id order.
    functions: BTreeMap<FunctionId, FunctionRecord>,
    /// Program-wide view of the arena, ordered by location.
    all_call_sites: BTreeMap<Location, CallSiteId>,
    /// Number of rebuilds this index has gone through.
    generation: u64,
}

impl CallGraphIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index for `program` from the block frequencies in `oracle`.
    ///
    /// Only direct and closure calls to functions of the program are tracked.
    ///
    /// # Arguments
    ///
    /// * `program` - Program snapshot to index
    /// * `oracle` - Block frequencies for that snapshot
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFrequency`] if the oracle has no frequency for
    /// an entry block or a block holding a call, and an invariant error if a
    /// function has no entry block or no size.
    pub fn build<P, O>(program: &P, oracle: &O) -> Result<Self>
    where
        P: Program + ?Sized,
        O: FrequencyOracle + ?Sized,
    {
        let graph = CallGraph::build(program)?;
        let functions = program.functions();
        let mut index = Self::new();

        for &function in &functions {
            let entry = program
                .entry_block(function)
                .ok_or_else(|| invariant_error!("function {} has no entry block", function))?;
            let frequency = oracle
                .block_frequency(entry)
                .ok_or(Error::MissingFrequency(entry))?;
            let size = program
                .function_size(function)
                .ok_or_else(|| invariant_error!("function {} has no size", function))?;

            index.insert_function(FunctionRecord::new(
                function,
                frequency,
                size,
                graph.is_recursive(function),
            ))?;
        }

        for &caller in &functions {
            let mut records = Vec::new();
            for call in program.call_instructions(caller) {
                let Some(callee) = call.shape.inlineable_callee() else {
                    continue;
                };
                if !index.functions.contains_key(&callee) {
                    continue;
                }
                let frequency = oracle
                    .block_frequency(call.location.block)
                    .ok_or(Error::MissingFrequency(call.location.block))?;
                records.push(CallSiteRecord::new(call.location, caller, callee, frequency));
            }
            index.insert_call_sites(caller, records)?;
        }

        log::debug!(
            "call graph index built: {} functions, {} call sites",
            index.function_count(),
            index.call_site_count()
        );
        Ok(index)
    }

    /// Replaces this index with a freshly built generation.
    ///
    /// # Errors
    ///
    /// Same as [`CallGraphIndex::build`]. On error the index is left untouched.
    pub fn rebuild<P, O>(&mut self, program: &P, oracle: &O) -> Result<()>
    where
        P: Program + ?Sized,
        O: FrequencyOracle + ?Sized,
    {
        let mut next = Self::build(program, oracle)?;
        next.generation = self.generation + 1;
        *self = next;
        Ok(())
    }

    /// Adds a function without call sites.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the function is already indexed or the
    /// record already carries call sites; those must go through
    /// [`CallGraphIndex::insert_call_sites`].
    pub fn insert_function(&mut self, record: FunctionRecord) -> Result<()> {
        if self.functions.contains_key(&record.id) {
            return Err(invariant_error!("function {} is already indexed", record.id));
        }
        if !record.call_sites.is_empty() {
            return Err(invariant_error!(
                "function record {} carries {} unindexed call sites",
                record.id,
                record.call_sites.len()
            ));
        }
        self.functions.insert(record.id, record);
        Ok(())
    }

    /// Adds new call sites to `caller`, mirroring them into both views.
    ///
    /// The whole batch is validated before anything is inserted.
    ///
    /// # Returns
    ///
    /// The ids of the inserted records, in batch order.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingFunction`] if `caller` is not indexed
    /// - [`Error::DuplicateCallSite`] if a location is already tracked or
    ///   appears twice in the batch
    /// - an invariant error if a record names a different caller
    pub fn insert_call_sites(
        &mut self,
        caller: FunctionId,
        records: Vec<CallSiteRecord>,
    ) -> Result<Vec<CallSiteId>> {
        if !self.functions.contains_key(&caller) {
            return Err(Error::MissingFunction(caller));
        }

        let mut batch = HashSet::with_capacity(records.len());
        for record in &records {
            if record.caller != caller {
                return Err(invariant_error!(
                    "call site {} belongs to {}, not {}",
                    record.location,
                    record.caller,
                    caller
                ));
            }
            if self.all_call_sites.contains_key(&record.location) || !batch.insert(record.location)
            {
                return Err(Error::DuplicateCallSite(record.location));
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = CallSiteId::new(self.records.len());
            let location = record.location;
            self.records.push(record);
            self.all_call_sites.insert(location, id);
            if let Some(function) = self.functions.get_mut(&caller) {
                function.call_sites.insert(location, id);
            }
            ids.push(id);
        }
        Ok(ids)
    }

    /// Returns the record of `function`.
    #[must_use]
    pub fn function(&self, function: FunctionId) -> Option<&FunctionRecord> {
        self.functions.get(&function)
    }

    /// Returns the record of `function` for modification.
    pub fn function_mut(&mut self, function: FunctionId) -> Option<&mut FunctionRecord> {
        self.functions.get_mut(&function)
    }

    /// Iterates over function records in id order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.functions.values()
    }

    /// Returns the call site record `id`.
    #[must_use]
    pub fn record(&self, id: CallSiteId) -> Option<&CallSiteRecord> {
        self.records.get(id.index())
    }

    /// Returns the call site record `id` for modification.
    pub fn record_mut(&mut self, id: CallSiteId) -> Option<&mut CallSiteRecord> {
        self.records.get_mut(id.index())
    }

    /// Returns the id of the call site tracked at `location`.
    #[must_use]
    pub fn lookup(&self, location: Location) -> Option<CallSiteId> {
        self.all_call_sites.get(&location).copied()
    }

    /// Iterates over every call site in location order.
    pub fn records_in_order(&self) -> impl Iterator<Item = (CallSiteId, &CallSiteRecord)> + '_ {
        self.all_call_sites
            .values()
            .filter_map(|&id| self.record(id).map(|r| (id, r)))
    }

    /// Returns the call sites inside `function`, in location order.
    #[must_use]
    pub fn call_sites_of(&self, function: FunctionId) -> Vec<CallSiteId> {
        self.functions
            .get(&function)
            .map(|f| f.call_sites.values().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the number of indexed functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Returns the number of tracked call sites, inlined ones included.
    #[must_use]
    pub fn call_site_count(&self) -> usize {
        self.all_call_sites.len()
    }

    /// Returns how many times this index has been rebuilt.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns aggregate statistics over the current generation.
    #[must_use]
    pub fn stats(&self) -> CallGraphIndexStats {
        CallGraphIndexStats {
            functions: self.functions.len(),
            call_sites: self.all_call_sites.len(),
            inlined_call_sites: self.records.iter().filter(|r| r.is_inlined()).count(),
            recursive_functions: self.functions.values().filter(|f| f.recursive).count(),
            total_size: self.functions.values().map(|f| f.size).sum(),
        }
    }

    /// Generates a DOT representation of the index.
    ///
    /// Functions are labelled with their frequency and size; recursive ones
    /// are filled. Every call site becomes one edge labelled with its
    /// frequency; inlined call sites are dashed.
    ///
    /// # Arguments
    ///
    /// * `title` - Optional title for the graph
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CallGraphIndex {\n");
        let _ = writeln!(
            dot,
            "    label=\"{}\";",
            escape_dot(title.unwrap_or("Call Graph Index"))
        );
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    edge [fontname=\"Courier\", fontsize=9];\n\n");

        for function in self.functions.values() {
            let style = if function.recursive {
                ", style=filled, fillcolor=lightpink"
            } else {
                ""
            };
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\\nfreq={}\\nsize={}\"{style}];",
                function.id, function.id, function.frequency, function.size
            );
        }

        dot.push('\n');

        for (_, record) in self.records_in_order() {
            let style = if record.is_inlined() {
                ", style=dashed"
            } else {
                ""
            };
            let _ = writeln!(
                dot,
                "    \"{}\" -> \"{}\" [label=\"{}\"{style}];",
                record.caller, record.callee, record.frequency
            );
        }

        dot.push_str("}\n");
        dot
    }
}

/// Aggregate metrics of a [`CallGraphIndex`] generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraphIndexStats {
    /// Number of indexed functions.
    pub functions: usize,
    /// Number of tracked call sites.
    pub call_sites: usize,
    /// Number of call sites already chosen for inlining.
    pub inlined_call_sites: usize,
    /// Number of recursive functions.
    pub recursive_functions: usize,
    /// Sum of all function sizes.
    pub total_size: u64,
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use crate::{
        analysis::callgraph::{CallGraphIndex, CallSiteRecord},
        ir::{FrequencyTable, Instruction, Location, Module, Profiler, StaticProfiler},
        Error,
    };

    fn sample() -> Module {
        let mut module = Module::new();
        let main = module.add_function("main");
        let helper = module.add_function("helper");
        let rec = module.add_function("rec");
        module.set_root(main, 100).unwrap();

        let entry = module.entry(main).unwrap();
        module.push(entry, Instruction::Call(helper)).unwrap();
        module.push(entry, Instruction::Branch).unwrap();
        module.push(entry, Instruction::CallClosure(rec)).unwrap();
        let rec_entry = module.entry(rec).unwrap();
        module.push(rec_entry, Instruction::Call(rec)).unwrap();
        module
    }

    #[test]
    fn test_build_tracks_call_sites_only() {
        let module = sample();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let index = CallGraphIndex::build(&module, &profile).unwrap();

        assert_eq!(index.function_count(), 3);
        assert_eq!(index.call_site_count(), 3);

        let main = module.function_by_name("main").unwrap();
        let rec = module.function_by_name("rec").unwrap();
        assert_eq!(index.call_sites_of(main).len(), 2);
        assert!(index.function(rec).unwrap().recursive);
        assert!(!index.function(main).unwrap().recursive);
        assert_eq!(index.function(main).unwrap().size, 3);
        assert_eq!(index.function(main).unwrap().frequency, BigUint::from(100u32));

        let stats = index.stats();
        assert_eq!(stats.recursive_functions, 1);
        assert_eq!(stats.total_size, 4);
        assert_eq!(stats.inlined_call_sites, 0);
    }

    #[test]
    fn test_records_in_order_follow_locations() {
        let module = sample();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let index = CallGraphIndex::build(&module, &profile).unwrap();

        let locations: Vec<Location> = index.records_in_order().map(|(_, r)| r.location).collect();
        let mut sorted = locations.clone();
        sorted.sort();
        assert_eq!(locations, sorted);

        for (id, record) in index.records_in_order() {
            assert_eq!(index.lookup(record.location), Some(id));
        }
    }

    #[test]
    fn test_missing_frequency_is_fatal() {
        let module = sample();
        let err = CallGraphIndex::build(&module, &FrequencyTable::new()).unwrap_err();
        assert!(matches!(err, Error::MissingFrequency(_)));
    }

    #[test]
    fn test_insert_mirrors_both_views() {
        let mut module = sample();
        let main = module.function_by_name("main").unwrap();
        let helper = module.function_by_name("helper").unwrap();
        let extra = module.add_block(main, 1000).unwrap();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let mut index = CallGraphIndex::build(&module, &profile).unwrap();

        let loc = Location::new(main, extra, 0);
        let ids = index
            .insert_call_sites(main, vec![CallSiteRecord::new(loc, main, helper, 9u32)])
            .unwrap();

        assert_eq!(index.lookup(loc), Some(ids[0]));
        assert!(index.call_sites_of(main).contains(&ids[0]));
        assert_eq!(index.record(ids[0]).unwrap().frequency, BigUint::from(9u32));
    }

    #[test]
    fn test_insert_duplicate_location_is_fatal() {
        let module = sample();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let mut index = CallGraphIndex::build(&module, &profile).unwrap();
        let main = module.function_by_name("main").unwrap();

        let (_, existing) = index.records_in_order().next().unwrap();
        let clash = existing.clone();
        let before = index.call_site_count();

        let err = index.insert_call_sites(main, vec![clash]).unwrap_err();
        assert!(matches!(err, Error::DuplicateCallSite(_)));
        assert_eq!(index.call_site_count(), before);
    }

    #[test]
    fn test_rebuild_is_a_new_generation() {
        let module = sample();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let mut index = CallGraphIndex::build(&module, &profile).unwrap();

        let (id, _) = index.records_in_order().next().unwrap();
        index.record_mut(id).unwrap().mark_inlined();
        assert_eq!(index.stats().inlined_call_sites, 1);

        index.rebuild(&module, &profile).unwrap();
        assert_eq!(index.generation(), 1);
        assert_eq!(index.stats().inlined_call_sites, 0);
    }

    #[test]
    fn test_to_dot() {
        let module = sample();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let index = CallGraphIndex::build(&module, &profile).unwrap();

        let dot = index.to_dot(Some("sample"));
        assert!(dot.starts_with("digraph CallGraphIndex {"));
        assert!(dot.contains("label=\"sample\";"));
        assert!(dot.contains("\"f0\" -> \"f1\" [label=\"100\"];"));
        assert!(dot.contains("fillcolor=lightpink"));
        assert!(dot.ends_with("}\n"));
    }
}
