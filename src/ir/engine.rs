//! Rewriting collaborators of the reference IR.
//!
//! - [`CloneInliner`] physically inlines a call site by cloning the callee's
//!   blocks into the caller
//! - [`DeadFunctionElimination`] is the whole-program simplifier
//! - [`InstructionCount`] is the instruction-count size metric, usable with
//!   any [`Program`]

use std::collections::{BTreeSet, VecDeque};

use crate::{
    ir::{
        module::{Block, ENTRY_WEIGHT},
        CallSite, Duplication, FunctionId, Instruction, InliningEngine, Location, Module,
        Program, ProgramSizeMetric, Simplifier,
    },
    Error, Result,
};

/// Inlines call sites by cloning callee blocks into the caller.
///
/// The call instruction is replaced by an [`Instruction::Inlined`] marker and
/// every block of the callee is appended to the caller under a fresh block id.
/// Cloned block weights are scaled by the weight of the block holding the
/// call, so the static profiler keeps seeing sensible frequencies.
///
/// # Example
///
/// ```rust
/// use profinline::ir::{CallSite, CloneInliner, InliningEngine, Instruction, Module};
///
/// let mut module = Module::new();
/// let main = module.add_function("main");
/// let helper = module.add_function("helper");
/// let leaf = module.add_function("leaf");
/// let call = module.push(module.entry(main)?, Instruction::Call(helper))?;
/// module.push(module.entry(helper)?, Instruction::Call(leaf))?;
///
/// let site = CallSite { location: call, caller: main, callee: helper };
/// let copies = CloneInliner::new().inline(&mut module, &site)?;
/// assert_eq!(copies.len(), 1);
/// assert_eq!(module.instruction(copies[0].location), Some(&Instruction::Call(leaf)));
/// # Ok::<(), profinline::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CloneInliner {
    inlined: usize,
}

impl CloneInliner {
    /// Creates a new cloning inliner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many call sites this engine has inlined.
    #[must_use]
    pub fn inlined(&self) -> usize {
        self.inlined
    }
}

impl InliningEngine<Module> for CloneInliner {
    fn inline(&mut self, module: &mut Module, site: &CallSite) -> Result<Vec<Duplication>> {
        if site.location.function != site.caller {
            return Err(Error::Ir(format!("call site {site} is not inside its caller")));
        }
        match module.instruction(site.location) {
            Some(instr) if instr.callee() == Some(site.callee) => {}
            Some(other) => {
                return Err(Error::Ir(format!(
                    "instruction {other:?} at {} does not call {}",
                    site.location, site.callee
                )))
            }
            None => return Err(Error::Ir(format!("no instruction at {}", site.location))),
        }

        let call_weight = module
            .function(site.caller)
            .and_then(|f| f.block(site.location.block))
            .map_or(ENTRY_WEIGHT, |b| b.weight);

        // Snapshot first: the callee may be the caller itself.
        let body = module
            .function(site.callee)
            .map(|f| f.blocks.clone())
            .ok_or_else(|| Error::Ir(format!("unknown callee {}", site.callee)))?;

        let mut duplications = Vec::new();
        for original in body {
            let id = module.fresh_block_id();
            let scaled = u64::from(call_weight) * u64::from(original.weight) / u64::from(ENTRY_WEIGHT);
            let weight = u32::try_from(scaled).unwrap_or(u32::MAX);

            for (index, instr) in (0u32..).zip(&original.instructions) {
                if instr.callee().is_some() {
                    duplications.push(Duplication {
                        original: Location::new(site.callee, original.id, index),
                        block: id,
                        location: Location::new(site.caller, id, index),
                    });
                }
            }

            module.append_block(
                site.caller,
                Block {
                    id,
                    weight,
                    instructions: original.instructions,
                },
            )?;
        }

        if let Some(slot) = module.instruction_mut(site.location) {
            *slot = Instruction::Inlined(site.callee);
        }

        self.inlined += 1;
        log::debug!("inlined {site}, {} call sites copied", duplications.len());
        Ok(duplications)
    }
}

/// Whole-program simplifier: removes functions unreachable from the module's
/// roots and strips [`Instruction::Inlined`] markers.
///
/// A module without roots has no notion of reachability; only the markers
/// are removed.
#[derive(Debug, Default)]
pub struct DeadFunctionElimination {
    removed: Vec<FunctionId>,
}

impl DeadFunctionElimination {
    /// Creates a new simplifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every function removed so far, in removal order.
    #[must_use]
    pub fn removed(&self) -> &[FunctionId] {
        &self.removed
    }

    fn reachable(module: &Module) -> BTreeSet<FunctionId> {
        let mut seen: BTreeSet<FunctionId> = module.roots().map(|(f, _)| f).collect();
        let mut queue: VecDeque<FunctionId> = seen.iter().copied().collect();

        while let Some(function) = queue.pop_front() {
            let Some(func) = module.function(function) else {
                continue;
            };
            for callee in func.callees() {
                if seen.insert(callee) {
                    queue.push_back(callee);
                }
            }
        }
        seen
    }
}

impl Simplifier<Module> for DeadFunctionElimination {
    fn run(&mut self, module: &mut Module) -> Result<()> {
        let before = module.function_count();

        if module.roots().next().is_some() {
            let live = Self::reachable(module);
            let dead: Vec<FunctionId> = module
                .iter()
                .map(|f| f.id)
                .filter(|f| !live.contains(f))
                .collect();
            for function in dead {
                if module.remove_function(function).is_some() {
                    self.removed.push(function);
                }
            }
        }

        let mut markers = 0usize;
        for function in module.functions() {
            let Some(blocks) = module.blocks_mut(function) else {
                continue;
            };
            for block in blocks {
                let len = block.instructions.len();
                block
                    .instructions
                    .retain(|i| !matches!(i, Instruction::Inlined(_)));
                markers += len - block.instructions.len();
            }
        }

        log::debug!(
            "dead function elimination: {} functions removed, {markers} markers dropped",
            before - module.function_count()
        );
        Ok(())
    }
}

/// Counts IR instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionCount;

impl<P: Program + ?Sized> ProgramSizeMetric<P> for InstructionCount {
    fn total_instructions(&self, program: &P) -> u64 {
        program
            .functions()
            .into_iter()
            .filter_map(|f| program.function_size(f))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{
        CallSite, CloneInliner, DeadFunctionElimination, InliningEngine, Instruction,
        InstructionCount, Location, Module, Program, ProgramSizeMetric, Simplifier,
    };

    #[test]
    fn test_clone_inliner_copies_blocks() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let helper = module.add_function("helper");
        let leaf = module.add_function("leaf");

        let hot = module.add_block(main, 2000).unwrap();
        let call = module.push(hot, Instruction::Call(helper)).unwrap();
        let helper_entry = module.entry(helper).unwrap();
        module.push(helper_entry, Instruction::Op).unwrap();
        let inner = module.push(helper_entry, Instruction::Call(leaf)).unwrap();
        let cold = module.add_block(helper, 100).unwrap();
        module.push(cold, Instruction::CallClosure(leaf)).unwrap();

        let site = CallSite {
            location: call,
            caller: main,
            callee: helper,
        };
        let mut engine = CloneInliner::new();
        let copies = engine.inline(&mut module, &site).unwrap();

        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].original, inner);
        assert_eq!(copies[0].location.function, main);
        assert_eq!(module.instruction(call), Some(&Instruction::Inlined(helper)));
        assert_eq!(module.function_size(main), Some(4));
        assert_eq!(engine.inlined(), 1);

        let main_fn = module.function(main).unwrap();
        assert_eq!(main_fn.block(copies[0].block).unwrap().weight, 2000);
        assert_eq!(main_fn.block(copies[1].block).unwrap().weight, 200);
    }

    #[test]
    fn test_clone_inliner_self_call() {
        let mut module = Module::new();
        let rec = module.add_function("rec");
        let entry = module.entry(rec).unwrap();
        let call = module.push(entry, Instruction::Call(rec)).unwrap();

        let site = CallSite {
            location: call,
            caller: rec,
            callee: rec,
        };
        let copies = CloneInliner::new().inline(&mut module, &site).unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].original, call);
        assert_eq!(module.instruction(copies[0].location), Some(&Instruction::Call(rec)));
    }

    #[test]
    fn test_clone_inliner_rejects_non_call() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let entry = module.entry(main).unwrap();
        let op = module.push(entry, Instruction::Op).unwrap();

        let site = CallSite {
            location: op,
            caller: main,
            callee: main,
        };
        assert!(CloneInliner::new().inline(&mut module, &site).is_err());

        let missing = CallSite {
            location: Location::new(main, entry, 9),
            caller: main,
            callee: main,
        };
        assert!(CloneInliner::new().inline(&mut module, &missing).is_err());
    }

    #[test]
    fn test_dead_function_elimination() {
        let mut module = Module::new();
        let main = module.add_function("main");
        let used = module.add_function("used");
        let unused = module.add_function("unused");
        module.set_root(main, 1).unwrap();
        let entry = module.entry(main).unwrap();
        module.push(entry, Instruction::Call(used)).unwrap();
        module.push(entry, Instruction::Inlined(unused)).unwrap();
        module.push(module.entry(unused).unwrap(), Instruction::Op).unwrap();

        let mut dfe = DeadFunctionElimination::new();
        dfe.run(&mut module).unwrap();

        assert_eq!(dfe.removed(), &[unused]);
        assert!(module.function(used).is_some());
        assert_eq!(module.function_size(main), Some(1));
    }

    #[test]
    fn test_dead_function_elimination_without_roots_keeps_functions() {
        let mut module = Module::new();
        module.add_function("a");
        module.add_function("b");

        let mut dfe = DeadFunctionElimination::new();
        dfe.run(&mut module).unwrap();
        assert_eq!(module.function_count(), 2);
        assert!(dfe.removed().is_empty());
    }

    #[test]
    fn test_instruction_count() {
        let mut module = Module::new();
        let a = module.add_function("a");
        let b = module.add_function("b");
        module.push(module.entry(a).unwrap(), Instruction::Op).unwrap();
        module.push(module.entry(b).unwrap(), Instruction::Op).unwrap();
        module.push(module.entry(b).unwrap(), Instruction::Return).unwrap();

        assert_eq!(InstructionCount.total_instructions(&module), 3);
    }
}
