//! Reference in-memory IR.
//!
//! [`Module`] is a deliberately small program representation: functions made
//! of blocks, blocks made of [`Instruction`]s. It carries just enough structure
//! for the inliner's collaborators to be implemented for real: call
//! instructions for the call graph, static block weights for the profiler,
//! and copyable bodies for the cloning engine.
//!
//! Block weights are static frequency estimates expressed per mille of the
//! owning function's entry frequency; the entry block always weighs
//! [`ENTRY_WEIGHT`].
//!
//! # Example
//!
//! ```rust
//! use profinline::ir::{Instruction, Module, Program};
//!
//! let mut module = Module::new();
//! let main = module.add_function("main");
//! let helper = module.add_function("helper");
//! module.set_root(main, 100)?;
//!
//! let entry = module.entry(main)?;
//! module.push(entry, Instruction::Call(helper))?;
//! module.push(entry, Instruction::Return)?;
//!
//! assert_eq!(module.call_instructions(main).len(), 2);
//! # Ok::<(), profinline::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap};

use crate::{
    ir::{BlockId, CallInstruction, CallShape, FunctionId, Location, Program},
    Error, Result,
};

/// Weight of a function's entry block, per mille.
pub const ENTRY_WEIGHT: u32 = 1000;

/// A single IR instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Any non-control-flow operation.
    Op,
    /// Direct call.
    Call(FunctionId),
    /// Closure call with a statically known target.
    CallClosure(FunctionId),
    /// Conditional or unconditional branch.
    Branch,
    /// Function return.
    Return,
    /// Non-local exit.
    Cut,
    /// Placeholder left where a call was replaced by the callee's body.
    Inlined(FunctionId),
}

impl Instruction {
    /// Returns the control-transfer shape of this instruction, or `None` for
    /// plain operations.
    #[must_use]
    pub const fn shape(&self) -> Option<CallShape> {
        match self {
            Self::Op => None,
            Self::Call(callee) => Some(CallShape::Direct(*callee)),
            Self::CallClosure(callee) => Some(CallShape::Closure(*callee)),
            Self::Branch | Self::Return | Self::Cut | Self::Inlined(_) => Some(CallShape::Other),
        }
    }

    /// Returns the called function for direct and closure calls.
    #[must_use]
    pub const fn callee(&self) -> Option<FunctionId> {
        match self {
            Self::Call(callee) | Self::CallClosure(callee) => Some(*callee),
            _ => None,
        }
    }
}

/// A basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Program-wide unique block id.
    pub id: BlockId,
    /// Static frequency estimate, per mille of the function entry frequency.
    pub weight: u32,
    /// Instructions in program order.
    pub instructions: Vec<Instruction>,
}

impl Block {
    /// Creates an empty block.
    #[must_use]
    pub fn new(id: BlockId, weight: u32) -> Self {
        Self {
            id,
            weight,
            instructions: Vec::new(),
        }
    }
}

/// A function: a named list of blocks, the first of which is the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    /// Function id.
    pub id: FunctionId,
    /// Human-readable name.
    pub name: String,
    /// Blocks; `blocks[0]` is the entry block.
    pub blocks: Vec<Block>,
}

impl Function {
    /// Returns the entry block.
    #[must_use]
    pub fn entry(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Looks up a block by id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Looks up a block by id for modification.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    /// Returns the number of instructions in the function.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.blocks.iter().map(|b| b.instructions.len() as u64).sum()
    }

    /// Returns every function called from this function, with repetitions.
    pub fn callees(&self) -> impl Iterator<Item = FunctionId> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter_map(Instruction::callee)
    }
}

/// A whole program in the reference IR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    functions: BTreeMap<FunctionId, Function>,
    /// Externally entered functions and their entry counts.
    roots: BTreeMap<FunctionId, u64>,
    block_owner: HashMap<BlockId, FunctionId>,
    next_function: u32,
    next_block: u32,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function with an empty entry block and returns its id.
    pub fn add_function(&mut self, name: impl Into<String>) -> FunctionId {
        let id = FunctionId::new(self.next_function);
        self.next_function += 1;

        let entry = self.fresh_block_id();
        self.block_owner.insert(entry, id);
        self.functions.insert(
            id,
            Function {
                id,
                name: name.into(),
                blocks: vec![Block::new(entry, ENTRY_WEIGHT)],
            },
        );
        id
    }

    /// Appends a new empty block with the given weight to `function`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ir`] if the function does not exist.
    pub fn add_block(&mut self, function: FunctionId, weight: u32) -> Result<BlockId> {
        let id = self.fresh_block_id();
        self.append_block(function, Block::new(id, weight))?;
        Ok(id)
    }

    /// Appends an instruction to `block` and returns its location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ir`] if the block does not exist.
    pub fn push(&mut self, block: BlockId, instruction: Instruction) -> Result<Location> {
        let function = self.owner(block)?;
        let target = self
            .functions
            .get_mut(&function)
            .and_then(|f| f.block_mut(block))
            .ok_or_else(|| Error::Ir(format!("block {block} vanished from {function}")))?;

        let index = u32::try_from(target.instructions.len())
            .map_err(|_| Error::Ir(format!("block {block} is too large")))?;
        target.instructions.push(instruction);
        Ok(Location::new(function, block, index))
    }

    /// Marks `function` as externally entered `count` times.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ir`] if the function does not exist.
    pub fn set_root(&mut self, function: FunctionId, count: u64) -> Result<()> {
        if !self.functions.contains_key(&function) {
            return Err(Error::Ir(format!("unknown function {function}")));
        }
        self.roots.insert(function, count);
        Ok(())
    }

    /// Returns the root functions and their entry counts.
    pub fn roots(&self) -> impl Iterator<Item = (FunctionId, u64)> + '_ {
        self.roots.iter().map(|(&f, &count)| (f, count))
    }

    /// Returns the entry block of `function`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ir`] if the function does not exist.
    pub fn entry(&self, function: FunctionId) -> Result<BlockId> {
        self.function(function)
            .and_then(Function::entry)
            .map(|b| b.id)
            .ok_or_else(|| Error::Ir(format!("unknown function {function}")))
    }

    /// Looks up a function.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(&id)
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .values()
            .find(|f| f.name == name)
            .map(|f| f.id)
    }

    /// Iterates over all functions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Returns the number of functions.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Returns the instruction at `location`.
    #[must_use]
    pub fn instruction(&self, location: Location) -> Option<&Instruction> {
        self.functions
            .get(&location.function)?
            .block(location.block)?
            .instructions
            .get(location.index as usize)
    }

    /// Returns the function owning `block`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ir`] if no function owns the block.
    pub fn owner(&self, block: BlockId) -> Result<FunctionId> {
        self.block_owner
            .get(&block)
            .copied()
            .ok_or_else(|| Error::Ir(format!("unknown block {block}")))
    }

    pub(crate) fn instruction_mut(&mut self, location: Location) -> Option<&mut Instruction> {
        self.functions
            .get_mut(&location.function)?
            .block_mut(location.block)?
            .instructions
            .get_mut(location.index as usize)
    }

    pub(crate) fn blocks_mut(&mut self, function: FunctionId) -> Option<&mut Vec<Block>> {
        self.functions.get_mut(&function).map(|f| &mut f.blocks)
    }

    pub(crate) fn fresh_block_id(&mut self) -> BlockId {
        let id = BlockId::new(self.next_block);
        self.next_block += 1;
        id
    }

    pub(crate) fn append_block(&mut self, function: FunctionId, block: Block) -> Result<()> {
        let target = self
            .functions
            .get_mut(&function)
            .ok_or_else(|| Error::Ir(format!("unknown function {function}")))?;
        self.block_owner.insert(block.id, function);
        target.blocks.push(block);
        Ok(())
    }

    pub(crate) fn remove_function(&mut self, function: FunctionId) -> Option<Function> {
        let removed = self.functions.remove(&function)?;
        for block in &removed.blocks {
            self.block_owner.remove(&block.id);
        }
        self.roots.remove(&function);
        Some(removed)
    }
}

impl Program for Module {
    fn functions(&self) -> Vec<FunctionId> {
        self.functions.keys().copied().collect()
    }

    fn entry_block(&self, function: FunctionId) -> Option<BlockId> {
        self.function(function).and_then(Function::entry).map(|b| b.id)
    }

    fn call_instructions(&self, function: FunctionId) -> Vec<CallInstruction> {
        let Some(func) = self.function(function) else {
            return Vec::new();
        };

        let mut calls = Vec::new();
        for block in &func.blocks {
            for (index, instr) in (0u32..).zip(&block.instructions) {
                if let Some(shape) = instr.shape() {
                    calls.push(CallInstruction {
                        location: Location::new(function, block.id, index),
                        shape,
                    });
                }
            }
        }
        calls
    }

    fn instruction_shape(&self, location: Location) -> Option<CallShape> {
        self.instruction(location)
            .map(|instr| instr.shape().unwrap_or(CallShape::Other))
    }

    fn function_size(&self, function: FunctionId) -> Option<u64> {
        self.function(function).map(Function::size)
    }
}
