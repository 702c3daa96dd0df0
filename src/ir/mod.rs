//! IR-facing types and the collaborator interfaces the inliner consumes.
//!
//! The inlining decision core never owns or mutates the program representation
//! itself. Everything it needs from the surrounding compiler is expressed
//! through a handful of traits:
//!
//! - [`Program`] - read access to functions, blocks and call instructions
//! - [`FrequencyOracle`] - absolute execution frequency per block
//! - [`Profiler`] - recomputes a [`FrequencyTable`] for a (possibly rewritten) program
//! - [`Simplifier`] - whole-program optimizer used as a fallback
//! - [`InliningEngine`] - physically duplicates a callee into a caller
//! - [`ProgramSizeMetric`] - instruction-count cost model
//!
//! A small reference IR implementing all of them lives in [`module`],
//! [`profile`] and [`engine`]; it backs the integration tests and benchmarks
//! and doubles as a worked example for embedders.
//!
//! # Identifiers
//!
//! [`FunctionId`], [`BlockId`] and [`Location`] are opaque handles issued by the
//! IR. A [`Location`] orders by function, then block, then instruction index;
//! that order is the deterministic iteration order of the call graph index.

use std::fmt;

use num_bigint::BigUint;

use crate::Result;

pub mod engine;
pub mod module;
pub mod profile;

pub use engine::{CloneInliner, DeadFunctionElimination, InstructionCount};
pub use module::{Block, Function, Instruction, Module};
pub use profile::{FrequencyTable, StaticProfiler};

/// Identifier of a function in the program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u32);

impl FunctionId {
    /// Creates a function identifier from its raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        FunctionId(index)
    }

    /// Returns the raw index of this identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({})", self.0)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Identifier of a basic block. Block ids are unique across the whole program.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a block identifier from its raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: u32) -> Self {
        BlockId(index)
    }

    /// Returns the raw index of this identifier.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Position of a single instruction inside the program.
///
/// The inliner treats locations as opaque keys; it only relies on them being
/// unique, hashable and totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    /// Function containing the instruction.
    pub function: FunctionId,
    /// Block containing the instruction.
    pub block: BlockId,
    /// Index of the instruction within its block.
    pub index: u32,
}

impl Location {
    /// Creates a new location.
    #[must_use]
    pub const fn new(function: FunctionId, block: BlockId, index: u32) -> Self {
        Self {
            function,
            block,
            index,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.function, self.block, self.index)
    }
}

/// Shape of a control-transfer instruction, as far as inlining is concerned.
///
/// Only direct and closure calls are structurally inlineable. Branches,
/// returns, cuts and everything else collapse into [`CallShape::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// Direct call to a statically known function.
    Direct(FunctionId),
    /// Call through a closure whose code pointer is statically known.
    Closure(FunctionId),
    /// Any other instruction; never inlineable.
    Other,
}

impl CallShape {
    /// Returns the inlineable callee, if this shape is a call.
    #[must_use]
    pub const fn inlineable_callee(&self) -> Option<FunctionId> {
        match self {
            Self::Direct(callee) | Self::Closure(callee) => Some(*callee),
            Self::Other => None,
        }
    }

    /// Returns `true` for direct and closure calls.
    #[must_use]
    pub const fn is_inlineable(&self) -> bool {
        self.inlineable_callee().is_some()
    }
}

/// A control-transfer instruction reported by [`Program::call_instructions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInstruction {
    /// Where the instruction lives.
    pub location: Location,
    /// What kind of transfer it is.
    pub shape: CallShape,
}

/// A unit of work handed to the inlining engine: inline `callee` at `location`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallSite {
    /// Location of the call instruction inside `caller`.
    pub location: Location,
    /// Function containing the call.
    pub caller: FunctionId,
    /// Function being called.
    pub callee: FunctionId,
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} @ {}", self.caller, self.callee, self.location)
    }
}

/// One call site copied by the inlining engine.
///
/// `original` is the call's location inside the inlined callee; `block` and
/// `location` name its fresh copy inside the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duplication {
    /// Location of the call inside the callee body that was copied.
    pub original: Location,
    /// The freshly created block holding the copy.
    pub block: BlockId,
    /// Location of the copied call instruction.
    pub location: Location,
}

/// Read access to a program snapshot.
pub trait Program {
    /// Returns every function of the program in a deterministic order.
    fn functions(&self) -> Vec<FunctionId>;

    /// Returns the entry block of `function`.
    fn entry_block(&self, function: FunctionId) -> Option<BlockId>;

    /// Returns the control-transfer instructions of `function`, in program order.
    fn call_instructions(&self, function: FunctionId) -> Vec<CallInstruction>;

    /// Returns the shape of the instruction at `location`, or `None` if the
    /// location does not exist.
    fn instruction_shape(&self, location: Location) -> Option<CallShape>;

    /// Returns the number of IR instructions in `function`.
    fn function_size(&self, function: FunctionId) -> Option<u64>;
}

/// Absolute execution frequency per block.
pub trait FrequencyOracle {
    /// Returns the estimated execution count of `block`.
    fn block_frequency(&self, block: BlockId) -> Option<BigUint>;
}

/// Computes block frequencies for a program.
pub trait Profiler<P: ?Sized> {
    /// Profiles `program`, returning one frequency per reachable block.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be profiled.
    fn profile(&mut self, program: &P) -> Result<FrequencyTable>;
}

/// Whole-program simplifier invoked when selection runs dry.
///
/// Running it invalidates every previously issued [`Location`].
pub trait Simplifier<P: ?Sized> {
    /// Optimizes `program` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the simplifier fails.
    fn run(&mut self, program: &mut P) -> Result<()>;
}

/// Physically inlines a call site.
pub trait InliningEngine<P: ?Sized> {
    /// Copies the callee body into the caller at `site` and reports, for each
    /// copied call instruction, its original and new location.
    ///
    /// # Errors
    ///
    /// Returns an error if `site` does not name an inlineable call.
    fn inline(&mut self, program: &mut P, site: &CallSite) -> Result<Vec<Duplication>>;
}

/// Instruction-count cost model.
pub trait ProgramSizeMetric<P: ?Sized> {
    /// Returns the total number of IR instructions in `program`.
    fn total_instructions(&self, program: &P) -> u64;
}
