//! # profinline Prelude
//!
//! Convenient re-exports of the types most users of the inliner touch: the
//! configuration, the policy and its driver, the collaborator traits and the
//! reference IR implementing them.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all profinline operations
pub use crate::Error;

/// The result type used throughout profinline
pub use crate::Result;

// ================================================================================================
// Configuration
// ================================================================================================

/// User-facing options of the inliner
pub use crate::{InlineConfig, InlineOption};

/// Validated limits of a run
pub use crate::compiler::{Constraints, InlineFeatures};

// ================================================================================================
// Policy and Driver
// ================================================================================================

/// The inlining policy state machine and its driver
pub use crate::compiler::{
    Collaborators, InlinePolicy, InlineScheduler, PolicyState, ScheduleOutcome,
};

/// Decision log of a run
pub use crate::compiler::{Event, EventKind, EventLog, InlineStats};

// ================================================================================================
// Call Graph
// ================================================================================================

/// Frequency-annotated call graph index
pub use crate::analysis::{CallGraph, CallGraphIndex, CallSiteId, CallSiteRecord, FunctionRecord};

// ================================================================================================
// Program Interface
// ================================================================================================

/// Identifiers and call shapes
pub use crate::ir::{BlockId, CallShape, CallSite, Duplication, FunctionId, Location};

/// Collaborator traits
pub use crate::ir::{
    FrequencyOracle, InliningEngine, Profiler, Program, ProgramSizeMetric, Simplifier,
};

/// Reference IR and collaborator implementations
pub use crate::ir::{
    CloneInliner, DeadFunctionElimination, FrequencyTable, Instruction, InstructionCount, Module,
    StaticProfiler,
};
