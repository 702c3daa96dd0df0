//! The profile-guided inlining decision core.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Profile-Guided Inliner                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Constraints                 Budget, frequency and recursion     │
//! │    └─ effective_budget()     limits, validated up front          │
//! │                                                                  │
//! │  PolicyState                 One run of the state machine        │
//! │    ├─ CallGraphIndex         Frequency-annotated call sites      │
//! │    ├─ Selector               Greatest eligible frequency wins    │
//! │    ├─ FrequencyRedistributor Split callee frequencies per inline │
//! │    └─ EventLog               Decisions and derived statistics    │
//! │                                                                  │
//! │  InlineScheduler             Drives a policy against an engine   │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use profinline::compiler::{Collaborators, InlineScheduler, PolicyState};
//! use profinline::ir::{
//!     CloneInliner, DeadFunctionElimination, Instruction, InstructionCount, Module, Profiler,
//!     StaticProfiler,
//! };
//! use profinline::InlineConfig;
//!
//! let mut module = Module::new();
//! let main = module.add_function("main");
//! let square = module.add_function("square");
//! module.set_root(main, 1_000)?;
//! let entry = module.entry(main)?;
//! for _ in 0..30 {
//!     module.push(entry, Instruction::Op)?;
//! }
//! module.push(entry, Instruction::Call(square))?;
//! module.push(module.entry(square)?, Instruction::Op)?;
//!
//! let profile = StaticProfiler::default().profile(&module)?;
//! let constraints = InlineConfig::default().constraints()?;
//! let mut state = PolicyState::analyze(constraints, &module, &profile, &InstructionCount)?;
//!
//! let mut profiler = StaticProfiler::default();
//! let mut simplifier = DeadFunctionElimination::new();
//! let mut collaborators: Collaborators<'_, Module> = Collaborators {
//!     profiler: &mut profiler,
//!     simplifier: &mut simplifier,
//!     size_metric: &InstructionCount,
//! };
//! let outcome = InlineScheduler::default().run(
//!     &mut module,
//!     &mut state,
//!     &mut CloneInliner::new(),
//!     &mut collaborators,
//! )?;
//!
//! assert!(outcome.completed);
//! assert_eq!(state.stats().call_sites_inlined, 1);
//! # Ok::<(), profinline::Error>(())
//! ```

mod constraints;
mod events;
mod redistribute;
mod scheduler;
mod selector;
mod state;

pub use constraints::{Constraints, InlineFeatures};
pub use events::{Event, EventBuilder, EventKind, EventLog, InlineStats};
pub use redistribute::{FrequencyRedistributor, RedistributionSummary};
pub use scheduler::{InlineScheduler, ScheduleOutcome};
pub use selector::{Rejection, Selector};
pub use state::{Collaborators, InlinePolicy, PolicyState};
