// Copyright 2025 profinline contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # profinline
//!
//! The decision core of a profile-guided function inlining pass.
//!
//! Given a program whose blocks carry execution-frequency estimates,
//! `profinline` picks call sites to inline one at a time, always the hottest
//! one that still fits a code-growth budget, and re-estimates frequencies
//! after every inline so later decisions see where execution now flows.
//! Choosing the optimal set under a budget is a knapsack problem; this is
//! the greedy heuristic.
//!
//! ## Architecture
//!
//! - [`ir`] - Identifiers, call shapes and the collaborator traits the core
//!   consumes (program access, profiler, simplifier, inlining engine, size
//!   metric), plus a small reference IR implementing all of them
//! - [`analysis`] - The function call graph and the frequency-annotated
//!   call graph index
//! - [`compiler`] - Constraints, selection, frequency redistribution, the
//!   policy state machine and the scheduler driving it
//! - [`InlineConfig`] - Option parsing and validation
//! - [`utils`] - Graph infrastructure
//!
//! ## Quick Start
//!
//! ```rust
//! use profinline::prelude::*;
//!
//! let mut module = Module::new();
//! let main = module.add_function("main");
//! let hot = module.add_function("hot");
//! let cold = module.add_function("cold");
//! module.set_root(main, 10_000)?;
//!
//! let entry = module.entry(main)?;
//! for _ in 0..50 {
//!     module.push(entry, Instruction::Op)?;
//! }
//! let rare = module.add_block(main, 1)?;
//! module.push(entry, Instruction::Call(hot))?;
//! module.push(rare, Instruction::Call(cold))?;
//! module.push(module.entry(hot)?, Instruction::Op)?;
//! module.push(module.entry(cold)?, Instruction::Op)?;
//!
//! let config = InlineConfig::from_args(["minimum-execution-frequency=100"])?;
//! let profile = StaticProfiler::default().profile(&module)?;
//! let mut state = PolicyState::analyze(config.constraints()?, &module, &profile, &InstructionCount)?;
//!
//! let mut profiler = StaticProfiler::default();
//! let mut simplifier = DeadFunctionElimination::new();
//! let mut collaborators: Collaborators<'_, Module> = Collaborators {
//!     profiler: &mut profiler,
//!     simplifier: &mut simplifier,
//!     size_metric: &InstructionCount,
//! };
//! InlineScheduler::default().run(
//!     &mut module,
//!     &mut state,
//!     &mut CloneInliner::new(),
//!     &mut collaborators,
//! )?;
//!
//! // Only the hot call was worth it.
//! assert_eq!(state.stats().call_sites_inlined, 1);
//! # Ok::<(), profinline::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Configuration problems are
//! reported before the pass starts; internal-consistency failures abort the
//! run. See [`Error`] for the full list.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade: selections at `debug`,
//! rejections at `trace`, optimizer fallbacks and the end of a run at
//! `info`, frequency saturation at `warn`. Every decision is also recorded
//! in the run's [`compiler::EventLog`].

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use profinline::prelude::*;
///
/// let constraints = InlineConfig::default().constraints()?;
/// assert_eq!(constraints.effective_budget(100), 20);
/// # Ok::<(), profinline::Error>(())
/// ```
pub mod prelude;

pub mod analysis;
pub mod compiler;
pub mod config;
pub mod ir;
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use profinline::{InlineConfig, Result};
///
/// fn budget_for(size: u64) -> Result<u64> {
///     Ok(InlineConfig::default().constraints()?.effective_budget(size))
/// }
/// assert_eq!(budget_for(1000)?, 200);
/// # Ok::<(), profinline::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `profinline` Error type
///
/// # Examples
///
/// ```rust
/// use profinline::{Error, InlineConfig};
///
/// match InlineConfig::from_args(["absolute-budget=-1"]) {
///     Err(e) if e.is_configuration() => println!("bad option: {e}"),
///     Err(e) => println!("error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;

pub use config::{InlineConfig, InlineOption};
