//! Driver loop connecting an inlining policy to an inlining engine.
//!
//! The `InlineScheduler` repeatedly asks the policy for work, hands every
//! returned call site to the engine and feeds the engine's duplication report
//! back, until the policy returns an empty list or the iteration cap is hit.

use crate::{
    compiler::{Collaborators, InlinePolicy},
    ir::InliningEngine,
    Result,
};

/// Result of a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleOutcome {
    /// Number of `policy` calls made.
    pub iterations: usize,
    /// Number of call sites the engine inlined.
    pub inlined: usize,
    /// `true` if the policy ended the run, `false` if the cap stopped it.
    pub completed: bool,
}

/// Runs an [`InlinePolicy`] against an [`InliningEngine`].
#[derive(Debug, Clone)]
pub struct InlineScheduler {
    /// Maximum number of policy iterations.
    max_iterations: usize,
}

impl Default for InlineScheduler {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl InlineScheduler {
    /// Creates a new scheduler.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum number of policy iterations before stopping.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }

    /// Returns the iteration cap.
    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Drives `policy` until it returns no more work.
    ///
    /// # Arguments
    ///
    /// * `program` - The program being optimized, mutated in place.
    /// * `policy` - The decision maker.
    /// * `engine` - Performs each physical inline.
    /// * `collaborators` - Profiler, simplifier and size metric for the policy.
    ///
    /// # Errors
    ///
    /// Propagates the first error of the policy or the engine; the run stops
    /// there.
    pub fn run<P, E>(
        &self,
        program: &mut P,
        policy: &mut dyn InlinePolicy<P>,
        engine: &mut E,
        collaborators: &mut Collaborators<'_, P>,
    ) -> Result<ScheduleOutcome>
    where
        P: ?Sized,
        E: InliningEngine<P> + ?Sized,
    {
        let mut outcome = ScheduleOutcome::default();

        while outcome.iterations < self.max_iterations {
            outcome.iterations += 1;

            let sites = policy.policy(program, collaborators)?;
            if sites.is_empty() {
                outcome.completed = true;
                break;
            }

            for site in sites {
                let duplications = engine.inline(program, &site)?;
                policy.notify_inlined(duplications)?;
                outcome.inlined += 1;
            }
        }

        if !outcome.completed {
            log::warn!(
                "{} policy stopped after {} iterations without finishing",
                policy.name(),
                outcome.iterations
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compiler::{Collaborators, InlineScheduler, PolicyState},
        ir::{
            CloneInliner, DeadFunctionElimination, Instruction, InstructionCount, Module,
            Profiler, StaticProfiler,
        },
        InlineConfig,
    };

    fn fan_out() -> Module {
        let mut module = Module::new();
        let main = module.add_function("main");
        module.set_root(main, 50).unwrap();
        let entry = module.entry(main).unwrap();
        for _ in 0..40 {
            module.push(entry, Instruction::Op).unwrap();
        }
        for i in 0..4 {
            let f = module.add_function(format!("f{i}"));
            module.push(entry, Instruction::Call(f)).unwrap();
            module.push(module.entry(f).unwrap(), Instruction::Op).unwrap();
        }
        module
    }

    #[test]
    fn test_run_to_completion() {
        let mut module = fan_out();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let constraints = InlineConfig::default().constraints().unwrap();
        let mut state =
            PolicyState::analyze(constraints, &module, &profile, &InstructionCount).unwrap();

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };
        let mut engine = CloneInliner::new();

        let outcome = InlineScheduler::default()
            .run(&mut module, &mut state, &mut engine, &mut collab)
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.inlined, 4);
        assert_eq!(engine.inlined(), 4);
        assert_eq!(state.stats().call_sites_inlined, 4);
    }

    #[test]
    fn test_iteration_cap() {
        let mut module = fan_out();
        let profile = StaticProfiler::default().profile(&module).unwrap();
        let constraints = InlineConfig::default().constraints().unwrap();
        let mut state =
            PolicyState::analyze(constraints, &module, &profile, &InstructionCount).unwrap();

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };

        let outcome = InlineScheduler::new(2)
            .run(&mut module, &mut state, &mut CloneInliner::new(), &mut collab)
            .unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.inlined, 2);
    }
}
