//! The inlining policy state machine.
//!
//! [`PolicyState`] is created once per pass by [`PolicyState::analyze`] and
//! then driven by an external engine:
//!
//! ```text
//! analyze ─► policy ─► [site] ─► engine.inline ─► notify_inlined ─┐
//!              ▲                                                  │
//!              └──────────────────────────────────────────────────┘
//!            policy ─► []   (done)
//! ```
//!
//! Each [`PolicyState::policy`] call first reconciles the previous inline
//! (frequency redistribution), then selects the next call site. When
//! selection runs dry the whole-program simplifier gets one chance to free up
//! budget before the run ends.

use std::collections::HashMap;

use crate::{
    analysis::{CallGraphIndex, CallSiteId},
    compiler::{
        Constraints, EventKind, EventLog, FrequencyRedistributor, InlineStats, Selector,
    },
    ir::{
        CallSite, Duplication, FrequencyOracle, FunctionId, Profiler, Program, ProgramSizeMetric,
        Simplifier,
    },
    Error, Result,
};

/// The external services the policy calls into while it runs.
pub struct Collaborators<'c, P: ?Sized> {
    /// Recomputes block frequencies after the simplifier ran.
    pub profiler: &'c mut dyn Profiler<P>,
    /// Whole-program optimizer used when selection runs dry.
    pub simplifier: &'c mut dyn Simplifier<P>,
    /// Instruction-count cost model.
    pub size_metric: &'c dyn ProgramSizeMetric<P>,
}

/// Interface an inlining driver uses to talk to a policy.
pub trait InlinePolicy<P: ?Sized> {
    /// Name of the policy, for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the next call sites to inline; an empty list ends the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy's bookkeeping is inconsistent or a
    /// collaborator fails.
    fn policy(
        &mut self,
        program: &mut P,
        collaborators: &mut Collaborators<'_, P>,
    ) -> Result<Vec<CallSite>>;

    /// Reports the call sites the engine copied while inlining the last
    /// returned site.
    ///
    /// # Errors
    ///
    /// Returns an error if no inline was pending.
    fn notify_inlined(&mut self, duplications: Vec<Duplication>) -> Result<()>;
}

/// State of one profile-guided inlining run.
#[derive(Debug)]
pub struct PolicyState {
    constraints: Constraints,
    call_graph: CallGraphIndex,
    recursive_inline_count: HashMap<FunctionId, u64>,
    pending_selection: Option<CallSiteId>,
    duplication_map: Vec<Duplication>,
    initial_program_size: u64,
    initial_budget: u64,
    current_budget: i64,
    /// Program size as tracked by the policy, remeasured on every fallback.
    program_size: u64,
    iteration: u64,
    finished: bool,
    events: EventLog,
}

impl PolicyState {
    /// Sets up a run: measures the program, computes the budget and builds the
    /// call graph index from `oracle`.
    ///
    /// # Arguments
    ///
    /// * `constraints` - Validated limits of the run
    /// * `program` - The program about to be optimized
    /// * `oracle` - Block frequencies of `program`
    /// * `size_metric` - Cost model used for the budget
    ///
    /// # Errors
    ///
    /// Returns an error if the call graph index cannot be built, most notably
    /// [`Error::MissingFrequency`].
    pub fn analyze<P, O>(
        constraints: Constraints,
        program: &P,
        oracle: &O,
        size_metric: &dyn ProgramSizeMetric<P>,
    ) -> Result<Self>
    where
        P: Program + ?Sized,
        O: FrequencyOracle + ?Sized,
    {
        let initial_program_size = size_metric.total_instructions(program);
        let initial_budget = constraints.effective_budget(initial_program_size);
        let call_graph = CallGraphIndex::build(program, oracle)?;

        log::info!(
            "profile-guided inlining: {} instructions, budget {initial_budget}, {} call sites",
            initial_program_size,
            call_graph.call_site_count()
        );

        Ok(Self {
            constraints,
            call_graph,
            recursive_inline_count: HashMap::new(),
            pending_selection: None,
            duplication_map: Vec::new(),
            initial_program_size,
            initial_budget,
            current_budget: i64::try_from(initial_budget).unwrap_or(i64::MAX),
            program_size: initial_program_size,
            iteration: 0,
            finished: false,
            events: EventLog::new(),
        })
    }

    /// Runs one iteration of the policy and returns at most one call site.
    ///
    /// Once an empty list has been returned the run is over and every later
    /// call returns an empty list without doing any work.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the run: redistribution failures, a broken
    /// index, or a failing collaborator.
    pub fn policy<P>(
        &mut self,
        program: &mut P,
        collaborators: &mut Collaborators<'_, P>,
    ) -> Result<Vec<CallSite>>
    where
        P: Program + ?Sized,
    {
        if self.finished {
            return Ok(Vec::new());
        }
        self.iteration += 1;

        if let Some(pending) = self.pending_selection.take() {
            let duplications = std::mem::take(&mut self.duplication_map);
            self.reconcile(&*program, pending, &duplications)?;
        }

        let mut selected = self.select();
        if selected.is_none() && !self.constraints.never_optimize() {
            self.optimize(program, collaborators)?;
            selected = self.select();
        }

        let Some(id) = selected else {
            self.finished = true;
            self.events
                .record(EventKind::SelectionExhausted)
                .message(format!(
                    "iteration {}, {} of {} budget left",
                    self.iteration, self.current_budget, self.initial_budget
                ));
            log::info!(
                "profile-guided inlining done after {} iterations: {}",
                self.iteration,
                self.stats()
            );
            return Ok(Vec::new());
        };

        self.commit(id).map(|site| vec![site])
    }

    /// Records the call sites the engine copied while inlining the pending
    /// selection. Consumed by the next [`PolicyState::policy`] call.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if no selection is pending.
    pub fn notify_inlined(&mut self, duplications: Vec<Duplication>) -> Result<()> {
        if self.pending_selection.is_none() {
            return Err(invariant_error!(
                "{} duplications reported without a pending inline",
                duplications.len()
            ));
        }
        self.duplication_map.extend(duplications);
        Ok(())
    }

    fn select(&self) -> Option<CallSiteId> {
        Selector::new(
            &self.call_graph,
            &self.constraints,
            self.current_budget,
            &self.recursive_inline_count,
        )
        .select_best()
    }

    fn reconcile<P: Program + ?Sized>(
        &mut self,
        program: &P,
        pending: CallSiteId,
        duplications: &[Duplication],
    ) -> Result<()> {
        let summary = FrequencyRedistributor::new(program).redistribute(
            &mut self.call_graph,
            pending,
            duplications,
        )?;

        if summary.saturated {
            log::warn!(
                "call into {} ran more often than {} was entered; entry frequency clamped to {}",
                summary.callee,
                summary.callee,
                summary.new_frequency
            );
            self.events
                .record(EventKind::Warning)
                .function(summary.callee)
                .message(format!(
                    "entry frequency {} saturated at {}",
                    summary.old_frequency, summary.new_frequency
                ));
        }

        self.events
            .record(EventKind::FrequencyRedistributed)
            .function(summary.callee)
            .message(format!(
                "{} -> {}, {} call sites copied",
                summary.old_frequency,
                summary.new_frequency,
                summary.duplicated.len()
            ));
        Ok(())
    }

    fn optimize<P: Program + ?Sized>(
        &mut self,
        program: &mut P,
        collaborators: &mut Collaborators<'_, P>,
    ) -> Result<()> {
        log::info!(
            "no inlineable call site at iteration {}, running optimizer",
            self.iteration
        );
        collaborators.simplifier.run(program)?;

        let measured = collaborators.size_metric.total_instructions(program);
        let delta = i128::from(measured) - i128::from(self.program_size);
        let budget = i128::from(self.current_budget) - delta;
        self.current_budget = i64::try_from(budget).unwrap_or(if budget < 0 {
            i64::MIN
        } else {
            i64::MAX
        });
        self.program_size = measured;

        self.events
            .record(EventKind::OptimizerFallback)
            .message(format!(
                "size {measured} ({delta:+}), budget now {}",
                self.current_budget
            ));

        let profile = collaborators.profiler.profile(program)?;
        self.call_graph.rebuild(&*program, &profile)?;

        self.events
            .record(EventKind::IndexRebuilt)
            .message(format!(
                "generation {}, {} call sites",
                self.call_graph.generation(),
                self.call_graph.call_site_count()
            ));
        Ok(())
    }

    fn commit(&mut self, id: CallSiteId) -> Result<CallSite> {
        let site = self
            .call_graph
            .record(id)
            .map(|r| r.to_call_site())
            .ok_or_else(|| invariant_error!("selected call site {} is not indexed", id))?;

        let (size, recursive) = self
            .call_graph
            .function(site.callee)
            .map(|f| (f.size, f.recursive))
            .ok_or(Error::MissingFunction(site.callee))?;

        if recursive {
            *self.recursive_inline_count.entry(site.callee).or_insert(0) += 1;
        }
        self.current_budget = self
            .current_budget
            .saturating_sub(i64::try_from(size).unwrap_or(i64::MAX));
        self.program_size = self.program_size.saturating_add(size);

        self.call_graph
            .function_mut(site.caller)
            .ok_or(Error::MissingFunction(site.caller))?
            .size += size;

        let frequency = self
            .call_graph
            .record_mut(id)
            .map(|record| {
                record.mark_inlined();
                record.frequency.clone()
            })
            .ok_or_else(|| invariant_error!("selected call site {} is not indexed", id))?;
        self.pending_selection = Some(id);

        log::debug!("iteration {}: inlining {site} (frequency {frequency})", self.iteration);
        self.events
            .record(EventKind::CallSiteInlined)
            .at(site.location)
            .message(format!(
                "{} -> {}, frequency {frequency}, size {size}",
                site.caller, site.callee
            ));

        Ok(site)
    }

    /// Returns the limits of this run.
    #[must_use]
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Returns the current call graph index.
    #[must_use]
    pub fn call_graph(&self) -> &CallGraphIndex {
        &self.call_graph
    }

    /// Returns how often `function` has been inlined as a recursive callee.
    #[must_use]
    pub fn recursive_inline_count(&self, function: FunctionId) -> u64 {
        self.recursive_inline_count
            .get(&function)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the call site chosen last, if its inline has not been reconciled yet.
    #[must_use]
    pub fn pending_selection(&self) -> Option<CallSiteId> {
        self.pending_selection
    }

    /// Returns the program size measured at the start of the run.
    #[must_use]
    pub fn initial_program_size(&self) -> u64 {
        self.initial_program_size
    }

    /// Returns the budget computed at the start of the run.
    #[must_use]
    pub fn initial_budget(&self) -> u64 {
        self.initial_budget
    }

    /// Returns the remaining budget. Negative once the optimizer grew the program.
    #[must_use]
    pub fn current_budget(&self) -> i64 {
        self.current_budget
    }

    /// Returns the program size as tracked by the policy.
    #[must_use]
    pub fn program_size(&self) -> u64 {
        self.program_size
    }

    /// Returns the number of `policy` calls that did work.
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Returns `true` once the run is over.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the event log of this run.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Returns statistics derived from the event log.
    #[must_use]
    pub fn stats(&self) -> InlineStats {
        self.events.stats()
    }
}

impl<P: Program + ?Sized> InlinePolicy<P> for PolicyState {
    fn name(&self) -> &'static str {
        "profile-guided"
    }

    fn policy(
        &mut self,
        program: &mut P,
        collaborators: &mut Collaborators<'_, P>,
    ) -> Result<Vec<CallSite>> {
        PolicyState::policy(self, program, collaborators)
    }

    fn notify_inlined(&mut self, duplications: Vec<Duplication>) -> Result<()> {
        PolicyState::notify_inlined(self, duplications)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compiler::{Collaborators, EventKind, InlineFeatures, PolicyState},
        ir::{
            CloneInliner, DeadFunctionElimination, InliningEngine, Instruction, InstructionCount,
            Module, Profiler, StaticProfiler,
        },
        Error, InlineConfig,
    };

    /// main (root, 100x) calls helper, helper calls leaf; 20 filler ops in main.
    fn chain() -> Module {
        let mut module = Module::new();
        let main = module.add_function("main");
        let helper = module.add_function("helper");
        let leaf = module.add_function("leaf");
        module.set_root(main, 100).unwrap();

        let entry = module.entry(main).unwrap();
        for _ in 0..20 {
            module.push(entry, Instruction::Op).unwrap();
        }
        module.push(entry, Instruction::Call(helper)).unwrap();
        let helper_entry = module.entry(helper).unwrap();
        module.push(helper_entry, Instruction::Op).unwrap();
        module.push(helper_entry, Instruction::Call(leaf)).unwrap();
        module.push(module.entry(leaf).unwrap(), Instruction::Op).unwrap();
        module
    }

    fn analyze(module: &Module, config: InlineConfig) -> PolicyState {
        let profile = StaticProfiler::default().profile(module).unwrap();
        PolicyState::analyze(config.constraints().unwrap(), module, &profile, &InstructionCount)
            .unwrap()
    }

    #[test]
    fn test_policy_emits_then_reconciles() {
        let mut module = chain();
        let mut state = analyze(&module, InlineConfig::default());
        assert_eq!(state.initial_program_size(), 24);
        assert_eq!(state.initial_budget(), 4);

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };

        let sites = state.policy(&mut module, &mut collab).unwrap();
        assert_eq!(sites.len(), 1);
        let helper = module.function_by_name("helper").unwrap();
        assert_eq!(sites[0].callee, helper);
        assert_eq!(state.current_budget(), 2);
        assert!(state.pending_selection().is_some());

        let dups = CloneInliner::new().inline(&mut module, &sites[0]).unwrap();
        state.notify_inlined(dups).unwrap();

        // The copied call to leaf inherits helper's full frequency.
        let sites = state.policy(&mut module, &mut collab).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].caller, module.function_by_name("main").unwrap());
        assert_eq!(sites[0].callee, module.function_by_name("leaf").unwrap());
        assert_eq!(state.stats().call_sites_inlined, 2);
        assert_eq!(state.stats().frequency_redistributions, 1);
    }

    #[test]
    fn test_exhausted_without_fallback_is_done() {
        let mut module = chain();
        let config = InlineConfig::default()
            .with_minimum_execution_frequency(1_000)
            .with_optimizer_fallback(false);
        let mut state = analyze(&module, config);
        assert!(state.constraints().features().contains(InlineFeatures::NEVER_OPTIMIZE));

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };

        assert!(state.policy(&mut module, &mut collab).unwrap().is_empty());
        assert!(state.is_finished());
        assert!(!state.events().has(EventKind::OptimizerFallback));
        assert!(simplifier.removed().is_empty());

        // Later calls are no-ops.
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };
        assert!(state.policy(&mut module, &mut collab).unwrap().is_empty());
        assert_eq!(state.iteration(), 1);
    }

    #[test]
    fn test_exhausted_with_fallback_rebuilds_once() {
        let mut module = chain();
        module.add_function("orphan");
        let config = InlineConfig::default().with_minimum_execution_frequency(1_000);
        let mut state = analyze(&module, config);

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };

        assert!(state.policy(&mut module, &mut collab).unwrap().is_empty());
        let stats = state.stats();
        assert_eq!(stats.optimizer_fallbacks, 1);
        assert_eq!(stats.index_rebuilds, 1);
        assert_eq!(state.call_graph().generation(), 1);
        assert_eq!(state.call_graph().function_count(), 3);
    }

    #[test]
    fn test_notify_without_pending_is_fatal() {
        let module = chain();
        let mut state = analyze(&module, InlineConfig::default());
        let err = state.notify_inlined(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Invariant { .. }));
    }

    #[test]
    fn test_missing_notification_is_fatal() {
        let mut module = chain();
        let mut state = analyze(&module, InlineConfig::default());

        let mut profiler = StaticProfiler::default();
        let mut simplifier = DeadFunctionElimination::new();
        let mut collab: Collaborators<'_, Module> = Collaborators {
            profiler: &mut profiler,
            simplifier: &mut simplifier,
            size_metric: &InstructionCount,
        };

        let sites = state.policy(&mut module, &mut collab).unwrap();
        CloneInliner::new().inline(&mut module, &sites[0]).unwrap();
        // helper's call to leaf was copied but the engine never said where.
        let err = state.policy(&mut module, &mut collab).unwrap_err();
        assert!(matches!(err, Error::MissingDuplicate(_)));
    }
}
