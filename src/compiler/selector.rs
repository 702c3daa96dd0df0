//! Best-call-site selection.

use std::{collections::HashMap, fmt};

use num_bigint::BigUint;

use crate::{
    analysis::{CallGraphIndex, CallSiteId, CallSiteRecord},
    compiler::Constraints,
    ir::FunctionId,
};

/// Why a call site is not eligible for inlining.
///
/// Variants are listed in the order the checks run; a record is reported
/// with the first check it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The callee has no record in the call graph index.
    CalleeMissing,
    /// The call site has already been inlined.
    AlreadyInlined,
    /// The call site runs less often than the minimum frequency.
    BelowMinimumFrequency,
    /// The callee is larger than the remaining budget.
    OverBudget,
    /// The recursive callee has been inlined as often as allowed.
    RecursionLimit,
    /// Recursive callees are never inlined in this run.
    RecursiveInliningDisabled,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CalleeMissing => "callee not indexed",
            Self::AlreadyInlined => "already inlined",
            Self::BelowMinimumFrequency => "below minimum frequency",
            Self::OverBudget => "callee exceeds remaining budget",
            Self::RecursionLimit => "recursive call limit reached",
            Self::RecursiveInliningDisabled => "recursive inlining disabled",
        })
    }
}

/// Picks the eligible call site with the greatest frequency.
///
/// A selector is a read-only view over the policy state of one iteration.
pub struct Selector<'a> {
    index: &'a CallGraphIndex,
    constraints: &'a Constraints,
    budget: i64,
    recursive_inline_count: &'a HashMap<FunctionId, u64>,
}

impl<'a> Selector<'a> {
    /// Creates a selector over `index` with `budget` instructions left.
    #[must_use]
    pub fn new(
        index: &'a CallGraphIndex,
        constraints: &'a Constraints,
        budget: i64,
        recursive_inline_count: &'a HashMap<FunctionId, u64>,
    ) -> Self {
        Self {
            index,
            constraints,
            budget,
            recursive_inline_count,
        }
    }

    /// Runs the eligibility checks on `record`, returning the first failure.
    #[must_use]
    pub fn check(&self, record: &CallSiteRecord) -> Option<Rejection> {
        let Some(callee) = self.index.function(record.callee) else {
            return Some(Rejection::CalleeMissing);
        };
        if record.is_inlined() {
            return Some(Rejection::AlreadyInlined);
        }
        if record.frequency < *self.constraints.minimum_frequency() {
            return Some(Rejection::BelowMinimumFrequency);
        }
        if !u64::try_from(self.budget).is_ok_and(|budget| callee.size <= budget) {
            return Some(Rejection::OverBudget);
        }
        if callee.recursive {
            let count = self
                .recursive_inline_count
                .get(&record.callee)
                .copied()
                .unwrap_or(0);
            if count >= self.constraints.recursive_call_limit() {
                return Some(Rejection::RecursionLimit);
            }
            if self.constraints.no_recursive_inlining() {
                return Some(Rejection::RecursiveInliningDisabled);
            }
        }
        None
    }

    /// Returns the eligible call site with strictly the greatest frequency.
    ///
    /// Call sites are visited in location order; on a tie the first one
    /// visited wins.
    #[must_use]
    pub fn select_best(&self) -> Option<CallSiteId> {
        let mut best: Option<(CallSiteId, &BigUint)> = None;

        for (id, record) in self.index.records_in_order() {
            if let Some(rejection) = self.check(record) {
                log::trace!("{} rejected: {rejection}", record.location);
                continue;
            }
            let better = match best {
                None => true,
                Some((_, frequency)) => record.frequency > *frequency,
            };
            if better {
                best = Some((id, &record.frequency));
            }
        }

        best.map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        analysis::{CallGraphIndex, CallSiteRecord, FunctionRecord},
        compiler::{Constraints, InlineFeatures, Rejection, Selector},
        ir::{BlockId, FunctionId, Location},
    };

    fn index_with(callee_size: u64, recursive: bool, frequencies: &[u32]) -> CallGraphIndex {
        let caller = FunctionId::new(0);
        let callee = FunctionId::new(1);

        let mut index = CallGraphIndex::new();
        index
            .insert_function(FunctionRecord::new(caller, 1000u32, 50, false))
            .unwrap();
        index
            .insert_function(FunctionRecord::new(callee, 1000u32, callee_size, recursive))
            .unwrap();

        let records = (0u32..)
            .zip(frequencies)
            .map(|(i, &f)| {
                let location = Location::new(caller, BlockId::new(0), i);
                CallSiteRecord::new(location, caller, callee, f)
            })
            .collect();
        index.insert_call_sites(caller, records).unwrap();
        index
    }

    #[test]
    fn test_selects_greatest_frequency_first_on_tie() {
        let index = index_with(5, false, &[20, 90, 90, 40]);
        let constraints = Constraints::default();
        let counts = HashMap::new();

        let selector = Selector::new(&index, &constraints, 100, &counts);
        let best = selector.select_best().unwrap();
        assert_eq!(index.record(best).unwrap().location.index, 1);
    }

    #[test]
    fn test_check_order() {
        let mut index = index_with(5, true, &[5, 50]);
        let constraints = Constraints::default();
        let mut counts = HashMap::new();

        let ids: Vec<_> = index.records_in_order().map(|(id, _)| id).collect();
        index.record_mut(ids[1]).unwrap().mark_inlined();

        let selector = Selector::new(&index, &constraints, 100, &counts);
        let low = index.record(ids[0]).unwrap();
        let done = index.record(ids[1]).unwrap();
        assert_eq!(selector.check(low), Some(Rejection::BelowMinimumFrequency));
        assert_eq!(selector.check(done), Some(Rejection::AlreadyInlined));

        let fresh = CallSiteRecord::new(low.location, low.caller, low.callee, 50u32);
        let tight = Selector::new(&index, &constraints, 4, &counts);
        assert_eq!(tight.check(&fresh), Some(Rejection::OverBudget));
        let negative = Selector::new(&index, &constraints, -1, &counts);
        assert_eq!(negative.check(&fresh), Some(Rejection::OverBudget));

        counts.insert(FunctionId::new(1), 3);
        let limited = Selector::new(&index, &constraints, 100, &counts);
        assert_eq!(limited.check(&fresh), Some(Rejection::RecursionLimit));

        let no_rec = Constraints::new(0.2, None, 10, 3, InlineFeatures::NO_RECURSIVE_INLINING);
        let empty = HashMap::new();
        let disabled = Selector::new(&index, &no_rec, 100, &empty);
        assert_eq!(disabled.check(&fresh), Some(Rejection::RecursiveInliningDisabled));

        let stranger = CallSiteRecord::new(low.location, low.caller, FunctionId::new(9), 50u32);
        assert_eq!(disabled.check(&stranger), Some(Rejection::CalleeMissing));
    }

    #[test]
    fn test_exact_budget_fits() {
        let index = index_with(10, false, &[100]);
        let constraints = Constraints::default();
        let counts = HashMap::new();

        assert!(Selector::new(&index, &constraints, 10, &counts).select_best().is_some());
        assert!(Selector::new(&index, &constraints, 9, &counts).select_best().is_none());
    }
}
