//! Frequency re-estimation after an inline.
//!
//! Inlining call site `cs` (caller C, callee F) moves `cs.frequency` worth of
//! executions out of F and into the copy of F's body now living in C. Every
//! call site inside F is split the same way: its copy in C receives the moved
//! share and the original keeps the rest.
//!
//! All scaling is done on exact rationals and rounded half-to-even, so the
//! result does not depend on floating-point precision.

use std::{cmp::Ordering, collections::HashMap};

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::{
    analysis::{CallGraphIndex, CallSiteId, CallSiteRecord},
    ir::{Duplication, FunctionId, Location, Program},
    Error, Result,
};

/// Computes `round(value * numerator / denominator)`, ties to even.
///
/// `denominator` must not be zero.
pub(crate) fn scale_round_half_even(
    value: &BigUint,
    numerator: &BigUint,
    denominator: &BigUint,
) -> BigUint {
    let product = value * numerator;
    let quotient = &product / denominator;
    let remainder = &product % denominator;

    let twice: BigUint = remainder << 1u32;
    match twice.cmp(denominator) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1u32,
        Ordering::Equal if (&quotient % 2u32).is_one() => quotient + 1u32,
        Ordering::Equal => quotient,
    }
}

/// Outcome of one redistribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedistributionSummary {
    /// The function whose body was inlined.
    pub callee: FunctionId,
    /// Entry frequency of the callee before the inline.
    pub old_frequency: BigUint,
    /// Entry frequency of the callee after the inline.
    pub new_frequency: BigUint,
    /// Call sites created for the copies in the caller.
    pub duplicated: Vec<CallSiteId>,
    /// `true` if the inlined call ran more often than its callee was entered.
    ///
    /// The callee then drops to zero, or to one if it still has live callers.
    pub saturated: bool,
}

/// Splits the frequencies of an inlined callee between its original body and
/// the copy in the caller.
pub struct FrequencyRedistributor<'a, P: ?Sized> {
    program: &'a P,
}

impl<'a, P: Program + ?Sized> FrequencyRedistributor<'a, P> {
    /// Creates a redistributor validating duplicated locations against `program`.
    #[must_use]
    pub fn new(program: &'a P) -> Self {
        Self { program }
    }

    /// Applies the inline of `inlined` to `index`.
    ///
    /// `duplications` is the engine's report of where each call site of the
    /// callee was copied; entries for call sites the index does not track are
    /// ignored. Nothing is modified unless the whole redistribution succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::ZeroFrequency`] if the callee had zero entry frequency
    /// - [`Error::MissingDuplicate`] if a live call site of the callee has no
    ///   reported copy
    /// - [`Error::UnexpectedShape`] if a reported copy is not a call to the
    ///   same callee
    /// - [`Error::MissingFunction`] or an invariant error if the index lost
    ///   track of the records involved
    /// - [`Error::DuplicateCallSite`] if a copy lands on a tracked location
    pub fn redistribute(
        &self,
        index: &mut CallGraphIndex,
        inlined: CallSiteId,
        duplications: &[Duplication],
    ) -> Result<RedistributionSummary> {
        let (caller, callee, call_frequency) = {
            let record = index
                .record(inlined)
                .ok_or_else(|| invariant_error!("inlined call site {} is not indexed", inlined))?;
            (record.caller, record.callee, record.frequency.clone())
        };

        let old = index
            .function(callee)
            .ok_or(Error::MissingFunction(callee))?
            .frequency
            .clone();
        if old.is_zero() {
            return Err(Error::ZeroFrequency(callee));
        }

        let copies: HashMap<Location, Location> = duplications
            .iter()
            .map(|d| (d.original, d.location))
            .collect();

        // Validate against the callee's call sites as they were before any insertion.
        let mut planned = Vec::new();
        for id in index.call_sites_of(callee) {
            let record = index
                .record(id)
                .ok_or_else(|| invariant_error!("call site {} vanished from the arena", id))?;
            if record.is_inlined() {
                continue;
            }

            let copy = *copies
                .get(&record.location)
                .ok_or(Error::MissingDuplicate(record.location))?;
            let shape = self.program.instruction_shape(copy);
            if shape.and_then(|s| s.inlineable_callee()) != Some(record.callee) {
                return Err(Error::UnexpectedShape(copy));
            }
            planned.push((id, copy, record.callee, record.frequency.clone()));
        }

        // A callee that can still be reached keeps a positive entry frequency.
        let still_called = planned.iter().any(|(_, _, target, _)| *target == callee)
            || index
                .records_in_order()
                .any(|(id, r)| id != inlined && r.callee == callee && !r.is_inlined());

        let saturated = call_frequency > old;
        let remaining = if saturated {
            BigUint::zero()
        } else {
            &old - &call_frequency
        };
        let new = if remaining.is_zero() && still_called {
            BigUint::one()
        } else {
            remaining
        };
        let moved = &old - &new;

        let mut kept = Vec::with_capacity(planned.len());
        let mut fresh = Vec::with_capacity(planned.len());
        for (id, copy, target, original) in planned {
            kept.push((id, scale_round_half_even(&original, &new, &old)));
            fresh.push(CallSiteRecord::new(
                copy,
                caller,
                target,
                scale_round_half_even(&original, &moved, &old),
            ));
        }

        let duplicated = index.insert_call_sites(caller, fresh)?;
        for (id, frequency) in kept {
            if let Some(record) = index.record_mut(id) {
                record.frequency = frequency;
            }
        }
        if let Some(function) = index.function_mut(callee) {
            function.frequency = new.clone();
        }

        Ok(RedistributionSummary {
            callee,
            old_frequency: old,
            new_frequency: new,
            duplicated,
            saturated,
        })
    }
}
