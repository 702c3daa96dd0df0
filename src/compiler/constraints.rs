//! Immutable inlining constraints.

use bitflags::bitflags;
use num_bigint::BigUint;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Feature toggles of the inlining pass
    pub struct InlineFeatures: u8 {
        /// Never fall back to the whole-program optimizer when selection runs dry
        const NEVER_OPTIMIZE = 0b01;
        /// Never inline calls to recursive functions
        const NO_RECURSIVE_INLINING = 0b10;
    }
}

/// Validated, immutable limits of one inlining run.
///
/// Built from an [`crate::InlineConfig`]; every value has already been checked
/// to be finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    relative_budget_fraction: f64,
    absolute_budget: Option<u64>,
    minimum_frequency: BigUint,
    recursive_call_limit: u64,
    features: InlineFeatures,
}

impl Default for Constraints {
    fn default() -> Self {
        Self::new(0.2, None, 10, 3, InlineFeatures::empty())
    }
}

impl Constraints {
    pub(crate) fn new(
        relative_budget_fraction: f64,
        absolute_budget: Option<u64>,
        minimum_frequency: u64,
        recursive_call_limit: u64,
        features: InlineFeatures,
    ) -> Self {
        Self {
            relative_budget_fraction,
            absolute_budget,
            minimum_frequency: BigUint::from(minimum_frequency),
            recursive_call_limit,
            features,
        }
    }

    /// Fraction of the initial program size the run may add.
    #[must_use]
    pub fn relative_budget_fraction(&self) -> f64 {
        self.relative_budget_fraction
    }

    /// Hard cap on added instructions, if any.
    #[must_use]
    pub fn absolute_budget(&self) -> Option<u64> {
        self.absolute_budget
    }

    /// Call sites executing fewer times than this are never inlined.
    #[must_use]
    pub fn minimum_frequency(&self) -> &BigUint {
        &self.minimum_frequency
    }

    /// How many times each recursive function may be inlined.
    #[must_use]
    pub fn recursive_call_limit(&self) -> u64 {
        self.recursive_call_limit
    }

    /// Enabled feature toggles.
    #[must_use]
    pub fn features(&self) -> InlineFeatures {
        self.features
    }

    /// Returns `true` if the optimizer fallback is disabled.
    #[must_use]
    pub fn never_optimize(&self) -> bool {
        self.features.contains(InlineFeatures::NEVER_OPTIMIZE)
    }

    /// Returns `true` if recursive callees must never be inlined.
    #[must_use]
    pub fn no_recursive_inlining(&self) -> bool {
        self.features.contains(InlineFeatures::NO_RECURSIVE_INLINING)
    }

    /// Computes the code-growth budget for a program of `initial_size`
    /// instructions.
    ///
    /// The relative budget is `floor(initial_size * fraction)`; when an
    /// absolute budget is set the smaller of the two wins.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use profinline::InlineConfig;
    ///
    /// let constraints = InlineConfig::new().with_absolute_budget(150).constraints()?;
    /// assert_eq!(constraints.effective_budget(1000), 150);
    /// assert_eq!(constraints.effective_budget(500), 100);
    /// # Ok::<(), profinline::Error>(())
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn effective_budget(&self, initial_size: u64) -> u64 {
        let relative = (initial_size as f64 * self.relative_budget_fraction).floor() as u64;
        match self.absolute_budget {
            Some(absolute) => absolute.min(relative),
            None => relative,
        }
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use crate::compiler::{Constraints, InlineFeatures};

    #[test]
    fn test_effective_budget() {
        let relative_only = Constraints::new(0.2, None, 10, 3, InlineFeatures::empty());
        assert_eq!(relative_only.effective_budget(1000), 200);
        assert_eq!(relative_only.effective_budget(0), 0);
        assert_eq!(relative_only.effective_budget(7), 1);

        let capped = Constraints::new(0.2, Some(150), 10, 3, InlineFeatures::empty());
        assert_eq!(capped.effective_budget(1000), 150);
        assert_eq!(capped.effective_budget(500), 100);

        let zero = Constraints::new(0.0, Some(500), 10, 3, InlineFeatures::empty());
        assert_eq!(zero.effective_budget(1_000_000), 0);
    }

    #[test]
    fn test_defaults_and_features() {
        let constraints = Constraints::default();
        assert_eq!(constraints.minimum_frequency(), &BigUint::from(10u32));
        assert_eq!(constraints.recursive_call_limit(), 3);
        assert!(!constraints.never_optimize());
        assert!(!constraints.no_recursive_inlining());

        let strict = Constraints::new(0.1, None, 0, 0, InlineFeatures::all());
        assert!(strict.never_optimize());
        assert!(strict.no_recursive_inlining());
    }
}
