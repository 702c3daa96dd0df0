//! Configuration of the profile-guided inliner.
//!
//! Options can be set programmatically through the builder methods of
//! [`InlineConfig`], or parsed from the `key=value` strings a compiler driver
//! passes through. Option names are kebab-case and listed in [`InlineOption`].
//!
//! ```rust
//! use profinline::InlineConfig;
//!
//! let config = InlineConfig::from_args([
//!     "--absolute-budget=500",
//!     "minimum-execution-frequency=25",
//!     "disable-recursive-inlining",
//! ])?;
//! let constraints = config.constraints()?;
//! assert_eq!(constraints.absolute_budget(), Some(500));
//! assert!(constraints.no_recursive_inlining());
//! # Ok::<(), profinline::Error>(())
//! ```

use std::str::FromStr;

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    compiler::{Constraints, InlineFeatures},
    Error, Result,
};

/// Every option the inliner understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum InlineOption {
    /// Fraction of the initial program size allowed as code growth.
    RelativeBudgetFraction,
    /// Hard cap on code growth.
    AbsoluteBudget,
    /// Call sites running fewer times than this are never inlined.
    MinimumExecutionFrequency,
    /// How many times a recursive callee may be inlined.
    RecursiveCallLimit,
    /// Skip the optimizer fallback when selection runs dry.
    DisableOptimizerFallback,
    /// Never inline recursive callees.
    DisableRecursiveInlining,
}

impl InlineOption {
    /// Returns `true` for options that take no value.
    #[must_use]
    pub const fn is_flag(&self) -> bool {
        matches!(
            self,
            Self::DisableOptimizerFallback | Self::DisableRecursiveInlining
        )
    }

    /// Iterates over all options.
    pub fn all() -> impl Iterator<Item = InlineOption> {
        Self::iter()
    }
}

/// User-facing configuration of an inlining run.
///
/// Values are kept as written and checked by [`InlineConfig::validate`];
/// [`InlineConfig::constraints`] validates and produces the immutable
/// [`Constraints`] the pass runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineConfig {
    /// Fraction of the initial program size allowed as code growth (default: 0.2).
    pub relative_budget_fraction: f64,

    /// Hard cap on code growth; the smaller of both budgets wins (default: unset).
    pub absolute_budget: Option<i64>,

    /// Call sites below this frequency are never selected (default: 10).
    pub minimum_execution_frequency: i64,

    /// Maximum number of inlines of each recursive callee (default: 3).
    pub recursive_call_limit: i64,

    /// Skip the optimizer fallback entirely.
    pub disable_optimizer_fallback: bool,

    /// Reject every recursive callee.
    pub disable_recursive_inlining: bool,
}

impl Default for InlineConfig {
    fn default() -> Self {
        Self {
            relative_budget_fraction: 0.2,
            absolute_budget: None,
            minimum_execution_frequency: 10,
            recursive_call_limit: 3,
            disable_optimizer_fallback: false,
            disable_recursive_inlining: false,
        }
    }
}

impl InlineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that grows code sparingly.
    ///
    /// - 5% relative budget
    /// - only call sites running at least 100 times
    /// - no recursive inlining
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            relative_budget_fraction: 0.05,
            minimum_execution_frequency: 100,
            recursive_call_limit: 0,
            disable_recursive_inlining: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that trades size for speed.
    ///
    /// - 50% relative budget
    /// - any call site running at least once
    /// - recursive callees inlined up to 8 times
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            relative_budget_fraction: 0.5,
            minimum_execution_frequency: 1,
            recursive_call_limit: 8,
            ..Self::default()
        }
    }

    /// Sets the relative budget fraction.
    #[must_use]
    pub fn with_relative_budget_fraction(mut self, fraction: f64) -> Self {
        self.relative_budget_fraction = fraction;
        self
    }

    /// Sets the absolute budget.
    #[must_use]
    pub fn with_absolute_budget(mut self, budget: i64) -> Self {
        self.absolute_budget = Some(budget);
        self
    }

    /// Sets the minimum execution frequency.
    #[must_use]
    pub fn with_minimum_execution_frequency(mut self, frequency: i64) -> Self {
        self.minimum_execution_frequency = frequency;
        self
    }

    /// Sets the recursive call limit.
    #[must_use]
    pub fn with_recursive_call_limit(mut self, limit: i64) -> Self {
        self.recursive_call_limit = limit;
        self
    }

    /// Enables or disables the optimizer fallback.
    #[must_use]
    pub fn with_optimizer_fallback(mut self, enabled: bool) -> Self {
        self.disable_optimizer_fallback = !enabled;
        self
    }

    /// Enables or disables inlining of recursive callees.
    #[must_use]
    pub fn with_recursive_inlining(mut self, enabled: bool) -> Self {
        self.disable_recursive_inlining = !enabled;
        self
    }

    /// Parses a list of `name=value` or bare flag arguments on top of the
    /// defaults. A leading `--` on the name is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] or [`Error::InvalidOption`] for the
    /// first argument that is not accepted, or the validation error of the
    /// resulting configuration.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            let arg = arg.strip_prefix("--").unwrap_or(arg);
            match arg.split_once('=') {
                Some((name, value)) => config.set(name.trim(), Some(value.trim()))?,
                None => config.set(arg.trim(), None)?,
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses `(name, value)` pairs on top of the defaults. Flags accept
    /// `true`/`false` as value.
    ///
    /// # Errors
    ///
    /// Same as [`InlineConfig::from_args`].
    pub fn from_options<I, K, V>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in options {
            config.set(name.as_ref(), Some(value.as_ref()))?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Sets a single option by name.
    ///
    /// Flags may be given without a value, which enables them. `absolute-budget`
    /// accepts `none` to clear the cap. Range checks are left to
    /// [`InlineConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownOption`] for an unknown name and
    /// [`Error::InvalidOption`] for a missing or unparsable value.
    pub fn set(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let option =
            InlineOption::from_str(name).map_err(|_| Error::UnknownOption(name.to_string()))?;

        if option.is_flag() {
            let enabled = match value {
                None => true,
                Some(v) => parse_flag(option, v)?,
            };
            match option {
                InlineOption::DisableOptimizerFallback => self.disable_optimizer_fallback = enabled,
                InlineOption::DisableRecursiveInlining => self.disable_recursive_inlining = enabled,
                _ => {}
            }
            return Ok(());
        }

        let Some(value) = value else {
            return Err(invalid(option, "", "a value is required"));
        };
        match option {
            InlineOption::RelativeBudgetFraction => {
                self.relative_budget_fraction = value
                    .parse()
                    .map_err(|_| invalid(option, value, "expected a real number"))?;
            }
            InlineOption::AbsoluteBudget if value.eq_ignore_ascii_case("none") => {
                self.absolute_budget = None;
            }
            InlineOption::AbsoluteBudget => {
                self.absolute_budget = Some(parse_integer(option, value)?);
            }
            InlineOption::MinimumExecutionFrequency => {
                self.minimum_execution_frequency = parse_integer(option, value)?;
            }
            InlineOption::RecursiveCallLimit => {
                self.recursive_call_limit = parse_integer(option, value)?;
            }
            InlineOption::DisableOptimizerFallback | InlineOption::DisableRecursiveInlining => {}
        }
        Ok(())
    }

    /// Checks that every value is finite and non-negative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        let fraction = self.relative_budget_fraction;
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(invalid(
                InlineOption::RelativeBudgetFraction,
                &fraction.to_string(),
                "must be a finite, non-negative number",
            ));
        }
        if let Some(budget) = self.absolute_budget {
            non_negative(InlineOption::AbsoluteBudget, budget)?;
        }
        non_negative(
            InlineOption::MinimumExecutionFrequency,
            self.minimum_execution_frequency,
        )?;
        non_negative(InlineOption::RecursiveCallLimit, self.recursive_call_limit)?;
        Ok(())
    }

    /// Validates the configuration and converts it into [`Constraints`].
    ///
    /// # Errors
    ///
    /// Returns the error of [`InlineConfig::validate`].
    pub fn constraints(&self) -> Result<Constraints> {
        self.validate()?;

        let mut features = InlineFeatures::empty();
        features.set(
            InlineFeatures::NEVER_OPTIMIZE,
            self.disable_optimizer_fallback,
        );
        features.set(
            InlineFeatures::NO_RECURSIVE_INLINING,
            self.disable_recursive_inlining,
        );

        Ok(Constraints::new(
            self.relative_budget_fraction,
            self.absolute_budget.map(non_negative_u64),
            non_negative_u64(self.minimum_execution_frequency),
            non_negative_u64(self.recursive_call_limit),
            features,
        ))
    }
}

fn invalid(option: InlineOption, value: &str, reason: &str) -> Error {
    Error::InvalidOption {
        option: option.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_integer(option: InlineOption, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| invalid(option, value, "expected an integer"))
}

fn parse_flag(option: InlineOption, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "" | "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(option, value, "expected a boolean")),
    }
}

fn non_negative(option: InlineOption, value: i64) -> Result<()> {
    if value < 0 {
        return Err(invalid(option, &value.to_string(), "must not be negative"));
    }
    Ok(())
}

/// Only called on validated values.
fn non_negative_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
