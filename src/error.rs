use thiserror::Error;

use crate::ir::{BlockId, FunctionId, Location};

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// Errors fall into three classes:
///
/// ## Configuration Errors
/// - [`Error::UnknownOption`] - An option name that the inliner does not understand
/// - [`Error::InvalidOption`] - A malformed or out-of-range option value
///
/// These are detected while building an [`crate::InlineConfig`] into
/// [`crate::compiler::Constraints`], before any pass work happens.
///
/// ## Internal-Consistency Failures
/// - [`Error::MissingFrequency`] - The frequency oracle has no value for a block
/// - [`Error::MissingFunction`] - A function record the bookkeeping relies on is gone
/// - [`Error::DuplicateCallSite`] - A duplicated call site collides with a tracked one
/// - [`Error::ZeroFrequency`] - Redistribution through a callee with no incoming frequency
/// - [`Error::UnexpectedShape`] - A location claimed to be a call holds something else
/// - [`Error::MissingDuplicate`] - The engine did not report where a call site was copied
/// - [`Error::Invariant`] - Any other broken bookkeeping invariant
///
/// These are fatal: the bookkeeping model has no meaning once one of them
/// fires, so the pass aborts without a partial result.
///
/// ## Collaborator Errors
/// - [`Error::Ir`] - Failure reported by an IR collaborator (profiler, engine, simplifier)
///
/// # Examples
///
/// ```rust
/// use profinline::{Error, InlineConfig};
///
/// match InlineConfig::from_args(["minimum-execution-frequency=-4"]) {
///     Err(Error::InvalidOption { option, .. }) => assert_eq!(option, "minimum-execution-frequency"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    /// An option name that is not part of the inliner's configuration surface.
    #[error("Unknown inlining option '{0}'")]
    UnknownOption(String),

    /// An option value that could not be parsed or is out of range.
    ///
    /// # Fields
    ///
    /// * `option` - The option name as written by the user
    /// * `value` - The rejected value
    /// * `reason` - Why the value was rejected
    #[error("Invalid value '{value}' for option '{option}': {reason}")]
    InvalidOption {
        /// The option whose value was rejected
        option: String,
        /// The rejected value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    // Internal-consistency failures
    /// The frequency oracle has no entry for a block that the call graph index needs.
    ///
    /// A missing frequency is never treated as zero; it indicates a bug in the
    /// profiling pass that ran before the inliner.
    #[error("No execution frequency recorded for block {0}")]
    MissingFrequency(BlockId),

    /// A function record is missing from the call graph index.
    #[error("Function {0} is not present in the call graph index")]
    MissingFunction(FunctionId),

    /// A call site was inserted at a location that is already tracked.
    ///
    /// Duplication must always produce fresh locations.
    #[error("Call site location {0} is already tracked")]
    DuplicateCallSite(Location),

    /// Frequency redistribution was requested for a callee with zero incoming frequency.
    #[error("Function {0} has zero incoming frequency but one of its call sites was inlined")]
    ZeroFrequency(FunctionId),

    /// The instruction at a location claimed to be a call is not an inlineable call.
    #[error("Instruction at {0} is not an inlineable call")]
    UnexpectedShape(Location),

    /// A live call site of an inlined callee has no duplicate reported by the engine.
    #[error("Call site {0} was not reported as duplicated by the inlining engine")]
    MissingDuplicate(Location),

    /// A bookkeeping invariant was violated.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// Description of the violated invariant
        message: String,
        /// The source file in which the violation was detected
        file: &'static str,
        /// The source line in which the violation was detected
        line: u32,
    },

    // Collaborator errors
    /// An IR collaborator failed.
    #[error("{0}")]
    Ir(String),
}

impl Error {
    /// Returns `true` if this error was raised while validating configuration.
    ///
    /// Configuration errors are reported to the invoking toolchain and the
    /// pass does not run.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownOption(_) | Self::InvalidOption { .. })
    }

    /// Returns `true` if this error is a fatal internal-consistency failure.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::MissingFrequency(_)
                | Self::MissingFunction(_)
                | Self::DuplicateCallSite(_)
                | Self::ZeroFrequency(_)
                | Self::UnexpectedShape(_)
                | Self::MissingDuplicate(_)
                | Self::Invariant { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ir::{BlockId, FunctionId, Location},
        Error,
    };

    #[test]
    fn test_error_classification() {
        let config = Error::UnknownOption("inline-everything".to_string());
        assert!(config.is_configuration());
        assert!(!config.is_internal());

        let missing = Error::MissingFrequency(BlockId::new(7));
        assert!(missing.is_internal());
        assert!(!missing.is_configuration());

        let ir = Error::Ir("engine failure".to_string());
        assert!(!ir.is_internal());
        assert!(!ir.is_configuration());
    }

    #[test]
    fn test_invariant_macro_records_location() {
        let err = invariant_error!("record {} vanished", 3);
        match err {
            Error::Invariant {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "record 3 vanished");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_messages_name_the_invariant() {
        let loc = Location::new(FunctionId::new(1), BlockId::new(2), 0);
        let msg = Error::DuplicateCallSite(loc).to_string();
        assert!(msg.contains("already tracked"));
        assert!(msg.contains(&loc.to_string()));

        let msg = Error::ZeroFrequency(FunctionId::new(4)).to_string();
        assert!(msg.contains("zero incoming frequency"));
    }
}
