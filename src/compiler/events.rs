//! Append-only event log of an inlining run.
//!
//! Every decision with an observable effect is recorded as a typed [`Event`].
//! The log is the single source of the run's statistics: [`InlineStats`] is
//! derived from it rather than counted separately.
//!
//! ```rust
//! use profinline::compiler::{EventKind, EventLog};
//!
//! let events = EventLog::new();
//! events.record(EventKind::IndexRebuilt).message("generation 1");
//! events.record(EventKind::Warning).message("entry frequency saturated");
//!
//! assert_eq!(events.len(), 2);
//! assert_eq!(events.stats().index_rebuilds, 1);
//! assert_eq!(events.stats().warnings, 1);
//! ```

use std::fmt;

use crate::ir::{FunctionId, Location};

/// Kind of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A call site was handed to the inlining engine.
    CallSiteInlined,
    /// Frequencies were redistributed after an inline.
    FrequencyRedistributed,
    /// Selection ran dry and the whole-program optimizer was invoked.
    OptimizerFallback,
    /// The call graph index was rebuilt from scratch.
    IndexRebuilt,
    /// Selection found nothing; the run is done.
    SelectionExhausted,
    /// Something unexpected but recoverable happened.
    Warning,
}

impl EventKind {
    /// Returns a short human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::CallSiteInlined => "call site inlined",
            Self::FrequencyRedistributed => "frequencies redistributed",
            Self::OptimizerFallback => "optimizer fallback",
            Self::IndexRebuilt => "call graph index rebuilt",
            Self::SelectionExhausted => "selection exhausted",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Function the event concerns, if any.
    pub function: Option<FunctionId>,
    /// Instruction the event concerns, if any.
    pub location: Option<Location>,
    /// Free-form detail.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        match (self.location, self.function) {
            (Some(location), _) => write!(f, " {location}")?,
            (None, Some(function)) => write!(f, " {function}")?,
            (None, None) => {}
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Builder returned by [`EventLog::record`]. The event is appended when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    /// Attaches an instruction location (and its function) to the event.
    #[must_use = "the event is recorded when the builder is dropped"]
    pub fn at(mut self, location: Location) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.location = Some(location);
            event.function = Some(location.function);
        }
        self
    }

    /// Attaches a function to the event.
    #[must_use = "the event is recorded when the builder is dropped"]
    pub fn function(mut self, function: FunctionId) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.function = Some(function);
        }
        self
    }

    /// Sets the message and records the event.
    pub fn message(mut self, message: impl Into<String>) {
        if let Some(event) = self.event.as_mut() {
            event.message = message.into();
        }
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}

/// Append-only log of [`Event`]s.
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Starts recording an event of `kind`.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                function: None,
                location: None,
                message: String::new(),
            }),
        }
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, event)| event)
    }

    /// Returns how many events of `kind` were recorded.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns `true` if at least one event of `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.iter().any(|e| e.kind == kind)
    }

    /// Derives run statistics from the recorded events.
    #[must_use]
    pub fn stats(&self) -> InlineStats {
        InlineStats::from_log(self)
    }
}

/// Statistics of an inlining run, derived from an [`EventLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineStats {
    /// Call sites inlined by the profile-based inliner.
    pub call_sites_inlined: usize,
    /// Frequency redistributions performed.
    pub frequency_redistributions: usize,
    /// Times the whole-program optimizer was invoked.
    pub optimizer_fallbacks: usize,
    /// Times the call graph index was rebuilt.
    pub index_rebuilds: usize,
    /// Warnings recorded.
    pub warnings: usize,
}

impl InlineStats {
    /// Counts the events of `log`.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let mut stats = Self::default();
        for event in log.iter() {
            match event.kind {
                EventKind::CallSiteInlined => stats.call_sites_inlined += 1,
                EventKind::FrequencyRedistributed => stats.frequency_redistributions += 1,
                EventKind::OptimizerFallback => stats.optimizer_fallbacks += 1,
                EventKind::IndexRebuilt => stats.index_rebuilds += 1,
                EventKind::Warning => stats.warnings += 1,
                EventKind::SelectionExhausted => {}
            }
        }
        stats
    }
}

impl fmt::Display for InlineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} call sites inlined, {} redistributions, {} optimizer fallbacks, {} rebuilds, {} warnings",
            self.call_sites_inlined,
            self.frequency_redistributions,
            self.optimizer_fallbacks,
            self.index_rebuilds,
            self.warnings
        )
    }
}
