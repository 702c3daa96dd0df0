//! Call site and function records of the call graph index.
//!
//! This module defines the mutable bookkeeping the inliner keeps per call
//! site and per function while the pass runs.

use std::{collections::BTreeMap, fmt};

use num_bigint::BigUint;

use crate::ir::{CallSite, FunctionId, Location};

/// Stable identifier of a [`CallSiteRecord`] inside one index generation.
///
/// Ids are arena positions: they are never reused within a generation and are
/// invalidated wholesale when the index is rebuilt.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteId(usize);

impl CallSiteId {
    /// Creates a call site id from its arena position.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        CallSiteId(index)
    }

    /// Returns the arena position of this id.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallSiteId({})", self.0)
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

/// A single tracked call site.
///
/// The `inlined` marker is monotonic: once a record is marked, it stays
/// marked for the rest of its generation and is skipped by selection and by
/// frequency redistribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteRecord {
    /// Estimated execution count of the call.
    pub frequency: BigUint,
    /// Function containing the call.
    pub caller: FunctionId,
    /// Function being called.
    pub callee: FunctionId,
    /// Position of the call instruction in the IR.
    pub location: Location,
    inlined: bool,
}

impl CallSiteRecord {
    /// Creates a fresh, not-yet-inlined record.
    #[must_use]
    pub fn new(
        location: Location,
        caller: FunctionId,
        callee: FunctionId,
        frequency: impl Into<BigUint>,
    ) -> Self {
        Self {
            frequency: frequency.into(),
            caller,
            callee,
            location,
            inlined: false,
        }
    }

    /// Returns `true` once the call site has been chosen for inlining.
    #[must_use]
    pub fn is_inlined(&self) -> bool {
        self.inlined
    }

    /// Marks the call site as inlined. There is no way back.
    pub fn mark_inlined(&mut self) {
        self.inlined = true;
    }

    /// Returns the unit of work handed to the inlining engine.
    #[must_use]
    pub fn to_call_site(&self) -> CallSite {
        CallSite {
            location: self.location,
            caller: self.caller,
            callee: self.callee,
        }
    }
}

/// Per-function bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// The function this record describes.
    pub id: FunctionId,
    /// Entry-block frequency; shrinks as call sites into the function are inlined.
    pub frequency: BigUint,
    /// Instruction count; grows as callees are inlined into the function.
    pub size: u64,
    /// Self-recursive or part of a call-graph cycle. Fixed per generation.
    pub recursive: bool,
    /// Call sites inside this function, keyed by location.
    pub call_sites: BTreeMap<Location, CallSiteId>,
}

impl FunctionRecord {
    /// Creates a record without call sites.
    #[must_use]
    pub fn new(id: FunctionId, frequency: impl Into<BigUint>, size: u64, recursive: bool) -> Self {
        Self {
            id,
            frequency: frequency.into(),
            size,
            recursive,
            call_sites: BTreeMap::new(),
        }
    }
}
