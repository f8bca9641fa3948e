//! Outcomes of sync and cascade passes.

use crate::entity::EntityType;
use crate::error::SyncError;
use std::fmt;

/// One contained failure.
#[derive(Debug)]
pub struct SyncFailure {
    /// The mapping being applied, rendered for logs.
    pub mapping: String,
    /// The reference that could not be applied.
    pub reference: String,
    pub error: SyncError,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ['{}']: {}", self.mapping, self.reference, self.error)
    }
}

/// Result of one `sync_entity` (or `repair_all`) call.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub mappings_processed: usize,
    /// Writes made to other entities.
    pub writes: usize,
    /// True when the call was skipped because the same entity was already
    /// being synced.
    pub reentrant_skip: bool,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.mappings_processed += other.mappings_processed;
        self.writes += other.writes;
        self.failures.extend(other.failures);
    }
}

/// Result of one `handle_deletion` call.
#[derive(Debug)]
pub struct CascadeReport {
    pub entity_type: EntityType,
    pub key: String,
    /// Documents rewritten to drop references to the deleted entity.
    pub entities_updated: usize,
    pub failures: Vec<SyncFailure>,
}

/// What [`audit`](crate::sync::SyncEngine::audit) found wrong with an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    /// The referenced entity does not exist.
    UnresolvedTarget,
    /// The target exists but does not link back.
    MissingMirror,
}

/// An edge that does not satisfy the mirror invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub mapping: String,
    pub source: String,
    pub reference: String,
    pub problem: Problem,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let problem = match self.problem {
            Problem::UnresolvedTarget => "target not found",
            Problem::MissingMirror => "missing back-reference",
        };
        write!(f, "{}: '{}' -> '{}' ({problem})", self.mapping, self.source, self.reference)
    }
}
