//! Rebuild strategy selection.
//!
//! Decides, per table, whether the change set can be applied with
//! incremental ALTER statements or whether the table must be rebuilt
//! (create new under a temporary name, copy rows, drop old, rename).
//! The decision is computed once and reused: under [`Strategy::Rebuild`]
//! the differenced index/constraint sets are superseded, since the table
//! object itself is replaced and every index and constraint goes with it.

use crate::backend::Backend;
use crate::diff::{ChangeSet, EntityMappingPair};

/// How one table's changes will be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Incremental ALTER/CREATE/DROP statements against the existing table
    InPlace,
    /// Copy/rename rebuild of the whole table
    Rebuild,
}

/// Choose the strategy for one pair under the given capability.
///
/// Never errors: a change the backend cannot express incrementally
/// selects the safe-but-expensive rebuild path instead of failing.
pub fn select_strategy(
    pair: &EntityMappingPair,
    changes: &ChangeSet,
    backend: &Backend,
) -> Strategy {
    // A missing side is a pure create or pure drop; both replace the
    // table object outright.
    if pair.new.is_none() || pair.old.is_none() {
        return Strategy::Rebuild;
    }

    if changes.has_column_alterations() && !backend.supports_alter_column {
        return Strategy::Rebuild;
    }
    if !changes.dropped_columns.is_empty() && !backend.supports_drop_column {
        return Strategy::Rebuild;
    }
    if changes.has_constraint_changes() && !backend.supports_add_drop_constraint {
        return Strategy::Rebuild;
    }

    Strategy::InPlace
}
