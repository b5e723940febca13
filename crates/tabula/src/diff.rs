//! Schema diffing - compare a target entity map against the live one.
//!
//! [`diff`] is a pure function over an [`EntityMappingPair`]: either side
//! may be absent (absent old means the table is being created, absent new
//! means it is being dropped), and the three cases are handled explicitly
//! rather than through scattered null checks.
//!
//! ## Breaking vs non-breaking column changes
//!
//! A column pair where the old side is nullable and the new side is not
//! is *breaking*: existing rows may carry nulls the new schema forbids.
//! A pair whose declared type changes without tightening nullability is
//! *non-breaking*. One pair is never both.
//!
//! "Declared type changes" is judged by the backend capability: on a
//! loose-types backend, categories that share a storage class (say,
//! `SmallInt` and `BigInt`) do not differ at all.

use crate::backend::Backend;
use tabula_schema::{ColumnDef, EntityMap, ForeignKeyDef, IndexDef, UniqueKeyDef};

/// A (new, old) pairing of one table's target and live descriptions.
#[derive(Debug, Clone)]
pub struct EntityMappingPair {
    /// The target description; absent for a table to be dropped
    pub new: Option<EntityMap>,
    /// The live description; absent for a table to be created
    pub old: Option<EntityMap>,
}

impl EntityMappingPair {
    /// The table name, from whichever side is present.
    pub fn table_name(&self) -> &str {
        self.new
            .as_ref()
            .or(self.old.as_ref())
            .map(|m| m.table_name.as_str())
            .unwrap_or("")
    }
}

/// Structured differences for one table. Transient: it exists for the
/// duration of one synchronization pass and is never persisted.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Column pairs whose nullability tightens (new-side definitions)
    pub breaking_columns: Vec<ColumnDef>,
    /// Column pairs retyped without tightening nullability (new-side definitions)
    pub non_breaking_columns: Vec<ColumnDef>,
    /// Columns only on the new side
    pub added_columns: Vec<ColumnDef>,
    /// Columns only on the old side
    pub dropped_columns: Vec<ColumnDef>,
    /// Indexes only on the new side (by ordered column sequence)
    pub added_indexes: Vec<IndexDef>,
    /// Indexes only on the old side (by ordered column sequence)
    pub dropped_indexes: Vec<IndexDef>,
    /// Unique keys only on the new side (by column set)
    pub added_unique_keys: Vec<UniqueKeyDef>,
    /// Unique keys only on the old side (by column set)
    pub dropped_unique_keys: Vec<UniqueKeyDef>,
    /// Foreign keys only on the new side (structural)
    pub added_foreign_keys: Vec<ForeignKeyDef>,
    /// Foreign keys only on the old side (structural)
    pub dropped_foreign_keys: Vec<ForeignKeyDef>,
}

impl ChangeSet {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.breaking_columns.is_empty()
            && self.non_breaking_columns.is_empty()
            && self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.dropped_indexes.is_empty()
            && self.added_unique_keys.is_empty()
            && self.dropped_unique_keys.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.dropped_foreign_keys.is_empty()
    }

    /// Whether any existing column is altered (breaking or not).
    pub fn has_column_alterations(&self) -> bool {
        !self.breaking_columns.is_empty() || !self.non_breaking_columns.is_empty()
    }

    /// Whether any unique or foreign key is added or dropped.
    pub fn has_constraint_changes(&self) -> bool {
        !self.added_unique_keys.is_empty()
            || !self.dropped_unique_keys.is_empty()
            || !self.added_foreign_keys.is_empty()
            || !self.dropped_foreign_keys.is_empty()
    }
}

/// Compute the structural differences between the two sides of a pair.
///
/// Pure: no connection access, no mutation of either side.
pub fn diff(new: Option<&EntityMap>, old: Option<&EntityMap>, backend: &Backend) -> ChangeSet {
    match (new, old) {
        (None, None) => ChangeSet::default(),
        (Some(new), None) => ChangeSet {
            added_columns: new.columns.clone(),
            added_indexes: new.indexes.clone(),
            added_unique_keys: new.unique_keys.clone(),
            added_foreign_keys: new.foreign_keys.clone(),
            ..Default::default()
        },
        (None, Some(old)) => ChangeSet {
            dropped_columns: old.columns.clone(),
            dropped_indexes: old.indexes.clone(),
            dropped_unique_keys: old.unique_keys.clone(),
            dropped_foreign_keys: old.foreign_keys.clone(),
            ..Default::default()
        },
        (Some(new), Some(old)) => diff_both(new, old, backend),
    }
}

fn diff_both(new: &EntityMap, old: &EntityMap, backend: &Backend) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for new_col in &new.columns {
        match old.column(&new_col.name) {
            None => changes.added_columns.push(new_col.clone()),
            Some(old_col) => {
                let retyped = !backend.same_declared_type(old_col.ty, new_col.ty);
                let tightened = old_col.nullable && !new_col.nullable;
                if tightened {
                    changes.breaking_columns.push(new_col.clone());
                } else if retyped {
                    changes.non_breaking_columns.push(new_col.clone());
                }
                // Loosened nullability with an unchanged declared type needs
                // no statement: the old declaration already admits every row
                // the new one does.
            }
        }
    }
    for old_col in &old.columns {
        if new.column(&old_col.name).is_none() {
            changes.dropped_columns.push(old_col.clone());
        }
    }

    for ix in &new.indexes {
        if !old.indexes.iter().any(|o| o.columns_match(ix)) {
            changes.added_indexes.push(ix.clone());
        }
    }
    for ix in &old.indexes {
        if !new.indexes.iter().any(|n| n.columns_match(ix)) {
            changes.dropped_indexes.push(ix.clone());
        }
    }

    for uk in &new.unique_keys {
        if !old.unique_keys.iter().any(|o| o.columns_match(uk)) {
            changes.added_unique_keys.push(uk.clone());
        }
    }
    for uk in &old.unique_keys {
        if !new.unique_keys.iter().any(|n| n.columns_match(uk)) {
            changes.dropped_unique_keys.push(uk.clone());
        }
    }

    for fk in &new.foreign_keys {
        if !old.foreign_keys.iter().any(|o| o.structurally_eq(fk)) {
            changes.added_foreign_keys.push(fk.clone());
        }
    }
    for fk in &old.foreign_keys {
        if !new.foreign_keys.iter().any(|n| n.structurally_eq(fk)) {
            changes.dropped_foreign_keys.push(fk.clone());
        }
    }

    changes
}
