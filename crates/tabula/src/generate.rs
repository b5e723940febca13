//! DDL generation.
//!
//! Turns change sets plus rebuild decisions into one ordered statement
//! sequence for the whole batch. Emission is two-phase: if any table in
//! the batch is created, dropped or rebuilt, the backend's guard
//! statements bracket the body: rebuilds temporarily break referential
//! integrity while the replacement table is populated, so enforcement is
//! suspended up front and re-validated at the end, never inferred ad hoc
//! per table.

use crate::backend::Backend;
use crate::diff::{ChangeSet, EntityMappingPair, diff};
use crate::strategy::{Strategy, select_strategy};
use std::collections::BTreeSet;
use tabula_schema::{EntityMap, ForeignKeyDef, IndexDef, UniqueKeyDef};

/// Generate the ordered DDL sequence synchronizing all pairs.
pub fn generate(pairs: &[EntityMappingPair], backend: &Backend) -> Vec<String> {
    let plans: Vec<(usize, ChangeSet, Strategy)> = pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            let changes = diff(pair.new.as_ref(), pair.old.as_ref(), backend);
            let strategy = select_strategy(pair, &changes, backend);
            (i, changes, strategy)
        })
        .collect();

    let needs_guard = plans.iter().any(|(i, _, strategy)| {
        let pair = &pairs[*i];
        pair.new.is_none() || pair.old.is_none() || *strategy == Strategy::Rebuild
    });

    let mut statements = Vec::new();
    if needs_guard {
        statements.extend(backend.guard_before.iter().map(|s| s.to_string()));
    }

    for i in dependency_order(pairs) {
        let (_, changes, strategy) = &plans[i];
        emit_table(&mut statements, &pairs[i], changes, *strategy, backend);
    }

    if needs_guard {
        statements.extend(backend.guard_after.iter().map(|s| s.to_string()));
    }

    statements
}

/// Order pair indices so that referenced tables come before referencing
/// ones, judged by the target side's foreign keys. Ties and cycles break
/// deterministically by table name.
fn dependency_order(pairs: &[EntityMappingPair]) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..pairs.len()).collect();
    remaining.sort_by(|&a, &b| pairs[a].table_name().cmp(pairs[b].table_name()));

    let mut done: BTreeSet<&str> = BTreeSet::new();
    let mut order = Vec::with_capacity(pairs.len());

    while !remaining.is_empty() {
        let ready = remaining.iter().position(|&i| {
            let deps: Vec<&str> = pairs[i]
                .new
                .as_ref()
                .map(|m| {
                    m.foreign_keys
                        .iter()
                        .map(|fk| fk.referenced_table.as_str())
                        .filter(|t| *t != pairs[i].table_name())
                        .collect()
                })
                .unwrap_or_default();
            deps.iter().all(|dep| {
                done.contains(dep)
                    || !pairs
                        .iter()
                        .any(|p| p.table_name() == *dep)
            })
        });
        // First ready entry in name order; if the remainder is cyclic,
        // fall back to name order outright.
        let pos = ready.unwrap_or(0);
        let i = remaining.remove(pos);
        done.insert(pairs[i].table_name());
        order.push(i);
    }

    order
}

fn emit_table(
    out: &mut Vec<String>,
    pair: &EntityMappingPair,
    changes: &ChangeSet,
    strategy: Strategy,
    backend: &Backend,
) {
    match (pair.new.as_ref(), pair.old.as_ref()) {
        (None, None) => {}
        (Some(new), None) => emit_create(out, new, backend),
        (None, Some(old)) => {
            out.push(format!("DROP TABLE {}", backend.quote_ident(&old.table_name)));
        }
        (Some(new), Some(old)) => {
            if changes.is_empty() {
                return;
            }
            match strategy {
                Strategy::InPlace => emit_in_place(out, new, changes, backend),
                Strategy::Rebuild => emit_rebuild(out, new, old, backend),
            }
        }
    }
}

/// Pure create: the table, then its indexes, then any constraints the
/// backend could not take inline.
fn emit_create(out: &mut Vec<String>, new: &EntityMap, backend: &Backend) {
    let inline = backend.supports_create_table_with_constraints;
    out.push(create_table_sql(new, &new.table_name, backend, inline));
    for ix in &new.indexes {
        out.push(create_index_sql(&new.table_name, ix, backend));
    }
    if !inline && backend.supports_add_drop_constraint {
        for uk in &new.unique_keys {
            out.push(add_unique_key_sql(&new.table_name, uk, backend));
        }
        for fk in &new.foreign_keys {
            out.push(add_foreign_key_sql(&new.table_name, fk, backend));
        }
    }
}

/// Incremental path: drops precede adds so that a column or constraint
/// can be replaced, and breaking column alterations precede non-breaking
/// ones.
fn emit_in_place(
    out: &mut Vec<String>,
    new: &EntityMap,
    changes: &ChangeSet,
    backend: &Backend,
) {
    let table = &new.table_name;
    let quoted = backend.quote_ident(table);

    for fk in &changes.dropped_foreign_keys {
        out.push(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quoted,
            backend.quote_ident(&fk.name)
        ));
    }
    for uk in &changes.dropped_unique_keys {
        out.push(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            quoted,
            backend.quote_ident(&uk.name)
        ));
    }
    for ix in &changes.dropped_indexes {
        out.push(format!("DROP INDEX {}", backend.quote_ident(&ix.name)));
    }
    for col in &changes.dropped_columns {
        out.push(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quoted,
            backend.quote_ident(&col.name)
        ));
    }
    for col in changes
        .breaking_columns
        .iter()
        .chain(&changes.non_breaking_columns)
    {
        out.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} {}",
            quoted,
            backend.quote_ident(&col.name),
            backend.type_name(col)
        ));
    }
    for col in &changes.added_columns {
        out.push(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quoted,
            backend.quote_ident(&col.name),
            backend.type_name(col)
        ));
    }
    for uk in &changes.added_unique_keys {
        out.push(add_unique_key_sql(table, uk, backend));
    }
    for ix in &changes.added_indexes {
        out.push(create_index_sql(table, ix, backend));
    }
    for fk in &changes.added_foreign_keys {
        out.push(add_foreign_key_sql(table, fk, backend));
    }
}

/// Rebuild path: create the replacement under a temporary name, copy the
/// rows for columns common to both structures, drop the old table, rename
/// the replacement, then recreate every index (and, where they could not
/// be inlined, every constraint), not just the differenced subset,
/// because the table object was replaced.
fn emit_rebuild(out: &mut Vec<String>, new: &EntityMap, old: &EntityMap, backend: &Backend) {
    let tmp = format!("{}__sync", new.table_name);
    let inline = backend.supports_create_table_with_constraints;

    out.push(create_table_sql(new, &tmp, backend, inline));

    let common: Vec<String> = new
        .columns
        .iter()
        .filter(|c| old.column(&c.name).is_some())
        .map(|c| backend.quote_ident(&c.name))
        .collect();
    if !common.is_empty() {
        let cols = common.join(", ");
        out.push(format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            backend.quote_ident(&tmp),
            cols,
            cols,
            backend.quote_ident(&old.table_name)
        ));
    }

    out.push(format!(
        "DROP TABLE {}",
        backend.quote_ident(&old.table_name)
    ));
    out.push(format!(
        "ALTER TABLE {} RENAME TO {}",
        backend.quote_ident(&tmp),
        backend.quote_ident(&new.table_name)
    ));

    for ix in &new.indexes {
        out.push(create_index_sql(&new.table_name, ix, backend));
    }
    if !inline && backend.supports_add_drop_constraint {
        for uk in &new.unique_keys {
            out.push(add_unique_key_sql(&new.table_name, uk, backend));
        }
        for fk in &new.foreign_keys {
            out.push(add_foreign_key_sql(&new.table_name, fk, backend));
        }
    }
}

/// Render a CREATE TABLE statement for `map` under `table_name`, with
/// unique and foreign keys inline when requested.
pub fn create_table_sql(
    map: &EntityMap,
    table_name: &str,
    backend: &Backend,
    inline_constraints: bool,
) -> String {
    let single_pk = map
        .primary_key
        .as_ref()
        .filter(|pk| pk.columns.len() == 1)
        .map(|pk| pk.columns[0].as_str());

    let mut parts: Vec<String> = map
        .columns
        .iter()
        .map(|col| {
            let mut def = format!(
                "    {} {}",
                backend.quote_ident(&col.name),
                backend.type_name(col)
            );
            if single_pk == Some(col.name.as_str()) {
                def.push_str(" PRIMARY KEY");
            }
            def
        })
        .collect();

    if let Some(pk) = map.primary_key.as_ref().filter(|pk| pk.columns.len() > 1) {
        let cols: Vec<String> = pk.columns.iter().map(|c| backend.quote_ident(c)).collect();
        parts.push(format!("    PRIMARY KEY ({})", cols.join(", ")));
    }

    if inline_constraints {
        for uk in &map.unique_keys {
            let cols: Vec<String> = uk.columns.iter().map(|c| backend.quote_ident(c)).collect();
            parts.push(format!(
                "    CONSTRAINT {} UNIQUE ({})",
                backend.quote_ident(&uk.name),
                cols.join(", ")
            ));
        }
        for fk in &map.foreign_keys {
            parts.push(format!("    {}", foreign_key_clause(fk, backend)));
        }
    }

    format!(
        "CREATE TABLE {} (\n{}\n)",
        backend.quote_ident(table_name),
        parts.join(",\n")
    )
}

fn create_index_sql(table: &str, ix: &IndexDef, backend: &Backend) -> String {
    let cols: Vec<String> = ix.columns.iter().map(|c| backend.quote_ident(c)).collect();
    format!(
        "CREATE INDEX {} ON {} ({})",
        backend.quote_ident(&ix.name),
        backend.quote_ident(table),
        cols.join(", ")
    )
}

fn add_unique_key_sql(table: &str, uk: &UniqueKeyDef, backend: &Backend) -> String {
    let cols: Vec<String> = uk.columns.iter().map(|c| backend.quote_ident(c)).collect();
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        backend.quote_ident(table),
        backend.quote_ident(&uk.name),
        cols.join(", ")
    )
}

fn add_foreign_key_sql(table: &str, fk: &ForeignKeyDef, backend: &Backend) -> String {
    format!(
        "ALTER TABLE {} ADD {}",
        backend.quote_ident(table),
        foreign_key_clause(fk, backend)
    )
}

fn foreign_key_clause(fk: &ForeignKeyDef, backend: &Backend) -> String {
    let local: Vec<String> = fk.columns.iter().map(|c| backend.quote_ident(c)).collect();
    let remote: Vec<String> = fk
        .referenced_key
        .columns
        .iter()
        .map(|c| backend.quote_ident(c))
        .collect();
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        backend.quote_ident(&fk.name),
        local.join(", "),
        backend.quote_ident(&fk.referenced_table),
        remote.join(", ")
    )
}
