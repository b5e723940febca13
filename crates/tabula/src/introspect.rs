//! Live schema introspection.
//!
//! Rebuilds [`EntityMap`]s for the deployed schema from the backend's
//! pragma-style metadata surface. Two passes: every table's columns and
//! indexes are read first, then foreign keys are resolved against the
//! completed arena, since a foreign key may reference a table that has not been
//! read yet, so resolution cannot happen inline.
//!
//! The result is ephemeral: it is rebuilt from scratch on every
//! synchronization run and never cached.

use crate::backend::Backend;
use crate::connection::{Connection, Row};
use crate::{Error, Result};
use indexmap::IndexMap;
use tabula_schema::{
    ColumnDef, EntityMap, ForeignKeyDef, IndexDef, PrimaryKey, SchemaSet, UniqueKeyDef,
};

/// Read the live schema through `conn`, fully resolving foreign keys.
pub async fn introspect(conn: &dyn Connection, backend: &Backend) -> Result<SchemaSet> {
    let rows = conn
        .query("SELECT tbl_name FROM sqlite_master WHERE type = 'table'")
        .await?;
    let mut names = Vec::with_capacity(rows.len());
    for row in &rows {
        names.push(row.get_str("tbl_name")?.to_string());
    }

    let mut tables = SchemaSet::new();
    for name in &names {
        let mut map = EntityMap::new(name.clone());
        read_columns(&mut map, conn, backend).await?;
        read_indexes(&mut map, conn, backend).await?;
        tracing::debug!(
            table = %name,
            columns = map.columns.len(),
            indexes = map.indexes.len(),
            unique_keys = map.unique_keys.len(),
            "introspected table"
        );
        tables.insert(map);
    }

    // Second pass: every table's own columns and keys are known, so
    // references can be resolved to the canonical unique keys.
    for name in &names {
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            backend.quote_ident(name)
        );
        let rows = conn.query(&sql).await?;
        let fks = resolve_foreign_keys(name, &rows, &tables)?;
        if let Some(map) = tables.get_table_mut(name) {
            map.foreign_keys = fks;
        }
    }

    Ok(tables)
}

/// Read column metadata and synthesize the primary key constraint.
async fn read_columns(
    map: &mut EntityMap,
    conn: &dyn Connection,
    backend: &Backend,
) -> Result<()> {
    let sql = format!("PRAGMA table_info({})", backend.quote_ident(&map.table_name));
    let rows = conn.query(&sql).await?;

    let mut pk_members: Vec<(i64, String)> = Vec::new();
    for row in &rows {
        let name = row.get_str("name")?.to_string();
        let declared = row.get_str("type")?;
        let notnull = row.get_bool("notnull")?;
        let pk = row.get_i64("pk")?;

        if pk > 0 {
            pk_members.push((pk, name.clone()));
        }
        map.columns
            .push(ColumnDef::new(name, backend.type_from_name(declared), !notnull));
    }

    if !pk_members.is_empty() {
        pk_members.sort_by_key(|(ordinal, _)| *ordinal);
        map.primary_key = Some(PrimaryKey {
            name: format!("PK_{}", map.table_name),
            columns: pk_members.into_iter().map(|(_, name)| name).collect(),
        });
    }

    Ok(())
}

/// Read index metadata; unique indexes become unique keys.
async fn read_indexes(
    map: &mut EntityMap,
    conn: &dyn Connection,
    backend: &Backend,
) -> Result<()> {
    let sql = format!("PRAGMA index_list({})", backend.quote_ident(&map.table_name));
    let rows = conn.query(&sql).await?;

    for row in &rows {
        let name = row.get_str("name")?.to_string();
        let unique = row.get_bool("unique")?;
        let columns = read_index_members(map, conn, backend, &name).await?;

        if unique {
            map.push_unique_key_dedup(UniqueKeyDef::new(name, columns));
        } else {
            map.push_index_dedup(IndexDef::new(name, columns));
        }
    }

    Ok(())
}

/// Read the member columns of one index, in ordinal order, resolving each
/// name against the owning table's columns.
async fn read_index_members(
    map: &EntityMap,
    conn: &dyn Connection,
    backend: &Backend,
    index_name: &str,
) -> Result<Vec<String>> {
    let sql = format!("PRAGMA index_info({})", backend.quote_ident(index_name));
    let rows = conn.query(&sql).await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let member = row.get_str("name")?;
        let col = map
            .column(member)
            .ok_or_else(|| Error::UnknownColumn {
                table: map.table_name.clone(),
                column: member.to_string(),
            })?;
        columns.push(col.name.clone());
    }
    Ok(columns)
}

struct FkBuilder<'a> {
    referenced: &'a EntityMap,
    local_columns: Vec<String>,
    referenced_columns: Vec<String>,
}

/// Group foreign-key rows by id and resolve each group to the canonical
/// unique key on the referenced table.
///
/// Column names from the foreign-key listing are matched
/// case-insensitively: the metadata surface may case-fold identifiers
/// here even though column definitions report them verbatim.
fn resolve_foreign_keys(
    table: &str,
    rows: &[Row],
    tables: &SchemaSet,
) -> Result<Vec<ForeignKeyDef>> {
    let owner = tables
        .get_table(table)
        .ok_or_else(|| Error::Metadata(format!("foreign key rows for unknown table {table}")))?;

    let mut builders: IndexMap<i64, FkBuilder> = IndexMap::new();
    for row in rows {
        let id = row.get_i64("id")?;
        let referenced_table = row.get_str("table")?.to_string();
        let from = row.get_str("from")?;
        let to = row.get_str("to")?;

        let referenced = tables
            .get_table(&referenced_table)
            .ok_or_else(|| Error::MissingTable {
                table: table.to_string(),
                referenced: referenced_table.clone(),
            })?;

        let local = owner.column_ci(from).ok_or_else(|| Error::UnknownColumn {
            table: table.to_string(),
            column: from.to_string(),
        })?;
        let remote = referenced
            .column_ci(to)
            .ok_or_else(|| Error::UnknownColumn {
                table: referenced_table.clone(),
                column: to.to_string(),
            })?;

        let remote_name = remote.name.clone();
        let builder = builders.entry(id).or_insert_with(|| FkBuilder {
            referenced,
            local_columns: Vec::new(),
            referenced_columns: Vec::new(),
        });
        builder.local_columns.push(local.name.clone());
        builder.referenced_columns.push(remote_name);
    }

    let mut fks = Vec::with_capacity(builders.len());
    for (id, builder) in builders {
        let name = format!("FK_{}_{}", table, id);

        // Replace the accumulated placeholder with the referenced table's
        // canonical unique key, so constraint comparisons see one shared
        // definition rather than a synthesized duplicate.
        let canonical = builder
            .referenced
            .unique_key_covering(&builder.referenced_columns)
            .ok_or_else(|| Error::UnresolvedForeignKey {
                name: name.clone(),
                table: table.to_string(),
                referenced: builder.referenced.table_name.clone(),
            })?;

        fks.push(ForeignKeyDef {
            name,
            columns: builder.local_columns,
            referenced_table: builder.referenced.table_name.clone(),
            referenced_key: canonical.clone(),
        });
    }

    Ok(fks)
}
