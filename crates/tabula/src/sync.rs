//! The synchronization pass.
//!
//! Drives the whole pipeline across all tables: introspect the live
//! schema, pair each target table with its live counterpart, diff, select
//! strategies, generate the ordered statement sequence, and optionally
//! execute it. The pass is strictly sequential and performs no internal
//! locking or retries: callers serialize concurrent passes externally and
//! wrap execution in a transaction where the backend allows transactional
//! DDL. Re-running the pipeline is always safe: introspection and
//! diffing compute the current delta, never an incremental one.

use crate::Result;
use crate::backend::Backend;
use crate::connection::Connection;
use crate::diff::EntityMappingPair;
use crate::generate::generate;
use crate::introspect::introspect;
use tabula_schema::SchemaSet;

/// Synchronizes a live database schema with a target [`SchemaSet`].
#[derive(Debug, Clone)]
pub struct Synchronizer {
    backend: Backend,
}

impl Synchronizer {
    /// Create a synchronizer for the given backend capability.
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// The backend capability this synchronizer plans against.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Compute the ordered DDL sequence that would bring the live schema
    /// in line with `target`, without executing anything.
    ///
    /// Returns an empty sequence when the schemas already match.
    pub async fn plan(
        &self,
        target: &SchemaSet,
        conn: &dyn Connection,
    ) -> Result<Vec<String>> {
        let live = introspect(conn, &self.backend).await?;
        let pairs = pair_maps(target, &live);
        tracing::debug!(
            backend = self.backend.name,
            tables = pairs.len(),
            live = live.len(),
            target = target.len(),
            "planning synchronization pass"
        );
        Ok(generate(&pairs, &self.backend))
    }

    /// Plan and execute a full synchronization pass, one statement at a
    /// time, returning the executed statements.
    ///
    /// The first rejected statement aborts the pass; no compensating
    /// statements are issued beyond what the caller's own transaction
    /// provides.
    pub async fn sync(
        &self,
        target: &SchemaSet,
        conn: &dyn Connection,
    ) -> Result<Vec<String>> {
        let statements = self.plan(target, conn).await?;
        for sql in &statements {
            tracing::debug!(sql = %sql, "executing");
            conn.execute(sql).await?;
        }
        Ok(statements)
    }
}

/// Pair every target table with its live counterpart, then every live
/// table that has no target as a pure drop.
fn pair_maps(target: &SchemaSet, live: &SchemaSet) -> Vec<EntityMappingPair> {
    let mut pairs: Vec<EntityMappingPair> = target
        .iter_tables()
        .map(|new| EntityMappingPair {
            new: Some(new.clone()),
            old: live.get_table(&new.table_name).cloned(),
        })
        .collect();

    for old in live.iter_tables() {
        if target.get_table(&old.table_name).is_none() {
            pairs.push(EntityMappingPair {
                new: None,
                old: Some(old.clone()),
            });
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_schema::EntityMap;

    #[test]
    fn test_pair_maps_covers_both_sides() {
        let target: SchemaSet = [EntityMap::new("kept"), EntityMap::new("created")]
            .into_iter()
            .collect();
        let live: SchemaSet = [EntityMap::new("kept"), EntityMap::new("dropped")]
            .into_iter()
            .collect();

        let pairs = pair_maps(&target, &live);
        assert_eq!(pairs.len(), 3);

        let kept = pairs.iter().find(|p| p.table_name() == "kept").unwrap();
        assert!(kept.new.is_some() && kept.old.is_some());

        let created = pairs.iter().find(|p| p.table_name() == "created").unwrap();
        assert!(created.new.is_some() && created.old.is_none());

        let dropped = pairs.iter().find(|p| p.table_name() == "dropped").unwrap();
        assert!(dropped.new.is_none() && dropped.old.is_some());
    }
}
