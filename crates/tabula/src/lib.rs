//! Schema synchronization engine.
//!
//! Given a declared target schema (a set of [`EntityMap`]s produced by a
//! domain model) and a live database whose schema is unknown in advance,
//! tabula introspects the live schema into the same structural
//! representation, computes the structural differences, and emits a
//! correctly ordered, backend-safe sequence of DDL statements that
//! transforms the live schema into the target.
//!
//! The pipeline: introspect → diff → select strategy → generate → execute.
//! Changes are classified as breaking (may violate existing rows, such as
//! tightening nullability) or non-breaking; when a backend's limited ALTER
//! capability cannot express a change incrementally, the whole table is
//! rebuilt through a create-new / copy / drop-old / rename sequence, with
//! backend-wide guard statements suspending referential integrity
//! enforcement around the pass.
//!
//! # Example
//!
//! ```ignore
//! use tabula::{Backend, Synchronizer};
//!
//! let sync = Synchronizer::new(Backend::sqlite());
//!
//! // Dry-run: inspect the plan without touching the database.
//! let plan = sync.plan(&target, &conn).await?;
//! for sql in &plan {
//!     println!("{sql}");
//! }
//!
//! // Or apply it; re-running after success plans nothing.
//! sync.sync(&target, &conn).await?;
//! ```
//!
//! Connection acquisition, pooling and transaction policy stay with the
//! caller: the engine only needs a [`Connection`] that can execute SQL
//! text and return tabular results.

mod backend;
mod connection;
mod diff;
mod error;
mod generate;
mod introspect;
mod strategy;
mod sync;

pub use backend::{Backend, QuoteStyle};
pub use connection::{Connection, Row, Value};
pub use diff::{ChangeSet, EntityMappingPair, diff};
pub use error::Error;
pub use generate::{create_table_sql, generate};
pub use introspect::introspect;
pub use strategy::{Strategy, select_strategy};
pub use sync::Synchronizer;

// Re-export the entity model for convenience.
pub use tabula_schema::{
    ColumnDef, ColumnType, EntityMap, ForeignKeyDef, IndexDef, PrimaryKey, SchemaSet,
    UniqueKeyDef,
};

/// Result type for tabula operations.
pub type Result<T> = std::result::Result<T, Error>;
