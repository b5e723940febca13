//! Backend capability descriptions.
//!
//! A [`Backend`] is a plain value describing what DDL a target engine can
//! express and how it renders identifiers and types. There is no type
//! hierarchy: each backend is a data value plus a small set of pure
//! functions, passed explicitly into the introspector, differ and
//! generator.

use tabula_schema::{ColumnDef, ColumnType};

/// Identifier quoting styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `"name"`, embedded quotes doubled
    DoubleQuote,
    /// `[name]`
    Bracket,
}

/// What a target database engine supports, and how it renders things.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Backend name, for logging
    pub name: &'static str,
    /// Identifier quoting style
    pub quote_style: QuoteStyle,
    /// Whether the underlying column type is loosely enforced.
    ///
    /// Loose backends declare one base type per storage class (all
    /// integer-like categories collapse to it); whether a declared type
    /// "changed" is judged against those base types, not the logical
    /// categories.
    pub loose_types: bool,
    /// Whether `ALTER TABLE .. ALTER COLUMN` is available
    pub supports_alter_column: bool,
    /// Whether `ALTER TABLE .. DROP COLUMN` is available
    pub supports_drop_column: bool,
    /// Whether constraints can be added/dropped after table creation
    pub supports_add_drop_constraint: bool,
    /// Whether constraints can be declared inline at creation time
    pub supports_create_table_with_constraints: bool,
    /// Statements suspending cross-table integrity enforcement for the pass
    pub guard_before: &'static [&'static str],
    /// Statements re-validating and resuming enforcement after the pass
    pub guard_after: &'static [&'static str],
    /// Pure mapping from logical category to this backend's type name
    pub base_type: fn(ColumnType) -> &'static str,
    /// Inverse mapping, for introspection of declared type names
    pub type_from_name: fn(&str) -> ColumnType,
}

impl Backend {
    /// The SQLite capability.
    ///
    /// SQLite cannot alter or drop columns, nor add or drop constraints on
    /// an existing table; anything beyond adding a column or an index goes
    /// through the copy/rename rebuild path. Types are loosely enforced
    /// and collapse to the INTEGER/REAL/TEXT/BLOB storage classes.
    pub const fn sqlite() -> Self {
        Self {
            name: "sqlite",
            quote_style: QuoteStyle::DoubleQuote,
            loose_types: true,
            supports_alter_column: false,
            supports_drop_column: false,
            supports_add_drop_constraint: false,
            supports_create_table_with_constraints: true,
            guard_before: &["PRAGMA foreign_keys=OFF"],
            guard_after: &["PRAGMA foreign_key_check", "PRAGMA foreign_keys=ON"],
            base_type: sqlite_base_type,
            type_from_name: sqlite_type_from_name,
        }
    }

    /// Map a logical type category to this backend's type name.
    pub fn base_type(&self, ty: ColumnType) -> &'static str {
        (self.base_type)(ty)
    }

    /// The inverse of [`base_type`](Self::base_type): infer a logical
    /// category from a declared type name found in catalog metadata.
    pub fn type_from_name(&self, declared: &str) -> ColumnType {
        (self.type_from_name)(declared)
    }

    /// Render the full declared type for a column definition.
    pub fn type_name(&self, col: &ColumnDef) -> String {
        if col.nullable {
            self.base_type(col.ty).to_string()
        } else {
            format!("{} NOT NULL", self.base_type(col.ty))
        }
    }

    /// Quote an identifier for this backend.
    pub fn quote_ident(&self, name: &str) -> String {
        match self.quote_style {
            QuoteStyle::DoubleQuote => {
                let mut out = String::with_capacity(name.len() + 2);
                out.push('"');
                for c in name.chars() {
                    if c == '"' {
                        out.push('"');
                    }
                    out.push(c);
                }
                out.push('"');
                out
            }
            QuoteStyle::Bracket => format!("[{}]", name),
        }
    }

    /// Whether two columns declare the same type under this backend.
    ///
    /// On a loose-types backend, categories sharing a storage class are
    /// not distinguishable, so retyping between them is not a change.
    pub fn same_declared_type(&self, a: ColumnType, b: ColumnType) -> bool {
        if self.loose_types {
            self.base_type(a) == self.base_type(b)
        } else {
            a == b
        }
    }
}

fn sqlite_base_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Real | ColumnType::Double | ColumnType::Decimal => "REAL",
        ColumnType::Boolean
        | ColumnType::SmallInt
        | ColumnType::Integer
        | ColumnType::BigInt => "INTEGER",
        ColumnType::Binary => "BLOB",
        ColumnType::Text | ColumnType::Timestamp | ColumnType::Uuid => "TEXT",
    }
}

/// Declared names map back to one representative category per storage
/// class; the widest, since the storage class does not record width.
fn sqlite_type_from_name(declared: &str) -> ColumnType {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" => ColumnType::BigInt,
        "REAL" => ColumnType::Double,
        "BLOB" => ColumnType::Binary,
        _ => ColumnType::Text,
    }
}
