//! Structural schema types for tabula.
//!
//! This crate contains the entity model shared between introspection
//! (rebuilding the live schema from catalog metadata) and synchronization
//! (diffing a target schema against the live one). It is pure data: no
//! connection handling, no SQL rendering.
//!
//! An [`EntityMap`] describes one table: its columns, primary key,
//! indexes, unique keys and foreign keys. A [`SchemaSet`] is the arena of
//! entity maps for one database, indexed by table name so that foreign
//! keys can be resolved across tables.

use indexmap::IndexMap;

/// Logical column type categories.
///
/// These are deliberately coarser than any one backend's type system: a
/// backend capability maps each category to a concrete type name, and the
/// introspector maps declared type names back to a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// BOOLEAN
    Boolean,
    /// 2-byte integer
    SmallInt,
    /// 4-byte integer
    Integer,
    /// 8-byte integer
    BigInt,
    /// 4-byte floating point
    Real,
    /// 8-byte floating point
    Double,
    /// Arbitrary-precision numeric
    Decimal,
    /// Character data
    Text,
    /// Binary data
    Binary,
    /// Timestamp
    Timestamp,
    /// UUID
    Uuid,
}

/// A column definition, owned by its [`EntityMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name (unique within the table)
    pub name: String,
    /// Logical type category
    pub ty: ColumnType,
    /// Whether the column allows NULL
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
        }
    }
}

/// A primary key constraint.
///
/// Introspection names these deterministically as `PK_<table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    /// Constraint name
    pub name: String,
    /// Member columns, in key order
    pub columns: Vec<String>,
}

/// A (non-unique) index.
///
/// Columns are weak references into the owning table, held by name.
/// Structural equality is over the ordered column sequence: two indexes
/// on `(a, b)` and `(b, a)` are different indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name
    pub name: String,
    /// Member columns, in ordinal order
    pub columns: Vec<String>,
}

impl IndexDef {
    /// Create a new index definition.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Structural comparison: same ordered column sequence.
    pub fn columns_match(&self, other: &IndexDef) -> bool {
        self.columns == other.columns
    }
}

/// A unique key constraint.
///
/// Structural equality is over the column *set*: unlike indexes, the
/// member order of a unique key does not change what it constrains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeyDef {
    /// Constraint name
    pub name: String,
    /// Member columns, in declaration order
    pub columns: Vec<String>,
}

impl UniqueKeyDef {
    /// Create a new unique key definition.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Structural comparison: same column set, any order.
    pub fn columns_match(&self, other: &UniqueKeyDef) -> bool {
        column_set_eq(&self.columns, &other.columns)
    }

    /// Whether this key covers exactly the given column set.
    pub fn covers(&self, columns: &[String]) -> bool {
        column_set_eq(&self.columns, columns)
    }
}

fn column_set_eq(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted: Vec<&str> = a.iter().map(String::as_str).collect();
    let mut b_sorted: Vec<&str> = b.iter().map(String::as_str).collect();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();
    a_sorted == b_sorted
}

/// A foreign key constraint.
///
/// `referenced_key` is a cross-entity reference: after introspection it
/// must structurally equal the canonical [`UniqueKeyDef`] owned by the
/// referenced table, never a freshly synthesized duplicate. Introspection
/// names foreign keys deterministically as `FK_<table>_<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Constraint name
    pub name: String,
    /// Local columns, in key order
    pub columns: Vec<String>,
    /// Referenced table name
    pub referenced_table: String,
    /// The unique key on the referenced table this key points at
    pub referenced_key: UniqueKeyDef,
}

impl ForeignKeyDef {
    /// Structural comparison: same local column sequence, same referenced
    /// table, same referenced column set. Names do not participate, so a
    /// caller-named key matches its introspected counterpart.
    pub fn structurally_eq(&self, other: &ForeignKeyDef) -> bool {
        self.columns == other.columns
            && self.referenced_table == other.referenced_table
            && self.referenced_key.columns_match(&other.referenced_key)
    }
}

/// The structural description of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMap {
    /// Table name
    pub table_name: String,
    /// Columns, in declaration order
    pub columns: Vec<ColumnDef>,
    /// Primary key, if any
    pub primary_key: Option<PrimaryKey>,
    /// Non-unique indexes
    pub indexes: Vec<IndexDef>,
    /// Unique keys
    pub unique_keys: Vec<UniqueKeyDef>,
    /// Foreign keys
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl EntityMap {
    /// Create an empty entity map for the given table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by name, case-insensitively.
    ///
    /// Only foreign key resolution uses this: catalog metadata may
    /// case-fold identifiers in foreign key listings while reporting
    /// column definitions verbatim.
    pub fn column_ci(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Find the canonical unique key covering exactly the given columns.
    pub fn unique_key_covering(&self, columns: &[String]) -> Option<&UniqueKeyDef> {
        self.unique_keys.iter().find(|uk| uk.covers(columns))
    }

    /// Whether the table already records an index with this column sequence.
    pub fn has_index_on(&self, columns: &[String]) -> bool {
        self.indexes.iter().any(|ix| ix.columns == columns)
    }

    /// Add an index unless a structurally identical one is already recorded.
    pub fn push_index_dedup(&mut self, index: IndexDef) {
        if !self.has_index_on(&index.columns) {
            self.indexes.push(index);
        }
    }

    /// Add a unique key unless one with the same column set is already recorded.
    pub fn push_unique_key_dedup(&mut self, key: UniqueKeyDef) {
        if self.unique_key_covering(&key.columns).is_none() {
            self.unique_keys.push(key);
        }
    }
}

/// A complete schema: the arena of entity maps for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSet {
    /// Tables, indexed by name
    pub tables: IndexMap<String, EntityMap>,
}

impl SchemaSet {
    /// Create a new empty schema set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&EntityMap> {
        self.tables.get(name)
    }

    /// Get a table by name, mutably.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut EntityMap> {
        self.tables.get_mut(name)
    }

    /// Insert a table, replacing any previous entry with the same name.
    pub fn insert(&mut self, map: EntityMap) {
        self.tables.insert(map.table_name.clone(), map);
    }

    /// Iterate over all tables in insertion order.
    pub fn iter_tables(&self) -> impl Iterator<Item = &EntityMap> {
        self.tables.values()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<EntityMap> for SchemaSet {
    fn from_iter<I: IntoIterator<Item = EntityMap>>(iter: I) -> Self {
        let mut set = SchemaSet::new();
        for map in iter {
            set.insert(map);
        }
        set
    }
}
