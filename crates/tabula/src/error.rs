use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("foreign key on {table} references missing table {referenced}")]
    MissingTable { table: String, referenced: String },

    #[error("unknown column {column} on table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("foreign key {name} on {table} has no matching unique key on {referenced}")]
    UnresolvedForeignKey {
        name: String,
        table: String,
        referenced: String,
    },

    #[error("malformed metadata: {0}")]
    Metadata(String),
}

impl Error {
    /// Wrap a driver error from the connection seam.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Database(Box::new(err))
    }
}
