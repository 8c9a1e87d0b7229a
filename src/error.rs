use thiserror::Error;

/// Convenience result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Error type returned by the loader and its collaborators.
///
/// Per-file variants (read, write, archive) are isolated by the driver; the
/// `RegistryUnavailable` and `LandingZoneUnavailable` variants abort an invocation.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV / TXT read error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Parquet read or write error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON error (source files, manifests, tracked schemas).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or unloadable configuration.
    #[error("config error: {message}")]
    Config { message: String },

    /// The table registry could not be listed. Fatal for the invocation.
    #[error("table registry unavailable for {namespace}: {message}")]
    RegistryUnavailable { namespace: String, message: String },

    /// The landing zone could not be listed. Fatal for the invocation.
    #[error("landing zone unavailable ({path}): {message}")]
    LandingZoneUnavailable { path: String, message: String },

    #[error("table not found: {table}")]
    TableNotFound { table: String },

    #[error("table already exists: {table}")]
    TableExists { table: String },

    /// The input does not have the shape a reader or writer expects.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A column's incoming type cannot be reconciled with the table's type.
    #[error("schema conflict on {table}.{column}: table has {existing}, batch has {incoming}")]
    SchemaConflict {
        table: String,
        column: String,
        existing: String,
        incoming: String,
    },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// A source path could not be mapped under the archive root.
    #[error("cannot derive archive path for {path}: {message}")]
    ArchivePath { path: String, message: String },
}

impl From<figment::Error> for LoaderError {
    fn from(err: figment::Error) -> Self {
        LoaderError::Config {
            message: err.to_string(),
        }
    }
}
