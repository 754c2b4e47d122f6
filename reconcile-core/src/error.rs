//! Error types for reconciliation operations.

use thiserror::Error;

/// Extract the full error message from a sqlx::Error,
/// including the server error code that Display hides.
pub fn format_db_error(e: &sqlx::Error) -> String {
    if let Some(db_err) = e.as_database_error() {
        let mut msg = db_err.message().to_string();
        if let Some(code) = db_err.code() {
            msg.push_str(&format!("\n  Code: {}", code));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    if matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) {
        msg.push_str("\n  Note: No connection could be obtained from the pool. The server may be unreachable or overloaded.");
    }
    msg
}

/// All error types that reconciliation operations can produce.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A database query or connection operation failed outside the metadata path.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] sqlx::Error),

    /// A filesystem I/O operation failed (config, snapshots, SQL output files).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A catalog query failed for a schema (and table, when one was being read).
    #[error("Metadata unavailable for {}: {reason}", describe_target(.schema, .table.as_deref()))]
    MetadataUnavailable {
        schema: String,
        table: Option<String>,
        reason: String,
    },

    /// A table that had to exist on one side was not found there.
    #[error("Table `{schema}`.`{table}` not found")]
    TableNotFound { schema: String, table: String },

    /// The requested direction is neither `from_to` nor `to_from`.
    #[error("Invalid direction '{0}'. Use 'from_to' or 'to_from'.")]
    InvalidDirection(String),

    /// An explicit table selection resolved to no tables.
    #[error("No tables selected for comparison")]
    EmptyTableSelection,

    /// The requested connection pair is not configured.
    #[error("Connection pair '{id}' not found. Available: {available}")]
    PairNotFound { id: String, available: String },

    /// Applying DDL text to a destination schema failed.
    #[error("Executing DDL on `{schema}` failed: {reason}")]
    ExecutionFailed { schema: String, reason: String },

    /// Reading or writing a catalog snapshot failed.
    #[error("Snapshot error: {reason}")]
    SnapshotError { reason: String },

    /// The database connection was lost during an operation.
    #[error("Connection lost during {operation}: {detail}")]
    ConnectionLost { operation: String, detail: String },
}

fn describe_target(schema: &str, table: Option<&str>) -> String {
    match table {
        Some(table) => format!("`{}`.`{}`", schema, table),
        None => format!("schema `{}`", schema),
    }
}

impl ReconcileError {
    /// Wrap a driver error raised while reading catalog metadata.
    pub fn metadata(schema: &str, table: Option<&str>, err: sqlx::Error) -> Self {
        ReconcileError::MetadataUnavailable {
            schema: schema.to_string(),
            table: table.map(str::to_string),
            reason: format_db_error(&err),
        }
    }
}

/// Convenience type alias for `Result<T, ReconcileError>`.
pub type Result<T> = std::result::Result<T, ReconcileError>;
