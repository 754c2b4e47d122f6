//! Command implementations: reconcile, tables, compare, missing, apply,
//! snapshot.

use serde::Serialize;

use crate::error::ReconcileError;

pub mod apply;
pub mod compare;
pub mod missing;
pub mod reconcile;
pub mod snapshot;
pub mod tables;

/// A table that could not be processed. The rest of the report is still produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table: String,
    pub error: String,
}

impl TableFailure {
    pub(crate) fn new(table: &str, err: &ReconcileError) -> Self {
        log::warn!("Table skipped; table={}, error={}", table, err);
        Self {
            table: table.to_string(),
            error: err.to_string(),
        }
    }
}
