//! Reconcile one schema towards another and collect the DDL.
//!
//! A single pass: list both sides, create statements for tables the
//! destination lacks, then diff the selected common tables in source catalog
//! order. Nothing is written to either database.

use serde::Serialize;

use crate::commands::missing::{create_blocks, MissingTableDdl};
use crate::commands::TableFailure;
use crate::differ::{diff_table, FkChangeCounting, TableDiffResult};
use crate::error::{Result, ReconcileError};
use crate::metadata::{fetch_table_snapshot, MetadataReader};
use crate::schema::Direction;
use crate::tableset::{compare_sets, MissingTable};

/// Which common tables to diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelection {
    /// Every table present on both sides.
    All,
    /// The named tables, in the order given.
    Only(Vec<String>),
}

impl TableSelection {
    /// Selection from user-supplied names.
    ///
    /// Names are trimmed; blanks and duplicates are dropped. An empty result
    /// is [`ReconcileError::EmptyTableSelection`].
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !selected.iter().any(|s| s == name) {
                selected.push(name.to_string());
            }
        }
        if selected.is_empty() {
            return Err(ReconcileError::EmptyTableSelection);
        }
        Ok(TableSelection::Only(selected))
    }

    fn includes(&self, table: &str) -> bool {
        match self {
            TableSelection::All => true,
            TableSelection::Only(names) => names.iter().any(|n| n == table),
        }
    }
}

/// Report produced by the reconcile command.
#[derive(Debug, Serialize)]
pub struct ReconciliationReport {
    pub label: String,
    pub direction: Direction,
    pub source_schema: String,
    pub destination_schema: String,
    /// Tables present on both sides.
    pub common_table_count: usize,
    /// Tables the destination lacks; their create statements lead the DDL.
    pub missing_tables: Vec<MissingTable>,
    /// Tables only the destination has. Reported, never dropped.
    pub missing_in_source: Vec<String>,
    /// One entry per diffed table, in source catalog order.
    pub results: Vec<TableDiffResult>,
    pub failures: Vec<TableFailure>,
    pub tables_changed: usize,
    pub tables_unchanged: usize,
    /// Statements across all diffed tables, headers excluded.
    pub total_statements: usize,
    /// Missing-table creates, then blocks of changed tables, blank-line separated.
    pub ddl: String,
}

impl ReconciliationReport {
    /// True when applying the DDL would change the destination.
    pub fn has_changes(&self) -> bool {
        !self.missing_tables.is_empty() || self.tables_changed > 0
    }
}

/// Execute the reconcile command.
///
/// `from` and `to` are the configured sides; `direction` decides which one is
/// the source. Failing to list either side's tables aborts; any other failure
/// is recorded against its table.
pub async fn execute(
    from: &dyn MetadataReader,
    to: &dyn MetadataReader,
    label: &str,
    direction: Direction,
    selection: &TableSelection,
    counting: FkChangeCounting,
) -> Result<ReconciliationReport> {
    let (src, dst) = direction.orient(from, to);
    let (src_names, dst_names) = tokio::try_join!(src.table_names(), dst.table_names())?;
    let sets = compare_sets(&src_names, &dst_names);

    log::info!(
        "Reconciling schemas; label={}, direction={}, source={}, destination={}, common={}, missing={}",
        label,
        direction,
        src.schema(),
        dst.schema(),
        sets.common.len(),
        sets.missing_in_dst.len()
    );

    let (missing, mut failures) = create_blocks(src, dst.schema(), &sets.missing_in_dst).await;

    let mut results = Vec::new();
    for table in sets.common.iter().filter(|t| selection.includes(t)) {
        let snapshots = tokio::try_join!(
            fetch_table_snapshot(src, table),
            fetch_table_snapshot(dst, table),
        );
        match snapshots {
            Ok((src_table, dst_table)) => results.push(diff_table(
                table,
                src.schema(),
                &src_table,
                dst.schema(),
                &dst_table,
                counting,
            )),
            Err(e) => failures.push(TableFailure::new(table, &e)),
        }
    }

    if let TableSelection::Only(names) = selection {
        for name in names.iter().filter(|n| !sets.common.contains(n)) {
            let schema = if src_names.contains(name) { dst.schema() } else { src.schema() };
            let err = ReconcileError::TableNotFound {
                schema: schema.to_string(),
                table: name.clone(),
            };
            failures.push(TableFailure::new(name, &err));
        }
    }

    Ok(assemble(
        label,
        direction,
        src.schema(),
        dst.schema(),
        sets.common.len(),
        missing,
        sets.missing_in_src,
        results,
        failures,
    ))
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    label: &str,
    direction: Direction,
    source_schema: &str,
    destination_schema: &str,
    common_table_count: usize,
    missing: Vec<MissingTableDdl>,
    missing_in_source: Vec<String>,
    results: Vec<TableDiffResult>,
    failures: Vec<TableFailure>,
) -> ReconciliationReport {
    let tables_changed = results.iter().filter(|r| r.changed).count();
    let total_statements = results.iter().map(|r| r.change_statements()).sum();

    let ddl = missing
        .iter()
        .map(|m| m.ddl.as_str())
        .chain(results.iter().filter(|r| r.changed).map(|r| r.ddl.as_str()))
        .collect::<Vec<_>>()
        .join("\n\n");

    ReconciliationReport {
        label: label.to_string(),
        direction,
        source_schema: source_schema.to_string(),
        destination_schema: destination_schema.to_string(),
        common_table_count,
        missing_tables: missing.into_iter().map(|m| m.table).collect(),
        missing_in_source,
        tables_unchanged: results.len() - tables_changed,
        tables_changed,
        total_statements,
        results,
        failures,
        ddl,
    }
}
