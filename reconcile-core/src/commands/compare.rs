//! Structure comparison of a single table, in both directions.

use serde::Serialize;

use crate::differ::{diff_table, ColumnComparison, FkChangeCounting, TableDiffResult};
use crate::error::Result;
use crate::metadata::{fetch_table_snapshot, MetadataReader};
use crate::schema::Direction;

/// Report produced by the compare command.
#[derive(Debug, Serialize)]
pub struct CompareReport {
    pub table: String,
    pub from_schema: String,
    pub to_schema: String,
    /// Column-by-column view with the "from" side as source.
    pub columns: Vec<ColumnComparison>,
    /// DDL making "to" match "from".
    pub from_to: TableDiffResult,
    /// DDL making "from" match "to".
    pub to_from: TableDiffResult,
}

impl CompareReport {
    /// True when the table differs in either direction.
    pub fn differs(&self) -> bool {
        self.from_to.changed || self.to_from.changed
    }
}

/// Execute the compare command for one table present on both sides.
pub async fn execute(
    from: &dyn MetadataReader,
    to: &dyn MetadataReader,
    table: &str,
    counting: FkChangeCounting,
) -> Result<CompareReport> {
    let (from_table, to_table) = tokio::try_join!(
        fetch_table_snapshot(from, table),
        fetch_table_snapshot(to, table),
    )?;

    let diff = |direction: Direction| {
        let ((src, src_table), (dst, dst_table)) =
            direction.orient((from, &from_table), (to, &to_table));
        diff_table(table, src.schema(), src_table, dst.schema(), dst_table, counting)
    };
    let from_to = diff(Direction::FromTo);
    let to_from = diff(Direction::FromTo.reversed());

    Ok(CompareReport {
        table: table.to_string(),
        from_schema: from.schema().to_string(),
        to_schema: to.schema().to_string(),
        columns: from_to.columns.clone(),
        from_to,
        to_from,
    })
}
