//! Create statements for tables that exist only in the source.

use serde::Serialize;

use crate::commands::TableFailure;
use crate::error::Result;
use crate::metadata::MetadataReader;
use crate::schema::Direction;
use crate::tableset::{compare_sets, missing_table_block, MissingTable};

/// DDL creating one missing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingTableDdl {
    #[serde(flatten)]
    pub table: MissingTable,
    pub ddl: String,
}

/// Report produced by the missing command.
#[derive(Debug, Serialize)]
pub struct MissingReport {
    pub direction: Direction,
    pub source_schema: String,
    pub destination_schema: String,
    /// Tables to create, in source catalog order.
    pub tables: Vec<MissingTableDdl>,
    pub failures: Vec<TableFailure>,
    /// Every block, blank-line separated.
    pub ddl: String,
}

/// Build create blocks for `tables`, reading definitions from `src`.
///
/// A table whose definition cannot be read becomes a failure entry.
pub(crate) async fn create_blocks(
    src: &dyn MetadataReader,
    dst_schema: &str,
    tables: &[String],
) -> (Vec<MissingTableDdl>, Vec<TableFailure>) {
    let mut blocks = Vec::with_capacity(tables.len());
    let mut failures = Vec::new();

    for table in tables {
        match src.create_statement(table).await {
            Ok(create_sql) => blocks.push(MissingTableDdl {
                ddl: missing_table_block(table, src.schema(), dst_schema, &create_sql),
                table: MissingTable {
                    table: table.clone(),
                    source_schema: src.schema().to_string(),
                    destination_schema: dst_schema.to_string(),
                },
            }),
            Err(e) => failures.push(TableFailure::new(table, &e)),
        }
    }

    (blocks, failures)
}

/// Execute the missing command: create statements for every table the
/// destination lacks, without diffing common tables.
pub async fn execute(
    from: &dyn MetadataReader,
    to: &dyn MetadataReader,
    direction: Direction,
) -> Result<MissingReport> {
    let (src, dst) = direction.orient(from, to);
    let (src_names, dst_names) = tokio::try_join!(src.table_names(), dst.table_names())?;
    let sets = compare_sets(&src_names, &dst_names);

    let (tables, failures) = create_blocks(src, dst.schema(), &sets.missing_in_dst).await;
    let ddl = tables
        .iter()
        .map(|t| t.ddl.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    Ok(MissingReport {
        direction,
        source_schema: src.schema().to_string(),
        destination_schema: dst.schema().to_string(),
        tables,
        failures,
        ddl,
    })
}
