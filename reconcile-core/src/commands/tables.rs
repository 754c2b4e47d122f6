//! Compare the table sets of the two sides of a pair.

use serde::Serialize;

use crate::error::Result;
use crate::metadata::MetadataReader;
use crate::tableset::compare_sets;

/// Report produced by the tables command.
#[derive(Debug, Serialize)]
pub struct TablesReport {
    pub from_schema: String,
    pub to_schema: String,
    /// In both, in "from" order.
    pub in_both: Vec<String>,
    /// Only on the "to" side.
    pub missing_in_from: Vec<String>,
    /// Only on the "from" side.
    pub missing_in_to: Vec<String>,
}

impl TablesReport {
    /// True when both sides hold the same tables.
    pub fn is_aligned(&self) -> bool {
        self.missing_in_from.is_empty() && self.missing_in_to.is_empty()
    }
}

/// Execute the tables command.
pub async fn execute(from: &dyn MetadataReader, to: &dyn MetadataReader) -> Result<TablesReport> {
    let (from_names, to_names) = tokio::try_join!(from.table_names(), to.table_names())?;
    let sets = compare_sets(&from_names, &to_names);

    Ok(TablesReport {
        from_schema: from.schema().to_string(),
        to_schema: to.schema().to_string(),
        in_both: sets.common,
        missing_in_from: sets.missing_in_src,
        missing_in_to: sets.missing_in_dst,
    })
}
