//! Order-independent foreign key signatures.

use crate::schema::ForeignKeyEntry;

/// Canonical string for the columns of one foreign key constraint.
///
/// Entries are stable-sorted by local column and rendered as
/// `column->ref_table(ref_column)`, joined by `|`. The referenced schema is
/// left out so the same constraint in differently named environments compares
/// equal.
pub fn fk_signature(entries: &[ForeignKeyEntry]) -> String {
    let mut sorted: Vec<&ForeignKeyEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.column.cmp(&b.column));

    sorted
        .iter()
        .map(|e| format!("{}->{}({})", e.column, e.ref_table, e.ref_column))
        .collect::<Vec<_>>()
        .join("|")
}
