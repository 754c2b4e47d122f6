//! Structural comparison of one table between a source and a destination.
//!
//! [`classify`] decides what differs; [`diff_table`] turns that into DDL via
//! [`crate::ddl::generate`] and derives every counter from the emitted
//! statements, so the numbers can never disagree with the SQL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ddl::{self, ChangeKind, DdlBlock};
use crate::error::ReconcileError;
use crate::schema::{Column, ForeignKeyEntry, TableSnapshot};
use crate::signature::fk_signature;

/// How a modified foreign key is counted in `fk_changes`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkChangeCounting {
    /// One per logical change; a drop-and-recreate counts once.
    #[default]
    Logical,
    /// One per emitted statement; a drop-and-recreate counts twice.
    Statement,
}

impl FromStr for FkChangeCounting {
    type Err = ReconcileError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logical" => Ok(FkChangeCounting::Logical),
            "statement" | "statements" => Ok(FkChangeCounting::Statement),
            _ => Err(ReconcileError::ConfigError(format!(
                "Invalid fk_change_counting '{}'. Use 'logical' or 'statement'.",
                s
            ))),
        }
    }
}

impl fmt::Display for FkChangeCounting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FkChangeCounting::Logical => write!(f, "logical"),
            FkChangeCounting::Statement => write!(f, "statement"),
        }
    }
}

/// What happens to one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAction {
    /// Same definition on both sides.
    Unchanged,
    /// Only in the source; added to the destination.
    Add,
    /// In both with a different definition; the destination is modified.
    Modify,
    /// Only in the destination; left alone.
    DestinationOnly,
}

/// One row of the column-by-column comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnComparison {
    /// Column name, as spelled on whichever side has it.
    pub name: String,
    /// Definition on the source side.
    pub from: Option<Column>,
    /// Definition on the destination side.
    pub to: Option<Column>,
    /// What the generated DDL does with this column.
    pub action: ColumnAction,
}

/// What happens to a named constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintAction {
    /// Missing on the destination.
    Add,
    /// Present on both sides with a different definition.
    Recreate,
    /// Only on the destination.
    Drop,
}

/// Primary key difference: source key and destination key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeyChange {
    /// Source key columns in key order; empty when the source has no key.
    pub from: Vec<String>,
    /// Destination key columns in key order; empty when it has no key.
    pub to: Vec<String>,
}

/// A unique constraint change on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueChange {
    /// Constraint (index) name.
    pub name: String,
    pub action: ConstraintAction,
    /// Source columns; empty for a drop.
    pub columns: Vec<String>,
}

/// A foreign key change on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyChange {
    /// Constraint name.
    pub name: String,
    pub action: ConstraintAction,
    /// Source entries; empty for a drop.
    pub entries: Vec<ForeignKeyEntry>,
}

/// Everything that differs between two snapshots of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableClassification {
    /// Union of column names: source order, then destination-only columns.
    pub columns: Vec<ColumnComparison>,
    pub primary_key: Option<PrimaryKeyChange>,
    /// Source constraints first (by name), then destination-only drops.
    pub unique: Vec<UniqueChange>,
    /// Same ordering as `unique`.
    pub foreign_keys: Vec<ForeignKeyChange>,
}

/// Compare a source snapshot against a destination snapshot.
pub fn classify(src: &TableSnapshot, dst: &TableSnapshot) -> TableClassification {
    let mut columns = Vec::with_capacity(src.columns.len());
    for from in &src.columns {
        let to = dst.column(&from.name);
        let action = match to {
            None => ColumnAction::Add,
            Some(to) if from.differs_from(to) => ColumnAction::Modify,
            Some(_) => ColumnAction::Unchanged,
        };
        columns.push(ColumnComparison {
            name: from.name.clone(),
            from: Some(from.clone()),
            to: to.cloned(),
            action,
        });
    }
    for to in &dst.columns {
        if src.column(&to.name).is_none() {
            columns.push(ColumnComparison {
                name: to.name.clone(),
                from: None,
                to: Some(to.clone()),
                action: ColumnAction::DestinationOnly,
            });
        }
    }

    let primary_key = (src.primary_key != dst.primary_key).then(|| PrimaryKeyChange {
        from: src.primary_key.clone(),
        to: dst.primary_key.clone(),
    });

    let mut unique = Vec::new();
    for (name, cols) in &src.unique_constraints {
        let action = match dst.unique_constraints.get(name) {
            None => Some(ConstraintAction::Add),
            Some(dst_cols) if dst_cols != cols => Some(ConstraintAction::Recreate),
            Some(_) => None,
        };
        if let Some(action) = action {
            unique.push(UniqueChange {
                name: name.clone(),
                action,
                columns: cols.clone(),
            });
        }
    }
    for name in dst.unique_constraints.keys() {
        if !src.unique_constraints.contains_key(name) {
            unique.push(UniqueChange {
                name: name.clone(),
                action: ConstraintAction::Drop,
                columns: Vec::new(),
            });
        }
    }

    let mut foreign_keys = Vec::new();
    for (name, entries) in &src.foreign_keys {
        let action = match dst.foreign_keys.get(name) {
            None => Some(ConstraintAction::Add),
            Some(dst_entries) if fk_signature(dst_entries) != fk_signature(entries) => {
                Some(ConstraintAction::Recreate)
            }
            Some(_) => None,
        };
        if let Some(action) = action {
            foreign_keys.push(ForeignKeyChange {
                name: name.clone(),
                action,
                entries: entries.clone(),
            });
        }
    }
    for name in dst.foreign_keys.keys() {
        if !src.foreign_keys.contains_key(name) {
            foreign_keys.push(ForeignKeyChange {
                name: name.clone(),
                action: ConstraintAction::Drop,
                entries: Vec::new(),
            });
        }
    }

    TableClassification {
        columns,
        primary_key,
        unique,
        foreign_keys,
    }
}

/// Outcome of diffing one table in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDiffResult {
    pub table: String,
    /// Column-by-column comparison over the union of names.
    pub columns: Vec<ColumnComparison>,
    pub column_changes: usize,
    /// 0 or 1.
    pub pk_changes: usize,
    pub unique_changes: usize,
    pub fk_changes: usize,
    /// Emitted statements including the header line.
    pub sql_statement_count: usize,
    pub changed: bool,
    /// Header plus statements, newline separated.
    pub ddl: String,
}

impl TableDiffResult {
    /// Statements excluding the header.
    pub fn change_statements(&self) -> usize {
        self.sql_statement_count.saturating_sub(1)
    }
}

/// Counters derived from an emitted block.
fn count(block: &DdlBlock, counting: FkChangeCounting) -> (usize, usize, usize, usize) {
    let column_changes = block.of_kind(ChangeKind::Column).count();
    let pk_changes = block.units(ChangeKind::PrimaryKey).min(1);
    let unique_changes = block.units(ChangeKind::Unique);
    let fk_changes = match counting {
        FkChangeCounting::Logical => block.units(ChangeKind::ForeignKey),
        FkChangeCounting::Statement => block.of_kind(ChangeKind::ForeignKey).count(),
    };
    (column_changes, pk_changes, unique_changes, fk_changes)
}

/// Diff `table` from `src_schema` to `dst_schema`.
pub fn diff_table(
    table: &str,
    src_schema: &str,
    src: &TableSnapshot,
    dst_schema: &str,
    dst: &TableSnapshot,
    counting: FkChangeCounting,
) -> TableDiffResult {
    let classification = classify(src, dst);
    let block = ddl::generate(table, src_schema, dst_schema, &classification);
    let (column_changes, pk_changes, unique_changes, fk_changes) = count(&block, counting);
    let sql_statement_count = block.statement_count();

    log::debug!(
        "Diffed table; table={}, source={}, destination={}, statements={}",
        table,
        src_schema,
        dst_schema,
        sql_statement_count - 1
    );

    TableDiffResult {
        table: table.to_string(),
        columns: classification.columns,
        column_changes,
        pk_changes,
        unique_changes,
        fk_changes,
        sql_statement_count,
        changed: sql_statement_count > 1,
        ddl: block.render(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeys, UniqueConstraints};

    fn col(name: &str, ty: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ty.to_string(),
            nullable: false,
            default: None,
            extra: String::new(),
        }
    }

    fn fk(column: &str, ref_table: &str, ref_column: &str) -> ForeignKeyEntry {
        ForeignKeyEntry {
            column: column.to_string(),
            ref_schema: Some("shop_staging".to_string()),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn users() -> TableSnapshot {
        let mut unique = UniqueConstraints::new();
        unique.insert("uq_email".to_string(), names(&["email"]));
        TableSnapshot {
            columns: vec![col("id", "int"), col("email", "varchar(255)"), col("org_id", "int")],
            primary_key: names(&["id"]),
            unique_constraints: unique,
            foreign_keys: ForeignKeys::new(),
        }
    }

    fn diff(src: &TableSnapshot, dst: &TableSnapshot) -> TableDiffResult {
        diff_table("users", "shop_staging", src, "shop_eu", dst, FkChangeCounting::Logical)
    }

    fn statements(result: &TableDiffResult) -> Vec<&str> {
        result.ddl.lines().skip(1).collect()
    }

    // ── idempotence ──

    #[test]
    fn test_identical_snapshots_produce_header_only() {
        let result = diff(&users(), &users());
        assert_eq!(result.sql_statement_count, 1);
        assert!(!result.changed);
        assert_eq!(result.column_changes, 0);
        assert_eq!(result.pk_changes, 0);
        assert_eq!(result.unique_changes, 0);
        assert_eq!(result.fk_changes, 0);
        assert_eq!(
            result.ddl,
            "-- Command to sync table `users` from `shop_staging` → `shop_eu`"
        );
    }

    // ── columns ──

    #[test]
    fn test_varchar_length_change_modifies_column() {
        let src = users();
        let mut dst = users();
        dst.columns[1] = col("email", "varchar(191)");

        let result = diff(&src, &dst);
        assert_eq!(result.column_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` MODIFY COLUMN `email` varchar(255) NOT NULL;"]
        );
        assert!(result.changed);
        assert_eq!(result.sql_statement_count, 2);
    }

    #[test]
    fn test_missing_column_is_added() {
        let src = users();
        let mut dst = users();
        dst.columns.remove(2);

        let result = diff(&src, &dst);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` ADD COLUMN `org_id` int NOT NULL;"]
        );
        assert_eq!(result.columns[2].action, ColumnAction::Add);
    }

    #[test]
    fn test_destination_only_column_is_never_dropped() {
        let src = users();
        let mut dst = users();
        dst.columns.push(col("legacy_flag", "tinyint(1)"));

        let result = diff(&src, &dst);
        assert!(!result.changed);
        assert!(!result.ddl.contains("DROP COLUMN"));
        let last = result.columns.last().unwrap();
        assert_eq!(last.name, "legacy_flag");
        assert_eq!(last.action, ColumnAction::DestinationOnly);
        assert!(last.from.is_none());
    }

    #[test]
    fn test_reverse_direction_never_drops_columns() {
        let src = users();
        let mut dst = users();
        dst.columns.remove(2);

        let result = diff(&dst, &src);
        assert!(!result.ddl.contains("DROP COLUMN"));
        assert!(!result.changed);
    }

    #[test]
    fn test_null_default_vs_empty_default_modifies() {
        let src = users();
        let mut dst = users();
        dst.columns[1].default = Some(String::new());

        let result = diff(&src, &dst);
        assert_eq!(result.column_changes, 1);
        assert_eq!(result.columns[1].action, ColumnAction::Modify);
    }

    #[test]
    fn test_comparison_union_order() {
        let src = users();
        let mut dst = users();
        dst.columns.insert(0, col("created_at", "datetime"));

        let result = diff(&src, &dst);
        let order: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["id", "email", "org_id", "created_at"]);
        assert_eq!(result.columns[3].action, ColumnAction::DestinationOnly);
    }

    // ── primary key ──

    #[test]
    fn test_primary_key_order_matters() {
        let mut src = users();
        src.primary_key = names(&["id", "org_id"]);
        let mut dst = users();
        dst.primary_key = names(&["org_id", "id"]);

        let result = diff(&src, &dst);
        assert_eq!(result.pk_changes, 1);
        assert_eq!(
            statements(&result),
            vec![
                "ALTER TABLE `shop_eu`.`users` DROP PRIMARY KEY;",
                "ALTER TABLE `shop_eu`.`users` ADD PRIMARY KEY (`id`,`org_id`);",
            ]
        );
    }

    #[test]
    fn test_primary_key_missing_on_destination_adds_only() {
        let src = users();
        let mut dst = users();
        dst.primary_key.clear();

        let result = diff(&src, &dst);
        assert_eq!(result.pk_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` ADD PRIMARY KEY (`id`);"]
        );
    }

    #[test]
    fn test_primary_key_missing_on_source_drops_only() {
        let mut src = users();
        src.primary_key.clear();
        let dst = users();

        let result = diff(&src, &dst);
        assert_eq!(result.pk_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` DROP PRIMARY KEY;"]
        );
    }

    // ── unique constraints ──

    #[test]
    fn test_unique_only_on_source_adds_once() {
        let src = users();
        let mut dst = users();
        dst.unique_constraints.clear();

        let result = diff(&src, &dst);
        assert_eq!(result.unique_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` ADD UNIQUE `uq_email` (`email`);"]
        );
    }

    #[test]
    fn test_unique_with_different_columns_is_recreated() {
        let src = users();
        let mut dst = users();
        dst.unique_constraints
            .insert("uq_email".to_string(), names(&["email", "org_id"]));

        let result = diff(&src, &dst);
        assert_eq!(result.unique_changes, 1);
        assert_eq!(
            statements(&result),
            vec![
                "ALTER TABLE `shop_eu`.`users` DROP INDEX `uq_email`;",
                "ALTER TABLE `shop_eu`.`users` ADD UNIQUE `uq_email` (`email`);",
            ]
        );
    }

    #[test]
    fn test_unique_only_on_destination_is_dropped_after_source_constraints() {
        let mut src = users();
        src.unique_constraints
            .insert("uq_org".to_string(), names(&["org_id"]));
        let mut dst = users();
        dst.unique_constraints.clear();
        dst.unique_constraints
            .insert("a_legacy".to_string(), names(&["email"]));

        let result = diff(&src, &dst);
        assert_eq!(result.unique_changes, 3);
        assert_eq!(
            statements(&result),
            vec![
                "ALTER TABLE `shop_eu`.`users` ADD UNIQUE `uq_email` (`email`);",
                "ALTER TABLE `shop_eu`.`users` ADD UNIQUE `uq_org` (`org_id`);",
                "ALTER TABLE `shop_eu`.`users` DROP INDEX `a_legacy`;",
            ]
        );
    }

    // ── foreign keys ──

    fn orders(entries: Vec<ForeignKeyEntry>) -> TableSnapshot {
        let mut foreign_keys = ForeignKeys::new();
        if !entries.is_empty() {
            foreign_keys.insert("fk_line".to_string(), entries);
        }
        TableSnapshot {
            columns: vec![col("order_id", "int"), col("line_no", "int")],
            primary_key: names(&["order_id", "line_no"]),
            unique_constraints: UniqueConstraints::new(),
            foreign_keys,
        }
    }

    #[test]
    fn test_foreign_key_entry_order_is_ignored() {
        let src = orders(vec![fk("order_id", "lines", "order_id"), fk("line_no", "lines", "line_no")]);
        let mut dst = orders(vec![fk("line_no", "lines", "line_no"), fk("order_id", "lines", "order_id")]);
        for entry in dst.foreign_keys.values_mut().flatten() {
            entry.ref_schema = Some("shop_eu".to_string());
        }

        let result = diff(&src, &dst);
        assert_eq!(result.fk_changes, 0);
        assert!(!result.changed);
    }

    #[test]
    fn test_foreign_key_missing_on_destination_is_added() {
        let src = orders(vec![fk("order_id", "orders", "id")]);
        let dst = orders(vec![]);

        let result = diff(&src, &dst);
        assert_eq!(result.fk_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` ADD CONSTRAINT `fk_line` FOREIGN KEY (`order_id`) REFERENCES `shop_staging`.`orders`(`id`);"]
        );
    }

    #[test]
    fn test_foreign_key_only_on_destination_is_dropped() {
        let src = orders(vec![]);
        let dst = orders(vec![fk("order_id", "orders", "id")]);

        let result = diff(&src, &dst);
        assert_eq!(result.fk_changes, 1);
        assert_eq!(
            statements(&result),
            vec!["ALTER TABLE `shop_eu`.`users` DROP FOREIGN KEY `fk_line`;"]
        );
    }

    #[test]
    fn test_modified_foreign_key_counting_policies() {
        let src = orders(vec![fk("order_id", "orders", "id")]);
        let dst = orders(vec![fk("order_id", "orders", "uuid")]);

        let logical = diff_table("users", "shop_staging", &src, "shop_eu", &dst, FkChangeCounting::Logical);
        let statement = diff_table("users", "shop_staging", &src, "shop_eu", &dst, FkChangeCounting::Statement);

        assert_eq!(logical.fk_changes, 1);
        assert_eq!(statement.fk_changes, 2);
        assert_eq!(logical.ddl, statement.ddl);
        assert_eq!(logical.sql_statement_count, 3);
        let stmts = statements(&logical);
        assert!(stmts[0].contains("DROP FOREIGN KEY `fk_line`"));
        assert!(stmts[1].contains("ADD CONSTRAINT `fk_line`"));
    }

    // ── ordering and direction ──

    #[test]
    fn test_statement_order_columns_pk_unique_fk() {
        let mut src = orders(vec![fk("order_id", "orders", "id")]);
        src.columns.push(col("sku", "varchar(32)"));
        src.unique_constraints
            .insert("uq_sku".to_string(), names(&["sku"]));
        let mut dst = orders(vec![]);
        dst.primary_key = names(&["order_id"]);

        let result = diff(&src, &dst);
        let stmts = statements(&result);
        assert_eq!(stmts.len(), 5);
        assert!(stmts[0].contains("ADD COLUMN `sku`"));
        assert!(stmts[1].contains("DROP PRIMARY KEY"));
        assert!(stmts[2].contains("ADD PRIMARY KEY"));
        assert!(stmts[3].contains("ADD UNIQUE `uq_sku`"));
        assert!(stmts[4].contains("ADD CONSTRAINT `fk_line`"));
        assert_eq!(result.sql_statement_count, 6);
    }

    #[test]
    fn test_constraint_difference_is_symmetric_but_ddl_is_not() {
        let a = users();
        let mut b = users();
        b.unique_constraints.clear();

        let ab = diff(&a, &b);
        let ba = diff(&b, &a);
        assert_eq!(ab.changed, ba.changed);
        assert!(ab.changed);
        assert_ne!(ab.ddl, ba.ddl);
        assert!(ab.ddl.contains("ADD UNIQUE"));
        assert!(ba.ddl.contains("DROP INDEX"));
    }

    #[test]
    fn test_counts_match_emitted_statements() {
        let mut src = users();
        src.columns.push(col("nickname", "varchar(64)"));
        src.primary_key = names(&["id", "org_id"]);
        let mut dst = users();
        dst.columns[1] = col("email", "text");
        dst.unique_constraints.insert("uq_old".to_string(), names(&["org_id"]));

        let result = diff(&src, &dst);
        let emitted = result.change_statements();
        assert_eq!(result.column_changes, 2);
        assert_eq!(result.pk_changes, 1);
        assert_eq!(result.unique_changes, 1);
        // column adds/modifies + pk drop/add + unique drop
        assert_eq!(emitted, 2 + 2 + 1);
        assert_eq!(result.changed, emitted > 0);
    }

    #[test]
    fn test_fk_counting_parse() {
        assert_eq!("logical".parse::<FkChangeCounting>().unwrap(), FkChangeCounting::Logical);
        assert_eq!("Statement".parse::<FkChangeCounting>().unwrap(), FkChangeCounting::Statement);
        assert!("both".parse::<FkChangeCounting>().is_err());
    }
}
