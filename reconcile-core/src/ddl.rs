//! MySQL DDL rendering.
//!
//! [`AlterTable`] owns quoting and the text of every statement; [`DdlBlock`]
//! collects statements for one table, tags each with the logical change it
//! belongs to, and is the single place that orders a drop before its add.

use serde::Serialize;

use crate::db::{qualified, quote_ident, quote_literal};
use crate::differ::{ColumnAction, ConstraintAction, TableClassification};
use crate::schema::{Column, ForeignKeyEntry};

/// What part of the table a statement changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Column,
    PrimaryKey,
    Unique,
    ForeignKey,
}

/// One emitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// Part of the table the statement changes.
    pub kind: ChangeKind,
    /// Index of the logical change this statement belongs to. A drop and the
    /// add that replaces it share a unit.
    pub unit: usize,
    /// Statement text, terminated by `;`.
    pub sql: String,
}

/// Render a column definition: name, type, nullability, default and extra.
pub fn column_definition(column: &Column) -> String {
    let mut def = format!("{} {}", quote_ident(&column.name), column.column_type);
    def.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
    if let Some(ref default) = column.default {
        def.push_str(" DEFAULT ");
        def.push_str(&quote_literal(default));
    }
    if let Some(extra) = render_extra(&column.extra) {
        def.push(' ');
        def.push_str(&extra);
    }
    def
}

/// `EXTRA` as it can appear in a column definition.
///
/// MySQL 8 reports `DEFAULT_GENERATED` for expression defaults; it is a
/// catalog marker, not valid DDL.
fn render_extra(extra: &str) -> Option<String> {
    let parts: Vec<&str> = extra
        .split_whitespace()
        .filter(|p| !p.eq_ignore_ascii_case("DEFAULT_GENERATED"))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn column_list(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(",")
}

/// Statement builder for `ALTER TABLE` on one qualified table.
pub struct AlterTable {
    target: String,
}

impl AlterTable {
    /// Builder targeting `` `schema`.`table` ``.
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            target: qualified(schema, table),
        }
    }

    fn statement(&self, clause: &str) -> String {
        format!("ALTER TABLE {} {};", self.target, clause)
    }

    pub fn add_column(&self, column: &Column) -> String {
        self.statement(&format!("ADD COLUMN {}", column_definition(column)))
    }

    pub fn modify_column(&self, column: &Column) -> String {
        self.statement(&format!("MODIFY COLUMN {}", column_definition(column)))
    }

    pub fn drop_primary_key(&self) -> String {
        self.statement("DROP PRIMARY KEY")
    }

    pub fn add_primary_key(&self, columns: &[String]) -> String {
        self.statement(&format!("ADD PRIMARY KEY ({})", column_list(columns)))
    }

    pub fn drop_index(&self, name: &str) -> String {
        self.statement(&format!("DROP INDEX {}", quote_ident(name)))
    }

    pub fn add_unique(&self, name: &str, columns: &[String]) -> String {
        self.statement(&format!(
            "ADD UNIQUE {} ({})",
            quote_ident(name),
            column_list(columns)
        ))
    }

    pub fn drop_foreign_key(&self, name: &str) -> String {
        self.statement(&format!("DROP FOREIGN KEY {}", quote_ident(name)))
    }

    /// `ADD CONSTRAINT ... FOREIGN KEY ... REFERENCES`.
    ///
    /// The referenced schema and table come from the first entry; the
    /// referenced schema falls back to `fallback_schema` when the catalog did
    /// not record one.
    pub fn add_foreign_key(&self, name: &str, entries: &[ForeignKeyEntry], fallback_schema: &str) -> String {
        let (ref_schema, ref_table) = match entries.first() {
            Some(first) => (
                first.ref_schema.as_deref().unwrap_or(fallback_schema),
                first.ref_table.as_str(),
            ),
            None => (fallback_schema, ""),
        };
        let local: Vec<String> = entries.iter().map(|e| e.column.clone()).collect();
        let referenced: Vec<String> = entries.iter().map(|e| e.ref_column.clone()).collect();
        self.statement(&format!(
            "ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
            quote_ident(name),
            column_list(&local),
            qualified(ref_schema, ref_table),
            column_list(&referenced)
        ))
    }
}

/// Header comment and statements for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlBlock {
    /// `-- ` comment naming source and destination.
    pub header: String,
    /// Statements in execution order.
    pub statements: Vec<Statement>,
    #[serde(skip)]
    next_unit: usize,
}

impl DdlBlock {
    /// Empty block for syncing `table` from `src_schema` to `dst_schema`.
    pub fn new(table: &str, src_schema: &str, dst_schema: &str) -> Self {
        Self {
            header: format!(
                "-- Command to sync table {} from {} → {}",
                quote_ident(table),
                quote_ident(src_schema),
                quote_ident(dst_schema)
            ),
            statements: Vec::new(),
            next_unit: 0,
        }
    }

    /// Append a statement that is a logical change of its own.
    pub fn push(&mut self, kind: ChangeKind, sql: String) {
        let unit = self.next_unit;
        self.next_unit += 1;
        self.statements.push(Statement { kind, unit, sql });
    }

    /// Append one logical change made of an optional drop and an optional add.
    ///
    /// The drop is always emitted first. Nothing is recorded when both are `None`.
    pub fn push_replacement(&mut self, kind: ChangeKind, drop: Option<String>, add: Option<String>) {
        if drop.is_none() && add.is_none() {
            return;
        }
        let unit = self.next_unit;
        self.next_unit += 1;
        for sql in drop.into_iter().chain(add) {
            self.statements.push(Statement { kind, unit, sql });
        }
    }

    /// Statements plus the header line.
    pub fn statement_count(&self) -> usize {
        self.statements.len() + 1
    }

    /// True when only the header would be rendered.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements of one kind.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(move |s| s.kind == kind)
    }

    /// Number of distinct logical changes of one kind.
    pub fn units(&self, kind: ChangeKind) -> usize {
        let mut units: Vec<usize> = self.of_kind(kind).map(|s| s.unit).collect();
        units.dedup();
        units.len()
    }

    /// Header and statements joined by newlines.
    pub fn render(&self) -> String {
        let mut out = self.header.clone();
        for statement in &self.statements {
            out.push('\n');
            out.push_str(&statement.sql);
        }
        out
    }
}

/// Generate the DDL that brings `dst_schema`.`table` in line with the source.
///
/// Order: columns, primary key, unique constraints, foreign keys. Within each
/// constraint group the classification order is kept.
pub fn generate(
    table: &str,
    src_schema: &str,
    dst_schema: &str,
    classification: &TableClassification,
) -> DdlBlock {
    let alter = AlterTable::new(dst_schema, table);
    let mut block = DdlBlock::new(table, src_schema, dst_schema);

    for comparison in &classification.columns {
        match (comparison.action, comparison.from.as_ref()) {
            (ColumnAction::Add, Some(column)) => {
                block.push(ChangeKind::Column, alter.add_column(column));
            }
            (ColumnAction::Modify, Some(column)) => {
                block.push(ChangeKind::Column, alter.modify_column(column));
            }
            _ => {}
        }
    }

    if let Some(ref pk) = classification.primary_key {
        block.push_replacement(
            ChangeKind::PrimaryKey,
            (!pk.to.is_empty()).then(|| alter.drop_primary_key()),
            (!pk.from.is_empty()).then(|| alter.add_primary_key(&pk.from)),
        );
    }

    for change in &classification.unique {
        let drop = matches!(change.action, ConstraintAction::Recreate | ConstraintAction::Drop)
            .then(|| alter.drop_index(&change.name));
        let add = matches!(change.action, ConstraintAction::Add | ConstraintAction::Recreate)
            .then(|| alter.add_unique(&change.name, &change.columns));
        block.push_replacement(ChangeKind::Unique, drop, add);
    }

    for change in &classification.foreign_keys {
        let drop = matches!(change.action, ConstraintAction::Recreate | ConstraintAction::Drop)
            .then(|| alter.drop_foreign_key(&change.name));
        let add = matches!(change.action, ConstraintAction::Add | ConstraintAction::Recreate)
            .then(|| alter.add_foreign_key(&change.name, &change.entries, src_schema));
        block.push_replacement(ChangeKind::ForeignKey, drop, add);
    }

    block
}
