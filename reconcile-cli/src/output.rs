//! Terminal output formatting for all reconcile commands.
//! Uses comfy-table for tabular output and colored for
//! change-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde::Serialize;

use reconcile_core::commands::TableFailure;
use reconcile_core::differ::{ColumnAction, ColumnComparison};
use reconcile_core::pair::PairSummary;
use reconcile_core::schema::Column;
use reconcile_core::{
    ApplyReport, CompareReport, MissingReport, ReconciliationReport, SnapshotInfo, SnapshotReport,
    TableDiffResult, TablesReport,
};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.into_iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Print any report as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => log::error!("Failed to serialize output: {}", e),
    }
}

/// Print configured connection pairs.
pub fn print_pairs(pairs: &[PairSummary]) {
    if pairs.is_empty() {
        println!("{}", "No connection pairs configured.".yellow());
        return;
    }

    let mut table = new_table(vec!["ID", "Label", "From", "To"]);
    for p in pairs {
        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.label),
            Cell::new(&p.from),
            Cell::new(&p.to),
        ]);
    }
    println!("{table}");
}

/// Print the table set comparison.
pub fn print_tables_report(report: &TablesReport) {
    println!(
        "{}",
        format!(
            "Tables: {} in both, {} missing in `{}`, {} missing in `{}`",
            report.in_both.len(),
            report.missing_in_from.len(),
            report.from_schema,
            report.missing_in_to.len(),
            report.to_schema
        )
        .bold()
    );

    if report.is_aligned() {
        println!("{}", "Both schemas have the same tables.".green());
        return;
    }

    for t in &report.missing_in_to {
        println!("  {} {} (only in `{}`)", "+".green(), t, report.from_schema);
    }
    for t in &report.missing_in_from {
        println!("  {} {} (only in `{}`)", "-".red(), t, report.to_schema);
    }
}

fn describe_column(column: Option<&Column>) -> String {
    let Some(c) = column else {
        return String::new();
    };
    let mut text = format!(
        "{} {}",
        c.column_type,
        if c.nullable { "NULL" } else { "NOT NULL" }
    );
    if let Some(default) = &c.default {
        text.push_str(&format!(" DEFAULT '{}'", default));
    }
    if !c.extra.is_empty() {
        text.push(' ');
        text.push_str(&c.extra);
    }
    text
}

fn format_action(action: ColumnAction) -> String {
    match action {
        ColumnAction::Unchanged => "=".dimmed().to_string(),
        ColumnAction::Add => "add".green().to_string(),
        ColumnAction::Modify => "modify".yellow().to_string(),
        ColumnAction::DestinationOnly => "extra".cyan().to_string(),
    }
}

fn print_columns(columns: &[ColumnComparison], from_schema: &str, to_schema: &str) {
    let mut table = new_table(vec!["Column", from_schema, to_schema, "Action"]);
    for c in columns {
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(describe_column(c.from.as_ref())),
            Cell::new(describe_column(c.to.as_ref())),
            Cell::new(format_action(c.action)),
        ]);
    }
    println!("{table}");
}

fn print_diff_counts(result: &TableDiffResult) {
    println!(
        "  columns {}, primary key {}, unique {}, foreign keys {}, statements {}",
        result.column_changes,
        result.pk_changes,
        result.unique_changes,
        result.fk_changes,
        result.sql_statement_count
    );
}

/// Print a single-table comparison.
pub fn print_compare_report(report: &CompareReport) {
    println!("{}", format!("Table `{}`", report.table).bold());
    print_columns(&report.columns, &report.from_schema, &report.to_schema);

    if !report.differs() {
        println!("{}", "Structures are identical.".green().bold());
        return;
    }

    for (label, result) in [
        (format!("`{}` → `{}`", report.from_schema, report.to_schema), &report.from_to),
        (format!("`{}` → `{}`", report.to_schema, report.from_schema), &report.to_from),
    ] {
        println!();
        println!("{}", label.bold());
        print_diff_counts(result);
        if result.changed {
            println!("{}", result.ddl.dimmed());
        } else {
            println!("  {}", "No changes.".green());
        }
    }
}

fn print_failures(failures: &[TableFailure]) {
    if failures.is_empty() {
        return;
    }
    println!();
    println!(
        "{}",
        format!("{} table(s) could not be processed:", failures.len())
            .red()
            .bold()
    );
    for f in failures {
        println!("  {} {} — {}", "✗".red(), f.table, f.error.dimmed());
    }
}

/// Print a reconciliation report with per-table counts and the DDL.
pub fn print_reconciliation_report(report: &ReconciliationReport) {
    println!(
        "{}",
        format!(
            "{}: `{}` → `{}` ({} common table(s))",
            report.label, report.source_schema, report.destination_schema, report.common_table_count
        )
        .bold()
    );

    if !report.results.is_empty() {
        let mut table = new_table(vec![
            "Table",
            "Columns",
            "Primary Key",
            "Unique",
            "Foreign Keys",
            "Statements",
            "Status",
        ]);
        for r in &report.results {
            let status = if r.changed {
                "Changed".yellow().to_string()
            } else {
                "In sync".green().to_string()
            };
            table.add_row(vec![
                Cell::new(&r.table),
                Cell::new(r.column_changes),
                Cell::new(r.pk_changes),
                Cell::new(r.unique_changes),
                Cell::new(r.fk_changes),
                Cell::new(r.sql_statement_count),
                Cell::new(status),
            ]);
        }
        println!("{table}");
    }

    for m in &report.missing_tables {
        println!("  {} {} (create)", "+".green(), m.table);
    }
    for t in &report.missing_in_source {
        println!(
            "  {} {} (only in `{}`, left alone)",
            "~".cyan(),
            t,
            report.destination_schema
        );
    }

    print_failures(&report.failures);

    println!();
    if !report.has_changes() {
        println!("{}", "Schemas are in sync. No DDL necessary.".green().bold());
        return;
    }

    println!(
        "{}",
        format!(
            "{} table(s) changed, {} unchanged, {} missing, {} statement(s)",
            report.tables_changed,
            report.tables_unchanged,
            report.missing_tables.len(),
            report.total_statements
        )
        .yellow()
        .bold()
    );
    println!();
    println!("{}", report.ddl);
}

/// Print create statements for missing tables.
pub fn print_missing_report(report: &MissingReport) {
    if report.tables.is_empty() && report.failures.is_empty() {
        println!(
            "{}",
            format!(
                "`{}` has every table of `{}`.",
                report.destination_schema, report.source_schema
            )
            .green()
            .bold()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "{} table(s) missing in `{}`",
            report.tables.len() + report.failures.len(),
            report.destination_schema
        )
        .yellow()
        .bold()
    );
    print_failures(&report.failures);
    if !report.ddl.is_empty() {
        println!();
        println!("{}", report.ddl);
    }
}

/// Print apply result.
pub fn print_apply_report(report: &ApplyReport) {
    if !report.executed {
        println!("{}", "Nothing to apply.".green());
        return;
    }
    println!(
        "{}",
        format!(
            "Applied {} statement(s) to `{}` (execution time {}ms)",
            report.statements, report.schema, report.execution_time_ms
        )
        .green()
        .bold()
    );
}

/// Print snapshot report.
pub fn print_snapshot_report(report: &SnapshotReport) {
    println!(
        "{}",
        format!(
            "Snapshot '{}' created ({} tables captured from `{}`)",
            report.snapshot_id, report.tables_captured, report.schema
        )
        .green()
        .bold()
    );
    println!("  {} {}", "→".green(), report.snapshot_path);
}

/// Print list of available snapshots.
pub fn print_snapshot_list(snapshots: &[SnapshotInfo]) {
    if snapshots.is_empty() {
        println!("{}", "No snapshots found.".yellow());
        return;
    }

    let mut table = new_table(vec!["ID", "Created", "Size"]);
    for s in snapshots {
        let size = if s.size_bytes > 1024 * 1024 {
            format!("{:.1}MB", s.size_bytes as f64 / (1024.0 * 1024.0))
        } else if s.size_bytes > 1024 {
            format!("{:.1}KB", s.size_bytes as f64 / 1024.0)
        } else {
            format!("{}B", s.size_bytes)
        };
        table.add_row(vec![
            Cell::new(&s.id),
            Cell::new(&s.created),
            Cell::new(&size),
        ]);
    }

    println!("{table}");
}
