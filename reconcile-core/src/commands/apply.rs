//! Execute DDL text on a destination schema.

use serde::Serialize;
use sqlx::mysql::MySqlPool;

use crate::db;
use crate::error::Result;

/// Report produced by the apply command.
#[derive(Debug, Serialize)]
pub struct ApplyReport {
    pub schema: String,
    /// Statements found in the text (comment lines excluded).
    pub statements: usize,
    pub execution_time_ms: i64,
    /// False when the text held no statements and nothing was sent.
    pub executed: bool,
}

/// Count `;`-terminated statements, ignoring `-- ` comment lines.
pub fn count_statements(sql: &str) -> usize {
    sql.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("--"))
        .filter(|l| l.ends_with(';'))
        .count()
}

/// Execute the apply command.
///
/// The text is sent as-is. Statements before a failing one stay applied.
pub async fn execute(pool: &MySqlPool, schema: &str, sql: &str) -> Result<ApplyReport> {
    let statements = count_statements(sql);
    if statements == 0 {
        log::info!("Nothing to apply; schema={}", schema);
        return Ok(ApplyReport {
            schema: schema.to_string(),
            statements,
            execution_time_ms: 0,
            executed: false,
        });
    }

    let execution_time_ms = db::execute_ddl(pool, schema, sql).await?;
    log::info!(
        "Applied DDL; schema={}, statements={}, execution_time_ms={}",
        schema,
        statements,
        execution_time_ms
    );

    Ok(ApplyReport {
        schema: schema.to_string(),
        statements,
        execution_time_ms,
        executed: true,
    })
}
