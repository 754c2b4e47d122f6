//! Database connections, identifier quoting, and DDL execution.

use std::time::{Duration, Instant};

use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlSslMode};

use crate::config::{ConnectionSettings, SslMode};
use crate::error::{format_db_error, Result, ReconcileError};
use crate::pair::Endpoint;

/// Quote a MySQL identifier with backticks.
///
/// Doubles any embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a `schema.table` pair.
pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Quote a string literal for use in DDL.
///
/// Escapes backslashes and doubles single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Validate that a schema identifier contains only safe characters.
///
/// Returns an error for names with characters outside `[a-zA-Z0-9_$]`.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ReconcileError::ConfigError(
            "Identifier cannot be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(ReconcileError::ConfigError(format!(
            "Identifier '{}' contains invalid characters. Only [a-zA-Z0-9_$] are allowed.",
            name
        )));
    }
    Ok(())
}

fn mysql_ssl_mode(mode: &SslMode) -> MySqlSslMode {
    match mode {
        SslMode::Disable => MySqlSslMode::Disabled,
        SslMode::Prefer => MySqlSslMode::Preferred,
        SslMode::Require => MySqlSslMode::Required,
    }
}

/// Build driver connect options for an endpoint.
pub fn connect_options(endpoint: &Endpoint, ssl_mode: &SslMode) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&endpoint.host)
        .port(endpoint.port)
        .username(&endpoint.user)
        .database(&endpoint.schema)
        .ssl_mode(mysql_ssl_mode(ssl_mode));
    if let Some(ref password) = endpoint.password {
        options = options.password(password);
    }
    options
}

/// Check if an error is a permanent authentication failure that should not be retried.
fn is_permanent_error(e: &sqlx::Error) -> bool {
    if let Some(db_err) = e.as_database_error() {
        if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
            // 1044 = db access denied, 1045 = access denied, 1049 = unknown database
            return matches!(mysql_err.number(), 1044 | 1045 | 1049);
        }
    }
    false
}

async fn connect_once(endpoint: &Endpoint, settings: &ConnectionSettings) -> std::result::Result<MySqlPool, sqlx::Error> {
    let options = connect_options(endpoint, &settings.ssl_mode);
    let pool_options = MySqlPoolOptions::new().max_connections(settings.max_connections);

    if settings.connect_timeout_secs > 0 {
        let timeout = Duration::from_secs(settings.connect_timeout_secs as u64);
        match tokio::time::timeout(timeout, pool_options.acquire_timeout(timeout).connect_with(options)).await {
            Ok(result) => result,
            Err(_) => Err(sqlx::Error::PoolTimedOut),
        }
    } else {
        pool_options.connect_with(options).await
    }
}

/// Connect to an endpoint, retrying up to `connect_retries` times with exponential backoff + jitter.
///
/// Each retry waits `min(2^attempt, 30) + rand(0..1000ms)` before the next attempt.
/// Permanent errors (authentication failures, unknown schema) are not retried.
pub async fn connect_endpoint(endpoint: &Endpoint, settings: &ConnectionSettings) -> Result<MySqlPool> {
    let retries = settings.connect_retries;
    let mut last_err = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let base_delay = std::cmp::min(1u64 << attempt, 30);
            let jitter_ms = fastrand::u64(0..1000);
            let delay = Duration::from_secs(base_delay) + Duration::from_millis(jitter_ms);
            log::info!(
                "Connection attempt failed, retrying; endpoint={}, attempt={}, max_attempts={}, delay_ms={}",
                endpoint,
                attempt + 1,
                retries + 1,
                delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
        }

        match connect_once(endpoint, settings).await {
            Ok(pool) => {
                if attempt > 0 {
                    log::info!(
                        "Connected successfully after retry; endpoint={}, attempt={}",
                        endpoint,
                        attempt + 1
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                if is_permanent_error(&e) {
                    log::error!("Permanent connection error, not retrying: {}", format_db_error(&e));
                    return Err(ReconcileError::DatabaseError(e));
                }
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(ReconcileError::DatabaseError(e)),
        None => Err(ReconcileError::ConnectionLost {
            operation: "connect".to_string(),
            detail: format!("no connection attempt was made to {}", endpoint),
        }),
    }
}

/// Execute DDL text against a destination schema as-is.
///
/// The text is sent unmodified; MySQL commits each DDL statement on its own,
/// so a failure part-way leaves earlier statements applied.
/// Returns the execution time in milliseconds.
pub async fn execute_ddl(pool: &MySqlPool, schema: &str, sql: &str) -> Result<i64> {
    let start = Instant::now();
    log::info!("Executing DDL; schema={}, bytes={}", schema, sql.len());

    sqlx::raw_sql(sql)
        .execute(pool)
        .await
        .map_err(|e| ReconcileError::ExecutionFailed {
            schema: schema.to_string(),
            reason: format_db_error(&e),
        })?;

    Ok(start.elapsed().as_millis() as i64)
}
