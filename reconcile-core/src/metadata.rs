//! Reading structural metadata for one schema.
//!
//! [`MetadataReader`] is the only way the engine learns about a schema. The
//! live implementation reads MySQL's `information_schema`; catalog snapshots
//! (see [`crate::catalog`]) implement the same trait from a JSON file.

use async_trait::async_trait;
use sqlx::mysql::{MySqlDatabaseError, MySqlPool, MySqlRow};
use sqlx::Row;

use crate::db::qualified;
use crate::error::{Result, ReconcileError};
use crate::schema::{Column, ForeignKeyEntry, ForeignKeys, TableSnapshot, UniqueConstraints};

/// Read-only access to one schema's catalog.
///
/// Implementations never retry; a failed query surfaces as
/// [`ReconcileError::MetadataUnavailable`].
#[async_trait]
pub trait MetadataReader: Send + Sync {
    /// Name of the schema this reader is bound to.
    fn schema(&self) -> &str;

    /// Columns of `table` in ordinal order. Empty when the table does not exist.
    async fn columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Primary key columns of `table` in key order.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Unique constraints of `table`, keyed by name.
    async fn unique_constraints(&self, table: &str) -> Result<UniqueConstraints>;

    /// Foreign keys of `table`, keyed by name.
    async fn foreign_keys(&self, table: &str) -> Result<ForeignKeys>;

    /// Base table names in the schema, in catalog order.
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Verbatim `CREATE TABLE` text for `table`.
    async fn create_statement(&self, table: &str) -> Result<String>;
}

/// Read every structural fact about one table.
///
/// A table without columns does not exist (MySQL tables always have at
/// least one), so that case is [`ReconcileError::TableNotFound`].
pub async fn fetch_table_snapshot(reader: &dyn MetadataReader, table: &str) -> Result<TableSnapshot> {
    let (columns, primary_key, unique_constraints, foreign_keys) = tokio::try_join!(
        reader.columns(table),
        reader.primary_key(table),
        reader.unique_constraints(table),
        reader.foreign_keys(table),
    )?;

    if columns.is_empty() {
        return Err(ReconcileError::TableNotFound {
            schema: reader.schema().to_string(),
            table: table.to_string(),
        });
    }

    log::debug!(
        "Read table metadata; schema={}, table={}, columns={}, unique={}, foreign_keys={}",
        reader.schema(),
        table,
        columns.len(),
        unique_constraints.len(),
        foreign_keys.len()
    );

    Ok(TableSnapshot {
        columns,
        primary_key,
        unique_constraints,
        foreign_keys,
    })
}

const COLUMNS_SQL: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name, \
       CAST(COLUMN_TYPE AS CHAR) AS column_type, \
       CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
       CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
       CAST(EXTRA AS CHAR) AS extra \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const PRIMARY_KEY_SQL: &str = "\
SELECT CAST(COLUMN_NAME AS CHAR) AS column_name \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY' \
ORDER BY ORDINAL_POSITION";

const UNIQUE_SQL: &str = "\
SELECT CAST(tc.CONSTRAINT_NAME AS CHAR) AS constraint_name, \
       CAST(kcu.COLUMN_NAME AS CHAR) AS column_name \
FROM information_schema.TABLE_CONSTRAINTS tc \
JOIN information_schema.KEY_COLUMN_USAGE kcu \
  ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
 AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA \
 AND tc.TABLE_NAME = kcu.TABLE_NAME \
WHERE tc.TABLE_SCHEMA = ? AND tc.TABLE_NAME = ? AND tc.CONSTRAINT_TYPE = 'UNIQUE' \
ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

const FOREIGN_KEYS_SQL: &str = "\
SELECT CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name, \
       CAST(COLUMN_NAME AS CHAR) AS column_name, \
       CAST(REFERENCED_TABLE_SCHEMA AS CHAR) AS ref_schema, \
       CAST(REFERENCED_TABLE_NAME AS CHAR) AS ref_table, \
       CAST(REFERENCED_COLUMN_NAME AS CHAR) AS ref_column \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND REFERENCED_TABLE_NAME IS NOT NULL \
ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION";

const TABLE_NAMES_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
ORDER BY TABLE_NAME";

/// MySQL error number for an unknown table.
const ER_NO_SUCH_TABLE: u16 = 1146;

/// Live reader over one MySQL schema.
pub struct MySqlMetadataReader {
    pool: MySqlPool,
    schema: String,
}

impl MySqlMetadataReader {
    /// Bind a reader to `schema` on an open pool.
    pub fn new(pool: MySqlPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    async fn table_rows(&self, sql: &str, table: &str) -> Result<Vec<MySqlRow>> {
        sqlx::query(sql)
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReconcileError::metadata(&self.schema, Some(table), e))
    }

    fn get<T>(&self, row: &MySqlRow, column: &str, table: Option<&str>) -> Result<T>
    where
        T: for<'r> sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
    {
        row.try_get(column)
            .map_err(|e| ReconcileError::metadata(&self.schema, table, e))
    }
}

#[async_trait]
impl MetadataReader for MySqlMetadataReader {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self.table_rows(COLUMNS_SQL, table).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let is_nullable: String = self.get(row, "is_nullable", Some(table))?;
            let extra: Option<String> = self.get(row, "extra", Some(table))?;
            columns.push(Column {
                name: self.get(row, "column_name", Some(table))?,
                column_type: self.get(row, "column_type", Some(table))?,
                nullable: is_nullable.eq_ignore_ascii_case("YES"),
                default: self.get(row, "column_default", Some(table))?,
                extra: extra.unwrap_or_default(),
            });
        }
        Ok(columns)
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let rows = self.table_rows(PRIMARY_KEY_SQL, table).await?;
        rows.iter()
            .map(|row| self.get(row, "column_name", Some(table)))
            .collect()
    }

    async fn unique_constraints(&self, table: &str) -> Result<UniqueConstraints> {
        let rows = self.table_rows(UNIQUE_SQL, table).await?;
        let mut constraints = UniqueConstraints::new();
        for row in &rows {
            let name: String = self.get(row, "constraint_name", Some(table))?;
            let column: String = self.get(row, "column_name", Some(table))?;
            constraints.entry(name).or_default().push(column);
        }
        Ok(constraints)
    }

    async fn foreign_keys(&self, table: &str) -> Result<ForeignKeys> {
        let rows = self.table_rows(FOREIGN_KEYS_SQL, table).await?;
        let mut foreign_keys = ForeignKeys::new();
        for row in &rows {
            let name: String = self.get(row, "constraint_name", Some(table))?;
            foreign_keys.entry(name).or_default().push(ForeignKeyEntry {
                column: self.get(row, "column_name", Some(table))?,
                ref_schema: self.get(row, "ref_schema", Some(table))?,
                ref_table: self.get(row, "ref_table", Some(table))?,
                ref_column: self.get(row, "ref_column", Some(table))?,
            });
        }
        Ok(foreign_keys)
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(TABLE_NAMES_SQL)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ReconcileError::metadata(&self.schema, None, e))?;
        rows.iter()
            .map(|row| self.get(row, "table_name", None))
            .collect()
    }

    async fn create_statement(&self, table: &str) -> Result<String> {
        let sql = format!("SHOW CREATE TABLE {}", qualified(&self.schema, table));
        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                let unknown_table = e
                    .as_database_error()
                    .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
                    .is_some_and(|my| my.number() == ER_NO_SUCH_TABLE);
                if unknown_table {
                    ReconcileError::TableNotFound {
                        schema: self.schema.clone(),
                        table: table.to_string(),
                    }
                } else {
                    ReconcileError::metadata(&self.schema, Some(table), e)
                }
            })?;

        match row {
            // Columns are "Table" and "Create Table"
            Some(row) => self.get(&row, "Create Table", Some(table)),
            None => Err(ReconcileError::TableNotFound {
                schema: self.schema.clone(),
                table: table.to_string(),
            }),
        }
    }
}
