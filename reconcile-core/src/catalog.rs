//! Catalog snapshots: one schema's structure captured to a JSON file.
//!
//! A [`CatalogSnapshot`] implements [`MetadataReader`], so a captured schema
//! can stand in for a live one on either side of a reconciliation.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ReconcileError};
use crate::metadata::{fetch_table_snapshot, MetadataReader};
use crate::schema::{Column, ForeignKeys, TableSnapshot, UniqueConstraints};

/// One table inside a catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogTable {
    pub name: String,
    #[serde(flatten)]
    pub snapshot: TableSnapshot,
    /// Verbatim `CREATE TABLE` text, when it was captured.
    #[serde(default)]
    pub create_statement: Option<String>,
}

/// Every table of one schema at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSnapshot {
    /// Schema the tables were read from.
    pub schema: String,
    pub captured_at: DateTime<Utc>,
    /// Tables in catalog order.
    pub tables: Vec<CatalogTable>,
}

impl CatalogSnapshot {
    /// Empty snapshot of `schema`.
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            captured_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    /// Add a table, replacing any table of the same name.
    pub fn with_table(mut self, name: &str, snapshot: TableSnapshot, create_statement: Option<&str>) -> Self {
        self.tables.retain(|t| t.name != name);
        self.tables.push(CatalogTable {
            name: name.to_string(),
            snapshot,
            create_statement: create_statement.map(str::to_string),
        });
        self
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Read every table of `reader`'s schema.
    pub async fn capture(reader: &dyn MetadataReader) -> Result<Self> {
        let names = reader.table_names().await?;
        let mut snapshot = CatalogSnapshot::new(reader.schema());

        for name in names {
            let (table, create_statement) = tokio::try_join!(
                fetch_table_snapshot(reader, &name),
                reader.create_statement(&name),
            )?;
            snapshot.tables.push(CatalogTable {
                name,
                snapshot: table,
                create_statement: Some(create_statement),
            });
        }

        log::info!(
            "Captured catalog; schema={}, tables={}",
            snapshot.schema,
            snapshot.tables.len()
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ReconcileError::SnapshotError {
            reason: format!("Failed to serialize snapshot of '{}': {}", self.schema, e),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a snapshot written by [`CatalogSnapshot::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ReconcileError::SnapshotError {
            reason: format!("Cannot read snapshot {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&content).map_err(|e| ReconcileError::SnapshotError {
            reason: format!("Invalid snapshot {}: {}", path.display(), e),
        })
    }

    fn snapshot_of(&self, table: &str) -> Option<&TableSnapshot> {
        self.table(table).map(|t| &t.snapshot)
    }
}

#[async_trait]
impl MetadataReader for CatalogSnapshot {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn columns(&self, table: &str) -> Result<Vec<Column>> {
        Ok(self.snapshot_of(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot_of(table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn unique_constraints(&self, table: &str) -> Result<UniqueConstraints> {
        Ok(self
            .snapshot_of(table)
            .map(|t| t.unique_constraints.clone())
            .unwrap_or_default())
    }

    async fn foreign_keys(&self, table: &str) -> Result<ForeignKeys> {
        Ok(self
            .snapshot_of(table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn create_statement(&self, table: &str) -> Result<String> {
        match self.table(table) {
            Some(CatalogTable {
                create_statement: Some(sql),
                ..
            }) => Ok(sql.clone()),
            Some(_) => Err(ReconcileError::MetadataUnavailable {
                schema: self.schema.clone(),
                table: Some(table.to_string()),
                reason: "create statement was not captured in this snapshot".to_string(),
            }),
            None => Err(ReconcileError::TableNotFound {
                schema: self.schema.clone(),
                table: table.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableSnapshot {
        TableSnapshot {
            columns: vec![Column {
                name: "id".to_string(),
                column_type: "int".to_string(),
                nullable: false,
                default: None,
                extra: "auto_increment".to_string(),
            }],
            primary_key: vec!["id".to_string()],
            ..Default::default()
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new("shop_staging")
            .with_table("users", users(), Some("CREATE TABLE `users` (`id` int)"))
            .with_table("audit", TableSnapshot::default(), None)
    }

    #[tokio::test]
    async fn test_reader_over_snapshot() {
        let catalog = catalog();
        assert_eq!(catalog.schema(), "shop_staging");
        assert_eq!(catalog.table_names().await.unwrap(), vec!["users", "audit"]);
        assert_eq!(catalog.primary_key("users").await.unwrap(), vec!["id"]);
        assert!(catalog.columns("missing").await.unwrap().is_empty());

        let fetched = fetch_table_snapshot(&catalog, "users").await.unwrap();
        assert_eq!(fetched, users());
    }

    #[tokio::test]
    async fn test_fetch_absent_table_is_not_found() {
        let catalog = catalog();
        match fetch_table_snapshot(&catalog, "dropped").await {
            Err(ReconcileError::TableNotFound { schema, table }) => {
                assert_eq!(schema, "shop_staging");
                assert_eq!(table, "dropped");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_statement_lookup() {
        let catalog = catalog();
        assert_eq!(
            catalog.create_statement("users").await.unwrap(),
            "CREATE TABLE `users` (`id` int)"
        );
        assert!(matches!(
            catalog.create_statement("audit").await,
            Err(ReconcileError::MetadataUnavailable { .. })
        ));
        assert!(matches!(
            catalog.create_statement("missing").await,
            Err(ReconcileError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_capture_from_reader() {
        let source = CatalogSnapshot::new("shop_staging")
            .with_table("users", users(), Some("CREATE TABLE `users` (`id` int)"));
        let captured = CatalogSnapshot::capture(&source).await.unwrap();
        assert_eq!(captured.schema, "shop_staging");
        assert_eq!(captured.tables, source.tables);
    }

    #[test]
    fn test_with_table_replaces_existing() {
        let catalog = catalog().with_table("users", TableSnapshot::default(), None);
        assert_eq!(catalog.tables.len(), 2);
        assert!(catalog.table("users").unwrap().snapshot.columns.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snap.json");
        let catalog = catalog();

        catalog.save(&path).unwrap();
        let loaded = CatalogSnapshot::load(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            CatalogSnapshot::load(&path),
            Err(ReconcileError::SnapshotError { .. })
        ));
    }
}
