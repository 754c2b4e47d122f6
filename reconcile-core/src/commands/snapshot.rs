//! Capture a schema's catalog to a JSON file for offline reconciliation.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::CatalogSnapshot;
use crate::config::SnapshotSettings;
use crate::error::Result;
use crate::metadata::MetadataReader;

/// Report from a snapshot operation.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    /// Timestamp-based identifier, also the file stem.
    pub snapshot_id: String,
    pub snapshot_path: String,
    pub schema: String,
    pub tables_captured: usize,
}

/// Info about an available snapshot.
#[derive(Debug, Serialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Human-readable modification time.
    pub created: String,
}

/// Capture `reader`'s schema into the snapshot directory.
pub async fn execute_snapshot(reader: &dyn MetadataReader, settings: &SnapshotSettings) -> Result<SnapshotReport> {
    let catalog = CatalogSnapshot::capture(reader).await?;

    let snapshot_id = format!(
        "{}_{}",
        catalog.schema,
        catalog.captured_at.format(SNAPSHOT_TIMESTAMP_FORMAT)
    );
    let path = settings.directory.join(format!("{}.json", snapshot_id));
    catalog.save(&path)?;

    prune_snapshots(&settings.directory, &catalog.schema, settings.max_snapshots)?;

    log::info!(
        "Snapshot written; path={}, tables={}",
        path.display(),
        catalog.tables.len()
    );

    Ok(SnapshotReport {
        snapshot_id,
        snapshot_path: path.display().to_string(),
        schema: catalog.schema,
        tables_captured: catalog.tables.len(),
    })
}

fn snapshot_files(dir: &Path) -> Result<Vec<std::fs::DirEntry>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort_by_key(|e| e.file_name());
    Ok(files)
}

/// List available snapshots, newest first.
pub fn list_snapshots(settings: &SnapshotSettings) -> Result<Vec<SnapshotInfo>> {
    let mut snapshots = Vec::new();
    for entry in snapshot_files(&settings.directory)? {
        let path = entry.path();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let meta = entry.metadata()?;
        let created = meta
            .modified()
            .ok()
            .map(|t| {
                chrono::DateTime::<chrono::Utc>::from(t)
                    .format("%Y-%m-%d %H:%M:%S UTC")
                    .to_string()
            })
            .unwrap_or_default();

        snapshots.push(SnapshotInfo {
            id,
            path,
            size_bytes: meta.len(),
            created,
        });
    }

    snapshots.reverse();
    Ok(snapshots)
}

/// Timestamp suffix of snapshot ids.
const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// True when `stem` is exactly `{schema}_{timestamp}`.
fn is_snapshot_of(stem: &str, schema: &str) -> bool {
    stem.strip_prefix(schema)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ts| chrono::NaiveDateTime::parse_from_str(ts, SNAPSHOT_TIMESTAMP_FORMAT).is_ok())
}

/// Keep at most `max` snapshots of `schema`, removing the oldest.
fn prune_snapshots(dir: &Path, schema: &str, max: usize) -> Result<()> {
    let mut files: Vec<_> = snapshot_files(dir)?
        .into_iter()
        .filter(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| is_snapshot_of(stem, schema))
        })
        .collect();

    while files.len() > max {
        let oldest = files.remove(0);
        log::debug!("Pruning snapshot; path={}", oldest.path().display());
        if let Err(e) = std::fs::remove_file(oldest.path()) {
            log::warn!(
                "Failed to prune snapshot; path={}, error={}",
                oldest.path().display(),
                e
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, TableSnapshot};

    fn users() -> TableSnapshot {
        TableSnapshot {
            columns: vec![Column {
                name: "id".to_string(),
                column_type: "int".to_string(),
                nullable: false,
                default: None,
                extra: String::new(),
            }],
            primary_key: vec!["id".to_string()],
            ..Default::default()
        }
    }

    fn settings(dir: &Path, max: usize) -> SnapshotSettings {
        SnapshotSettings {
            directory: dir.to_path_buf(),
            max_snapshots: max,
        }
    }

    #[tokio::test]
    async fn test_snapshot_written_and_listed() {
        let dir = tempfile::tempdir().unwrap();
        let source = CatalogSnapshot::new("shop_staging")
            .with_table("users", users(), Some("CREATE TABLE `users` (`id` int)"));

        let report = execute_snapshot(&source, &settings(dir.path(), 10)).await.unwrap();
        assert_eq!(report.schema, "shop_staging");
        assert_eq!(report.tables_captured, 1);
        assert!(report.snapshot_id.starts_with("shop_staging_"));

        let loaded = CatalogSnapshot::load(Path::new(&report.snapshot_path)).unwrap();
        assert_eq!(loaded.tables, source.tables);

        let listed = list_snapshots(&settings(dir.path(), 10)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, report.snapshot_id);
    }

    #[test]
    fn test_list_missing_directory() {
        let listed = list_snapshots(&settings(Path::new("/nonexistent/snapshots"), 10)).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn test_prune_keeps_newest_per_schema() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "shop_20240101_000000.json",
            "shop_20240102_000000.json",
            "shop_20240103_000000.json",
            "other_20240101_000000.json",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        prune_snapshots(dir.path(), "shop", 2).unwrap();

        let remaining: Vec<String> = snapshot_files(dir.path())
            .unwrap()
            .iter()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            remaining,
            vec![
                "other_20240101_000000.json",
                "shop_20240102_000000.json",
                "shop_20240103_000000.json",
            ]
        );
    }

    #[test]
    fn test_prune_ignores_schema_sharing_a_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "shop_eu_20240101_000000.json",
            "shop_eu_20240102_000000.json",
            "shop_20240103_000000.json",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        prune_snapshots(dir.path(), "shop", 1).unwrap();

        let remaining: Vec<String> = snapshot_files(dir.path())
            .unwrap()
            .iter()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            remaining,
            vec![
                "shop_20240103_000000.json",
                "shop_eu_20240101_000000.json",
                "shop_eu_20240102_000000.json",
            ]
        );
    }

    #[test]
    fn test_is_snapshot_of() {
        assert!(is_snapshot_of("shop_20240103_000000", "shop"));
        assert!(is_snapshot_of("shop_eu_20240103_000000", "shop_eu"));
        assert!(!is_snapshot_of("shop_eu_20240103_000000", "shop"));
        assert!(!is_snapshot_of("shop_latest", "shop"));
        assert!(!is_snapshot_of("shopping_20240103_000000", "shop"));
    }
}
