//! Structural MySQL schema comparison and DDL reconciliation.
//!
//! Compares two schemas of a configured connection pair and produces the
//! `ALTER TABLE` / `CREATE TABLE` text that makes the destination match the
//! source. Generating DDL never writes to either database; applying it is a
//! separate, explicit step.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reconcile_core::config::{CliOverrides, ReconcileConfig};
//! use reconcile_core::{Reconciler, TableSelection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconcileConfig::load(None, &CliOverrides::default())?;
//! let reconciler = Reconciler::new(config);
//! let pair = reconciler.open_pair("staging-vs-prod", None, None).await?;
//! let report = reconciler.reconcile(&pair, None, &TableSelection::All).await?;
//! println!("{}", report.ddl);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`] — Configuration loading (TOML, env vars, CLI overrides)
//! - [`pair`] — Connection pairs and endpoint lookup
//! - [`db`] — Connections, identifier quoting, DDL execution
//! - [`metadata`] — Metadata reader trait and the live MySQL reader
//! - [`schema`] — Column, key and table snapshot types
//! - [`signature`] — Order-independent foreign key signatures
//! - [`differ`] — Per-table structural diff and change counting
//! - [`ddl`] — Statement builder and DDL generation
//! - [`tableset`] — Table set comparison and create-statement rewriting
//! - [`catalog`] — JSON catalog snapshots usable as a metadata reader
//! - [`commands`] — Individual command implementations
//! - [`error`] — Error types

pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod ddl;
pub mod differ;
pub mod error;
pub mod metadata;
pub mod pair;
pub mod schema;
pub mod signature;
pub mod tableset;

use std::path::Path;

use catalog::CatalogSnapshot;
use config::ReconcileConfig;
use error::Result;
use metadata::{MetadataReader, MySqlMetadataReader};
use pair::{ConnectionPair, Endpoint, PairSide, PairSummary};
use schema::Direction;

pub use commands::apply::ApplyReport;
pub use commands::compare::CompareReport;
pub use commands::missing::MissingReport;
pub use commands::reconcile::{ReconciliationReport, TableSelection};
pub use commands::snapshot::{SnapshotInfo, SnapshotReport};
pub use commands::tables::TablesReport;
pub use config::CliOverrides;
pub use differ::{FkChangeCounting, TableDiffResult};

/// Both sides of a pair, ready to be read.
pub struct OpenPair {
    pub pair: ConnectionPair,
    pub from: Box<dyn MetadataReader>,
    pub to: Box<dyn MetadataReader>,
}

/// Main entry point for the library.
///
/// Holds the resolved configuration and opens readers for configured pairs.
pub struct Reconciler {
    pub config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Configured pairs without secrets.
    pub fn pairs(&self) -> Vec<PairSummary> {
        self.config.pairs.iter().map(ConnectionPair::summary).collect()
    }

    /// Connect a live reader to an endpoint.
    ///
    /// If `connect_retries` is configured, retries with exponential backoff.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<MySqlMetadataReader> {
        let pool = db::connect_endpoint(endpoint, &self.config.connection).await?;
        Ok(MySqlMetadataReader::new(pool, endpoint.schema.clone()))
    }

    async fn open_side(&self, endpoint: &Endpoint, snapshot: Option<&Path>) -> Result<Box<dyn MetadataReader>> {
        match snapshot {
            Some(path) => {
                let catalog = CatalogSnapshot::load(path)?;
                log::info!(
                    "Using catalog snapshot; path={}, schema={}, tables={}",
                    path.display(),
                    catalog.schema,
                    catalog.tables.len()
                );
                Ok(Box::new(catalog))
            }
            None => Ok(Box::new(self.connect(endpoint).await?)),
        }
    }

    /// Open both sides of a pair. A snapshot path replaces that side's live connection.
    pub async fn open_pair(
        &self,
        pair_id: &str,
        from_snapshot: Option<&Path>,
        to_snapshot: Option<&Path>,
    ) -> Result<OpenPair> {
        let pair = self.config.pair(pair_id)?.clone();
        let (from, to) = tokio::try_join!(
            self.open_side(&pair.from, from_snapshot),
            self.open_side(&pair.to, to_snapshot),
        )?;
        Ok(OpenPair { pair, from, to })
    }

    fn direction(&self, direction: Option<Direction>) -> Direction {
        direction.unwrap_or(self.config.reconcile.default_direction)
    }

    /// Compare the table sets of both sides.
    pub async fn tables(&self, pair: &OpenPair) -> Result<TablesReport> {
        commands::tables::execute(pair.from.as_ref(), pair.to.as_ref()).await
    }

    /// Compare one table in both directions.
    pub async fn compare(&self, pair: &OpenPair, table: &str) -> Result<CompareReport> {
        commands::compare::execute(
            pair.from.as_ref(),
            pair.to.as_ref(),
            table,
            self.config.reconcile.fk_change_counting,
        )
        .await
    }

    /// Create statements for tables the destination lacks.
    pub async fn missing(&self, pair: &OpenPair, direction: Option<Direction>) -> Result<MissingReport> {
        commands::missing::execute(pair.from.as_ref(), pair.to.as_ref(), self.direction(direction)).await
    }

    /// Reconcile the pair in one direction.
    pub async fn reconcile(
        &self,
        pair: &OpenPair,
        direction: Option<Direction>,
        selection: &TableSelection,
    ) -> Result<ReconciliationReport> {
        commands::reconcile::execute(
            pair.from.as_ref(),
            pair.to.as_ref(),
            pair.pair.display_label(),
            self.direction(direction),
            selection,
            self.config.reconcile.fk_change_counting,
        )
        .await
    }

    /// Execute DDL text on the destination side of a direction.
    pub async fn apply(&self, pair_id: &str, direction: Option<Direction>, sql: &str) -> Result<ApplyReport> {
        let pair = self.config.pair(pair_id)?;
        let (_, destination) = pair.oriented(self.direction(direction));
        let pool = db::connect_endpoint(destination, &self.config.connection).await?;
        let report = commands::apply::execute(&pool, &destination.schema, sql).await;
        pool.close().await;
        report
    }

    /// Capture one side of a pair into the snapshot directory.
    pub async fn snapshot(&self, pair_id: &str, side: PairSide) -> Result<SnapshotReport> {
        let pair = self.config.pair(pair_id)?;
        let reader = self.connect(pair.endpoint(side)).await?;
        commands::snapshot::execute_snapshot(&reader, &self.config.snapshots).await
    }

    /// List snapshot files (no DB required).
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        commands::snapshot::list_snapshots(&self.config.snapshots)
    }
}
