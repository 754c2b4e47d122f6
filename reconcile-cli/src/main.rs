//! CLI entry point for the reconcile schema tool.
//! Provides clap-based command routing and exit code mapping based on error type.

mod output;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use reconcile_core::config::{CliOverrides, ReconcileConfig};
use reconcile_core::error::ReconcileError;
use reconcile_core::pair::PairSide;
use reconcile_core::schema::Direction;
use reconcile_core::{ApplyReport, FkChangeCounting, ReconciliationReport, Reconciler, TableSelection};

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "reconcile",
    about = "Compare two MySQL schemas and generate the DDL to reconcile them",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_HASH"), " ", env!("BUILD_TIME"), ")"
    ),
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Number of retries when connecting to a database
    #[arg(long, value_name = "N")]
    connect_retries: Option<u32>,

    /// SSL/TLS mode: disable, prefer, require
    #[arg(long, value_name = "MODE")]
    ssl_mode: Option<String>,

    /// Connection timeout in seconds (default: 30, 0 = no timeout)
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u32>,

    /// How foreign key changes are counted: logical, statement
    #[arg(long, value_name = "MODE")]
    fk_counting: Option<FkChangeCounting>,

    /// Snapshot directory (overrides config)
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which side of a pair to capture.
#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    From,
    To,
}

impl From<SideArg> for PairSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::From => PairSide::From,
            SideArg::To => PairSide::To,
        }
    }
}

/// All available reconcile subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List configured connection pairs
    List,

    /// Compare the table sets of a pair
    Tables {
        /// Connection pair id
        #[arg(value_name = "PAIR")]
        pair: String,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Compare one table's structure in both directions
    Compare {
        /// Connection pair id
        #[arg(value_name = "PAIR")]
        pair: String,

        /// Table to compare
        #[arg(value_name = "TABLE")]
        table: String,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Generate DDL that makes the destination match the source
    Reconcile {
        /// Connection pair id
        #[arg(value_name = "PAIR")]
        pair: String,

        /// Direction: from_to, to_from (default from config)
        #[arg(short, long, value_name = "DIR")]
        direction: Option<Direction>,

        /// Only these tables, comma-separated (default: all common tables)
        #[arg(long, value_name = "TABLES", value_delimiter = ',')]
        tables: Vec<String>,

        /// Write the DDL to a file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Execute the generated DDL on the destination
        #[arg(long)]
        apply: bool,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Generate create statements for tables the destination lacks
    Missing {
        /// Connection pair id
        #[arg(value_name = "PAIR")]
        pair: String,

        /// Direction: from_to, to_from (default from config)
        #[arg(short, long, value_name = "DIR")]
        direction: Option<Direction>,

        #[command(flatten)]
        snapshots: SnapshotArgs,
    },

    /// Execute a DDL file on the destination side of a direction
    Apply {
        /// Connection pair id
        #[arg(value_name = "PAIR")]
        pair: String,

        /// SQL file to execute
        #[arg(short, long, value_name = "FILE")]
        file: PathBuf,

        /// Direction: from_to, to_from (default from config)
        #[arg(short, long, value_name = "DIR")]
        direction: Option<Direction>,
    },

    /// Capture one side of a pair to a catalog snapshot
    Snapshot {
        /// Connection pair id (omit with --list)
        #[arg(value_name = "PAIR", required_unless_present = "list")]
        pair: Option<String>,

        /// Side to capture
        #[arg(long, value_enum, default_value = "from")]
        side: SideArg,

        /// List available snapshots instead of capturing
        #[arg(long)]
        list: bool,
    },
}

/// Catalog snapshots standing in for a live side.
#[derive(clap::Args)]
struct SnapshotArgs {
    /// Read the "from" side from a snapshot file
    #[arg(long, value_name = "FILE")]
    from_snapshot: Option<PathBuf>,

    /// Read the "to" side from a snapshot file
    #[arg(long, value_name = "FILE")]
    to_snapshot: Option<PathBuf>,
}

impl SnapshotArgs {
    /// Snapshot file standing in for the destination of `direction`.
    fn destination(&self, direction: Direction) -> Option<&Path> {
        let (_, destination) =
            direction.orient(self.from_snapshot.as_deref(), self.to_snapshot.as_deref());
        destination
    }
}

/// `reconcile --apply --json` prints both reports as one document.
#[derive(Serialize)]
struct ReconcileApplyOutput<'a> {
    reconcile: &'a ReconciliationReport,
    apply: &'a ApplyReport,
}

/// Refuse `--apply` when the destination is read from a snapshot file.
fn ensure_live_destination(direction: Direction, snapshots: &SnapshotArgs) -> Result<(), ReconcileError> {
    match snapshots.destination(direction) {
        Some(path) => Err(ReconcileError::ConfigError(format!(
            "--apply needs a live destination, but it is read from snapshot {}",
            path.display()
        ))),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging (suppress when JSON output is requested)
    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &ReconcileError) -> i32 {
    match error {
        ReconcileError::ConfigError(_) => 2,
        ReconcileError::PairNotFound { .. } => 2,
        ReconcileError::InvalidDirection(_) => 2,
        ReconcileError::EmptyTableSelection => 2,
        ReconcileError::DatabaseError(_) => 4,
        ReconcileError::ConnectionLost { .. } => 4,
        ReconcileError::MetadataUnavailable { .. } => 4,
        ReconcileError::ExecutionFailed { .. } => 5,
        ReconcileError::TableNotFound { .. } => 6,
        ReconcileError::SnapshotError { .. } => 7,
        _ => 1,
    }
}

/// Build configuration and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), ReconcileError> {
    let json_output = cli.json;

    let overrides = CliOverrides {
        connect_retries: cli.connect_retries,
        connect_timeout: cli.connect_timeout,
        ssl_mode: cli.ssl_mode,
        fk_change_counting: cli.fk_counting,
        snapshot_directory: cli.snapshot_dir,
    };

    let config = ReconcileConfig::load(cli.config.as_deref(), &overrides)?;
    let reconciler = Reconciler::new(config);

    match cli.command {
        Commands::List => {
            let pairs = reconciler.pairs();
            if json_output {
                output::print_json(&pairs);
            } else {
                output::print_pairs(&pairs);
            }
        }
        Commands::Tables { pair, snapshots } => {
            let open = reconciler
                .open_pair(
                    &pair,
                    snapshots.from_snapshot.as_deref(),
                    snapshots.to_snapshot.as_deref(),
                )
                .await?;
            let report = reconciler.tables(&open).await?;
            if json_output {
                output::print_json(&report);
            } else {
                output::print_tables_report(&report);
            }
        }
        Commands::Compare {
            pair,
            table,
            snapshots,
        } => {
            let open = reconciler
                .open_pair(
                    &pair,
                    snapshots.from_snapshot.as_deref(),
                    snapshots.to_snapshot.as_deref(),
                )
                .await?;
            let report = reconciler.compare(&open, &table).await?;
            if json_output {
                output::print_json(&report);
            } else {
                output::print_compare_report(&report);
            }
        }
        Commands::Reconcile {
            pair,
            direction,
            tables,
            output: output_file,
            apply,
            snapshots,
        } => {
            let selection = if tables.is_empty() {
                TableSelection::All
            } else {
                TableSelection::from_names(&tables)?
            };

            let direction = direction.unwrap_or(reconciler.config.reconcile.default_direction);
            if apply {
                ensure_live_destination(direction, &snapshots)?;
            }

            let open = reconciler
                .open_pair(
                    &pair,
                    snapshots.from_snapshot.as_deref(),
                    snapshots.to_snapshot.as_deref(),
                )
                .await?;
            let report = reconciler.reconcile(&open, Some(direction), &selection).await?;
            if !json_output {
                output::print_reconciliation_report(&report);
            }

            if let Some(path) = output_file {
                std::fs::write(&path, &report.ddl)?;
                if !json_output {
                    println!(
                        "{}",
                        format!("DDL written to {}", path.display()).green()
                    );
                }
            }

            let applied = if apply {
                Some(reconciler.apply(&pair, Some(direction), &report.ddl).await?)
            } else {
                None
            };

            match (&applied, json_output) {
                (Some(apply), true) => output::print_json(&ReconcileApplyOutput {
                    reconcile: &report,
                    apply,
                }),
                (None, true) => output::print_json(&report),
                (Some(apply), false) => output::print_apply_report(apply),
                (None, false) => {}
            }
        }
        Commands::Missing {
            pair,
            direction,
            snapshots,
        } => {
            let open = reconciler
                .open_pair(
                    &pair,
                    snapshots.from_snapshot.as_deref(),
                    snapshots.to_snapshot.as_deref(),
                )
                .await?;
            let report = reconciler.missing(&open, direction).await?;
            if json_output {
                output::print_json(&report);
            } else {
                output::print_missing_report(&report);
            }
        }
        Commands::Apply {
            pair,
            file,
            direction,
        } => {
            let sql = std::fs::read_to_string(&file)?;
            let report = reconciler.apply(&pair, direction, &sql).await?;
            if json_output {
                output::print_json(&report);
            } else {
                output::print_apply_report(&report);
            }
        }
        Commands::Snapshot { pair, side, list } => {
            if list {
                let snapshots = reconciler.list_snapshots()?;
                if json_output {
                    output::print_json(&snapshots);
                } else {
                    output::print_snapshot_list(&snapshots);
                }
                return Ok(());
            }

            let pair = pair.ok_or_else(|| {
                ReconcileError::ConfigError("Snapshot requires a pair id".to_string())
            })?;
            let report = reconciler.snapshot(&pair, side.into()).await?;
            if json_output {
                output::print_json(&report);
            } else {
                output::print_snapshot_report(&report);
            }
        }
    }

    Ok(())
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &ReconcileError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        ReconcileError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your reconcile.toml, or pass --config with the path to it.".dimmed()
            );
        }
        ReconcileError::PairNotFound { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'reconcile list' to see configured pairs.".dimmed()
            );
        }
        ReconcileError::DatabaseError(_) | ReconcileError::ConnectionLost { .. } => {
            eprintln!(
                "{}",
                "Hint: Verify the server is running and the pair's connection details are correct."
                    .dimmed()
            );
        }
        ReconcileError::MetadataUnavailable { .. } => {
            eprintln!(
                "{}",
                "Hint: The user needs SELECT on information_schema and the target schema.".dimmed()
            );
        }
        ReconcileError::TableNotFound { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'reconcile tables <PAIR>' to see which tables exist on each side."
                    .dimmed()
            );
        }
        ReconcileError::ExecutionFailed { .. } => {
            eprintln!(
                "{}",
                "Hint: Statements before the failing one were already applied. Re-run 'reconcile' to see what remains."
                    .dimmed()
            );
        }
        ReconcileError::SnapshotError { .. } => {
            eprintln!(
                "{}",
                "Hint: Run 'reconcile snapshot --list' to see available snapshot files.".dimmed()
            );
        }
        _ => {}
    }
}
