//! Configuration loading and resolution.
//!
//! Supports a TOML config file, environment variables, and CLI overrides
//! with a defined priority order (CLI > env > TOML > defaults).

use std::path::PathBuf;

use serde::Deserialize;

use crate::differ::FkChangeCounting;
use crate::error::{Result, ReconcileError};
use crate::pair::{ConnectionPair, Endpoint, DEFAULT_PORT};
use crate::schema::Direction;

/// Apply an optional owned value directly to a target field.
macro_rules! apply_option {
    ($opt:expr => $target:expr) => {
        if let Some(v) = $opt {
            $target = v;
        }
    };
}

/// Clone a borrowed optional value directly to a target field.
macro_rules! apply_option_clone {
    ($opt:expr => $target:expr) => {
        if let Some(ref v) = $opt {
            $target = v.clone();
        }
    };
}

/// Upper bound for `connect_retries`.
const MAX_CONNECT_RETRIES: u32 = 20;

/// SSL/TLS connection mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Never use TLS.
    Disable,
    /// Try TLS first, fall back to plaintext.
    #[default]
    Prefer,
    /// Require TLS; fail if the handshake fails.
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = ReconcileError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "disabled" => Ok(SslMode::Disable),
            "prefer" | "preferred" => Ok(SslMode::Prefer),
            "require" | "required" => Ok(SslMode::Require),
            _ => Err(ReconcileError::ConfigError(format!(
                "Invalid SSL mode '{}'. Use 'disable', 'prefer', or 'require'.",
                s
            ))),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct ReconcileConfig {
    /// How connections to either side are opened.
    pub connection: ConnectionSettings,
    /// Differ and orchestrator behavior.
    pub reconcile: ReconcileSettings,
    /// Where catalog snapshots are written.
    pub snapshots: SnapshotSettings,
    /// Configured connection pairs.
    pub pairs: Vec<ConnectionPair>,
}

/// Connection behavior shared by every endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Number of times to retry a failed connection (max 20).
    pub connect_retries: u32,
    /// Connection timeout in seconds (0 disables the timeout).
    pub connect_timeout_secs: u32,
    /// SSL/TLS mode for every connection.
    pub ssl_mode: SslMode,
    /// Pool size per endpoint.
    pub max_connections: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_retries: 0,
            connect_timeout_secs: 30,
            ssl_mode: SslMode::Prefer,
            max_connections: 2,
        }
    }
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSettings {
    /// How foreign key modifications are counted.
    pub fk_change_counting: FkChangeCounting,
    /// Direction used when a command does not name one.
    pub default_direction: Direction,
}

/// Catalog snapshot storage.
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    /// Directory snapshot files are written to.
    pub directory: PathBuf,
    /// Snapshots kept per schema; older ones are pruned.
    pub max_snapshots: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".reconcile/snapshots"),
            max_snapshots: 10,
        }
    }
}

// ── TOML deserialization structs ──

#[derive(Deserialize, Default)]
struct TomlConfig {
    connection: Option<TomlConnectionSettings>,
    reconcile: Option<TomlReconcileSettings>,
    snapshots: Option<TomlSnapshotSettings>,
    pairs: Option<Vec<TomlPair>>,
}

#[derive(Deserialize, Default)]
struct TomlConnectionSettings {
    connect_retries: Option<u32>,
    connect_timeout: Option<u32>,
    ssl_mode: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Deserialize, Default)]
struct TomlReconcileSettings {
    fk_change_counting: Option<String>,
    default_direction: Option<String>,
}

#[derive(Deserialize, Default)]
struct TomlSnapshotSettings {
    directory: Option<String>,
    max_snapshots: Option<usize>,
}

#[derive(Deserialize, Default)]
struct TomlPair {
    id: Option<String>,
    label: Option<String>,
    from: Option<TomlEndpoint>,
    to: Option<TomlEndpoint>,
}

#[derive(Deserialize, Default)]
struct TomlEndpoint {
    host: Option<String>,
    port: Option<u16>,
    schema: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl TomlEndpoint {
    fn into_endpoint(self, pair_id: &str, side: &str) -> Result<Endpoint> {
        let schema = self.schema.ok_or_else(|| {
            ReconcileError::ConfigError(format!("Pair '{}': {}.schema is required", pair_id, side))
        })?;
        crate::db::validate_identifier(&schema)?;
        let user = self.user.ok_or_else(|| {
            ReconcileError::ConfigError(format!("Pair '{}': {}.user is required", pair_id, side))
        })?;
        Ok(Endpoint {
            host: self.host.unwrap_or_else(|| "localhost".to_string()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            schema,
            user,
            password: self.password,
        })
    }
}

/// CLI overrides that take highest priority.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the number of connection retries.
    pub connect_retries: Option<u32>,
    /// Override the connection timeout in seconds.
    pub connect_timeout: Option<u32>,
    /// Override the SSL/TLS connection mode.
    pub ssl_mode: Option<String>,
    /// Override the FK change counting policy.
    pub fk_change_counting: Option<FkChangeCounting>,
    /// Override the snapshot directory.
    pub snapshot_directory: Option<PathBuf>,
}

impl ReconcileConfig {
    /// Load configuration with the following priority (highest wins):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. TOML config file
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&str>, overrides: &CliOverrides) -> Result<Self> {
        let mut config = ReconcileConfig::default();

        // Layer 3: TOML config file
        let toml_path = config_path.unwrap_or("reconcile.toml");
        if let Ok(content) = std::fs::read_to_string(toml_path) {
            // Pairs carry passwords
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = std::fs::metadata(toml_path) {
                    let mode = meta.permissions().mode();
                    if mode & 0o077 != 0 {
                        log::warn!("Config file has overly permissive permissions. Consider chmod 600.; path={}, mode={:o}", toml_path, mode);
                    }
                }
            }
            config.apply_toml_str(&content).map_err(|e| match e {
                ReconcileError::ConfigError(msg) => ReconcileError::ConfigError(format!(
                    "Failed to load config file '{}': {}",
                    toml_path, msg
                )),
                other => other,
            })?;
        } else if config_path.is_some() {
            return Err(ReconcileError::ConfigError(format!(
                "Config file '{}' not found",
                toml_path
            )));
        }

        // Layer 2: Environment variables
        config.apply_env();

        // Layer 1: CLI overrides
        config.apply_cli(overrides)?;

        if config.connection.connect_retries > MAX_CONNECT_RETRIES {
            config.connection.connect_retries = MAX_CONNECT_RETRIES;
            log::warn!("connect_retries capped at {}", MAX_CONNECT_RETRIES);
        }

        log::debug!(
            "Configuration loaded; pairs={}, fk_change_counting={}",
            config.pairs.len(),
            config.reconcile.fk_change_counting
        );

        Ok(config)
    }

    /// Look up a configured pair by id.
    pub fn pair(&self, id: &str) -> Result<&ConnectionPair> {
        crate::pair::find(&self.pairs, id)
    }

    fn apply_toml_str(&mut self, content: &str) -> Result<()> {
        let toml_config: TomlConfig = toml::from_str(content)
            .map_err(|e| ReconcileError::ConfigError(e.to_string()))?;
        self.apply_toml(toml_config)
    }

    fn apply_toml(&mut self, toml: TomlConfig) -> Result<()> {
        if let Some(c) = toml.connection {
            apply_option!(c.connect_retries => self.connection.connect_retries);
            apply_option!(c.connect_timeout => self.connection.connect_timeout_secs);
            apply_option!(c.max_connections => self.connection.max_connections);
            if let Some(v) = c.ssl_mode {
                match v.parse() {
                    Ok(mode) => self.connection.ssl_mode = mode,
                    Err(_) => log::warn!(
                        "Invalid ssl_mode '{}' in config, using default 'prefer'. Valid values: disable, prefer, require",
                        v
                    ),
                }
            }
        }

        if let Some(r) = toml.reconcile {
            if let Some(v) = r.fk_change_counting {
                self.reconcile.fk_change_counting = v.parse()?;
            }
            if let Some(v) = r.default_direction {
                self.reconcile.default_direction = v.parse()?;
            }
        }

        if let Some(s) = toml.snapshots {
            if let Some(v) = s.directory {
                self.snapshots.directory = PathBuf::from(v);
            }
            apply_option!(s.max_snapshots => self.snapshots.max_snapshots);
        }

        if let Some(pairs) = toml.pairs {
            let mut resolved = Vec::with_capacity(pairs.len());
            for p in pairs {
                let id = p.id.ok_or_else(|| {
                    ReconcileError::ConfigError("Every [[pairs]] entry needs an id".to_string())
                })?;
                if resolved.iter().any(|existing: &ConnectionPair| existing.id == id) {
                    return Err(ReconcileError::ConfigError(format!(
                        "Duplicate pair id '{}'",
                        id
                    )));
                }
                let from = p
                    .from
                    .ok_or_else(|| {
                        ReconcileError::ConfigError(format!("Pair '{}' has no [pairs.from] endpoint", id))
                    })?
                    .into_endpoint(&id, "from")?;
                let to = p
                    .to
                    .ok_or_else(|| {
                        ReconcileError::ConfigError(format!("Pair '{}' has no [pairs.to] endpoint", id))
                    })?
                    .into_endpoint(&id, "to")?;
                resolved.push(ConnectionPair {
                    id,
                    label: p.label,
                    from,
                    to,
                });
            }
            self.pairs = resolved;
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("RECONCILE_CONNECT_RETRIES") {
            if let Ok(n) = v.parse::<u32>() {
                self.connection.connect_retries = n;
            }
        }
        if let Ok(v) = std::env::var("RECONCILE_CONNECT_TIMEOUT") {
            if let Ok(n) = v.parse::<u32>() {
                self.connection.connect_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("RECONCILE_SSL_MODE") {
            if let Ok(mode) = v.parse() {
                self.connection.ssl_mode = mode;
            }
        }
        if let Ok(v) = std::env::var("RECONCILE_FK_CHANGE_COUNTING") {
            match v.parse() {
                Ok(policy) => self.reconcile.fk_change_counting = policy,
                Err(_) => log::warn!("Ignoring invalid RECONCILE_FK_CHANGE_COUNTING; value={}", v),
            }
        }

        apply_secrets(&mut self.pairs, |key| std::env::var(key).ok());
    }

    fn apply_cli(&mut self, overrides: &CliOverrides) -> Result<()> {
        apply_option!(overrides.connect_retries => self.connection.connect_retries);
        apply_option!(overrides.connect_timeout => self.connection.connect_timeout_secs);
        if let Some(ref v) = overrides.ssl_mode {
            self.connection.ssl_mode = v.parse()?;
        }
        apply_option!(overrides.fk_change_counting => self.reconcile.fk_change_counting);
        apply_option_clone!(overrides.snapshot_directory => self.snapshots.directory);
        Ok(())
    }
}

/// Environment variable holding the secret for one side of a pair.
///
/// `RECONCILE_SECRET_<PAIR_ID>_<FROM|TO>`, with the id upper-cased and any
/// character outside `[A-Z0-9]` replaced by `_`.
pub fn secret_env_key(pair_id: &str, side: &str) -> String {
    let id: String = pair_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("RECONCILE_SECRET_{}_{}", id, side.to_uppercase())
}

fn apply_secrets(pairs: &mut [ConnectionPair], lookup: impl Fn(&str) -> Option<String>) {
    for pair in pairs.iter_mut() {
        if let Some(secret) = lookup(&secret_env_key(&pair.id, "from")) {
            pair.from.password = Some(secret);
        }
        if let Some(secret) = lookup(&secret_env_key(&pair.id, "to")) {
            pair.to.password = Some(secret);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const PAIRS_TOML: &str = r#"
[connection]
connect_retries = 3
connect_timeout = 10
ssl_mode = "require"

[reconcile]
fk_change_counting = "statement"
default_direction = "to_from"

[snapshots]
directory = "snaps"
max_snapshots = 3

[[pairs]]
id = "eu"
label = "EU staging vs production"

[pairs.from]
host = "staging.db"
schema = "shop_staging"
user = "app"
password = "s3cret"

[pairs.to]
host = "prod.db"
port = 3307
schema = "shop_eu"
user = "app"
"#;

    #[test]
    fn test_default_config() {
        let config = ReconcileConfig::default();
        assert_eq!(config.connection.connect_retries, 0);
        assert_eq!(config.connection.connect_timeout_secs, 30);
        assert_eq!(config.connection.ssl_mode, SslMode::Prefer);
        assert_eq!(config.reconcile.fk_change_counting, FkChangeCounting::Logical);
        assert_eq!(config.reconcile.default_direction, Direction::FromTo);
        assert!(config.pairs.is_empty());
    }

    #[test]
    fn test_toml_parsing() {
        let mut config = ReconcileConfig::default();
        config.apply_toml_str(PAIRS_TOML).unwrap();

        assert_eq!(config.connection.connect_retries, 3);
        assert_eq!(config.connection.connect_timeout_secs, 10);
        assert_eq!(config.connection.ssl_mode, SslMode::Require);
        assert_eq!(config.reconcile.fk_change_counting, FkChangeCounting::Statement);
        assert_eq!(config.reconcile.default_direction, Direction::ToFrom);
        assert_eq!(config.snapshots.directory, PathBuf::from("snaps"));
        assert_eq!(config.snapshots.max_snapshots, 3);

        let pair = config.pair("eu").unwrap();
        assert_eq!(pair.display_label(), "EU staging vs production");
        assert_eq!(pair.from.port, DEFAULT_PORT);
        assert_eq!(pair.from.password.as_deref(), Some("s3cret"));
        assert_eq!(pair.to.port, 3307);
        assert_eq!(pair.to.schema, "shop_eu");
        assert!(pair.to.password.is_none());
    }

    #[test]
    fn test_toml_pair_missing_schema() {
        let toml_str = r#"
[[pairs]]
id = "broken"
[pairs.from]
user = "app"
[pairs.to]
schema = "b"
user = "app"
"#;
        let mut config = ReconcileConfig::default();
        let err = config.apply_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("from.schema is required"));
    }

    #[test]
    fn test_toml_pair_invalid_schema_identifier() {
        let toml_str = r#"
[[pairs]]
id = "bad"
[pairs.from]
schema = "shop-eu"
user = "app"
[pairs.to]
schema = "shop"
user = "app"
"#;
        let mut config = ReconcileConfig::default();
        assert!(config.apply_toml_str(toml_str).is_err());
    }

    #[test]
    fn test_toml_duplicate_pair_id() {
        let toml_str = r#"
[[pairs]]
id = "dup"
[pairs.from]
schema = "a"
user = "u"
[pairs.to]
schema = "b"
user = "u"

[[pairs]]
id = "dup"
[pairs.from]
schema = "a"
user = "u"
[pairs.to]
schema = "b"
user = "u"
"#;
        let mut config = ReconcileConfig::default();
        let err = config.apply_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("Duplicate pair id 'dup'"));
    }

    #[test]
    fn test_toml_invalid_direction() {
        let mut config = ReconcileConfig::default();
        let result = config.apply_toml_str("[reconcile]\ndefault_direction = \"sideways\"\n");
        assert!(matches!(result, Err(ReconcileError::InvalidDirection(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = ReconcileConfig::default();
        let overrides = CliOverrides {
            connect_retries: Some(5),
            connect_timeout: Some(3),
            ssl_mode: Some("disable".to_string()),
            fk_change_counting: Some(FkChangeCounting::Statement),
            snapshot_directory: Some(PathBuf::from("/tmp/snaps")),
        };

        config.apply_cli(&overrides).unwrap();

        assert_eq!(config.connection.connect_retries, 5);
        assert_eq!(config.connection.connect_timeout_secs, 3);
        assert_eq!(config.connection.ssl_mode, SslMode::Disable);
        assert_eq!(config.reconcile.fk_change_counting, FkChangeCounting::Statement);
        assert_eq!(config.snapshots.directory, PathBuf::from("/tmp/snaps"));
    }

    #[test]
    fn test_cli_invalid_ssl_mode() {
        let mut config = ReconcileConfig::default();
        let overrides = CliOverrides {
            ssl_mode: Some("maybe".to_string()),
            ..Default::default()
        };
        assert!(config.apply_cli(&overrides).is_err());
    }

    #[test]
    fn test_secret_env_key() {
        assert_eq!(secret_env_key("eu", "from"), "RECONCILE_SECRET_EU_FROM");
        assert_eq!(secret_env_key("eu-west.1", "to"), "RECONCILE_SECRET_EU_WEST_1_TO");
    }

    #[test]
    fn test_apply_secrets_overrides_password() {
        let mut config = ReconcileConfig::default();
        config.apply_toml_str(PAIRS_TOML).unwrap();

        let env: HashMap<&str, &str> = [("RECONCILE_SECRET_EU_TO", "prod-pass")].into_iter().collect();
        apply_secrets(&mut config.pairs, |key| env.get(key).map(|v| v.to_string()));

        let pair = config.pair("eu").unwrap();
        assert_eq!(pair.from.password.as_deref(), Some("s3cret"));
        assert_eq!(pair.to.password.as_deref(), Some("prod-pass"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PAIRS_TOML.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = ReconcileConfig::load(Some(&path), &CliOverrides::default()).unwrap();
        assert_eq!(config.pairs.len(), 1);
        assert!(config.pair("missing").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = ReconcileConfig::load(
            Some("/nonexistent/reconcile.toml"),
            &CliOverrides::default(),
        );
        assert!(matches!(result, Err(ReconcileError::ConfigError(_))));
    }

    #[test]
    fn test_load_caps_connect_retries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[connection]\nconnect_retries = 99\n").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = ReconcileConfig::load(Some(&path), &CliOverrides::default()).unwrap();
        assert_eq!(config.connection.connect_retries, MAX_CONNECT_RETRIES);
    }
}
