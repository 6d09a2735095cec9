//! Configuration file and settings resolution
//!
//! Precedence: command-line flag, then environment variable (both handled by
//! clap), then the TOML config file, then built-in defaults.
//!
//! ```toml
//! database = "app.db"
//! schema = "main"
//! table = "_migrations"
//! dir = "migrations"
//! timeout_secs = 30
//!
//! [attach]
//! audit = "audit.db"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::args::GlobalArgs;
use super::errors::{CliError, CliResult};
use crate::migrations::{Context, Ledger};

/// Config file looked up when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "migra.toml";

/// Migration directory used when neither flag nor config names one
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

/// Configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// SQLite database file
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub table: Option<String>,

    /// Directory holding migration files
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra databases to attach, schema name -> file
    #[serde(default)]
    pub attach: BTreeMap<String, PathBuf>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            CliError::config_error(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    /// Load the explicit config file, or the default one if it exists.
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Fully resolved settings for one command
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: Option<PathBuf>,
    pub ledger: Ledger,
    pub migrations_dir: PathBuf,
    pub timeout: Option<Duration>,
    pub attach: BTreeMap<String, PathBuf>,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, config: Config) -> Self {
        let schema = args.schema.clone().or(config.schema).unwrap_or_default();
        let table = args.table.clone().or(config.table).unwrap_or_default();

        Self {
            database: args.database.clone().or(config.database),
            ledger: Ledger::new(schema, table),
            migrations_dir: config
                .dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            timeout: args
                .timeout
                .or(config.timeout_secs)
                .map(Duration::from_secs),
            attach: config.attach,
        }
    }

    /// The database path, required by every command that touches the database
    pub fn database(&self) -> CliResult<&Path> {
        self.database.as_deref().ok_or_else(|| {
            CliError::config_error(
                "no database given; use --database, MIGRA_DATABASE or `database` in migra.toml",
            )
        })
    }

    /// A fresh context carrying the configured deadline
    pub fn context(&self) -> Context {
        match self.timeout {
            Some(timeout) => Context::with_timeout(timeout),
            None => Context::background(),
        }
    }
}
