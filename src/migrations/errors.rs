//! # Migration Errors
//!
//! Every failure the engine can report. `NoMigrationFound` is an expected
//! condition rather than a crash signal: callers use it to stop pop loops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Migration error types
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Caller-supplied migration is missing a required field
    #[error("Invalid migration: {reason}")]
    Validation { reason: String },

    /// The ledger has no row to act on
    #[error("no migration found")]
    NoMigrationFound,

    /// A statement belonging to a migration failed; its transaction was rolled back
    #[error("Migration '{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Ledger table management or read failure
    #[error("Ledger {ledger} error: {source}")]
    Store {
        ledger: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The ledger schema is not attached to the connection
    #[error("Schema '{schema}' is not attached to the connection")]
    SchemaNotAttached { schema: String },

    /// The operation's context was cancelled or its deadline passed
    #[error("Operation cancelled")]
    Cancelled,

    /// Migration file could not be read
    #[error("Failed to read migration file {path:?}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Migration file could not be written
    #[error("Failed to write migration file {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Migration file failed to deserialize
    #[error("Failed to parse migration {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    /// File extension does not name a known migration format
    #[error("Unsupported migration format {path:?} (expected yaml, yml, json or toml)")]
    UnsupportedFormat { path: PathBuf },

    /// Migration directory does not exist
    #[error("Migration directory not found: {path:?}")]
    DirectoryNotFound { path: PathBuf },
}

impl MigrationError {
    /// True for the "nothing left to revert" sentinel.
    pub fn is_no_migration(&self) -> bool {
        matches!(self, Self::NoMigrationFound)
    }

    pub(crate) fn execution(name: &str, source: rusqlite::Error) -> Self {
        Self::Execution {
            name: name.to_string(),
            source,
        }
    }
}
