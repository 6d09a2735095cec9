//! CLI error type and exit codes

use std::io;

use thiserror::Error;

use crate::migrations::MigrationError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// Bad or missing configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Opening or attaching a database failed
    #[error("database {path}: {source}")]
    Database {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Writing a result to stdout failed
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    pub fn config_error(message: impl Into<String>) -> Self {
        CliError::Config(message.into())
    }

    pub fn database(path: impl Into<String>, source: rusqlite::Error) -> Self {
        CliError::Database {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Database { .. } => 3,
            CliError::Migration(err) => match err {
                MigrationError::Validation { .. }
                | MigrationError::Parse { .. }
                | MigrationError::UnsupportedFormat { .. } => 4,
                MigrationError::Cancelled => 5,
                _ => 1,
            },
            CliError::Output(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::config_error("missing").exit_code(), 2);
        assert_eq!(CliError::from(MigrationError::Cancelled).exit_code(), 5);
        assert_eq!(
            CliError::from(MigrationError::Validation {
                reason: "name is required".to_string()
            })
            .exit_code(),
            4
        );
        assert_eq!(CliError::from(MigrationError::NoMigrationFound).exit_code(), 1);
    }

    #[test]
    fn test_migration_error_is_transparent() {
        let err = CliError::from(MigrationError::NoMigrationFound);
        assert_eq!(err.to_string(), MigrationError::NoMigrationFound.to_string());
    }
}
