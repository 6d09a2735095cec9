//! # SQL Migrations
//!
//! A linear stack of named, reversible SQL changes recorded in a ledger table
//! inside the target database.
//!
//! # Design Principles
//!
//! 1. **Linear**: Migrations apply in push order and revert in reverse order
//! 2. **Idempotent**: Pushing an already recorded name is a no-op
//! 3. **Transactional**: Insert, execute and mark happen in one transaction
//! 4. **Reversible**: `down` undoes `up`; popping removes the ledger row
//!
//! # Migration File Format
//!
//! Files are YAML, JSON or TOML documents with four keys:
//!
//! ```yaml
//! name: create_users
//! description: Creates the users table
//! up: CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)
//! down: DROP TABLE users
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use migra::migrations::{Context, Migration, MigrationRunner};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("app.db").unwrap();
//! let runner = MigrationRunner::new(&conn);
//! let ctx = Context::background();
//!
//! runner.initialize(&ctx).unwrap();
//! runner
//!     .push(&ctx, &Migration::new("create_users", "CREATE TABLE users (id INTEGER)")
//!         .with_down("DROP TABLE users"))
//!     .unwrap();
//! runner.pop(&ctx).unwrap();
//! ```

pub mod context;
pub mod errors;
pub mod generator;
pub mod ledger;
pub mod loader;
pub mod runner;

pub use context::Context;
pub use errors::{MigrationError, MigrationResult};
pub use ledger::{Ledger, DEFAULT_SCHEMA, DEFAULT_TABLE};
pub use runner::{MigrationRunReport, MigrationRunner, PushOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, reversible unit of schema change.
///
/// `id`, `position` and `migrated_at` are assigned by the ledger and are never
/// read from migration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Ledger row surrogate key
    #[serde(skip_deserializing)]
    pub id: i64,

    /// Unique name, also the lookup key for `pop_until`
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Forward statement(s)
    #[serde(default)]
    pub up: String,

    /// Reverse statement(s)
    #[serde(default)]
    pub down: String,

    /// Apply/revert order, strictly increasing and never reused
    #[serde(skip_deserializing)]
    pub position: i64,

    /// Set once `up` has executed
    #[serde(skip_deserializing)]
    pub migrated_at: Option<DateTime<Utc>>,
}

impl Migration {
    pub fn new(name: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: up.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_down(mut self, down: impl Into<String>) -> Self {
        self.down = down.into();
        self
    }

    /// Validate required fields before the database is touched.
    ///
    /// Any non-empty name is accepted as is; `up` must hold more than
    /// whitespace.
    pub fn validate(&self) -> MigrationResult<()> {
        if self.name.is_empty() {
            return Err(MigrationError::Validation {
                reason: "migration name is required".to_string(),
            });
        }

        if self.up.trim().is_empty() {
            return Err(MigrationError::Validation {
                reason: format!("up sql is required for migration '{}'", self.name),
            });
        }

        Ok(())
    }

    pub fn is_migrated(&self) -> bool {
        self.migrated_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_validation_empty_name() {
        let migration = Migration::new("", "CREATE TABLE t (id INTEGER)");

        let result = migration.validate();
        assert!(matches!(result, Err(MigrationError::Validation { .. })));
        assert!(result.unwrap_err().to_string().contains("name"));
    }

    #[test]
    fn test_whitespace_name_is_not_empty() {
        let migration = Migration::new(" ", "CREATE TABLE t (id INTEGER)");
        assert!(migration.validate().is_ok());
    }

    #[test]
    fn test_migration_validation_empty_up() {
        let migration = Migration::new("create_t", "   ");

        let result = migration.validate();
        assert!(matches!(result, Err(MigrationError::Validation { .. })));
        assert!(result.unwrap_err().to_string().contains("up"));
    }

    #[test]
    fn test_migration_builder() {
        let migration = Migration::new("create_t", "CREATE TABLE t (id INTEGER)")
            .with_description("table t")
            .with_down("DROP TABLE t");

        assert!(migration.validate().is_ok());
        assert_eq!(migration.description, "table t");
        assert_eq!(migration.down, "DROP TABLE t");
        assert!(!migration.is_migrated());
    }

    #[test]
    fn test_ledger_fields_are_not_deserialized() {
        let migration: Migration = serde_json::from_str(
            r#"{"name": "a", "up": "SELECT 1", "position": 99, "id": 7}"#,
        )
        .unwrap();

        assert_eq!(migration.name, "a");
        assert_eq!(migration.position, 0);
        assert_eq!(migration.id, 0);
        assert!(migration.migrated_at.is_none());
    }
}
