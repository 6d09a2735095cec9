//! # Migration Ledger
//!
//! Bookkeeping table recording which migrations have been applied and in
//! what order. The ledger only knows how to read and write its own rows;
//! transactions and the apply/revert state machine live in the runner.
//!
//! Every method takes a `&Connection`, so the same calls work on a bare
//! connection or inside a `rusqlite::Transaction`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::errors::{MigrationError, MigrationResult};
use super::Migration;

/// Default ledger table name
pub const DEFAULT_TABLE: &str = "_migrations";

/// Default schema, SQLite's primary database
pub const DEFAULT_SCHEMA: &str = "main";

const COLUMNS: &str = "id, name, description, up, down, position, migrated_at";

/// Identity of a ledger table: a (schema, table) pair.
///
/// Changing either name orphans an existing ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    schema: String,
    table: String,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Ledger {
    /// Empty names fall back to the defaults.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self::default().with_schema(schema).with_table(table)
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        if !schema.is_empty() {
            self.schema = schema;
        }
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if !table.is_empty() {
            self.table = table;
        }
        self
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Schema-qualified, quoted table reference for SQL text
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }

    fn store_error(&self, source: rusqlite::Error) -> MigrationError {
        MigrationError::Store {
            ledger: format!("{}.{}", self.schema, self.table),
            source,
        }
    }

    /// Create the ledger table if absent. Safe to call repeatedly.
    pub fn initialize(&self, conn: &Connection) -> MigrationResult<()> {
        let attached = conn
            .query_row(
                "SELECT 1 FROM pragma_database_list WHERE name = ?1",
                params![self.schema],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| self.store_error(e))?;

        if attached.is_none() {
            return Err(MigrationError::SchemaNotAttached {
                schema: self.schema.clone(),
            });
        }

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                up TEXT,
                down TEXT,
                position INTEGER NOT NULL UNIQUE,
                migrated_at TEXT
            );",
            self.qualified()
        ))
        .map_err(|e| self.store_error(e))
    }

    /// Remove the ledger table. Fails if it does not exist.
    pub fn drop_table(&self, conn: &Connection) -> MigrationResult<()> {
        conn.execute_batch(&format!("DROP TABLE {};", self.qualified()))
            .map_err(|e| self.store_error(e))
    }

    /// Record `migration` with `migrated_at` unset.
    ///
    /// The position comes from the table's AUTOINCREMENT high-water mark, so
    /// positions freed by a pop are never handed out again. The sequence row
    /// keeps the spelling the table was created with, so the lookup ignores
    /// case the way SQLite identifiers do. Returns `false`
    /// without touching anything when the name is already recorded.
    pub fn insert_pending(
        &self,
        conn: &Connection,
        migration: &Migration,
    ) -> rusqlite::Result<bool> {
        let sql = format!(
            "INSERT INTO {table} (name, description, up, down, position)
             VALUES (?1, ?2, ?3, ?4, (
                 SELECT COALESCE(MAX(seq), 0) + 1 FROM {schema}.sqlite_sequence
                 WHERE name = ?5 COLLATE NOCASE
             ))
             ON CONFLICT(name) DO NOTHING",
            table = self.qualified(),
            schema = quote_ident(&self.schema),
        );

        let inserted = conn.execute(
            &sql,
            params![
                migration.name,
                migration.description,
                migration.up,
                migration.down,
                self.table,
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn mark_migrated(
        &self,
        conn: &Connection,
        name: &str,
        at: DateTime<Utc>,
    ) -> rusqlite::Result<()> {
        conn.execute(
            &format!("UPDATE {} SET migrated_at = ?1 WHERE name = ?2", self.qualified()),
            params![at, name],
        )?;
        Ok(())
    }

    pub fn delete_by_name(&self, conn: &Connection, name: &str) -> rusqlite::Result<()> {
        conn.execute(
            &format!("DELETE FROM {} WHERE name = ?1", self.qualified()),
            params![name],
        )?;
        Ok(())
    }

    pub fn fetch_by_name(
        &self,
        conn: &Connection,
        name: &str,
    ) -> MigrationResult<Option<Migration>> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM {} WHERE name = ?1", self.qualified()),
            params![name],
            migration_from_row,
        )
        .optional()
        .map_err(|e| self.store_error(e))
    }

    /// Row with the greatest position, or `NoMigrationFound`
    pub fn fetch_latest(&self, conn: &Connection) -> MigrationResult<Migration> {
        conn.query_row(
            &format!(
                "SELECT {COLUMNS} FROM {} ORDER BY position DESC LIMIT 1",
                self.qualified()
            ),
            [],
            migration_from_row,
        )
        .optional()
        .map_err(|e| self.store_error(e))?
        .ok_or(MigrationError::NoMigrationFound)
    }

    /// All rows, ascending by position
    pub fn fetch_all_ordered(&self, conn: &Connection) -> MigrationResult<Vec<Migration>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM {} ORDER BY position ASC",
                self.qualified()
            ))
            .map_err(|e| self.store_error(e))?;

        let rows = stmt
            .query_map([], migration_from_row)
            .map_err(|e| self.store_error(e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| self.store_error(e))
    }
}

fn migration_from_row(row: &Row<'_>) -> rusqlite::Result<Migration> {
    Ok(Migration {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        up: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        down: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        position: row.get(5)?,
        migrated_at: row.get(6)?,
    })
}

/// Double-quote an identifier, doubling embedded quotes.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
