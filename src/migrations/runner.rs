//! # Migration Runner
//!
//! Apply/revert state machine on top of the [`Ledger`]:
//! - `push` inserts, executes `up` and marks the row in one transaction
//! - `pop` executes `down` and deletes the row of the highest position
//! - bulk helpers (`push_many`, `push_dir`, `pop_all`, `pop_until`) are plain
//!   loops over the single-step operations, so each step commits on its own
//!
//! The runner borrows a connection it does not own and never closes it.
//! There is no cross-process lock on the ledger: two processes pushing and
//! popping against the same table rely entirely on SQLite's own locking.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::Context;
use super::errors::{MigrationError, MigrationResult};
use super::ledger::Ledger;
use super::loader;
use super::Migration;

/// Result of a single push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushOutcome {
    /// `up` executed and the migration was recorded
    Applied,
    /// Already recorded; nothing executed
    Skipped,
}

/// Report from a bulk push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationRunReport {
    /// Names applied by this run, in order
    pub applied: Vec<String>,
    /// Names that were already recorded
    pub skipped: Vec<String>,
}

impl MigrationRunReport {
    fn record(&mut self, name: &str, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Applied => self.applied.push(name.to_string()),
            PushOutcome::Skipped => self.skipped.push(name.to_string()),
        }
    }
}

/// Migration runner bound to one connection and one ledger.
///
/// While an operation runs, the runner installs its own SQLite progress
/// handler on the connection to honour cancellation, and clears it when the
/// operation ends. A progress handler the caller set beforehand is replaced
/// and not restored.
pub struct MigrationRunner<'c> {
    conn: &'c Connection,
    ledger: Ledger,
}

impl<'c> MigrationRunner<'c> {
    /// Runner using the default `main._migrations` ledger
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_ledger(conn, Ledger::default())
    }

    pub fn with_ledger(conn: &'c Connection, ledger: Ledger) -> Self {
        Self { conn, ledger }
    }

    /// The borrowed connection, for running queries outside of migrations
    pub fn connection(&self) -> &'c Connection {
        self.conn
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Create the ledger table (idempotent).
    pub fn initialize(&self, ctx: &Context) -> MigrationResult<()> {
        ctx.check()?;
        let _guard = ctx.interrupt(self.conn);
        self.ledger
            .initialize(self.conn)
            .map_err(|e| ctx.explain(e))?;
        debug!(ledger = %self.ledger.qualified(), "ledger initialized");
        Ok(())
    }

    /// Drop the ledger table. Applied schema changes are left in place.
    pub fn drop(&self, ctx: &Context) -> MigrationResult<()> {
        ctx.check()?;
        let _guard = ctx.interrupt(self.conn);
        self.ledger
            .drop_table(self.conn)
            .map_err(|e| ctx.explain(e))?;
        info!(ledger = %self.ledger.qualified(), "ledger dropped");
        Ok(())
    }

    fn begin(&self, ctx: &Context) -> MigrationResult<Transaction<'c>> {
        ctx.check()?;
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate).map_err(|e| {
            MigrationError::Store {
                ledger: self.ledger.qualified(),
                source: e,
            }
        })
    }

    /// Apply one migration.
    ///
    /// Validation happens before the database is touched. A migration whose
    /// name is already recorded is skipped without executing anything.
    pub fn push(&self, ctx: &Context, migration: &Migration) -> MigrationResult<PushOutcome> {
        migration.validate()?;

        let tx = self.begin(ctx)?;
        let guard = ctx.interrupt(self.conn);
        let name = migration.name.as_str();

        if let Some(existing) = self
            .ledger
            .fetch_by_name(&tx, name)
            .map_err(|e| ctx.explain(e))?
        {
            if existing.up != migration.up {
                warn!(
                    migration = name,
                    "up statement differs from the recorded one; not re-applying"
                );
            }
            debug!(migration = name, "already applied, skipping");
            return Ok(PushOutcome::Skipped);
        }

        let step = |result: rusqlite::Result<()>| {
            result.map_err(|e| ctx.explain(MigrationError::execution(name, e)))
        };

        let inserted = self
            .ledger
            .insert_pending(&tx, migration)
            .map_err(|e| ctx.explain(MigrationError::execution(name, e)))?;
        if !inserted {
            return Ok(PushOutcome::Skipped);
        }

        step(tx.execute_batch(&migration.up))?;
        step(self.ledger.mark_migrated(&tx, name, Utc::now()))?;

        drop(guard);
        step(tx.commit())?;

        info!(migration = name, "migration applied");
        Ok(PushOutcome::Applied)
    }

    /// Apply each migration in order, stopping at the first error.
    ///
    /// Migrations before the failing one stay applied.
    pub fn push_many<'m, I>(
        &self,
        ctx: &Context,
        migrations: I,
    ) -> MigrationResult<MigrationRunReport>
    where
        I: IntoIterator<Item = &'m Migration>,
    {
        let mut report = MigrationRunReport::default();
        for migration in migrations {
            let outcome = self.push(ctx, migration)?;
            report.record(&migration.name, outcome);
        }
        Ok(report)
    }

    /// Load one migration file and push it.
    pub fn push_file(&self, ctx: &Context, path: &Path) -> MigrationResult<PushOutcome> {
        let migration = loader::load_migration_file(path)?;
        self.push(ctx, &migration)
    }

    /// Push every migration file under `dir`, recursively, sorted by file name.
    pub fn push_dir(&self, ctx: &Context, dir: &Path) -> MigrationResult<MigrationRunReport> {
        let mut report = MigrationRunReport::default();
        for path in loader::discover_migration_files(dir)? {
            info!(file = %path.display(), "running migration file");
            let migration = loader::load_migration_file(&path)?;
            let outcome = self.push(ctx, &migration)?;
            report.record(&migration.name, outcome);
        }
        Ok(report)
    }

    /// Revert the most recently applied migration and return it.
    pub fn pop(&self, ctx: &Context) -> MigrationResult<Migration> {
        let tx = self.begin(ctx)?;
        let guard = ctx.interrupt(self.conn);

        let latest = self.ledger.fetch_latest(&tx).map_err(|e| ctx.explain(e))?;
        let name = latest.name.as_str();

        let step = |result: rusqlite::Result<()>| {
            result.map_err(|e| ctx.explain(MigrationError::execution(name, e)))
        };

        if latest.down.trim().is_empty() {
            warn!(migration = name, "migration has no down statement");
        }
        step(tx.execute_batch(&latest.down))?;
        step(self.ledger.delete_by_name(&tx, name))?;

        drop(guard);
        step(tx.commit())?;

        info!(migration = name, "migration reverted");
        Ok(latest)
    }

    /// Revert every migration and return how many were reverted.
    ///
    /// An empty ledger on the first attempt is reported as
    /// `NoMigrationFound`, so "nothing to do" stays distinguishable from
    /// "reverted everything".
    pub fn pop_all(&self, ctx: &Context) -> MigrationResult<usize> {
        let mut popped = 0;
        loop {
            match self.pop(ctx) {
                Ok(_) => popped += 1,
                Err(MigrationError::NoMigrationFound) if popped > 0 => return Ok(popped),
                Err(e) => {
                    if popped > 0 {
                        warn!(reverted = popped, error = %e, "pop all stopped partway");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Revert until the latest migration is `name`, which stays applied.
    ///
    /// If `name` is not in the ledger every migration is reverted and
    /// `NoMigrationFound` is returned once the ledger is empty.
    pub fn pop_until(&self, ctx: &Context, name: &str) -> MigrationResult<usize> {
        let mut popped = 0;
        loop {
            let latest = self.latest(ctx)?;
            if latest.name == name {
                return Ok(popped);
            }
            self.pop(ctx)?;
            popped += 1;
        }
    }

    /// All ledger rows, ascending by position
    pub fn list(&self, ctx: &Context) -> MigrationResult<Vec<Migration>> {
        ctx.check()?;
        let _guard = ctx.interrupt(self.conn);
        self.ledger
            .fetch_all_ordered(self.conn)
            .map_err(|e| ctx.explain(e))
    }

    /// Highest-position row, or `NoMigrationFound`
    pub fn latest(&self, ctx: &Context) -> MigrationResult<Migration> {
        ctx.check()?;
        let _guard = ctx.interrupt(self.conn);
        self.ledger
            .fetch_latest(self.conn)
            .map_err(|e| ctx.explain(e))
    }
}
