//! # Cancellation Context
//!
//! Every engine operation takes a [`Context`]. While a transaction is open the
//! runner installs a SQLite progress handler that interrupts the running
//! statement once the context is cancelled, so the transaction rolls back
//! instead of committing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use super::errors::{MigrationError, MigrationResult};

/// Number of SQLite virtual machine instructions between cancellation checks.
const PROGRESS_INTERVAL: i32 = 1000;

/// Cancellation flag plus optional deadline. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Fail with `Cancelled` if the context is done.
    pub fn check(&self) -> MigrationResult<()> {
        if self.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }

    /// Replace `err` with `Cancelled` when the failure was caused by this context.
    pub(crate) fn explain(&self, err: MigrationError) -> MigrationError {
        if self.is_cancelled() {
            MigrationError::Cancelled
        } else {
            err
        }
    }

    /// Interrupt statements on `conn` once cancelled, until the guard drops.
    ///
    /// Replaces any progress handler already set on `conn`; dropping the
    /// guard leaves the connection with none.
    ///
    /// Declare the guard after the transaction it protects so that it is
    /// dropped first and the rollback itself is never interrupted.
    pub(crate) fn interrupt<'c>(&self, conn: &'c Connection) -> InterruptGuard<'c> {
        let ctx = self.clone();
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || ctx.is_cancelled()));
        InterruptGuard { conn }
    }
}

/// Removes the progress handler installed by [`Context::interrupt`].
pub(crate) struct InterruptGuard<'c> {
    conn: &'c Connection,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
