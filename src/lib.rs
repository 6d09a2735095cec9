//! migra - linear, reversible SQL migrations for SQLite
//!
//! The [`migrations`] module is the engine: a ledger table records every
//! applied migration, `push` applies one atomically and `pop` reverts the
//! most recent one. The [`cli`] module is the `migra` binary's front end.

pub mod cli;
pub mod migrations;
