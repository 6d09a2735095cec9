//! CLI command implementations
//!
//! Each command resolves its settings, opens the database, runs one engine
//! operation and returns a JSON document that [`run`] writes to stdout.

use std::path::Path;

use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::debug;

use crate::migrations::generator::MigrationGenerator;
use crate::migrations::ledger::quote_ident;
use crate::migrations::{Context, Migration, MigrationError, MigrationRunner};

use super::args::{Cli, Command, PopArgs, PushArgs};
use super::config::{Config, Settings};
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Main CLI entry point
///
/// Parses arguments, dispatches to the command and prints its result.
pub fn run(cli: Cli) -> CliResult<()> {
    let config = Config::discover(cli.global.config.as_deref())?;
    let settings = Settings::resolve(&cli.global, config);
    let output = run_command(&settings, cli.command)?;
    write_json(&output)
}

/// Run one command against the resolved settings
pub fn run_command(settings: &Settings, cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::New { name, dir } => {
            let dir = dir.unwrap_or_else(|| settings.migrations_dir.clone());
            new_migration(&dir, &name)
        }
        Command::Init => with_runner(settings, init),
        Command::Push(args) => {
            with_runner(settings, |runner, ctx| push(runner, ctx, settings, args))
        }
        Command::Pop(args) => with_runner(settings, |runner, ctx| pop(runner, ctx, args)),
        Command::List => with_runner(settings, list),
        Command::Latest => with_runner(settings, latest),
        Command::Drop => with_runner(settings, drop_ledger),
    }
}

fn with_runner<F>(settings: &Settings, f: F) -> CliResult<Value>
where
    F: FnOnce(&MigrationRunner<'_>, &Context) -> CliResult<Value>,
{
    let conn = open_database(settings)?;
    let runner = MigrationRunner::with_ledger(&conn, settings.ledger.clone());
    f(&runner, &settings.context())
}

/// Open the configured database and attach the extra schemas.
pub fn open_database(settings: &Settings) -> CliResult<Connection> {
    let path = settings.database()?;
    let label = path.display().to_string();

    let conn = Connection::open(path).map_err(|e| CliError::database(label.clone(), e))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|e| CliError::database(label.clone(), e))?;

    for (schema, file) in &settings.attach {
        debug!(schema = %schema, file = %file.display(), "attaching database");
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {}", quote_ident(schema)),
            [file.to_string_lossy()],
        )
        .map_err(|e| CliError::database(file.display().to_string(), e))?;
    }

    Ok(conn)
}

/// Create the ledger table
pub fn init(runner: &MigrationRunner<'_>, ctx: &Context) -> CliResult<Value> {
    runner.initialize(ctx)?;
    Ok(json!({
        "initialized": true,
        "schema": runner.ledger().schema(),
        "table": runner.ledger().table(),
    }))
}

/// Push a directory, a file, or an inline migration.
///
/// With none of `--dir`, `--file` or `--name` the configured migration
/// directory is pushed.
pub fn push(
    runner: &MigrationRunner<'_>,
    ctx: &Context,
    settings: &Settings,
    args: PushArgs,
) -> CliResult<Value> {
    if let Some(file) = args.file {
        let outcome = runner.push_file(ctx, &file)?;
        return Ok(json!({
            "file": file.to_string_lossy(),
            "outcome": outcome,
        }));
    }

    if let Some(name) = args.name {
        let migration = Migration::new(name, args.up.unwrap_or_default())
            .with_description(args.desc.unwrap_or_default())
            .with_down(args.down.unwrap_or_default());
        let outcome = runner.push(ctx, &migration)?;
        return Ok(json!({
            "name": migration.name,
            "outcome": outcome,
        }));
    }

    let dir = args.dir.unwrap_or_else(|| settings.migrations_dir.clone());
    let report = runner.push_dir(ctx, &dir)?;
    Ok(json!({
        "applied_count": report.applied.len(),
        "applied": report.applied,
        "skipped": report.skipped,
    }))
}

/// Revert one, all, or down to a named migration.
///
/// An empty ledger is reported as "nothing to undo" for a single pop and
/// `--all`. For `--until` it means the target was never reached, which
/// stays an error.
pub fn pop(runner: &MigrationRunner<'_>, ctx: &Context, args: PopArgs) -> CliResult<Value> {
    if let Some(until) = args.until {
        let count = runner.pop_until(ctx, &until)?;
        return Ok(json!({ "reverted_count": count, "latest": until }));
    }

    let result = if args.all {
        runner.pop_all(ctx).map(|count| json!({ "reverted_count": count }))
    } else {
        runner.pop(ctx).map(|migration| json!({ "reverted": migration }))
    };

    match result {
        Err(MigrationError::NoMigrationFound) => Ok(json!({
            "reverted_count": 0,
            "message": "nothing to undo",
        })),
        other => Ok(other?),
    }
}

/// Every applied migration, in position order
pub fn list(runner: &MigrationRunner<'_>, ctx: &Context) -> CliResult<Value> {
    let migrations = runner.list(ctx)?;
    Ok(json!({
        "count": migrations.len(),
        "migrations": migrations,
    }))
}

pub fn latest(runner: &MigrationRunner<'_>, ctx: &Context) -> CliResult<Value> {
    let migration = runner.latest(ctx)?;
    Ok(json!({ "latest": migration }))
}

pub fn drop_ledger(runner: &MigrationRunner<'_>, ctx: &Context) -> CliResult<Value> {
    runner.drop(ctx)?;
    Ok(json!({
        "dropped": true,
        "schema": runner.ledger().schema(),
        "table": runner.ledger().table(),
    }))
}

/// Write a new migration file template
pub fn new_migration(dir: &Path, name: &str) -> CliResult<Value> {
    let generator = MigrationGenerator::new(dir.to_path_buf());
    let file_path = generator.create(name)?;
    Ok(json!({
        "created": true,
        "file": file_path.to_string_lossy(),
    }))
}
