//! CLI argument definitions using clap
//!
//! Commands:
//! - migra init
//! - migra push [--dir <dir> | --file <file> | --name <name> --up <sql> ...]
//! - migra pop [--all | --until <name>]
//! - migra list
//! - migra latest
//! - migra drop
//! - migra new --name <name>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// migra - linear, reversible SQL migrations for SQLite
#[derive(Parser, Debug)]
#[command(name = "migra")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// SQLite database file
    #[arg(short = 'D', long, env = "MIGRA_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Schema (attached database) holding the migrations table
    #[arg(short, long, env = "MIGRA_SCHEMA", global = true)]
    pub schema: Option<String>,

    /// Migrations table
    #[arg(short, long, env = "MIGRA_TABLE", global = true)]
    pub table: Option<String>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "MIGRA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Abort the command after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the migrations table
    Init,

    /// Apply migrations
    #[command(visible_aliases = ["add", "up"])]
    Push(PushArgs),

    /// Revert migrations
    #[command(visible_aliases = ["rm", "remove", "down"])]
    Pop(PopArgs),

    /// List applied migrations
    #[command(visible_alias = "ls")]
    List,

    /// Show the most recently applied migration
    Latest,

    /// Drop the migrations table
    Drop,

    /// Create a new migration file
    New {
        /// Name for the migration (will be sanitized)
        #[arg(long)]
        name: String,

        /// Directory to write the file to (defaults to the configured dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct PushArgs {
    /// Directory containing migration files
    #[arg(short, long, conflicts_with_all = ["file", "name"])]
    pub dir: Option<PathBuf>,

    /// A single migration file
    #[arg(short, long, conflicts_with = "name")]
    pub file: Option<PathBuf>,

    /// Name of an inline migration
    #[arg(long)]
    pub name: Option<String>,

    /// Description of an inline migration
    #[arg(long, requires = "name")]
    pub desc: Option<String>,

    /// Up statement(s) of an inline migration
    #[arg(long, requires = "name")]
    pub up: Option<String>,

    /// Down statement(s) of an inline migration
    #[arg(long, requires = "name")]
    pub down: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PopArgs {
    /// Pop every migration
    #[arg(short, long, conflicts_with = "until")]
    pub all: bool,

    /// Pop until the migration with this name is the latest
    #[arg(long)]
    pub until: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
