//! migra command-line front end
//!
//! Resolves settings from flags, environment and `migra.toml`, runs one
//! engine operation and prints the result as JSON on stdout.

pub mod args;
pub mod commands;
pub mod config;
pub mod errors;
pub mod io;

pub use args::Cli;
pub use commands::run;
pub use errors::{CliError, CliResult};
