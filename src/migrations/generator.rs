//! # Migration Generator
//!
//! Writes new, numbered migration file templates. The numeric prefix only
//! orders files for `push_dir`; the `name` key is what the ledger records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::errors::{MigrationError, MigrationResult};

/// Migration generator
pub struct MigrationGenerator {
    migrations_dir: PathBuf,
}

impl MigrationGenerator {
    pub fn new(migrations_dir: PathBuf) -> Self {
        Self { migrations_dir }
    }

    /// Generate a new migration file and return its path.
    ///
    /// The template leaves `up` empty, so pushing it unedited fails
    /// validation instead of recording a migration that does nothing.
    pub fn create(&self, name: &str) -> MigrationResult<PathBuf> {
        if !self.migrations_dir.exists() {
            fs::create_dir_all(&self.migrations_dir).map_err(|e| MigrationError::FileWrite {
                path: self.migrations_dir.clone(),
                source: e,
            })?;
        }

        let sanitized_name = sanitize(name);
        if sanitized_name.is_empty() {
            return Err(MigrationError::Validation {
                reason: "migration name is required".to_string(),
            });
        }

        let next_number = self.next_number()?;
        let file_path = self
            .migrations_dir
            .join(format!("{:03}_{}.yaml", next_number, sanitized_name));

        fs::write(&file_path, Self::template(&sanitized_name)).map_err(|e| {
            MigrationError::FileWrite {
                path: file_path.clone(),
                source: e,
            }
        })?;

        Ok(file_path)
    }

    /// Highest numeric file prefix in the directory plus one
    fn next_number(&self) -> MigrationResult<u64> {
        let mut max_number = 0;

        for entry in fs::read_dir(&self.migrations_dir).map_err(|e| MigrationError::FileRead {
            path: self.migrations_dir.clone(),
            source: e,
        })? {
            let entry = entry.map_err(|e| MigrationError::FileRead {
                path: self.migrations_dir.clone(),
                source: e,
            })?;

            if let Some(number) = file_number(&entry.path()) {
                max_number = max_number.max(number);
            }
        }

        Ok(max_number + 1)
    }

    /// YAML template for a migration called `name`
    pub fn template(name: &str) -> String {
        format!(
            r#"# Created: {created}
#
# `up` runs when the migration is pushed, `down` when it is popped.
# Both may hold several statements separated by `;`.

name: "{name}"
description: ""
up: ""
#  CREATE TABLE example (id INTEGER PRIMARY KEY);
down: ""
#  DROP TABLE example;
"#,
            created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        )
    }
}

/// Lowercase, with every non-alphanumeric character replaced by `_`
fn sanitize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Parse the numeric prefix of `001_name.yaml` (or `001.yaml`)
fn file_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let prefix = stem.split('_').next()?;
    prefix.parse().ok()
}
