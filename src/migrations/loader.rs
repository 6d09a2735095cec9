//! # Migration Loader
//!
//! Turns migration files into [`Migration`] values. The format is picked
//! from the file extension; directory traversal is recursive and visits the
//! entries of each directory sorted by file name, so a numbered naming
//! convention (`001_users.yaml`, `002_posts.yaml`) fixes the apply order.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::errors::{MigrationError, MigrationResult};
use super::Migration;

/// Serialization format of a migration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationFormat {
    Yaml,
    Json,
    Toml,
}

impl MigrationFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Parse migration `contents`; `path` selects the format and labels errors.
///
/// Works for files embedded with `include_str!` as well as files on disk.
pub fn parse_migration(path: &Path, contents: &str) -> MigrationResult<Migration> {
    let format = MigrationFormat::from_path(path).ok_or_else(|| {
        MigrationError::UnsupportedFormat {
            path: path.to_path_buf(),
        }
    })?;

    let parsed: Result<Migration, String> = match format {
        MigrationFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
        MigrationFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
        MigrationFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| MigrationError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Read and parse a single migration file
pub fn load_migration_file(path: &Path) -> MigrationResult<Migration> {
    if MigrationFormat::from_path(path).is_none() {
        return Err(MigrationError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents = fs::read_to_string(path).map_err(|e| MigrationError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_migration(path, &contents)
}

/// Every migration file below `dir` in apply order.
///
/// Files without a recognised extension are skipped.
pub fn discover_migration_files(dir: &Path) -> MigrationResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(MigrationError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    collect(dir, &mut files)?;
    Ok(files)
}

fn collect(dir: &Path, files: &mut Vec<PathBuf>) -> MigrationResult<()> {
    let read_error = |e: std::io::Error| MigrationError::FileRead {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut entries = fs::read_dir(dir)
        .map_err(read_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_error)?;
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for path in entries {
        if path.is_dir() {
            collect(&path, files)?;
        } else if MigrationFormat::from_path(&path).is_some() {
            files.push(path);
        } else {
            debug!(file = %path.display(), "skipping non-migration file");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            MigrationFormat::from_path(Path::new("a/001.yml")),
            Some(MigrationFormat::Yaml)
        );
        assert_eq!(
            MigrationFormat::from_path(Path::new("001.YAML")),
            Some(MigrationFormat::Yaml)
        );
        assert_eq!(
            MigrationFormat::from_path(Path::new("001.json")),
            Some(MigrationFormat::Json)
        );
        assert_eq!(
            MigrationFormat::from_path(Path::new("001.toml")),
            Some(MigrationFormat::Toml)
        );
        assert_eq!(MigrationFormat::from_path(Path::new("README.md")), None);
        assert_eq!(MigrationFormat::from_path(Path::new(".gitkeep")), None);
    }

    #[test]
    fn test_parse_yaml_with_block_scalars() {
        let contents = r#"
name: "create_users"
description: "Creates the users table"
up: |
  CREATE TABLE users (id INTEGER PRIMARY KEY);
  CREATE INDEX users_id ON users (id);
down: DROP TABLE users
extra: ignored
"#;
        let migration = parse_migration(Path::new("001_users.yaml"), contents).unwrap();
        assert_eq!(migration.name, "create_users");
        assert_eq!(migration.description, "Creates the users table");
        assert!(migration.up.contains("CREATE INDEX"));
        assert_eq!(migration.down, "DROP TABLE users");
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let migration = parse_migration(Path::new("m.json"), r#"{"name": "x"}"#).unwrap();
        assert_eq!(migration.name, "x");
        assert!(migration.up.is_empty());
        assert!(migration.validate().is_err());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = parse_migration(Path::new("broken.toml"), "name = ").unwrap_err();
        match err {
            MigrationError::Parse { path, .. } => assert_eq!(path, Path::new("broken.toml")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let result = load_migration_file(Path::new("migrations/notes.txt"));
        assert!(matches!(result, Err(MigrationError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_migration_file(&temp_dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(MigrationError::FileRead { .. })));
    }

    #[test]
    fn test_discover_sorts_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::create_dir_all(dir.join("b_nested")).unwrap();
        for file in ["c.yaml", "a.json", "b_nested/z.toml", "b_nested/y.yml", ".gitkeep"] {
            fs::write(dir.join(file), "").unwrap();
        }

        let found: Vec<_> = discover_migration_files(dir)
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(dir).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("a.json"),
                PathBuf::from("b_nested/y.yml"),
                PathBuf::from("b_nested/z.toml"),
                PathBuf::from("c.yaml"),
            ]
        );
    }

    #[test]
    fn test_discover_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = discover_migration_files(&temp_dir.path().join("nope"));
        assert!(matches!(result, Err(MigrationError::DirectoryNotFound { .. })));
    }
}
