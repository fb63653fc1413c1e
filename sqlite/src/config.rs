//! Engine configuration.
//!
//! An [`EngineConfig`] can be built in code or loaded from a YAML or JSON
//! file. Only `path` is required.
//!
//! # Example YAML
//!
//! ```yaml
//! path: /var/lib/app/app.db
//! read_only: false
//! journal_mode: wal
//! access_lane_name: app-db-access
//! migration_lane_name: app-db-migration
//! ```

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqliteError};

pub(crate) const DEFAULT_ACCESS_LANE: &str = "sqlservice-access";
pub(crate) const DEFAULT_MIGRATION_LANE: &str = "sqlservice-migration";

/// SQLite journaling mode, as set by `PRAGMA journal_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    /// Pragma value for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }

    /// Parses the value reported by `PRAGMA journal_mode` (case-insensitive).
    pub fn from_pragma(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DELETE" => Some(JournalMode::Delete),
            "TRUNCATE" => Some(JournalMode::Truncate),
            "PERSIST" => Some(JournalMode::Persist),
            "MEMORY" => Some(JournalMode::Memory),
            "WAL" => Some(JournalMode::Wal),
            "OFF" => Some(JournalMode::Off),
            _ => None,
        }
    }
}

impl fmt::Display for JournalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings used by [`Engine::with_config`](crate::Engine::with_config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Open the file read-only.
    #[serde(default)]
    pub read_only: bool,
    /// Journal mode applied right after opening; `None` keeps SQLite's.
    #[serde(default)]
    pub journal_mode: Option<JournalMode>,
    /// Thread name of the access lane.
    #[serde(default = "default_access_lane_name")]
    pub access_lane_name: String,
    /// Thread name of the migration lane.
    #[serde(default = "default_migration_lane_name")]
    pub migration_lane_name: String,
}

fn default_access_lane_name() -> String {
    DEFAULT_ACCESS_LANE.to_string()
}

fn default_migration_lane_name() -> String {
    DEFAULT_MIGRATION_LANE.to_string()
}

impl EngineConfig {
    /// Creates a read-write configuration for `path` with default lane names.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
            journal_mode: None,
            access_lane_name: default_access_lane_name(),
            migration_lane_name: default_migration_lane_name(),
        }
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Loads configuration from a `.yml`/`.yaml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Io`] if the file cannot be read, or
    /// [`SqliteError::Config`] for an unknown extension or a parse failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let reader = BufReader::new(File::open(path)?);
        match extension.as_deref() {
            Some("yml" | "yaml") => serde_yaml::from_reader(reader)
                .map_err(|e| SqliteError::Config(format!("{}: {e}", path.display()))),
            Some("json") => serde_json::from_reader(reader)
                .map_err(|e| SqliteError::Config(format!("{}: {e}", path.display()))),
            _ => Err(SqliteError::Config(format!(
                "{}: expected a .yml, .yaml or .json file",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_yaml_with_defaults() {
        let config: EngineConfig = serde_yaml::from_str("path: app.db\n").unwrap();
        assert_eq!(config, EngineConfig::new("app.db"));
        assert_eq!(config.access_lane_name, DEFAULT_ACCESS_LANE);
    }

    #[test]
    fn test_load_yaml_and_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("engine.yaml");
        let mut file = File::create(&yaml_path).unwrap();
        writeln!(file, "path: a.db\nread_only: true\njournal_mode: wal").unwrap();
        let yaml = EngineConfig::load(&yaml_path).unwrap();
        assert!(yaml.read_only);
        assert_eq!(yaml.journal_mode, Some(JournalMode::Wal));

        let json_path = dir.path().join("engine.json");
        std::fs::write(
            &json_path,
            r#"{"path": "b.db", "journal_mode": "truncate", "access_lane_name": "lane"}"#,
        )
        .unwrap();
        let json = EngineConfig::load(&json_path).unwrap();
        assert_eq!(json.path, PathBuf::from("b.db"));
        assert_eq!(json.journal_mode, Some(JournalMode::Truncate));
        assert_eq!(json.access_lane_name, "lane");
        assert_eq!(json.migration_lane_name, DEFAULT_MIGRATION_LANE);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "path = 'a.db'").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(SqliteError::Config(_))
        ));
    }

    #[test]
    fn test_journal_mode_pragma_values() {
        assert_eq!(JournalMode::from_pragma("wal"), Some(JournalMode::Wal));
        assert_eq!(JournalMode::from_pragma("memory"), Some(JournalMode::Memory));
        assert_eq!(JournalMode::from_pragma("bogus"), None);
        assert_eq!(JournalMode::Truncate.to_string(), "TRUNCATE");
    }
}
