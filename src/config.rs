use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// How temporal columns are rendered before insert.
///
/// `Parsed` turns `YYYY/MM/DD HH:MM:SS` cells into a canonical timestamp and
/// NULLs anything unparseable; `Verbatim` forwards the trimmed text unchanged
/// for downstream systems that keep the original formatting. One mode applies
/// uniformly to a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    #[default]
    Parsed,
    Verbatim,
}

/// Destination and behaviour settings for one import run.
///
/// Constructed by the caller and handed to the orchestrator; nothing in the
/// pipeline reads ambient process state, so tests can target throwaway
/// databases side by side.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Path of the destination SQLite database, created on first open.
    pub database: PathBuf,
    #[serde(default)]
    pub date_mode: DateMode,
    /// When false, the `batch_tag` column is omitted from inserts entirely
    /// (the non-tagged deployment variant).
    #[serde(default = "default_tag_rows")]
    pub tag_rows: bool,
}

fn default_tag_rows() -> bool {
    true
}

impl ImportConfig {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            date_mode: DateMode::default(),
            tag_rows: true,
        }
    }

    /// Load a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_defaults_apply() {
        let cfg: ImportConfig = serde_yaml::from_str("database: /tmp/audit.db\n").unwrap();
        assert_eq!(cfg.database, PathBuf::from("/tmp/audit.db"));
        assert_eq!(cfg.date_mode, DateMode::Parsed);
        assert!(cfg.tag_rows);
    }

    #[test]
    fn yaml_overrides_apply() {
        let cfg: ImportConfig =
            serde_yaml::from_str("database: audit.db\ndate_mode: verbatim\ntag_rows: false\n")
                .unwrap();
        assert_eq!(cfg.date_mode, DateMode::Verbatim);
        assert!(!cfg.tag_rows);
    }
}
