//! Configuration for the Phase MCP Server

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::identity::KeyMode;
use crate::store::{SessionStore, SqliteBackend};

/// Where sessions are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

/// Phase MCP configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// SQLite database for sessions and interactions
    /// Default: ~/.binks/phase-sessions.db
    pub database_path: PathBuf,

    pub storage: StorageKind,

    /// Session key derivation; `plain` drops the hash suffix
    pub key_mode: KeyMode,

    /// Project used when a call names none. Default: working directory
    pub project_path: Option<PathBuf>,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".binks")
                .join("phase-sessions.db"),
            storage: StorageKind::default(),
            key_mode: KeyMode::default(),
            project_path: None,
        }
    }
}

impl PhaseConfig {
    /// Load configuration, then apply environment overrides
    ///
    /// Looks for config in:
    /// 1. `PHASE_MCP_CONFIG` environment variable
    /// 2. `~/.binks/phase.toml`
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let config_path = if let Ok(path) = std::env::var("PHASE_MCP_CONFIG") {
            Some(PathBuf::from(path))
        } else {
            dirs::home_dir().map(|h| h.join(".binks").join("phase.toml"))
        };

        let config = match config_path.filter(|p| p.exists()) {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config from {:?}", path))?;
                Self::from_toml(&content)
                    .with_context(|| format!("Failed to parse config from {:?}", path))?
            }
            None => Self::default(),
        };

        let test_mode = std::env::var("PHASE_MCP_TEST_MODE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(config.with_overrides(std::env::var("PHASE_MCP_PROJECT_PATH").ok(), test_mode))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// In-memory storage and plain session keys
    pub fn test_mode() -> Self {
        Self {
            storage: StorageKind::Memory,
            key_mode: KeyMode::Plain,
            ..Default::default()
        }
    }

    fn with_overrides(mut self, project_path: Option<String>, test_mode: bool) -> Self {
        if let Some(path) = project_path.filter(|p| !p.trim().is_empty()) {
            self.project_path = Some(PathBuf::from(path));
        }
        if test_mode {
            self.storage = StorageKind::Memory;
            self.key_mode = KeyMode::Plain;
        }
        self
    }

    /// Open the configured session store
    pub fn open_store(&self) -> Result<SessionStore> {
        match self.storage {
            StorageKind::Memory => Ok(SessionStore::in_memory()),
            StorageKind::Sqlite => {
                let backend = SqliteBackend::open(&self.database_path).with_context(|| {
                    format!("Failed to open session database at {:?}", self.database_path)
                })?;
                Ok(SessionStore::new(Arc::new(backend)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PhaseConfig::from_toml("").unwrap();
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.key_mode, KeyMode::Hashed);
        assert!(config.database_path.ends_with(".binks/phase-sessions.db"));
        assert!(config.project_path.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = PhaseConfig::from_toml(
            r#"
            database_path = "/var/lib/phase/sessions.db"
            storage = "memory"
            key_mode = "plain"
            project_path = "/work/shop"
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/phase/sessions.db"));
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.key_mode, KeyMode::Plain);
        assert_eq!(config.project_path, Some(PathBuf::from("/work/shop")));
    }

    #[test]
    fn test_rejects_unknown_storage() {
        assert!(PhaseConfig::from_toml(r#"storage = "postgres""#).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = PhaseConfig::default().with_overrides(Some("/work/other".to_string()), true);
        assert_eq!(config.project_path, Some(PathBuf::from("/work/other")));
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.key_mode, KeyMode::Plain);

        let config = PhaseConfig::default().with_overrides(Some(" ".to_string()), false);
        assert!(config.project_path.is_none());
        assert_eq!(config.storage, StorageKind::Sqlite);
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PhaseConfig {
            database_path: dir.path().join("db").join("sessions.db"),
            ..Default::default()
        };
        config.open_store().unwrap();
        assert!(config.database_path.exists());
    }
}
