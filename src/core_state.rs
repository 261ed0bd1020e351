//! Shared application state.
//!
//! `CoreState` is wrapped in `Arc` at startup and handed to the HTTP layer.
//! It holds no open connection: each request opens its own, so SQLite's
//! locking (not a process mutex) decides which writer goes first.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::Connection;

use crate::config::ClinicConfig;
use crate::db;

pub struct CoreState {
    database_path: PathBuf,
    started_at: Instant,
}

impl CoreState {
    /// Prepare the data directory and bring the schema up to date.
    pub fn open(database_path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let database_path = database_path.into();
        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::DataDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        // migrations run here once, later opens find the schema current
        db::open_database(&database_path)?;
        tracing::info!(path = %database_path.display(), "Database ready");
        Ok(Self {
            database_path,
            started_at: Instant::now(),
        })
    }

    pub fn from_config(config: &ClinicConfig) -> Result<Self, CoreError> {
        Self::open(&config.database_path)
    }

    /// Open a fresh connection for one request.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        db::open_database(&self.database_path).map_err(CoreError::Database)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Cannot create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clinic.db");

        let core = CoreState::open(&path).unwrap();

        assert!(path.exists());
        assert_eq!(core.database_path(), path.as_path());
    }

    #[test]
    fn connections_share_one_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let core = CoreState::open(dir.path().join("clinic.db")).unwrap();

        let first = core.open_db().unwrap();
        first
            .execute("INSERT INTO specializations (id, name) VALUES ('s-1', 'Surgery')", [])
            .unwrap();
        let second = core.open_db().unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM specializations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn from_config_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClinicConfig {
            database_path: dir.path().join("configured.db"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        };
        let core = CoreState::from_config(&config).unwrap();
        assert!(core.database_path().ends_with("configured.db"));
    }
}
