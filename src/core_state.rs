//! Shared application state.
//!
//! `CoreState` is built once at startup and shared by every request
//! through `Arc`. It owns no connection: each request opens its own
//! SQLite handle on the configured database file.

use std::path::{Path, PathBuf};

use chrono::Duration;

use crate::config::ServerConfig;
use crate::crypto::TokenIssuer;
use crate::db::{self, DatabaseError};

pub struct CoreState {
    db_path: PathBuf,
    reports_dir: PathBuf,
    tokens: TokenIssuer,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreState {
    /// Build state from configuration and make sure the schema and the
    /// report directory exist.
    pub fn initialize(config: &ServerConfig) -> Result<Self, CoreError> {
        let state = Self::new(
            config.database_path.clone(),
            config.reports_dir(),
            config.jwt_secret.as_bytes(),
            Duration::hours(config.token_ttl_hours),
        );
        std::fs::create_dir_all(&state.reports_dir)?;
        // Runs migrations once so request handlers start from a current schema.
        state.open_db()?;
        tracing::info!(
            db = %state.db_path.display(),
            reports = %state.reports_dir.display(),
            "Core state initialized"
        );
        Ok(state)
    }

    pub fn new(db_path: PathBuf, reports_dir: PathBuf, secret: &[u8], token_ttl: Duration) -> Self {
        Self {
            db_path,
            reports_dir,
            tokens: TokenIssuer::new(secret, token_ttl),
        }
    }

    /// Open a database connection. Most common operation in handlers.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }
}
