//! Database handle and schema bootstrap.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::repos::RepoStore;
use crate::webhook_logs::WebhookLogStore;

/// Connection shared by every store opened from one [`Database`].
pub(crate) type SharedConnection = Arc<Mutex<Connection>>;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS repo (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS webhook_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    received_at TEXT NOT NULL,
    external_service_id INTEGER NULL,
    request TEXT NOT NULL,
    error TEXT NULL
);

CREATE INDEX IF NOT EXISTS idx_webhook_logs_received_at ON webhook_logs(received_at);
CREATE INDEX IF NOT EXISTS idx_webhook_logs_external_service_id ON webhook_logs(external_service_id);
"#;

/// An open KEYPAGE database.
#[derive(Clone)]
pub struct Database {
    conn: SharedConnection,
    config: StoreConfig,
}

impl Database {
    /// Open (and create if needed) the database described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = match config.path() {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(
            path = ?config.path(),
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "database opened"
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Configuration this database was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Repository name store.
    pub fn repos(&self) -> RepoStore {
        RepoStore::new(self.conn.clone())
    }

    /// Webhook log store.
    pub fn webhook_logs(&self) -> WebhookLogStore {
        WebhookLogStore::new(self.conn.clone())
    }
}
