//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Database location and connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,

    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Webhook logging policy.
    pub webhook_logging: WebhookLoggingConfig,
}

impl StoreConfig {
    /// Configuration for a database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            webhook_logging: WebhookLoggingConfig::default(),
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            webhook_logging: WebhookLoggingConfig::default(),
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the webhook logging policy.
    pub fn with_webhook_logging(mut self, logging: WebhookLoggingConfig) -> Self {
        self.webhook_logging = logging;
        self
    }

    /// Database file path, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("./keypage.db")
    }
}

/// Whether incoming webhooks are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebhookLoggingConfig {
    /// Explicit setting. Overrides the default when present.
    pub enabled: Option<bool>,

    /// An encryption key for webhook logs is configured.
    pub encryption_key_configured: bool,
}

impl WebhookLoggingConfig {
    /// Explicitly enable or disable logging.
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            encryption_key_configured: false,
        }
    }

    /// Mark an encryption key as configured.
    pub fn with_encryption_key(mut self) -> Self {
        self.encryption_key_configured = true;
        self
    }

    /// Decide whether to log.
    ///
    /// Without an explicit setting, logging is on unless an encryption key
    /// is configured.
    pub fn should_log(&self) -> bool {
        match self.enabled {
            Some(enabled) => enabled,
            None => !self.encryption_key_configured,
        }
    }
}
