//! KEYPAGE Store - SQLite record sources and webhook log storage.
//!
//! Opens a SQLite database, bootstraps its schema, and exposes the
//! repository name and webhook log tables as keyset-pageable record sources.

pub mod config;
pub mod db;
pub mod error;
pub mod repos;
pub mod sql;
pub mod webhook_logs;
pub mod webhooks;

pub use config::{StoreConfig, WebhookLoggingConfig};
pub use db::Database;
pub use error::{Result, StoreError};
pub use repos::{CachedRepoNamesIterator, RepoName, RepoNamesIterator, RepoStore};
pub use webhook_logs::{NewWebhookLog, WebhookLog, WebhookLogRequest, WebhookLogStore};
pub use webhooks::{WebhookCapture, WebhookLogger};
