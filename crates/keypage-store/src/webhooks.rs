//! Webhook logging around request handlers.

use futures::future::BoxFuture;

use crate::config::WebhookLoggingConfig;
use crate::webhook_logs::{NewWebhookLog, WebhookLogRequest, WebhookLogStore};

/// Details a handler reports about the webhook it processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookCapture {
    external_service_id: Option<i64>,
    error: Option<String>,
}

impl WebhookCapture {
    /// Record the external service the webhook was matched to.
    pub fn set_external_service_id(&mut self, id: i64) {
        self.external_service_id = Some(id);
    }

    /// Record the error the handler produced.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn external_service_id(&self) -> Option<i64> {
        self.external_service_id
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Writes a webhook log for every handled request.
#[derive(Clone)]
pub struct WebhookLogger {
    store: WebhookLogStore,
    config: WebhookLoggingConfig,
}

impl WebhookLogger {
    /// Create a logger writing to `store` under `config`.
    pub fn new(store: WebhookLogStore, config: WebhookLoggingConfig) -> Self {
        Self { store, config }
    }

    /// Check if requests are logged.
    pub fn is_enabled(&self) -> bool {
        self.config.should_log()
    }

    /// Run `handler` on `request` and log the outcome.
    ///
    /// The handler receives the request and a fresh [`WebhookCapture`]. Its
    /// return value is passed through unchanged. Failing to write the log is
    /// reported as a warning and never affects the handler's result.
    pub async fn record<T, H>(&self, request: WebhookLogRequest, handler: H) -> T
    where
        H: for<'a> FnOnce(&'a WebhookLogRequest, &'a mut WebhookCapture) -> BoxFuture<'a, T>,
    {
        let mut capture = WebhookCapture::default();
        let output = handler(&request, &mut capture).await;

        if !self.config.should_log() {
            return output;
        }

        let log = NewWebhookLog {
            external_service_id: capture.external_service_id,
            request,
            error: capture.error,
        };
        if let Err(err) = self.store.create(log) {
            tracing::warn!(error = %err, "failed to write webhook log");
        }

        output
    }
}
