//! Output formatters for listings.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use keypage_core::{format_timestamp, Cursor};
use keypage_store::{RepoName, WebhookLog};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format one page of repositories.
    fn format_repo_page(&self, page_number: usize, repos: &[RepoName]) -> String;

    /// Format where a repository listing stopped.
    fn format_cursor(&self, cursor: &Cursor, fetched: usize) -> String;

    /// Format one page of webhook logs and the cursor for the next.
    fn format_webhook_logs(&self, logs: &[WebhookLog], next_cursor: Option<i64>) -> String;

    /// Format a row count.
    fn format_count(&self, count: u64) -> String;

    /// Format a simple message.
    fn format_message(&self, message: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_repo_page(&self, page_number: usize, repos: &[RepoName]) -> String {
        let mut table = Table::new();
        table.set_header(vec![Cell::new("id"), Cell::new("name")]);
        for repo in repos {
            table.add_row(vec![Cell::new(repo.id), Cell::new(&repo.name)]);
        }
        format!("Page {}\n{}", page_number, table)
    }

    fn format_cursor(&self, cursor: &Cursor, fetched: usize) -> String {
        format!("{} repo(s) fetched\nCursor: {}", fetched, cursor)
    }

    fn format_webhook_logs(&self, logs: &[WebhookLog], next_cursor: Option<i64>) -> String {
        if logs.is_empty() {
            return "No results".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("id"),
            Cell::new("received_at"),
            Cell::new("external_service_id"),
            Cell::new("body"),
            Cell::new("error"),
        ]);
        for log in logs {
            table.add_row(vec![
                Cell::new(log.id),
                Cell::new(format_timestamp(&log.received_at)),
                Cell::new(
                    log.external_service_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "NULL".to_string()),
                ),
                Cell::new(truncate(&log.request.body_text(), 60)),
                Cell::new(log.error.as_deref().unwrap_or("NULL")),
            ]);
        }

        let mut output = table.to_string();
        if let Some(cursor) = next_cursor {
            output.push_str(&format!("\nNext cursor: {}", cursor));
        }
        output
    }

    fn format_count(&self, count: u64) -> String {
        count.to_string()
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_repo_page(&self, page_number: usize, repos: &[RepoName]) -> String {
        serde_json::json!({
            "page": page_number,
            "repos": repos,
        })
        .to_string()
    }

    fn format_cursor(&self, cursor: &Cursor, fetched: usize) -> String {
        serde_json::json!({
            "fetched": fetched,
            "cursor": cursor,
        })
        .to_string()
    }

    fn format_webhook_logs(&self, logs: &[WebhookLog], next_cursor: Option<i64>) -> String {
        let logs: Vec<serde_json::Value> = logs
            .iter()
            .map(|log| {
                serde_json::json!({
                    "id": log.id,
                    "received_at": format_timestamp(&log.received_at),
                    "external_service_id": log.external_service_id,
                    "headers": log.request.headers,
                    "body": log.request.body_text(),
                    "error": log.error,
                })
            })
            .collect();

        serde_json::to_string_pretty(&serde_json::json!({
            "logs": logs,
            "next_cursor": next_cursor,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_count(&self, count: u64) -> String {
        serde_json::json!({ "count": count }).to_string()
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({ "message": message }).to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
