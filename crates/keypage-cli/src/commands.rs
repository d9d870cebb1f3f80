//! Subcommands and their execution.

use std::io::Write;

use chrono::{DateTime, Duration, Utc};
use clap::{Args as ClapArgs, Subcommand};
use keypage_core::{Context, Cursor, WebhookLogListOptions};
use keypage_store::{Database, RepoName, StoreError};
use thiserror::Error;

use crate::formatter::Formatter;

/// Command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pagination(#[from] keypage_core::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Repository names
    #[command(subcommand)]
    Repos(ReposCommand),

    /// Stored webhook logs
    #[command(subcommand)]
    WebhookLogs(WebhookLogsCommand),
}

/// Repository subcommands.
#[derive(Subcommand, Debug)]
pub enum ReposCommand {
    /// Add repositories by name
    Add {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Page through repositories with a keyset cursor
    List {
        /// Column to order by (id or name)
        #[arg(long, default_value = "")]
        column: String,

        /// Direction to page in (next or prev)
        #[arg(long, default_value = "")]
        direction: String,

        /// Resume after this cursor value
        #[arg(long, default_value = "")]
        after: String,

        /// Records per page
        #[arg(long, default_value_t = 20)]
        page_size: usize,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Count repositories
    Count,
}

/// Filters shared by webhook log listing and counting.
#[derive(ClapArgs, Debug, Clone)]
pub struct WebhookLogFilter {
    /// Only logs for this external service. 0 selects logs with no service.
    #[arg(long)]
    pub external_service_id: Option<i64>,

    /// Only logs that recorded an error
    #[arg(long)]
    pub only_errors: bool,

    /// Received at or after (RFC 3339)
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Received at or before (RFC 3339)
    #[arg(long)]
    pub until: Option<DateTime<Utc>>,
}

impl WebhookLogFilter {
    fn into_options(self) -> WebhookLogListOptions {
        let opts = WebhookLogListOptions::new()
            .with_external_service(self.external_service_id)
            .between(self.since, self.until);
        if self.only_errors {
            opts.only_errors()
        } else {
            opts
        }
    }
}

/// Webhook log subcommands.
#[derive(Subcommand, Debug)]
pub enum WebhookLogsCommand {
    /// List one page of logs, newest first
    List {
        /// Logs per page. 0 lists everything.
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Id of the newest log to show, from a previous page's next cursor
        #[arg(long, default_value_t = 0)]
        cursor: i64,

        #[command(flatten)]
        filter: WebhookLogFilter,
    },

    /// Count logs
    Count {
        #[command(flatten)]
        filter: WebhookLogFilter,
    },

    /// Delete logs older than the retention window
    Prune {
        /// Hours of logs to keep
        #[arg(long)]
        retention_hours: i64,
    },
}

/// Execute a command, writing results to `out` as they arrive.
pub async fn execute(
    db: &Database,
    command: Command,
    ctx: &Context,
    formatter: &dyn Formatter,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    match command {
        Command::Repos(cmd) => execute_repos(db, cmd, ctx, formatter, out).await,
        Command::WebhookLogs(cmd) => execute_webhook_logs(db, cmd, formatter, out),
    }
}

async fn execute_repos(
    db: &Database,
    command: ReposCommand,
    ctx: &Context,
    formatter: &dyn Formatter,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let repos = db.repos();
    match command {
        ReposCommand::Add { names } => {
            for name in &names {
                let repo = repos.create(name)?;
                tracing::info!(id = repo.id, name = %repo.name, "repo added");
            }
            writeln!(
                out,
                "{}",
                formatter.format_message(&format!("{} repo(s) added", names.len()))
            )?;
        }
        ReposCommand::List {
            column,
            direction,
            after,
            page_size,
            max_pages,
        } => {
            if page_size == 0 {
                return Err(CommandError::InvalidArgument(
                    "--page-size must be at least 1".to_string(),
                ));
            }

            let cursor = Cursor::new::<RepoName>(&column, after, &direction)?;
            let it = repos.cached_iterator(cursor)?;

            let mut pages = 0;
            while max_pages.map_or(true, |max| pages < max) {
                let page = it.next(ctx, page_size).await?;
                if page.is_empty() {
                    break;
                }
                pages += 1;
                writeln!(out, "{}", formatter.format_repo_page(pages, &page))?;
            }

            writeln!(
                out,
                "{}",
                formatter.format_cursor(&it.cursor().await, it.cached_len().await)
            )?;
        }
        ReposCommand::Count => {
            writeln!(out, "{}", formatter.format_count(repos.count()?))?;
        }
    }
    Ok(())
}

fn execute_webhook_logs(
    db: &Database,
    command: WebhookLogsCommand,
    formatter: &dyn Formatter,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let logs = db.webhook_logs();
    match command {
        WebhookLogsCommand::List {
            limit,
            cursor,
            filter,
        } => {
            let opts = filter
                .into_options()
                .with_limit(limit)
                .with_cursor(cursor);
            let page = logs.list(&opts)?;
            writeln!(
                out,
                "{}",
                formatter.format_webhook_logs(&page.items, page.next_cursor)
            )?;
        }
        WebhookLogsCommand::Count { filter } => {
            let count = logs.count(&filter.into_options())?;
            writeln!(out, "{}", formatter.format_count(count))?;
        }
        WebhookLogsCommand::Prune { retention_hours } => {
            if retention_hours < 0 {
                return Err(CommandError::InvalidArgument(
                    "--retention-hours must not be negative".to_string(),
                ));
            }
            let retention = Duration::try_hours(retention_hours).ok_or_else(|| {
                CommandError::InvalidArgument("--retention-hours is too large".to_string())
            })?;
            let deleted = logs.delete_stale(retention)?;
            writeln!(
                out,
                "{}",
                formatter.format_message(&format!("{} webhook log(s) deleted", deleted))
            )?;
        }
    }
    Ok(())
}
