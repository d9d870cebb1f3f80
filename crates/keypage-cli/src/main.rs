//! KEYPAGE Command-Line Client
//!
//! Pages through repository names and webhook logs stored in a KEYPAGE
//! SQLite database.

mod commands;
mod formatter;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use commands::Command;
use formatter::OutputFormat;
use keypage_core::Context;
use keypage_store::{Database, StoreConfig};

/// KEYPAGE Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "keypage")]
#[command(version, about = "Keyset pagination over KEYPAGE stores")]
pub struct Args {
    /// Path to the SQLite database (created if missing)
    #[arg(short = 'd', long, default_value = "keypage.db")]
    pub database: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// SQLite busy timeout in milliseconds
    #[arg(long, default_value_t = keypage_store::config::DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Store configuration from the command line.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.database)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keypage_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.store_config();
    let db = Database::open(config)?;
    tracing::debug!(database = %args.database.display(), "database ready");

    let (ctx, cancel) = Context::with_cancel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("interrupted, cancelling");
        cancel.cancel();
    });

    let formatter = formatter::create_formatter(args.format);
    let mut stdout = std::io::stdout();
    commands::execute(&db, args.command, &ctx, &*formatter, &mut stdout).await?;
    Ok(())
}
