//! SpendLens dashboard
//!
//! Usage:
//!   cargo run --release --bin spendlens
//!
//! Environment variables (see `spendlens::config::Config::from_env`):
//!   SPENDLENS_API_URL - transaction service base URL
//!   SPENDLENS_USER_ID - whose transactions to load
//!   SPENDLENS_SOURCE_FILE - read a JSON file instead of the service
//!   SPENDLENS_HEADLESS - print the views as JSON instead of drawing the TUI

use dotenv::dotenv;
use log::{error, info};
use spendlens::{
    acquisition::source::{FileTransactionSource, HttpTransactionSource, TransactionSource},
    config::Config,
    runtime::{self, Command},
    ui,
};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = Config::from_env();

    // Logs go to stderr so the alternate screen (and headless JSON on stdout) stay clean
    let mut builder = if config.rust_log.is_some() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    } else {
        env_logger::Builder::from_default_env()
    };
    builder.target(env_logger::Target::Stderr).init();

    info!("🚀 Starting SpendLens...");
    info!("📊 Configuration:");
    info!("   ├─ User: {}", config.user_id);
    match &config.source_file {
        Some(path) => info!("   ├─ Source: file {}", path),
        None => info!("   ├─ Source: {}", config.api_url),
    }
    info!(
        "   ├─ Retries: {} x {}ms",
        config.max_retries, config.retry_delay_ms
    );
    info!("   ├─ Anomaly sigma: {}", config.anomaly_sigma);
    info!("   └─ Mode: {}", if config.headless { "headless" } else { "tui" });

    let source: Arc<dyn TransactionSource> = match &config.source_file {
        Some(path) => Arc::new(FileTransactionSource::new(path)),
        None => Arc::new(HttpTransactionSource::new(&config)?),
    };

    let (commands, mut snapshots, handle) = runtime::spawn(&config, source);

    if config.headless {
        let snapshot = snapshots
            .wait_for(|s| s.state.is_terminal())
            .await?
            .clone();
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        let _ = commands.send(Command::Shutdown).await;
    } else if let Err(e) = ui::run_ui(snapshots, commands).await {
        error!("❌ Dashboard error: {}", e);
    }

    handle.await?;
    info!("👋 SpendLens stopped");
    Ok(())
}
