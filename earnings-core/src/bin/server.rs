//! Earnings ledger server binary

use anyhow::Context;
use earnings_core::{Config, InMemoryCatalog, Ledger, TaskDefinition};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Tasks offered on a fresh install
fn default_tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("t1", "Facebook 2FA Setup", Decimal::from(7), "ID"),
        TaskDefinition::new("t2", "Instagram ID Follow", Decimal::from(3), "1K"),
        TaskDefinition::new("t3", "Survey Submission", Decimal::from(5), "STAR"),
        TaskDefinition::new("t4", "YouTube Sub & Like", Decimal::from(4), "1K"),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting TaskPay earnings ledger");

    // Load configuration
    let config = match std::env::var("EARNINGS_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        Err(_) => Config::from_env().context("failed to load config from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = ?config.data_dir,
        "Configuration loaded"
    );

    let catalog = Arc::new(InMemoryCatalog::with_tasks(default_tasks()));
    tracing::info!(tasks = catalog.len(), "Task catalog loaded");

    // Open ledger
    let ledger = Ledger::open(config, catalog)
        .await
        .context("failed to open ledger")?;
    let summary = ledger.review_summary().await?;
    tracing::info!(
        pending = summary.pending,
        received = summary.received,
        awaiting_payout = %summary.awaiting_payout,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down earnings ledger");
    ledger.shutdown().await?;
    Ok(())
}
