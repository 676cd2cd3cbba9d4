//! Kelly Risk Engine - Entry Point
//!
//! Runs one portfolio evaluation over a market-data snapshot and
//! prints the report as JSON on stdout. Logs go to stderr.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from argv[1]) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Load the JSON snapshot (SnapshotProvider, MarketDataProvider port)
//! 4. Fetch and screen candidates concurrently
//! 5. Run the evaluator (allocation, options, holding plans, risk)
//! 6. Emit the report

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{Context, Result};
use tracing::info;

use kelly_risk_engine::adapters::SnapshotProvider;
use kelly_risk_engine::config;
use kelly_risk_engine::usecases::PortfolioEvaluator;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.engine.log_level)
                }),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        strategy = %config.allocation.strategy,
        portfolio_value = config.allocation.portfolio_value,
        snapshot = %config.engine.snapshot_path,
        "Starting Kelly Risk Engine"
    );

    // ── 3. Market data snapshot ─────────────────────────────
    let provider = SnapshotProvider::load(&config.engine.snapshot_path)
        .await
        .context("Failed to load market snapshot")?;
    let watchlist = provider.watchlist();

    // ── 4. Fetch + screen ───────────────────────────────────
    let evaluator = PortfolioEvaluator::new(config);
    let candidates = evaluator
        .collect_candidates(&provider, &watchlist, provider.as_of())
        .await;

    // ── 5. Evaluate ─────────────────────────────────────────
    let report = evaluator.evaluate(&candidates);

    // ── 6. Emit report ──────────────────────────────────────
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{json}");

    info!(
        positions = report.equity.len(),
        options = report.options.len(),
        "Evaluation finished"
    );
    Ok(())
}
