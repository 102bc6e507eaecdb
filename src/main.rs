use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use edge_engine::config::{Config, EnvConfig};
use edge_engine::data::snapshot::{load_contracts, load_forecasts};
use edge_engine::engine::EdgeEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let env_config = EnvConfig::load()?;
    let mut config = Config::load(&env_config.config_path)?;
    config.apply_env(&env_config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🚀 Edge engine starting...");
    info!("Config: {}", env_config.config_path);
    info!("Quotes snapshot: {}", config.snapshot.quotes_path);
    info!("Forecast snapshot: {}", config.snapshot.forecasts_path);
    info!(
        "Dynamic exit: {} (threshold {:.2})",
        config.hedge.enable_dynamic_exit, config.hedge.exit_threshold
    );
    match config.hedge.default_budget {
        Some(budget) => info!("Sizing every group with ${:.2}", budget),
        None => info!("Portfolio sizing disabled (no hedge.default_budget)"),
    }

    let engine = EdgeEngine::new(&config)?;
    let mut interval = tokio::time::interval(Duration::from_secs(config.polling.interval_secs.max(1)));

    info!("✅ Polling every {}s", config.polling.interval_secs.max(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                poll_once(&engine, &config);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Load the current snapshots and run one cycle. Read failures skip the tick.
fn poll_once(engine: &EdgeEngine, config: &Config) {
    let contracts = match load_contracts(&config.snapshot.quotes_path) {
        Ok(contracts) => contracts,
        Err(e) => {
            warn!("Skipping cycle: {:#}", e);
            return;
        }
    };
    let forecasts = match load_forecasts(&config.snapshot.forecasts_path) {
        Ok(forecasts) => forecasts,
        Err(e) => {
            warn!("Skipping cycle: {:#}", e);
            return;
        }
    };

    let report = engine.run_cycle(&contracts, &forecasts, Utc::now());
    for portfolio in &report.portfolios {
        info!(
            "{}: EV ${:.2} (with exits ${:.2}), win {:.0}%, worst ${:.2}, quality {}{}",
            portfolio.group_id,
            portfolio.expected_profit,
            portfolio.adjusted_expected_profit,
            portfolio.win_probability * 100.0,
            portfolio.worst_case_pnl,
            portfolio.quality,
            if portfolio.quality_reason.is_empty() {
                String::new()
            } else {
                format!(" ({})", portfolio.quality_reason)
            }
        );
    }
}
