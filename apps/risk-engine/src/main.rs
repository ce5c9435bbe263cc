//! Risk Engine Binary
//!
//! Starts the portfolio risk admission-control engine with its
//! background loops.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin risk-engine
//! ```
//!
//! # Environment Variables
//!
//! - `RISK_CONFIG`: Path to the YAML config file (default: risk.yaml,
//!   falling back to built-in defaults when absent)
//! - `RISK_INITIAL_CASH`: Starting cash balance (default: 100000)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use risk_engine::config::{RiskConfig, load_config};
use risk_engine::observability::init_tracing;
use risk_engine::ports::{InMemoryMarketData, MarketDataPort};
use risk_engine::service::RiskEngineService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("starting risk engine");

    let config = resolve_config();
    let initial_cash = std::env::var("RISK_INITIAL_CASH")
        .ok()
        .and_then(|v| v.parse::<Decimal>().ok())
        .unwrap_or_else(|| Decimal::from(100_000));

    let market_data = Arc::new(InMemoryMarketData::new());
    let service = Arc::new(RiskEngineService::new(
        config,
        initial_cash,
        Arc::clone(&market_data) as Arc<dyn MarketDataPort>,
    ));

    let cancel = CancellationToken::new();

    // Periodic position adjustment.
    let adjustment = service.adjustment_engine();
    let adjustment_cancel = cancel.clone();
    let adjustment_task = tokio::spawn(async move {
        adjustment.run(adjustment_cancel).await;
    });

    // Slow-cadence correlation refresh.
    let refresh_service = Arc::clone(&service);
    let refresh_cancel = cancel.clone();
    let refresh_interval = service.correlation_refresh_interval_secs();
    let refresh_task = tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(refresh_interval));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = refresh_cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if let Err(e) = refresh_service.refresh_correlations() {
                        warn!(error = %e, "correlation refresh skipped");
                    }
                }
            }
        }
    });

    info!("risk engine running; ctrl-c to stop");
    signal::ctrl_c().await?;
    info!("shutdown signal received");

    cancel.cancel();
    let _ = adjustment_task.await;
    let _ = refresh_task.await;

    info!("risk engine stopped");
    Ok(())
}

/// Load config from `RISK_CONFIG`, falling back to defaults when the
/// file is absent.
fn resolve_config() -> RiskConfig {
    let path = std::env::var("RISK_CONFIG").unwrap_or_else(|_| "risk.yaml".to_string());
    match load_config(Some(&path)) {
        Ok(config) => {
            info!(path, "configuration loaded");
            config
        }
        Err(e) => {
            warn!(path, error = %e, "config not loaded; using defaults");
            RiskConfig::default()
        }
    }
}
