//! The periodic adjustment loop.
//!
//! Runs on a fixed interval, independent of inbound requests. Every
//! action is a pure function of current state, so a second pass over
//! unchanged inputs is a no-op: stops only tighten, reductions stop at
//! the cap, closes remove the position entirely.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::breaker::{CircuitBreakerController, CircuitBreakerLevel};
use crate::config::{AdjustmentConfig, SharedLimits};
use crate::correlation::CorrelationRiskAssessor;
use crate::error::RiskError;
use crate::models::Position;
use crate::portfolio::PortfolioStateStore;
use crate::ports::MarketDataPort;
use crate::regime::{RegimeClassifier, RiskRegime};
use crate::stops::DynamicStopLossCalculator;

/// One stop move, old to new.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAdjustment {
    /// Symbol whose stop moved.
    pub symbol: String,
    /// Previous stop, when one existed.
    pub old_stop: Option<Decimal>,
    /// New, strictly tighter stop.
    pub new_stop: Decimal,
}

/// What one adjustment pass did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustmentReport {
    /// Stops moved toward price.
    pub stops_tightened: Vec<StopAdjustment>,
    /// Positions partially reduced, with the notional taken off.
    pub positions_reduced: Vec<(String, Decimal)>,
    /// Positions fully closed.
    pub positions_closed: Vec<String>,
    /// Non-fatal observations from the pass.
    pub warnings_issued: Vec<String>,
}

impl AdjustmentReport {
    /// Whether the pass changed anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stops_tightened.is_empty()
            && self.positions_reduced.is_empty()
            && self.positions_closed.is_empty()
    }
}

/// Re-evaluates every open position on a timer.
pub struct PeriodicAdjustmentEngine {
    config: AdjustmentConfig,
    limits: SharedLimits,
    store: Arc<PortfolioStateStore>,
    breaker: Arc<CircuitBreakerController>,
    classifier: RegimeClassifier,
    assessor: Arc<CorrelationRiskAssessor>,
    market_data: Arc<dyn MarketDataPort>,
    // try_lock makes overlapping passes skip instead of queue.
    running: tokio::sync::Mutex<()>,
}

impl PeriodicAdjustmentEngine {
    /// Wire the engine from its collaborators.
    #[must_use]
    pub fn new(
        config: AdjustmentConfig,
        regime_config: crate::config::RegimeConfig,
        limits: SharedLimits,
        store: Arc<PortfolioStateStore>,
        breaker: Arc<CircuitBreakerController>,
        assessor: Arc<CorrelationRiskAssessor>,
        market_data: Arc<dyn MarketDataPort>,
    ) -> Self {
        Self {
            config,
            limits,
            store,
            breaker,
            classifier: RegimeClassifier::new(regime_config),
            assessor,
            market_data,
            running: tokio::sync::Mutex::new(()),
        }
    }

    /// Run the loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_secs = self.config.interval_secs,
            "adjustment loop started"
        );
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("adjustment loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_once() {
                        Ok(report) if report.is_noop() => {}
                        Ok(report) => info!(
                            tightened = report.stops_tightened.len(),
                            reduced = report.positions_reduced.len(),
                            closed = report.positions_closed.len(),
                            "adjustment pass applied changes"
                        ),
                        Err(e) => error!(error = %e, "adjustment pass failed"),
                    }
                }
            }
        }
    }

    /// One adjustment pass. Skips (returning an empty report) when a
    /// pass is already in flight.
    ///
    /// # Errors
    ///
    /// Surfaces portfolio write failures; per-symbol data gaps become
    /// warnings instead.
    pub fn run_once(&self) -> Result<AdjustmentReport, RiskError> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("adjustment pass already running; skipping");
            return Ok(AdjustmentReport::default());
        };

        let mut report = AdjustmentReport::default();
        let state = self.store.snapshot();
        let breaker = self.breaker.evaluate(state.drawdown.current_drawdown_pct);

        let correlation = self.assessor.current();
        let history = self.market_data.market_history();
        let regime = self
            .classifier
            .classify(history.as_ref(), correlation.avg_correlation)
            .regime;

        if breaker.level == CircuitBreakerLevel::Level3 {
            self.close_all(&state.open_symbols(), &mut report);
            return Ok(report);
        }

        for symbol in state.open_symbols() {
            let Some(position) = state.positions.get(&symbol) else {
                continue;
            };
            self.adjust_position(position, regime, &mut report)?;
        }
        Ok(report)
    }

    fn adjust_position(
        &self,
        position: &Position,
        regime: RiskRegime,
        report: &mut AdjustmentReport,
    ) -> Result<(), RiskError> {
        let symbol = &position.symbol;
        let now = Utc::now();

        let Some(obs) = self.market_data.observation(symbol) else {
            report
                .warnings_issued
                .push(format!("{symbol}: no market observation; skipped"));
            return Ok(());
        };
        if obs.is_stale(now, self.config.stale_ttl_secs) {
            report
                .warnings_issued
                .push(format!("{symbol}: stale market observation; skipped"));
            return Ok(());
        }
        let price = obs.price;
        self.store.mark_price(symbol, price)?;

        let mut marked = position.clone();
        marked.mark(price);
        // Hard breach: the marked price crossed the stop.
        if marked.stop_breached() {
            self.store.close_position(symbol, price)?;
            info!(symbol, price = %price, "position closed on stop breach");
            report.positions_closed.push(symbol.clone());
            return Ok(());
        }

        // Oversized position: reduce back to the single-position cap.
        let limits = Arc::clone(&self.limits.read());
        let state = self.store.snapshot();
        let exposure_pct = state.exposure_pct(state.symbol_exposure(symbol));
        if exposure_pct > limits.max_single_position_pct {
            let target_fraction = 1.0 - limits.max_single_position_pct / exposure_pct;
            let fraction = Decimal::from_f64(target_fraction)
                .unwrap_or_else(|| {
                    Decimal::from_f64(self.config.reduction_fraction).unwrap_or(Decimal::ONE)
                })
                .clamp(Decimal::ZERO, Decimal::ONE);
            if fraction > Decimal::ZERO {
                let notional = self.store.reduce_position(symbol, fraction, price)?;
                info!(
                    symbol,
                    exposure_pct, "position reduced to single-position cap"
                );
                report.positions_reduced.push((symbol.clone(), notional));
            }
            return Ok(());
        }

        // Trail the stop toward price; never loosen.
        if let Some(new_stop) = DynamicStopLossCalculator::trail_stop(
            regime,
            position.side,
            price,
            position.stop_loss_price,
        ) {
            self.store.set_stop(symbol, new_stop)?;
            report.stops_tightened.push(StopAdjustment {
                symbol: symbol.clone(),
                old_stop: position.stop_loss_price,
                new_stop,
            });
        }
        Ok(())
    }

    fn close_all(&self, symbols: &[String], report: &mut AdjustmentReport) {
        error!("LEVEL_3 active; closing all positions");
        for symbol in symbols {
            let price = self
                .market_data
                .observation(symbol)
                .map(|o| o.price)
                .or_else(|| {
                    self.store
                        .snapshot()
                        .positions
                        .get(symbol)
                        .map(|p| p.current_price)
                });
            let Some(price) = price else {
                report
                    .warnings_issued
                    .push(format!("{symbol}: no price for emergency close"));
                continue;
            };
            match self.store.close_position(symbol, price) {
                Ok(()) => report.positions_closed.push(symbol.clone()),
                Err(e) => report
                    .warnings_issued
                    .push(format!("{symbol}: emergency close failed: {e}")),
            }
        }
    }
}

impl std::fmt::Debug for PeriodicAdjustmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicAdjustmentEngine")
            .field("interval_secs", &self.config.interval_secs)
            .finish_non_exhaustive()
    }
}
