//! The seven-gate trade approval pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::breaker::CircuitBreakerController;
use crate::config::{RiskConfig, SharedLimits};
use crate::correlation::CorrelationRiskAssessor;
use crate::error::RiskError;
use crate::models::{
    ApprovalMetadata, ApprovalResult, GoalProgress, PositionSide, TradeRequest, TradeSide,
};
use crate::portfolio::{PortfolioState, PortfolioStateStore};
use crate::ports::MarketDataPort;
use crate::regime::{RegimeAssessment, RegimeClassifier, RiskRegime};
use crate::sizing::{PositionSizer, TradeStats};
use crate::stops::DynamicStopLossCalculator;

use super::gates;
use super::types::{Evaluation, GateContext};

/// Annualization divisor for converting annual volatility to daily.
const TRADING_DAYS_SQRT: f64 = 15.874_507_866_387_544;

/// Conservative annualized volatility assumed when inputs are stale.
const FALLBACK_ANNUAL_VOL: f64 = 0.60;

const GATE_REGIME: &str = "regime_multiplier";
const GATE_FINAL: &str = "final_assembly";

/// Orchestrates the ordered gates into one admission decision.
///
/// Requests for the same symbol are serialized through a per-symbol
/// lock so concurrent approvals cannot double-count exposure; requests
/// for different symbols proceed concurrently.
pub struct TradeApprovalPipeline {
    config: RiskConfig,
    limits: SharedLimits,
    store: Arc<PortfolioStateStore>,
    breaker: Arc<CircuitBreakerController>,
    classifier: RegimeClassifier,
    assessor: Arc<CorrelationRiskAssessor>,
    sizer: PositionSizer,
    market_data: Arc<dyn MarketDataPort>,
    symbol_locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TradeApprovalPipeline {
    /// Wire the pipeline from its collaborators.
    #[must_use]
    pub fn new(
        config: RiskConfig,
        limits: SharedLimits,
        store: Arc<PortfolioStateStore>,
        breaker: Arc<CircuitBreakerController>,
        assessor: Arc<CorrelationRiskAssessor>,
        market_data: Arc<dyn MarketDataPort>,
    ) -> Self {
        let classifier = RegimeClassifier::new(config.regime.clone());
        let sizer = PositionSizer::new(config.sizing.clone());
        Self {
            config,
            limits,
            store,
            breaker,
            classifier,
            assessor,
            sizer,
            market_data,
            symbol_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Evaluate one trade request through all gates.
    ///
    /// Rejections are ordinary results, not errors; only a malformed
    /// request is an error.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive sizes or prices, or a
    /// signal strength outside [0, 1].
    #[instrument(skip_all, fields(request_id = %request.request_id, symbol = %request.symbol))]
    pub async fn approve(
        &self,
        request: &TradeRequest,
        stats: Option<&TradeStats>,
        goal: Option<&GoalProgress>,
    ) -> Result<ApprovalResult, RiskError> {
        validate_request(request)?;

        let lock = self.symbol_lock(&request.symbol);
        let _guard = lock.lock().await;

        let state = self.store.snapshot();
        let result = self.evaluate(&state, request, stats, goal);

        if result.approved {
            info!(
                size = %result.adjusted_size_usd,
                risk_score = result.risk_score,
                "trade approved"
            );
        } else {
            info!(rejections = ?result.rejections, "trade rejected");
        }
        Ok(result)
    }

    /// Gate sequence against one snapshot. Synchronous so the adjustment
    /// engine and tests can drive it directly.
    fn evaluate(
        &self,
        state: &PortfolioState,
        request: &TradeRequest,
        stats: Option<&TradeStats>,
        goal: Option<&GoalProgress>,
    ) -> ApprovalResult {
        let limits = Arc::clone(&self.limits.read());
        let portfolio_value = state.total_value();

        let breaker = self.breaker.evaluate(state.drawdown.current_drawdown_pct);
        let correlation = self.assessor.current();
        let history = self.market_data.market_history();
        let mut regime = self
            .classifier
            .classify(history.as_ref(), correlation.avg_correlation);

        let (annual_vol, stale_inputs) = self.resolve_volatility(request);
        if stale_inputs {
            degrade_regime(&mut regime);
        }
        let degraded = regime.degraded;
        let daily_volatility = annual_vol / TRADING_DAYS_SQRT;

        let marginal_correlation = self.assessor.marginal_correlation(&request.symbol);
        let cluster_exposure_pct =
            cluster_exposure_pct(state, &correlation.clusters, &request.symbol);

        let ctx = GateContext {
            limits: &limits,
            state,
            portfolio_value,
            breaker: &breaker,
            regime: &regime,
            correlation: &correlation,
            marginal_correlation,
            cluster_exposure_pct,
            daily_volatility,
            degraded,
        };

        let mut eval = Evaluation::new(request.requested_size_usd);
        if degraded {
            eval.warn("stale market inputs; conservative fallbacks in effect".to_string());
        }

        // Gates 1-6 short-circuit on the first rejection.
        gates::circuit::check(&ctx, &mut eval);
        if !eval.rejected() {
            gates::portfolio::check(&ctx, &mut eval);
        }
        if !eval.rejected() {
            self.regime_gate(&ctx, &mut eval);
        }
        if !eval.rejected() {
            gates::correlation::check(&ctx, &self.config.correlation, &mut eval);
        }
        if !eval.rejected() {
            gates::concentration::check(&ctx, &request.symbol, &request.strategy_id, &mut eval);
        }
        if !eval.rejected() {
            gates::sector::check(
                &ctx,
                request.asset_class,
                request.sector.as_deref(),
                &mut eval,
            );
        }

        // Gate 7: final assembly.
        let stop_pct = DynamicStopLossCalculator::adjusted_stop_pct(
            regime.regime,
            self.config.sizing.default_stop_loss_pct,
        );
        let stop_loss_price = DynamicStopLossCalculator::stop_price(
            regime.regime,
            position_side(request.side),
            request.current_price,
            self.config.sizing.default_stop_loss_pct,
        );

        if !eval.rejected() {
            let recommendation = self.sizer.size(
                portfolio_value,
                stop_pct,
                request.signal_strength,
                stats,
                goal,
            );
            if recommendation.low_confidence {
                eval.warn(format!("sizing at low confidence: {}", recommendation.reasoning));
            }
            if recommendation.size_usd < eval.current_size {
                let factor = ratio(recommendation.size_usd, eval.current_size);
                eval.adjust(
                    GATE_FINAL,
                    factor,
                    format!("kelly sizing ceiling: {}", recommendation.reasoning),
                );
                // The f64 factor is an audit figure; the ceiling itself
                // is exact.
                eval.current_size = eval.current_size.min(recommendation.size_usd);
            }
            if eval.current_size <= Decimal::ZERO {
                eval.reject("adjustments reduced size to zero".to_string());
            }
        }

        let approved = !eval.rejected();
        let post_gross = state.gross_exposure()
            + if approved {
                eval.current_size
            } else {
                Decimal::ZERO
            };
        let leverage = ratio(post_gross, portfolio_value);
        let var_1d_pct = gates::portfolio::estimate_var_1d_pct(daily_volatility, leverage);
        let risk_score = composite_risk_score(
            state.drawdown.current_drawdown_pct,
            limits.max_drawdown_pct,
            correlation.correlation_risk_score,
            regime.regime,
            leverage,
            limits.max_leverage,
        );

        if breaker.latched {
            warn!("approval evaluated while circuit breaker latched");
        }

        ApprovalResult {
            request_id: request.request_id.clone(),
            symbol: request.symbol.clone(),
            approved,
            adjusted_size_usd: if approved {
                eval.current_size
            } else {
                Decimal::ZERO
            },
            stop_loss_price: approved.then_some(stop_loss_price),
            risk_score,
            rejections: eval.rejections,
            warnings: eval.warnings,
            metadata: ApprovalMetadata {
                regime: regime.regime,
                circuit_breaker_level: breaker.level,
                drawdown_pct: state.drawdown.current_drawdown_pct,
                leverage,
                var_1d_pct,
                correlation_risk_score: correlation.correlation_risk_score,
                size_factors: eval.size_factors,
                degraded,
            },
        }
    }

    /// Gate 3: regime size multiplier.
    fn regime_gate(&self, ctx: &GateContext<'_>, eval: &mut Evaluation) {
        let limits = ctx.limits;
        let regime = ctx.regime.regime;
        if !regime.allows_entries() {
            eval.reject(format!("regime {regime} blocks new entries"));
            return;
        }
        let factor =
            regime.size_factor(limits.high_vol_size_factor, limits.extreme_vol_size_factor);
        if factor < 1.0 {
            eval.adjust(
                GATE_REGIME,
                factor,
                format!("regime {regime} volatility reduction"),
            );
        }
    }

    /// Volatility for the request: the request's own figure wins, then a
    /// fresh market observation; stale or missing data falls back to a
    /// conservative constant and flags degradation.
    fn resolve_volatility(&self, request: &TradeRequest) -> (f64, bool) {
        if let Some(vol) = request.volatility
            && vol > 0.0
        {
            return (vol, false);
        }
        let ttl = self.config.adjustment.stale_ttl_secs;
        match self.market_data.observation(&request.symbol) {
            Some(obs) if !obs.is_stale(Utc::now(), ttl) => (obs.realized_vol, false),
            Some(_) => (FALLBACK_ANNUAL_VOL, true),
            None => (FALLBACK_ANNUAL_VOL, true),
        }
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.symbol_locks.lock();
        // Evict locks nobody holds so the map tracks the in-flight set,
        // not every symbol ever requested.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(
            locks
                .entry(symbol.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

impl std::fmt::Debug for TradeApprovalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeApprovalPipeline").finish_non_exhaustive()
    }
}

fn validate_request(request: &TradeRequest) -> Result<(), RiskError> {
    if request.requested_size_usd <= Decimal::ZERO {
        return Err(RiskError::validation("requested_size_usd must be positive")
            .with_context("symbol", request.symbol.clone()));
    }
    if request.current_price <= Decimal::ZERO {
        return Err(RiskError::validation("current_price must be positive")
            .with_context("symbol", request.symbol.clone()));
    }
    if !(0.0..=1.0).contains(&request.signal_strength) {
        return Err(RiskError::validation(format!(
            "signal_strength {} outside [0,1]",
            request.signal_strength
        )));
    }
    Ok(())
}

const fn position_side(side: TradeSide) -> PositionSide {
    match side {
        TradeSide::Buy => PositionSide::Long,
        TradeSide::Sell => PositionSide::Short,
    }
}

/// Stale inputs collapse calm regimes to the conservative high-vol row.
fn degrade_regime(assessment: &mut RegimeAssessment) {
    if matches!(
        assessment.regime,
        RiskRegime::LowVolBullish | RiskRegime::LowVolBearish
    ) {
        assessment.regime = RiskRegime::HighVolBearish;
    }
    assessment.degraded = true;
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    if denominator <= Decimal::ZERO {
        return 0.0;
    }
    (numerator / denominator).to_f64().unwrap_or(0.0)
}

/// Blend of drawdown, correlation, regime, and leverage into one 0-100
/// score. Weights favor drawdown: it is the one input that cannot be
/// stale.
#[must_use]
pub fn composite_risk_score(
    drawdown_pct: f64,
    max_drawdown_pct: f64,
    correlation_score: f64,
    regime: RiskRegime,
    leverage: f64,
    max_leverage: f64,
) -> f64 {
    let dd_norm = if max_drawdown_pct > 0.0 {
        (drawdown_pct / max_drawdown_pct * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let lev_norm = if max_leverage > 0.0 {
        (leverage / max_leverage * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let regime_score = match regime {
        RiskRegime::LowVolBullish => 10.0,
        RiskRegime::LowVolBearish => 25.0,
        RiskRegime::HighVolBullish => 45.0,
        RiskRegime::HighVolBearish => 55.0,
        RiskRegime::ExtremeVolatility => 80.0,
        RiskRegime::Crisis => 100.0,
    };
    (0.35 * dd_norm + 0.25 * correlation_score + 0.25 * regime_score + 0.15 * lev_norm)
        .clamp(0.0, 100.0)
}

/// Existing exposure of the cluster containing `symbol`, as a
/// percentage of portfolio value. A symbol outside every cluster
/// contributes only its own exposure.
fn cluster_exposure_pct(
    state: &PortfolioState,
    clusters: &[Vec<String>],
    symbol: &str,
) -> f64 {
    let members: Vec<&String> = clusters
        .iter()
        .find(|c| c.iter().any(|s| s == symbol))
        .map(|c| c.iter().collect())
        .unwrap_or_default();

    let exposure: Decimal = if members.is_empty() {
        state.symbol_exposure(symbol)
    } else {
        members.iter().map(|s| state.symbol_exposure(s)).sum()
    };
    state.exposure_pct(exposure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortfolioLimits;
    use crate::models::AssetClass;
    use crate::ports::InMemoryMarketData;
    use rust_decimal_macros::dec;

    struct Harness {
        pipeline: TradeApprovalPipeline,
        store: Arc<PortfolioStateStore>,
        breaker: Arc<CircuitBreakerController>,
        market_data: Arc<InMemoryMarketData>,
    }

    fn harness() -> Harness {
        let config = RiskConfig::default();
        let limits: SharedLimits = Arc::new(parking_lot::RwLock::new(Arc::new(
            PortfolioLimits::default(),
        )));
        let store = Arc::new(PortfolioStateStore::new(dec!(100000)));
        let breaker = Arc::new(CircuitBreakerController::new());
        let market_data = Arc::new(InMemoryMarketData::new());
        let assessor = Arc::new(CorrelationRiskAssessor::new(
            config.correlation.clone(),
            market_data.clone() as Arc<dyn MarketDataPort>,
        ));

        // Calm benchmark: mid-range volatility, mild uptrend.
        let mut vols: Vec<f64> = (1..=100).map(|i| 0.001 * f64::from(i)).collect();
        vols.push(0.05);
        market_data.set_market_history(vols, vec![0.01, 0.02]);

        let pipeline = TradeApprovalPipeline::new(
            config,
            Arc::clone(&limits),
            Arc::clone(&store),
            Arc::clone(&breaker),
            assessor,
            market_data.clone() as Arc<dyn MarketDataPort>,
        );
        Harness {
            pipeline,
            store,
            breaker,
            market_data,
        }
    }

    fn request(symbol: &str, size: Decimal) -> TradeRequest {
        TradeRequest {
            request_id: "r1".to_string(),
            symbol: symbol.to_string(),
            strategy_id: "momentum".to_string(),
            side: TradeSide::Buy,
            signal_strength: 0.8,
            requested_size_usd: size,
            current_price: dec!(100),
            volatility: Some(0.20),
            asset_class: AssetClass::Equity,
            sector: Some("tech".to_string()),
        }
    }

    #[tokio::test]
    async fn test_calm_market_approves() {
        let h = harness();
        let result = h
            .pipeline
            .approve(&request("AAPL", dec!(5000)), None, None)
            .await
            .unwrap();

        assert!(result.approved, "rejections: {:?}", result.rejections);
        assert!(result.adjusted_size_usd > Decimal::ZERO);
        assert!(result.adjusted_size_usd <= dec!(5000));
        assert!(result.stop_loss_price.is_some());
        assert!(!result.metadata.degraded);
    }

    #[tokio::test]
    async fn test_adjusted_never_exceeds_requested() {
        let h = harness();
        for size in [dec!(1000), dec!(10000), dec!(20000)] {
            let result = h
                .pipeline
                .approve(&request("AAPL", size), None, None)
                .await
                .unwrap();
            assert!(result.adjusted_size_usd <= size);
        }
    }

    #[tokio::test]
    async fn test_kelly_ceiling_is_exact() {
        let h = harness();
        // No trade stats: default kelly 0.25, halved, at 0.8 confidence
        // over a 2% risk budget caps the size at exactly 10k. The
        // 10000/18000 factor does not round-trip through f64 exactly;
        // the admitted size still must not exceed the ceiling.
        let result = h
            .pipeline
            .approve(&request("AAPL", dec!(18000)), None, None)
            .await
            .unwrap();

        assert!(result.approved, "rejections: {:?}", result.rejections);
        assert_eq!(result.adjusted_size_usd, dec!(10000));
    }

    #[tokio::test]
    async fn test_symbol_locks_do_not_accumulate() {
        let h = harness();
        for symbol in ["AAPL", "MSFT", "NVDA", "AMD"] {
            h.pipeline
                .approve(&request(symbol, dec!(1000)), None, None)
                .await
                .unwrap();
        }
        // Released locks are evicted on the next acquisition.
        assert!(h.pipeline.symbol_locks.lock().len() <= 1);
    }

    #[tokio::test]
    async fn test_level2_drawdown_rejects() {
        let h = harness();
        // Push the portfolio into a 16% drawdown.
        h.store.deposit_capital(dec!(1)).unwrap();
        h.store
            .read_modify_write(|state| {
                state.drawdown.peak_portfolio_value = dec!(120000);
                Ok(())
            })
            .unwrap();
        // Recompute drawdown against the raised peak.
        h.store.deposit_capital(dec!(1)).unwrap();

        let result = h
            .pipeline
            .approve(&request("AAPL", dec!(5000)), None, None)
            .await
            .unwrap();
        assert!(!result.approved);
        assert_eq!(result.adjusted_size_usd, Decimal::ZERO);
        assert!(result.rejections[0].contains("circuit breaker"));
        // Metadata still populated on rejection.
        assert!(result.metadata.drawdown_pct > 15.0);
    }

    #[tokio::test]
    async fn test_latched_breaker_rejects_after_recovery() {
        let h = harness();
        h.breaker.evaluate(25.0);

        let result = h
            .pipeline
            .approve(&request("AAPL", dec!(5000)), None, None)
            .await
            .unwrap();
        assert!(!result.approved);
    }

    #[tokio::test]
    async fn test_missing_volatility_degrades() {
        let h = harness();
        let mut req = request("AAPL", dec!(5000));
        req.volatility = None;
        // No observation for AAPL in the store either.

        let result = h.pipeline.approve(&req, None, None).await.unwrap();
        assert!(result.metadata.degraded);
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("stale market inputs"))
        );
    }

    #[tokio::test]
    async fn test_fresh_observation_avoids_degradation() {
        let h = harness();
        h.market_data.set_observation("AAPL", dec!(100), 0.22);
        let mut req = request("AAPL", dec!(5000));
        req.volatility = None;

        let result = h.pipeline.approve(&req, None, None).await.unwrap();
        assert!(!result.metadata.degraded);
    }

    #[tokio::test]
    async fn test_malformed_request_is_error() {
        let h = harness();
        let mut req = request("AAPL", dec!(0));
        req.requested_size_usd = Decimal::ZERO;
        assert!(h.pipeline.approve(&req, None, None).await.is_err());

        let mut req = request("AAPL", dec!(5000));
        req.signal_strength = 1.5;
        assert!(h.pipeline.approve(&req, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_size_factors_recorded_and_composed() {
        let h = harness();
        // Warning-level drawdown applies the 0.75 breaker factor.
        h.store
            .read_modify_write(|state| {
                state.drawdown.peak_portfolio_value = dec!(107000);
                Ok(())
            })
            .unwrap();
        h.store.deposit_capital(dec!(1)).unwrap();

        let result = h
            .pipeline
            .approve(&request("AAPL", dec!(5000)), None, None)
            .await
            .unwrap();
        assert!(result.approved);
        assert!(
            result
                .metadata
                .size_factors
                .iter()
                .any(|f| f.gate == "circuit_breaker")
        );
    }

    #[test]
    fn test_composite_risk_score_monotone_in_drawdown() {
        let low = composite_risk_score(2.0, 20.0, 30.0, RiskRegime::LowVolBullish, 1.0, 2.0);
        let high = composite_risk_score(12.0, 20.0, 30.0, RiskRegime::LowVolBullish, 1.0, 2.0);
        assert!(high > low);
        assert!((0.0..=100.0).contains(&low));
    }

    #[test]
    fn test_cluster_exposure_sums_members() {
        let mut state = PortfolioState::new(dec!(100000));
        for symbol in ["A", "B"] {
            state.cash -= dec!(10000);
            state.positions.insert(
                symbol.to_string(),
                crate::models::Position {
                    symbol: symbol.to_string(),
                    side: PositionSide::Long,
                    quantity: dec!(10000),
                    entry_price: Decimal::ONE,
                    current_price: Decimal::ONE,
                    stop_loss_price: None,
                    unrealized_pnl: Decimal::ZERO,
                    realized_pnl: Decimal::ZERO,
                    strategy_id: "s".to_string(),
                    asset_class: AssetClass::Equity,
                    sector: None,
                    opened_at: Utc::now(),
                    closed_at: None,
                },
            );
        }
        let clusters = vec![vec!["A".to_string(), "B".to_string()]];
        let pct = cluster_exposure_pct(&state, &clusters, "A");
        assert!((pct - 20.0).abs() < 1e-9);
    }
}
