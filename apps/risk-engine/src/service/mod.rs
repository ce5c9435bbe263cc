//! The risk engine service: the operation surface collaborators call.
//!
//! Transport-agnostic; a gRPC or HTTP front-end would wrap these
//! methods one-to-one.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::adjustment::{AdjustmentReport, PeriodicAdjustmentEngine};
use crate::approval::{TradeApprovalPipeline, composite_risk_score};
use crate::breaker::{BreakerStatus, CircuitBreakerController};
use crate::config::{PortfolioLimits, PortfolioLimitsUpdate, RiskConfig, SharedLimits};
use crate::correlation::{CorrelationAssessment, CorrelationRiskAssessor};
use crate::error::RiskError;
use crate::models::{
    ApprovalResult, AssetClass, FillNotification, FinancialGoal, GoalProgress, TradeRequest,
    TradeSide,
};
use crate::portfolio::PortfolioStateStore;
use crate::ports::MarketDataPort;
use crate::regime::{RegimeAssessment, RegimeClassifier};
use crate::sizing::{PositionSizer, TradeStats};

/// Portfolio-level metrics for the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Portfolio equity.
    pub portfolio_value: Decimal,
    /// Gross leverage ratio.
    pub leverage: f64,
    /// Estimated 1-day VaR percentage at current leverage.
    pub var_1d_pct: f64,
    /// Current drawdown percentage.
    pub drawdown_pct: f64,
    /// Cash as a percentage of portfolio value.
    pub cash_reserve_pct: f64,
    /// Composite 0-100 risk score.
    pub risk_score: f64,
}

/// Full engine status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStatus {
    /// Breaker level, drawdown, multiplier, and actions.
    pub circuit_breaker: BreakerStatus,
    /// Current regime assessment.
    pub regime: RegimeAssessment,
    /// Portfolio metrics.
    pub portfolio: PortfolioMetrics,
    /// Last completed correlation assessment.
    pub correlation: CorrelationAssessment,
    /// Active limits snapshot.
    pub limits: PortfolioLimits,
    /// Number of open positions.
    pub active_position_count: usize,
}

/// Response for `position_size_recommendation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRecommendationResponse {
    /// Instrument symbol.
    pub symbol: String,
    /// Recommended notional size; zero when not approved.
    pub recommended_size_usd: Decimal,
    /// Recommended quantity at the supplied price.
    pub recommended_quantity: Decimal,
    /// Stop-loss price for the recommended entry.
    pub stop_loss_price: Option<Decimal>,
    /// Loss if the stop fills exactly.
    pub max_loss_usd: Decimal,
    /// Composite risk score at decision time.
    pub risk_score: f64,
    /// Whether an order of this size would currently be admitted.
    pub approved: bool,
    /// Warnings from the evaluation.
    pub warnings: Vec<String>,
}

/// The engine facade.
pub struct RiskEngineService {
    config: RiskConfig,
    limits: SharedLimits,
    store: Arc<PortfolioStateStore>,
    breaker: Arc<CircuitBreakerController>,
    assessor: Arc<CorrelationRiskAssessor>,
    pipeline: TradeApprovalPipeline,
    adjustment: Arc<PeriodicAdjustmentEngine>,
    market_data: Arc<dyn MarketDataPort>,
    classifier: RegimeClassifier,
    goal: parking_lot::RwLock<Option<FinancialGoal>>,
}

impl RiskEngineService {
    /// Wire the whole engine from config, starting cash, and a market
    /// data port.
    #[must_use]
    pub fn new(
        config: RiskConfig,
        initial_cash: Decimal,
        market_data: Arc<dyn MarketDataPort>,
    ) -> Self {
        let limits: SharedLimits = Arc::new(parking_lot::RwLock::new(Arc::new(
            config.limits.clone(),
        )));
        let store = Arc::new(PortfolioStateStore::new(initial_cash));
        let breaker = Arc::new(CircuitBreakerController::new());
        let assessor = Arc::new(CorrelationRiskAssessor::new(
            config.correlation.clone(),
            Arc::clone(&market_data),
        ));
        let pipeline = TradeApprovalPipeline::new(
            config.clone(),
            Arc::clone(&limits),
            Arc::clone(&store),
            Arc::clone(&breaker),
            Arc::clone(&assessor),
            Arc::clone(&market_data),
        );
        let adjustment = Arc::new(PeriodicAdjustmentEngine::new(
            config.adjustment.clone(),
            config.regime.clone(),
            Arc::clone(&limits),
            Arc::clone(&store),
            Arc::clone(&breaker),
            Arc::clone(&assessor),
            Arc::clone(&market_data),
        ));
        let classifier = RegimeClassifier::new(config.regime.clone());

        Self {
            config,
            limits,
            store,
            breaker,
            assessor,
            pipeline,
            adjustment,
            market_data,
            classifier,
            goal: parking_lot::RwLock::new(None),
        }
    }

    /// Evaluate a trade request through the approval pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed requests; rejections are
    /// ordinary results.
    pub async fn approve_trade(
        &self,
        mut request: TradeRequest,
    ) -> Result<ApprovalResult, RiskError> {
        if request.request_id.is_empty() {
            request.request_id = Uuid::new_v4().to_string();
        }
        let stats = self.strategy_stats(&request.strategy_id);
        let goal = self.goal_progress();
        self.pipeline
            .approve(&request, stats.as_ref(), goal.as_ref())
            .await
    }

    /// Recommend a size for a prospective entry without a requested
    /// notional: evaluates at the maximum allocation and reports what
    /// the gates admit.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-positive prices or a signal
    /// strength outside [0, 1].
    pub async fn position_size_recommendation(
        &self,
        symbol: &str,
        strategy_id: &str,
        signal_strength: f64,
        current_price: Decimal,
    ) -> Result<SizeRecommendationResponse, RiskError> {
        let state = self.store.snapshot();
        let ceiling = state.total_value()
            * Decimal::from_f64(self.config.sizing.max_allocation_pct / 100.0)
                .unwrap_or(Decimal::ZERO);
        if ceiling <= Decimal::ZERO {
            return Err(RiskError::validation(
                "portfolio value is non-positive; nothing to size",
            ));
        }

        let request = TradeRequest {
            request_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            strategy_id: strategy_id.to_string(),
            side: TradeSide::Buy,
            signal_strength,
            requested_size_usd: ceiling,
            current_price,
            volatility: None,
            asset_class: AssetClass::Equity,
            sector: None,
        };
        let result = self.approve_trade(request).await?;

        let size = result.adjusted_size_usd;
        let quantity = if current_price > Decimal::ZERO {
            size / current_price
        } else {
            Decimal::ZERO
        };
        let stop_pct = crate::stops::DynamicStopLossCalculator::adjusted_stop_pct(
            result.metadata.regime,
            self.config.sizing.default_stop_loss_pct,
        );
        Ok(SizeRecommendationResponse {
            symbol: symbol.to_string(),
            recommended_size_usd: size,
            recommended_quantity: quantity,
            stop_loss_price: result.stop_loss_price,
            max_loss_usd: PositionSizer::max_loss_usd(size, stop_pct),
            risk_score: result.risk_score,
            approved: result.approved,
            warnings: result.warnings,
        })
    }

    /// Full status snapshot for dashboards and collaborators.
    #[must_use]
    pub fn risk_status(&self) -> RiskStatus {
        let state = self.store.snapshot();
        let limits = Arc::clone(&self.limits.read());
        let breaker = self.breaker.evaluate(state.drawdown.current_drawdown_pct);
        let correlation = self.assessor.current();
        let history = self.market_data.market_history();
        let regime = self
            .classifier
            .classify(history.as_ref(), correlation.avg_correlation);

        let leverage = state.leverage();
        let daily_vol = regime.current_vol / 252_f64.sqrt();
        let var_1d_pct = 1.65 * daily_vol * leverage * 100.0;
        let risk_score = composite_risk_score(
            state.drawdown.current_drawdown_pct,
            limits.max_drawdown_pct,
            correlation.correlation_risk_score,
            regime.regime,
            leverage,
            limits.max_leverage,
        );

        RiskStatus {
            circuit_breaker: breaker,
            regime,
            portfolio: PortfolioMetrics {
                portfolio_value: state.total_value(),
                leverage,
                var_1d_pct,
                drawdown_pct: state.drawdown.current_drawdown_pct,
                cash_reserve_pct: state.cash_reserve_pct(),
                risk_score,
            },
            correlation: (*correlation).clone(),
            limits: (*limits).clone(),
            active_position_count: state.positions.len(),
        }
    }

    /// Apply a partial limits update, all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns the validation error for the first out-of-range field;
    /// the active snapshot is untouched on failure.
    #[instrument(skip_all)]
    pub fn update_limits(
        &self,
        update: &PortfolioLimitsUpdate,
    ) -> Result<PortfolioLimits, RiskError> {
        let mut guard = self.limits.write();
        let next = guard.with_update(update)?;
        *guard = Arc::new(next.clone());
        info!("portfolio limits updated");
        Ok(next)
    }

    /// Run one adjustment pass immediately.
    ///
    /// # Errors
    ///
    /// Surfaces portfolio write failures from the pass.
    pub fn force_adjustment_check(&self) -> Result<AdjustmentReport, RiskError> {
        self.adjustment.run_once()
    }

    /// Ad-hoc correlation analysis over an arbitrary symbol set.
    #[must_use]
    pub fn correlation_analysis(&self, symbols: &[String]) -> CorrelationAssessment {
        self.assessor.analyze(symbols)
    }

    /// Refresh the cached correlation matrix for the open book.
    ///
    /// # Errors
    ///
    /// Returns `DATA_UNAVAILABLE` when no open symbol has return
    /// history; the previously published assessment stays in effect.
    pub fn refresh_correlations(&self) -> Result<(), RiskError> {
        let symbols = self.store.snapshot().open_symbols();
        self.assessor.refresh(&symbols)
    }

    /// Record an execution fill against the portfolio.
    ///
    /// # Errors
    ///
    /// Rejects reductions against unknown symbols or beyond the open
    /// quantity.
    pub fn record_fill(&self, fill: &FillNotification) -> Result<(), RiskError> {
        self.store.apply_fill(fill)
    }

    /// Mark a symbol to a new price.
    ///
    /// # Errors
    ///
    /// Surfaces portfolio write failures.
    pub fn record_price(&self, symbol: &str, price: Decimal) -> Result<(), RiskError> {
        self.store.mark_price(symbol, price)
    }

    /// Install or replace the financial goal driving the sizer.
    pub fn set_goal(&self, goal: FinancialGoal) {
        *self.goal.write() = Some(goal);
    }

    /// Remove the financial goal; sizing reverts to base risk.
    pub fn clear_goal(&self) {
        *self.goal.write() = None;
    }

    /// Operator acknowledgement to release a latched LEVEL_3 breaker.
    ///
    /// # Errors
    ///
    /// Refused while drawdown remains inside the hysteresis band or when
    /// the breaker is not latched.
    pub fn acknowledge_breaker_reset(&self) -> Result<(), RiskError> {
        let drawdown = self.store.snapshot().drawdown.current_drawdown_pct;
        self.breaker.acknowledge_reset(drawdown)
    }

    /// Withdraw capital, rebasing the drawdown peak.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and withdrawals beyond free cash.
    pub fn withdraw_capital(&self, amount: Decimal) -> Result<(), RiskError> {
        self.store.withdraw_capital(amount)
    }

    /// Deposit capital.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts.
    pub fn deposit_capital(&self, amount: Decimal) -> Result<(), RiskError> {
        self.store.deposit_capital(amount)
    }

    /// Background adjustment engine, for the host to spawn.
    #[must_use]
    pub fn adjustment_engine(&self) -> Arc<PeriodicAdjustmentEngine> {
        Arc::clone(&self.adjustment)
    }

    /// Correlation refresh cadence from config, for the host loop.
    #[must_use]
    pub fn correlation_refresh_interval_secs(&self) -> u64 {
        self.config.correlation.refresh_interval_secs
    }

    /// Portfolio store handle, for hosts feeding fills directly.
    #[must_use]
    pub fn store(&self) -> Arc<PortfolioStateStore> {
        Arc::clone(&self.store)
    }

    /// Trailing trade statistics for a strategy from its closed
    /// positions; `None` when nothing has closed yet.
    fn strategy_stats(&self, strategy_id: &str) -> Option<TradeStats> {
        use rust_decimal::prelude::ToPrimitive;

        let state = self.store.snapshot();
        let closed: Vec<f64> = state
            .closed_positions
            .iter()
            .filter(|p| p.strategy_id == strategy_id)
            .filter_map(|p| p.realized_pnl.to_f64())
            .collect();
        if closed.is_empty() {
            return None;
        }

        let wins: Vec<f64> = closed.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = closed.iter().copied().filter(|p| *p < 0.0).collect();
        #[allow(clippy::cast_precision_loss)]
        let win_rate = wins.len() as f64 / closed.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let avg_win = if wins.is_empty() {
            0.0
        } else {
            wins.iter().sum::<f64>() / wins.len() as f64
        };
        #[allow(clippy::cast_precision_loss)]
        let avg_loss = if losses.is_empty() {
            0.0
        } else {
            losses.iter().map(|l| l.abs()).sum::<f64>() / losses.len() as f64
        };

        Some(TradeStats {
            win_rate,
            avg_win,
            avg_loss,
            sample_size: closed.len(),
        })
    }

    fn goal_progress(&self) -> Option<GoalProgress> {
        self.goal.read().as_ref().map(|g| g.progress_at(Utc::now()))
    }
}

impl std::fmt::Debug for RiskEngineService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngineService").finish_non_exhaustive()
    }
}
