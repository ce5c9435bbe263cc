//! Gate-test fixture: a self-contained bundle of everything a
//! [`GateContext`] borrows.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::breaker::{BreakerStatus, CircuitBreakerController};
use crate::config::PortfolioLimits;
use crate::correlation::CorrelationAssessment;
use crate::models::{AssetClass, Position, PositionSide};
use crate::portfolio::PortfolioState;
use crate::regime::{RegimeAssessment, TrendDirection, VolatilityTier};

use super::types::GateContext;

pub(crate) struct ContextFixture {
    pub limits: PortfolioLimits,
    pub state: PortfolioState,
    pub breaker: BreakerStatus,
    pub regime: RegimeAssessment,
    pub correlation: CorrelationAssessment,
    pub marginal_correlation: Option<f64>,
    pub cluster_exposure_pct: f64,
    pub daily_volatility: f64,
    pub degraded: bool,
}

impl ContextFixture {
    pub fn context(&self) -> GateContext<'_> {
        GateContext {
            limits: &self.limits,
            state: &self.state,
            portfolio_value: self.state.total_value(),
            breaker: &self.breaker,
            regime: &self.regime,
            correlation: &self.correlation,
            marginal_correlation: self.marginal_correlation,
            cluster_exposure_pct: self.cluster_exposure_pct,
            daily_volatility: self.daily_volatility,
            degraded: self.degraded,
        }
    }

    pub fn drawdown(&mut self, pct: f64) {
        self.breaker = CircuitBreakerController::new().evaluate(pct);
    }

    /// Add an open long position at price 1, paid from cash, so the
    /// portfolio value stays constant.
    pub fn with_position(
        &mut self,
        symbol: &str,
        strategy_id: &str,
        asset_class: AssetClass,
        sector: Option<&str>,
        notional: Decimal,
    ) {
        self.state.cash -= notional;
        self.state.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                side: PositionSide::Long,
                quantity: notional,
                entry_price: Decimal::ONE,
                current_price: Decimal::ONE,
                stop_loss_price: None,
                unrealized_pnl: Decimal::ZERO,
                realized_pnl: Decimal::ZERO,
                strategy_id: strategy_id.to_string(),
                asset_class,
                sector: sector.map(str::to_string),
                opened_at: Utc::now(),
                closed_at: None,
            },
        );
    }
}

/// Calm defaults: 100k cash, no drawdown, low-vol bullish regime,
/// trivial correlation, 1% daily volatility.
pub(crate) fn context_fixture() -> ContextFixture {
    ContextFixture {
        limits: PortfolioLimits::default(),
        state: PortfolioState::new(Decimal::from(100_000)),
        breaker: CircuitBreakerController::new().evaluate(0.0),
        regime: RegimeAssessment {
            regime: crate::regime::RiskRegime::LowVolBullish,
            volatility_tier: VolatilityTier::Low,
            trend: TrendDirection::Bullish,
            vol_percentile: 40.0,
            current_vol: 0.15,
            cumulative_return: 0.03,
            degraded: false,
        },
        correlation: CorrelationAssessment::trivial(0),
        marginal_correlation: None,
        cluster_exposure_pct: 0.0,
        daily_volatility: 0.01,
        degraded: false,
    }
}
