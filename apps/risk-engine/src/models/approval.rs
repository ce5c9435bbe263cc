//! Trade request and approval decision records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::breaker::CircuitBreakerLevel;
use crate::regime::RiskRegime;

/// Requested direction of a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    /// Open or add to a long position.
    Buy,
    /// Open or add to a short position.
    Sell,
}

/// A proposed trade entering the approval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    /// Request id for tracing; generated when absent.
    pub request_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Strategy proposing the trade.
    pub strategy_id: String,
    /// Requested direction.
    pub side: TradeSide,
    /// Signal confidence in [0,1].
    pub signal_strength: f64,
    /// Requested notional size in USD.
    pub requested_size_usd: Decimal,
    /// Current price supplied with the request.
    pub current_price: Decimal,
    /// Realized volatility supplied with the request, when available.
    pub volatility: Option<f64>,
    /// Asset class of the instrument.
    pub asset_class: crate::models::AssetClass,
    /// Sector label, when known.
    pub sector: Option<String>,
}

/// One multiplicative size adjustment recorded by a gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeFactor {
    /// Gate that applied the factor.
    pub gate: String,
    /// Multiplicative factor in (0,1].
    pub factor: f64,
    /// Why the factor was applied.
    pub note: String,
}

/// Metadata attached to every approval decision, rejected or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalMetadata {
    /// Market regime at decision time.
    pub regime: RiskRegime,
    /// Circuit breaker level at decision time.
    pub circuit_breaker_level: CircuitBreakerLevel,
    /// Portfolio drawdown percentage at decision time.
    pub drawdown_pct: f64,
    /// Post-trade gross leverage ratio.
    pub leverage: f64,
    /// Estimated post-trade 1-day VaR as a percentage of portfolio value.
    pub var_1d_pct: f64,
    /// Correlation risk score in [0,100].
    pub correlation_risk_score: f64,
    /// Ordered multiplicative size adjustments applied by the gates.
    pub size_factors: Vec<SizeFactor>,
    /// Whether stale inputs forced a conservative fallback.
    pub degraded: bool,
}

/// Immutable admission decision, produced atomically per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResult {
    /// Request this decision answers.
    pub request_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Whether the trade may execute.
    pub approved: bool,
    /// Final admitted size in USD; zero when rejected.
    pub adjusted_size_usd: Decimal,
    /// Stop-loss price for the admitted size, when approved.
    pub stop_loss_price: Option<Decimal>,
    /// Composite risk score in [0,100]; higher is riskier.
    pub risk_score: f64,
    /// Ordered rejection reasons; non-empty exactly when not approved.
    pub rejections: Vec<String>,
    /// Ordered warnings that did not block approval.
    pub warnings: Vec<String>,
    /// Decision metadata.
    pub metadata: ApprovalMetadata,
}

impl ApprovalResult {
    /// Product of all recorded size factors.
    #[must_use]
    pub fn combined_size_factor(&self) -> f64 {
        self.metadata
            .size_factors
            .iter()
            .map(|f| f.factor)
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_combined_size_factor() {
        let result = ApprovalResult {
            request_id: "r1".to_string(),
            symbol: "AAPL".to_string(),
            approved: true,
            adjusted_size_usd: dec!(5000),
            stop_loss_price: Some(dec!(98)),
            risk_score: 35.0,
            rejections: vec![],
            warnings: vec![],
            metadata: ApprovalMetadata {
                regime: RiskRegime::LowVolBullish,
                circuit_breaker_level: CircuitBreakerLevel::Warning,
                drawdown_pct: 6.0,
                leverage: 0.8,
                var_1d_pct: 1.2,
                correlation_risk_score: 40.0,
                size_factors: vec![
                    SizeFactor {
                        gate: "circuit_breaker_multiplier".to_string(),
                        factor: 0.75,
                        note: "WARNING level".to_string(),
                    },
                    SizeFactor {
                        gate: "correlation".to_string(),
                        factor: 0.5,
                        note: "above soft threshold".to_string(),
                    },
                ],
                degraded: false,
            },
        };

        assert!((result.combined_size_factor() - 0.375).abs() < 1e-12);
    }
}
