//! Shared context and running evaluation for the approval gates.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::breaker::BreakerStatus;
use crate::config::PortfolioLimits;
use crate::correlation::CorrelationAssessment;
use crate::models::SizeFactor;
use crate::portfolio::PortfolioState;
use crate::regime::RegimeAssessment;

/// Everything a gate may read. Assembled once per request from one
/// portfolio snapshot so all gates see the same world.
pub struct GateContext<'a> {
    /// Active limits snapshot.
    pub limits: &'a PortfolioLimits,
    /// Portfolio snapshot the decision is made against.
    pub state: &'a PortfolioState,
    /// Portfolio equity from the snapshot.
    pub portfolio_value: Decimal,
    /// Breaker status at evaluation time.
    pub breaker: &'a BreakerStatus,
    /// Regime assessment at evaluation time.
    pub regime: &'a RegimeAssessment,
    /// Last completed correlation assessment.
    pub correlation: &'a CorrelationAssessment,
    /// Mean absolute correlation of the request symbol against the
    /// portfolio, when computable.
    pub marginal_correlation: Option<f64>,
    /// Existing exposure of the request symbol's correlation cluster,
    /// as a percentage of portfolio value.
    pub cluster_exposure_pct: f64,
    /// Daily volatility fraction used for the VaR estimate.
    pub daily_volatility: f64,
    /// True when a stale or missing input forced conservative fallbacks.
    pub degraded: bool,
}

impl GateContext<'_> {
    /// A notional amount as a percentage of portfolio value.
    #[must_use]
    pub fn pct_of_portfolio(&self, notional: Decimal) -> f64 {
        self.state.exposure_pct(notional)
    }

    /// Notional headroom under a percentage cap given existing exposure.
    #[must_use]
    pub fn headroom(&self, cap_pct: f64, existing: Decimal) -> Decimal {
        let cap = self.portfolio_value
            * Decimal::from_f64(cap_pct / 100.0).unwrap_or(Decimal::ZERO);
        (cap - existing).max(Decimal::ZERO)
    }
}

/// Running state threaded through the gate sequence.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Size after every factor applied so far.
    pub current_size: Decimal,
    /// Ordered multiplicative adjustments.
    pub size_factors: Vec<SizeFactor>,
    /// Non-blocking warnings.
    pub warnings: Vec<String>,
    /// Rejection reasons; the first one short-circuits later gates.
    pub rejections: Vec<String>,
}

impl Evaluation {
    /// Start from the requested size.
    #[must_use]
    pub fn new(requested: Decimal) -> Self {
        Self {
            current_size: requested,
            size_factors: Vec::new(),
            warnings: Vec::new(),
            rejections: Vec::new(),
        }
    }

    /// Apply and record a multiplicative size factor.
    pub fn adjust(&mut self, gate: &str, factor: f64, note: impl Into<String>) {
        let note = note.into();
        self.current_size *= Decimal::from_f64(factor).unwrap_or(Decimal::ONE);
        self.size_factors.push(SizeFactor {
            gate: gate.to_string(),
            factor,
            note,
        });
    }

    /// Record a hard rejection.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.rejections.push(reason.into());
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Whether a gate has already rejected.
    #[must_use]
    pub fn rejected(&self) -> bool {
        !self.rejections.is_empty()
    }
}
