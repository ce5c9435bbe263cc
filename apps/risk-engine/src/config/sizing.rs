//! Position sizing configuration.

use serde::{Deserialize, Serialize};

/// Tuning for the goal-aware position sizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Default per-trade risk as a percentage of portfolio value.
    #[serde(default = "default_base_risk_pct")]
    pub base_risk_pct: f64,
    /// Kelly fraction assumed when trade history is too thin.
    #[serde(default = "default_kelly_fraction")]
    pub default_kelly_fraction: f64,
    /// Minimum trade-stat sample size for a trusted Kelly estimate.
    #[serde(default = "default_min_trade_samples")]
    pub min_trade_samples: usize,
    /// Half-Kelly safety multiplier.
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    /// Floor on final allocation, percentage of portfolio value.
    #[serde(default = "default_min_allocation_pct")]
    pub min_allocation_pct: f64,
    /// Ceiling on final allocation, percentage of portfolio value.
    #[serde(default = "default_max_allocation_pct")]
    pub max_allocation_pct: f64,
    /// Fallback stop-loss percentage when the caller supplies none.
    #[serde(default = "default_stop_loss_pct")]
    pub default_stop_loss_pct: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_risk_pct: default_base_risk_pct(),
            default_kelly_fraction: default_kelly_fraction(),
            min_trade_samples: default_min_trade_samples(),
            kelly_multiplier: default_kelly_multiplier(),
            min_allocation_pct: default_min_allocation_pct(),
            max_allocation_pct: default_max_allocation_pct(),
            default_stop_loss_pct: default_stop_loss_pct(),
        }
    }
}

const fn default_base_risk_pct() -> f64 {
    2.0
}

const fn default_kelly_fraction() -> f64 {
    0.25
}

const fn default_min_trade_samples() -> usize {
    30
}

const fn default_kelly_multiplier() -> f64 {
    0.5
}

const fn default_min_allocation_pct() -> f64 {
    1.0
}

const fn default_max_allocation_pct() -> f64 {
    20.0
}

const fn default_stop_loss_pct() -> f64 {
    0.02
}
