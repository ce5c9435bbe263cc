//! Regime classification configuration.
//!
//! Percentile cut-points are configuration, not constants: calibration
//! differs per market and per volatility estimator.

use serde::{Deserialize, Serialize};

/// Tuning for the regime classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Volatility percentile below which the LOW tier applies.
    #[serde(default = "default_low_vol_percentile")]
    pub low_vol_percentile: f64,
    /// Volatility percentile above which the HIGH tier applies.
    #[serde(default = "default_high_vol_percentile")]
    pub high_vol_percentile: f64,
    /// Volatility percentile above which the EXTREME tier applies.
    #[serde(default = "default_extreme_vol_percentile")]
    pub extreme_vol_percentile: f64,
    /// Absolute annualized-volatility ceiling that forces EXTREME.
    #[serde(default = "default_absolute_vol_ceiling")]
    pub absolute_vol_ceiling: f64,
    /// Cumulative trailing return beyond which the trend is directional.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,
    /// Cross-asset average correlation above which EXTREME+BEARISH
    /// escalates to CRISIS.
    #[serde(default = "default_correlation_breakdown_threshold")]
    pub correlation_breakdown_threshold: f64,
    /// Minimum volatility history length for a meaningful percentile.
    #[serde(default = "default_min_vol_history")]
    pub min_vol_history: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            low_vol_percentile: default_low_vol_percentile(),
            high_vol_percentile: default_high_vol_percentile(),
            extreme_vol_percentile: default_extreme_vol_percentile(),
            absolute_vol_ceiling: default_absolute_vol_ceiling(),
            trend_threshold: default_trend_threshold(),
            correlation_breakdown_threshold: default_correlation_breakdown_threshold(),
            min_vol_history: default_min_vol_history(),
        }
    }
}

const fn default_low_vol_percentile() -> f64 {
    20.0
}

const fn default_high_vol_percentile() -> f64 {
    80.0
}

const fn default_extreme_vol_percentile() -> f64 {
    95.0
}

const fn default_absolute_vol_ceiling() -> f64 {
    1.0
}

const fn default_trend_threshold() -> f64 {
    0.02
}

const fn default_correlation_breakdown_threshold() -> f64 {
    0.85
}

const fn default_min_vol_history() -> usize {
    30
}
