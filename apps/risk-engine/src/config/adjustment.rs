//! Periodic adjustment loop configuration.

use serde::{Deserialize, Serialize};

/// Tuning for the background adjustment engine and input freshness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentConfig {
    /// Seconds between adjustment sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Market-data age beyond which the pipeline degrades, seconds.
    #[serde(default = "default_stale_ttl_secs")]
    pub stale_ttl_secs: u64,
    /// Fraction removed when a sweep partially reduces a position.
    #[serde(default = "default_reduction_fraction")]
    pub reduction_fraction: f64,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            stale_ttl_secs: default_stale_ttl_secs(),
            reduction_fraction: default_reduction_fraction(),
        }
    }
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_stale_ttl_secs() -> u64 {
    120
}

const fn default_reduction_fraction() -> f64 {
    0.5
}
