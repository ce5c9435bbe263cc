//! Market regime classification.
//!
//! Classifies the market into one of six regimes from a benchmark
//! volatility history and trailing returns. Volatility tier comes from
//! the percentile rank of current volatility within its own history,
//! with an absolute ceiling that forces EXTREME regardless of rank.

use serde::{Deserialize, Serialize};

mod classifier;

pub use classifier::{RegimeAssessment, RegimeClassifier, TrendDirection, VolatilityTier};

/// Market risk regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRegime {
    /// Calm market, rising or flat trend.
    LowVolBullish,
    /// Calm market, falling trend.
    LowVolBearish,
    /// Elevated volatility, rising or flat trend.
    HighVolBullish,
    /// Elevated volatility, falling trend.
    HighVolBearish,
    /// Volatility in the extreme tail; trend no longer matters.
    ExtremeVolatility,
    /// Extreme volatility, falling trend, and cross-asset correlation
    /// breakdown. Entries stop entirely.
    Crisis,
}

impl RiskRegime {
    /// Stable wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LowVolBullish => "LOW_VOL_BULLISH",
            Self::LowVolBearish => "LOW_VOL_BEARISH",
            Self::HighVolBullish => "HIGH_VOL_BULLISH",
            Self::HighVolBearish => "HIGH_VOL_BEARISH",
            Self::ExtremeVolatility => "EXTREME_VOLATILITY",
            Self::Crisis => "CRISIS",
        }
    }

    /// Size factor applied to new entries in this regime.
    ///
    /// `high_vol_factor` and `extreme_vol_factor` come from the portfolio
    /// limits so operators can tighten them without a rebuild.
    #[must_use]
    pub fn size_factor(&self, high_vol_factor: f64, extreme_vol_factor: f64) -> f64 {
        match self {
            Self::LowVolBullish | Self::LowVolBearish => 1.0,
            Self::HighVolBullish | Self::HighVolBearish => high_vol_factor,
            Self::ExtremeVolatility => extreme_vol_factor,
            Self::Crisis => 0.0,
        }
    }

    /// Whether new entries are allowed at all.
    #[must_use]
    pub const fn allows_entries(&self) -> bool {
        !matches!(self, Self::Crisis)
    }
}

impl std::fmt::Display for RiskRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Percentile rank of `value` within `history`, in [0, 100].
///
/// Fraction of observations strictly below `value`; ties count below
/// the rank, so the current value sitting exactly at a cut-point lands
/// in the lower tier.
#[must_use]
pub(crate) fn percentile_rank(history: &[f64], value: f64) -> f64 {
    if history.is_empty() {
        return 50.0;
    }
    let below = history.iter().filter(|&&v| v < value).count();
    #[allow(clippy::cast_precision_loss)]
    let rank = below as f64 / history.len() as f64;
    rank * 100.0
}
