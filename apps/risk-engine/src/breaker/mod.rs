//! Drawdown circuit breaker.
//!
//! The breaker depends on drawdown alone. Regime, correlation, and VaR
//! never feed it, so it keeps working as the last line of defense even
//! when every other input is stale or wrong.

mod controller;

use serde::{Deserialize, Serialize};

pub use controller::{BreakerStatus, CircuitBreakerController};

/// Ordered breaker levels. `NONE < WARNING < LEVEL_1 < LEVEL_2 < LEVEL_3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitBreakerLevel {
    /// Drawdown below 5%.
    None,
    /// Drawdown in [5%, 10%).
    Warning,
    /// Drawdown in [10%, 15%).
    Level1,
    /// Drawdown in [15%, 20%). New positions blocked.
    Level2,
    /// Drawdown at or above 20%. One-way trip; requires explicit reset.
    Level3,
}

impl CircuitBreakerLevel {
    /// Total mapping from drawdown percentage to level.
    #[must_use]
    pub fn from_drawdown(drawdown_pct: f64) -> Self {
        if drawdown_pct >= LEVEL_3_THRESHOLD_PCT {
            Self::Level3
        } else if drawdown_pct >= LEVEL_2_THRESHOLD_PCT {
            Self::Level2
        } else if drawdown_pct >= LEVEL_1_THRESHOLD_PCT {
            Self::Level1
        } else if drawdown_pct >= WARNING_THRESHOLD_PCT {
            Self::Warning
        } else {
            Self::None
        }
    }

    /// Size multiplier applied to new entries at this level.
    #[must_use]
    pub const fn size_multiplier(&self) -> f64 {
        match self {
            Self::None => 1.0,
            Self::Warning => 0.75,
            Self::Level1 => 0.5,
            Self::Level2 | Self::Level3 => 0.0,
        }
    }

    /// Whether new positions may open at this level.
    #[must_use]
    pub const fn allows_new_positions(&self) -> bool {
        matches!(self, Self::None | Self::Warning | Self::Level1)
    }

    /// Recommended operator actions at this level.
    #[must_use]
    pub fn actions(&self) -> Vec<&'static str> {
        match self {
            Self::None => vec![],
            Self::Warning => vec!["monitor"],
            Self::Level1 => vec!["tighten stops"],
            Self::Level2 => vec!["block new positions"],
            Self::Level3 => vec!["block new positions", "close all positions"],
        }
    }

    /// Stable wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Warning => "WARNING",
            Self::Level1 => "LEVEL_1",
            Self::Level2 => "LEVEL_2",
            Self::Level3 => "LEVEL_3",
        }
    }
}

impl std::fmt::Display for CircuitBreakerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Drawdown band cut-points, in percent of peak.
pub const WARNING_THRESHOLD_PCT: f64 = 5.0;
/// Level-1 cut-point.
pub const LEVEL_1_THRESHOLD_PCT: f64 = 10.0;
/// Level-2 cut-point.
pub const LEVEL_2_THRESHOLD_PCT: f64 = 15.0;
/// Level-3 cut-point, the one-way trip.
pub const LEVEL_3_THRESHOLD_PCT: f64 = 20.0;
/// Points below the Level-3 cut-point drawdown must recover before a
/// reset is accepted.
pub const RESET_HYSTERESIS_PCT: f64 = 2.0;
