//! Regime-keyed stop-loss calculation.
//!
//! A deterministic lookup table maps each regime to a stop multiplier,
//! trailing distance, and ATR multiplier. Calm regimes keep standard
//! stops; high-volatility regimes widen them to avoid whipsaw; crisis
//! tightens hard for capital preservation.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::PositionSide;
use crate::regime::RiskRegime;

/// Stop parameters for one regime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopParameters {
    /// Multiplier applied to the instrument's base stop percentage.
    pub stop_multiplier: f64,
    /// Trailing distance as a fraction of price.
    pub trailing_pct: f64,
    /// ATR multiplier for volatility-scaled stops.
    pub atr_multiplier: f64,
    /// Unrealized-gain fraction at which the stop moves to breakeven.
    /// Same row as the trailing distance.
    pub breakeven_trigger_pct: f64,
}

/// Computes stop prices from regime and entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicStopLossCalculator;

impl DynamicStopLossCalculator {
    /// New calculator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Table row for a regime. Total over the enum.
    #[must_use]
    pub const fn parameters(regime: RiskRegime) -> StopParameters {
        match regime {
            RiskRegime::LowVolBullish => StopParameters {
                stop_multiplier: 1.0,
                trailing_pct: 0.02,
                atr_multiplier: 2.0,
                breakeven_trigger_pct: 0.02,
            },
            RiskRegime::LowVolBearish => StopParameters {
                stop_multiplier: 0.8,
                trailing_pct: 0.015,
                atr_multiplier: 1.5,
                breakeven_trigger_pct: 0.015,
            },
            RiskRegime::HighVolBullish => StopParameters {
                stop_multiplier: 1.5,
                trailing_pct: 0.04,
                atr_multiplier: 3.0,
                breakeven_trigger_pct: 0.04,
            },
            RiskRegime::HighVolBearish => StopParameters {
                stop_multiplier: 1.2,
                trailing_pct: 0.03,
                atr_multiplier: 2.5,
                breakeven_trigger_pct: 0.03,
            },
            RiskRegime::ExtremeVolatility => StopParameters {
                stop_multiplier: 2.0,
                trailing_pct: 0.06,
                atr_multiplier: 4.0,
                breakeven_trigger_pct: 0.06,
            },
            RiskRegime::Crisis => StopParameters {
                stop_multiplier: 0.5,
                trailing_pct: 0.01,
                atr_multiplier: 1.0,
                breakeven_trigger_pct: 0.01,
            },
        }
    }

    /// Regime-adjusted stop percentage for an instrument base stop.
    #[must_use]
    pub fn adjusted_stop_pct(regime: RiskRegime, base_stop_pct: f64) -> f64 {
        base_stop_pct * Self::parameters(regime).stop_multiplier
    }

    /// Initial stop price from entry: below entry for longs, above for
    /// shorts.
    #[must_use]
    pub fn stop_price(
        regime: RiskRegime,
        side: PositionSide,
        entry_price: Decimal,
        base_stop_pct: f64,
    ) -> Decimal {
        let adjusted = Self::adjusted_stop_pct(regime, base_stop_pct);
        let pct = Decimal::from_f64(adjusted).unwrap_or(Decimal::ZERO);
        match side {
            PositionSide::Long => entry_price * (Decimal::ONE - pct),
            PositionSide::Short => entry_price * (Decimal::ONE + pct),
        }
    }

    /// Trailing stop candidate at the current price; `None` when the
    /// candidate would not tighten the existing stop. Stops only ever
    /// move toward price.
    #[must_use]
    pub fn trail_stop(
        regime: RiskRegime,
        side: PositionSide,
        current_price: Decimal,
        existing_stop: Option<Decimal>,
    ) -> Option<Decimal> {
        let trailing = Decimal::from_f64(Self::parameters(regime).trailing_pct)
            .unwrap_or(Decimal::ZERO);
        let candidate = match side {
            PositionSide::Long => current_price * (Decimal::ONE - trailing),
            PositionSide::Short => current_price * (Decimal::ONE + trailing),
        };
        match (side, existing_stop) {
            (_, None) => Some(candidate),
            (PositionSide::Long, Some(stop)) if candidate > stop => Some(candidate),
            (PositionSide::Short, Some(stop)) if candidate < stop => Some(candidate),
            _ => None,
        }
    }
}
