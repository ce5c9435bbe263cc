//! Goal-aware, confidence-scaled half-Kelly position sizing.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SizingConfig;
use crate::models::GoalProgress;

use super::kelly::{TradeStats, kelly_fraction};

/// Sizing output with the audit trail behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRecommendation {
    /// Final recommended position value.
    pub size_usd: Decimal,
    /// Risk percentage after goal adjustment.
    pub adjusted_risk_pct: f64,
    /// Dollar risk at the adjusted percentage.
    pub risk_amount: Decimal,
    /// Raw position value before the Kelly adjustment.
    pub position_value: Decimal,
    /// Kelly fraction used (computed or default).
    pub kelly_fraction: f64,
    /// Combined Kelly adjustment: fraction x multiplier x confidence.
    pub kelly_adjustment: f64,
    /// True when trade statistics were too thin and the default Kelly
    /// fraction was substituted.
    pub low_confidence: bool,
    /// Human-readable account of every adjustment that applied.
    pub reasoning: String,
}

/// Position sizer.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    /// New sizer with the given tuning.
    #[must_use]
    pub const fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// Compute a recommended position value.
    ///
    /// `stop_loss_pct` is a fraction (0.02 = 2%); `confidence` is the
    /// signal strength in [0, 1]. Goal progress scales risk up when the
    /// portfolio is behind schedule and down when it is comfortably
    /// ahead. The result is clamped to the configured allocation band.
    #[must_use]
    pub fn size(
        &self,
        portfolio_value: Decimal,
        stop_loss_pct: f64,
        confidence: f64,
        stats: Option<&TradeStats>,
        goal: Option<&GoalProgress>,
    ) -> SizeRecommendation {
        let mut notes: Vec<String> = Vec::new();
        let confidence = confidence.clamp(0.0, 1.0);
        let stop_loss_pct = if stop_loss_pct > 0.0 {
            stop_loss_pct
        } else {
            notes.push(format!(
                "stop {:.1}% substituted for non-positive input",
                self.config.default_stop_loss_pct * 100.0
            ));
            self.config.default_stop_loss_pct
        };

        let (adjusted_risk_pct, goal_note) = self.goal_adjusted_risk(goal);
        if let Some(note) = goal_note {
            notes.push(note);
        }

        let (kelly, low_confidence) = self.resolve_kelly(stats, &mut notes);
        let kelly_adjustment = kelly * self.config.kelly_multiplier * confidence;
        notes.push(format!(
            "kelly {kelly:.4} x {} x confidence {confidence:.2} = {kelly_adjustment:.4}",
            self.config.kelly_multiplier
        ));

        let risk_amount = portfolio_value
            * Decimal::from_f64(adjusted_risk_pct / 100.0).unwrap_or(Decimal::ZERO);
        let position_value =
            risk_amount / Decimal::from_f64(stop_loss_pct).unwrap_or(Decimal::ONE);
        let raw_size =
            position_value * Decimal::from_f64(kelly_adjustment).unwrap_or(Decimal::ZERO);

        let floor = portfolio_value
            * Decimal::from_f64(self.config.min_allocation_pct / 100.0)
                .unwrap_or(Decimal::ZERO);
        let ceiling = portfolio_value
            * Decimal::from_f64(self.config.max_allocation_pct / 100.0)
                .unwrap_or(Decimal::ONE);
        let size_usd = raw_size.clamp(floor, ceiling);
        if size_usd != raw_size {
            notes.push(format!(
                "clamped to [{:.0}%, {:.0}%] allocation band",
                self.config.min_allocation_pct, self.config.max_allocation_pct
            ));
        }

        let reasoning = notes.join("; ");
        debug!(
            size = %size_usd,
            adjusted_risk_pct,
            kelly_adjustment,
            "position sized"
        );

        SizeRecommendation {
            size_usd,
            adjusted_risk_pct,
            risk_amount,
            position_value,
            kelly_fraction: kelly,
            kelly_adjustment,
            low_confidence,
            reasoning,
        }
    }

    /// Base risk scaled by how far the portfolio is behind or ahead of
    /// its goal. Acceleration is capped so falling behind never buys
    /// unlimited risk.
    fn goal_adjusted_risk(&self, goal: Option<&GoalProgress>) -> (f64, Option<String>) {
        let base = self.config.base_risk_pct;
        let Some(goal) = goal else {
            return (base, None);
        };
        // 0.5 - 0.4 computes to 0.09999999999999998; round so an input
        // that sits mathematically on a band boundary lands in its band.
        let gap = (goal.gap() * 1e9).round() / 1e9;

        let (factor, cap) = if gap > 0.20 {
            (1.5, Some(5.0))
        } else if gap >= 0.10 {
            (1.3, Some(4.0))
        } else if gap > 0.0 {
            (1.1, Some(3.0))
        } else if gap < -0.30 {
            (0.7, None)
        } else if gap <= -0.15 {
            (0.85, None)
        } else {
            return (base, None);
        };

        let mut adjusted = base * factor;
        if let Some(cap) = cap {
            adjusted = adjusted.min(cap);
        }
        let note = format!(
            "goal gap {gap:+.2}: risk {base:.2}% x {factor} -> {adjusted:.2}%"
        );
        (adjusted, Some(note))
    }

    fn resolve_kelly(&self, stats: Option<&TradeStats>, notes: &mut Vec<String>) -> (f64, bool) {
        match stats {
            Some(stats) if stats.sample_size >= self.config.min_trade_samples => {
                match kelly_fraction(stats) {
                    Some(k) => (k, false),
                    None => {
                        notes.push("degenerate trade stats; default kelly fraction".to_string());
                        (self.config.default_kelly_fraction, true)
                    }
                }
            }
            Some(stats) => {
                notes.push(format!(
                    "only {} trades on record; default kelly fraction",
                    stats.sample_size
                ));
                (self.config.default_kelly_fraction, true)
            }
            None => {
                notes.push("no trade statistics; default kelly fraction".to_string());
                (self.config.default_kelly_fraction, true)
            }
        }
    }

    /// Largest loss if the stop fills exactly: size x stop percentage.
    #[must_use]
    pub fn max_loss_usd(size_usd: Decimal, stop_loss_pct: f64) -> Decimal {
        size_usd * Decimal::from_f64(stop_loss_pct).unwrap_or(Decimal::ZERO)
    }
}
