//! Kelly criterion from trailing trade statistics.

use serde::{Deserialize, Serialize};

/// Trailing trade statistics for one strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeStats {
    /// Fraction of winning trades, in [0, 1].
    pub win_rate: f64,
    /// Average winning trade PnL, positive.
    pub avg_win: f64,
    /// Average losing trade PnL magnitude, positive.
    pub avg_loss: f64,
    /// Number of trades behind the statistics.
    pub sample_size: usize,
}

/// Kelly fraction `clip((wr * aw - (1 - wr) * al) / aw, 0, 1)`.
///
/// Returns `None` when `avg_win` is non-positive; the formula is
/// undefined there and the caller falls back to its default fraction.
#[must_use]
pub fn kelly_fraction(stats: &TradeStats) -> Option<f64> {
    if stats.avg_win <= 0.0 {
        return None;
    }
    let edge = stats.win_rate.mul_add(stats.avg_win, -((1.0 - stats.win_rate) * stats.avg_loss));
    Some((edge / stats.avg_win).clamp(0.0, 1.0))
}
