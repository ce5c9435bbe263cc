//! Regime classifier.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RegimeConfig;
use crate::ports::MarketHistory;

use super::{RiskRegime, percentile_rank};

/// Volatility tier from percentile rank plus absolute ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityTier {
    /// At or below the low-vol percentile.
    Low,
    /// Between the low- and high-vol percentiles. Ordinary volatility;
    /// maps to the same calm regime rows as LOW.
    Mid,
    /// Above the high-vol percentile.
    High,
    /// Above the extreme percentile, or above the absolute ceiling.
    Extreme,
}

/// Trend direction from cumulative trailing return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    /// Cumulative return above the threshold.
    Bullish,
    /// Cumulative return below the negative threshold.
    Bearish,
    /// Within the threshold band. Treated like bullish when mapping to
    /// a regime: a flat market is not a risk-off signal.
    Neutral,
}

/// Classifier output with the inputs that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeAssessment {
    /// The classified regime.
    pub regime: RiskRegime,
    /// Volatility tier behind the regime.
    pub volatility_tier: VolatilityTier,
    /// Trend direction behind the regime.
    pub trend: TrendDirection,
    /// Percentile rank of current volatility in its history.
    pub vol_percentile: f64,
    /// Current benchmark volatility.
    pub current_vol: f64,
    /// Cumulative trailing return used for the trend.
    pub cumulative_return: f64,
    /// True when history was too short or missing and a conservative
    /// default was substituted.
    pub degraded: bool,
}

/// Classifies market regimes from benchmark history.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    /// New classifier with the given tuning.
    #[must_use]
    pub const fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Classify from benchmark history, with the current cross-asset
    /// average correlation for crisis detection.
    ///
    /// Missing or too-short history degrades to a conservative
    /// HIGH_VOL_BEARISH assessment rather than failing: admission
    /// control must keep answering when the data feed hiccups.
    #[must_use]
    pub fn classify(&self, history: Option<&MarketHistory>, avg_correlation: f64) -> RegimeAssessment {
        let Some(history) = history else {
            warn!("benchmark history missing; degrading to conservative regime");
            return Self::degraded_assessment();
        };
        if history.vol_history.len() < self.config.min_vol_history {
            warn!(
                have = history.vol_history.len(),
                need = self.config.min_vol_history,
                "volatility history too short; degrading to conservative regime"
            );
            return Self::degraded_assessment();
        }

        let current_vol = history.vol_history.last().copied().unwrap_or(0.0);
        let vol_percentile = percentile_rank(&history.vol_history, current_vol);
        let tier = self.volatility_tier(current_vol, vol_percentile);

        let cumulative_return = history.returns.iter().sum::<f64>();
        let trend = self.trend_direction(cumulative_return);

        let regime = self.combine(tier, trend, avg_correlation);
        debug!(
            regime = %regime,
            vol_percentile,
            cumulative_return,
            avg_correlation,
            "regime classified"
        );

        RegimeAssessment {
            regime,
            volatility_tier: tier,
            trend,
            vol_percentile,
            current_vol,
            cumulative_return,
            degraded: false,
        }
    }

    fn volatility_tier(&self, current_vol: f64, vol_percentile: f64) -> VolatilityTier {
        if current_vol > self.config.absolute_vol_ceiling
            || vol_percentile > self.config.extreme_vol_percentile
        {
            VolatilityTier::Extreme
        } else if vol_percentile > self.config.high_vol_percentile {
            VolatilityTier::High
        } else if vol_percentile > self.config.low_vol_percentile {
            VolatilityTier::Mid
        } else {
            VolatilityTier::Low
        }
    }

    fn trend_direction(&self, cumulative_return: f64) -> TrendDirection {
        if cumulative_return > self.config.trend_threshold {
            TrendDirection::Bullish
        } else if cumulative_return < -self.config.trend_threshold {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        }
    }

    fn combine(
        &self,
        tier: VolatilityTier,
        trend: TrendDirection,
        avg_correlation: f64,
    ) -> RiskRegime {
        match (tier, trend) {
            (VolatilityTier::Extreme, TrendDirection::Bearish)
                if avg_correlation >= self.config.correlation_breakdown_threshold =>
            {
                RiskRegime::Crisis
            }
            (VolatilityTier::Extreme, _) => RiskRegime::ExtremeVolatility,
            (VolatilityTier::High, TrendDirection::Bearish) => RiskRegime::HighVolBearish,
            (VolatilityTier::High, _) => RiskRegime::HighVolBullish,
            (VolatilityTier::Low | VolatilityTier::Mid, TrendDirection::Bearish) => {
                RiskRegime::LowVolBearish
            }
            (VolatilityTier::Low | VolatilityTier::Mid, _) => RiskRegime::LowVolBullish,
        }
    }

    /// Conservative assessment substituted when inputs are unusable.
    fn degraded_assessment() -> RegimeAssessment {
        RegimeAssessment {
            regime: RiskRegime::HighVolBearish,
            volatility_tier: VolatilityTier::High,
            trend: TrendDirection::Bearish,
            vol_percentile: 100.0,
            current_vol: 0.0,
            cumulative_return: 0.0,
            degraded: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use test_case::test_case;

    fn history(vols: Vec<f64>, returns: Vec<f64>) -> MarketHistory {
        MarketHistory {
            vol_history: vols,
            returns,
            as_of: Utc::now(),
        }
    }

    fn classifier() -> RegimeClassifier {
        RegimeClassifier::new(RegimeConfig::default())
    }

    /// Ramp of 100 vols ending at `last`; percentile of `last` controls
    /// the tier.
    fn ramp_ending(last: f64) -> Vec<f64> {
        let mut vols: Vec<f64> = (1..100).map(|i| 0.001 * f64::from(i)).collect();
        vols.push(last);
        vols
    }

    #[test]
    fn test_low_vol_bullish() {
        let h = history(ramp_ending(0.01), vec![0.01, 0.02]);
        let a = classifier().classify(Some(&h), 0.3);
        assert_eq!(a.regime, RiskRegime::LowVolBullish);
        assert!(!a.degraded);
    }

    #[test]
    fn test_mid_band_maps_to_calm_regime() {
        // Percentile around 50: MID tier, calm regime row.
        let h = history(ramp_ending(0.05), vec![-0.05]);
        let a = classifier().classify(Some(&h), 0.3);
        assert_eq!(a.volatility_tier, VolatilityTier::Mid);
        assert_eq!(a.regime, RiskRegime::LowVolBearish);
    }

    #[test]
    fn test_low_vol_cut_point_comes_from_config() {
        let h = history(ramp_ending(0.05), vec![-0.05]);
        // Same history, raised low-vol percentile: the ~49th-percentile
        // reading now counts as LOW.
        let config = RegimeConfig {
            low_vol_percentile: 60.0,
            ..Default::default()
        };
        let a = RegimeClassifier::new(config).classify(Some(&h), 0.3);
        assert_eq!(a.volatility_tier, VolatilityTier::Low);
        assert_eq!(a.regime, RiskRegime::LowVolBearish);
    }

    #[test]
    fn test_neutral_trend_maps_to_bullish_row() {
        // Rank 85: HIGH tier but not extreme.
        let h = history(ramp_ending(0.0855), vec![0.001]);
        let a = classifier().classify(Some(&h), 0.3);
        assert_eq!(a.trend, TrendDirection::Neutral);
        assert_eq!(a.regime, RiskRegime::HighVolBullish);
    }

    #[test]
    fn test_extreme_percentile() {
        let h = history(ramp_ending(0.5), vec![0.05]);
        let a = classifier().classify(Some(&h), 0.3);
        assert_eq!(a.regime, RiskRegime::ExtremeVolatility);
    }

    #[test]
    fn test_absolute_ceiling_forces_extreme() {
        // Last vol above the 1.0 ceiling even though its rank is low
        // within an even wilder history.
        let mut vols = vec![5.0; 99];
        vols.push(1.5);
        let h = history(vols, vec![0.05]);
        let a = classifier().classify(Some(&h), 0.3);
        assert_eq!(a.volatility_tier, VolatilityTier::Extreme);
    }

    #[test_case(0.9, RiskRegime::Crisis; "breakdown escalates")]
    #[test_case(0.5, RiskRegime::ExtremeVolatility; "no breakdown stays extreme")]
    fn test_crisis_requires_correlation_breakdown(avg_corr: f64, expected: RiskRegime) {
        let h = history(ramp_ending(0.5), vec![-0.10]);
        let a = classifier().classify(Some(&h), avg_corr);
        assert_eq!(a.regime, expected);
    }

    #[test]
    fn test_missing_history_degrades() {
        let a = classifier().classify(None, 0.0);
        assert_eq!(a.regime, RiskRegime::HighVolBearish);
        assert!(a.degraded);
    }

    #[test]
    fn test_short_history_degrades() {
        let h = history(vec![0.1; 5], vec![0.01]);
        let a = classifier().classify(Some(&h), 0.0);
        assert!(a.degraded);
    }
}
