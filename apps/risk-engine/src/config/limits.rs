//! Portfolio limits: the immutable config snapshot every gate reads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::models::AssetClass;

/// Hard portfolio limits.
///
/// Loaded once, swapped whole on reload. All percentage fields are
/// validated into [0,100]; `max_leverage` is a ratio and is validated
/// separately into (0,10].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLimits {
    /// Maximum gross leverage as a ratio of portfolio value.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: f64,
    /// Maximum 1-day VaR as a percentage of portfolio value.
    #[serde(default = "default_max_var_1d_pct")]
    pub max_var_1d_pct: f64,
    /// Maximum tolerated drawdown percentage before hard intervention.
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,
    /// Minimum cash reserve percentage.
    #[serde(default = "default_min_cash_reserve_pct")]
    pub min_cash_reserve_pct: f64,
    /// Maximum single-position percentage of portfolio value.
    #[serde(default = "default_max_single_position_pct")]
    pub max_single_position_pct: f64,
    /// Maximum correlated-cluster exposure percentage.
    #[serde(default = "default_max_correlated_exposure_pct")]
    pub max_correlated_exposure_pct: f64,
    /// Maximum sector exposure percentage.
    #[serde(default = "default_max_sector_exposure_pct")]
    pub max_sector_exposure_pct: f64,
    /// Per-asset-class exposure caps, percentage of portfolio value.
    #[serde(default = "default_asset_class_caps")]
    pub asset_class_caps_pct: HashMap<AssetClass, f64>,
    /// Maximum allocation percentage per strategy.
    #[serde(default = "default_max_strategy_allocation_pct")]
    pub max_strategy_allocation_pct: f64,
    /// Size reduction factor applied in high-volatility regimes.
    #[serde(default = "default_high_vol_size_factor")]
    pub high_vol_size_factor: f64,
    /// Size reduction factor applied in extreme-volatility regimes.
    #[serde(default = "default_extreme_vol_size_factor")]
    pub extreme_vol_size_factor: f64,
}

impl Default for PortfolioLimits {
    fn default() -> Self {
        Self {
            max_leverage: default_max_leverage(),
            max_var_1d_pct: default_max_var_1d_pct(),
            max_drawdown_pct: default_max_drawdown_pct(),
            min_cash_reserve_pct: default_min_cash_reserve_pct(),
            max_single_position_pct: default_max_single_position_pct(),
            max_correlated_exposure_pct: default_max_correlated_exposure_pct(),
            max_sector_exposure_pct: default_max_sector_exposure_pct(),
            asset_class_caps_pct: default_asset_class_caps(),
            max_strategy_allocation_pct: default_max_strategy_allocation_pct(),
            high_vol_size_factor: default_high_vol_size_factor(),
            extreme_vol_size_factor: default_extreme_vol_size_factor(),
        }
    }
}

const fn default_max_leverage() -> f64 {
    2.0
}

const fn default_max_var_1d_pct() -> f64 {
    5.0
}

const fn default_max_drawdown_pct() -> f64 {
    20.0
}

const fn default_min_cash_reserve_pct() -> f64 {
    10.0
}

const fn default_max_single_position_pct() -> f64 {
    20.0
}

const fn default_max_correlated_exposure_pct() -> f64 {
    40.0
}

const fn default_max_sector_exposure_pct() -> f64 {
    30.0
}

fn default_asset_class_caps() -> HashMap<AssetClass, f64> {
    HashMap::from([
        (AssetClass::Equity, 80.0),
        (AssetClass::Crypto, 30.0),
        (AssetClass::Forex, 50.0),
        (AssetClass::Commodity, 40.0),
    ])
}

const fn default_max_strategy_allocation_pct() -> f64 {
    40.0
}

const fn default_high_vol_size_factor() -> f64 {
    0.7
}

const fn default_extreme_vol_size_factor() -> f64 {
    0.4
}

impl PortfolioLimits {
    /// Validate all fields into their legal ranges.
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` naming the offending field; the caller
    /// must keep its previous snapshot on failure.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.max_leverage <= 0.0 || self.max_leverage > 10.0 {
            return Err(RiskError::validation(format!(
                "max_leverage must be in (0,10], got {}",
                self.max_leverage
            )));
        }

        let percent_fields = [
            ("max_var_1d_pct", self.max_var_1d_pct),
            ("max_drawdown_pct", self.max_drawdown_pct),
            ("min_cash_reserve_pct", self.min_cash_reserve_pct),
            ("max_single_position_pct", self.max_single_position_pct),
            (
                "max_correlated_exposure_pct",
                self.max_correlated_exposure_pct,
            ),
            ("max_sector_exposure_pct", self.max_sector_exposure_pct),
            (
                "max_strategy_allocation_pct",
                self.max_strategy_allocation_pct,
            ),
        ];

        for (name, value) in percent_fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(RiskError::validation(format!(
                    "{name} must be in [0,100], got {value}"
                )));
            }
        }

        for (class, value) in &self.asset_class_caps_pct {
            if !(0.0..=100.0).contains(value) {
                return Err(RiskError::validation(format!(
                    "asset class cap for {class} must be in [0,100], got {value}"
                )));
            }
        }

        for (name, value) in [
            ("high_vol_size_factor", self.high_vol_size_factor),
            ("extreme_vol_size_factor", self.extreme_vol_size_factor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiskError::validation(format!(
                    "{name} must be in [0,1], got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Build a new validated snapshot with the partial update applied.
    ///
    /// All-or-nothing: any invalid field leaves the current snapshot
    /// untouched and returns the validation error.
    ///
    /// # Errors
    ///
    /// Returns the validation error for the first out-of-range field.
    pub fn with_update(&self, update: &PortfolioLimitsUpdate) -> Result<Self, RiskError> {
        let mut next = self.clone();

        if let Some(v) = update.max_leverage {
            next.max_leverage = v;
        }
        if let Some(v) = update.max_var_1d_pct {
            next.max_var_1d_pct = v;
        }
        if let Some(v) = update.max_drawdown_pct {
            next.max_drawdown_pct = v;
        }
        if let Some(v) = update.min_cash_reserve_pct {
            next.min_cash_reserve_pct = v;
        }
        if let Some(v) = update.max_single_position_pct {
            next.max_single_position_pct = v;
        }
        if let Some(v) = update.max_correlated_exposure_pct {
            next.max_correlated_exposure_pct = v;
        }
        if let Some(v) = update.max_sector_exposure_pct {
            next.max_sector_exposure_pct = v;
        }
        if let Some(v) = &update.asset_class_caps_pct {
            next.asset_class_caps_pct = v.clone();
        }
        if let Some(v) = update.max_strategy_allocation_pct {
            next.max_strategy_allocation_pct = v;
        }
        if let Some(v) = update.high_vol_size_factor {
            next.high_vol_size_factor = v;
        }
        if let Some(v) = update.extreme_vol_size_factor {
            next.extreme_vol_size_factor = v;
        }

        next.validate()?;
        Ok(next)
    }
}

/// Partial limits update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioLimitsUpdate {
    /// New maximum leverage ratio.
    pub max_leverage: Option<f64>,
    /// New maximum 1-day VaR percentage.
    pub max_var_1d_pct: Option<f64>,
    /// New maximum drawdown percentage.
    pub max_drawdown_pct: Option<f64>,
    /// New minimum cash reserve percentage.
    pub min_cash_reserve_pct: Option<f64>,
    /// New maximum single-position percentage.
    pub max_single_position_pct: Option<f64>,
    /// New maximum correlated exposure percentage.
    pub max_correlated_exposure_pct: Option<f64>,
    /// New maximum sector exposure percentage.
    pub max_sector_exposure_pct: Option<f64>,
    /// Replacement asset-class caps.
    pub asset_class_caps_pct: Option<HashMap<AssetClass, f64>>,
    /// New maximum per-strategy allocation percentage.
    pub max_strategy_allocation_pct: Option<f64>,
    /// New high-volatility size factor.
    pub high_vol_size_factor: Option<f64>,
    /// New extreme-volatility size factor.
    pub extreme_vol_size_factor: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PortfolioLimits::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_percentage_rejected() {
        let limits = PortfolioLimits {
            max_single_position_pct: 130.0,
            ..Default::default()
        };
        let err = limits.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(err.message().contains("max_single_position_pct"));
    }

    #[test]
    fn test_partial_update_applies() {
        let limits = PortfolioLimits::default();
        let update = PortfolioLimitsUpdate {
            max_single_position_pct: Some(15.0),
            ..Default::default()
        };
        let next = limits.with_update(&update).unwrap();
        assert!((next.max_single_position_pct - 15.0).abs() < f64::EPSILON);
        // Untouched field retained.
        assert!((next.max_drawdown_pct - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_update_leaves_original_untouched() {
        let limits = PortfolioLimits::default();
        let update = PortfolioLimitsUpdate {
            max_var_1d_pct: Some(-3.0),
            ..Default::default()
        };
        assert!(limits.with_update(&update).is_err());
        // The original snapshot is untouched by a failed update.
        assert!((limits.max_var_1d_pct - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_leverage_validated_as_ratio() {
        let limits = PortfolioLimits {
            max_leverage: 12.0,
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }
}
