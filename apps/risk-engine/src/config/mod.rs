//! Configuration module for the risk engine.
//!
//! Provides typed configuration loading with environment variable
//! interpolation. Limits reload via [`PortfolioLimits::with_update`]
//! always produces a fresh validated snapshot that is swapped whole —
//! readers never observe a half-updated config.
//!
//! # Usage
//!
//! ```rust,ignore
//! use risk_engine::config::{RiskConfig, load_config};
//!
//! let config = load_config(Some("risk.yaml"))?;
//! println!("base risk: {}%", config.sizing.base_risk_pct);
//! ```

mod adjustment;
mod correlation;
mod limits;
mod regime;
mod sizing;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use adjustment::AdjustmentConfig;
pub use correlation::CorrelationConfig;
pub use limits::{PortfolioLimits, PortfolioLimitsUpdate};
pub use regime::RegimeConfig;
pub use sizing::SizingConfig;

/// Shared handle to the active limits snapshot. Reload builds a new
/// validated [`PortfolioLimits`] and swaps the inner `Arc` whole, so
/// readers never observe a half-updated set of limits.
pub type SharedLimits =
    std::sync::Arc<parking_lot::RwLock<std::sync::Arc<PortfolioLimits>>>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Hard portfolio limits.
    #[serde(default)]
    pub limits: PortfolioLimits,
    /// Regime classifier tuning.
    #[serde(default)]
    pub regime: RegimeConfig,
    /// Correlation assessor tuning.
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Position sizer tuning.
    #[serde(default)]
    pub sizing: SizingConfig,
    /// Adjustment loop and input freshness tuning.
    #[serde(default)]
    pub adjustment: AdjustmentConfig,
}

/// Load configuration from a YAML file with environment variable
/// interpolation.
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or
/// validated.
pub fn load_config(path: Option<&str>) -> Result<RiskConfig, ConfigError> {
    let path = path.unwrap_or("risk.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<RiskConfig, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: RiskConfig = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let mut result = input.to_string();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    for cap in re.captures_iter(input) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let full_match = full_match.as_str();
        let var_name = var_match.as_str();
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match, &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &RiskConfig) -> Result<(), ConfigError> {
    config
        .limits
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    let r = &config.regime;
    if r.low_vol_percentile >= r.high_vol_percentile
        || r.high_vol_percentile >= r.extreme_vol_percentile
    {
        return Err(ConfigError::ValidationError(
            "regime percentile cut-points must be strictly increasing".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&r.correlation_breakdown_threshold) {
        return Err(ConfigError::ValidationError(
            "regime.correlation_breakdown_threshold must be in [0,1]".to_string(),
        ));
    }

    let c = &config.correlation;
    if c.soft_gate_threshold >= c.hard_gate_threshold {
        return Err(ConfigError::ValidationError(
            "correlation.soft_gate_threshold must be below hard_gate_threshold".to_string(),
        ));
    }
    if c.min_samples == 0 {
        return Err(ConfigError::ValidationError(
            "correlation.min_samples must be positive".to_string(),
        ));
    }

    let s = &config.sizing;
    if s.base_risk_pct <= 0.0 || s.base_risk_pct > 10.0 {
        return Err(ConfigError::ValidationError(
            "sizing.base_risk_pct must be in (0,10]".to_string(),
        ));
    }
    if s.min_allocation_pct >= s.max_allocation_pct {
        return Err(ConfigError::ValidationError(
            "sizing.min_allocation_pct must be below max_allocation_pct".to_string(),
        ));
    }
    if s.default_stop_loss_pct <= 0.0 || s.default_stop_loss_pct >= 1.0 {
        return Err(ConfigError::ValidationError(
            "sizing.default_stop_loss_pct must be in (0,1)".to_string(),
        ));
    }

    if config.adjustment.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "adjustment.interval_secs must be positive".to_string(),
        ));
    }

    Ok(())
}
