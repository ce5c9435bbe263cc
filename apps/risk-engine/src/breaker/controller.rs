//! Circuit breaker controller with the Level-3 latch.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ErrorCode, RiskError};

use super::{CircuitBreakerLevel, LEVEL_3_THRESHOLD_PCT, RESET_HYSTERESIS_PCT};

/// Current breaker status for callers and the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Effective level after applying the latch.
    pub level: CircuitBreakerLevel,
    /// Drawdown at the last evaluation.
    pub drawdown_pct: f64,
    /// Size multiplier at the effective level.
    pub size_multiplier: f64,
    /// Recommended operator actions.
    pub actions: Vec<String>,
    /// True while Level 3 is latched awaiting acknowledgement.
    pub latched: bool,
}

/// Tracks the latch state over the otherwise pure drawdown-to-level map.
///
/// Levels below LEVEL_3 follow drawdown both ways automatically. Once
/// LEVEL_3 trips, the controller reports LEVEL_3 until an operator calls
/// [`acknowledge_reset`](Self::acknowledge_reset) *and* drawdown has
/// recovered past the hysteresis margin.
#[derive(Debug, Default)]
pub struct CircuitBreakerController {
    latched: Mutex<bool>,
}

impl CircuitBreakerController {
    /// New, unlatched controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the breaker at the given drawdown.
    ///
    /// Trips the latch when the pure mapping reaches LEVEL_3.
    pub fn evaluate(&self, drawdown_pct: f64) -> BreakerStatus {
        let mapped = CircuitBreakerLevel::from_drawdown(drawdown_pct);
        let mut latched = self.latched.lock();
        if mapped == CircuitBreakerLevel::Level3 && !*latched {
            *latched = true;
            error!(
                drawdown_pct,
                "circuit breaker tripped to LEVEL_3; trading halted until explicit reset"
            );
        }
        let level = if *latched {
            CircuitBreakerLevel::Level3
        } else {
            mapped
        };
        BreakerStatus {
            level,
            drawdown_pct,
            size_multiplier: level.size_multiplier(),
            actions: level.actions().into_iter().map(String::from).collect(),
            latched: *latched,
        }
    }

    /// Whether LEVEL_3 is currently latched.
    #[must_use]
    pub fn is_latched(&self) -> bool {
        *self.latched.lock()
    }

    /// Operator acknowledgement to release the Level-3 latch.
    ///
    /// # Errors
    ///
    /// Refuses when the breaker is not latched, or when drawdown has not
    /// recovered at least [`RESET_HYSTERESIS_PCT`] points below the
    /// Level-3 threshold.
    pub fn acknowledge_reset(&self, current_drawdown_pct: f64) -> Result<(), RiskError> {
        let mut latched = self.latched.lock();
        if !*latched {
            return Err(RiskError::new(
                ErrorCode::ResetRefused,
                "circuit breaker is not latched",
            ));
        }
        let rearm_below = LEVEL_3_THRESHOLD_PCT - RESET_HYSTERESIS_PCT;
        if current_drawdown_pct > rearm_below {
            warn!(
                current_drawdown_pct,
                rearm_below, "breaker reset refused; drawdown above hysteresis margin"
            );
            return Err(RiskError::new(
                ErrorCode::ResetRefused,
                format!(
                    "drawdown {current_drawdown_pct:.2}% must recover below {rearm_below:.2}% before reset"
                ),
            )
            .with_context("drawdown_pct", format!("{current_drawdown_pct:.2}"))
            .with_context("rearm_below_pct", format!("{rearm_below:.2}")));
        }
        *latched = false;
        info!(current_drawdown_pct, "circuit breaker reset acknowledged");
        Ok(())
    }
}
