//! Financial goal inputs for goal-aware sizing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A financial target supplied by the goal-tracking collaborator.
///
/// Consumed, never mutated, by the position sizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialGoal {
    /// Metric being targeted (e.g. "portfolio_return_pct").
    pub target_metric: String,
    /// Target value for the metric over the window.
    pub target_value: f64,
    /// Start of the goal window.
    pub window_start: DateTime<Utc>,
    /// End of the goal window.
    pub window_end: DateTime<Utc>,
    /// Current progress toward the target, in the metric's units.
    pub current_progress: f64,
}

impl FinancialGoal {
    /// Fraction of the goal window that has elapsed at `now`, in [0,1].
    #[must_use]
    pub fn elapsed_time_fraction(&self, now: DateTime<Utc>) -> f64 {
        let total = (self.window_end - self.window_start).num_seconds();
        if total <= 0 {
            return 1.0;
        }
        let elapsed = (now - self.window_start).num_seconds();
        (elapsed as f64 / total as f64).clamp(0.0, 1.0)
    }

    /// Fraction of the target already achieved, in [0,1].
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        if self.target_value.abs() < f64::EPSILON {
            return 1.0;
        }
        (self.current_progress / self.target_value).clamp(0.0, 1.0)
    }

    /// Snapshot of goal pacing for the sizer.
    #[must_use]
    pub fn progress_at(&self, now: DateTime<Utc>) -> GoalProgress {
        GoalProgress {
            elapsed_time_fraction: self.elapsed_time_fraction(now),
            progress_fraction: self.progress_fraction(),
        }
    }
}

/// Goal pacing snapshot consumed by the position sizer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoalProgress {
    /// Fraction of the goal window elapsed, in [0,1].
    pub elapsed_time_fraction: f64,
    /// Fraction of the target achieved, in [0,1].
    pub progress_fraction: f64,
}

impl GoalProgress {
    /// Pacing gap: positive when behind schedule, negative when ahead.
    #[must_use]
    pub fn gap(&self) -> f64 {
        self.elapsed_time_fraction - self.progress_fraction
    }
}
