//! Correlation assessment configuration.

use serde::{Deserialize, Serialize};

/// Tuning for the correlation risk assessor and its approval gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Minimum overlapping samples for a pair to enter the matrix.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// |rho| above which two symbols share a cluster edge.
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f64,
    /// Average correlation above which the gate halves the size.
    #[serde(default = "default_soft_gate_threshold")]
    pub soft_gate_threshold: f64,
    /// Average correlation above which the gate hard-rejects.
    #[serde(default = "default_hard_gate_threshold")]
    pub hard_gate_threshold: f64,
    /// Size factor applied between the soft and hard thresholds.
    #[serde(default = "default_soft_gate_factor")]
    pub soft_gate_factor: f64,
    /// Background refresh cadence, seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            cluster_threshold: default_cluster_threshold(),
            soft_gate_threshold: default_soft_gate_threshold(),
            hard_gate_threshold: default_hard_gate_threshold(),
            soft_gate_factor: default_soft_gate_factor(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

const fn default_min_samples() -> usize {
    100
}

const fn default_cluster_threshold() -> f64 {
    0.7
}

const fn default_soft_gate_threshold() -> f64 {
    0.6
}

const fn default_hard_gate_threshold() -> f64 {
    0.8
}

const fn default_soft_gate_factor() -> f64 {
    0.5
}

const fn default_refresh_interval_secs() -> u64 {
    3600
}
