//! Portfolio-level correlation risk assessment with a cached matrix.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CorrelationConfig;
use crate::error::RiskError;
use crate::ports::MarketDataPort;

use super::matrix::CorrelationMatrix;

/// One complete correlation assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationAssessment {
    /// Mean off-diagonal pairwise correlation.
    pub avg_correlation: f64,
    /// Number of statistically independent bets the portfolio behaves as:
    /// `n / (1 + (n-1) * avg_correlation)`.
    pub effective_assets: f64,
    /// `effective_assets / n`, in (0, 1]. Higher is better diversified.
    pub diversification_ratio: f64,
    /// Monotone 0-100 score; rises with average correlation, falls with
    /// effective asset count.
    pub correlation_risk_score: f64,
    /// Connected components where `|rho|` exceeds the cluster threshold.
    pub clusters: Vec<Vec<String>>,
    /// True when at least one pair lacked enough samples.
    pub reduced_confidence: bool,
    /// Human-readable observations for callers.
    pub recommendations: Vec<String>,
    /// When the underlying matrix was computed.
    pub as_of: DateTime<Utc>,
}

impl CorrelationAssessment {
    /// Assessment for an empty or single-asset portfolio.
    #[must_use]
    pub fn trivial(n: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n_f = n as f64;
        Self {
            avg_correlation: 0.0,
            effective_assets: n_f,
            diversification_ratio: 1.0,
            correlation_risk_score: 0.0,
            clusters: Vec::new(),
            reduced_confidence: false,
            recommendations: Vec::new(),
            as_of: Utc::now(),
        }
    }
}

/// Assesses portfolio correlation risk.
///
/// The matrix is refreshed on a background cadence, not per approval;
/// readers always see the last completed assessment. This is eventually
/// consistent by design: approvals tolerate a matrix up to one refresh
/// interval old.
pub struct CorrelationRiskAssessor {
    config: CorrelationConfig,
    market_data: Arc<dyn MarketDataPort>,
    cached: RwLock<(Arc<CorrelationMatrix>, Arc<CorrelationAssessment>)>,
}

impl CorrelationRiskAssessor {
    /// New assessor with an empty cached matrix.
    #[must_use]
    pub fn new(config: CorrelationConfig, market_data: Arc<dyn MarketDataPort>) -> Self {
        Self {
            config,
            market_data,
            cached: RwLock::new((
                Arc::new(CorrelationMatrix::default()),
                Arc::new(CorrelationAssessment::trivial(0)),
            )),
        }
    }

    /// Recompute the matrix for the given symbols and publish it.
    ///
    /// Symbols without a return window simply contribute no pairs; the
    /// matrix carries reduced confidence instead.
    ///
    /// # Errors
    ///
    /// Returns `DATA_UNAVAILABLE` when a multi-symbol set has no return
    /// history at all: a trivial assessment would tell the gates the
    /// book is uncorrelated, so the previous one stays published.
    pub fn refresh(&self, symbols: &[String]) -> Result<(), RiskError> {
        let mut windows: HashMap<String, Vec<f64>> = HashMap::new();
        for symbol in symbols {
            if let Some(window) = self.market_data.return_window(symbol) {
                windows.insert(symbol.clone(), window);
            }
        }
        if symbols.len() >= 2 && windows.is_empty() {
            return Err(RiskError::data_unavailable(
                &symbols.join(","),
                "no return history for any portfolio symbol",
            ));
        }
        let missing = symbols.len() - windows.len();

        let matrix = CorrelationMatrix::compute(&windows, self.config.min_samples);
        let mut assessment = self.assess_matrix(&matrix, symbols.len());
        if missing > 0 {
            assessment.reduced_confidence = true;
            assessment
                .recommendations
                .push(format!("{missing} symbol(s) lack return history"));
        }

        info!(
            symbols = symbols.len(),
            avg_correlation = assessment.avg_correlation,
            risk_score = assessment.correlation_risk_score,
            "correlation matrix refreshed"
        );
        *self.cached.write() = (Arc::new(matrix), Arc::new(assessment));
        Ok(())
    }

    /// Last completed assessment.
    #[must_use]
    pub fn current(&self) -> Arc<CorrelationAssessment> {
        Arc::clone(&self.cached.read().1)
    }

    /// Last completed matrix.
    #[must_use]
    pub fn matrix(&self) -> Arc<CorrelationMatrix> {
        Arc::clone(&self.cached.read().0)
    }

    /// Mean absolute correlation of `symbol` against the cached matrix;
    /// `None` when the symbol has no computed pair.
    #[must_use]
    pub fn marginal_correlation(&self, symbol: &str) -> Option<f64> {
        self.matrix().avg_correlation_with(symbol)
    }

    /// One-off analysis of an arbitrary symbol set, bypassing the cache.
    #[must_use]
    pub fn analyze(&self, symbols: &[String]) -> CorrelationAssessment {
        let mut windows: HashMap<String, Vec<f64>> = HashMap::new();
        for symbol in symbols {
            if let Some(window) = self.market_data.return_window(symbol) {
                windows.insert(symbol.clone(), window);
            }
        }
        let matrix = CorrelationMatrix::compute(&windows, self.config.min_samples);
        debug!(symbols = symbols.len(), "ad-hoc correlation analysis");
        self.assess_matrix(&matrix, symbols.len())
    }

    fn assess_matrix(&self, matrix: &CorrelationMatrix, n: usize) -> CorrelationAssessment {
        if n < 2 {
            return CorrelationAssessment::trivial(n);
        }
        #[allow(clippy::cast_precision_loss)]
        let n_f = n as f64;

        let avg_correlation = matrix.avg_correlation();
        let denom = (n_f - 1.0).mul_add(avg_correlation, 1.0);
        // Strongly negative average correlation can push the denominator
        // toward zero; the portfolio cannot behave as more than n bets.
        let effective_assets = if denom <= 0.0 {
            n_f
        } else {
            (n_f / denom).min(n_f)
        };
        let diversification_ratio = effective_assets / n_f;

        let correlation_risk_score = (avg_correlation.max(0.0) * 70.0
            + (1.0 - diversification_ratio) * 30.0)
            .clamp(0.0, 100.0);

        let clusters = matrix.clusters(self.config.cluster_threshold);
        let mut recommendations = Vec::new();
        recommendations.push(format!(
            "portfolio of {n} assets behaves as {effective_assets:.1} independent bets"
        ));
        if avg_correlation > self.config.soft_gate_threshold {
            recommendations.push(format!(
                "average correlation {avg_correlation:.2} is elevated; prefer uncorrelated entries"
            ));
        }
        for cluster in &clusters {
            recommendations.push(format!(
                "correlated cluster: {}; treat as a single position for exposure purposes",
                cluster.join(", ")
            ));
        }

        CorrelationAssessment {
            avg_correlation,
            effective_assets,
            diversification_ratio,
            correlation_risk_score,
            clusters,
            reduced_confidence: matrix.reduced_confidence(),
            recommendations,
            as_of: Utc::now(),
        }
    }
}

impl std::fmt::Debug for CorrelationRiskAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRiskAssessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
