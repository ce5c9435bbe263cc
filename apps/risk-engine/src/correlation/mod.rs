//! Correlation risk: pairwise matrix, effective-asset math, clusters.

mod assessor;
mod matrix;

pub use assessor::{CorrelationAssessment, CorrelationRiskAssessor};
pub use matrix::{CorrelationMatrix, pearson};
