//! Trade admission: the ordered gate sequence and its pipeline.

mod gates;
mod pipeline;
mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use pipeline::{TradeApprovalPipeline, composite_risk_score};
pub use types::{Evaluation, GateContext};
