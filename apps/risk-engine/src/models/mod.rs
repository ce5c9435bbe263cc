//! Shared data model for the risk engine.
//!
//! These types cross module boundaries: positions and fills feed the
//! portfolio store, trade requests enter the approval pipeline, and
//! `ApprovalResult` is the single record every admission decision produces.

mod approval;
mod goal;
mod position;

pub use approval::{
    ApprovalMetadata, ApprovalResult, SizeFactor, TradeRequest, TradeSide,
};
pub use goal::{FinancialGoal, GoalProgress};
pub use position::{AssetClass, FillNotification, Position, PositionSide};
