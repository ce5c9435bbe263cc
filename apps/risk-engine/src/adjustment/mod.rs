//! Background position adjustment: stop tightening, forced reduction,
//! and emergency close.

mod engine;

pub use engine::{AdjustmentReport, PeriodicAdjustmentEngine, StopAdjustment};
