//! Position sizing: goal-aware risk scaling plus half-Kelly.

mod kelly;
mod sizer;

pub use kelly::{TradeStats, kelly_fraction};
pub use sizer::{PositionSizer, SizeRecommendation};
