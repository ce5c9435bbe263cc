//! Portfolio state: the single source of truth for open positions,
//! portfolio value, peak value, and drawdown.

mod state;
mod store;

pub use state::{DrawdownState, PortfolioState};
pub use store::PortfolioStateStore;
