//! Immutable portfolio snapshot and derived exposure metrics.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::{AssetClass, Position};

/// Drawdown bookkeeping.
///
/// `peak_portfolio_value` is monotone non-decreasing except on explicit
/// capital withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawdownState {
    /// Highest portfolio value observed.
    pub peak_portfolio_value: Decimal,
    /// Current portfolio value.
    pub current_portfolio_value: Decimal,
    /// `max(0, (peak - current) / peak)` as a percentage.
    pub current_drawdown_pct: f64,
}

impl DrawdownState {
    /// Fresh state at an initial portfolio value.
    #[must_use]
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            peak_portfolio_value: initial_value,
            current_portfolio_value: initial_value,
            current_drawdown_pct: 0.0,
        }
    }

    /// Recompute after a portfolio value change.
    pub fn observe(&mut self, value: Decimal) {
        self.current_portfolio_value = value;
        if value > self.peak_portfolio_value {
            self.peak_portfolio_value = value;
        }
        self.current_drawdown_pct = if self.peak_portfolio_value > Decimal::ZERO {
            let dd = (self.peak_portfolio_value - value) / self.peak_portfolio_value;
            (dd.to_f64().unwrap_or(0.0) * 100.0).max(0.0)
        } else {
            0.0
        };
    }
}

/// One consistent view of the portfolio.
///
/// Snapshots are immutable once published; every committed write produces
/// a new snapshot with a higher `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Monotone write counter.
    pub version: u64,
    /// Free cash.
    pub cash: Decimal,
    /// Open positions by symbol.
    pub positions: HashMap<String, Position>,
    /// Positions fully closed during this session.
    pub closed_positions: Vec<Position>,
    /// Drawdown bookkeeping.
    pub drawdown: DrawdownState,
}

impl PortfolioState {
    /// New state holding only cash.
    #[must_use]
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            version: 0,
            cash: initial_cash,
            positions: HashMap::new(),
            closed_positions: Vec::new(),
            drawdown: DrawdownState::new(initial_cash),
        }
    }

    /// Portfolio equity: cash plus signed exposure of open positions.
    #[must_use]
    pub fn total_value(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(Position::signed_exposure)
                .sum::<Decimal>()
    }

    /// Gross exposure: sum of absolute market values.
    #[must_use]
    pub fn gross_exposure(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Gross leverage ratio; zero when the portfolio has no value.
    #[must_use]
    pub fn leverage(&self) -> f64 {
        let value = self.total_value();
        if value <= Decimal::ZERO {
            return 0.0;
        }
        (self.gross_exposure() / value).to_f64().unwrap_or(0.0)
    }

    /// Cash as a percentage of portfolio value.
    #[must_use]
    pub fn cash_reserve_pct(&self) -> f64 {
        let value = self.total_value();
        if value <= Decimal::ZERO {
            return 0.0;
        }
        (self.cash / value).to_f64().unwrap_or(0.0) * 100.0
    }

    /// Open exposure for one symbol.
    #[must_use]
    pub fn symbol_exposure(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map_or(Decimal::ZERO, Position::market_value)
    }

    /// Open exposure aggregated per strategy.
    #[must_use]
    pub fn strategy_exposure(&self, strategy_id: &str) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.strategy_id == strategy_id)
            .map(Position::market_value)
            .sum()
    }

    /// Open exposure aggregated per asset class.
    #[must_use]
    pub fn asset_class_exposure(&self, class: AssetClass) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.asset_class == class)
            .map(Position::market_value)
            .sum()
    }

    /// Open exposure aggregated per sector.
    #[must_use]
    pub fn sector_exposure(&self, sector: &str) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.sector.as_deref() == Some(sector))
            .map(Position::market_value)
            .sum()
    }

    /// Exposure of a notional amount as a percentage of portfolio value.
    #[must_use]
    pub fn exposure_pct(&self, notional: Decimal) -> f64 {
        let value = self.total_value();
        if value <= Decimal::ZERO {
            return 0.0;
        }
        (notional / value).to_f64().unwrap_or(0.0) * 100.0
    }

    /// Symbols with open positions.
    #[must_use]
    pub fn open_symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }
}
