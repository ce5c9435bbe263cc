//! Concurrency-safe portfolio state store.
//!
//! Readers take a cheap `Arc` snapshot; writers serialize through a
//! single mutex, clone the current snapshot, mutate the clone, recompute
//! derived values, and swap it in with a bumped version. A reader never
//! observes a half-applied write.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::{ErrorCode, RiskError};
use crate::models::{FillNotification, Position, PositionSide};

use super::state::PortfolioState;

/// Shared, versioned portfolio state.
pub struct PortfolioStateStore {
    state: RwLock<Arc<PortfolioState>>,
    write_lock: Mutex<()>,
}

impl PortfolioStateStore {
    /// Create a store holding only cash.
    #[must_use]
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            state: RwLock::new(Arc::new(PortfolioState::new(initial_cash))),
            write_lock: Mutex::new(()),
        }
    }

    /// Current snapshot. Cheap; clones an `Arc`.
    #[must_use]
    pub fn snapshot(&self) -> Arc<PortfolioState> {
        Arc::clone(&self.state.read())
    }

    /// Serialize a write: clone, mutate, recompute drawdown, bump version,
    /// swap. The mutation runs under the write mutex so concurrent writers
    /// never clone the same base snapshot.
    fn commit<F, T>(&self, mutate: F) -> Result<T, RiskError>
    where
        F: FnOnce(&mut PortfolioState) -> Result<T, RiskError>,
    {
        let _guard = self.write_lock.lock();
        let mut next = PortfolioState::clone(&self.snapshot());
        let out = mutate(&mut next)?;
        let value = next.total_value();
        next.drawdown.observe(value);
        next.version += 1;
        *self.state.write() = Arc::new(next);
        Ok(out)
    }

    /// Apply a write only if the caller's snapshot version still matches.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` when the state moved underneath the
    /// caller.
    pub fn apply_if_version<F, T>(&self, expected: u64, mutate: F) -> Result<T, RiskError>
    where
        F: FnOnce(&mut PortfolioState) -> Result<T, RiskError>,
    {
        self.commit(|state| {
            if state.version != expected {
                return Err(RiskError::conflict(expected, state.version));
            }
            mutate(state)
        })
    }

    /// Read-modify-write with one retry on version conflict.
    ///
    /// # Errors
    ///
    /// Surfaces `ConcurrencyConflict` when the retry also loses the race,
    /// or any error from the mutation itself.
    pub fn read_modify_write<F, T>(&self, mut mutate: F) -> Result<T, RiskError>
    where
        F: FnMut(&mut PortfolioState) -> Result<T, RiskError>,
    {
        let base = self.snapshot().version;
        match self.apply_if_version(base, &mut mutate) {
            Err(e) if e.code() == ErrorCode::ConcurrencyConflict => {
                let retry_base = self.snapshot().version;
                self.apply_if_version(retry_base, &mut mutate)
            }
            other => other,
        }
    }

    /// Apply an execution fill.
    ///
    /// Positive quantity opens or extends a position (averaging the entry
    /// price); negative quantity reduces it, booking realized PnL and
    /// moving the position to the closed list when quantity reaches zero.
    ///
    /// # Errors
    ///
    /// Rejects reductions against symbols with no open position and
    /// reductions larger than the open quantity.
    pub fn apply_fill(&self, fill: &FillNotification) -> Result<(), RiskError> {
        self.commit(|state| {
            if fill.quantity > Decimal::ZERO {
                Self::open_or_extend(state, fill);
            } else if fill.quantity < Decimal::ZERO {
                Self::reduce(state, fill)?;
            }
            Ok(())
        })?;
        debug!(
            symbol = %fill.symbol,
            quantity = %fill.quantity,
            price = %fill.price,
            "fill applied"
        );
        Ok(())
    }

    fn open_or_extend(state: &mut PortfolioState, fill: &FillNotification) {
        let notional = fill.quantity * fill.price;
        if let Some(pos) = state.positions.get_mut(&fill.symbol) {
            // Volume-weighted entry price across adds.
            let total_qty = pos.quantity + fill.quantity;
            pos.entry_price =
                (pos.entry_price * pos.quantity + fill.price * fill.quantity) / total_qty;
            pos.quantity = total_qty;
            pos.current_price = fill.price;
            match pos.side {
                PositionSide::Long => state.cash -= notional,
                PositionSide::Short => state.cash += notional,
            }
        } else {
            state.positions.insert(
                fill.symbol.clone(),
                Position {
                    symbol: fill.symbol.clone(),
                    side: fill.side,
                    quantity: fill.quantity,
                    entry_price: fill.price,
                    current_price: fill.price,
                    stop_loss_price: None,
                    unrealized_pnl: Decimal::ZERO,
                    realized_pnl: Decimal::ZERO,
                    strategy_id: fill.strategy_id.clone(),
                    asset_class: fill.asset_class,
                    sector: fill.sector.clone(),
                    opened_at: fill.filled_at,
                    closed_at: None,
                },
            );
            match fill.side {
                PositionSide::Long => state.cash -= notional,
                PositionSide::Short => state.cash += notional,
            }
        }
    }

    fn reduce(state: &mut PortfolioState, fill: &FillNotification) -> Result<(), RiskError> {
        let reduce_qty = -fill.quantity;
        let Some(pos) = state.positions.get_mut(&fill.symbol) else {
            return Err(RiskError::position_not_found(&fill.symbol));
        };
        if reduce_qty > pos.quantity {
            return Err(RiskError::validation(format!(
                "fill reduces {} by {} but only {} is open",
                fill.symbol, reduce_qty, pos.quantity
            )));
        }

        let pnl_per_unit = match pos.side {
            PositionSide::Long => fill.price - pos.entry_price,
            PositionSide::Short => pos.entry_price - fill.price,
        };
        let realized = pnl_per_unit * reduce_qty;
        pos.realized_pnl += realized;
        pos.quantity -= reduce_qty;
        pos.current_price = fill.price;
        match pos.side {
            PositionSide::Long => state.cash += reduce_qty * fill.price,
            PositionSide::Short => state.cash -= reduce_qty * fill.price,
        }

        if pos.quantity == Decimal::ZERO
            && let Some(mut closed) = state.positions.remove(&fill.symbol)
        {
            closed.closed_at = Some(fill.filled_at);
            closed.unrealized_pnl = Decimal::ZERO;
            state.closed_positions.push(closed);
        }
        Ok(())
    }

    /// Mark a symbol to a new price, updating unrealized PnL and drawdown.
    ///
    /// Marks on symbols without an open position are ignored.
    ///
    /// # Errors
    ///
    /// Only surfaces internal write errors; unknown symbols are not an
    /// error on this path.
    pub fn mark_price(&self, symbol: &str, price: Decimal) -> Result<(), RiskError> {
        self.commit(|state| {
            if let Some(pos) = state.positions.get_mut(symbol) {
                pos.mark(price);
            }
            Ok(())
        })
    }

    /// Set or tighten the stop on an open position.
    ///
    /// # Errors
    ///
    /// Returns `PositionNotFound` for unknown symbols.
    pub fn set_stop(&self, symbol: &str, stop_price: Decimal) -> Result<(), RiskError> {
        self.commit(|state| {
            let Some(pos) = state.positions.get_mut(symbol) else {
                return Err(RiskError::position_not_found(symbol));
            };
            pos.stop_loss_price = Some(stop_price);
            Ok(())
        })
    }

    /// Reduce an open position by `fraction` of its quantity at `price`.
    ///
    /// Returns the notional reduced.
    ///
    /// # Errors
    ///
    /// Returns `PositionNotFound` for unknown symbols and a validation
    /// error for fractions outside (0, 1].
    pub fn reduce_position(
        &self,
        symbol: &str,
        fraction: Decimal,
        price: Decimal,
    ) -> Result<Decimal, RiskError> {
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            return Err(RiskError::validation(format!(
                "reduction fraction {fraction} outside (0, 1]"
            )));
        }
        let snapshot = self.snapshot();
        let Some(pos) = snapshot.positions.get(symbol) else {
            return Err(RiskError::position_not_found(symbol));
        };
        let reduce_qty = pos.quantity * fraction;
        let fill = FillNotification {
            symbol: symbol.to_string(),
            side: pos.side,
            quantity: -reduce_qty,
            price,
            strategy_id: pos.strategy_id.clone(),
            asset_class: pos.asset_class,
            sector: pos.sector.clone(),
            filled_at: Utc::now(),
        };
        self.apply_fill(&fill)?;
        info!(symbol, fraction = %fraction, "position reduced");
        Ok(reduce_qty * price)
    }

    /// Close an open position fully at `price`.
    ///
    /// # Errors
    ///
    /// Returns `PositionNotFound` for unknown symbols.
    pub fn close_position(&self, symbol: &str, price: Decimal) -> Result<(), RiskError> {
        self.reduce_position(symbol, Decimal::ONE, price)?;
        info!(symbol, price = %price, "position closed");
        Ok(())
    }

    /// Withdraw capital, shrinking the drawdown peak by the same amount
    /// so the withdrawal does not register as a loss.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and withdrawals exceeding free cash.
    pub fn withdraw_capital(&self, amount: Decimal) -> Result<(), RiskError> {
        self.commit(|state| {
            if amount <= Decimal::ZERO {
                return Err(RiskError::validation("withdrawal amount must be positive"));
            }
            if amount > state.cash {
                return Err(RiskError::validation(format!(
                    "withdrawal {} exceeds free cash {}",
                    amount, state.cash
                )));
            }
            state.cash -= amount;
            state.drawdown.peak_portfolio_value =
                (state.drawdown.peak_portfolio_value - amount).max(state.total_value());
            Ok(())
        })?;
        warn!(amount = %amount, "capital withdrawn; drawdown peak rebased");
        Ok(())
    }

    /// Deposit capital.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts.
    pub fn deposit_capital(&self, amount: Decimal) -> Result<(), RiskError> {
        self.commit(|state| {
            if amount <= Decimal::ZERO {
                return Err(RiskError::validation("deposit amount must be positive"));
            }
            state.cash += amount;
            Ok(())
        })
    }
}

impl std::fmt::Debug for PortfolioStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("PortfolioStateStore")
            .field("version", &snap.version)
            .field("positions", &snap.positions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetClass;
    use rust_decimal_macros::dec;

    fn buy_fill(symbol: &str, qty: Decimal, price: Decimal) -> FillNotification {
        FillNotification {
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            quantity: qty,
            price,
            strategy_id: "momentum".to_string(),
            asset_class: AssetClass::Equity,
            sector: Some("tech".to_string()),
            filled_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_and_close_books_pnl() {
        let store = PortfolioStateStore::new(dec!(100000));
        store.apply_fill(&buy_fill("AAPL", dec!(100), dec!(50))).unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.cash, dec!(95000));
        assert_eq!(snap.total_value(), dec!(100000));
        assert_eq!(snap.version, 1);

        // Price rises, then full close at 60.
        store.mark_price("AAPL", dec!(60)).unwrap();
        assert_eq!(store.snapshot().total_value(), dec!(101000));

        store.close_position("AAPL", dec!(60)).unwrap();
        let snap = store.snapshot();
        assert!(snap.positions.is_empty());
        assert_eq!(snap.cash, dec!(101000));
        assert_eq!(snap.closed_positions[0].realized_pnl, dec!(1000));
    }

    #[test]
    fn test_extend_averages_entry_price() {
        let store = PortfolioStateStore::new(dec!(100000));
        store.apply_fill(&buy_fill("AAPL", dec!(100), dec!(50))).unwrap();
        store.apply_fill(&buy_fill("AAPL", dec!(100), dec!(60))).unwrap();

        let snap = store.snapshot();
        let pos = &snap.positions["AAPL"];
        assert_eq!(pos.quantity, dec!(200));
        assert_eq!(pos.entry_price, dec!(55));
    }

    #[test]
    fn test_short_position_value() {
        let store = PortfolioStateStore::new(dec!(100000));
        let mut fill = buy_fill("MSFT", dec!(50), dec!(100));
        fill.side = PositionSide::Short;
        store.apply_fill(&fill).unwrap();

        // Short proceeds land in cash; equity unchanged at entry.
        let snap = store.snapshot();
        assert_eq!(snap.cash, dec!(105000));
        assert_eq!(snap.total_value(), dec!(100000));

        // Price falls: short gains.
        store.mark_price("MSFT", dec!(90)).unwrap();
        assert_eq!(store.snapshot().total_value(), dec!(100500));
    }

    #[test]
    fn test_reduce_partial() {
        let store = PortfolioStateStore::new(dec!(100000));
        store.apply_fill(&buy_fill("AAPL", dec!(100), dec!(50))).unwrap();

        let notional = store
            .reduce_position("AAPL", dec!(0.5), dec!(52))
            .unwrap();
        assert_eq!(notional, dec!(2600));

        let snap = store.snapshot();
        assert_eq!(snap.positions["AAPL"].quantity, dec!(50));
        assert_eq!(snap.positions["AAPL"].realized_pnl, dec!(100));
    }

    #[test]
    fn test_over_reduce_rejected() {
        let store = PortfolioStateStore::new(dec!(100000));
        store.apply_fill(&buy_fill("AAPL", dec!(100), dec!(50))).unwrap();

        let mut fill = buy_fill("AAPL", dec!(-150), dec!(50));
        fill.quantity = dec!(-150);
        let err = store.apply_fill(&fill).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_reduce_unknown_symbol() {
        let store = PortfolioStateStore::new(dec!(100000));
        let err = store.close_position("TSLA", dec!(100)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PositionNotFound);
    }

    #[test]
    fn test_version_conflict() {
        let store = PortfolioStateStore::new(dec!(100000));
        let base = store.snapshot().version;
        store.deposit_capital(dec!(1)).unwrap();

        let err = store
            .apply_if_version(base, |_| Ok(()))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConcurrencyConflict);
    }

    #[test]
    fn test_read_modify_write_retries_once() {
        let store = PortfolioStateStore::new(dec!(100000));
        store
            .read_modify_write(|state| {
                state.cash += dec!(500);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.snapshot().cash, dec!(100500));
    }

    #[test]
    fn test_withdrawal_rebases_peak() {
        let store = PortfolioStateStore::new(dec!(100000));
        store.withdraw_capital(dec!(20000)).unwrap();

        let snap = store.snapshot();
        assert_eq!(snap.cash, dec!(80000));
        assert_eq!(snap.drawdown.peak_portfolio_value, dec!(80000));
        assert!(snap.drawdown.current_drawdown_pct < f64::EPSILON);
    }

    #[test]
    fn test_withdrawal_exceeding_cash_rejected() {
        let store = PortfolioStateStore::new(dec!(1000));
        let err = store.withdraw_capital(dec!(2000)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
