//! Position lifecycle types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    /// Long exposure: profits when price rises.
    Long,
    /// Short exposure: profits when price falls.
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Broad asset classification for exposure caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    /// Listed equities and ETFs.
    Equity,
    /// Crypto spot and perps.
    Crypto,
    /// Currency pairs.
    Forex,
    /// Commodity futures.
    Commodity,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equity => write!(f, "EQUITY"),
            Self::Crypto => write!(f, "CRYPTO"),
            Self::Forex => write!(f, "FOREX"),
            Self::Commodity => write!(f, "COMMODITY"),
        }
    }
}

/// An open (or historically closed) position.
///
/// Created on fill notification, marked on price ticks, closed when
/// quantity reaches zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol.
    pub symbol: String,
    /// Long or short.
    pub side: PositionSide,
    /// Open quantity; strictly positive while the position is open.
    pub quantity: Decimal,
    /// Volume-weighted entry price.
    pub entry_price: Decimal,
    /// Last marked price.
    pub current_price: Decimal,
    /// Protective stop, if one has been placed.
    pub stop_loss_price: Option<Decimal>,
    /// Unrealized PnL at the last mark.
    pub unrealized_pnl: Decimal,
    /// PnL realized through partial or full exits.
    pub realized_pnl: Decimal,
    /// Strategy that owns this position.
    pub strategy_id: String,
    /// Asset class for exposure caps.
    pub asset_class: AssetClass,
    /// Sector label, when the instrument has one.
    pub sector: Option<String>,
    /// When the position was opened.
    pub opened_at: DateTime<Utc>,
    /// When the position was fully closed; `None` while open.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Whether the position is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Market value at the current mark.
    #[must_use]
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// Re-mark the position at a new price, refreshing unrealized PnL.
    pub fn mark(&mut self, price: Decimal) {
        self.current_price = price;
        let per_unit = match self.side {
            PositionSide::Long => price - self.entry_price,
            PositionSide::Short => self.entry_price - price,
        };
        self.unrealized_pnl = per_unit * self.quantity;
    }

    /// Signed exposure: positive for longs, negative for shorts.
    #[must_use]
    pub fn signed_exposure(&self) -> Decimal {
        match self.side {
            PositionSide::Long => self.market_value(),
            PositionSide::Short => -self.market_value(),
        }
    }

    /// Whether the last mark has crossed through the protective stop.
    #[must_use]
    pub fn stop_breached(&self) -> bool {
        match (self.stop_loss_price, self.side) {
            (Some(stop), PositionSide::Long) => self.current_price <= stop,
            (Some(stop), PositionSide::Short) => self.current_price >= stop,
            (None, _) => false,
        }
    }
}

/// Fill confirmation from the execution layer.
///
/// Buys on an existing position average into the entry price; sells reduce
/// quantity and realize PnL. A fill that takes quantity to zero closes the
/// position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillNotification {
    /// Instrument symbol.
    pub symbol: String,
    /// Side of the resulting position.
    pub side: PositionSide,
    /// Filled quantity; positive opens/adds, negative reduces.
    pub quantity: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Strategy that placed the order.
    pub strategy_id: String,
    /// Asset class of the instrument.
    pub asset_class: AssetClass,
    /// Sector label, when known.
    pub sector: Option<String>,
    /// Exchange timestamp of the fill.
    pub filled_at: DateTime<Utc>,
}
