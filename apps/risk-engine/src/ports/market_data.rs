//! Market Data Port (Driven Port)
//!
//! Interface for the prices, volatilities, and return histories the
//! engine consumes. Implementations must answer from a local cache;
//! the approval critical path never waits on the network.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest per-symbol market observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketObservation {
    /// Last traded or marked price.
    pub price: Decimal,
    /// Trailing realized volatility (annualized fraction).
    pub realized_vol: f64,
    /// When the observation was taken.
    pub as_of: DateTime<Utc>,
}

impl MarketObservation {
    /// Whether the observation is older than `ttl_secs` at `now`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        now - self.as_of > Duration::seconds(ttl_secs as i64)
    }
}

/// Benchmark-level history used by the regime classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketHistory {
    /// Trailing realized-volatility series, oldest first.
    pub vol_history: Vec<f64>,
    /// Trailing period returns, oldest first.
    pub returns: Vec<f64>,
    /// When the history was last refreshed.
    pub as_of: DateTime<Utc>,
}

/// Port for cached market data reads.
pub trait MarketDataPort: Send + Sync {
    /// Latest observation for a symbol, if any.
    fn observation(&self, symbol: &str) -> Option<MarketObservation>;

    /// Trailing return window for a symbol, oldest first.
    fn return_window(&self, symbol: &str) -> Option<Vec<f64>>;

    /// Benchmark volatility and return history for regime classification.
    fn market_history(&self) -> Option<MarketHistory>;
}

/// In-memory market data store.
///
/// Production deployments feed it from the market-data collaborator's
/// push stream; tests populate it directly for deterministic runs.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    observations: RwLock<HashMap<String, MarketObservation>>,
    return_windows: RwLock<HashMap<String, Vec<f64>>>,
    history: RwLock<Option<MarketHistory>>,
}

impl InMemoryMarketData {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the observation for a symbol.
    pub fn set_observation(&self, symbol: &str, price: Decimal, realized_vol: f64) {
        self.set_observation_at(symbol, price, realized_vol, Utc::now());
    }

    /// Insert an observation with an explicit timestamp (testing staleness).
    pub fn set_observation_at(
        &self,
        symbol: &str,
        price: Decimal,
        realized_vol: f64,
        as_of: DateTime<Utc>,
    ) {
        self.observations.write().insert(
            symbol.to_string(),
            MarketObservation {
                price,
                realized_vol,
                as_of,
            },
        );
    }

    /// Replace the return window for a symbol.
    pub fn set_return_window(&self, symbol: &str, returns: Vec<f64>) {
        self.return_windows
            .write()
            .insert(symbol.to_string(), returns);
    }

    /// Replace the benchmark history.
    pub fn set_market_history(&self, vol_history: Vec<f64>, returns: Vec<f64>) {
        *self.history.write() = Some(MarketHistory {
            vol_history,
            returns,
            as_of: Utc::now(),
        });
    }
}

impl MarketDataPort for InMemoryMarketData {
    fn observation(&self, symbol: &str) -> Option<MarketObservation> {
        self.observations.read().get(symbol).cloned()
    }

    fn return_window(&self, symbol: &str) -> Option<Vec<f64>> {
        self.return_windows.read().get(symbol).cloned()
    }

    fn market_history(&self) -> Option<MarketHistory> {
        self.history.read().clone()
    }
}
