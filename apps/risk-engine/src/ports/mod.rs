//! Driven ports: interfaces the engine consumes from collaborators.
//!
//! Market data ingestion and storage live outside this engine; the
//! pipeline and adjustment loop only ever read the collaborator's latest
//! cached values through [`MarketDataPort`]. The in-memory implementation
//! doubles as the deterministic test fixture.

mod market_data;

pub use market_data::{
    InMemoryMarketData, MarketDataPort, MarketHistory, MarketObservation,
};
