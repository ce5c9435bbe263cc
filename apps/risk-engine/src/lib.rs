// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Risk Engine - Portfolio Risk Admission Control
//!
//! Sits between strategy signals and order execution: every proposed
//! trade passes through an ordered gate sequence (circuit breaker,
//! leverage/VaR, regime, correlation, concentration, sector caps, and
//! goal-aware Kelly sizing) before it may reach a broker.
//!
//! # Components
//!
//! - [`portfolio`]: versioned portfolio state with drawdown tracking
//! - [`correlation`]: pairwise matrix, effective assets, clusters
//! - [`regime`]: volatility/trend regime classification
//! - [`stops`]: regime-keyed stop-loss table
//! - [`breaker`]: drawdown circuit breaker with the LEVEL_3 latch
//! - [`sizing`]: goal-aware half-Kelly position sizing
//! - [`approval`]: the seven-gate admission pipeline
//! - [`adjustment`]: periodic stop-tighten/reduce/close loop
//! - [`service`]: the operation surface collaborators call

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Background position adjustment.
pub mod adjustment;

/// Trade admission pipeline and gates.
pub mod approval;

/// Drawdown circuit breaker.
pub mod breaker;

/// Typed configuration with env interpolation.
pub mod config;

/// Correlation risk assessment.
pub mod correlation;

/// Structured errors.
pub mod error;

/// Domain records: positions, fills, goals, approvals.
pub mod models;

/// Structured logging setup.
pub mod observability;

/// Portfolio state store.
pub mod portfolio;

/// Driven ports for market data.
pub mod ports;

/// Market regime classification.
pub mod regime;

/// The engine facade.
pub mod service;

/// Position sizing.
pub mod sizing;

/// Regime-keyed stop calculation.
pub mod stops;

pub use breaker::CircuitBreakerLevel;
pub use error::{ErrorCode, RiskError};
pub use models::{ApprovalResult, TradeRequest};
pub use regime::RiskRegime;
pub use service::RiskEngineService;
