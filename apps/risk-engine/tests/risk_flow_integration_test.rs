//! Risk Engine Integration Tests
//!
//! End-to-end tests that drive the full service surface: trade requests
//! flowing through the gate pipeline, drawdown pushing the circuit
//! breaker through its levels, the emergency-close sweep, and the
//! operator reset flow.
//!
//! Scenarios covered:
//! - Calm-market approval with a stop price and full metadata
//! - Admitted size never exceeding the requested size
//! - LEVEL_1 drawdown halving admitted sizes without blocking entries
//! - LEVEL_3 latch: rejection, close-all sweep, hysteresis-gated reset
//! - Stale-input degradation to the conservative regime
//! - Tightened limits shrinking subsequent admissions
//! - Correlated books collapsing to few effective assets

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use risk_engine::CircuitBreakerLevel;
use risk_engine::config::{PortfolioLimitsUpdate, RiskConfig};
use risk_engine::models::{
    AssetClass, FillNotification, PositionSide, TradeRequest, TradeSide,
};
use risk_engine::ports::{InMemoryMarketData, MarketDataPort};
use risk_engine::service::RiskEngineService;

/// Service over a calm benchmark: a gentle volatility ramp with the
/// current reading far from the extreme tail, and a mildly positive
/// trend.
fn calm_service() -> (Arc<RiskEngineService>, Arc<InMemoryMarketData>) {
    let market_data = Arc::new(InMemoryMarketData::new());
    let mut vols: Vec<f64> = (1..=100).map(|i| 0.001 * f64::from(i)).collect();
    vols.push(0.05);
    market_data.set_market_history(vols, vec![0.01, 0.005, 0.02]);

    let service = Arc::new(RiskEngineService::new(
        RiskConfig::default(),
        dec!(100000),
        market_data.clone() as Arc<dyn MarketDataPort>,
    ));
    (service, market_data)
}

fn request(symbol: &str, size: Decimal, price: Decimal) -> TradeRequest {
    TradeRequest {
        request_id: String::new(),
        symbol: symbol.to_string(),
        strategy_id: "momentum".to_string(),
        side: TradeSide::Buy,
        signal_strength: 0.8,
        requested_size_usd: size,
        current_price: price,
        volatility: Some(0.20),
        asset_class: AssetClass::Equity,
        sector: Some("semis".to_string()),
    }
}

fn long_fill(symbol: &str, qty: Decimal, price: Decimal) -> FillNotification {
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

// ============================================
// Calm-market approval flow
// ============================================

#[tokio::test]
async fn test_calm_market_approval_carries_stop_and_metadata() {
    let (service, _) = calm_service();

    let result = service
        .approve_trade(request("NVDA", dec!(5000), dec!(100)))
        .await
        .unwrap();

    assert!(result.approved, "rejections: {:?}", result.rejections);
    assert!(!result.request_id.is_empty(), "request id is filled in");
    assert!(result.adjusted_size_usd > Decimal::ZERO);
    assert!(result.adjusted_size_usd <= dec!(5000));
    assert!(result.rejections.is_empty());

    // A long entry gets a stop strictly below the entry price.
    let stop = result.stop_loss_price.expect("approved longs carry a stop");
    assert!(stop < dec!(100));
    assert!(stop > Decimal::ZERO);

    assert_eq!(
        result.metadata.circuit_breaker_level,
        CircuitBreakerLevel::None
    );
    assert!(!result.metadata.degraded);
    assert!((0.0..=100.0).contains(&result.risk_score));
}

#[tokio::test]
async fn test_adjusted_size_never_exceeds_requested() {
    let (service, _) = calm_service();

    for size in [dec!(500), dec!(5000), dec!(25000), dec!(250000)] {
        let result = service
            .approve_trade(request("NVDA", size, dec!(100)))
            .await
            .unwrap();
        assert!(
            result.adjusted_size_usd <= size,
            "admitted {} for requested {size}",
            result.adjusted_size_usd
        );
        if !result.approved {
            assert_eq!(result.adjusted_size_usd, Decimal::ZERO);
            assert!(!result.rejections.is_empty());
        }
    }
}

#[tokio::test]
async fn test_malformed_request_is_an_error_not_a_rejection() {
    let (service, _) = calm_service();

    let mut bad = request("NVDA", dec!(5000), dec!(100));
    bad.signal_strength = 1.5;
    let err = service.approve_trade(bad).await.unwrap_err();
    assert_eq!(err.code(), risk_engine::ErrorCode::ValidationError);

    let mut bad = request("NVDA", dec!(-10), dec!(100));
    bad.signal_strength = 0.5;
    assert!(service.approve_trade(bad).await.is_err());
}

// ============================================
// Drawdown and the circuit breaker
// ============================================

#[tokio::test]
async fn test_level1_drawdown_halves_admissions_without_blocking() {
    let (service, market_data) = calm_service();

    // 50k long, then mark down until the portfolio sits 12% off peak.
    service
        .record_fill(&long_fill("AAPL", dec!(1000), dec!(50)))
        .unwrap();
    service.record_price("AAPL", dec!(38)).unwrap();
    market_data.set_observation("AAPL", dec!(38), 0.20);

    let status = service.risk_status();
    assert_eq!(status.circuit_breaker.level, CircuitBreakerLevel::Level1);
    assert!((status.portfolio.drawdown_pct - 12.0).abs() < 1e-9);

    // A different strategy, so the drawn-down book's 40% strategy cap
    // does not interfere with what this test measures.
    let mut req = request("NVDA", dec!(4000), dec!(100));
    req.strategy_id = "breakout".to_string();
    let result = service.approve_trade(req).await.unwrap();
    assert!(result.approved, "rejections: {:?}", result.rejections);

    let breaker_factor = result
        .metadata
        .size_factors
        .iter()
        .find(|f| f.gate.contains("circuit"))
        .expect("breaker multiplier is recorded");
    assert!((breaker_factor.factor - 0.5).abs() < 1e-9);
    assert!(result.adjusted_size_usd <= dec!(2000));
}

#[tokio::test]
async fn test_level3_latch_close_all_and_reset_flow() {
    let (service, market_data) = calm_service();

    service
        .record_fill(&long_fill("AAPL", dec!(600), dec!(50)))
        .unwrap();
    service
        .record_fill(&long_fill("MSFT", dec!(100), dec!(200)))
        .unwrap();
    market_data.set_observation("MSFT", dec!(200), 0.20);

    // Crash AAPL: portfolio 100k -> 75k, a 25% drawdown.
    service.record_price("AAPL", dec!(8.33)).unwrap();
    market_data.set_observation("AAPL", dec!(8.33), 0.90);
    let status = service.risk_status();
    assert_eq!(status.circuit_breaker.level, CircuitBreakerLevel::Level3);
    assert!(status.circuit_breaker.latched);

    // New entries are refused outright.
    let result = service
        .approve_trade(request("NVDA", dec!(1000), dec!(100)))
        .await
        .unwrap();
    assert!(!result.approved);
    assert_eq!(result.adjusted_size_usd, Decimal::ZERO);
    assert_eq!(
        result.metadata.circuit_breaker_level,
        CircuitBreakerLevel::Level3
    );

    // The sweep emergency-closes every open position.
    let report = service.force_adjustment_check().unwrap();
    let mut closed = report.positions_closed.clone();
    closed.sort();
    assert_eq!(closed, vec!["AAPL".to_string(), "MSFT".to_string()]);
    assert_eq!(service.risk_status().active_position_count, 0);

    // The latch survives the flat book: still refused below the bar.
    assert!(service.acknowledge_breaker_reset().is_err());

    // Recover equity well past the hysteresis bar, then reset.
    let snapshot = service.store().snapshot();
    let shortfall = snapshot.drawdown.peak_portfolio_value * dec!(0.92)
        - snapshot.total_value();
    service.deposit_capital(shortfall + dec!(1)).unwrap();
    service.acknowledge_breaker_reset().unwrap();

    let status = service.risk_status();
    assert!(!status.circuit_breaker.latched);
    assert_ne!(status.circuit_breaker.level, CircuitBreakerLevel::Level3);

    // Trading resumes.
    let result = service
        .approve_trade(request("NVDA", dec!(1000), dec!(100)))
        .await
        .unwrap();
    assert!(result.approved, "rejections: {:?}", result.rejections);
}

// ============================================
// Degradation
// ============================================

#[tokio::test]
async fn test_missing_history_degrades_to_conservative_regime() {
    // No market history installed at all.
    let market_data = Arc::new(InMemoryMarketData::new());
    let service = RiskEngineService::new(
        RiskConfig::default(),
        dec!(100000),
        market_data as Arc<dyn MarketDataPort>,
    );

    let result = service
        .approve_trade(request("NVDA", dec!(5000), dec!(100)))
        .await
        .unwrap();

    assert!(result.metadata.degraded);
    assert_eq!(
        result.metadata.regime,
        risk_engine::RiskRegime::HighVolBearish
    );
    assert!(!result.warnings.is_empty());
    // The conservative regime still admits, at a reduced size.
    if result.approved {
        assert!(result.adjusted_size_usd < dec!(5000));
    }
}

// ============================================
// Limits reloads
// ============================================

#[tokio::test]
async fn test_tightened_limits_shrink_subsequent_admissions() {
    let (service, _) = calm_service();

    let before = service
        .approve_trade(request("NVDA", dec!(18000), dec!(100)))
        .await
        .unwrap();
    assert!(before.approved, "rejections: {:?}", before.rejections);

    service
        .update_limits(&PortfolioLimitsUpdate {
            max_single_position_pct: Some(5.0),
            ..Default::default()
        })
        .unwrap();

    let after = service
        .approve_trade(request("NVDA", dec!(18000), dec!(100)))
        .await
        .unwrap();
    assert!(after.adjusted_size_usd < before.adjusted_size_usd);
    assert!(after.adjusted_size_usd <= dec!(5000));
}

// ============================================
// Correlation
// ============================================

#[tokio::test]
async fn test_correlated_book_collapses_to_one_effective_asset() {
    let (service, market_data) = calm_service();

    // Three symbols moving in lockstep.
    let base: Vec<f64> = (0..120)
        .map(|i| 0.01 * f64::from(i % 7) - 0.02)
        .collect();
    market_data.set_return_window("AAA", base.clone());
    market_data.set_return_window("BBB", base.iter().map(|r| r * 2.0).collect());
    market_data.set_return_window("CCC", base.iter().map(|r| r * 0.5).collect());

    let symbols = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
    let assessment = service.correlation_analysis(&symbols);

    assert!((assessment.avg_correlation - 1.0).abs() < 1e-6);
    assert!((assessment.effective_assets - 1.0).abs() < 1e-6);
    assert!(assessment.correlation_risk_score > 60.0);

    // One cluster containing the whole book.
    assert_eq!(assessment.clusters.len(), 1);
    assert_eq!(assessment.clusters[0].len(), 3);
}

#[tokio::test]
async fn test_refresh_tracks_open_book() {
    let (service, market_data) = calm_service();
    let window: Vec<f64> = (0..120).map(|i| 0.001 * f64::from(i % 11)).collect();
    market_data.set_return_window("AAPL", window.clone());
    market_data.set_return_window("MSFT", window);
    market_data.set_observation("AAPL", dec!(50), 0.20);
    market_data.set_observation("MSFT", dec!(200), 0.20);

    service
        .record_fill(&long_fill("AAPL", dec!(100), dec!(50)))
        .unwrap();
    service
        .record_fill(&long_fill("MSFT", dec!(25), dec!(200)))
        .unwrap();
    service.refresh_correlations().unwrap();

    let status = service.risk_status();
    assert!(status.correlation.avg_correlation > 0.9);
    assert!(status.correlation.effective_assets < 1.1);
}
