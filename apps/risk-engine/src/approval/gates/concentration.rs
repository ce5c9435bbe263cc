//! Gate 5: concentration caps.
//!
//! Single-position and per-strategy allocation caps. A request over a
//! cap with headroom left is scaled into the headroom; a cap already
//! full is a hard rejection.

use super::super::types::{Evaluation, GateContext};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const GATE: &str = "concentration";

/// Enforce single-position and strategy caps.
pub fn check(
    ctx: &GateContext<'_>,
    symbol: &str,
    strategy_id: &str,
    eval: &mut Evaluation,
) {
    apply_cap(
        ctx,
        eval,
        ctx.limits.max_single_position_pct,
        ctx.state.symbol_exposure(symbol),
        &format!("position {symbol}"),
    );
    if eval.rejected() {
        return;
    }
    apply_cap(
        ctx,
        eval,
        ctx.limits.max_strategy_allocation_pct,
        ctx.state.strategy_exposure(strategy_id),
        &format!("strategy {strategy_id}"),
    );
}

/// Scale `eval.current_size` into the headroom under `cap_pct`, or
/// reject when none remains.
pub(super) fn apply_cap(
    ctx: &GateContext<'_>,
    eval: &mut Evaluation,
    cap_pct: f64,
    existing: Decimal,
    what: &str,
) {
    let headroom = ctx.headroom(cap_pct, existing);
    if eval.current_size <= headroom {
        return;
    }
    if headroom <= Decimal::ZERO {
        eval.reject(format!(
            "{what} already at its {cap_pct:.1}% cap ({:.2}% of portfolio)",
            ctx.pct_of_portfolio(existing)
        ));
        return;
    }
    let factor = (headroom / eval.current_size).to_f64().unwrap_or(0.0);
    eval.adjust(
        GATE,
        factor,
        format!("{what} scaled into {cap_pct:.1}% cap headroom"),
    );
    // The f64 factor round-trip can land a hair above the headroom;
    // the cap is hard, so clamp the exact Decimal.
    eval.current_size = eval.current_size.min(headroom);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::testutil::context_fixture;
    use crate::models::AssetClass;
    use rust_decimal_macros::dec;

    #[test]
    fn test_within_caps_passes() {
        let fx = context_fixture();
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, "AAPL", "momentum", &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(10000));
    }

    #[test]
    fn test_single_position_scaled_into_headroom() {
        let mut fx = context_fixture();
        // AAPL already 15% of a 100k portfolio; 20% cap leaves 5k.
        fx.with_position("AAPL", "momentum", AssetClass::Equity, Some("tech"), dec!(15000));
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, "AAPL", "momentum", &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(5000));
    }

    #[test]
    fn test_scaled_size_lands_exactly_on_headroom() {
        let mut fx = context_fixture();
        fx.with_position("AAPL", "momentum", AssetClass::Equity, Some("tech"), dec!(15000));
        let ctx = fx.context();
        // 5000/18000 is not representable in f64; the admitted size must
        // still not exceed the headroom.
        let mut eval = Evaluation::new(dec!(18000));
        check(&ctx, "AAPL", "momentum", &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(5000));
    }

    #[test]
    fn test_full_position_cap_rejects() {
        let mut fx = context_fixture();
        fx.with_position("AAPL", "momentum", AssetClass::Equity, Some("tech"), dec!(20000));
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(5000));
        check(&ctx, "AAPL", "momentum", &mut eval);
        assert!(eval.rejected());
        assert!(eval.rejections[0].contains("AAPL"));
    }

    #[test]
    fn test_strategy_cap_across_symbols() {
        let mut fx = context_fixture();
        fx.with_position("AAPL", "momentum", AssetClass::Equity, Some("tech"), dec!(19000));
        fx.with_position("MSFT", "momentum", AssetClass::Equity, Some("tech"), dec!(19000));
        let ctx = fx.context();
        // Strategy at 38% against a 40% cap; request scaled to 2k.
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, "NVDA", "momentum", &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(2000));
    }
}
