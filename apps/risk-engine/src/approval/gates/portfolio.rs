//! Gate 2: portfolio-level leverage, VaR, and cash reserve.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::super::types::{Evaluation, GateContext};

/// One-sided 95% z-score for the parametric VaR estimate.
const VAR_Z_95: f64 = 1.65;

/// Reject when the post-trade portfolio would breach leverage, 1-day
/// VaR, or the minimum cash reserve.
pub fn check(ctx: &GateContext<'_>, eval: &mut Evaluation) {
    let value = ctx.portfolio_value;
    if value <= Decimal::ZERO {
        eval.reject("portfolio value is non-positive; no new risk".to_string());
        return;
    }

    let post_gross = ctx.state.gross_exposure() + eval.current_size;
    let post_leverage = (post_gross / value).to_f64().unwrap_or(f64::MAX);
    if post_leverage > ctx.limits.max_leverage {
        eval.reject(format!(
            "post-trade leverage {post_leverage:.2}x exceeds limit {:.2}x",
            ctx.limits.max_leverage
        ));
        return;
    }

    let var_pct = estimate_var_1d_pct(ctx.daily_volatility, post_leverage);
    if var_pct > ctx.limits.max_var_1d_pct {
        eval.reject(format!(
            "post-trade 1-day VaR {var_pct:.2}% exceeds limit {:.2}%",
            ctx.limits.max_var_1d_pct
        ));
        return;
    }

    let post_cash = ctx.state.cash - eval.current_size;
    let post_cash_pct = (post_cash / value).to_f64().unwrap_or(0.0) * 100.0;
    if post_cash_pct < ctx.limits.min_cash_reserve_pct {
        eval.reject(format!(
            "post-trade cash reserve {post_cash_pct:.2}% below minimum {:.2}%",
            ctx.limits.min_cash_reserve_pct
        ));
    }
}

/// Parametric 1-day VaR as a percentage of portfolio value: z-score
/// times daily volatility, scaled by gross leverage.
#[must_use]
pub fn estimate_var_1d_pct(daily_volatility: f64, gross_leverage: f64) -> f64 {
    VAR_Z_95 * daily_volatility * gross_leverage * 100.0
}
