//! Gate 1: circuit breaker.
//!
//! LEVEL_2 and LEVEL_3 block all new positions outright. Lower levels
//! pass but apply the breaker's size multiplier.

use crate::breaker::CircuitBreakerLevel;

use super::super::types::{Evaluation, GateContext};

const GATE: &str = "circuit_breaker";

/// Reject above LEVEL_1; otherwise apply the level's multiplier.
pub fn check(ctx: &GateContext<'_>, eval: &mut Evaluation) {
    let status = ctx.breaker;
    if !status.level.allows_new_positions() {
        eval.reject(format!(
            "circuit breaker at {} (drawdown {:.2}%); new positions blocked",
            status.level, status.drawdown_pct
        ));
        return;
    }
    if status.level > CircuitBreakerLevel::None {
        eval.adjust(
            GATE,
            status.size_multiplier,
            format!(
                "breaker {} at {:.2}% drawdown",
                status.level, status.drawdown_pct
            ),
        );
    }
}
