//! Gate 4: correlation.
//!
//! Uses the last completed matrix. A symbol strongly correlated with the
//! existing book gets its size halved above the soft threshold and a
//! hard rejection above the hard ceiling; cluster exposure is capped the
//! same way a single position would be.

use crate::config::CorrelationConfig;

use super::super::types::{Evaluation, GateContext};

const GATE: &str = "correlation";

/// Apply the soft factor or hard-reject on marginal correlation, then
/// enforce the correlated-cluster exposure cap.
pub fn check(ctx: &GateContext<'_>, config: &CorrelationConfig, eval: &mut Evaluation) {
    match ctx.marginal_correlation {
        Some(rho) if rho > config.hard_gate_threshold => {
            eval.reject(format!(
                "correlation {rho:.2} with existing book above hard ceiling {:.2}",
                config.hard_gate_threshold
            ));
            return;
        }
        Some(rho) if rho > config.soft_gate_threshold => {
            eval.adjust(
                GATE,
                config.soft_gate_factor,
                format!(
                    "correlation {rho:.2} above soft threshold {:.2}",
                    config.soft_gate_threshold
                ),
            );
        }
        Some(_) => {}
        None => {
            // New symbol with no computed pairs: admit, but flag it.
            eval.warn(
                "no correlation history for symbol; treating as uncorrelated".to_string(),
            );
        }
    }

    if ctx.correlation.reduced_confidence {
        eval.warn("correlation matrix has reduced confidence".to_string());
    }

    let projected_cluster_pct =
        ctx.cluster_exposure_pct + ctx.pct_of_portfolio(eval.current_size);
    if projected_cluster_pct > ctx.limits.max_correlated_exposure_pct {
        let existing = ctx.cluster_exposure_pct;
        let headroom_pct = (ctx.limits.max_correlated_exposure_pct - existing).max(0.0);
        let current_pct = ctx.pct_of_portfolio(eval.current_size);
        if headroom_pct <= 0.0 || current_pct <= 0.0 {
            eval.reject(format!(
                "correlated cluster already at {existing:.2}% of limit {:.2}%",
                ctx.limits.max_correlated_exposure_pct
            ));
        } else {
            let factor = headroom_pct / current_pct;
            eval.adjust(
                GATE,
                factor,
                format!(
                    "cluster exposure capped at {:.2}% (currently {existing:.2}%)",
                    ctx.limits.max_correlated_exposure_pct
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::testutil::context_fixture;
    use rust_decimal_macros::dec;

    fn config() -> CorrelationConfig {
        CorrelationConfig::default()
    }

    #[test]
    fn test_uncorrelated_passes() {
        let mut fx = context_fixture();
        fx.marginal_correlation = Some(0.2);
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(!eval.rejected());
        assert!(eval.size_factors.is_empty());
    }

    #[test]
    fn test_soft_threshold_halves() {
        let mut fx = context_fixture();
        fx.marginal_correlation = Some(0.7);
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(5000));
    }

    #[test]
    fn test_hard_ceiling_rejects() {
        let mut fx = context_fixture();
        fx.marginal_correlation = Some(0.85);
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(eval.rejected());
    }

    #[test]
    fn test_unknown_symbol_warns() {
        let fx = context_fixture();
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.warnings.len(), 1);
    }

    #[test]
    fn test_cluster_headroom_scales_size() {
        let mut fx = context_fixture();
        fx.marginal_correlation = Some(0.3);
        // Cluster already at 35% against a 40% cap; a 10% request gets
        // scaled to the 5% headroom.
        fx.cluster_exposure_pct = 35.0;
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(!eval.rejected());
        assert_eq!(eval.current_size, dec!(5000));
    }

    #[test]
    fn test_cluster_full_rejects() {
        let mut fx = context_fixture();
        fx.marginal_correlation = Some(0.3);
        fx.cluster_exposure_pct = 45.0;
        let ctx = fx.context();
        let mut eval = Evaluation::new(dec!(10000));
        check(&ctx, &config(), &mut eval);
        assert!(eval.rejected());
    }
}
