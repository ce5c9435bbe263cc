//! Gate 6: asset-class and sector exposure caps.

use crate::models::AssetClass;

use super::super::types::{Evaluation, GateContext};
use super::concentration::apply_cap;

/// Enforce the asset-class cap and, when the request carries a sector,
/// the sector cap.
pub fn check(
    ctx: &GateContext<'_>,
    asset_class: AssetClass,
    sector: Option<&str>,
    eval: &mut Evaluation,
) {
    if let Some(cap_pct) = ctx.limits.asset_class_caps_pct.get(&asset_class) {
        apply_cap(
            ctx,
            eval,
            *cap_pct,
            ctx.state.asset_class_exposure(asset_class),
            &format!("asset class {asset_class}"),
        );
        if eval.rejected() {
            return;
        }
    }

    if let Some(sector) = sector {
        apply_cap(
            ctx,
            eval,
            ctx.limits.max_sector_exposure_pct,
            ctx.state.sector_exposure(sector),
            &format!("sector {sector}"),
        );
    }
}
