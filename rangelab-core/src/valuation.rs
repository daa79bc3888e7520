//! Position valuation — price-only value multiplier for an LP position.
//!
//! With `u` the normalized log distance of price from entry (clamped to 1.0 at
//! the range edge) and `w = 1 - 1/b` the shape's edge loss:
//!
//! - uniform:       `m = 1 - w * u^2`
//! - edge-weighted: `m = 1 - 0.75 * w * u^4`
//!
//! Both equal 1.0 at entry, are symmetric in log-price, and saturate at the
//! edge of the bins. The edge-weighted curve is flatter near entry and has the
//! steeper slope at the boundary (`3w` against `2w`).
//!
//! `w` stays below 1.0 and `w / ln(b)^2` falls as `b` grows, so at a price
//! inside both ranges a shape with more bins never loses more than one with
//! fewer.

use crate::domain::{Distribution, LiquidityShape};

/// Share of the uniform edge loss an edge-weighted position suffers at the
/// boundary; its liquidity converts near the edge, at better prices.
const EDGE_WEIGHTED_LOSS_SHARE: f64 = 0.75;

/// Multiplier to apply to invested capital for the price component of value.
///
/// Never negative, never above 1.0.
pub fn value_multiplier(price_ratio: f64, shape: &LiquidityShape) -> f64 {
    let u = shape.normalized_distance(price_ratio).min(1.0);
    let w = shape.edge_loss();
    let loss = match shape.distribution {
        Distribution::Uniform => w * u * u,
        Distribution::EdgeWeighted => EDGE_WEIGHTED_LOSS_SHARE * w * u.powi(4),
    };
    (1.0 - loss).clamp(0.0, 1.0)
}

/// Worst and best multiplier reachable while price travels `low..=high`.
///
/// The curve only depends on log distance from entry, so the worst point is
/// whichever extreme is farther from 1.0 and the best is the point of the
/// interval closest to it (1.0 itself when the interval contains entry).
pub fn multiplier_extremes(low_ratio: f64, high_ratio: f64, shape: &LiquidityShape) -> (f64, f64) {
    let low_dist = shape.normalized_distance(low_ratio);
    let high_dist = shape.normalized_distance(high_ratio);

    let worst_ratio = if low_dist >= high_dist {
        low_ratio
    } else {
        high_ratio
    };
    let best_ratio = if low_ratio <= 1.0 && high_ratio >= 1.0 {
        1.0
    } else if low_dist <= high_dist {
        low_ratio
    } else {
        high_ratio
    };

    (
        value_multiplier(worst_ratio, shape),
        value_multiplier(best_ratio, shape),
    )
}
