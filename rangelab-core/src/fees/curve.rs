//! Fee distance curves — data-driven multiplier tables.
//!
//! A curve maps the normalized distance of price from the range center
//! (0.0 at entry, 1.0 at the edge of the bins) to a fee multiplier. Curves are
//! piecewise-linear over their points and flat beyond the first/last point.
//! The table holds one curve per distribution plus the multiplier applied
//! while price sits outside the bins.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Distribution, LiquidityShape};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeeCurveError {
    #[error("fee curve needs at least one point")]
    Empty,

    #[error("fee curve point {index} is not finite")]
    NonFinite { index: usize },

    #[error("fee curve point {index} has negative multiplier {value}")]
    NegativeMultiplier { index: usize, value: f64 },

    #[error("fee curve distances must be strictly increasing (point {index})")]
    Unsorted { index: usize },

    #[error("out-of-range multiplier must be finite and non-negative, got {0}")]
    InvalidOutOfRange(f64),
}

/// Piecewise-linear multiplier curve: `[distance, multiplier]` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCurve {
    pub points: Vec<[f64; 2]>,
}

impl FeeCurve {
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self, FeeCurveError> {
        let curve = Self { points };
        curve.validate()?;
        Ok(curve)
    }

    /// Same multiplier at every distance.
    pub fn flat(multiplier: f64) -> Self {
        Self {
            points: vec![[0.0, multiplier], [1.0, multiplier]],
        }
    }

    pub fn validate(&self) -> Result<(), FeeCurveError> {
        if self.points.is_empty() {
            return Err(FeeCurveError::Empty);
        }
        for (index, [distance, multiplier]) in self.points.iter().copied().enumerate() {
            if !(distance.is_finite() && multiplier.is_finite()) {
                return Err(FeeCurveError::NonFinite { index });
            }
            if multiplier < 0.0 {
                return Err(FeeCurveError::NegativeMultiplier {
                    index,
                    value: multiplier,
                });
            }
            if index > 0 && distance <= self.points[index - 1][0] {
                return Err(FeeCurveError::Unsorted { index });
            }
        }
        Ok(())
    }

    /// Interpolated multiplier at `distance`.
    pub fn multiplier_at(&self, distance: f64) -> f64 {
        let Some(first) = self.points.first() else {
            return 0.0;
        };
        if distance <= first[0] {
            return first[1];
        }
        for pair in self.points.windows(2) {
            let [x0, y0] = pair[0];
            let [x1, y1] = pair[1];
            if distance <= x1 {
                let t = (distance - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        self.points.last().map(|p| p[1]).unwrap_or(0.0)
    }
}

/// Distribution → fee curve lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeCurveTable {
    /// Multiplier while price is outside the bins.
    pub out_of_range: f64,
    pub uniform: FeeCurve,
    pub edge_weighted: FeeCurve,
}

impl Default for FeeCurveTable {
    /// Uniform positions earn at a flat rate; edge-weighted positions earn
    /// more near the center of the range and less toward its edges. These
    /// are starting points, meant to be re-tuned against realized fees.
    fn default() -> Self {
        Self {
            out_of_range: 0.0,
            uniform: FeeCurve::flat(1.0),
            edge_weighted: FeeCurve {
                points: vec![[0.0, 1.2], [0.5, 1.0], [1.0, 0.8]],
            },
        }
    }
}

impl FeeCurveTable {
    pub fn validate(&self) -> Result<(), FeeCurveError> {
        self.uniform.validate()?;
        self.edge_weighted.validate()?;
        if !(self.out_of_range.is_finite() && self.out_of_range >= 0.0) {
            return Err(FeeCurveError::InvalidOutOfRange(self.out_of_range));
        }
        Ok(())
    }

    pub fn curve_for(&self, distribution: Distribution) -> &FeeCurve {
        match distribution {
            Distribution::Uniform => &self.uniform,
            Distribution::EdgeWeighted => &self.edge_weighted,
        }
    }

    /// Fee multiplier for a position of `shape` with price at `price_ratio`.
    pub fn distance_multiplier(&self, shape: &LiquidityShape, price_ratio: f64) -> f64 {
        let distance = shape.normalized_distance(price_ratio);
        if distance > 1.0 {
            return self.out_of_range;
        }
        self.curve_for(shape.distribution).multiplier_at(distance)
    }
}
