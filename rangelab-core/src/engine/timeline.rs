//! Valuation timeline — position value at every sample, built once.
//!
//! Every grid cell of a position replays the same `ValuationTimeline`; the
//! valuation and fee math is never repeated per cell.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{InsufficientData, Position, Sample};
use crate::fees::{accrue_fees, FeeCalibration, FeeCurveTable};
use crate::valuation::{multiplier_extremes, value_multiplier};

/// Position value derived from one sample. All values are in capital units
/// and include fees accrued through this sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationPoint {
    pub timestamp: DateTime<Utc>,
    /// Close price over entry price.
    pub price_ratio: f64,
    pub cumulative_fees: f64,
    pub open_value: f64,
    /// Lowest value reachable inside the sample's high/low range.
    pub worst_value: f64,
    /// Highest value reachable inside the sample's high/low range.
    pub best_value: f64,
    pub close_value: f64,
    /// Close price is outside the position's active range.
    pub out_of_range: bool,
}

/// Immutable per-position valuation series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationTimeline {
    capital: f64,
    points: Vec<ValuationPoint>,
}

impl ValuationTimeline {
    /// Build the series for `position` over `samples`.
    ///
    /// Empty, malformed, or out-of-order timelines are reported as
    /// insufficient data.
    pub fn build(
        position: &Position,
        samples: &[Sample],
        calibration: FeeCalibration,
        fee_curves: &FeeCurveTable,
    ) -> Result<Self, InsufficientData> {
        validate_samples(samples)?;

        let entry = position.entry_price;
        let capital = position.capital;
        let shape = &position.shape;
        let fees = accrue_fees(samples, entry, shape, calibration, fee_curves);

        let points = samples
            .iter()
            .zip(fees)
            .map(|(sample, cumulative_fees)| {
                let (worst, best) =
                    multiplier_extremes(sample.low / entry, sample.high / entry, shape);
                ValuationPoint {
                    timestamp: sample.timestamp,
                    price_ratio: sample.close / entry,
                    cumulative_fees,
                    open_value: capital * value_multiplier(sample.open / entry, shape)
                        + cumulative_fees,
                    worst_value: capital * worst + cumulative_fees,
                    best_value: capital * best + cumulative_fees,
                    close_value: capital * value_multiplier(sample.close / entry, shape)
                        + cumulative_fees,
                    out_of_range: position.is_out_of_range(sample.close),
                }
            })
            .collect();

        Ok(Self { capital, points })
    }

    /// Wrap precomputed points. Callers are responsible for ordering.
    pub fn from_points(capital: f64, points: Vec<ValuationPoint>) -> Self {
        Self { capital, points }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn points(&self) -> &[ValuationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Percentage change of `value` against invested capital.
    pub fn pct_change(&self, value: f64) -> f64 {
        (value - self.capital) / self.capital * 100.0
    }
}

/// Reject timelines the engine cannot replay.
pub fn validate_samples(samples: &[Sample]) -> Result<(), InsufficientData> {
    if samples.is_empty() {
        return Err(InsufficientData::EmptyTimeline);
    }
    for (index, sample) in samples.iter().enumerate() {
        if !sample.is_sane() {
            return Err(InsufficientData::MalformedSample { index });
        }
        if index > 0 && sample.timestamp <= samples[index - 1].timestamp {
            return Err(InsufficientData::OutOfOrder { index });
        }
    }
    Ok(())
}
