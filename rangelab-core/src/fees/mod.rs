//! Fee accrual — per-sample fee income from volume and price distance.
//!
//! Each position calibrates its own fee rate from its realized history
//! (`total_fees / volume_exposure`), then applies it forward over the whole
//! timeline, post-close extension included:
//!
//! ```text
//! fee_i = volume_i * rate * distance_multiplier(shape, close_i / entry)
//! ```
//!
//! The cumulative series is non-decreasing because every term is
//! non-negative.

pub mod curve;

pub use curve::{FeeCurve, FeeCurveError, FeeCurveTable};

use serde::{Deserialize, Serialize};

use crate::domain::{FeeHistory, InsufficientData, LiquidityShape, Sample};

/// Per-position fee rate derived from realized history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeCalibration {
    /// Fee income per unit of volume exposure.
    pub rate: f64,
}

impl FeeCalibration {
    /// Derive the rate, or report why the history cannot support one.
    ///
    /// Missing or invalid fees and missing or non-positive exposure make the
    /// position ineligible; no rate is guessed.
    pub fn from_history(history: &FeeHistory) -> Result<Self, InsufficientData> {
        let fees = match history.total_fees {
            Some(f) if f.is_finite() && f >= 0.0 => f,
            _ => return Err(InsufficientData::MissingFeeData),
        };
        let exposure = match history.volume_exposure {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => return Err(InsufficientData::ZeroVolumeExposure),
        };
        Ok(Self {
            rate: fees / exposure,
        })
    }
}

/// Cumulative fees aligned one-to-one with `samples`.
pub fn accrue_fees(
    samples: &[Sample],
    entry_price: f64,
    shape: &LiquidityShape,
    calibration: FeeCalibration,
    table: &FeeCurveTable,
) -> Vec<f64> {
    let mut cumulative = 0.0;
    samples
        .iter()
        .map(|sample| {
            let ratio = sample.close / entry_price;
            let multiplier = table.distance_multiplier(shape, ratio);
            let fee = sample.volume.max(0.0) * calibration.rate * multiplier;
            cumulative += fee;
            cumulative
        })
        .collect()
}
