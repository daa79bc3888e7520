//! Timeline provider trait and structured error types.
//!
//! The TimelineProvider trait abstracts over sample sources (CSV files,
//! in-memory fixtures, synthetic generation) so the engine never knows where
//! a timeline came from. Providers apply the caller's `GapPolicy` before
//! returning; gap handling is never global state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::gaps::GapPolicy;
use crate::domain::{InsufficientData, PositionId, Sample};

/// Samples wanted for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRequest {
    pub position_id: PositionId,
    pub pool: String,
    /// Inclusive window.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Price at `start`; only generating providers use it.
    pub reference_price: f64,
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("no timeline source for pool '{pool}'")]
    PoolNotFound { pool: String },

    #[error("no samples for pool '{pool}' between {start} and {end}")]
    EmptyWindow {
        pool: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("gap of {gap_minutes} minutes before sample {index} exceeds the {max_minutes} minute limit")]
    GapTooLarge {
        index: usize,
        gap_minutes: i64,
        max_minutes: i64,
    },

    #[error("failed to read timeline '{source_name}': {message}")]
    Read { source_name: String, message: String },

    #[error("malformed row {row} in '{source_name}': {message}")]
    Parse {
        source_name: String,
        row: usize,
        message: String,
    },
}

impl TimelineError {
    /// Data-quality outcome recorded for the position.
    pub fn insufficient_reason(&self) -> InsufficientData {
        match self {
            Self::EmptyWindow { .. } => InsufficientData::EmptyTimeline,
            Self::GapTooLarge { index, .. } => InsufficientData::TimelineGap { index: *index },
            _ => InsufficientData::TimelineUnavailable,
        }
    }
}

/// Source of chronological price/volume samples.
pub trait TimelineProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Samples for `request`, ordered by timestamp, with `gaps` applied.
    fn fetch(
        &self,
        request: &TimelineRequest,
        gaps: &GapPolicy,
    ) -> Result<Vec<Sample>, TimelineError>;

    /// True when the provider produces generated rather than observed data.
    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Keep samples inside the request window, in timestamp order.
pub fn clip_to_window(samples: &[Sample], request: &TimelineRequest) -> Vec<Sample> {
    let mut clipped: Vec<Sample> = samples
        .iter()
        .filter(|s| s.timestamp >= request.start && s.timestamp <= request.end)
        .cloned()
        .collect();
    clipped.sort_by_key(|s| s.timestamp);
    clipped
}
