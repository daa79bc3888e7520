//! Simulation outcomes: exit classification and per-cell results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{PositionId, StrategyInstanceId};
use super::position::Position;

/// How a simulated position ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitType {
    TakeProfit,
    StopLoss,
    RangeTimeout,
    EndOfHorizon,
    InsufficientData,
}

impl ExitType {
    pub const ALL: [ExitType; 5] = [
        ExitType::TakeProfit,
        ExitType::StopLoss,
        ExitType::RangeTimeout,
        ExitType::EndOfHorizon,
        ExitType::InsufficientData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TakeProfit => "take_profit",
            Self::StopLoss => "stop_loss",
            Self::RangeTimeout => "range_timeout",
            Self::EndOfHorizon => "end_of_horizon",
            Self::InsufficientData => "insufficient_data",
        }
    }

    /// False only for the insufficient-data outcome.
    pub fn is_simulated(&self) -> bool {
        !matches!(self, Self::InsufficientData)
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a position could not be simulated.
///
/// These are data-quality conditions, not failures: they travel as typed
/// outcomes so coverage can be reported next to performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsufficientData {
    #[error("timeline is empty")]
    EmptyTimeline,

    #[error("sample {index} is malformed")]
    MalformedSample { index: usize },

    #[error("sample {index} is out of chronological order")]
    OutOfOrder { index: usize },

    #[error("historical fee data is missing")]
    MissingFeeData,

    #[error("historical volume exposure is zero or missing")]
    ZeroVolumeExposure,

    #[error("timeline gap before sample {index} exceeds the tolerated interval")]
    TimelineGap { index: usize },

    #[error("timeline provider could not supply samples")]
    TimelineUnavailable,
}

/// Outcome of one (position, TP, SL) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub position_id: PositionId,
    pub strategy_instance_id: StrategyInstanceId,
    /// Take-profit level, percent.
    pub tp: f64,
    /// Stop-loss level, percent (positive number).
    pub sl: f64,
    pub exit_type: ExitType,
    pub exit_index: Option<usize>,
    pub exit_timestamp: Option<DateTime<Utc>>,
    /// Value at exit minus invested capital.
    pub pnl: Option<f64>,
    /// `pnl` as a percentage of invested capital.
    pub pnl_pct: Option<f64>,
    pub insufficient: Option<InsufficientData>,
}

impl SimulationResult {
    /// Result for a cell whose position could not be simulated.
    pub fn insufficient(position: &Position, tp: f64, sl: f64, reason: InsufficientData) -> Self {
        Self {
            position_id: position.id.clone(),
            strategy_instance_id: position.strategy_instance_id.clone(),
            tp,
            sl,
            exit_type: ExitType::InsufficientData,
            exit_index: None,
            exit_timestamp: None,
            pnl: None,
            pnl_pct: None,
            insufficient: Some(reason),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.exit_type.is_simulated()
    }

    /// Winner: realized PnL strictly positive.
    pub fn is_winner(&self) -> bool {
        self.pnl.is_some_and(|p| p > 0.0)
    }
}
