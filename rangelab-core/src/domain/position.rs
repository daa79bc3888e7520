//! Position — one historical LP deployment and its liquidity shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{PositionId, StrategyInstanceId};

/// Invariant violations detected when a position is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position {id}: close time {closed_at} precedes open time {opened_at}")]
    CloseBeforeOpen {
        id: PositionId,
        opened_at: DateTime<Utc>,
        closed_at: DateTime<Utc>,
    },

    #[error("position {id}: {field} must be positive and finite, got {value}")]
    NonPositive {
        id: PositionId,
        field: &'static str,
        value: f64,
    },

    #[error("position {id}: grace period must not be negative, got {secs}s")]
    NegativeGracePeriod { id: PositionId, secs: i64 },

    #[error("position {id}: grace period of {secs}s is out of range")]
    GracePeriodOutOfRange { id: PositionId, secs: i64 },

    #[error("grace period must be a finite, non-negative number of minutes, got {0}")]
    InvalidGraceMinutes(f64),

    #[error("liquidity shape needs at least one bin")]
    NoBins,

    #[error("liquidity shape bin step must be positive and finite, got {0}")]
    InvalidBinStep(f64),

    #[error("liquidity shape of {bin_count} bins at {bin_step_bps} bps has no usable range")]
    DegenerateRange { bin_count: u32, bin_step_bps: f64 },

    #[error("unknown liquidity distribution '{0}'")]
    UnknownDistribution(String),
}

/// How deposited capital is spread across the bins of the active range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Equal liquidity in every bin.
    #[serde(alias = "spot")]
    Uniform,
    /// Liquidity concentrated toward both edges of the range.
    #[serde(alias = "bid_ask")]
    EdgeWeighted,
}

impl Distribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::EdgeWeighted => "edge_weighted",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "uniform" | "spot" => Ok(Self::Uniform),
            "edge_weighted" | "bid_ask" | "bidask" => Ok(Self::EdgeWeighted),
            other => Err(PositionError::UnknownDistribution(other.to_string())),
        }
    }
}

/// Liquidity-shape descriptor: distribution pattern plus range width.
///
/// Bins are split evenly either side of the entry price, so the range spans
/// `entry / b ..= entry * b` with `b = (1 + bin_step)^(bin_count / 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityShape {
    pub distribution: Distribution,
    pub bin_count: u32,
    /// Price step between adjacent bins, in basis points.
    pub bin_step_bps: f64,
}

impl LiquidityShape {
    pub fn new(
        distribution: Distribution,
        bin_count: u32,
        bin_step_bps: f64,
    ) -> Result<Self, PositionError> {
        let shape = Self {
            distribution,
            bin_count,
            bin_step_bps,
        };
        shape.validate()?;
        Ok(shape)
    }

    pub fn validate(&self) -> Result<(), PositionError> {
        if self.bin_count == 0 {
            return Err(PositionError::NoBins);
        }
        if !(self.bin_step_bps.is_finite() && self.bin_step_bps > 0.0) {
            return Err(PositionError::InvalidBinStep(self.bin_step_bps));
        }
        let b = self.boundary_ratio();
        if !(b.is_finite() && b > 1.0) {
            return Err(PositionError::DegenerateRange {
                bin_count: self.bin_count,
                bin_step_bps: self.bin_step_bps,
            });
        }
        Ok(())
    }

    /// Price ratio at the upper edge of the range (`b`).
    pub fn boundary_ratio(&self) -> f64 {
        (1.0 + self.bin_step_bps / 10_000.0).powf(self.bin_count as f64 / 2.0)
    }

    /// `ln(b)`: half the range width in log-price space.
    pub fn log_half_width(&self) -> f64 {
        self.boundary_ratio().ln()
    }

    /// Distance of `price_ratio` from the range center, in units of the
    /// half-width. Values above 1.0 lie outside the bins. Unclamped.
    ///
    /// Non-finite or non-positive ratios are infinitely far away.
    pub fn normalized_distance(&self, price_ratio: f64) -> f64 {
        if !(price_ratio.is_finite() && price_ratio > 0.0) {
            return f64::INFINITY;
        }
        price_ratio.ln().abs() / self.log_half_width()
    }

    /// Fractional value lost by a uniform position when price reaches the
    /// edge of its range: `1 - 1/b`, the quote value given up by a position
    /// that has converted entirely to base at the lower edge.
    ///
    /// Always below 1.0. Grows more slowly than `ln(b)^2`, so at any fixed
    /// price inside both ranges a wider shape loses no more than a narrower one.
    pub fn edge_loss(&self) -> f64 {
        1.0 - self.boundary_ratio().recip()
    }
}

/// Why the bot actually closed the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    OutOfRange,
    Manual,
    Other(String),
}

impl CloseReason {
    /// Parse a close reason as written in bot history. Unrecognized reasons
    /// are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "tp" | "take_profit" => Self::TakeProfit,
            "sl" | "stop_loss" => Self::StopLoss,
            "oor" | "out_of_range" | "range_timeout" => Self::OutOfRange,
            "manual" | "user" => Self::Manual,
            _ => Self::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeProfit => f.write_str("take_profit"),
            Self::StopLoss => f.write_str("stop_loss"),
            Self::OutOfRange => f.write_str("out_of_range"),
            Self::Manual => f.write_str("manual"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Position-specific out-of-range rule parsed from history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutOfRangeRule {
    /// How long price may stay outside the active range before force-close.
    pub grace_period_secs: i64,
    /// Percent deviation from entry that counts as leaving the active range.
    pub deviation_pct: f64,
}

impl OutOfRangeRule {
    /// Unchecked constructor for literal values. Input from history goes
    /// through [`try_from_minutes`](Self::try_from_minutes).
    pub fn from_minutes(grace_minutes: f64, deviation_pct: f64) -> Self {
        Self {
            grace_period_secs: (grace_minutes * 60.0).round() as i64,
            deviation_pct,
        }
    }

    /// Rejects grace periods that are not finite, negative, or too long to
    /// represent as a duration.
    pub fn try_from_minutes(grace_minutes: f64, deviation_pct: f64) -> Result<Self, PositionError> {
        let secs = (grace_minutes * 60.0).round();
        // `as` saturates, so an oversized value fails the duration check.
        if !(secs.is_finite() && secs >= 0.0) || Duration::try_seconds(secs as i64).is_none() {
            return Err(PositionError::InvalidGraceMinutes(grace_minutes));
        }
        Ok(Self {
            grace_period_secs: secs as i64,
            deviation_pct,
        })
    }

    /// Saturates at the longest representable duration.
    pub fn grace_period(&self) -> Duration {
        Duration::try_seconds(self.grace_period_secs).unwrap_or(Duration::MAX)
    }
}

/// Actual fee income and volume exposure recorded for the position.
///
/// Either value may be missing; that makes the position ineligible for
/// simulation rather than invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeHistory {
    pub total_fees: Option<f64>,
    pub volume_exposure: Option<f64>,
}

/// One historical LP deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub strategy_instance_id: StrategyInstanceId,
    /// Pool the position was deployed in; used to request its timeline.
    pub pool: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub entry_price: f64,
    /// Invested capital, in quote units.
    pub capital: f64,
    pub shape: LiquidityShape,
    pub close_reason: CloseReason,
    pub fee_history: FeeHistory,
    pub out_of_range: OutOfRangeRule,
}

impl Position {
    /// Check construction invariants. Loaders call this before a position
    /// enters a simulation run; the engine assumes it holds.
    pub fn validate(&self) -> Result<(), PositionError> {
        if self.closed_at < self.opened_at {
            return Err(PositionError::CloseBeforeOpen {
                id: self.id.clone(),
                opened_at: self.opened_at,
                closed_at: self.closed_at,
            });
        }
        for (field, value) in [
            ("entry_price", self.entry_price),
            ("capital", self.capital),
            ("oor_deviation_pct", self.out_of_range.deviation_pct),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PositionError::NonPositive {
                    id: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        let secs = self.out_of_range.grace_period_secs;
        if secs < 0 {
            return Err(PositionError::NegativeGracePeriod {
                id: self.id.clone(),
                secs,
            });
        }
        if Duration::try_seconds(secs).is_none() {
            return Err(PositionError::GracePeriodOutOfRange {
                id: self.id.clone(),
                secs,
            });
        }
        self.shape.validate()
    }

    /// How long the position was actually held.
    pub fn duration(&self) -> Duration {
        self.closed_at - self.opened_at
    }

    pub fn price_ratio(&self, price: f64) -> f64 {
        price / self.entry_price
    }

    /// Lower and upper price of the active range.
    pub fn active_range(&self) -> (f64, f64) {
        let dev = self.out_of_range.deviation_pct / 100.0;
        (self.entry_price * (1.0 - dev), self.entry_price * (1.0 + dev))
    }

    /// True when `price` lies strictly outside the active range.
    pub fn is_out_of_range(&self, price: f64) -> bool {
        let (lower, upper) = self.active_range();
        price < lower || price > upper
    }
}
