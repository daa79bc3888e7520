//! Post-close horizon — how far past the actual close a timeline reaches.
//!
//! ```text
//! ext = clamp(duration_hours * post_close_multiplier, min_hours, max_hours)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::provider::TimelineRequest;
use crate::domain::Position;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostCloseHorizon {
    pub post_close_multiplier: f64,
    pub min_post_close_hours: f64,
    pub max_post_close_hours: f64,
}

impl Default for PostCloseHorizon {
    fn default() -> Self {
        Self {
            post_close_multiplier: 1.0,
            min_post_close_hours: 1.0,
            max_post_close_hours: 24.0,
        }
    }
}

impl PostCloseHorizon {
    /// Upper bound on either hours field, ten years.
    pub const MAX_HOURS: f64 = 24.0 * 365.0 * 10.0;

    /// Extension past the close for a position held for `held`. Saturates at
    /// the longest representable duration.
    pub fn extension_for(&self, held: Duration) -> Duration {
        let held_hours = held.num_seconds().max(0) as f64 / 3600.0;
        let hours = (held_hours * self.post_close_multiplier)
            .max(self.min_post_close_hours)
            .min(self.max_post_close_hours);
        Duration::try_seconds((hours * 3600.0).round() as i64).unwrap_or(Duration::MAX)
    }

    /// Timeline request spanning open through the extended horizon, clamped
    /// to the last representable instant.
    pub fn request_for(&self, position: &Position) -> TimelineRequest {
        TimelineRequest {
            position_id: position.id.clone(),
            pool: position.pool.clone(),
            start: position.opened_at,
            end: position
                .closed_at
                .checked_add_signed(self.extension_for(position.duration()))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            reference_price: position.entry_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizon() -> PostCloseHorizon {
        PostCloseHorizon {
            post_close_multiplier: 0.5,
            min_post_close_hours: 2.0,
            max_post_close_hours: 12.0,
        }
    }

    #[test]
    fn short_holds_get_the_minimum() {
        assert_eq!(horizon().extension_for(Duration::hours(1)), Duration::hours(2));
    }

    #[test]
    fn extension_scales_with_duration() {
        assert_eq!(horizon().extension_for(Duration::hours(10)), Duration::hours(5));
    }

    #[test]
    fn long_holds_are_capped() {
        assert_eq!(horizon().extension_for(Duration::days(5)), Duration::hours(12));
    }

    #[test]
    fn oversized_extension_saturates() {
        use crate::domain::{
            CloseReason, Distribution, FeeHistory, LiquidityShape, OutOfRangeRule, PositionId,
            StrategyInstanceId,
        };
        use chrono::TimeZone;

        let opened_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let position = Position {
            id: PositionId::new("p1"),
            strategy_instance_id: StrategyInstanceId::new("spot-12"),
            pool: "SOL-USDC".into(),
            opened_at,
            closed_at: opened_at + Duration::hours(1),
            entry_price: 100.0,
            capital: 10.0,
            shape: LiquidityShape::new(Distribution::Uniform, 12, 100.0).unwrap(),
            close_reason: CloseReason::Manual,
            fee_history: FeeHistory::default(),
            out_of_range: OutOfRangeRule::from_minutes(30.0, 5.0),
        };

        // Fits in a duration but not past 2024 in a timestamp.
        let far = PostCloseHorizon {
            post_close_multiplier: 1.0,
            min_post_close_hours: 1e12,
            max_post_close_hours: 1e12,
        };
        assert_eq!(far.request_for(&position).end, DateTime::<Utc>::MAX_UTC);

        // Does not fit in a duration at all.
        let beyond = PostCloseHorizon {
            min_post_close_hours: 1e13,
            max_post_close_hours: 1e13,
            ..far
        };
        assert_eq!(beyond.extension_for(Duration::hours(1)), Duration::MAX);
        assert_eq!(beyond.request_for(&position).end, DateTime::<Utc>::MAX_UTC);
    }
}
