//! Gap handling between consecutive samples.
//!
//! A gap is any step between consecutive timestamps longer than
//! `max_interval_minutes`. What happens to it is an explicit per-run decision.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::TimelineError;
use crate::domain::Sample;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapDecision {
    /// Insert flat zero-volume samples at the previous close.
    #[default]
    ForwardFill,
    /// Leave the gap in place.
    KeepGap,
    /// Refuse the timeline.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapPolicy {
    pub decision: GapDecision,
    pub max_interval_minutes: i64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            decision: GapDecision::ForwardFill,
            max_interval_minutes: 5,
        }
    }
}

impl GapPolicy {
    /// Saturates at the longest representable duration.
    pub fn max_interval(&self) -> Duration {
        Duration::try_minutes(self.max_interval_minutes).unwrap_or(Duration::MAX)
    }

    /// Apply the decision to an ordered sample sequence.
    pub fn apply(&self, samples: Vec<Sample>) -> Result<Vec<Sample>, TimelineError> {
        let step = self.max_interval();
        if samples.len() < 2 || step <= Duration::zero() {
            return Ok(samples);
        }

        match self.decision {
            GapDecision::KeepGap => Ok(samples),
            GapDecision::Reject => {
                for (index, pair) in samples.windows(2).enumerate() {
                    let gap = pair[1].timestamp - pair[0].timestamp;
                    if gap > step {
                        return Err(TimelineError::GapTooLarge {
                            index: index + 1,
                            gap_minutes: gap.num_minutes(),
                            max_minutes: self.max_interval_minutes,
                        });
                    }
                }
                Ok(samples)
            }
            GapDecision::ForwardFill => {
                let mut filled = Vec::with_capacity(samples.len());
                let mut inserted = 0usize;
                for sample in samples {
                    if let Some((last_ts, last_close)) =
                        filled.last().map(|s: &Sample| (s.timestamp, s.close))
                    {
                        let mut next = last_ts.checked_add_signed(step);
                        while let Some(ts) = next.filter(|ts| *ts < sample.timestamp) {
                            filled.push(Sample::flat(ts, last_close, 0.0));
                            inserted += 1;
                            next = ts.checked_add_signed(step);
                        }
                    }
                    filled.push(sample);
                }
                if inserted > 0 {
                    debug!(inserted, "forward-filled timeline gaps");
                }
                Ok(filled)
            }
        }
    }
}
