//! Peak analysis — best gain and worst drawdown a position saw.
//!
//! Two windows are scanned: the held window (open through the actual close)
//! and the full horizon (post-close extension included). Percentages use the
//! intrasample best/worst values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Position, PositionId, StrategyInstanceId};

use super::timeline::ValuationTimeline;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub pct: f64,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
    /// Magnitude reached the significance threshold.
    pub significant: bool,
}

/// Extremes within one window. `None` when the window holds no samples or
/// never moved in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakWindow {
    pub max_gain: Option<Peak>,
    pub max_drawdown: Option<Peak>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakAnalysis {
    pub position_id: PositionId,
    pub strategy_instance_id: StrategyInstanceId,
    pub held: PeakWindow,
    pub horizon: PeakWindow,
    /// Close-value percentage at the last sample of the horizon.
    pub final_pct: Option<f64>,
}

/// Scan `timeline` for the position's peaks.
pub fn analyze_peaks(
    position: &Position,
    timeline: &ValuationTimeline,
    significance_threshold: f64,
) -> PeakAnalysis {
    let held_len = timeline
        .points()
        .iter()
        .take_while(|p| p.timestamp <= position.closed_at)
        .count();

    PeakAnalysis {
        position_id: position.id.clone(),
        strategy_instance_id: position.strategy_instance_id.clone(),
        held: scan(timeline, held_len, significance_threshold),
        horizon: scan(timeline, timeline.len(), significance_threshold),
        final_pct: timeline
            .points()
            .last()
            .map(|p| timeline.pct_change(p.close_value)),
    }
}

fn scan(timeline: &ValuationTimeline, len: usize, threshold: f64) -> PeakWindow {
    let mut window = PeakWindow::default();

    for (index, point) in timeline.points()[..len].iter().enumerate() {
        let best = timeline.pct_change(point.best_value);
        let worst = timeline.pct_change(point.worst_value);

        if best > 0.0 && window.max_gain.map_or(true, |p| best > p.pct) {
            window.max_gain = Some(Peak {
                pct: best,
                timestamp: point.timestamp,
                index,
                significant: best >= threshold,
            });
        }
        if worst < 0.0 && window.max_drawdown.map_or(true, |p| worst < p.pct) {
            window.max_drawdown = Some(Peak {
                pct: worst,
                timestamp: point.timestamp,
                index,
                significant: -worst >= threshold,
            });
        }
    }
    window
}
