//! Exit state machine — first qualifying exit for one TP/SL pair.
//!
//! ```text
//!   InRange ──(close outside range)──▶ OutOfRangeTiming { since }
//!      ▲                                   │          │
//!      └──────(close back inside)──────────┘          │ elapsed ≥ grace
//!                                                     ▼
//!                         Exited(TP | SL | RangeTimeout | EndOfHorizon)
//! ```
//!
//! TP and SL are checked on every sample in both live states. A position
//! that is out of range keeps trading against its thresholds until its
//! grace period runs out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ExitType, Position, SimulationResult};

use super::timeline::{ValuationPoint, ValuationTimeline};

/// One grid cell: take-profit and stop-loss levels in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitThresholds {
    pub take_profit_pct: f64,
    /// Positive number; the exit fires at `-stop_loss_pct`.
    pub stop_loss_pct: f64,
}

impl ExitThresholds {
    pub fn new(take_profit_pct: f64, stop_loss_pct: f64) -> Self {
        Self {
            take_profit_pct,
            stop_loss_pct,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    InRange,
    OutOfRangeTiming { since: DateTime<Utc> },
    Exited(ExitType),
}

/// Where and how a replay ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub exit_type: ExitType,
    pub index: Option<usize>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Realized value change, percent of capital.
    pub pnl_pct: Option<f64>,
}

impl ExitEvent {
    fn at(exit_type: ExitType, index: usize, point: &ValuationPoint, pnl_pct: f64) -> Self {
        Self {
            exit_type,
            index: Some(index),
            timestamp: Some(point.timestamp),
            pnl_pct: Some(pnl_pct),
        }
    }

    fn no_data() -> Self {
        Self {
            exit_type: ExitType::InsufficientData,
            index: None,
            timestamp: None,
            pnl_pct: None,
        }
    }

    /// Attach position identity and the cell's levels.
    pub fn into_result(
        self,
        position: &Position,
        thresholds: ExitThresholds,
    ) -> SimulationResult {
        SimulationResult {
            position_id: position.id.clone(),
            strategy_instance_id: position.strategy_instance_id.clone(),
            tp: thresholds.take_profit_pct,
            sl: thresholds.stop_loss_pct,
            exit_type: self.exit_type,
            exit_index: self.index,
            exit_timestamp: self.timestamp,
            pnl: self.pnl_pct.map(|pct| position.capital * pct / 100.0),
            pnl_pct: self.pnl_pct,
            insufficient: None,
        }
    }
}

/// Replays one valuation timeline against one TP/SL pair.
#[derive(Debug, Clone)]
pub struct ExitStateMachine {
    thresholds: ExitThresholds,
    grace_period: Duration,
    state: ExitState,
}

impl ExitStateMachine {
    pub fn new(thresholds: ExitThresholds, grace_period: Duration) -> Self {
        Self {
            thresholds,
            grace_period,
            state: ExitState::InRange,
        }
    }

    pub fn state(&self) -> ExitState {
        self.state
    }

    /// Run to completion over `timeline`.
    pub fn run(
        timeline: &ValuationTimeline,
        thresholds: ExitThresholds,
        grace_period: Duration,
    ) -> ExitEvent {
        let Some(last) = timeline.points().last() else {
            return ExitEvent::no_data();
        };

        let mut machine = Self::new(thresholds, grace_period);
        for (index, point) in timeline.points().iter().enumerate() {
            if let Some(event) = machine.step(timeline, index, point) {
                return event;
            }
        }

        let close = timeline.pct_change(last.close_value);
        machine.exit(ExitType::EndOfHorizon, timeline.len() - 1, last, close)
    }

    /// Advance by one sample. Returns the exit event if this sample ends the
    /// replay; does nothing once exited.
    ///
    /// The out-of-range countdown is inclusive: a sample whose timestamp is
    /// exactly `grace_period` after the first out-of-range sample times out.
    /// A zero grace period therefore times out on the second consecutive
    /// out-of-range sample, never on the first.
    pub fn step(
        &mut self,
        timeline: &ValuationTimeline,
        index: usize,
        point: &ValuationPoint,
    ) -> Option<ExitEvent> {
        if matches!(self.state, ExitState::Exited(_)) {
            return None;
        }

        let tp = self.thresholds.take_profit_pct;
        let sl = -self.thresholds.stop_loss_pct;
        let open = timeline.pct_change(point.open_value);

        // SL before TP: a sample crossing both resolves to the adverse side.
        if timeline.pct_change(point.worst_value) <= sl {
            // Fill at the threshold unless the sample opened through it.
            let fill = if open <= sl { open } else { sl };
            return Some(self.exit(ExitType::StopLoss, index, point, fill));
        }
        if timeline.pct_change(point.best_value) >= tp {
            let fill = if open >= tp { open } else { tp };
            return Some(self.exit(ExitType::TakeProfit, index, point, fill));
        }

        match (self.state, point.out_of_range) {
            (ExitState::InRange, true) => {
                self.state = ExitState::OutOfRangeTiming {
                    since: point.timestamp,
                };
            }
            (ExitState::OutOfRangeTiming { since }, true) => {
                if point.timestamp - since >= self.grace_period {
                    let close = timeline.pct_change(point.close_value);
                    return Some(self.exit(ExitType::RangeTimeout, index, point, close));
                }
            }
            (ExitState::OutOfRangeTiming { .. }, false) => {
                self.state = ExitState::InRange;
            }
            _ => {}
        }
        None
    }

    fn exit(
        &mut self,
        exit_type: ExitType,
        index: usize,
        point: &ValuationPoint,
        pnl_pct: f64,
    ) -> ExitEvent {
        self.state = ExitState::Exited(exit_type);
        ExitEvent::at(exit_type, index, point, pnl_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    /// Point whose open/worst/best/close all equal `value`.
    fn point(minute: i64, value: f64, out_of_range: bool) -> ValuationPoint {
        ValuationPoint {
            timestamp: t(minute),
            price_ratio: 1.0,
            cumulative_fees: 0.0,
            open_value: value,
            worst_value: value,
            best_value: value,
            close_value: value,
            out_of_range,
        }
    }

    fn timeline(points: Vec<ValuationPoint>) -> ValuationTimeline {
        ValuationTimeline::from_points(100.0, points)
    }

    fn cell(tp: f64, sl: f64) -> ExitThresholds {
        ExitThresholds::new(tp, sl)
    }

    #[test]
    fn empty_timeline_is_insufficient() {
        let event = ExitStateMachine::run(&timeline(vec![]), cell(5.0, 5.0), Duration::zero());
        assert_eq!(event.exit_type, ExitType::InsufficientData);
        assert_eq!(event.index, None);
    }

    #[test]
    fn take_profit_at_first_crossing() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(1, 103.0, false),
            point(2, 106.0, false),
            point(3, 110.0, false),
        ]);
        let event = ExitStateMachine::run(&tl, cell(5.0, 5.0), Duration::minutes(30));
        assert_eq!(event.exit_type, ExitType::TakeProfit);
        assert_eq!(event.index, Some(2));
        assert_eq!(event.timestamp, Some(t(2)));
        // Opened through the level: fills at the open value.
        assert!((event.pnl_pct.unwrap() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn intrasample_stop_fills_at_threshold() {
        let mut p = point(1, 99.0, false);
        p.worst_value = 92.0;
        let tl = timeline(vec![point(0, 100.0, false), p]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 5.0), Duration::minutes(30));
        assert_eq!(event.exit_type, ExitType::StopLoss);
        assert!((event.pnl_pct.unwrap() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn stop_wins_tie_within_one_sample() {
        let mut p = point(0, 100.0, false);
        p.best_value = 120.0;
        p.worst_value = 80.0;
        let event = ExitStateMachine::run(&timeline(vec![p]), cell(10.0, 10.0), Duration::zero());
        assert_eq!(event.exit_type, ExitType::StopLoss);
    }

    #[test]
    fn end_of_horizon_uses_last_close() {
        let tl = timeline(vec![point(0, 100.0, false), point(1, 101.5, false)]);
        let event = ExitStateMachine::run(&tl, cell(50.0, 50.0), Duration::zero());
        assert_eq!(event.exit_type, ExitType::EndOfHorizon);
        assert_eq!(event.index, Some(1));
        assert!((event.pnl_pct.unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn range_timeout_after_grace_not_at_exit_from_range() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(10, 99.0, true),
            point(20, 99.0, true),
            point(30, 98.5, true),
            point(40, 98.0, true),
        ]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 10.0), Duration::minutes(20));
        assert_eq!(event.exit_type, ExitType::RangeTimeout);
        assert_eq!(event.index, Some(3));
        assert!((event.pnl_pct.unwrap() + 1.5).abs() < 1e-9);
    }

    #[test]
    fn zero_grace_times_out_on_second_sample() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(10, 99.0, true),
            point(11, 99.0, true),
        ]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 10.0), Duration::zero());
        assert_eq!(event.exit_type, ExitType::RangeTimeout);
        assert_eq!(event.index, Some(2));
    }

    #[test]
    fn saturated_grace_never_times_out() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(10, 99.0, true),
            point(100_000, 99.0, true),
        ]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 10.0), Duration::MAX);
        assert_eq!(event.exit_type, ExitType::EndOfHorizon);
    }

    #[test]
    fn reentering_range_cancels_countdown() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(10, 99.0, true),
            point(20, 99.0, false),
            point(30, 99.0, true),
            point(45, 99.0, true),
        ]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 10.0), Duration::minutes(20));
        assert_eq!(event.exit_type, ExitType::EndOfHorizon);
    }

    #[test]
    fn thresholds_still_checked_while_out_of_range() {
        let tl = timeline(vec![
            point(0, 100.0, false),
            point(10, 98.0, true),
            point(20, 94.0, true),
            point(90, 94.0, true),
        ]);
        let event = ExitStateMachine::run(&tl, cell(10.0, 5.0), Duration::minutes(60));
        assert_eq!(event.exit_type, ExitType::StopLoss);
        assert_eq!(event.index, Some(2));
    }

    #[test]
    fn step_tracks_states() {
        let tl = timeline(vec![point(0, 100.0, false), point(5, 100.0, true)]);
        let mut machine = ExitStateMachine::new(cell(10.0, 10.0), Duration::minutes(60));
        assert_eq!(machine.state(), ExitState::InRange);
        assert!(machine.step(&tl, 0, &tl.points()[0]).is_none());
        assert!(machine.step(&tl, 1, &tl.points()[1]).is_none());
        assert_eq!(machine.state(), ExitState::OutOfRangeTiming { since: t(5) });
    }

    #[test]
    fn exited_machine_ignores_further_samples() {
        let tl = timeline(vec![point(0, 80.0, false), point(1, 150.0, false)]);
        let mut machine = ExitStateMachine::new(cell(10.0, 10.0), Duration::zero());
        let first = machine.step(&tl, 0, &tl.points()[0]);
        assert_eq!(first.map(|e| e.exit_type), Some(ExitType::StopLoss));
        assert!(machine.step(&tl, 1, &tl.points()[1]).is_none());
        assert_eq!(machine.state(), ExitState::Exited(ExitType::StopLoss));
    }
}
