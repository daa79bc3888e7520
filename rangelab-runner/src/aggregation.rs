//! Aggregation — per (strategy, TP, SL) summary statistics.
//!
//! Every function here is a pure reduction over simulation results.
//! Insufficient-data results count toward coverage but never toward PnL
//! statistics.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rangelab_core::domain::{ExitType, SimulationResult, StrategyInstanceId};
use serde::{Deserialize, Serialize};

/// Per exit type counts within one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCounts {
    pub take_profit: usize,
    pub stop_loss: usize,
    pub range_timeout: usize,
    pub end_of_horizon: usize,
}

impl ExitCounts {
    fn record(&mut self, exit: ExitType) {
        match exit {
            ExitType::TakeProfit => self.take_profit += 1,
            ExitType::StopLoss => self.stop_loss += 1,
            ExitType::RangeTimeout => self.range_timeout += 1,
            ExitType::EndOfHorizon => self.end_of_horizon += 1,
            ExitType::InsufficientData => {}
        }
    }

    pub fn get(&self, exit: ExitType) -> usize {
        match exit {
            ExitType::TakeProfit => self.take_profit,
            ExitType::StopLoss => self.stop_loss,
            ExitType::RangeTimeout => self.range_timeout,
            ExitType::EndOfHorizon => self.end_of_horizon,
            ExitType::InsufficientData => 0,
        }
    }
}

/// Summary of one (strategy instance, TP, SL) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCell {
    pub strategy_instance_id: StrategyInstanceId,
    pub tp: f64,
    pub sl: f64,
    /// Positions with a simulated exit.
    pub simulated: usize,
    pub insufficient: usize,
    pub total_pnl: f64,
    /// `None` when no position was simulated.
    pub avg_pnl: Option<f64>,
    pub avg_pnl_pct: Option<f64>,
    /// Fraction of simulated positions with PnL > 0.
    pub win_rate: Option<f64>,
    pub exits: ExitCounts,
    /// simulated / (simulated + insufficient).
    pub coverage: f64,
    pub low_confidence: bool,
}

/// Totally ordered f64 for use in map keys.
#[derive(Debug, Clone, Copy)]
struct LevelKey(f64);

impl PartialEq for LevelKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LevelKey {}

impl PartialOrd for LevelKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LevelKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Default)]
struct Accumulator {
    simulated: usize,
    insufficient: usize,
    total_pnl: f64,
    total_pnl_pct: f64,
    winners: usize,
    exits: ExitCounts,
}

impl Accumulator {
    fn push(&mut self, result: &SimulationResult) {
        if !result.is_simulated() {
            self.insufficient += 1;
            return;
        }
        self.simulated += 1;
        self.total_pnl += result.pnl.unwrap_or(0.0);
        self.total_pnl_pct += result.pnl_pct.unwrap_or(0.0);
        if result.is_winner() {
            self.winners += 1;
        }
        self.exits.record(result.exit_type);
    }

    fn finish(
        self,
        strategy_instance_id: StrategyInstanceId,
        tp: f64,
        sl: f64,
        min_positions: usize,
    ) -> AggregatedCell {
        let n = self.simulated;
        let mean = |total: f64| (n > 0).then(|| total / n as f64);
        let attempted = n + self.insufficient;
        AggregatedCell {
            strategy_instance_id,
            tp,
            sl,
            simulated: n,
            insufficient: self.insufficient,
            total_pnl: self.total_pnl,
            avg_pnl: mean(self.total_pnl),
            avg_pnl_pct: mean(self.total_pnl_pct),
            win_rate: mean(self.winners as f64),
            exits: self.exits,
            coverage: if attempted > 0 {
                n as f64 / attempted as f64
            } else {
                0.0
            },
            low_confidence: n < min_positions,
        }
    }
}

/// Group results by (strategy, TP, SL), ordered by strategy id then TP then SL.
///
/// Cells with fewer than `min_positions` simulated positions are flagged
/// `low_confidence` and still emitted.
pub fn aggregate(results: &[SimulationResult], min_positions: usize) -> Vec<AggregatedCell> {
    let mut groups: BTreeMap<(StrategyInstanceId, LevelKey, LevelKey), Accumulator> =
        BTreeMap::new();
    for result in results {
        groups
            .entry((
                result.strategy_instance_id.clone(),
                LevelKey(result.tp),
                LevelKey(result.sl),
            ))
            .or_default()
            .push(result);
    }

    groups
        .into_iter()
        .map(|((strategy, tp, sl), acc)| acc.finish(strategy, tp.0, sl.0, min_positions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangelab_core::domain::{InsufficientData, PositionId};

    fn result(strategy: &str, tp: f64, sl: f64, exit: ExitType, pnl: Option<f64>) -> SimulationResult {
        SimulationResult {
            position_id: PositionId::new("p"),
            strategy_instance_id: StrategyInstanceId::new(strategy),
            tp,
            sl,
            exit_type: exit,
            exit_index: pnl.map(|_| 0),
            exit_timestamp: None,
            pnl,
            pnl_pct: pnl.map(|p| p * 10.0),
            insufficient: pnl
                .is_none()
                .then_some(InsufficientData::MissingFeeData),
        }
    }

    #[test]
    fn groups_are_ordered_by_strategy_then_levels() {
        let results = vec![
            result("b", 5.0, 2.0, ExitType::TakeProfit, Some(0.5)),
            result("a", 10.0, 2.0, ExitType::TakeProfit, Some(1.0)),
            result("a", 5.0, 3.0, ExitType::StopLoss, Some(-0.3)),
            result("a", 5.0, 2.0, ExitType::StopLoss, Some(-0.2)),
        ];
        let cells = aggregate(&results, 1);
        let keys: Vec<(&str, f64, f64)> = cells
            .iter()
            .map(|c| (c.strategy_instance_id.as_str(), c.tp, c.sl))
            .collect();
        assert_eq!(
            keys,
            vec![("a", 5.0, 2.0), ("a", 5.0, 3.0), ("a", 10.0, 2.0), ("b", 5.0, 2.0)]
        );
    }

    #[test]
    fn statistics_exclude_insufficient_results() {
        let results = vec![
            result("a", 5.0, 2.0, ExitType::TakeProfit, Some(0.5)),
            result("a", 5.0, 2.0, ExitType::StopLoss, Some(-0.2)),
            result("a", 5.0, 2.0, ExitType::EndOfHorizon, Some(0.3)),
            result("a", 5.0, 2.0, ExitType::InsufficientData, None),
        ];
        let cell = &aggregate(&results, 2)[0];
        assert_eq!(cell.simulated, 3);
        assert_eq!(cell.insufficient, 1);
        assert!((cell.total_pnl - 0.6).abs() < 1e-12);
        assert!((cell.avg_pnl.unwrap() - 0.2).abs() < 1e-12);
        assert!((cell.avg_pnl_pct.unwrap() - 2.0).abs() < 1e-12);
        assert!((cell.win_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(cell.exits.take_profit, 1);
        assert_eq!(cell.exits.stop_loss, 1);
        assert_eq!(cell.exits.end_of_horizon, 1);
        assert!((cell.coverage - 0.75).abs() < 1e-12);
        assert!(!cell.low_confidence);
    }

    #[test]
    fn sparse_cells_are_flagged_not_dropped() {
        let results = vec![result("a", 5.0, 2.0, ExitType::TakeProfit, Some(0.5))];
        let cells = aggregate(&results, 5);
        assert_eq!(cells.len(), 1);
        assert!(cells[0].low_confidence);
    }

    #[test]
    fn all_insufficient_cell_has_no_averages() {
        let results = vec![result("a", 5.0, 2.0, ExitType::InsufficientData, None)];
        let cell = &aggregate(&results, 1)[0];
        assert_eq!(cell.simulated, 0);
        assert_eq!(cell.avg_pnl, None);
        assert_eq!(cell.win_rate, None);
        assert_eq!(cell.coverage, 0.0);
        assert!(cell.low_confidence);
    }

    #[test]
    fn empty_input_yields_no_cells() {
        assert!(aggregate(&[], 3).is_empty());
    }
}
