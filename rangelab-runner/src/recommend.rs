//! Strategy recommendation — best TP/SL cell per strategy instance.
//!
//! Each strategy's cells are scored by a selectable metric. Confident cells
//! always beat low-confidence ones; a low-confidence cell is recommended only
//! when the strategy has nothing else, and the flag travels with it.
//! Non-finite scores are never recommended.

use std::collections::BTreeMap;
use std::fmt;

use rangelab_core::domain::StrategyInstanceId;
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregatedCell;

/// Which cell statistic to rank by. Higher is better for all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    AvgPnl,
    TotalPnl,
    WinRate,
    AvgPnlPct,
}

impl RankingMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AvgPnl => "avg_pnl",
            Self::TotalPnl => "total_pnl",
            Self::WinRate => "win_rate",
            Self::AvgPnlPct => "avg_pnl_pct",
        }
    }

    /// Score for `cell`, or `None` when the cell has nothing to rank.
    pub fn extract(&self, cell: &AggregatedCell) -> Option<f64> {
        let score = match self {
            Self::AvgPnl => cell.avg_pnl?,
            Self::TotalPnl if cell.simulated > 0 => cell.total_pnl,
            Self::TotalPnl => return None,
            Self::WinRate => cell.win_rate?,
            Self::AvgPnlPct => cell.avg_pnl_pct?,
        };
        score.is_finite().then_some(score)
    }

    /// Returns true if `a` is better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended cell for one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy_instance_id: StrategyInstanceId,
    pub tp: f64,
    pub sl: f64,
    pub metric: RankingMetric,
    pub score: f64,
    pub simulated: usize,
    pub coverage: f64,
    pub low_confidence: bool,
}

impl Recommendation {
    fn from_cell(cell: &AggregatedCell, metric: RankingMetric, score: f64) -> Self {
        Self {
            strategy_instance_id: cell.strategy_instance_id.clone(),
            tp: cell.tp,
            sl: cell.sl,
            metric,
            score,
            simulated: cell.simulated,
            coverage: cell.coverage,
            low_confidence: cell.low_confidence,
        }
    }
}

/// Best cell per strategy instance, ordered by strategy id.
///
/// Ties keep the first cell in input order, so with cells from
/// [`aggregate`](crate::aggregation::aggregate) the lower TP then lower SL wins.
pub fn recommend(cells: &[AggregatedCell], metric: RankingMetric) -> Vec<Recommendation> {
    let mut best: BTreeMap<&StrategyInstanceId, (&AggregatedCell, f64)> = BTreeMap::new();

    for cell in cells {
        let Some(score) = metric.extract(cell) else {
            continue;
        };
        let replace = match best.get(&cell.strategy_instance_id) {
            None => true,
            Some((current, current_score)) => {
                match (current.low_confidence, cell.low_confidence) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => metric.is_better(score, *current_score),
                }
            }
        };
        if replace {
            best.insert(&cell.strategy_instance_id, (cell, score));
        }
    }

    best.into_values()
        .map(|(cell, score)| Recommendation::from_cell(cell, metric, score))
        .collect()
}

/// All scorable cells of one strategy, best first.
pub fn rank_cells<'a>(
    cells: &'a [AggregatedCell],
    strategy: &StrategyInstanceId,
    metric: RankingMetric,
) -> Vec<(&'a AggregatedCell, f64)> {
    let mut ranked: Vec<(&AggregatedCell, f64)> = cells
        .iter()
        .filter(|c| &c.strategy_instance_id == strategy)
        .filter_map(|c| metric.extract(c).map(|score| (c, score)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
