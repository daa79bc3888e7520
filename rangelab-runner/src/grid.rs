//! Range grid simulator — every TP/SL cell for one position.
//!
//! The valuation timeline is built once per position and then replayed once
//! per cell in TP-major, SL-minor order. Ineligible positions yield one
//! insufficient-data result per cell so coverage can be reported.

use rangelab_core::domain::{InsufficientData, Position, Sample, SimulationResult};
use rangelab_core::engine::{
    analyze_peaks, ExitStateMachine, ExitThresholds, PeakAnalysis, ValuationTimeline,
};
use rangelab_core::fees::{FeeCalibration, FeeCurveTable};
use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

/// Everything simulated for one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRun {
    pub results: Vec<SimulationResult>,
    pub peaks: Option<PeakAnalysis>,
    /// Set when the position could not be simulated.
    pub insufficient: Option<InsufficientData>,
}

#[derive(Debug, Clone)]
pub struct RangeGridSimulator {
    tp_levels: Vec<f64>,
    sl_levels: Vec<f64>,
    fee_curves: FeeCurveTable,
    significance_threshold: f64,
}

impl RangeGridSimulator {
    pub fn new(tp_levels: Vec<f64>, sl_levels: Vec<f64>, fee_curves: FeeCurveTable) -> Self {
        Self {
            tp_levels,
            sl_levels,
            fee_curves,
            significance_threshold: 0.0,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.grid.tp_levels.clone(),
            config.grid.sl_levels.clone(),
            config.fee_curve.clone(),
        )
        .with_significance_threshold(config.analysis.significance_threshold)
    }

    pub fn with_significance_threshold(mut self, threshold: f64) -> Self {
        self.significance_threshold = threshold;
        self
    }

    pub fn cell_count(&self) -> usize {
        self.tp_levels.len() * self.sl_levels.len()
    }

    fn cells(&self) -> impl Iterator<Item = ExitThresholds> + '_ {
        self.tp_levels.iter().flat_map(move |&tp| {
            self.sl_levels
                .iter()
                .map(move |&sl| ExitThresholds::new(tp, sl))
        })
    }

    /// One result per cell for `position` over `samples`.
    pub fn simulate(&self, position: &Position, samples: &[Sample]) -> Vec<SimulationResult> {
        self.run_position(position, samples).results
    }

    /// Cell results plus peak analysis.
    pub fn run_position(&self, position: &Position, samples: &[Sample]) -> PositionRun {
        let timeline = FeeCalibration::from_history(&position.fee_history).and_then(|cal| {
            ValuationTimeline::build(position, samples, cal, &self.fee_curves)
        });

        match timeline {
            Ok(timeline) => PositionRun {
                results: self.replay(position, &timeline),
                peaks: Some(analyze_peaks(
                    position,
                    &timeline,
                    self.significance_threshold,
                )),
                insufficient: None,
            },
            Err(reason) => self.insufficient(position, reason),
        }
    }

    /// Replay a prebuilt timeline across the grid.
    pub fn replay(&self, position: &Position, timeline: &ValuationTimeline) -> Vec<SimulationResult> {
        let grace = position.out_of_range.grace_period();
        self.cells()
            .map(|cell| ExitStateMachine::run(timeline, cell, grace).into_result(position, cell))
            .collect()
    }

    /// One insufficient-data result per cell.
    pub fn insufficient(&self, position: &Position, reason: InsufficientData) -> PositionRun {
        PositionRun {
            results: self
                .cells()
                .map(|cell| {
                    SimulationResult::insufficient(
                        position,
                        cell.take_profit_pct,
                        cell.stop_loss_pct,
                        reason,
                    )
                })
                .collect(),
            peaks: None,
            insufficient: Some(reason),
        }
    }
}
