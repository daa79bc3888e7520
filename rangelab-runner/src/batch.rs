//! Batch runner — fetch, simulate and collect every position.
//!
//! Positions are independent, so the batch may run on the rayon pool or
//! sequentially; either way results come back in input order and are
//! identical. Timelines are fully materialized before a position's grid runs.
//! Cancellation is checked between positions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rangelab_core::data::TimelineProvider;
use rangelab_core::domain::{Position, SimulationResult};
use rangelab_core::engine::PeakAnalysis;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimulationConfig};
use crate::grid::{PositionRun, RangeGridSimulator};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no positions to simulate")]
    NoPositions,
}

/// Counts reported for every completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub positions_total: usize,
    pub positions_simulated: usize,
    pub positions_insufficient: usize,
    /// Never attempted because the batch was cancelled.
    pub positions_not_attempted: usize,
    pub cells_per_position: usize,
    pub cells_simulated: usize,
    pub cells_insufficient: usize,
    /// Insufficient-data positions by reason.
    pub insufficient_reasons: BTreeMap<String, usize>,
    pub cancelled: bool,
    pub synthetic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<SimulationResult>,
    pub peaks: Vec<PeakAnalysis>,
    pub summary: BatchSummary,
}

pub struct BatchRunner<'a> {
    config: &'a SimulationConfig,
    provider: &'a dyn TimelineProvider,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a SimulationConfig, provider: &'a dyn TimelineProvider) -> Self {
        Self {
            config,
            provider,
            cancel: None,
        }
    }

    /// Stop starting new positions once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Simulate every position in `positions`.
    pub fn run(&self, positions: &[Position]) -> Result<BatchOutcome, BatchError> {
        self.config.validate()?;
        if positions.is_empty() {
            return Err(BatchError::NoPositions);
        }

        let simulator = RangeGridSimulator::from_config(self.config);
        info!(
            positions = positions.len(),
            cells = simulator.cell_count(),
            provider = self.provider.name(),
            parallel = self.config.execution.parallel,
            "starting grid simulation"
        );

        let runs: Vec<Option<PositionRun>> = if self.config.execution.parallel {
            positions
                .par_iter()
                .map(|p| self.run_one(&simulator, p))
                .collect()
        } else {
            positions
                .iter()
                .map(|p| self.run_one(&simulator, p))
                .collect()
        };

        let outcome = self.collect(runs, simulator.cell_count());
        let s = &outcome.summary;
        info!(
            simulated = s.positions_simulated,
            insufficient = s.positions_insufficient,
            not_attempted = s.positions_not_attempted,
            cells_simulated = s.cells_simulated,
            cells_insufficient = s.cells_insufficient,
            "grid simulation finished"
        );
        Ok(outcome)
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn run_one(&self, simulator: &RangeGridSimulator, position: &Position) -> Option<PositionRun> {
        if self.cancelled() {
            return None;
        }

        let request = self.config.horizon.request_for(position);
        let run = match self.provider.fetch(&request, &self.config.gaps) {
            Ok(samples) => {
                debug!(position_id = %position.id, samples = samples.len(), "simulating position");
                simulator.run_position(position, &samples)
            }
            Err(e) => {
                warn!(position_id = %position.id, error = %e, "timeline unavailable");
                simulator.insufficient(position, e.insufficient_reason())
            }
        };
        if let Some(reason) = run.insufficient {
            warn!(position_id = %position.id, %reason, "insufficient data");
        }
        Some(run)
    }

    fn collect(&self, runs: Vec<Option<PositionRun>>, cells: usize) -> BatchOutcome {
        let mut summary = BatchSummary {
            positions_total: runs.len(),
            cells_per_position: cells,
            synthetic: self.provider.is_synthetic(),
            ..BatchSummary::default()
        };
        let mut results = Vec::with_capacity(runs.len() * cells);
        let mut peaks = Vec::new();

        for run in runs {
            let Some(run) = run else {
                summary.positions_not_attempted += 1;
                continue;
            };
            match run.insufficient {
                Some(reason) => {
                    summary.positions_insufficient += 1;
                    summary.cells_insufficient += run.results.len();
                    *summary
                        .insufficient_reasons
                        .entry(reason.to_string())
                        .or_default() += 1;
                }
                None => {
                    summary.positions_simulated += 1;
                    summary.cells_simulated += run.results.len();
                }
            }
            results.extend(run.results);
            peaks.extend(run.peaks);
        }
        summary.cancelled = summary.positions_not_attempted > 0;

        BatchOutcome {
            results,
            peaks,
            summary,
        }
    }
}
