//! End-to-end run: batch simulation, aggregation, recommendation, manifest.

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Utc};
use rangelab_core::data::TimelineProvider;
use rangelab_core::domain::SimulationResult;
use rangelab_core::engine::PeakAnalysis;
use serde::{Deserialize, Serialize};

use crate::aggregation::{aggregate, AggregatedCell};
use crate::batch::{BatchError, BatchRunner, BatchSummary};
use crate::config::SimulationConfig;
use crate::positions::PositionTable;
use crate::recommend::{recommend, Recommendation};

/// Current artifact schema version. Bump on incompatible changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Run metadata persisted as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub config_hash: String,
    pub provider: String,
    pub synthetic: bool,
    pub positions_loaded: usize,
    pub positions_superseded: usize,
    pub positions_rejected: usize,
    pub summary: BatchSummary,
    pub created_at: DateTime<Utc>,
}

/// Everything a run produces, ready for export.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub config: SimulationConfig,
    pub manifest: RunManifest,
    pub results: Vec<SimulationResult>,
    pub peaks: Vec<PeakAnalysis>,
    pub cells: Vec<AggregatedCell>,
    pub recommendations: Vec<Recommendation>,
}

/// Simulate every position in `table` and summarize.
pub fn run_pipeline(
    config: &SimulationConfig,
    table: &PositionTable,
    provider: &dyn TimelineProvider,
    cancel: Option<&AtomicBool>,
) -> Result<RunArtifacts, BatchError> {
    let config = config.clone().validated()?;

    let mut runner = BatchRunner::new(&config, provider);
    if let Some(flag) = cancel {
        runner = runner.with_cancel_flag(flag);
    }
    let outcome = runner.run(table.positions())?;

    let cells = aggregate(
        &outcome.results,
        config.analysis.min_positions_for_aggregation,
    );
    let recommendations = recommend(&cells, config.analysis.ranking_metric);

    let manifest = RunManifest {
        schema_version: SCHEMA_VERSION,
        config_hash: config.config_hash()?,
        provider: provider.name().to_string(),
        synthetic: outcome.summary.synthetic,
        positions_loaded: table.len(),
        positions_superseded: table.superseded(),
        positions_rejected: table.rejected().len(),
        summary: outcome.summary,
        created_at: Utc::now(),
    };

    Ok(RunArtifacts {
        config,
        manifest,
        results: outcome.results,
        peaks: outcome.peaks,
        cells,
        recommendations,
    })
}
