//! RangeLab Runner — grid orchestration, aggregation, recommendations, export.
//!
//! This crate builds on `rangelab-core` to provide:
//! - TOML run configuration with validation and a stable hash
//! - Position CSV loading with last-writer-wins upserts
//! - A CSV-backed timeline provider
//! - The TP × SL grid simulator and the parallel batch runner
//! - Per-cell aggregation and per-strategy recommendations
//! - CSV / JSON / Markdown artifact export

pub mod aggregation;
pub mod batch;
pub mod config;
pub mod export;
pub mod grid;
pub mod pipeline;
pub mod positions;
pub mod recommend;
pub mod timeline_csv;

pub use aggregation::{aggregate, AggregatedCell, ExitCounts};
pub use batch::{BatchError, BatchOutcome, BatchRunner, BatchSummary};
pub use config::{AnalysisConfig, ConfigError, ExecutionConfig, GridConfig, SimulationConfig};
pub use export::{generate_report, load_manifest, save_artifacts};
pub use grid::{PositionRun, RangeGridSimulator};
pub use pipeline::{run_pipeline, RunArtifacts, RunManifest, SCHEMA_VERSION};
pub use positions::{load_positions_csv, read_positions, LoadError, PositionTable, RejectedRow};
pub use recommend::{rank_cells, recommend, RankingMetric, Recommendation};
pub use timeline_csv::CsvTimelineProvider;
