//! CSV-backed timeline provider: one `<pool>.csv` file per pool.
//!
//! Columns: `timestamp,open,high,low,close,volume`, timestamps in RFC 3339.
//! Pool names are mapped to file names by replacing path separators with `-`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rangelab_core::data::{
    clip_to_window, GapPolicy, TimelineError, TimelineProvider, TimelineRequest,
};
use rangelab_core::domain::Sample;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SampleRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct CsvTimelineProvider {
    dir: PathBuf,
}

impl CsvTimelineProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, pool: &str) -> PathBuf {
        let file = pool.replace(['/', '\\'], "-");
        self.dir.join(format!("{file}.csv"))
    }

    /// Every sample in the pool's file.
    pub fn read_pool(&self, pool: &str) -> Result<Vec<Sample>, TimelineError> {
        let path = self.path_for(pool);
        if !path.exists() {
            return Err(TimelineError::PoolNotFound {
                pool: pool.to_string(),
            });
        }
        let source_name = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| TimelineError::Read {
                source_name: source_name.clone(),
                message: e.to_string(),
            })?;

        let mut samples = Vec::new();
        for (i, record) in reader.deserialize::<SampleRow>().enumerate() {
            let row = record.map_err(|e| TimelineError::Parse {
                source_name: source_name.clone(),
                row: i + 1,
                message: e.to_string(),
            })?;
            samples.push(Sample {
                timestamp: row.timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        debug!(pool, samples = samples.len(), "read pool timeline");
        Ok(samples)
    }
}

impl TimelineProvider for CsvTimelineProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        request: &TimelineRequest,
        gaps: &GapPolicy,
    ) -> Result<Vec<Sample>, TimelineError> {
        let samples = self.read_pool(&request.pool)?;
        let clipped = clip_to_window(&samples, request);
        if clipped.is_empty() {
            return Err(TimelineError::EmptyWindow {
                pool: request.pool.clone(),
                start: request.start,
                end: request.end,
            });
        }
        gaps.apply(clipped)
    }
}
