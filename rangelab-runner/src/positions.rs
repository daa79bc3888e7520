//! Position loading — CSV rows into a keyed position table.
//!
//! Rows are keyed by `position_id` with last-writer-wins: a later row with the
//! same id replaces the earlier one in place, so table order is the order in
//! which ids first appeared. Rows that cannot be parsed or fail position
//! validation are rejected, logged, and counted.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use rangelab_core::domain::{
    CloseReason, Distribution, FeeHistory, LiquidityShape, OutOfRangeRule, Position, PositionError,
    PositionId, StrategyInstanceId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open positions file '{path}': {message}")]
    Open { path: String, message: String },

    #[error("failed to read positions header: {0}")]
    Header(String),
}

/// One row of the positions CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRow {
    pub position_id: String,
    pub strategy_instance_id: String,
    pub pool: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub entry_price: f64,
    pub capital: f64,
    pub distribution: String,
    pub bin_count: u32,
    pub bin_step_bps: f64,
    #[serde(default)]
    pub close_reason: String,
    pub total_fees: Option<f64>,
    pub volume_exposure: Option<f64>,
    pub oor_grace_minutes: f64,
    pub oor_deviation_pct: f64,
}

impl PositionRow {
    /// Build and validate the position.
    pub fn into_position(self) -> Result<Position, PositionError> {
        let distribution: Distribution = self.distribution.parse()?;
        let position = Position {
            id: PositionId::new(self.position_id),
            strategy_instance_id: StrategyInstanceId::new(self.strategy_instance_id),
            pool: self.pool,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
            entry_price: self.entry_price,
            capital: self.capital,
            shape: LiquidityShape {
                distribution,
                bin_count: self.bin_count,
                bin_step_bps: self.bin_step_bps,
            },
            close_reason: CloseReason::parse(&self.close_reason),
            fee_history: FeeHistory {
                total_fees: self.total_fees,
                volume_exposure: self.volume_exposure,
            },
            out_of_range: OutOfRangeRule::try_from_minutes(
                self.oor_grace_minutes,
                self.oor_deviation_pct,
            )?,
        };
        position.validate()?;
        Ok(position)
    }
}

/// A row that did not make it into the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub reason: String,
}

/// Positions keyed by id, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PositionTable {
    positions: Vec<Position>,
    index: HashMap<PositionId, usize>,
    superseded: usize,
    rejected: Vec<RejectedRow>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the replaced position, if any.
    pub fn upsert(&mut self, position: Position) -> Option<Position> {
        match self.index.get(&position.id) {
            Some(&slot) => {
                self.superseded += 1;
                warn!(position_id = %position.id, "position superseded by later row");
                Some(std::mem::replace(&mut self.positions[slot], position))
            }
            None => {
                self.index.insert(position.id.clone(), self.positions.len());
                self.positions.push(position);
                None
            }
        }
    }

    pub fn reject(&mut self, row: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(row, %reason, "rejected position row");
        self.rejected.push(RejectedRow { row, reason });
    }

    pub fn get(&self, id: &PositionId) -> Option<&Position> {
        self.index.get(id).map(|&slot| &self.positions[slot])
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn into_positions(self) -> Vec<Position> {
        self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Rows replaced by a later row with the same id.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }
}

impl FromIterator<Position> for PositionTable {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        let mut table = Self::new();
        for position in iter {
            table.upsert(position);
        }
        table
    }
}

/// Load positions from a CSV file.
pub fn load_positions_csv(path: &Path) -> Result<PositionTable, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Open {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let table = read_positions(file)?;
    info!(
        path = %path.display(),
        loaded = table.len(),
        superseded = table.superseded(),
        rejected = table.rejected().len(),
        "loaded positions"
    );
    Ok(table)
}

/// Read positions CSV from any reader.
pub fn read_positions<R: Read>(reader: R) -> Result<PositionTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    reader
        .headers()
        .map_err(|e| LoadError::Header(e.to_string()))?;

    let mut table = PositionTable::new();
    for (i, record) in reader.deserialize::<PositionRow>().enumerate() {
        let row = i + 1;
        match record {
            Ok(parsed) => match parsed.into_position() {
                Ok(position) => {
                    table.upsert(position);
                }
                Err(e) => table.reject(row, e.to_string()),
            },
            Err(e) => table.reject(row, e.to_string()),
        }
    }
    Ok(table)
}
