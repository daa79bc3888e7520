//! Serializable run configuration (TOML).
//!
//! ```toml
//! [grid]
//! tp_levels = [2.0, 5.0, 10.0]
//! sl_levels = [2.0, 5.0]
//!
//! [horizon]
//! post_close_multiplier = 1.0
//! min_post_close_hours = 1.0
//! max_post_close_hours = 24.0
//!
//! [analysis]
//! significance_threshold = 5.0
//! min_positions_for_aggregation = 5
//! ranking_metric = "avg_pnl"
//!
//! [execution]
//! parallel = true
//!
//! [gaps]
//! decision = "forward_fill"
//! max_interval_minutes = 5
//! ```
//!
//! Every section is optional; missing sections take their defaults.

use std::path::Path;

use rangelab_core::data::{GapPolicy, PostCloseHorizon};
use rangelab_core::fees::{FeeCurveError, FeeCurveTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommend::RankingMetric;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{axis} level list is empty")]
    EmptyLevels { axis: &'static str },

    #[error("{axis} level {value} must be positive and finite")]
    InvalidLevel { axis: &'static str, value: f64 },

    #[error("{axis} level {value} appears more than once")]
    DuplicateLevel { axis: &'static str, value: f64 },

    #[error("horizon {field} must be finite and within 0..={max}, got {value}", max = PostCloseHorizon::MAX_HOURS)]
    InvalidHorizon { field: &'static str, value: f64 },

    #[error("horizon minimum {min}h exceeds maximum {max}h")]
    InvertedHorizon { min: f64, max: f64 },

    #[error("significance threshold must be non-negative and finite, got {0}")]
    InvalidSignificance(f64),

    #[error("gap interval must be positive, got {0} minutes")]
    InvalidGapInterval(i64),

    #[error("invalid fee curve: {0}")]
    FeeCurve(#[from] FeeCurveError),
}

/// TP × SL levels, percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub tp_levels: Vec<f64>,
    pub sl_levels: Vec<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tp_levels: vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0, 15.0],
            sl_levels: vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0],
        }
    }
}

impl GridConfig {
    pub fn cell_count(&self) -> usize {
        self.tp_levels.len() * self.sl_levels.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum peak magnitude, percent, to flag as significant.
    pub significance_threshold: f64,
    /// Cells with fewer simulated positions are flagged low-confidence.
    pub min_positions_for_aggregation: usize,
    pub ranking_metric: RankingMetric,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_threshold: 5.0,
            min_positions_for_aggregation: 5,
            ranking_metric: RankingMetric::AvgPnl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Simulate positions on the rayon pool.
    pub parallel: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Complete configuration for one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub horizon: PostCloseHorizon,
    pub analysis: AnalysisConfig,
    pub execution: ExecutionConfig,
    pub gaps: GapPolicy,
    pub fee_curve: FeeCurveTable,
}

impl SimulationConfig {
    /// Load and validate a TOML config file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validated()
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate, then sort the level lists ascending.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.validate()?;
        self.grid.tp_levels.sort_by(f64::total_cmp);
        self.grid.sl_levels.sort_by(f64::total_cmp);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_levels("tp", &self.grid.tp_levels)?;
        validate_levels("sl", &self.grid.sl_levels)?;

        let h = &self.horizon;
        if !(h.post_close_multiplier.is_finite() && h.post_close_multiplier >= 0.0) {
            return Err(ConfigError::InvalidHorizon {
                field: "post_close_multiplier",
                value: h.post_close_multiplier,
            });
        }
        for (field, value) in [
            ("min_post_close_hours", h.min_post_close_hours),
            ("max_post_close_hours", h.max_post_close_hours),
        ] {
            if !(value.is_finite() && (0.0..=PostCloseHorizon::MAX_HOURS).contains(&value)) {
                return Err(ConfigError::InvalidHorizon { field, value });
            }
        }
        if h.min_post_close_hours > h.max_post_close_hours {
            return Err(ConfigError::InvertedHorizon {
                min: h.min_post_close_hours,
                max: h.max_post_close_hours,
            });
        }

        let sig = self.analysis.significance_threshold;
        if !(sig.is_finite() && sig >= 0.0) {
            return Err(ConfigError::InvalidSignificance(sig));
        }
        if self.gaps.max_interval_minutes <= 0 {
            return Err(ConfigError::InvalidGapInterval(self.gaps.max_interval_minutes));
        }

        self.fee_curve.validate()?;
        Ok(())
    }

    /// Content hash of the configuration, for the run manifest.
    pub fn config_hash(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

fn validate_levels(axis: &'static str, levels: &[f64]) -> Result<(), ConfigError> {
    if levels.is_empty() {
        return Err(ConfigError::EmptyLevels { axis });
    }
    for (i, &value) in levels.iter().enumerate() {
        if !(value.is_finite() && value > 0.0) {
            return Err(ConfigError::InvalidLevel { axis, value });
        }
        if levels[..i].contains(&value) {
            return Err(ConfigError::DuplicateLevel { axis, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangelab_core::data::GapDecision;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = SimulationConfig::from_toml(
            r#"
            [grid]
            tp_levels = [10.0, 2.0, 5.0]
            sl_levels = [3.0]

            [analysis]
            ranking_metric = "win_rate"

            [gaps]
            decision = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(config.grid.tp_levels, vec![2.0, 5.0, 10.0]);
        assert_eq!(config.analysis.ranking_metric, RankingMetric::WinRate);
        assert_eq!(config.analysis.min_positions_for_aggregation, 5);
        assert_eq!(config.gaps.decision, GapDecision::Reject);
        assert_eq!(config.horizon, PostCloseHorizon::default());
    }

    #[test]
    fn empty_levels_rejected() {
        let err = SimulationConfig::from_toml("[grid]\ntp_levels = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyLevels { axis: "tp" }));
    }

    #[test]
    fn non_positive_level_rejected() {
        let err = SimulationConfig::from_toml("[grid]\nsl_levels = [2.0, -1.0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLevel { axis: "sl", .. }));
    }

    #[test]
    fn duplicate_level_rejected() {
        let err = SimulationConfig::from_toml("[grid]\ntp_levels = [2.0, 2.0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateLevel { axis: "tp", .. }));
    }

    #[test]
    fn inverted_horizon_rejected() {
        let err = SimulationConfig::from_toml(
            "[horizon]\nmin_post_close_hours = 10.0\nmax_post_close_hours = 2.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvertedHorizon { .. }));
    }

    #[test]
    fn oversized_horizon_rejected() {
        let err = SimulationConfig::from_toml(
            "[horizon]\nmin_post_close_hours = 1e13\nmax_post_close_hours = 1e13\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidHorizon { field: "min_post_close_hours", .. }
        ));

        let err = SimulationConfig::from_toml("[horizon]\nmax_post_close_hours = 1e6\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidHorizon { field: "max_post_close_hours", .. }
        ));
    }

    #[test]
    fn malformed_fee_curve_rejected() {
        let err = SimulationConfig::from_toml(
            "[fee_curve]\nuniform = { points = [[0.0, 1.0], [0.0, 2.0]] }\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FeeCurve(_)));
    }

    #[test]
    fn config_hash_is_deterministic_and_sensitive() {
        let a = SimulationConfig::default();
        let mut b = SimulationConfig::default();
        assert_eq!(a.config_hash().unwrap(), b.config_hash().unwrap());
        b.grid.tp_levels.push(50.0);
        assert_ne!(a.config_hash().unwrap(), b.config_hash().unwrap());
    }

    #[test]
    fn toml_roundtrip() {
        let config = SimulationConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(SimulationConfig::from_toml(&text).unwrap(), config);
    }
}
