//! Reporting and export — JSON, CSV, and Markdown artifact generation.
//!
//! A run directory holds:
//! - `detailed.csv`: one row per (position, TP, SL)
//! - `aggregated.csv`: one row per (strategy, TP, SL)
//! - `peaks.csv`: held and horizon peaks per simulated position
//! - `recommendations.csv`: best cell per strategy
//! - `manifest.json`: schema version, config hash, coverage counts
//! - `report.md`: human-readable summary
//!
//! Column order is fixed. The manifest carries `schema_version`; unknown
//! versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rangelab_core::domain::SimulationResult;
use rangelab_core::engine::{Peak, PeakAnalysis, PeakWindow};

use crate::aggregation::AggregatedCell;
use crate::pipeline::{RunArtifacts, RunManifest, SCHEMA_VERSION};
use crate::recommend::{rank_cells, Recommendation};

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

fn ts(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: position_id, strategy_instance_id, tp, sl, exit_type,
/// exit_timestamp, pnl, pnl_pct, insufficient_reason
pub fn export_detailed_csv(results: &[SimulationResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "position_id",
        "strategy_instance_id",
        "tp",
        "sl",
        "exit_type",
        "exit_timestamp",
        "pnl",
        "pnl_pct",
        "insufficient_reason",
    ])?;

    for r in results {
        wtr.write_record([
            r.position_id.as_str(),
            r.strategy_instance_id.as_str(),
            &r.tp.to_string(),
            &r.sl.to_string(),
            r.exit_type.as_str(),
            &ts(r.exit_timestamp),
            &opt(r.pnl),
            &opt(r.pnl_pct),
            &r.insufficient.map(|i| i.to_string()).unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

pub fn export_aggregated_csv(cells: &[AggregatedCell]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "strategy_instance_id",
        "tp",
        "sl",
        "simulated",
        "insufficient",
        "total_pnl",
        "avg_pnl",
        "avg_pnl_pct",
        "win_rate",
        "take_profit",
        "stop_loss",
        "range_timeout",
        "end_of_horizon",
        "coverage",
        "low_confidence",
    ])?;

    for c in cells {
        wtr.write_record([
            c.strategy_instance_id.as_str(),
            &c.tp.to_string(),
            &c.sl.to_string(),
            &c.simulated.to_string(),
            &c.insufficient.to_string(),
            &format!("{:.6}", c.total_pnl),
            &opt(c.avg_pnl),
            &opt(c.avg_pnl_pct),
            &opt(c.win_rate),
            &c.exits.take_profit.to_string(),
            &c.exits.stop_loss.to_string(),
            &c.exits.range_timeout.to_string(),
            &c.exits.end_of_horizon.to_string(),
            &format!("{:.4}", c.coverage),
            &c.low_confidence.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Two rows per position: the held window and the full horizon.
pub fn export_peaks_csv(peaks: &[PeakAnalysis]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "position_id",
        "strategy_instance_id",
        "window",
        "max_gain_pct",
        "max_gain_at",
        "max_gain_significant",
        "max_drawdown_pct",
        "max_drawdown_at",
        "max_drawdown_significant",
        "final_pct",
    ])?;

    fn cols(peak: Option<Peak>) -> [String; 3] {
        match peak {
            Some(p) => [
                format!("{:.6}", p.pct),
                p.timestamp.to_rfc3339(),
                p.significant.to_string(),
            ],
            None => [String::new(), String::new(), "false".to_string()],
        }
    }

    for a in peaks {
        for (name, window) in [("held", &a.held), ("horizon", &a.horizon)] {
            let PeakWindow {
                max_gain,
                max_drawdown,
            } = *window;
            let [gain, gain_at, gain_sig] = cols(max_gain);
            let [dd, dd_at, dd_sig] = cols(max_drawdown);
            wtr.write_record([
                a.position_id.as_str(),
                a.strategy_instance_id.as_str(),
                name,
                &gain,
                &gain_at,
                &gain_sig,
                &dd,
                &dd_at,
                &dd_sig,
                &opt(a.final_pct),
            ])?;
        }
    }
    finish(wtr)
}

pub fn export_recommendations_csv(recommendations: &[Recommendation]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "strategy_instance_id",
        "tp",
        "sl",
        "metric",
        "score",
        "simulated",
        "coverage",
        "low_confidence",
    ])?;
    for r in recommendations {
        wtr.write_record([
            r.strategy_instance_id.as_str(),
            &r.tp.to_string(),
            &r.sl.to_string(),
            r.metric.as_str(),
            &format!("{:.6}", r.score),
            &r.simulated.to_string(),
            &format!("{:.4}", r.coverage),
            &r.low_confidence.to_string(),
        ])?;
    }
    finish(wtr)
}

// ─── JSON manifest ──────────────────────────────────────────────────

pub fn export_manifest_json(manifest: &RunManifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize run manifest")
}

/// Parse a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<RunManifest> {
    let manifest: RunManifest =
        serde_json::from_str(json).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the full artifact set into `output_dir`, creating it if needed.
pub fn save_artifacts(artifacts: &RunArtifacts, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let files = [
        ("detailed.csv", export_detailed_csv(&artifacts.results)?),
        ("aggregated.csv", export_aggregated_csv(&artifacts.cells)?),
        ("peaks.csv", export_peaks_csv(&artifacts.peaks)?),
        (
            "recommendations.csv",
            export_recommendations_csv(&artifacts.recommendations)?,
        ),
        ("manifest.json", export_manifest_json(&artifacts.manifest)?),
        ("report.md", generate_report(artifacts)),
    ];
    for (name, body) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(output_dir.to_path_buf())
}

/// Load the manifest from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<RunManifest> {
    let path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

const TOP_CELLS: usize = 5;

pub fn generate_report(artifacts: &RunArtifacts) -> String {
    let m = &artifacts.manifest;
    let s = &m.summary;
    let mut md = String::with_capacity(4096);

    md.push_str("# TP/SL Grid Simulation Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Config Hash | `{}` |\n", m.config_hash));
    md.push_str(&format!("| Timeline Source | {} |\n", m.provider));
    if m.synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    md.push_str(&format!(
        "| Grid | {} TP × {} SL |\n",
        artifacts.config.grid.tp_levels.len(),
        artifacts.config.grid.sl_levels.len()
    ));
    md.push_str(&format!(
        "| Ranking Metric | {} |\n",
        artifacts.config.analysis.ranking_metric
    ));
    md.push('\n');

    md.push_str("## Coverage\n\n");
    md.push_str("| Count | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Positions loaded | {} |\n", m.positions_loaded));
    md.push_str(&format!("| Rows superseded | {} |\n", m.positions_superseded));
    md.push_str(&format!("| Rows rejected | {} |\n", m.positions_rejected));
    md.push_str(&format!("| Positions simulated | {} |\n", s.positions_simulated));
    md.push_str(&format!(
        "| Positions insufficient | {} |\n",
        s.positions_insufficient
    ));
    if s.cancelled {
        md.push_str(&format!(
            "| Positions not attempted (cancelled) | {} |\n",
            s.positions_not_attempted
        ));
    }
    md.push_str(&format!("| Cells simulated | {} |\n", s.cells_simulated));
    md.push_str(&format!("| Cells insufficient | {} |\n", s.cells_insufficient));
    md.push('\n');

    if !s.insufficient_reasons.is_empty() {
        md.push_str("### Insufficient data\n\n");
        for (reason, count) in &s.insufficient_reasons {
            md.push_str(&format!("- {reason}: {count}\n"));
        }
        md.push('\n');
    }

    md.push_str("## Recommendations\n\n");
    if artifacts.recommendations.is_empty() {
        md.push_str("No strategy had a rankable cell.\n\n");
    } else {
        md.push_str("| Strategy | TP % | SL % | Score | Positions | Coverage | Confidence |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- | --- |\n");
        for r in &artifacts.recommendations {
            md.push_str(&format!(
                "| {} | {} | {} | {:.4} | {} | {:.0}% | {} |\n",
                r.strategy_instance_id,
                r.tp,
                r.sl,
                r.score,
                r.simulated,
                r.coverage * 100.0,
                if r.low_confidence { "low" } else { "ok" }
            ));
        }
        md.push('\n');
    }

    let metric = artifacts.config.analysis.ranking_metric;
    for r in &artifacts.recommendations {
        md.push_str(&format!("### {}\n\n", r.strategy_instance_id));
        md.push_str("| TP % | SL % | Avg PnL | Avg PnL % | Win Rate | TP/SL/OOR/EOH |\n");
        md.push_str("| --- | --- | --- | --- | --- | --- |\n");
        for (cell, _) in rank_cells(&artifacts.cells, &r.strategy_instance_id, metric)
            .into_iter()
            .take(TOP_CELLS)
        {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {}/{}/{}/{} |\n",
                cell.tp,
                cell.sl,
                fmt_opt(cell.avg_pnl, 4),
                fmt_opt(cell.avg_pnl_pct, 2),
                fmt_opt(cell.win_rate.map(|w| w * 100.0), 1),
                cell.exits.take_profit,
                cell.exits.stop_loss,
                cell.exits.range_timeout,
                cell.exits.end_of_horizon,
            ));
        }
        md.push('\n');
    }

    md
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:.precision$}"),
        None => "–".to_string(),
    }
}
