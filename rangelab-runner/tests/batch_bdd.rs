//! BDD scenarios for the full grid run: load, simulate, aggregate, recommend.
//!
//! Timelines come from an in-memory provider: a flat pool at 100 where each
//! 5-minute sample carries enough volume to earn 1% of capital in fees.

use std::sync::atomic::AtomicBool;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rangelab_core::data::{InMemoryTimelines, SyntheticTimelines};
use rangelab_core::domain::{ExitType, InsufficientData, PositionId, Sample, StrategyInstanceId};
use rangelab_runner::{
    read_positions, run_pipeline, BatchError, PositionTable, RankingMetric, SimulationConfig,
};

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

const HEADER: &str = "position_id,strategy_instance_id,pool,opened_at,closed_at,entry_price,capital,distribution,bin_count,bin_step_bps,close_reason,total_fees,volume_exposure,oor_grace_minutes,oor_deviation_pct\n";

/// Six fee-earning spot positions and two bid-ask positions with no fee history.
fn positions_csv() -> String {
    let mut text = HEADER.to_string();
    for i in 0..6 {
        text.push_str(&format!(
            "spot-{i},spot-12,SOL-USDC,2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,100,10,spot,12,100,manual,0.1,100,30,10\n"
        ));
    }
    for i in 0..2 {
        text.push_str(&format!(
            "ba-{i},bidask-20,SOL-USDC,2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,100,10,bid_ask,20,100,manual,,,30,10\n"
        ));
    }
    text
}

fn flat_pool() -> InMemoryTimelines {
    InMemoryTimelines::new().with_pool(
        "SOL-USDC",
        (0..=36).map(|i| Sample::flat(t(i * 5), 100.0, 100.0)).collect(),
    )
}

fn config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.grid.tp_levels = vec![1.5, 50.0];
    config.grid.sl_levels = vec![5.0];
    config
}

fn table() -> PositionTable {
    read_positions(positions_csv().as_bytes()).unwrap()
}

#[test]
fn bdd_scenario_fee_income_takes_profit_on_the_tight_cell() {
    // GIVEN six spot positions earning 1% of capital per sample
    let table = table();
    let provider = flat_pool();

    // WHEN the full grid runs
    let artifacts = run_pipeline(&config(), &table, &provider, None).unwrap();

    // THEN every spot position exits the 1.5% TP cell on its second sample
    let tight: Vec<_> = artifacts
        .results
        .iter()
        .filter(|r| r.strategy_instance_id.as_str() == "spot-12" && r.tp == 1.5)
        .collect();
    assert_eq!(tight.len(), 6);
    for r in &tight {
        assert_eq!(r.exit_type, ExitType::TakeProfit);
        assert_eq!(r.exit_index, Some(1));
        assert!(r.pnl_pct.unwrap() >= 1.5 - 1e-9);
    }

    // AND the unreachable 50% cell runs to the end of the horizon
    let wide = artifacts
        .results
        .iter()
        .find(|r| r.position_id == PositionId::new("spot-0") && r.tp == 50.0)
        .unwrap();
    assert_eq!(wide.exit_type, ExitType::EndOfHorizon);
    assert_eq!(wide.exit_timestamp, Some(t(120)));
}

#[test]
fn bdd_scenario_missing_fee_history_is_reported_as_coverage() {
    // GIVEN two bid-ask positions without fee history
    let table = table();
    let provider = flat_pool();

    // WHEN the full grid runs
    let artifacts = run_pipeline(&config(), &table, &provider, None).unwrap();

    // THEN they are counted as insufficient, not dropped
    let summary = &artifacts.manifest.summary;
    assert_eq!(summary.positions_total, 8);
    assert_eq!(summary.positions_simulated, 6);
    assert_eq!(summary.positions_insufficient, 2);
    assert_eq!(
        summary
            .insufficient_reasons
            .get(&InsufficientData::MissingFeeData.to_string()),
        Some(&2)
    );

    // AND their aggregated cells carry zero coverage and no averages
    let ba: Vec<_> = artifacts
        .cells
        .iter()
        .filter(|c| c.strategy_instance_id.as_str() == "bidask-20")
        .collect();
    assert_eq!(ba.len(), 2);
    assert!(ba.iter().all(|c| c.simulated == 0 && c.insufficient == 2));
    assert!(ba.iter().all(|c| c.avg_pnl.is_none() && c.coverage == 0.0));

    // AND no recommendation is made for them
    assert!(artifacts
        .recommendations
        .iter()
        .all(|r| r.strategy_instance_id.as_str() != "bidask-20"));
}

#[test]
fn bdd_scenario_recommendation_prefers_higher_average_pnl() {
    // GIVEN the spot positions and the default avg-PnL ranking
    let table = table();
    let provider = flat_pool();

    // WHEN the full grid runs
    let artifacts = run_pipeline(&config(), &table, &provider, None).unwrap();

    // THEN the cell that keeps earning fees to the horizon is recommended
    assert_eq!(artifacts.recommendations.len(), 1);
    let rec = &artifacts.recommendations[0];
    assert_eq!(rec.strategy_instance_id, StrategyInstanceId::new("spot-12"));
    assert_eq!(rec.tp, 50.0);
    assert_eq!(rec.metric, RankingMetric::AvgPnl);
    assert!(!rec.low_confidence);

    // AND every spot cell is fully covered with a 100% win rate
    for cell in artifacts
        .cells
        .iter()
        .filter(|c| c.strategy_instance_id.as_str() == "spot-12")
    {
        assert_eq!(cell.simulated, 6);
        assert_eq!(cell.coverage, 1.0);
        assert_eq!(cell.win_rate, Some(1.0));
    }
}

#[test]
fn bdd_scenario_small_cohort_is_flagged_low_confidence() {
    // GIVEN a minimum of ten positions per cell
    let mut config = config();
    config.analysis.min_positions_for_aggregation = 10;

    // WHEN the full grid runs over six positions
    let artifacts = run_pipeline(&config, &table(), &flat_pool(), None).unwrap();

    // THEN the cells are still reported but flagged
    let rec = &artifacts.recommendations[0];
    assert!(rec.low_confidence);
    assert!(artifacts
        .cells
        .iter()
        .filter(|c| c.simulated > 0)
        .all(|c| c.low_confidence));
}

#[test]
fn bdd_scenario_manifest_records_config_hash_and_loading() {
    // GIVEN a positions file with one duplicated id and one bad row
    let mut text = positions_csv();
    text.push_str("spot-0,spot-12,SOL-USDC,2024-03-01T00:00:00Z,2024-03-01T01:00:00Z,100,10,spot,12,100,manual,0.1,100,30,10\n");
    text.push_str("bad,spot-12,SOL-USDC,not-a-date,2024-03-01T01:00:00Z,100,10,spot,12,100,manual,0.1,100,30,10\n");
    let table = read_positions(text.as_bytes()).unwrap();

    // WHEN the full grid runs
    let config = config();
    let artifacts = run_pipeline(&config, &table, &flat_pool(), None).unwrap();

    // THEN the manifest carries loading counts and the config hash
    let m = &artifacts.manifest;
    assert_eq!(m.positions_loaded, 8);
    assert_eq!(m.positions_superseded, 1);
    assert_eq!(m.positions_rejected, 1);
    assert_eq!(m.config_hash, config.clone().validated().unwrap().config_hash().unwrap());
    assert_eq!(m.provider, "memory");
    assert!(!m.synthetic);
}

#[test]
fn bdd_scenario_synthetic_runs_are_labelled_and_reproducible() {
    // GIVEN a seeded synthetic provider
    let table = table();
    let provider = SyntheticTimelines::new(42);

    // WHEN the grid runs twice
    let a = run_pipeline(&config(), &table, &provider, None).unwrap();
    let b = run_pipeline(&config(), &table, &provider, None).unwrap();

    // THEN results are identical and the run is marked synthetic
    assert_eq!(a.results, b.results);
    assert!(a.manifest.synthetic);
    assert_eq!(a.manifest.provider, "synthetic");
}

#[test]
fn bdd_scenario_cancelled_run_keeps_partial_counts() {
    // GIVEN a cancel flag raised before the run
    let flag = AtomicBool::new(true);

    // WHEN the full grid runs
    let artifacts = run_pipeline(&config(), &table(), &flat_pool(), Some(&flag)).unwrap();

    // THEN nothing is simulated and the cancellation is reported
    assert!(artifacts.manifest.summary.cancelled);
    assert_eq!(artifacts.manifest.summary.positions_not_attempted, 8);
    assert!(artifacts.results.is_empty());
    assert!(artifacts.recommendations.is_empty());
}

#[test]
fn bdd_scenario_empty_position_table_is_rejected() {
    // GIVEN no positions
    let table = PositionTable::new();

    // WHEN the full grid runs
    let err = run_pipeline(&config(), &table, &flat_pool(), None).unwrap_err();

    // THEN the run fails up front
    assert!(matches!(err, BatchError::NoPositions));
}
