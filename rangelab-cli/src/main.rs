//! RangeLab CLI — TP/SL grid simulation over historical LP positions.
//!
//! Commands:
//! - `run` — simulate every position across the configured grid and save artifacts
//! - `check-config` — validate a TOML config and print its hash
//! - `default-config` — print the default config as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use rangelab_core::data::{SyntheticTimelines, TimelineProvider};
use rangelab_runner::{
    load_positions_csv, run_pipeline, save_artifacts, CsvTimelineProvider, RunArtifacts,
    SimulationConfig,
};

#[derive(Parser)]
#[command(
    name = "rangelab",
    about = "RangeLab CLI — take-profit / stop-loss grid simulation for LP positions"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate all positions across the TP × SL grid.
    Run {
        /// Positions CSV.
        #[arg(long)]
        positions: PathBuf,

        /// Directory of per-pool timeline CSVs.
        #[arg(long, required_unless_present = "synthetic")]
        timelines: Option<PathBuf>,

        /// TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output: PathBuf,

        /// Disable the rayon pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Use seeded synthetic timelines instead of real data.
        #[arg(long, value_name = "SEED", conflicts_with = "timelines")]
        synthetic: Option<u64>,
    },
    /// Validate a config file and print its hash.
    CheckConfig {
        /// TOML config file.
        config: PathBuf,
    },
    /// Print the default config as TOML.
    DefaultConfig,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            positions,
            timelines,
            config,
            output,
            sequential,
            synthetic,
        } => run_cmd(
            &positions,
            timelines.as_deref(),
            config.as_deref(),
            &output,
            sequential,
            synthetic,
        ),
        Commands::CheckConfig { config } => check_config_cmd(&config),
        Commands::DefaultConfig => {
            print!("{}", SimulationConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => SimulationConfig::from_toml_file(path)
            .with_context(|| format!("invalid config {}", path.display())),
        None => Ok(SimulationConfig::default()),
    }
}

fn run_cmd(
    positions_path: &Path,
    timelines: Option<&Path>,
    config_path: Option<&Path>,
    output: &Path,
    sequential: bool,
    synthetic: Option<u64>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if sequential {
        config.execution.parallel = false;
    }

    let table = load_positions_csv(positions_path)?;
    if table.is_empty() {
        bail!(
            "no valid positions in {} ({} rows rejected)",
            positions_path.display(),
            table.rejected().len()
        );
    }

    let provider: Box<dyn TimelineProvider> = match (synthetic, timelines) {
        (Some(seed), _) => Box::new(SyntheticTimelines::new(seed)),
        (None, Some(dir)) => Box::new(CsvTimelineProvider::new(dir)),
        (None, None) => bail!("one of --timelines or --synthetic is required"),
    };

    let artifacts = run_pipeline(&config, &table, provider.as_ref(), None)?;
    print_summary(&artifacts);

    let run_dir = save_artifacts(&artifacts, output)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn check_config_cmd(path: &Path) -> Result<()> {
    let config = load_config(Some(path))?.validated()?;
    println!("Config OK: {}", path.display());
    println!(
        "  grid:  {} TP × {} SL = {} cells",
        config.grid.tp_levels.len(),
        config.grid.sl_levels.len(),
        config.grid.cell_count()
    );
    println!("  rank:  {}", config.analysis.ranking_metric);
    println!("  hash:  {}", config.config_hash()?);
    Ok(())
}

fn print_summary(artifacts: &RunArtifacts) {
    let m = &artifacts.manifest;
    let s = &m.summary;

    println!();
    if m.synthetic {
        println!("*** SYNTHETIC DATA — results are not based on real market history ***");
    }
    println!("=== Grid Simulation ===");
    println!(
        "Positions:  {} simulated, {} insufficient, {} not attempted",
        s.positions_simulated, s.positions_insufficient, s.positions_not_attempted
    );
    println!(
        "Loading:    {} loaded, {} superseded, {} rejected",
        m.positions_loaded, m.positions_superseded, m.positions_rejected
    );
    println!(
        "Cells:      {} per position, {} simulated, {} insufficient",
        s.cells_per_position, s.cells_simulated, s.cells_insufficient
    );
    for (reason, count) in &s.insufficient_reasons {
        println!("  {count:>5} × {reason}");
    }
    if s.cancelled {
        println!("Run was cancelled before all positions were attempted.");
    }

    if artifacts.recommendations.is_empty() {
        println!("No recommendations.");
        return;
    }
    println!();
    println!(
        "{:<24} {:>8} {:>8} {:>12} {:>6} {:>6}",
        "strategy", "TP %", "SL %", "score", "n", "conf"
    );
    for r in &artifacts.recommendations {
        println!(
            "{:<24} {:>8} {:>8} {:>12.4} {:>6} {:>6}",
            r.strategy_instance_id.as_str(),
            r.tp,
            r.sl,
            r.score,
            r.simulated,
            if r.low_confidence { "low" } else { "ok" }
        );
    }
}
