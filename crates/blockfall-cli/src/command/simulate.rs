use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use blockfall_engine::{
    PieceSeed, SessionState, ShapeCategory, Simulation, SimulationConfig, SimulationStats,
};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng};
use serde::Serialize;
use tracing::info;

use super::shapes::parse_category;
use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct SimulateArg {
    /// Seed for piece generation and input; random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Simulation configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Shape catalog JSON file (defaults to the embedded catalog)
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Override the enabled shape categories
    #[arg(long = "category", value_parser = parse_category)]
    categories: Vec<ShapeCategory>,
    /// Maximum number of input steps
    #[arg(long, default_value_t = 1000)]
    steps: usize,
    /// Simulated milliseconds between two inputs
    #[arg(long, default_value_t = 200)]
    step_ms: u64,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    seed: u64,
    steps: usize,
    elapsed_ms: u128,
    state: SessionState,
    level: usize,
    stats: SimulationStats,
    upcoming: Vec<u16>,
    board: Vec<String>,
}

pub(crate) fn run(arg: &SimulateArg) -> anyhow::Result<()> {
    let SimulateArg {
        seed,
        config,
        catalog,
        categories,
        steps,
        step_ms,
        output,
    } = arg;

    let mut config: SimulationConfig = match config {
        Some(path) => util::read_json_file("simulation config", path)?,
        None => SimulationConfig::default(),
    };
    if !categories.is_empty() {
        config.enabled_categories.clone_from(categories);
    }
    let catalog = util::load_catalog(catalog.as_deref())?;
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, "starting simulation");

    let motions = config.valid_motions.clone();
    let mut sim = Simulation::with_grid_board(config, catalog, PieceSeed::from_u64(seed))
        .context("Invalid simulation configuration")?;
    sim.start().context("Failed to spawn the first piece")?;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut taken = 0;
    for _ in 0..*steps {
        if sim.state().is_game_over() {
            break;
        }
        // idle about half of the time so gravity gets to act
        if rng.random_bool(0.5) {
            let motion = motions[rng.random_range(0..motions.len())];
            sim.handle_input(motion);
        }
        sim.advance(Duration::from_millis(*step_ms));
        taken += 1;
    }

    let overlay: Vec<_> = sim
        .active_piece()
        .map(|p| p.cells().collect())
        .unwrap_or_default();
    let report = SimulationReport {
        seed,
        steps: taken,
        elapsed_ms: sim.now().as_millis(),
        state: sim.state(),
        level: sim.stats().level(),
        stats: sim.stats().clone(),
        upcoming: sim.factory().queued().map(|p| p.shape().get()).collect(),
        board: sim.board().render(&overlay),
    };
    info!(
        score = report.stats.score(),
        level = report.level,
        pieces = report.stats.completed_pieces(),
        "simulation finished"
    );
    Output::save_json(&report, output.clone())
}

