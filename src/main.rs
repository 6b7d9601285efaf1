use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use evo_tank::simulation::params::Params;
use evo_tank::simulation::tank::Tank;

/// Runs the tank headless for a fixed number of ticks.
#[derive(Parser, Debug)]
#[command(name = "evo-tank", version, about = "Headless cell tank simulation")]
struct Cli {
    /// JSON parameter file; missing fields use the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the seed from the parameter file.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 2000)]
    ticks: u64,

    /// Simulated seconds per tick.
    #[arg(long, default_value_t = 0.005)]
    dt: f32,

    /// Log statistics every this many ticks.
    #[arg(long, default_value_t = 200)]
    report_every: u64,

    /// Writes the final snapshot as JSON to this path.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut params = match &cli.config {
        Some(path) => Params::from_json_file(path)
            .with_context(|| format!("loading parameters from {}", path.display()))?,
        None => Params::default(),
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }

    let mut tank = Tank::new(params).context("creating tank")?;
    tank.seed_population().context("seeding tank")?;

    let report_every = cli.report_every.max(1);
    for tick in 1..=cli.ticks {
        tank.tick(cli.dt);
        if tick % report_every == 0 || tick == cli.ticks {
            let stats = tank.stats();
            let stat = |key: &str| stats.get(key).copied().unwrap_or_default();
            info!(
                tick,
                elapsed = tank.elapsed_time(),
                plants = stat("Plants"),
                protozoa = stat("Protozoa"),
                meat = stat("Meat Pellets"),
                max_generation = stat("Max Generation"),
                "progress"
            );
        }
    }

    if let Some(path) = &cli.snapshot {
        tank.snapshot()
            .save_to_file(path)
            .with_context(|| format!("writing snapshot to {}", path.display()))?;
        info!(path = %path.display(), "wrote snapshot");
    }
    Ok(())
}
