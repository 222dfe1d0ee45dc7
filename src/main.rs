//! Lennard-Jones Monte Carlo command-line interface.
//!
//! Loads a YAML configuration (or the built-in argon defaults), builds the
//! initial configuration, spawns the requested group of lockstep participants
//! and runs the Metropolis loop.

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use std::fmt;
use std::fs::File;
use std::thread;
use std::time::SystemTime as StdSystemTime;
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

use ljmc::{CommGroup, McConfig, ParticleSystem, ReducedParameters, RunSummary, SelfComm, Simulation};

/// Parallel Metropolis Monte Carlo of a Lennard-Jones fluid
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file (built-in argon defaults if omitted)
    #[arg(short, long)]
    config_file: Option<String>,

    /// Override the number of Monte Carlo steps
    #[arg(long)]
    n_steps: Option<usize>,

    /// Override the number of particles
    #[arg(long)]
    num_particles: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of cooperating participants sharing the energy evaluation
    #[arg(short = 'p', long, default_value_t = 1)]
    ranks: usize,

    /// Write log output to a file instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let duration = StdSystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        let total_seconds = duration.as_secs();
        write!(
            w,
            "{:02}:{:02}:{:02}",
            (total_seconds / 3600) % 24,
            (total_seconds / 60) % 60,
            total_seconds % 60
        )
    }
}

/// Setup log output to file or stdout
fn setup_output(output_path: Option<&String>) {
    match output_path {
        Some(path) => {
            if let Ok(log) = File::create(path) {
                let file_layer = layer()
                    .with_writer(log)
                    .with_timer(SecondPrecisionTimer)
                    .with_ansi(false);
                Registry::default().with(file_layer).init();
            } else {
                eprintln!("Could not create output file: {}", path);
            }
        }
        None => {
            let stdout_layer = layer()
                .with_writer(std::io::stdout)
                .with_timer(SecondPrecisionTimer)
                .with_ansi(true);
            Registry::default().with(stdout_layer).init();
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    setup_output(args.output.as_ref());

    if args.ranks == 0 {
        return Err(eyre!("at least one participant is required"));
    }

    let mut config = match &args.config_file {
        Some(path) => {
            info!("Reading configuration from: {}", path);
            McConfig::from_file(path)?
        }
        None => {
            info!("No configuration file given, using argon defaults");
            McConfig::default()
        }
    };

    // Command-line overrides take precedence over the file.
    if let Some(n_steps) = args.n_steps {
        config.n_steps = n_steps;
    }
    if let Some(num_particles) = args.num_particles {
        config.num_particles = num_particles;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate()?;

    let params = config.reduced();
    info!(
        "N = {}, T* = {:.6}, L = {:.6}, cutoff = {:.2}, steps = {}, ranks = {}",
        params.num_particles,
        params.reduced_temperature,
        params.box_length,
        params.cutoff,
        params.n_steps,
        args.ranks
    );

    let system = config.build_system(&params)?;
    let summary = run_group(args.ranks, params, system, config.seed);

    info!(
        "Final reduced energy per particle: {:.8}",
        summary.final_reduced_energy
    );
    summary.log();
    Ok(())
}

/// Run the simulation on `ranks` lockstep participants, returning the
/// coordinator's summary.
fn run_group(
    ranks: usize,
    params: ReducedParameters,
    system: ParticleSystem,
    seed: u64,
) -> RunSummary {
    if ranks == 1 {
        return Simulation::new(params, Some(system), seed, SelfComm).run();
    }

    let mut comms = CommGroup::new(ranks);
    let root_comm = comms.remove(0);

    thread::scope(|s| {
        for comm in comms {
            let replica_params = params.clone();
            s.spawn(move || {
                Simulation::new(replica_params, None, seed, comm).run();
            });
        }
        Simulation::new(params, Some(system), seed, root_comm).run()
    })
}
