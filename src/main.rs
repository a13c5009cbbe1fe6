//! Critical-temperature scan for the graph-coupled Ising model
//! (see `Cli` below for all run parameters).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use csv::WriterBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use spinscan::config::SweepConfig;
use spinscan::critical::{self, CriticalPoint};
use spinscan::graph::{CouplingGraph, LatticeKind};
use spinscan::spin::{SpinInit, SpinSystem};
use spinscan::sweep::{
    generate_adaptive_schedule, generate_schedule, CancelToken, SweepEngine, SweepOutcome,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LatticeArg {
    Square,
    Triangular,
    Hexagonal,
}

impl From<LatticeArg> for LatticeKind {
    fn from(arg: LatticeArg) -> Self {
        match arg {
            LatticeArg::Square => LatticeKind::Square,
            LatticeArg::Triangular => LatticeKind::Triangular,
            LatticeArg::Hexagonal => LatticeKind::Hexagonal,
        }
    }
}

#[derive(Parser)]
#[command(about = "Monte Carlo critical-temperature scan for graph-coupled Ising systems")]
struct Cli {
    /// Lattice kind to generate (ignored when --edges is given)
    #[arg(long, value_enum, default_value = "square")]
    lattice: LatticeArg,

    /// Linear lattice size
    #[arg(long, default_value_t = 16)]
    size: usize,

    /// Edge-list file (`row,col,weight` per line, 1-based) instead of a lattice
    #[arg(long)]
    edges: Option<PathBuf>,

    /// Lower end of the temperature range
    #[arg(long, default_value_t = 1.0)]
    t_min: f64,

    /// Upper end of the temperature range
    #[arg(long, default_value_t = 3.5)]
    t_max: f64,

    /// Temperature points per stage
    #[arg(long, default_value_t = 24)]
    points: usize,

    /// Equilibration sweeps per temperature
    #[arg(long, default_value_t = 2000)]
    equil: usize,

    /// Sweeps between consecutive measurements
    #[arg(long, default_value_t = 200)]
    measure: usize,

    /// Measurements per temperature
    #[arg(long, default_value_t = 20)]
    trials: usize,

    /// Coupling constant J (negative favors alignment)
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    coupling: f64,

    /// RNG seed; omit for an OS-seeded run
    #[arg(long)]
    seed: Option<u64>,

    /// Refine around the first estimate with an adaptive second stage
    #[arg(long)]
    two_stage: bool,

    /// Output file for the measurement table
    #[arg(long, default_value = "tc_scan.csv")]
    output: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let (graph, theory) = if let Some(path) = &cli.edges {
        let text = fs::read_to_string(path)?;
        let parsed = CouplingGraph::parse(&text)?;
        for w in &parsed.warnings {
            eprintln!("warning: {w}");
        }
        (parsed.graph, None)
    } else {
        let kind = LatticeKind::from(cli.lattice);
        let graph = CouplingGraph::lattice(kind, cli.size)?;
        (graph, Some((kind.label(), kind.critical_temperature())))
    };
    println!(
        "Graph: {} nodes, {} edges, J = {}",
        graph.n(),
        graph.edge_count(),
        cli.coupling
    );

    let config = SweepConfig {
        t_min: cli.t_min,
        t_max: cli.t_max,
        points: cli.points,
        equilibration_sweeps: cli.equil,
        measurement_sweeps: cli.measure,
        trials: cli.trials,
    };
    let mut engine = SweepEngine::new(config)?;

    let mut rng = match cli.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    };
    let mut system = SpinSystem::new(Arc::new(graph), cli.coupling, SpinInit::Random, &mut rng);
    let cancel = CancelToken::new();

    // Stage 1: uniform schedule across the full range.
    let schedule = generate_schedule(config.t_min, config.t_max, config.points)?;
    run_stage("scan", &mut engine, &mut system, &schedule, &mut rng, &cancel)?;

    let mut estimate = critical::estimate(engine.measurements());

    // Stage 2: concentrate points around the first estimate.
    if cli.two_stage {
        if let Some(cp) = estimate {
            let refined = generate_adaptive_schedule(
                config.t_min,
                config.t_max,
                config.points,
                cp.temperature,
                0.5,
            )?;
            run_stage("refine", &mut engine, &mut system, &refined, &mut rng, &cancel)?;
            estimate = critical::estimate(engine.measurements());
        } else {
            eprintln!("too few points for a first estimate, skipping refinement stage");
        }
    }

    write_table(&cli.output, &engine)?;
    println!("Measurement table -> {}", cli.output.display());
    report(estimate, theory);
    Ok(())
}

fn run_stage(
    label: &str,
    engine: &mut SweepEngine,
    system: &mut SpinSystem,
    schedule: &[f64],
    rng: &mut ChaCha20Rng,
    cancel: &CancelToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(1000);
    bar.set_style(ProgressStyle::with_template(
        " {bar:40.cyan/blue} {percent}% [{elapsed_precise}] T = {msg}",
    )?);

    let outcome = engine.run(system, schedule, rng, cancel, |_, p| {
        bar.set_position((p.fraction * 1000.0) as u64);
        bar.set_message(format!("{:.3}", p.temperature));
    });
    bar.finish_and_clear();

    match outcome {
        SweepOutcome::Completed => {
            println!("{label}: {} temperature points recorded", engine.measurements().len());
        }
        SweepOutcome::Cancelled => {
            println!(
                "{label}: cancelled, {} points retained",
                engine.measurements().len()
            );
        }
    }
    Ok(())
}

fn write_table(path: &PathBuf, engine: &SweepEngine) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record([
        "temperature",
        "mean_abs_magnetization",
        "std_magnetization",
        "band_lo",
        "band_hi",
        "mean_energy_per_node",
    ])?;
    for m in engine.measurements() {
        let (lo, hi) = m.error_band();
        wtr.write_record(&[
            m.temperature.to_string(),
            m.mean_abs_magnetization.to_string(),
            m.std_magnetization.to_string(),
            lo.to_string(),
            hi.to_string(),
            m.mean_energy_per_node.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn report(estimate: Option<CriticalPoint>, theory: Option<(&str, f64)>) {
    match estimate {
        Some(cp) => {
            println!("T_c = {:.3} ± {:.3}", cp.temperature, cp.uncertainty);
            if let Some((label, tc)) = theory {
                println!(
                    "{label} lattice theory: {tc} (deviation {:+.3})",
                    cp.temperature - tc
                );
            }
        }
        None => println!("Not enough measurements for a critical-point estimate."),
    }
}
