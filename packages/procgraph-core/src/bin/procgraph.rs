//! Command-line interface for procgraph
//!
//! Commands: `discover` (learn an EFSM/DPN from a log and export it),
//! `evaluate` (replay a log against a PNML model), and `simulate` (execute
//! an EFSM on log traces). Exits 0 on success and 1 on any raised error.

use clap::{Args, Parser, Subcommand};
use procgraph_core::features::conformance::evaluate_conformance;
use procgraph_core::features::export::{export_dpn_to_json, export_dpn_to_pnml, import_pnml};
use procgraph_core::features::ingest::read_log;
use procgraph_core::pipeline::discover;
use procgraph_core::{DiscoveryConfig, Efsm, ProjectionKind, Result};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "procgraph",
    about = "Data-aware process discovery: EFSM learning and DPN conformance",
    version
)]
struct Cli {
    /// Diagnostic log verbosity (-d: debug, -dd: trace)
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count, global = true)]
    debug: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover an EFSM/DPN from an event log
    Discover(DiscoverArgs),
    /// Evaluate conformance of a log against a PNML model
    Evaluate(EvaluateArgs),
    /// Simulate an EFSM on log traces
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct DiscoverArgs {
    /// Path to the event log (CSV)
    #[arg(long)]
    log: PathBuf,

    /// Output PNML file path
    #[arg(long)]
    out_pnml: PathBuf,

    /// Optional EFSM JSON output path
    #[arg(long)]
    out_efsm: Option<PathBuf>,

    /// Optional DPN JSON output path
    #[arg(long)]
    out_json: Option<PathBuf>,

    /// State-merging divergence threshold
    #[arg(long, default_value_t = 0.3)]
    divergence_threshold: f64,

    /// Maximum conjunction length of synthesised guards
    #[arg(long, default_value_t = 3)]
    max_conjuncts: usize,

    /// Fraction of cases to keep before learning
    #[arg(long, default_value_t = 1.0)]
    log_sample_ratio: f64,

    /// Bootstrap states from an externally mined Petri net instead of
    /// PTA merging (requires --bootstrap-pnml)
    #[arg(long)]
    bootstrap_inductive_miner: bool,

    /// PNML file with the externally mined Petri net
    #[arg(long, requires = "bootstrap_inductive_miner")]
    bootstrap_pnml: Option<PathBuf>,

    /// Use the compact shared-place projection instead of the canonical
    /// one-place-per-state projection
    #[arg(long)]
    compact: bool,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Path to the event log (CSV)
    #[arg(long)]
    log: PathBuf,

    /// Path to the PNML model
    #[arg(long)]
    pnml: PathBuf,

    /// Optional JSON output path for the conformance report
    #[arg(long)]
    out_json: Option<PathBuf>,
}

#[derive(Args)]
struct SimulateArgs {
    /// Path to the EFSM JSON file
    #[arg(long)]
    efsm: PathBuf,

    /// Path to the event log (CSV)
    #[arg(long)]
    log: PathBuf,

    /// Maximum number of traces to simulate
    #[arg(long, default_value_t = 10)]
    max_traces: usize,

    /// Print the outcome of every trace
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Command::Discover(args) => cmd_discover(args),
        Command::Evaluate(args) => cmd_evaluate(args),
        Command::Simulate(args) => cmd_simulate(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn cmd_discover(args: DiscoverArgs) -> Result<()> {
    let config = DiscoveryConfig {
        divergence_threshold: args.divergence_threshold,
        max_conjuncts: args.max_conjuncts,
        log_sample_ratio: args.log_sample_ratio,
        use_inductive_miner: args.bootstrap_inductive_miner,
        projection: if args.compact {
            ProjectionKind::Compact
        } else {
            ProjectionKind::Canonical
        },
        ..Default::default()
    };
    config.validate()?;

    println!("Learning EFSM from log: {}", args.log.display());
    let log = read_log(&args.log, config.log_sample_ratio)?;

    let bootstrap = match &args.bootstrap_pnml {
        Some(path) => Some(import_pnml(path)?),
        None => None,
    };
    let outcome = discover(&log.traces, bootstrap.as_ref(), &config)?;
    println!(
        "Learned EFSM with {} states and {} transitions",
        outcome.efsm.states.len(),
        outcome.efsm.transitions.len()
    );
    println!(
        "Mapped to DPN with {} places and {} transitions",
        outcome.dpn.place_count(),
        outcome.dpn.transition_count()
    );

    if let Some(parent) = args.out_pnml.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    export_dpn_to_pnml(&outcome.dpn, &args.out_pnml)?;
    println!("Exported DPN to: {}", args.out_pnml.display());

    if let Some(path) = &args.out_efsm {
        std::fs::write(path, outcome.efsm.to_json()?)?;
        println!("Exported EFSM to: {}", path.display());
    }
    if let Some(path) = &args.out_json {
        export_dpn_to_json(
            &outcome.dpn,
            path,
            "Discovered DPN",
            "Data Petri net discovered from event log",
        )?;
        println!("Exported DPN JSON to: {}", path.display());
    }
    Ok(())
}

fn cmd_evaluate(args: EvaluateArgs) -> Result<()> {
    println!(
        "Evaluating conformance: log={}, pnml={}",
        args.log.display(),
        args.pnml.display()
    );

    let dpn = import_pnml(&args.pnml)?;
    let log = read_log(&args.log, 1.0)?;
    let report = evaluate_conformance(&dpn, &log.traces);

    println!();
    println!("=== Conformance Results ===");
    println!("Number of traces: {}", report.num_traces);
    let metrics = &report.guard_satisfaction;
    println!(
        "Guard satisfaction rate: {:.3}",
        metrics.satisfaction_rate
    );
    println!("  Satisfied: {}", metrics.satisfied);
    println!("  Violated: {}", metrics.violated);
    println!("  Undefined: {}", metrics.undefined);

    if let Some(path) = &args.out_json {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!();
        println!("Results exported to: {}", path.display());
    }
    Ok(())
}

fn cmd_simulate(args: SimulateArgs) -> Result<()> {
    println!("Simulating EFSM from: {}", args.efsm.display());

    let efsm = Efsm::from_json(&std::fs::read_to_string(&args.efsm)?)?;
    let log = read_log(&args.log, 1.0)?;
    let limit = log.traces.len().min(args.max_traces);

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for (index, trace) in log.traces[..limit].iter().enumerate() {
        let outcome = efsm.simulate_trace(trace);
        if outcome.accepted {
            accepted += 1;
        } else {
            rejected += 1;
        }
        if args.verbose {
            println!(
                "Trace {}: {}",
                index,
                if outcome.accepted { "ACCEPTED" } else { "REJECTED" }
            );
            println!("  Path: {}", outcome.state_path.join(" -> "));
        }
    }

    println!();
    println!("=== Simulation Results ===");
    println!("Accepted: {}/{}", accepted, limit);
    println!("Rejected: {}/{}", rejected, limit);
    Ok(())
}
