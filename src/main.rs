//! Capfield - finite-difference capacitance calculator
//!
//! Reads a layered geometry description and prints the capacitance between
//! every pair of nets.
//!
//! # Usage
//!
//! ```bash
//! capfield -w 1.8 -e 0.01 board.cfg
//! ```
//!
//! Ctrl-C stops after the net being evaluated and saves the finished rows;
//! `-r` picks the run up again.

use std::path::{Path, PathBuf};

use clap::Parser;
use capfield_core::{
    capacitance::{CancelToken, CapacitanceMatrix, Extraction, ExtractionConfig, RunOutcome},
    config,
    design::{validate_design, Design},
    error::Result,
    report::{print_table, CliObserver},
    solver::DEFAULT_OMEGA,
    DEFAULT_BATCH_ITERATIONS, DEFAULT_MAX_ERROR, DEFAULT_STANDOFF,
};
use tracing::{info, warn};

/// Electrostatic capacitance calculator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the geometry description
    #[arg(value_name = "CONFIG_FILE")]
    config_file: PathBuf,

    /// Distance in grid units between a net and the edge of its grid
    #[arg(short, long, default_value_t = DEFAULT_STANDOFF)]
    standoff: i32,

    /// SOR sweeps between convergence checks
    #[arg(short = 'n', long, default_value_t = DEFAULT_BATCH_ITERATIONS)]
    iterations: usize,

    /// SOR relaxation factor (0 to 2)
    #[arg(short = 'w', long, default_value_t = DEFAULT_OMEGA)]
    omega: f64,

    /// Maximum relative flux change at convergence
    #[arg(short = 'e', long, default_value_t = DEFAULT_MAX_ERROR)]
    max_error: f64,

    /// Write cross-sections of every converged grid
    #[arg(short, long)]
    dump: bool,

    /// Resume an interrupted run from the state file
    #[arg(short, long)]
    restore: bool,

    /// Verbosity (0 = errors only, 4 = trace)
    #[arg(short, long, default_value_t = 2)]
    verbosity: u8,

    /// Restart state written on interrupt
    #[arg(long, default_value = "capfield.save")]
    state_file: PathBuf,

    /// Directory for cross-section dumps
    #[arg(long, default_value = ".")]
    dump_dir: PathBuf,
}

fn level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level(args.verbosity).to_string().to_lowercase().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse and resolve the description
    let ast = config::parse_file(&args.config_file)?;
    let base_dir = args.config_file.parent().unwrap_or(Path::new("."));
    let mut design = Design::from_ast(&ast, base_dir)?;
    validate_design(&design)?;

    let settings = ExtractionConfig::new()
        .with_standoff(args.standoff)
        .with_batch_iterations(args.iterations)
        .with_omega(args.omega)
        .with_max_error(args.max_error);

    let mut matrix = if args.restore {
        let m = CapacitanceMatrix::restore(&args.state_file, &design.net_names())?;
        info!(
            file = %args.state_file.display(),
            completed = m.completed(),
            "restored previous run"
        );
        m
    } else {
        CapacitanceMatrix::new(design.net_names())
    };

    let cancel = CancelToken::new();
    let handle = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handle.cancel()) {
        warn!(error = %e, "interrupt handler not installed");
    }

    let mut observer = CliObserver::new(args.dump.then(|| args.dump_dir.clone()));
    let mut extraction = Extraction::new(&mut design, settings)?;

    match extraction.run(&mut matrix, &cancel, &mut observer)? {
        RunOutcome::Complete => print_table(&matrix)?,
        RunOutcome::Interrupted => {
            matrix.save(&args.state_file)?;
            info!(
                file = %args.state_file.display(),
                "state saved, resume with -r"
            );
        }
    }

    Ok(())
}
