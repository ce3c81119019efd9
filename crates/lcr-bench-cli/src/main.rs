//! lcrbench CLI
//!
//! Command-line interface for:
//! - Running resumable benchmark sweeps over synthetic or real graphs
//! - Consolidating saved result sets via a JSON plan
//! - Printing a results directory with unit-formatted cells

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use lcr_bench_core::engine::{ProcessEngine, ProcessQueryGenerator};
use lcr_bench_core::results::{validate_results_dir, ResultSet};
use lcr_bench_core::sweep::{run_real, run_synth, SweepEnv};
use lcr_bench_core::workload::WorkloadPaths;

mod config;
mod plan;

use config::SweepConfig;
use plan::ConsolidatePlan;

#[derive(Parser)]
#[command(name = "lcrbench")]
#[command(
    author,
    version,
    about = "Benchmark sweeps and result consolidation for LCR indexes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a resumable benchmark sweep declared in a JSON config.
    Sweep {
        #[command(subcommand)]
        command: SweepCommands,
    },

    /// Apply a JSON consolidation plan to saved result sets.
    Consolidate {
        /// Path to the plan file.
        #[arg(long)]
        plan: PathBuf,
    },

    /// Print a results directory with unit-formatted cells.
    Show {
        /// The benchmark-results directory.
        #[arg(long)]
        dir: PathBuf,
        /// Bold the best value per row (LaTeX \textbf).
        #[arg(long)]
        highlight_best: bool,
    },
}

#[derive(Subcommand)]
enum SweepCommands {
    /// Sweep over generated synthetic graphs.
    Synth {
        /// Path to the sweep config file.
        #[arg(long)]
        config: PathBuf,
    },

    /// Sweep over real graph datasets.
    Real {
        /// Path to the sweep config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sweep { command } => match command {
            SweepCommands::Synth { config } => cmd_sweep(&config, true),
            SweepCommands::Real { config } => cmd_sweep(&config, false),
        },
        Commands::Consolidate { plan } => cmd_consolidate(&plan),
        Commands::Show {
            dir,
            highlight_best,
        } => cmd_show(&dir, highlight_best),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:?}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn cmd_sweep(config_path: &Path, synthetic: bool) -> Result<()> {
    let config = SweepConfig::load(config_path)?;

    let engine = ProcessEngine::new(config.engine_executable());
    // Real-graph sweeps keep random and connected query files separate.
    let generator = ProcessQueryGenerator::new(
        config.generator_executable(),
        config.random_queries,
        config.connected_queries,
        !synthetic,
    );

    let env = SweepEnv {
        engine: &engine,
        generator: &generator,
        workload: WorkloadPaths::new(&config.workload_dir),
        results_dir: config.results_dir.clone(),
        state_dir: config.state_dir.clone(),
        time_limit_secs: config.time_limit_secs,
        memory_limit_mb: config.memory_limit_mb,
        seed: config.seed,
    };

    if synthetic {
        run_synth(&config.synth_sweep()?, &env)
    } else {
        run_real(&config.real_sweep()?, &env)
    }
}

fn cmd_consolidate(plan_path: &Path) -> Result<()> {
    let plan = ConsolidatePlan::load(plan_path)?;
    let set = plan::run(&plan)?;
    plan::finish(&plan, &set)
}

fn cmd_show(dir: &Path, highlight_best: bool) -> Result<()> {
    validate_results_dir(dir)?;
    let set = ResultSet::load(dir)?;
    plan::print_rendered(&set.to_units(highlight_best));
    Ok(())
}
