use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use fog_workflow_sim::domain::simulation::Simulation;
use fog_workflow_sim::loader::parser::{load_config, load_topology, load_workflows};
use fog_workflow_sim::logger;

#[derive(Parser, Debug)]
#[command(name = "fog_workflow_sim", version, about = "Discrete-event simulation of workflows on fog devices")]
struct Args {
    /// Device graph and VM declarations (JSON).
    #[arg(long)]
    topology: String,
    /// Workflow definitions (JSON).
    #[arg(long)]
    workflows: String,
    /// Run configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,
    /// Write a per-cycle CSV report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Stop delivering events after this simulation time. Overrides the config file.
    #[arg(long)]
    end_time: Option<f64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init();
    log::info!("Loading simulation inputs.");

    let (topology, vms) = load_topology(&args.topology).with_context(|| format!("failed to load topology from {}", args.topology))?;
    let workflows = load_workflows(&args.workflows).with_context(|| format!("failed to load workflows from {}", args.workflows))?;
    let mut config = load_config(args.config.as_deref()).context("failed to load run configuration")?;
    if args.end_time.is_some() {
        config.end_time = args.end_time;
    }

    let mut simulation = Simulation::new(&config, topology, vms, workflows).context("invalid simulation setup")?;
    let report = simulation.run().context("simulation aborted")?;

    let finished = report.tasks.values().filter(|task| task.finished_cycles() > 0).count();
    log::info!(
        "Final time {}, {} events, {}/{} task(s) finished at least one cycle, {} failure(s).",
        report.final_time,
        report.events_processed,
        finished,
        report.tasks.len(),
        report.failure_count()
    );

    if let Some(path) = &args.report {
        let file = File::create(path).with_context(|| format!("failed to create report {}", path.display()))?;
        report.write_csv(file).with_context(|| format!("failed to write report {}", path.display()))?;
        log::info!("Report written to {}.", path.display());
    }
    Ok(())
}
