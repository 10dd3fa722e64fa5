use crate::domain::simulation::Simulation;
use crate::error::Result;
use crate::loader::parser::{load_config, load_topology, load_workflows};

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads topology, workflows and (optionally) the run configuration, and wires them into a ready simulation.
pub fn load_simulation(topology_path: &str, workflows_path: &str, config_path: Option<&str>) -> Result<Simulation> {
    let (topology, vms) = load_topology(topology_path)?;
    log::info!("Topology loaded: {} device(s), {} vm(s).", topology.devices().len(), vms.len());

    let workflows = load_workflows(workflows_path)?;
    log::info!("Workflows loaded: {}.", workflows.len());

    let config = load_config(config_path)?;
    Simulation::new(&config, topology, vms, workflows)
}
