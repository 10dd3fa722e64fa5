use serde::de::DeserializeOwned;
use std::fs;

use crate::api::config_dto::SimulationConfigDto;
use crate::api::topology_dto::TopologyDto;
use crate::api::workflow_dto::WorkflowsDto;
use crate::domain::resource::vm::Vm;
use crate::domain::simulation::SimulationConfig;
use crate::domain::topology::topology::Topology;
use crate::domain::workflow::workflow::Workflow;
use crate::error::Result;

/// Parses a JSON file into a given type `T`.
///
/// Errors are converted into `crate::error::Error` variants:
/// - `Error::IoError` if the file cannot be read.
/// - `Error::DeserializationError` if the JSON is malformed.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path)?;
    let parsed_data: T = serde_json::from_str(&data)?;
    Ok(parsed_data)
}

/// Reads the device graph and the declared VMs.
pub fn load_topology(file_path: &str) -> Result<(Topology, Vec<Vm>)> {
    let dto: TopologyDto = parse_json_file(file_path)?;
    log::debug!("Topology file '{}' lists {} device(s) and {} vm(s).", file_path, dto.devices.len(), dto.vms.len());

    let topology = Topology::from_dto(dto.devices)?;
    let vms = dto.vms.into_iter().map(Vm::try_from).collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((topology, vms))
}

pub fn load_workflows(file_path: &str) -> Result<Vec<Workflow>> {
    let dto: WorkflowsDto = parse_json_file(file_path)?;
    let workflows = dto.workflows.into_iter().map(Workflow::from_dto).collect::<std::result::Result<Vec<_>, _>>()?;
    log::debug!("Workflow file '{}' holds {} workflow(s).", file_path, workflows.len());
    Ok(workflows)
}

/// Without a path every setting keeps its default.
pub fn load_config(file_path: Option<&str>) -> Result<SimulationConfig> {
    let dto = match file_path {
        Some(path) => parse_json_file::<SimulationConfigDto>(path)?,
        None => SimulationConfigDto::default(),
    };
    Ok(SimulationConfig::try_from(&dto)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_missing_file_is_io_error() {
        let result = parse_json_file::<TopologyDto>("does/not/exist.json");
        assert!(matches!(result, Err(Error::IoError(_))));
    }

    #[test]
    fn test_default_config_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }
}
