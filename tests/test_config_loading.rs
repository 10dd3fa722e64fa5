use std::fs;
use std::path::PathBuf;

use fog_workflow_sim::api::config_dto::SimulationConfigDto;
use fog_workflow_sim::api::topology_dto::{DEFAULT_LINK_BANDWIDTH, TopologyDto};
use fog_workflow_sim::domain::failure::failure_generator::FailureMode;
use fog_workflow_sim::domain::failure::failure_monitor::MonitorMode;
use fog_workflow_sim::domain::policy::policy_type::{TaskToVmMapperType, VmProvisionerType};
use fog_workflow_sim::domain::simulation::SimulationConfig;
use fog_workflow_sim::error::{ConfigurationError, Error};
use fog_workflow_sim::load_simulation;
use fog_workflow_sim::loader::parser::{load_config, load_topology};

const TOPOLOGY: &str = r#"{
    "devices": [
        { "name": "edge", "neighbors": ["cloud"], "hosts": [{ "mips": 1000, "cores": 2 }], "uplinkBw": 100, "downlinkBw": 100 },
        { "name": "cloud", "neighbors": ["edge"], "hosts": [{ "mips": 4000, "cores": 8 }] }
    ],
    "vms": [
        { "id": "vm-edge", "device": "edge" },
        { "id": "vm-cloud", "mips": 2000, "cores": 2, "device": "cloud" }
    ]
}"#;

const WORKFLOWS: &str = r#"{
    "workflows": [{
        "id": "sense",
        "tasks": [
            { "id": "read", "length": 1000, "inputFiles": [{ "name": "raw", "size": 100 }], "outputFiles": [{ "name": "sample", "size": 200 }], "vm": "vm-edge", "deadline": 2.5 },
            { "id": "analyse", "length": 4000, "inputFiles": [{ "name": "sample", "size": 200 }], "vm": "vm-cloud" }
        ]
    }]
}"#;

const CONFIG: &str = r#"{
    "maxCycle": 2,
    "stageInBandwidth": 100,
    "seed": 5,
    "policies": { "taskToVm": "fcfs", "provisioner": "elastic" },
    "failure": {
        "monitorMode": "all",
        "failureMode": "all",
        "distribution": { "family": "weibull", "scale": 1000, "shape": 2, "seed": 7 }
    }
}"#;

/// Writes `content` to a file unique to this test run and returns its path.
fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("fog_workflow_sim_{}_{}", std::process::id(), name));
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_topology_dto_defaults() {
    let dto: TopologyDto = serde_json::from_str(TOPOLOGY).unwrap();

    let cloud = &dto.devices[1];
    assert_eq!(cloud.uplink_bw, DEFAULT_LINK_BANDWIDTH);
    assert_eq!(cloud.hosts[0].ram, 2048);
    assert_eq!(dto.vms[0].mips, 1000.0);
    assert_eq!(dto.vms[0].cores, 1);
    assert_eq!(dto.vms[1].device.as_deref(), Some("cloud"));
}

#[test]
fn test_load_topology_builds_hosts_and_vms() {
    let path = temp_file("topology.json", TOPOLOGY);

    let (topology, vms) = load_topology(path.to_str().unwrap()).unwrap();

    assert_eq!(topology.devices().len(), 2);
    assert_eq!(topology.devices()[0].hosts[0].id.as_str(), "edge-host-0");
    assert_eq!(vms.len(), 2);
    assert_eq!(vms[1].spec.mips, 2000.0);
}

#[test]
fn test_config_file_selects_policies_and_failures() {
    let path = temp_file("config.json", CONFIG);

    let config = load_config(path.to_str()).unwrap();

    assert_eq!(config.max_cycle, 2);
    assert_eq!(config.stage_in_bandwidth, 100.0);
    assert_eq!(config.seed, 5);
    assert_eq!(config.policies.task_to_vm, TaskToVmMapperType::Fcfs);
    assert_eq!(config.policies.provisioner, VmProvisionerType::Elastic);
    assert_eq!(config.failure.failure_mode, FailureMode::All);
    assert_eq!(config.failure.monitor_mode, MonitorMode::All);
    assert_eq!(config.failure.shared.as_ref().map(|params| params.sample_size), Some(50));
}

#[test]
fn test_unknown_policy_is_rejected() {
    let dto: SimulationConfigDto = serde_json::from_str(r#"{ "policies": { "provisioner": "greedy" } }"#).unwrap();

    let result = SimulationConfig::try_from(&dto);

    assert!(matches!(result, Err(ConfigurationError::UnknownPolicy { name, .. }) if name == "greedy"));
}

#[test]
fn test_invalid_distribution_is_rejected() {
    let dto: SimulationConfigDto =
        serde_json::from_str(r#"{ "failure": { "failureMode": "all", "distribution": { "family": "gamma", "scale": -1, "shape": 2 } } }"#).unwrap();

    assert!(matches!(SimulationConfig::try_from(&dto), Err(ConfigurationError::InvalidDistribution(_))));
}

#[test]
fn test_malformed_json_is_a_deserialization_error() {
    let path = temp_file("broken.json", "{ \"devices\": [ ");

    let result = load_topology(path.to_str().unwrap());

    assert!(matches!(result, Err(Error::DeserializationError(_))));
}

#[test]
fn test_load_simulation_runs_end_to_end() {
    let topology = temp_file("e2e_topology.json", TOPOLOGY);
    let workflows = temp_file("e2e_workflows.json", WORKFLOWS);
    let config = temp_file("e2e_config.json", r#"{ "stageInBandwidth": 100 }"#);

    let mut simulation = load_simulation(topology.to_str().unwrap(), workflows.to_str().unwrap(), config.to_str()).unwrap();
    let report = simulation.run().unwrap();

    let read = report.task("read").unwrap().cycle_record(0).unwrap();
    assert_eq!(read.state.start_execution, Some(2.0), "100 bytes at 100 from the source, then again through the edge downlink");
    assert!(read.missed_deadline, "read ends at 3 against a deadline of 2.5");
    assert_eq!(report.task("read").unwrap().deadline, Some(2.5));
    assert_eq!(report.task("analyse").unwrap().missed_deadlines(), 0, "No deadline, nothing missed");

    let analyse = report.task("analyse").unwrap();
    assert_eq!(analyse.device.as_ref().map(|device| device.as_str()), Some("cloud"));
    let start = analyse.cycle_record(0).unwrap().state.start_execution.unwrap();
    let expected = 3.0 + 2.0 + 200.0 / DEFAULT_LINK_BANDWIDTH;
    assert!((start - expected).abs() < 1e-9, "edge uplink 200/100 then cloud downlink; got {}", start);

    let mut csv = Vec::new();
    report.write_csv(&mut csv).unwrap();
    assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 3, "Header plus one row per task cycle");
}
