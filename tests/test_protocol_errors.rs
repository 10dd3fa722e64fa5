mod common;

use std::collections::BTreeMap;

use common::{build, device, vm_on};
use fog_workflow_sim::domain::entity::broker::{BrokerSettings, BrokerSetup, ResourceBroker};
use fog_workflow_sim::domain::entity::device::DeviceAgent;
use fog_workflow_sim::domain::entity::message::Message;
use fog_workflow_sim::domain::entity::workflow_engine::WorkflowEngine;
use fog_workflow_sim::domain::failure::failure_generator::{FailureConfig, FailureGenerator};
use fog_workflow_sim::domain::policy::policy_type::PolicySet;
use fog_workflow_sim::domain::simulation::SimulationConfig;
use fog_workflow_sim::domain::simulator::simulator::Simulator;
use fog_workflow_sim::domain::topology::routing::RoutingTable;
use fog_workflow_sim::domain::workflow::task::Task;
use fog_workflow_sim::error::{ConfigurationError, Error};

#[test]
fn test_staging_between_disconnected_devices_fails_the_run() {
    let devices = vec![device("a", &[], 1, 10.0), device("b", &[], 1, 10.0)];
    let tasks = vec![
        Task::new("t0", "wf", 1000).with_output("o0", 100).with_pinned_vm("vm-a"),
        Task::new("t1", "wf", 1000).with_input("o0", "t0", 100).with_pinned_vm("vm-b"),
    ];
    let mut simulation = build(&SimulationConfig::default(), devices, vec![vm_on("vm-a", "a"), vm_on("vm-b", "b")], tasks);

    let result = simulation.run();

    assert!(
        matches!(&result, Err(Error::Configuration(ConfigurationError::NoRoute { from, to })) if from.as_str() == "a" && to.as_str() == "b"),
        "got {:?}",
        result.map(|report| report.final_time)
    );
}

#[test]
fn test_engine_rejects_unexpected_event() {
    let mut simulator = Simulator::new();
    let engine = simulator.add_entity(|id| WorkflowEngine::new(id, id));
    simulator.schedule(engine, engine, 0.0, Message::Init);

    let result = simulator.run();

    assert!(matches!(result, Err(Error::ProtocolViolation { entity, .. }) if entity == "workflow-engine"));
}

#[test]
fn test_device_rejects_unexpected_event() {
    let spec = device("edge", &[], 1, 10.0);
    let mut simulator = Simulator::new();
    let agent = simulator.add_entity(|id| DeviceAgent::new(id, &spec, BTreeMap::new()));
    simulator.schedule(agent, agent, 1.0, Message::Init);

    let result = simulator.run();

    assert!(matches!(result, Err(Error::ProtocolViolation { entity, detail }) if entity == "edge" && detail.contains("INIT")));
}

#[test]
fn test_broker_rejects_unexpected_event() {
    let setup = BrokerSetup {
        settings: BrokerSettings { max_cycle: 0, stage_in_bandwidth: 10.0, seed: 0 },
        devices: BTreeMap::new(),
        routing: RoutingTable::default(),
        vms: Vec::new(),
        policies: PolicySet::default(),
        failures: FailureGenerator::new(&FailureConfig::none()).unwrap(),
    };
    let mut simulator = Simulator::new();
    let broker = simulator.add_entity(|id| ResourceBroker::new(id, setup));
    simulator.schedule(broker, broker, 1.0, Message::UplinkFree);

    let result = simulator.run();

    assert!(matches!(result, Err(Error::ProtocolViolation { entity, .. }) if entity == "broker"));
}
