#![allow(dead_code)]

use fog_workflow_sim::domain::report::SimulationReport;
use fog_workflow_sim::domain::resource::host::HostSpec;
use fog_workflow_sim::domain::resource::vm::{Vm, VmSpec};
use fog_workflow_sim::domain::simulation::{Simulation, SimulationConfig};
use fog_workflow_sim::domain::topology::topology::{DeviceSpec, Topology};
use fog_workflow_sim::domain::workflow::task::Task;
use fog_workflow_sim::domain::workflow::workflow::Workflow;

pub fn host(device: &str, cores: u32) -> HostSpec {
    HostSpec { id: format!("{}-host-0", device).as_str().into(), mips: 1000.0, cores, ram: 2048, bw: 10_000, storage: 1_000_000 }
}

/// A device with one 1000 MIPS host and symmetric link bandwidth.
pub fn device(name: &str, neighbors: &[&str], cores: u32, bandwidth: f64) -> DeviceSpec {
    DeviceSpec::new(name, neighbors, vec![host(name, cores)], bandwidth, bandwidth)
}

pub fn vm(id: &str, cores: u32) -> Vm {
    Vm::new(id, VmSpec { mips: 1000.0, cores, ram: 512, bw: 1024, storage: 10_000 })
}

pub fn vm_on(id: &str, device: &str) -> Vm {
    vm(id, 1).with_affinity(device)
}

pub fn build(config: &SimulationConfig, devices: Vec<DeviceSpec>, vms: Vec<Vm>, tasks: Vec<Task>) -> Simulation {
    let topology = Topology::new(devices).unwrap();
    let workflow = Workflow::new("wf", tasks).unwrap();
    Simulation::new(config, topology, vms, vec![workflow]).unwrap()
}

pub fn run(config: &SimulationConfig, devices: Vec<DeviceSpec>, vms: Vec<Vm>, tasks: Vec<Task>) -> (Simulation, SimulationReport) {
    let mut simulation = build(config, devices, vms, tasks);
    let report = simulation.run().unwrap();
    (simulation, report)
}

pub fn start_of(report: &SimulationReport, task: &str, cycle: u32) -> f64 {
    report.task(task).unwrap().cycle_record(cycle).unwrap().state.start_execution.unwrap()
}

pub fn end_of(report: &SimulationReport, task: &str, cycle: u32) -> f64 {
    report.task(task).unwrap().cycle_record(cycle).unwrap().state.end_execution.unwrap()
}
