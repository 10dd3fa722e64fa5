mod common;

use common::{build, device, end_of, start_of, vm};
use fog_workflow_sim::domain::entity::broker::ChurnPhase;
use fog_workflow_sim::domain::policy::policy_type::{PolicyConfig, VmProvisionerType};
use fog_workflow_sim::domain::simulation::{Simulation, SimulationConfig};
use fog_workflow_sim::domain::utils::id::{TaskId, VmId};
use fog_workflow_sim::domain::workflow::task::Task;

/// One device with room for a single 2-core VM, and two tasks pinned to two different 2-core VMs.
fn crowded(provisioner: VmProvisionerType) -> Simulation {
    let config = SimulationConfig { policies: PolicyConfig { provisioner, ..PolicyConfig::default() }, ..SimulationConfig::default() };
    let tasks = vec![Task::new("task0", "wf", 1000).with_pinned_vm("vm2"), Task::new("task1", "wf", 1000).with_pinned_vm("vm1")];
    build(&config, vec![device("edge", &[], 2, 10.0)], vec![vm("vm1", 2), vm("vm2", 2)], tasks)
}

#[test]
fn test_elastic_provisioner_swaps_vms() {
    let mut simulation = crowded(VmProvisionerType::Elastic);

    let report = simulation.run().unwrap();

    assert_eq!(end_of(&report, "task1", 0), 1.0);
    assert_eq!(start_of(&report, "task0", 0), 1.0, "task0 waits until vm1 is gone and vm2 fits");
    assert_eq!(end_of(&report, "task0", 0), 2.0);

    let broker = simulation.broker().unwrap();
    assert_eq!(broker.churn_rounds(), 1);
    assert_eq!(broker.created_vms(), &[VmId::new("vm2")]);
    assert!(broker.failed_vms().is_empty());
    assert_eq!(broker.phase(), ChurnPhase::Idle);
    assert_eq!(simulation.device("edge").unwrap().bound_vms(), vec![VmId::new("vm2")]);
}

#[test]
fn test_simple_provisioner_leaves_pinned_task_queued() {
    let mut simulation = crowded(VmProvisionerType::Simple);

    let report = simulation.run().unwrap();

    let broker = simulation.broker().unwrap();
    assert_eq!(broker.failed_vms(), &[VmId::new("vm2")]);
    assert_eq!(broker.queued(), &[TaskId::new("task0")]);
    assert_eq!(report.task("task0").unwrap().finished_cycles(), 0);
    assert_eq!(broker.churn_rounds(), 0);
}
