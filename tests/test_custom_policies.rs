mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::{device, start_of, vm};
use fog_workflow_sim::domain::policy::policy_type::PolicySet;
use fog_workflow_sim::domain::policy::task_to_vm_mapper::{TaskMappingContext, TaskToVmMapper};
use fog_workflow_sim::domain::policy::vm_provisioner::{ProvisioningContext, ProvisioningDecision, VmProvisioner};
use fog_workflow_sim::domain::resource::vm::Vm;
use fog_workflow_sim::domain::simulation::{Simulation, SimulationConfig};
use fog_workflow_sim::domain::topology::topology::Topology;
use fog_workflow_sim::domain::utils::id::{TaskId, VmId};
use fog_workflow_sim::domain::workflow::task::Task;
use fog_workflow_sim::domain::workflow::workflow::Workflow;

/// Remembers the queue length of every call and releases every VM once nothing is queued.
#[derive(Debug, Default)]
struct RecordingProvisioner {
    calls: Rc<RefCell<Vec<usize>>>,
}

impl VmProvisioner for RecordingProvisioner {
    fn provision(&mut self, ctx: &ProvisioningContext<'_>) -> ProvisioningDecision {
        self.calls.borrow_mut().push(ctx.queued.len());
        if ctx.queued.is_empty() {
            return ProvisioningDecision { to_destroy: ctx.created.to_vec(), ..ProvisioningDecision::default() };
        }
        ProvisioningDecision { keep_alive: ctx.created.to_vec(), ..ProvisioningDecision::default() }
    }
}

/// Sends every queued task to the most recently created VM.
#[derive(Debug)]
struct LastVmMapper;

impl TaskToVmMapper for LastVmMapper {
    fn map(&mut self, ctx: &TaskMappingContext<'_>) -> BTreeMap<TaskId, VmId> {
        let Some(last) = ctx.created.last() else {
            return BTreeMap::new();
        };
        ctx.queued.iter().map(|task| (task.id.clone(), last.clone())).collect()
    }
}

fn simulation(tasks: Vec<Task>, vms: Vec<Vm>, policies: PolicySet) -> Simulation {
    let topology = Topology::new(vec![device("edge", &[], 2, 10.0)]).unwrap();
    let workflow = Workflow::new("wf", tasks).unwrap();
    Simulation::with_policies(&SimulationConfig::default(), topology, vms, vec![workflow], policies).unwrap()
}

#[test]
fn test_provisioner_is_consulted_after_the_queue_drains() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let policies = PolicySet::default().with_provisioner(RecordingProvisioner { calls: calls.clone() });
    let mut simulation = simulation(vec![Task::new("t0", "wf", 1000)], vec![vm("vm-0", 1)], policies);

    let report = simulation.run().unwrap();

    assert_eq!(report.task("t0").unwrap().finished_cycles(), 1);
    assert_eq!(*calls.borrow(), vec![0], "Called once, when t0 returned with nothing queued");

    let broker = simulation.broker().unwrap();
    assert_eq!(broker.churn_rounds(), 1);
    assert!(broker.created_vms().is_empty(), "The idle vm was released");
    assert!(simulation.device("edge").unwrap().bound_vms().is_empty());
}

#[test]
fn test_caller_supplied_task_mapper_places_tasks() {
    let policies = PolicySet::default().with_task_to_vm(LastVmMapper);
    let tasks = vec![Task::new("a", "wf", 1000), Task::new("b", "wf", 1000)];

    let mut simulation = simulation(tasks, vec![vm("vm-0", 1), vm("vm-1", 1)], policies);
    let report = simulation.run().unwrap();

    assert_eq!(report.task("a").unwrap().vm, Some(VmId::new("vm-1")));
    assert_eq!(report.task("b").unwrap().vm, Some(VmId::new("vm-1")));
    assert_eq!(start_of(&report, "b", 0), 1.0, "b queues behind a on the shared vm");
    assert!(simulation.broker().unwrap().ledger().vm_of(&TaskId::new("a")) == Some(&VmId::new("vm-1")));
}
