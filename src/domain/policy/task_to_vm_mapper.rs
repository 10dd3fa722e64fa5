use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;

use crate::domain::policy::assignment_ledger::AssignmentLedger;
use crate::domain::topology::routing::RoutingTable;
use crate::domain::utils::id::{DeviceId, TaskId, VmId};
use crate::domain::workflow::task::Task;

/// Everything a task mapper may look at during one dispatch round.
pub struct TaskMappingContext<'a> {
    pub created: &'a [VmId],
    pub failed: &'a [VmId],
    /// In arrival order.
    pub queued: &'a [&'a Task],
    pub completed: &'a BTreeSet<TaskId>,
    pub dispatched: &'a BTreeSet<TaskId>,
    /// Dispatched and not yet returned.
    pub in_flight: &'a BTreeSet<TaskId>,
    pub ledger: &'a AssignmentLedger,
    pub routing: &'a RoutingTable,
    pub vm_to_device: &'a HashMap<VmId, DeviceId>,
}

/// Produces a partial task -> VM assignment for the queued tasks. Tasks left out keep their previous assignment.
pub trait TaskToVmMapper: Debug {
    fn map(&mut self, ctx: &TaskMappingContext<'_>) -> BTreeMap<TaskId, VmId>;
}

/// Pinned VM if the task names one. Otherwise a task keeps the VM it already ran on while that VM is created, and
/// a task seen for the first time takes the next created VM in round-robin order.
#[derive(Debug, Default)]
pub struct SimpleTaskToVmMapper {
    next: usize,
}

impl TaskToVmMapper for SimpleTaskToVmMapper {
    fn map(&mut self, ctx: &TaskMappingContext<'_>) -> BTreeMap<TaskId, VmId> {
        let mut delta = BTreeMap::new();

        for task in ctx.queued {
            if let Some(pinned) = &task.hints.vm {
                delta.insert(task.id.clone(), pinned.clone());
                continue;
            }

            match ctx.ledger.vm_of(&task.id) {
                Some(previous) if ctx.created.contains(previous) => {
                    delta.insert(task.id.clone(), previous.clone());
                }
                _ if !ctx.created.is_empty() => {
                    delta.insert(task.id.clone(), ctx.created[self.next % ctx.created.len()].clone());
                    self.next += 1;
                }
                _ => {}
            }
        }
        delta
    }
}

/// First come, first served: each queued task takes a created VM no in-flight task is using, until none is left.
/// A pinned task always gets its VM, busy or not, and that VM is no longer handed out this round.
#[derive(Debug, Default)]
pub struct FcfsTaskToVmMapper;

impl TaskToVmMapper for FcfsTaskToVmMapper {
    fn map(&mut self, ctx: &TaskMappingContext<'_>) -> BTreeMap<TaskId, VmId> {
        let busy: BTreeSet<&VmId> = ctx.in_flight.iter().filter_map(|task| ctx.ledger.vm_of(task)).collect();
        let mut free: Vec<&VmId> = ctx.created.iter().filter(|vm| !busy.contains(vm)).collect();
        let mut delta = BTreeMap::new();

        for task in ctx.queued {
            if let Some(pinned) = &task.hints.vm {
                free.retain(|vm| *vm != pinned);
                delta.insert(task.id.clone(), pinned.clone());
                continue;
            }

            if free.is_empty() {
                continue;
            }
            let vm = free.remove(0);
            delta.insert(task.id.clone(), vm.clone());
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vms(ids: &[&str]) -> Vec<VmId> {
        ids.iter().map(|id| VmId::new(*id)).collect()
    }

    #[test]
    fn test_simple_round_robin_and_pinning() {
        let created = vms(&["vm-0", "vm-1"]);
        let tasks = vec![Task::new("a", "wf", 10), Task::new("b", "wf", 10).with_pinned_vm("vm-9"), Task::new("c", "wf", 10)];
        let queued: Vec<&Task> = tasks.iter().collect();
        let (completed, dispatched, in_flight) = (BTreeSet::new(), BTreeSet::new(), BTreeSet::new());
        let (ledger, routing, vm_to_device) = (AssignmentLedger::new(), RoutingTable::default(), HashMap::new());
        let ctx = TaskMappingContext {
            created: &created,
            failed: &[],
            queued: &queued,
            completed: &completed,
            dispatched: &dispatched,
            in_flight: &in_flight,
            ledger: &ledger,
            routing: &routing,
            vm_to_device: &vm_to_device,
        };

        let delta = SimpleTaskToVmMapper::default().map(&ctx);

        assert_eq!(delta[&TaskId::new("a")], VmId::new("vm-0"));
        assert_eq!(delta[&TaskId::new("b")], VmId::new("vm-9"), "Pinned vm wins even if it was never created");
        assert_eq!(delta[&TaskId::new("c")], VmId::new("vm-1"));
    }

    #[test]
    fn test_simple_keeps_previous_vm_on_resubmission() {
        let created = vms(&["vm-0", "vm-1"]);
        let tasks = vec![Task::new("a", "wf", 10), Task::new("b", "wf", 10)];
        let queued: Vec<&Task> = tasks.iter().collect();
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("b"), VmId::new("vm-1")), (TaskId::new("gone"), VmId::new("vm-7"))]));
        let (completed, dispatched, in_flight, routing, vm_to_device) = (BTreeSet::new(), BTreeSet::new(), BTreeSet::new(), RoutingTable::default(), HashMap::new());
        let ctx = TaskMappingContext {
            created: &created,
            failed: &[],
            queued: &queued,
            completed: &completed,
            dispatched: &dispatched,
            in_flight: &in_flight,
            ledger: &ledger,
            routing: &routing,
            vm_to_device: &vm_to_device,
        };
        let mut mapper = SimpleTaskToVmMapper::default();

        let first = mapper.map(&ctx);
        let second = mapper.map(&ctx);

        assert_eq!(first[&TaskId::new("b")], VmId::new("vm-1"), "b already ran on vm-1");
        assert_eq!(first[&TaskId::new("a")], VmId::new("vm-0"));
        assert_eq!(second[&TaskId::new("b")], VmId::new("vm-1"));
        assert_eq!(second[&TaskId::new("a")], VmId::new("vm-1"), "Cursor moved on for the unassigned task");
    }

    #[test]
    fn test_fcfs_skips_busy_vms() {
        let created = vms(&["vm-0", "vm-1"]);
        let tasks = vec![Task::new("a", "wf", 10), Task::new("b", "wf", 10)];
        let queued: Vec<&Task> = tasks.iter().collect();
        let in_flight = BTreeSet::from([TaskId::new("running")]);
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("running"), VmId::new("vm-0"))]));
        let (completed, dispatched, routing, vm_to_device) = (BTreeSet::new(), BTreeSet::new(), RoutingTable::default(), HashMap::new());
        let ctx = TaskMappingContext {
            created: &created,
            failed: &[],
            queued: &queued,
            completed: &completed,
            dispatched: &dispatched,
            in_flight: &in_flight,
            ledger: &ledger,
            routing: &routing,
            vm_to_device: &vm_to_device,
        };

        let delta = FcfsTaskToVmMapper.map(&ctx);

        assert_eq!(delta.len(), 1, "Only one vm is free");
        assert_eq!(delta[&TaskId::new("a")], VmId::new("vm-1"));
    }

    #[test]
    fn test_fcfs_honors_pinned_vm_even_when_busy() {
        let created = vms(&["vm-0", "vm-1"]);
        let tasks = vec![Task::new("a", "wf", 10).with_pinned_vm("vm-0"), Task::new("b", "wf", 10).with_pinned_vm("vm-1"), Task::new("c", "wf", 10)];
        let queued: Vec<&Task> = tasks.iter().collect();
        let in_flight = BTreeSet::from([TaskId::new("running")]);
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("running"), VmId::new("vm-0"))]));
        let (completed, dispatched, routing, vm_to_device) = (BTreeSet::new(), BTreeSet::new(), RoutingTable::default(), HashMap::new());
        let ctx = TaskMappingContext {
            created: &created,
            failed: &[],
            queued: &queued,
            completed: &completed,
            dispatched: &dispatched,
            in_flight: &in_flight,
            ledger: &ledger,
            routing: &routing,
            vm_to_device: &vm_to_device,
        };

        let delta = FcfsTaskToVmMapper.map(&ctx);

        assert_eq!(delta[&TaskId::new("a")], VmId::new("vm-0"), "Pinned to a busy vm");
        assert_eq!(delta[&TaskId::new("b")], VmId::new("vm-1"));
        assert!(!delta.contains_key(&TaskId::new("c")), "vm-1 was taken by the pinned task");
    }
}
