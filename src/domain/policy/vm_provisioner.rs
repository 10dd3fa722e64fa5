use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::domain::policy::assignment_ledger::AssignmentLedger;
use crate::domain::resource::vm::Vm;
use crate::domain::utils::id::{TaskId, VmId};

/// Broker state a provisioner decides on. Consulted whenever the broker has no task in flight after a cycle.
pub struct ProvisioningContext<'a> {
    pub failed: &'a [VmId],
    pub created: &'a [VmId],
    pub all: &'a [Vm],
    pub ledger: &'a AssignmentLedger,
    pub completed: &'a BTreeSet<TaskId>,
    pub dispatched: &'a BTreeSet<TaskId>,
    /// Tasks still waiting in the broker queue.
    pub queued: &'a [TaskId],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningDecision {
    pub to_create: Vec<VmId>,
    pub to_destroy: Vec<VmId>,
    pub keep_alive: Vec<VmId>,
}

impl ProvisioningDecision {
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_destroy.is_empty()
    }
}

pub trait VmProvisioner: Debug {
    fn provision(&mut self, ctx: &ProvisioningContext<'_>) -> ProvisioningDecision;
}

/// Keeps the current VM set as it is.
#[derive(Debug, Default)]
pub struct SimpleVmProvisioner;

impl VmProvisioner for SimpleVmProvisioner {
    fn provision(&mut self, ctx: &ProvisioningContext<'_>) -> ProvisioningDecision {
        ProvisioningDecision { keep_alive: ctx.created.to_vec(), ..ProvisioningDecision::default() }
    }
}

/// Churns only when a queued task is assigned to a VM that is not created. It then frees the created VMs no queued
/// task is assigned to, retries every VM whose creation failed and creates the missing ones. With nothing waiting on
/// a missing VM it keeps the current set, so VMs whose children have not arrived yet stay up.
///
/// Freeing a VM gives its cores back to the host, which is what lets a failed VM fit on a later round.
#[derive(Debug, Default)]
pub struct ElasticVmProvisioner;

impl VmProvisioner for ElasticVmProvisioner {
    fn provision(&mut self, ctx: &ProvisioningContext<'_>) -> ProvisioningDecision {
        let wanted: BTreeSet<&VmId> = ctx.queued.iter().filter_map(|task| ctx.ledger.vm_of(task)).collect();
        let missing: Vec<&VmId> = wanted.iter().copied().filter(|vm| !ctx.created.contains(vm)).collect();
        if missing.is_empty() {
            return ProvisioningDecision { keep_alive: ctx.created.to_vec(), ..ProvisioningDecision::default() };
        }

        let (keep_alive, to_destroy): (Vec<VmId>, Vec<VmId>) = ctx.created.iter().cloned().partition(|vm| wanted.contains(vm));
        let mut to_create = ctx.failed.to_vec();
        for vm in missing {
            if !to_create.contains(vm) {
                to_create.push(vm.clone());
            }
        }

        ProvisioningDecision { to_create, to_destroy, keep_alive }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_elastic_frees_idle_vms_and_retries_failed() {
        let created = vec![VmId::new("vm-0"), VmId::new("vm-1")];
        let failed = vec![VmId::new("vm-2")];
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("t1"), VmId::new("vm-1")), (TaskId::new("t2"), VmId::new("vm-2"))]));
        let queued = vec![TaskId::new("t1"), TaskId::new("t2")];
        let (completed, dispatched) = (BTreeSet::new(), BTreeSet::new());
        let ctx = ProvisioningContext { failed: &failed, created: &created, all: &[], ledger: &ledger, completed: &completed, dispatched: &dispatched, queued: &queued };

        let decision = ElasticVmProvisioner.provision(&ctx);

        assert_eq!(decision.to_destroy, vec![VmId::new("vm-0")]);
        assert_eq!(decision.keep_alive, vec![VmId::new("vm-1")]);
        assert_eq!(decision.to_create, vec![VmId::new("vm-2")]);
    }

    #[test]
    fn test_elastic_keeps_idle_vms_when_nothing_waits() {
        let created = vec![VmId::new("vm-0"), VmId::new("vm-1")];
        let failed = vec![VmId::new("vm-2")];
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("t0"), VmId::new("vm-0"))]));
        let (completed, dispatched) = (BTreeSet::from([TaskId::new("t0")]), BTreeSet::from([TaskId::new("t0")]));
        let ctx = ProvisioningContext { failed: &failed, created: &created, all: &[], ledger: &ledger, completed: &completed, dispatched: &dispatched, queued: &[] };

        let decision = ElasticVmProvisioner.provision(&ctx);

        assert!(decision.is_noop());
        assert_eq!(decision.keep_alive, created);
    }

    #[test]
    fn test_simple_keeps_everything() {
        let created = vec![VmId::new("vm-0")];
        let (completed, dispatched, ledger) = (BTreeSet::new(), BTreeSet::new(), AssignmentLedger::new());
        let ctx = ProvisioningContext { failed: &[], created: &created, all: &[], ledger: &ledger, completed: &completed, dispatched: &dispatched, queued: &[] };

        assert!(SimpleVmProvisioner.provision(&ctx).is_noop());
    }
}
