use std::collections::BTreeMap;

use crate::domain::utils::id::{TaskId, VmId};

/// Task -> VM assignments accumulated over dispatch rounds.
///
/// Each round reads the current ledger, computes a delta and replaces the ledger with `ledger.merge(delta)`.
/// Later assignments win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentLedger {
    assignments: BTreeMap<TaskId, VmId>,
}

impl AssignmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self, delta: BTreeMap<TaskId, VmId>) -> Self {
        self.assignments.extend(delta);
        self
    }

    pub fn vm_of(&self, task: &TaskId) -> Option<&VmId> {
        self.assignments.get(task)
    }

    pub fn tasks_on<'a>(&'a self, vm: &'a VmId) -> impl Iterator<Item = &'a TaskId> + 'a {
        self.assignments.iter().filter(move |(_, assigned)| *assigned == vm).map(|(task, _)| task)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &VmId)> {
        self.assignments.iter()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overrides_and_keeps_old_entries() {
        let ledger = AssignmentLedger::new().merge(BTreeMap::from([(TaskId::new("t0"), VmId::new("vm-0")), (TaskId::new("t1"), VmId::new("vm-0"))]));
        let ledger = ledger.merge(BTreeMap::from([(TaskId::new("t1"), VmId::new("vm-1"))]));

        assert_eq!(ledger.vm_of(&TaskId::new("t0")), Some(&VmId::new("vm-0")));
        assert_eq!(ledger.vm_of(&TaskId::new("t1")), Some(&VmId::new("vm-1")));
        assert_eq!(ledger.tasks_on(&VmId::new("vm-0")).count(), 1);
    }
}
