use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::simulator::event::SimTime;
use crate::domain::utils::id::{TaskId, VmId, WorkflowId};
use crate::domain::workflow::task::Task;
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorMode {
    #[default]
    None,
    All,
    Vm,
}

impl FromStr for MonitorMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "monitor_none" => Ok(MonitorMode::None),
            "all" | "monitor_all" => Ok(MonitorMode::All),
            "vm" | "monitor_vm" => Ok(MonitorMode::Vm),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "monitor mode", name: s.to_string() }),
        }
    }
}

/// One failure check of a finished execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub time: SimTime,
    pub task: TaskId,
    pub workflow: WorkflowId,
    pub cycle: u32,
    pub vm: Option<VmId>,
    pub failed: bool,
    pub instant: Option<SimTime>,
}

#[derive(Debug, Clone, Default)]
pub struct FailureMonitor {
    mode: MonitorMode,
    records: Vec<FailureRecord>,
    failures_per_vm: BTreeMap<VmId, usize>,
}

impl FailureMonitor {
    pub fn new(mode: MonitorMode) -> Self {
        FailureMonitor { mode, records: Vec::new(), failures_per_vm: BTreeMap::new() }
    }

    pub fn record(&mut self, time: SimTime, task: &Task, instant: Option<SimTime>) {
        if self.mode == MonitorMode::None {
            return;
        }

        self.records.push(FailureRecord {
            time,
            task: task.id.clone(),
            workflow: task.workflow_id.clone(),
            cycle: task.cycle(),
            vm: task.vm.clone(),
            failed: instant.is_some(),
            instant,
        });

        if self.mode == MonitorMode::Vm && instant.is_some() {
            if let Some(vm) = &task.vm {
                *self.failures_per_vm.entry(vm.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn mode(&self) -> MonitorMode {
        self.mode
    }

    pub fn records(&self) -> &[FailureRecord] {
        &self.records
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|record| record.failed).count()
    }

    /// Only populated in `MonitorMode::Vm`.
    pub fn failures_per_vm(&self) -> &BTreeMap<VmId, usize> {
        &self.failures_per_vm
    }
}
