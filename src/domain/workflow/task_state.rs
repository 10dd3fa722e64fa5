use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::simulator::event::SimTime;

/// Timestamps of one cycle. A phase that has not happened yet is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleState {
    pub enter_broker_queue: Option<SimTime>,
    pub exit_broker_queue: Option<SimTime>,
    pub enter_device_queue: Option<SimTime>,
    pub exit_device_queue: Option<SimTime>,
    pub start_execution: Option<SimTime>,
    pub end_execution: Option<SimTime>,
}

/// Per-cycle history of a task. Each cycle's entry is written by whoever owns that phase:
/// the broker around dispatch and return, the device while the task waits and runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    cycles: BTreeMap<u32, CycleState>,
}

impl TaskState {
    pub fn cycle(&self, cycle: u32) -> Option<&CycleState> {
        self.cycles.get(&cycle)
    }

    pub fn cycles(&self) -> impl Iterator<Item = (u32, &CycleState)> {
        self.cycles.iter().map(|(cycle, state)| (*cycle, state))
    }

    fn entry(&mut self, cycle: u32) -> &mut CycleState {
        self.cycles.entry(cycle).or_default()
    }

    pub fn set_enter_broker_queue(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).enter_broker_queue = Some(time);
    }

    pub fn set_exit_broker_queue(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).exit_broker_queue = Some(time);
    }

    pub fn set_enter_device_queue(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).enter_device_queue = Some(time);
    }

    pub fn set_exit_device_queue(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).exit_device_queue = Some(time);
    }

    pub fn set_start_execution(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).start_execution = Some(time);
    }

    pub fn set_end_execution(&mut self, cycle: u32, time: SimTime) {
        self.entry(cycle).end_execution = Some(time);
    }

    /// `[start, end]` of the cycle's execution, if both ends are known.
    pub fn execution_window(&self, cycle: u32) -> Option<(SimTime, SimTime)> {
        let state = self.cycles.get(&cycle)?;
        Some((state.start_execution?, state.end_execution?))
    }
}
