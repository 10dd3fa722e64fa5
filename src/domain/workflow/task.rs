use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::rngs::StdRng;

use crate::domain::simulator::event::{EntityId, SimTime};
use crate::domain::utils::id::{TaskId, VmId, WorkflowId};
use crate::domain::workflow::data::Data;
use crate::domain::workflow::models::{ExecutionModel, FractionalSelectivity, PeriodicExecutionModel, SelectivityModel};
use crate::domain::workflow::task_state::TaskState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskStatus {
    Created,
    Success,
    /// Execution hit a sampled failure instant; the task made no progress.
    Failed(SimTime),
}

/// Placement hints from the workflow description. Absent means auto-assign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceHints {
    pub vm: Option<VmId>,
    /// Informational only. No built-in strategy reserves ram or bandwidth per task; custom mappers may read them.
    pub ram: Option<u64>,
    pub bw: Option<u64>,
}

/// The mutable record of one task as it moves through engine, broker and device.
///
/// A record describes exactly one cycle. Finishing a cycle produces the next record through [`Task::next_cycle`];
/// the timestamps of earlier cycles stay available through [`Task::state`].
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub workflow_id: WorkflowId,
    /// Million instructions.
    pub length: u64,
    pub cores: u32,
    input_files: Vec<Data>,
    output_files: BTreeMap<String, u64>,
    declared_children: Option<Vec<TaskId>>,
    pub children: Vec<TaskId>,
    pub parents: BTreeSet<TaskId>,
    /// Absolute time by which every cycle should have ended. Reported, never enforced.
    pub deadline: Option<SimTime>,
    pub entry_time: SimTime,
    cycle: u32,
    generated_data: BTreeMap<u32, bool>,
    pub state: TaskState,
    failures: Vec<SimTime>,
    pub status: TaskStatus,
    selectivity: Arc<dyn SelectivityModel>,
    execution: Arc<dyn ExecutionModel>,
    pub hints: ResourceHints,
    /// VM chosen by the broker's task mapper.
    pub vm: Option<VmId>,
    /// Broker entity that receives the task back from the device.
    pub owner: Option<EntityId>,
}

impl Task {
    pub fn new(id: impl Into<String>, workflow_id: impl Into<String>, length: u64) -> Self {
        Task {
            id: TaskId::new(id),
            workflow_id: WorkflowId::new(workflow_id),
            length,
            cores: 1,
            input_files: Vec::new(),
            output_files: BTreeMap::new(),
            declared_children: None,
            children: Vec::new(),
            parents: BTreeSet::new(),
            deadline: None,
            entry_time: 0.0,
            cycle: 0,
            generated_data: BTreeMap::new(),
            state: TaskState::default(),
            failures: Vec::new(),
            status: TaskStatus::Created,
            selectivity: Arc::new(FractionalSelectivity::new(1.0)),
            execution: Arc::new(PeriodicExecutionModel::new(1.0)),
            hints: ResourceHints::default(),
            vm: None,
            owner: None,
        }
    }

    pub fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    /// Adds an input file produced by `source`. Use the task's own id for external inputs.
    pub fn with_input(mut self, file_name: impl Into<String>, source: impl Into<String>, size: u64) -> Self {
        let data = Data { file_name: file_name.into(), source: TaskId::new(source), destination: self.id.clone(), size };
        self.input_files.push(data);
        self
    }

    pub fn with_output(mut self, file_name: impl Into<String>, size: u64) -> Self {
        self.output_files.insert(file_name.into(), size);
        self
    }

    pub fn with_children(mut self, children: &[&str]) -> Self {
        self.declared_children = Some(children.iter().map(|child| TaskId::new(*child)).collect());
        self
    }

    pub fn with_declared_children(mut self, children: Option<Vec<TaskId>>) -> Self {
        self.declared_children = children;
        self
    }

    pub fn with_entry_time(mut self, entry_time: SimTime) -> Self {
        self.entry_time = entry_time;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<SimTime>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_selectivity(mut self, model: Arc<dyn SelectivityModel>) -> Self {
        self.selectivity = model;
        self
    }

    pub fn with_execution_model(mut self, model: Arc<dyn ExecutionModel>) -> Self {
        self.execution = model;
        self
    }

    pub fn with_hints(mut self, hints: ResourceHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_pinned_vm(mut self, vm: impl Into<String>) -> Self {
        self.hints.vm = Some(VmId::new(vm));
        self
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// `true` when a cycle that ended at `end` finished after the deadline.
    pub fn misses_deadline(&self, end: Option<SimTime>) -> bool {
        matches!((self.deadline, end), (Some(deadline), Some(end)) if end > deadline)
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn input_files(&self) -> &[Data] {
        &self.input_files
    }

    pub fn output_files(&self) -> &BTreeMap<String, u64> {
        &self.output_files
    }

    pub(crate) fn declared_children(&self) -> Option<&[TaskId]> {
        self.declared_children.as_deref()
    }

    pub fn input_size(&self) -> u64 {
        self.input_files.iter().map(|data| data.size).sum()
    }

    pub fn output_size(&self) -> u64 {
        self.output_files.values().sum()
    }

    pub fn output_file_size(&self, file_name: &str) -> Option<u64> {
        self.output_files.get(file_name).copied()
    }

    /// Names of the files this task reads from `parent`.
    pub fn needed_from(&self, parent: &TaskId) -> Vec<String> {
        self.input_files.iter().filter(|data| &data.source == parent).map(|data| data.file_name.clone()).collect()
    }

    /// Decides whether `cycle` produces data. The first call per cycle consults the selectivity model,
    /// every later call replays that decision.
    pub fn want_to_generate_data(&mut self, cycle: u32, clock: SimTime, rng: &mut StdRng) -> bool {
        let selectivity = &self.selectivity;
        *self.generated_data.entry(cycle).or_insert_with(|| selectivity.generate_data(clock, rng))
    }

    /// The decision for `cycle`, if it was already taken.
    pub fn generated_data(&self, cycle: u32) -> Option<bool> {
        self.generated_data.get(&cycle).copied()
    }

    /// Records that `cycle` produced nothing because a parent delivered no data.
    pub fn mark_no_data(&mut self, cycle: u32) {
        self.generated_data.insert(cycle, false);
    }

    pub fn next_execution_time(&self, clock: SimTime) -> SimTime {
        self.execution.next_execution_time(clock)
    }

    pub fn failures(&self) -> &[SimTime] {
        &self.failures
    }

    pub fn record_failure(&mut self, instant: SimTime) {
        self.failures.push(instant);
    }

    /// Derives the record for the following cycle. Dependency topology, models, data decisions, assignment,
    /// owner and history carry over; the status starts fresh and the new cycle has no timestamps yet.
    pub fn next_cycle(&self) -> Task {
        let mut next = self.clone();
        next.cycle = self.cycle + 1;
        next.status = TaskStatus::Created;
        next
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, TaskStatus::Failed(_))
    }

    pub fn same_models(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.selectivity, &other.selectivity) && Arc::ptr_eq(&self.execution, &other.execution)
    }
}
