use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::domain::failure::failure_monitor::FailureRecord;
use crate::domain::simulator::event::SimTime;
use crate::domain::utils::id::{DeviceId, TaskId, VmId, WorkflowId};
use crate::domain::workflow::task::Task;
use crate::domain::workflow::task_state::CycleState;
use crate::error::Result;

/// Timestamps and data decision of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub cycle: u32,
    #[serde(flatten)]
    pub state: CycleState,
    pub generated_data: Option<bool>,
    /// The cycle ended after the task's deadline.
    pub missed_deadline: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub workflow_id: WorkflowId,
    pub vm: Option<VmId>,
    pub device: Option<DeviceId>,
    /// Cycle the task record is in at the end of the run.
    pub cycle: u32,
    pub deadline: Option<SimTime>,
    pub cycles: Vec<CycleRecord>,
    pub failures: Vec<SimTime>,
}

impl TaskReport {
    pub fn from_task(task: &Task, device: Option<DeviceId>) -> Self {
        let cycles = task
            .state
            .cycles()
            .map(|(cycle, state)| CycleRecord {
                cycle,
                state: state.clone(),
                generated_data: task.generated_data(cycle),
                missed_deadline: task.misses_deadline(state.end_execution),
            })
            .collect();

        TaskReport {
            task_id: task.id.clone(),
            workflow_id: task.workflow_id.clone(),
            vm: task.vm.clone(),
            device,
            cycle: task.cycle(),
            deadline: task.deadline,
            cycles,
            failures: task.failures().to_vec(),
        }
    }

    pub fn cycle_record(&self, cycle: u32) -> Option<&CycleRecord> {
        self.cycles.iter().find(|record| record.cycle == cycle)
    }

    /// Cycles that ran to the end of an execution.
    pub fn finished_cycles(&self) -> usize {
        self.cycles.iter().filter(|record| record.state.end_execution.is_some()).count()
    }

    pub fn missed_deadlines(&self) -> usize {
        self.cycles.iter().filter(|record| record.missed_deadline).count()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationReport {
    pub final_time: SimTime,
    pub events_processed: u64,
    pub tasks: BTreeMap<TaskId, TaskReport>,
    pub failure_records: Vec<FailureRecord>,
}

/// One CSV line: a task cycle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow<'a> {
    task: &'a str,
    workflow: &'a str,
    vm: Option<&'a str>,
    device: Option<&'a str>,
    cycle: u32,
    enter_broker_queue: Option<SimTime>,
    exit_broker_queue: Option<SimTime>,
    enter_device_queue: Option<SimTime>,
    exit_device_queue: Option<SimTime>,
    start_execution: Option<SimTime>,
    end_execution: Option<SimTime>,
    generated_data: Option<bool>,
    deadline: Option<SimTime>,
    missed_deadline: bool,
    failures: usize,
}

impl SimulationReport {
    pub fn task(&self, id: &str) -> Option<&TaskReport> {
        self.tasks.get(id)
    }

    pub fn failure_count(&self) -> usize {
        self.tasks.values().map(|task| task.failures.len()).sum()
    }

    /// Writes one `;`-separated row per task cycle, with a header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new().delimiter(b';').from_writer(writer);

        for report in self.tasks.values() {
            for record in &report.cycles {
                csv_writer.serialize(CsvRow {
                    task: report.task_id.as_str(),
                    workflow: report.workflow_id.as_str(),
                    vm: report.vm.as_ref().map(|vm| vm.as_str()),
                    device: report.device.as_ref().map(|device| device.as_str()),
                    cycle: record.cycle,
                    enter_broker_queue: record.state.enter_broker_queue,
                    exit_broker_queue: record.state.exit_broker_queue,
                    enter_device_queue: record.state.enter_device_queue,
                    exit_device_queue: record.state.exit_device_queue,
                    start_execution: record.state.start_execution,
                    end_execution: record.state.end_execution,
                    generated_data: record.generated_data,
                    deadline: report.deadline,
                    missed_deadline: record.missed_deadline,
                    failures: report.failures.len(),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_csv_has_header_and_one_row_per_cycle() {
        let mut task = Task::new("t0", "wf", 100).with_deadline(Some(1.0));
        task.state.set_start_execution(0, 0.0);
        task.state.set_end_execution(0, 0.5);
        task.want_to_generate_data(0, 0.5, &mut StdRng::seed_from_u64(0));
        task.state.set_start_execution(1, 2.0);

        let mut report = SimulationReport::default();
        report.tasks.insert(task.id.clone(), TaskReport::from_task(&task, Some(DeviceId::new("edge"))));

        let mut buffer = Vec::new();
        report.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("task;workflow;vm;device;cycle;"));
        assert_eq!(lines[1], "t0;wf;;edge;0;;;;;0.0;0.5;true;1.0;false;0");
    }

    #[test]
    fn test_cycles_ending_after_deadline_are_flagged() {
        let mut task = Task::new("t0", "wf", 100).with_deadline(Some(1.0));
        task.state.set_end_execution(0, 1.0);
        task.state.set_end_execution(1, 2.5);
        task.state.set_start_execution(2, 3.0);

        let report = TaskReport::from_task(&task, None);

        assert_eq!(report.deadline, Some(1.0));
        assert!(!report.cycle_record(0).unwrap().missed_deadline, "Ending exactly on the deadline meets it");
        assert!(report.cycle_record(1).unwrap().missed_deadline);
        assert!(!report.cycle_record(2).unwrap().missed_deadline, "An unfinished cycle has not missed anything yet");
        assert_eq!(report.missed_deadlines(), 1);
    }
}
