use std::any::Any;
use std::collections::BTreeSet;

use crate::domain::entity::message::Message;
use crate::domain::simulator::entity_trait::Entity;
use crate::domain::simulator::event::{EntityId, Event};
use crate::domain::simulator::simulator::SimContext;
use crate::domain::utils::id::TaskId;
use crate::domain::workflow::task::{Task, TaskStatus};
use crate::error::{Error, Result};

/// Releases tasks to the broker once every parent finished its first cycle, and resubmits failed executions.
#[derive(Debug)]
pub struct WorkflowEngine {
    id: EntityId,
    broker: EntityId,
    waiting: Vec<Task>,
    completed: BTreeSet<TaskId>,
    resubmissions: u32,
}

impl WorkflowEngine {
    pub fn new(id: EntityId, broker: EntityId) -> Self {
        WorkflowEngine { id, broker, waiting: Vec::new(), completed: BTreeSet::new(), resubmissions: 0 }
    }

    pub fn waiting(&self) -> &[Task] {
        &self.waiting
    }

    pub fn completed(&self) -> &BTreeSet<TaskId> {
        &self.completed
    }

    pub fn resubmissions(&self) -> u32 {
        self.resubmissions
    }

    fn is_released(&self, task: &Task) -> bool {
        task.parents.iter().all(|parent| self.completed.contains(parent))
    }

    fn on_incoming_task(&mut self, task: Task, ctx: &mut SimContext<'_>) {
        if self.is_released(&task) {
            ctx.send_now(self.broker, Message::IncomingTask(task));
        } else {
            log::debug!("Task {} waits for {} parent(s).", task.id, task.parents.len());
            self.waiting.push(task);
        }
    }

    fn on_task_is_done(&mut self, mut task: Task, ctx: &mut SimContext<'_>) {
        if let TaskStatus::Failed(instant) = task.status {
            task.record_failure(instant);
            task.status = TaskStatus::Created;
            self.resubmissions += 1;
            log::info!("Resubmitting task {} (cycle {}) after failure at {}.", task.id, task.cycle(), instant);
            ctx.schedule_self(0.0, Message::IncomingTask(task));
            return;
        }

        if !self.completed.insert(task.id.clone()) {
            return;
        }

        let (released, still_waiting): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.waiting).into_iter().partition(|waiting| self.is_released(waiting));
        self.waiting = still_waiting;
        for task in released {
            ctx.send_now(self.broker, Message::IncomingTask(task));
        }
    }
}

impl Entity for WorkflowEngine {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        "workflow-engine"
    }

    fn handle(&mut self, event: Event, ctx: &mut SimContext<'_>) -> Result<()> {
        match event.message {
            Message::IncomingTask(task) => self.on_incoming_task(task, ctx),
            Message::TaskIsDone(task) => self.on_task_is_done(task, ctx),
            other => return Err(Error::ProtocolViolation { entity: self.name().to_string(), detail: format!("unexpected event '{}'", other.tag()) }),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
