use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::api::workflow_dto::{TaskDto, WorkflowDto};
use crate::domain::utils::id::{TaskId, VmId, WorkflowId};
use crate::domain::workflow::models::{FractionalSelectivity, PeriodicExecutionModel};
use crate::domain::workflow::task::{ResourceHints, Task};
use crate::error::ConfigurationError;

/// Owns the tasks of one workflow. Tasks refer to each other by id only.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: WorkflowId,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, tasks: Vec<Task>) -> Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateTask(task.id.clone()));
            }
        }
        Ok(Workflow { id: WorkflowId::new(id), tasks, index })
    }

    /// **Phase 1:** Resolves file ownership (which sibling produces which file), then builds every task.
    pub fn from_dto(dto: WorkflowDto) -> Result<Self, ConfigurationError> {
        let mut file_owner: HashMap<&str, &str> = HashMap::new();
        for task in &dto.tasks {
            for file in &task.output_files {
                file_owner.insert(file.name.as_str(), task.id.as_str());
            }
        }

        let tasks = dto.tasks.iter().map(|task_dto| Self::build_task(&dto.id, task_dto, &file_owner)).collect();

        Workflow::new(dto.id.clone(), tasks)
    }

    fn build_task(workflow_id: &str, dto: &TaskDto, file_owner: &HashMap<&str, &str>) -> Task {
        let mut task = Task::new(dto.id.clone(), workflow_id, dto.length)
            .with_cores(dto.cores)
            .with_entry_time(dto.entry_time)
            .with_deadline(dto.deadline)
            .with_selectivity(Arc::new(FractionalSelectivity::new(dto.selectivity)))
            .with_execution_model(Arc::new(PeriodicExecutionModel::new(dto.execution_period)))
            .with_hints(ResourceHints { vm: dto.vm.clone().map(VmId::new), ram: dto.ram, bw: dto.bw })
            .with_declared_children(dto.children.as_ref().map(|children| children.iter().map(|child| TaskId::new(child.as_str())).collect()));

        for file in &dto.input_files {
            let source = file.from.as_deref().or_else(|| file_owner.get(file.name.as_str()).copied()).unwrap_or(dto.id.as_str());
            task = task.with_input(file.name.clone(), source, file.size);
        }
        for file in &dto.output_files {
            task = task.with_output(file.name.clone(), file.size);
        }
        task
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// **Phase 2:** Populates parent and child edges.
    ///
    /// Children come from the declared list when there is one, otherwise from the siblings that read one of this
    /// task's files. Every child gets a parent edge back. Self-loops are dropped.
    pub fn connect_dependencies(&mut self) -> Result<(), ConfigurationError> {
        for task in &self.tasks {
            for data in task.input_files() {
                if !self.index.contains_key(&data.source) {
                    return Err(self.unknown_reference(&task.id, &data.source));
                }
            }
        }

        let mut edges: Vec<(usize, usize)> = Vec::new();
        for (parent_idx, task) in self.tasks.iter().enumerate() {
            let children: Vec<TaskId> = match task.declared_children() {
                Some(declared) => declared.to_vec(),
                None => self
                    .tasks
                    .iter()
                    .filter(|other| other.input_files().iter().any(|data| data.source == task.id && !data.is_external()))
                    .map(|other| other.id.clone())
                    .collect(),
            };

            for child in children {
                if child == task.id {
                    log::debug!("Skipping self-loop on task {} in workflow {}.", task.id, self.id);
                    continue;
                }
                let Some(&child_idx) = self.index.get(&child) else {
                    return Err(self.unknown_reference(&task.id, &child));
                };
                edges.push((parent_idx, child_idx));
            }
        }

        for task in self.tasks.iter_mut() {
            task.children.clear();
            task.parents.clear();
        }
        for (parent_idx, child_idx) in edges {
            let parent_id = self.tasks[parent_idx].id.clone();
            let child_id = self.tasks[child_idx].id.clone();

            if !self.tasks[parent_idx].children.contains(&child_id) {
                self.tasks[parent_idx].children.push(child_id);
            }
            self.tasks[child_idx].parents.insert(parent_id);
        }

        log::debug!("Workflow {} connected: {} tasks, {} roots.", self.id, self.tasks.len(), self.tasks.iter().filter(|t| t.is_root()).count());
        Ok(())
    }

    fn unknown_reference(&self, task: &TaskId, reference: &TaskId) -> ConfigurationError {
        ConfigurationError::UnknownTaskReference { workflow: self.id.clone(), task: task.clone(), reference: reference.to_string() }
    }

    /// **Phase 3:** `true` iff the child edges form a DAG over known sibling ids.
    pub fn validate(&self) -> bool {
        let mut discovered = vec![false; self.tasks.len()];
        let mut processed = vec![false; self.tasks.len()];

        for root in 0..self.tasks.len() {
            if discovered[root] {
                continue;
            }

            // Iterative DFS. A child that is discovered but not yet processed is a back edge.
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            discovered[root] = true;

            while let Some((node, next_child)) = stack.pop() {
                let children = &self.tasks[node].children;
                if next_child >= children.len() {
                    processed[node] = true;
                    continue;
                }
                stack.push((node, next_child + 1));

                let Some(&child) = self.index.get(&children[next_child]) else {
                    return false;
                };
                if discovered[child] && !processed[child] {
                    return false;
                }
                if !discovered[child] {
                    discovered[child] = true;
                    stack.push((child, 0));
                }
            }
        }
        true
    }

    /// Every parent reference points at a sibling.
    pub fn parents_are_siblings(&self) -> bool {
        let ids: HashSet<&TaskId> = self.tasks.iter().map(|task| &task.id).collect();
        self.tasks.iter().all(|task| task.parents.iter().all(|parent| ids.contains(parent)))
    }
}
