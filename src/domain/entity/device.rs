use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::entity::message::{DataTransfer, Message, StageOutRequest};
use crate::domain::resource::host::ResourceHost;
use crate::domain::resource::link::{LinkDirection, LinkEndpoint, PendingTransfer};
use crate::domain::resource::vm::Vm;
use crate::domain::simulator::entity_trait::Entity;
use crate::domain::simulator::event::{EntityId, Event};
use crate::domain::simulator::simulator::SimContext;
use crate::domain::topology::topology::DeviceSpec;
use crate::domain::utils::id::{DeviceId, TaskId, VmId};
use crate::domain::workflow::task::Task;
use crate::error::{ConfigurationError, Error, Result};

/// Whether a registered task may run in its current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Every parent delivered data.
    Ready,
    /// Some parent announced that it produced nothing.
    NoData,
    Waiting,
}

/// Agent of one topology node: owns hosts and VMs, the contended links, and the parent-data gate of every task
/// dispatched to it.
#[derive(Debug)]
pub struct DeviceAgent {
    id: EntityId,
    device_id: DeviceId,
    resources: ResourceHost,
    links: LinkEndpoint,
    /// destination -> next hop, fixed at setup.
    routes: BTreeMap<DeviceId, DeviceId>,
    directory: HashMap<DeviceId, EntityId>,
    tasks: HashMap<TaskId, Task>,
    waiting: Vec<TaskId>,
    /// (parent, has_data) pairs received per consumer cycle.
    received: BTreeMap<u32, HashSet<(TaskId, bool)>>,
}

impl DeviceAgent {
    pub fn new(id: EntityId, spec: &DeviceSpec, routes: BTreeMap<DeviceId, DeviceId>) -> Self {
        DeviceAgent {
            id,
            device_id: spec.id.clone(),
            resources: ResourceHost::new(&spec.hosts),
            links: LinkEndpoint::new(spec.uplink_bw, spec.downlink_bw),
            routes,
            directory: HashMap::new(),
            tasks: HashMap::new(),
            waiting: Vec::new(),
            received: BTreeMap::new(),
        }
    }

    /// Entity keys of the other devices, used to address next hops.
    pub fn set_directory(&mut self, directory: HashMap<DeviceId, EntityId>) {
        self.directory = directory;
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn bound_vms(&self) -> Vec<VmId> {
        self.resources.bound_vms()
    }

    pub fn links(&self) -> &LinkEndpoint {
        &self.links
    }

    pub fn routes(&self) -> &BTreeMap<DeviceId, DeviceId> {
        &self.routes
    }

    pub fn waiting_tasks(&self) -> &[TaskId] {
        &self.waiting
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn received(&self, cycle: u32) -> Option<&HashSet<(TaskId, bool)>> {
        self.received.get(&cycle)
    }

    pub fn readiness(&self, task: &Task) -> Readiness {
        let received = self.received.get(&task.cycle());
        let has = |parent: &TaskId, has_data: bool| received.is_some_and(|set| set.contains(&(parent.clone(), has_data)));

        if task.parents.iter().all(|parent| has(parent, true)) {
            return Readiness::Ready;
        }
        if task.parents.iter().any(|parent| has(parent, false)) {
            return Readiness::NoData;
        }
        Readiness::Waiting
    }

    fn violation(&self, detail: String) -> Error {
        Error::ProtocolViolation { entity: self.device_id.to_string(), detail }
    }

    fn on_resource_request(&mut self, source: EntityId, ctx: &mut SimContext<'_>) {
        let characteristics = self.resources.characteristics(&self.device_id, self.links.uplink.bandwidth(), self.links.downlink.bandwidth());
        ctx.send_now(source, Message::ResourceResponse(characteristics));
    }

    fn on_vm_create(&mut self, vm: Vm, source: EntityId, ctx: &mut SimContext<'_>) {
        let created = self.resources.allocate(&vm);
        if created {
            log::debug!("Device {} bound vm {} on host {:?}.", self.device_id, vm.id, self.resources.host_of(&vm.id));
        } else {
            log::warn!("Device {} has no host for vm {} ({} cores, {} MIPS).", self.device_id, vm.id, vm.spec.cores, vm.spec.mips);
        }
        ctx.send_now(source, Message::VmCreateAck { vm: vm.id, device: self.device_id.clone(), created });
    }

    fn on_vm_destroy(&mut self, vm: VmId, source: EntityId, ctx: &mut SimContext<'_>) {
        if !self.resources.deallocate(&vm) {
            log::debug!("Device {} asked to destroy vm {} which is not bound here.", self.device_id, vm);
        }
        ctx.send_now(source, Message::VmDestroyAck { vm, device: self.device_id.clone() });
    }

    fn on_execute_task(&mut self, mut task: Task, vm: VmId, ctx: &mut SimContext<'_>) -> Result<()> {
        if !self.resources.is_bound(&vm) {
            return Err(self.violation(format!("task {} dispatched to vm {} which is not bound here", task.id, vm)));
        }

        let task_id = task.id.clone();
        task.vm = Some(vm);
        task.state.set_enter_device_queue(task.cycle(), ctx.now());
        self.tasks.insert(task_id.clone(), task);

        self.try_release(&task_id, ctx)?;
        Ok(())
    }

    fn on_execute_task_with_data(&mut self, task: Task, vm: VmId, ctx: &mut SimContext<'_>) {
        let delay = self.links.downlink.transfer_delay(task.input_size(), true);
        log::debug!("Device {} stages in {} bytes for root task {}.", self.device_id, task.input_size(), task.id);
        let transfer = PendingTransfer { target: self.id, delay, message: Message::ExecuteTask { task, vm } };
        self.submit_transfer(LinkDirection::Downlink, transfer, ctx);
    }

    /// Starts or short-circuits the task if its parents allow it, otherwise parks it. Returns `true` if it left the
    /// waiting list.
    fn try_release(&mut self, task_id: &TaskId, ctx: &mut SimContext<'_>) -> Result<bool> {
        let Some(task) = self.tasks.get(task_id) else {
            return Ok(false);
        };

        match self.readiness(task) {
            Readiness::Ready => {
                self.start_execution(task_id, ctx)?;
                self.prune_received();
                Ok(true)
            }
            Readiness::NoData => {
                self.short_circuit(task_id, ctx)?;
                self.prune_received();
                Ok(true)
            }
            Readiness::Waiting => {
                if !self.waiting.contains(task_id) {
                    log::debug!("Device {}: task {} waits for parent data (cycle {}).", self.device_id, task_id, task.cycle());
                    self.waiting.push(task_id.clone());
                }
                Ok(false)
            }
        }
    }

    /// Drops parent data for cycles every consumer registered here has already moved past.
    fn prune_received(&mut self) {
        let Some(lowest) = self.tasks.values().filter(|task| !task.is_root()).map(Task::cycle).min() else {
            return;
        };
        self.received.retain(|cycle, _| *cycle >= lowest);
    }

    fn start_execution(&mut self, task_id: &TaskId, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let Some(task) = self.tasks.get_mut(task_id) else {
            return Err(Error::ProtocolViolation { entity: self.device_id.to_string(), detail: format!("unknown task {}", task_id) });
        };
        let Some(vm) = task.vm.clone() else {
            return Err(Error::ProtocolViolation { entity: self.device_id.to_string(), detail: format!("task {} has no vm", task_id) });
        };

        let Some((start, finish)) = self.resources.submit(&vm, task.length, task.cores, now) else {
            return Err(Error::ProtocolViolation { entity: self.device_id.to_string(), detail: format!("vm {} vanished under task {}", vm, task_id) });
        };

        let cycle = task.cycle();
        task.state.set_exit_device_queue(cycle, now);
        task.state.set_start_execution(cycle, start);
        self.waiting.retain(|waiting| waiting != task_id);

        log::debug!("Device {}: task {} (cycle {}) runs on vm {} from {} to {}.", self.device_id, task_id, cycle, vm, start, finish);
        ctx.schedule_self(finish - now, Message::ComputeFinished { task: task_id.clone(), vm });
        Ok(())
    }

    /// A parent produced nothing this cycle, so neither does this task. It goes back to its broker without running.
    fn short_circuit(&mut self, task_id: &TaskId, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let Some(task) = self.tasks.get_mut(task_id) else {
            return Err(Error::ProtocolViolation { entity: self.device_id.to_string(), detail: format!("unknown task {}", task_id) });
        };

        let cycle = task.cycle();
        task.mark_no_data(cycle);
        task.state.set_exit_device_queue(cycle, now);
        task.state.set_start_execution(cycle, now);
        let owner = task.owner;
        let returned = task.clone();
        self.waiting.retain(|waiting| waiting != task_id);

        let owner = owner.ok_or_else(|| self.violation(format!("task {} has no owning broker", task_id)))?;
        log::debug!("Device {}: task {} (cycle {}) short-circuits, a parent sent no data.", self.device_id, task_id, cycle);
        ctx.send_now(owner, Message::TaskReturned { task: returned, executed: false });
        Ok(())
    }

    fn on_compute_finished(&mut self, task_id: TaskId, vm: VmId, ctx: &mut SimContext<'_>) -> Result<()> {
        self.resources.complete(&vm);

        let task = self.tasks.get(&task_id).cloned().ok_or_else(|| self.violation(format!("finished unknown task {}", task_id)))?;
        let owner = task.owner.ok_or_else(|| self.violation(format!("task {} has no owning broker", task_id)))?;
        ctx.send_now(owner, Message::TaskReturned { task, executed: true });
        Ok(())
    }

    fn on_stage_out(&mut self, request: StageOutRequest, ctx: &mut SimContext<'_>) -> Result<()> {
        let size = match self.tasks.get(&request.task) {
            Some(task) => request
                .files
                .iter()
                .map(|file| {
                    task.output_file_size(file).unwrap_or_else(|| {
                        log::warn!("Task {} has no output file '{}'; counted as empty.", request.task, file);
                        0
                    })
                })
                .sum(),
            None => {
                log::warn!("Device {} stages out task {} which never ran here; sending an empty transfer.", self.device_id, request.task);
                0
            }
        };

        let transfer = DataTransfer { task: request.task, cycle: request.cycle, destination: request.destination, size, has_data: request.has_data };

        if transfer.destination == self.device_id {
            ctx.schedule_self(0.0, Message::TransferDownloaded(transfer));
            return Ok(());
        }
        self.forward(transfer, ctx)
    }

    /// Sends the transfer one hop closer to its destination through the uplink.
    fn forward(&mut self, transfer: DataTransfer, ctx: &mut SimContext<'_>) -> Result<()> {
        let hop = self
            .routes
            .get(&transfer.destination)
            .ok_or_else(|| ConfigurationError::NoRoute { from: self.device_id.clone(), to: transfer.destination.clone() })?;
        let target = *self.directory.get(hop).ok_or_else(|| ConfigurationError::NoRoute { from: self.device_id.clone(), to: hop.clone() })?;

        let delay = self.links.uplink.transfer_delay(transfer.size, transfer.has_data);
        log::debug!("Device {}: {} bytes of task {} toward {} via {}.", self.device_id, transfer.size, transfer.task, transfer.destination, hop);
        self.submit_transfer(LinkDirection::Uplink, PendingTransfer { target, delay, message: Message::LinkTransfer(transfer) }, ctx);
        Ok(())
    }

    fn on_link_transfer(&mut self, transfer: DataTransfer, ctx: &mut SimContext<'_>) {
        let delay = self.links.downlink.transfer_delay(transfer.size, transfer.has_data);
        let pending = PendingTransfer { target: self.id, delay, message: Message::TransferDownloaded(transfer) };
        self.submit_transfer(LinkDirection::Downlink, pending, ctx);
    }

    fn on_transfer_downloaded(&mut self, transfer: DataTransfer, ctx: &mut SimContext<'_>) -> Result<()> {
        if transfer.destination != self.device_id {
            return self.forward(transfer, ctx);
        }

        self.received.entry(transfer.cycle).or_default().insert((transfer.task, transfer.has_data));

        let waiting = self.waiting.clone();
        for task_id in waiting {
            self.try_release(&task_id, ctx)?;
        }
        Ok(())
    }

    fn submit_transfer(&mut self, direction: LinkDirection, transfer: PendingTransfer, ctx: &mut SimContext<'_>) {
        if let Some(transfer) = self.links.link_mut(direction).submit(transfer) {
            self.start_transfer(direction, transfer, ctx);
        }
    }

    fn start_transfer(&mut self, direction: LinkDirection, transfer: PendingTransfer, ctx: &mut SimContext<'_>) {
        self.links.link_mut(direction).record_service(ctx.now(), transfer.delay);
        ctx.schedule(transfer.target, transfer.delay, transfer.message);

        let free = match direction {
            LinkDirection::Uplink => Message::UplinkFree,
            LinkDirection::Downlink => Message::DownlinkFree,
        };
        ctx.schedule_self(transfer.delay, free);
    }

    fn on_link_free(&mut self, direction: LinkDirection, ctx: &mut SimContext<'_>) {
        if let Some(next) = self.links.link_mut(direction).release() {
            self.start_transfer(direction, next, ctx);
        }
    }
}

impl Entity for DeviceAgent {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        self.device_id.as_str()
    }

    fn handle(&mut self, event: Event, ctx: &mut SimContext<'_>) -> Result<()> {
        match event.message {
            Message::ResourceRequest => self.on_resource_request(event.source, ctx),
            Message::VmCreate(vm) => self.on_vm_create(vm, event.source, ctx),
            Message::VmDestroy(vm) => self.on_vm_destroy(vm, event.source, ctx),
            Message::ExecuteTask { task, vm } => self.on_execute_task(task, vm, ctx)?,
            Message::ExecuteTaskWithData { task, vm } => self.on_execute_task_with_data(task, vm, ctx),
            Message::ComputeFinished { task, vm } => self.on_compute_finished(task, vm, ctx)?,
            Message::StageOut(request) => self.on_stage_out(request, ctx)?,
            Message::LinkTransfer(transfer) => self.on_link_transfer(transfer, ctx),
            Message::TransferDownloaded(transfer) => self.on_transfer_downloaded(transfer, ctx)?,
            Message::UplinkFree => self.on_link_free(LinkDirection::Uplink, ctx),
            Message::DownlinkFree => self.on_link_free(LinkDirection::Downlink, ctx),
            other => return Err(self.violation(format!("unexpected event '{}'", other.tag()))),
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
