use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::entity::message::{Message, StageOutRequest};
use crate::domain::failure::failure_generator::FailureGenerator;
use crate::domain::failure::failure_monitor::FailureMonitor;
use crate::domain::policy::assignment_ledger::AssignmentLedger;
use crate::domain::policy::policy_type::PolicySet;
use crate::domain::policy::task_to_vm_mapper::{TaskMappingContext, TaskToVmMapper};
use crate::domain::policy::vm_provisioner::{ProvisioningContext, VmProvisioner};
use crate::domain::policy::vm_to_device_mapper::VmToDeviceMapper;
use crate::domain::resource::host::DeviceCharacteristics;
use crate::domain::resource::vm::Vm;
use crate::domain::simulator::entity_trait::Entity;
use crate::domain::simulator::event::{EntityId, Event};
use crate::domain::simulator::simulator::SimContext;
use crate::domain::topology::routing::RoutingTable;
use crate::domain::utils::id::{DeviceId, TaskId, VmId};
use crate::domain::workflow::task::{Task, TaskStatus};
use crate::error::{Error, Result};

/// Where the broker stands in the VM create/destroy protocol. Tasks are only dispatched while `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnPhase {
    AwaitingResources,
    AwaitingCreateAcks,
    AwaitingDestroyAcks,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerSettings {
    /// Last cycle a task is re-dispatched for.
    pub max_cycle: u32,
    /// Bytes per time unit from the external data source to a root task's device.
    pub stage_in_bandwidth: f64,
    /// Seeds the generator behind every selectivity decision.
    pub seed: u64,
}

/// Everything the broker is wired with at setup.
#[derive(Debug)]
pub struct BrokerSetup {
    pub settings: BrokerSettings,
    pub devices: BTreeMap<DeviceId, EntityId>,
    pub routing: RoutingTable,
    pub vms: Vec<Vm>,
    pub policies: PolicySet,
    pub failures: FailureGenerator,
}

/// Resource broker: places VMs on devices, maps tasks onto VMs, dispatches them, and drives the data flow
/// between producer and consumer devices once a cycle completes.
#[derive(Debug)]
pub struct ResourceBroker {
    id: EntityId,
    settings: BrokerSettings,
    devices: BTreeMap<DeviceId, EntityId>,
    routing: RoutingTable,
    vms: Vec<Vm>,
    vm_mapper: Box<dyn VmToDeviceMapper>,
    task_mapper: Box<dyn TaskToVmMapper>,
    provisioner: Box<dyn VmProvisioner>,
    failures: FailureGenerator,
    rng: StdRng,

    engine: Option<EntityId>,
    phase: ChurnPhase,
    characteristics: BTreeMap<DeviceId, DeviceCharacteristics>,

    vm_to_device: HashMap<VmId, DeviceId>,
    pending_create: BTreeSet<VmId>,
    create_acks: BTreeSet<VmId>,
    pending_destroy: BTreeSet<VmId>,
    destroy_acks: BTreeSet<VmId>,
    created: Vec<VmId>,
    failed: Vec<VmId>,
    to_create: Vec<VmId>,

    tasks: HashMap<TaskId, Task>,
    /// Arrival order.
    queue: Vec<TaskId>,
    dispatched: BTreeSet<TaskId>,
    completed: BTreeSet<TaskId>,
    in_flight: BTreeSet<TaskId>,
    ledger: AssignmentLedger,
    /// (producer, consumer, cycle, consumer device) already asked to stage out.
    staged: BTreeSet<(TaskId, TaskId, u32, DeviceId)>,
    churn_rounds: u32,
}

impl ResourceBroker {
    pub fn new(id: EntityId, setup: BrokerSetup) -> Self {
        ResourceBroker {
            id,
            settings: setup.settings,
            devices: setup.devices,
            routing: setup.routing,
            vms: setup.vms,
            vm_mapper: setup.policies.vm_to_device,
            task_mapper: setup.policies.task_to_vm,
            provisioner: setup.policies.provisioner,
            failures: setup.failures,
            rng: StdRng::seed_from_u64(setup.settings.seed),
            engine: None,
            phase: ChurnPhase::AwaitingResources,
            characteristics: BTreeMap::new(),
            vm_to_device: HashMap::new(),
            pending_create: BTreeSet::new(),
            create_acks: BTreeSet::new(),
            pending_destroy: BTreeSet::new(),
            destroy_acks: BTreeSet::new(),
            created: Vec::new(),
            failed: Vec::new(),
            to_create: Vec::new(),
            tasks: HashMap::new(),
            queue: Vec::new(),
            dispatched: BTreeSet::new(),
            completed: BTreeSet::new(),
            in_flight: BTreeSet::new(),
            ledger: AssignmentLedger::new(),
            staged: BTreeSet::new(),
            churn_rounds: 0,
        }
    }

    pub fn phase(&self) -> ChurnPhase {
        self.phase
    }

    pub fn created_vms(&self) -> &[VmId] {
        &self.created
    }

    pub fn failed_vms(&self) -> &[VmId] {
        &self.failed
    }

    /// Latest record of a task: the cycle it is in now plus the history of earlier ones.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn ledger(&self) -> &AssignmentLedger {
        &self.ledger
    }

    pub fn completed(&self) -> &BTreeSet<TaskId> {
        &self.completed
    }

    pub fn dispatched(&self) -> &BTreeSet<TaskId> {
        &self.dispatched
    }

    pub fn queued(&self) -> &[TaskId] {
        &self.queue
    }

    pub fn failure_monitor(&self) -> &FailureMonitor {
        self.failures.monitor()
    }

    /// Number of provisioning rounds that changed the VM set.
    pub fn churn_rounds(&self) -> u32 {
        self.churn_rounds
    }

    /// Stage-out requests remembered for deduplication. Entries for cycles a consumer has moved past are dropped.
    pub fn staged_requests(&self) -> usize {
        self.staged.len()
    }

    pub fn vm_device(&self, vm: &VmId) -> Option<&DeviceId> {
        self.vm_to_device.get(vm)
    }

    fn violation(&self, detail: String) -> Error {
        Error::ProtocolViolation { entity: "broker".to_string(), detail }
    }

    fn device_entity(&self, device: &DeviceId) -> Result<EntityId> {
        self.devices.get(device).copied().ok_or_else(|| self.violation(format!("unknown device {}", device)))
    }

    /// Device currently hosting the VM the task is assigned to.
    fn device_of_task(&self, task: &TaskId) -> Option<&DeviceId> {
        self.ledger.vm_of(task).and_then(|vm| self.vm_to_device.get(vm))
    }

    fn on_init(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        if self.devices.is_empty() {
            log::warn!("Broker has no devices; {} vm(s) cannot be placed.", self.vms.len());
            self.failed = self.vms.iter().map(|vm| vm.id.clone()).collect();
            self.phase = ChurnPhase::Idle;
            return self.dispatch_tasks(ctx);
        }

        for target in self.devices.values() {
            ctx.send_now(*target, Message::ResourceRequest);
        }
        self.phase = ChurnPhase::AwaitingResources;
        Ok(())
    }

    /// **Phase 1:** collect every device's characteristics, then place all declared VMs at once.
    fn on_resource_response(&mut self, characteristics: DeviceCharacteristics, ctx: &mut SimContext<'_>) -> Result<()> {
        if self.phase != ChurnPhase::AwaitingResources {
            log::debug!("Late characteristics from device {} ignored.", characteristics.device);
            return Ok(());
        }
        self.characteristics.insert(characteristics.device.clone(), characteristics);
        if self.characteristics.len() < self.devices.len() {
            return Ok(());
        }

        self.vm_to_device = self.vm_mapper.map(&self.characteristics, &self.vms)?;
        self.to_create = self.vms.iter().map(|vm| vm.id.clone()).collect();
        self.begin_creation(ctx)
    }

    /// **Phase 2:** ask the chosen devices to create the VMs in `to_create`.
    fn begin_creation(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        self.pending_create.clear();
        self.create_acks.clear();

        for vm_id in std::mem::take(&mut self.to_create) {
            let placement = self.vm_to_device.get(&vm_id).and_then(|device| self.devices.get(device));
            let vm = self.vms.iter().find(|vm| vm.id == vm_id);

            match (placement, vm) {
                (Some(target), Some(vm)) => {
                    ctx.send_now(*target, Message::VmCreate(vm.clone()));
                    self.pending_create.insert(vm_id);
                }
                _ => {
                    log::warn!("Vm {} has no device to be created on.", vm_id);
                    if !self.failed.contains(&vm_id) {
                        self.failed.push(vm_id);
                    }
                }
            }
        }

        if self.pending_create.is_empty() {
            return self.settle(ctx);
        }
        self.phase = ChurnPhase::AwaitingCreateAcks;
        Ok(())
    }

    fn on_vm_create_ack(&mut self, vm: VmId, device: DeviceId, created: bool, ctx: &mut SimContext<'_>) -> Result<()> {
        if !self.pending_create.contains(&vm) {
            log::debug!("Stale create ack for vm {} from device {}.", vm, device);
            return Ok(());
        }

        if created {
            self.failed.retain(|failed| failed != &vm);
            if !self.created.contains(&vm) {
                self.created.push(vm.clone());
            }
        } else if !self.failed.contains(&vm) {
            self.failed.push(vm.clone());
        }
        self.create_acks.insert(vm);

        if self.create_acks.is_superset(&self.pending_create) {
            return self.settle(ctx);
        }
        Ok(())
    }

    fn on_vm_destroy_ack(&mut self, vm: VmId, ctx: &mut SimContext<'_>) -> Result<()> {
        if !self.pending_destroy.contains(&vm) {
            log::debug!("Stale destroy ack for vm {}.", vm);
            return Ok(());
        }
        self.destroy_acks.insert(vm);

        if self.destroy_acks.is_superset(&self.pending_destroy) {
            self.pending_destroy.clear();
            self.destroy_acks.clear();
            return self.begin_creation(ctx);
        }
        Ok(())
    }

    /// **Phase 3:** the VM set is stable again; queued tasks may go out.
    fn settle(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        self.phase = ChurnPhase::Idle;
        log::info!("Broker settled at {}: {} vm(s) created, {} failed.", ctx.now(), self.created.len(), self.failed.len());
        self.dispatch_tasks(ctx)
    }

    fn on_incoming_task(&mut self, mut task: Task, source: EntityId, ctx: &mut SimContext<'_>) -> Result<()> {
        if self.engine.is_none() {
            self.engine = Some(source);
        }

        let task_id = task.id.clone();
        task.owner = Some(self.id);
        task.state.set_enter_broker_queue(task.cycle(), ctx.now());
        self.tasks.insert(task_id.clone(), task);
        if !self.queue.contains(&task_id) {
            self.queue.push(task_id);
        }

        if self.phase == ChurnPhase::Idle {
            self.dispatch_tasks(ctx)?;
            self.maybe_provision(ctx)?;
        }
        Ok(())
    }

    /// Runs the task mapper over the queue and sends out every task whose VM exists. The rest stay queued.
    fn dispatch_tasks(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let delta = {
            let queued: Vec<&Task> = self.queue.iter().filter_map(|id| self.tasks.get(id)).collect();
            let mapping = TaskMappingContext {
                created: &self.created,
                failed: &self.failed,
                queued: &queued,
                completed: &self.completed,
                dispatched: &self.dispatched,
                in_flight: &self.in_flight,
                ledger: &self.ledger,
                routing: &self.routing,
                vm_to_device: &self.vm_to_device,
            };
            self.task_mapper.map(&mapping)
        };
        self.ledger = std::mem::take(&mut self.ledger).merge(delta);

        for task_id in std::mem::take(&mut self.queue) {
            let vm = self.ledger.vm_of(&task_id).filter(|vm| self.created.contains(vm)).cloned();
            match vm {
                Some(vm) => self.dispatch_task(&task_id, vm, ctx)?,
                None => self.queue.push(task_id),
            }
        }

        if !self.queue.is_empty() {
            log::debug!("{} task(s) stay queued without a created vm.", self.queue.len());
        }
        Ok(())
    }

    fn dispatch_task(&mut self, task_id: &TaskId, vm: VmId, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let device = self.vm_to_device.get(&vm).cloned().ok_or_else(|| self.violation(format!("vm {} was never placed", vm)))?;
        let target = self.device_entity(&device)?;
        let mut task = self.tasks.get(task_id).cloned().ok_or_else(|| self.violation(format!("dispatching unknown task {}", task_id)))?;

        task.vm = Some(vm.clone());
        task.state.set_exit_broker_queue(task.cycle(), now);
        self.stage_parents_toward(&task, &device, ctx)?;
        self.tasks.insert(task_id.clone(), task.clone());
        self.dispatched.insert(task_id.clone());
        self.in_flight.insert(task_id.clone());

        log::debug!("Dispatching task {} (cycle {}) to vm {} on device {}.", task_id, task.cycle(), vm, device);
        if task.is_root() {
            let delay = task.input_size() as f64 / self.settings.stage_in_bandwidth;
            ctx.schedule(target, delay, Message::ExecuteTaskWithData { task, vm });
        } else {
            ctx.send_now(target, Message::ExecuteTask { task, vm });
        }
        Ok(())
    }

    /// Asks the devices of the task's parents to push this cycle's data toward `device`, for every parent that
    /// already decided whether it has data for the cycle.
    fn stage_parents_toward(&mut self, task: &Task, device: &DeviceId, ctx: &mut SimContext<'_>) -> Result<()> {
        let cycle = task.cycle();
        for parent in &task.parents {
            let Some(has_data) = self.tasks.get(parent).and_then(|parent| parent.generated_data(cycle)) else {
                continue;
            };
            let Some(parent_device) = self.device_of_task(parent).cloned() else {
                log::warn!("Parent {} of task {} has no device; its data cannot be staged.", parent, task.id);
                continue;
            };

            let request = StageOutRequest { task: parent.clone(), cycle, destination: device.clone(), has_data, files: task.needed_from(parent) };
            self.request_stage_out(&parent_device, task.id.clone(), request, ctx)?;
        }
        Ok(())
    }

    fn request_stage_out(&mut self, producer_device: &DeviceId, consumer: TaskId, request: StageOutRequest, ctx: &mut SimContext<'_>) -> Result<()> {
        let key = (request.task.clone(), consumer, request.cycle, request.destination.clone());
        if !self.staged.insert(key) {
            return Ok(());
        }
        let target = self.device_entity(producer_device)?;
        ctx.send_now(target, Message::StageOut(request));
        Ok(())
    }

    fn on_task_returned(&mut self, mut task: Task, executed: bool, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let cycle = task.cycle();
        task.state.set_end_execution(cycle, now);

        let failure = if executed { self.failures.check(&task, now) } else { None };
        task.status = match failure {
            Some(instant) => TaskStatus::Failed(instant),
            None => TaskStatus::Success,
        };
        self.in_flight.remove(&task.id);

        let engine = self.engine.ok_or_else(|| self.violation(format!("task {} returned before any task arrived", task.id)))?;
        ctx.send_now(engine, Message::TaskIsDone(task.clone()));

        if task.is_failed() {
            self.tasks.insert(task.id.clone(), task);
            return Ok(());
        }

        self.complete_cycle(task, ctx)?;
        self.maybe_provision(ctx)
    }

    /// Records the finished cycle, fans its data decision out to dispatched children and, below `max_cycle`,
    /// sends the task out again for its next cycle.
    fn complete_cycle(&mut self, task: Task, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let cycle = task.cycle();
        self.completed.insert(task.id.clone());

        let mut next = task.next_cycle();
        let has_data = next.want_to_generate_data(cycle, now, &mut self.rng);

        tracing::info!(
            task = %task.id,
            workflow = %task.workflow_id,
            cycle,
            vm = ?task.vm,
            has_data,
            end = now,
            "cycle completed"
        );

        if let Some(producer_device) = self.device_of_task(&task.id).cloned() {
            for child in &task.children {
                if !self.dispatched.contains(child) {
                    continue;
                }
                let (Some(child_task), Some(child_device)) = (self.tasks.get(child), self.device_of_task(child)) else {
                    continue;
                };
                let request = StageOutRequest { task: task.id.clone(), cycle, destination: child_device.clone(), has_data, files: child_task.needed_from(&task.id) };
                self.request_stage_out(&producer_device, child.clone(), request, ctx)?;
            }
        }

        let task_id = task.id.clone();
        let live = next.cycle();
        self.staged.retain(|(_, consumer, staged_cycle, _)| consumer != &task_id || *staged_cycle >= live);
        self.tasks.insert(task_id.clone(), next.clone());

        if next.cycle() > self.settings.max_cycle {
            log::debug!("Task {} finished its last cycle {}.", task_id, cycle);
            return Ok(());
        }
        self.redispatch(next, ctx)
    }

    /// Sends the next cycle to the same VM. Roots wait for their execution model's next release time.
    fn redispatch(&mut self, mut next: Task, ctx: &mut SimContext<'_>) -> Result<()> {
        let now = ctx.now();
        let task_id = next.id.clone();
        next.state.set_enter_broker_queue(next.cycle(), now);
        self.tasks.insert(task_id.clone(), next.clone());

        let vm = match next.vm.clone() {
            Some(vm) if self.created.contains(&vm) => vm,
            _ => {
                log::debug!("Vm of task {} is gone; cycle {} waits in the queue.", task_id, next.cycle());
                if !self.queue.contains(&task_id) {
                    self.queue.push(task_id);
                }
                return Ok(());
            }
        };
        let device = self.vm_to_device.get(&vm).cloned().ok_or_else(|| self.violation(format!("vm {} was never placed", vm)))?;
        let target = self.device_entity(&device)?;

        let delay = if next.is_root() { next.next_execution_time(now) - now } else { 0.0 };
        next.state.set_exit_broker_queue(next.cycle(), now + delay.max(0.0));
        self.stage_parents_toward(&next, &device, ctx)?;
        self.tasks.insert(task_id.clone(), next.clone());
        self.in_flight.insert(task_id);

        ctx.schedule(target, delay, Message::ExecuteTask { task: next, vm });
        Ok(())
    }

    /// Consults the provisioner whenever every dispatched task has returned, queued tasks or not.
    fn maybe_provision(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        if self.phase != ChurnPhase::Idle || !self.in_flight.is_empty() {
            return Ok(());
        }

        let decision = {
            let provisioning = ProvisioningContext {
                failed: &self.failed,
                created: &self.created,
                all: &self.vms,
                ledger: &self.ledger,
                completed: &self.completed,
                dispatched: &self.dispatched,
                queued: &self.queue,
            };
            self.provisioner.provision(&provisioning)
        };
        if decision.is_noop() {
            return Ok(());
        }

        self.churn_rounds += 1;
        let to_destroy: Vec<VmId> = decision.to_destroy.into_iter().filter(|vm| self.created.contains(vm)).collect();
        self.created.retain(|vm| !to_destroy.contains(vm));
        self.failed.retain(|vm| !decision.to_create.contains(vm));
        self.to_create = decision.to_create;
        log::info!("Provisioning round {} at {}: destroy {:?}, create {:?}.", self.churn_rounds, ctx.now(), to_destroy, self.to_create);

        if to_destroy.is_empty() {
            return self.begin_creation(ctx);
        }

        self.destroy_acks.clear();
        for vm in to_destroy {
            let device = self.vm_to_device.get(&vm).cloned().ok_or_else(|| self.violation(format!("vm {} was never placed", vm)))?;
            let target = self.device_entity(&device)?;
            ctx.send_now(target, Message::VmDestroy(vm.clone()));
            self.pending_destroy.insert(vm);
        }
        self.phase = ChurnPhase::AwaitingDestroyAcks;
        Ok(())
    }
}

impl Entity for ResourceBroker {
    fn id(&self) -> EntityId {
        self.id
    }

    fn name(&self) -> &str {
        "broker"
    }

    fn start(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
        ctx.schedule_self(0.0, Message::Init);
        Ok(())
    }

    fn handle(&mut self, event: Event, ctx: &mut SimContext<'_>) -> Result<()> {
        match event.message {
            Message::Init => self.on_init(ctx),
            Message::ResourceResponse(characteristics) => self.on_resource_response(characteristics, ctx),
            Message::VmCreateAck { vm, device, created } => self.on_vm_create_ack(vm, device, created, ctx),
            Message::VmDestroyAck { vm, .. } => self.on_vm_destroy_ack(vm, ctx),
            Message::IncomingTask(task) => self.on_incoming_task(task, event.source, ctx),
            Message::TaskReturned { task, executed } => self.on_task_returned(task, executed, ctx),
            other => Err(self.violation(format!("unexpected event '{}'", other.tag()))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
