use std::collections::{BTreeMap, HashMap, HashSet};

use crate::api::config_dto::SimulationConfigDto;
use crate::api::topology_dto::DEFAULT_LINK_BANDWIDTH;
use crate::domain::entity::broker::{BrokerSettings, BrokerSetup, ResourceBroker};
use crate::domain::entity::device::DeviceAgent;
use crate::domain::entity::message::Message;
use crate::domain::entity::workflow_engine::WorkflowEngine;
use crate::domain::failure::failure_generator::{FailureConfig, FailureGenerator};
use crate::domain::policy::policy_type::{PolicyConfig, PolicySet};
use crate::domain::report::{SimulationReport, TaskReport};
use crate::domain::resource::vm::Vm;
use crate::domain::simulator::event::{EntityId, SimTime};
use crate::domain::simulator::simulator::Simulator;
use crate::domain::topology::topology::Topology;
use crate::domain::utils::id::{DeviceId, TaskId, VmId};
use crate::domain::workflow::task::Task;
use crate::domain::workflow::workflow::Workflow;
use crate::error::{ConfigurationError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub max_cycle: u32,
    pub stage_in_bandwidth: f64,
    /// Events after this time are left undelivered.
    pub end_time: Option<SimTime>,
    /// Seeds the selectivity decisions. Failure instants have their own seed.
    pub seed: u64,
    pub policies: PolicyConfig,
    pub failure: FailureConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_cycle: 0,
            stage_in_bandwidth: DEFAULT_LINK_BANDWIDTH,
            end_time: None,
            seed: 0,
            policies: PolicyConfig::default(),
            failure: FailureConfig::none(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if !(self.stage_in_bandwidth.is_finite() && self.stage_in_bandwidth > 0.0) {
            return Err(ConfigurationError::InvalidParameter { name: "stageInBandwidth", reason: format!("must be positive, got {}", self.stage_in_bandwidth) });
        }
        if let Some(end) = self.end_time {
            if end.is_nan() || end < 0.0 {
                return Err(ConfigurationError::InvalidParameter { name: "endTime", reason: format!("must not be negative, got {}", end) });
            }
        }
        Ok(())
    }
}

impl TryFrom<&SimulationConfigDto> for SimulationConfig {
    type Error = ConfigurationError;

    fn try_from(dto: &SimulationConfigDto) -> std::result::Result<Self, Self::Error> {
        let config = SimulationConfig {
            max_cycle: dto.max_cycle,
            stage_in_bandwidth: dto.stage_in_bandwidth,
            end_time: dto.end_time,
            seed: dto.seed,
            policies: PolicyConfig::try_from(&dto.policies)?,
            failure: FailureConfig::try_from(&dto.failure)?,
        };
        config.validate()?;
        Ok(config)
    }
}

/// A fully wired simulation: one agent per device, the broker and the workflow engine, with every task seeded.
pub struct Simulation {
    simulator: Simulator,
    broker: EntityId,
    engine: EntityId,
    devices: BTreeMap<DeviceId, EntityId>,
    declared: Vec<Task>,
    end_time: Option<SimTime>,
}

impl Simulation {
    /// Builds the strategies named by `config.policies`.
    pub fn new(config: &SimulationConfig, topology: Topology, vms: Vec<Vm>, workflows: Vec<Workflow>) -> Result<Self> {
        Self::with_policies(config, topology, vms, workflows, config.policies.get_instance())
    }

    /// Like [`Simulation::new`], with caller-supplied strategies. `config.policies` is ignored.
    pub fn with_policies(config: &SimulationConfig, topology: Topology, vms: Vec<Vm>, workflows: Vec<Workflow>, policies: PolicySet) -> Result<Self> {
        config.validate()?;

        // **Phase 1:** workflows must be acyclic and task ids unique across all of them.
        let mut declared: Vec<Task> = Vec::new();
        let mut task_ids: HashSet<TaskId> = HashSet::new();
        for mut workflow in workflows {
            workflow.connect_dependencies()?;
            if !workflow.validate() {
                return Err(ConfigurationError::CyclicWorkflow(workflow.id.clone()).into());
            }
            for task in workflow.into_tasks() {
                if !task_ids.insert(task.id.clone()) {
                    return Err(ConfigurationError::DuplicateTask(task.id.clone()).into());
                }
                declared.push(task);
            }
        }

        // **Phase 2:** VMs and the references to them.
        let mut vm_ids: HashSet<VmId> = HashSet::new();
        for vm in &vms {
            vm.validate()?;
            if !vm_ids.insert(vm.id.clone()) {
                return Err(ConfigurationError::DuplicateVm(vm.id.clone()).into());
            }
            if let Some(device) = &vm.device_affinity {
                if !topology.contains(device) {
                    return Err(ConfigurationError::UnknownDeviceAffinity { vm: vm.id.clone(), device: device.to_string() }.into());
                }
            }
        }
        for task in &declared {
            if let Some(vm) = &task.hints.vm {
                if !vm_ids.contains(vm) {
                    return Err(ConfigurationError::UnknownPinnedVm { task: task.id.clone(), vm: vm.to_string() }.into());
                }
            }
        }

        // **Phase 3:** entities.
        let routing = topology.routing_table();
        let route_count = routing.len();
        let failures = FailureGenerator::new(&config.failure)?;
        let mut simulator = Simulator::new();

        let mut devices: BTreeMap<DeviceId, EntityId> = BTreeMap::new();
        for spec in topology.devices() {
            let routes = routing.routes_from(&spec.id);
            let entity = simulator.add_entity(|id| DeviceAgent::new(id, spec, routes));
            devices.insert(spec.id.clone(), entity);
        }
        let directory: HashMap<DeviceId, EntityId> = devices.iter().map(|(device, entity)| (device.clone(), *entity)).collect();
        for entity in devices.values() {
            if let Some(agent) = simulator.entity_mut::<DeviceAgent>(*entity) {
                agent.set_directory(directory.clone());
            }
        }

        let setup = BrokerSetup {
            settings: BrokerSettings { max_cycle: config.max_cycle, stage_in_bandwidth: config.stage_in_bandwidth, seed: config.seed },
            devices: devices.clone(),
            routing,
            vms,
            policies,
            failures,
        };
        let broker = simulator.add_entity(|id| ResourceBroker::new(id, setup));
        let engine = simulator.add_entity(|id| WorkflowEngine::new(id, broker));

        // **Phase 4:** seed every task at its entry time. The sort is stable, so ties keep declaration order.
        let mut seeds = declared.clone();
        seeds.sort_by(|a, b| a.entry_time.total_cmp(&b.entry_time));
        for task in seeds {
            let entry_time = task.entry_time;
            simulator.schedule(engine, engine, entry_time, Message::IncomingTask(task));
        }

        log::info!("Simulation ready: {} device(s), {} task(s), {} route(s).", devices.len(), declared.len(), route_count);
        Ok(Simulation { simulator, broker, engine, devices, declared, end_time: config.end_time })
    }

    pub fn run(&mut self) -> Result<SimulationReport> {
        let summary = self.simulator.run_until(self.end_time)?;

        let mut report = SimulationReport { final_time: summary.final_time, events_processed: summary.events_processed, ..SimulationReport::default() };
        let broker = self.broker();
        for declared in &self.declared {
            let task = broker.and_then(|broker| broker.task(&declared.id)).unwrap_or(declared);
            let device = task.vm.as_ref().and_then(|vm| broker.and_then(|broker| broker.vm_device(vm))).cloned();
            report.tasks.insert(task.id.clone(), TaskReport::from_task(task, device));
        }
        if let Some(broker) = broker {
            report.failure_records = broker.failure_monitor().records().to_vec();
        }

        log::info!("Run complete at {}: {} events, {} task(s), {} failure(s).", report.final_time, report.events_processed, report.tasks.len(), report.failure_count());
        Ok(report)
    }

    pub fn broker(&self) -> Option<&ResourceBroker> {
        self.simulator.entity::<ResourceBroker>(self.broker)
    }

    pub fn engine(&self) -> Option<&WorkflowEngine> {
        self.simulator.entity::<WorkflowEngine>(self.engine)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceAgent> {
        self.devices.get(name).and_then(|entity| self.simulator.entity::<DeviceAgent>(*entity))
    }

    pub fn now(&self) -> SimTime {
        self.simulator.now()
    }
}
