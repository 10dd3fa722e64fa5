use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::api::config_dto::FailureDto;
use crate::domain::failure::distribution::{DistributionGenerator, DistributionParams};
use crate::domain::failure::failure_monitor::{FailureMonitor, MonitorMode};
use crate::domain::simulator::event::SimTime;
use crate::domain::utils::id::VmId;
use crate::domain::workflow::task::Task;
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Executions never fail.
    #[default]
    None,
    /// One shared sequence of failure instants for every VM.
    All,
    /// A separate sequence per VM.
    Vm,
}

impl FromStr for FailureMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "failure_none" => Ok(FailureMode::None),
            "all" | "failure_all" => Ok(FailureMode::All),
            "vm" | "failure_vm" => Ok(FailureMode::Vm),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "failure mode", name: s.to_string() }),
        }
    }
}

/// Immutable failure setup, built once and handed to the generator at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureConfig {
    pub monitor_mode: MonitorMode,
    pub failure_mode: FailureMode,
    /// Used by `All`, and by `Vm` for VMs without their own entry.
    pub shared: Option<DistributionParams>,
    pub per_vm: BTreeMap<VmId, DistributionParams>,
}

impl FailureConfig {
    pub fn none() -> Self {
        FailureConfig::default()
    }

    pub fn all(params: DistributionParams) -> Self {
        FailureConfig { failure_mode: FailureMode::All, shared: Some(params), ..FailureConfig::default() }
    }

    pub fn per_vm(shared: Option<DistributionParams>, per_vm: BTreeMap<VmId, DistributionParams>) -> Self {
        FailureConfig { failure_mode: FailureMode::Vm, shared, per_vm, ..FailureConfig::default() }
    }

    pub fn with_monitor(mut self, mode: MonitorMode) -> Self {
        self.monitor_mode = mode;
        self
    }
}

impl TryFrom<&FailureDto> for FailureConfig {
    type Error = ConfigurationError;

    fn try_from(dto: &FailureDto) -> Result<Self, Self::Error> {
        let shared = dto.distribution.as_ref().map(DistributionParams::try_from).transpose()?;
        let mut per_vm = BTreeMap::new();
        for (vm, distribution) in &dto.per_vm {
            per_vm.insert(VmId::new(vm.as_str()), DistributionParams::try_from(distribution)?);
        }

        Ok(FailureConfig { monitor_mode: dto.monitor_mode.parse()?, failure_mode: dto.failure_mode.parse()?, shared, per_vm })
    }
}

/// Decides whether a finished execution was hit by a failure instant.
#[derive(Debug)]
pub struct FailureGenerator {
    mode: FailureMode,
    shared: Option<DistributionGenerator>,
    per_vm: HashMap<VmId, DistributionGenerator>,
    fallback: Option<DistributionParams>,
    monitor: FailureMonitor,
}

impl FailureGenerator {
    pub fn new(config: &FailureConfig) -> Result<Self, ConfigurationError> {
        let mut generator = FailureGenerator {
            mode: config.failure_mode,
            shared: None,
            per_vm: HashMap::new(),
            fallback: None,
            monitor: FailureMonitor::new(config.monitor_mode),
        };

        match config.failure_mode {
            FailureMode::None => {}
            FailureMode::All => {
                let params = config.shared.clone().ok_or_else(|| ConfigurationError::MissingFailureGenerator("all".to_string()))?;
                generator.shared = Some(DistributionGenerator::new(params)?);
            }
            FailureMode::Vm => {
                if config.shared.is_none() && config.per_vm.is_empty() {
                    return Err(ConfigurationError::MissingFailureGenerator("vm".to_string()));
                }
                for (vm, params) in &config.per_vm {
                    generator.per_vm.insert(vm.clone(), DistributionGenerator::new(params.clone())?);
                }
                if let Some(shared) = &config.shared {
                    // Validated here so lazily built per-VM generators cannot fail later.
                    DistributionGenerator::new(shared.clone())?;
                    generator.fallback = Some(shared.clone());
                }
            }
        }

        log::debug!("Failure generator ready: mode {:?}, monitor {:?}.", generator.mode, generator.monitor.mode());
        Ok(generator)
    }

    /// Checks the task's current-cycle execution window. Returns the consumed failure instant if it failed.
    pub fn check(&mut self, task: &Task, now: SimTime) -> Option<SimTime> {
        let (start, end) = task.state.execution_window(task.cycle())?;

        let instant = match self.mode {
            FailureMode::None => None,
            FailureMode::All => self.shared.as_mut().and_then(|generator| generator.consume_in_window(start, end)),
            FailureMode::Vm => match &task.vm {
                Some(vm) => self.generator_for(vm).and_then(|generator| generator.consume_in_window(start, end)),
                None => None,
            },
        };

        if let Some(at) = instant {
            log::info!("Task {} (cycle {}) failed at {} inside [{}, {}].", task.id, task.cycle(), at, start, end);
        }
        self.monitor.record(now, task, instant);
        instant
    }

    fn generator_for(&mut self, vm: &VmId) -> Option<&mut DistributionGenerator> {
        if !self.per_vm.contains_key(vm) {
            let params = self.fallback.clone()?;
            let seed = mix_seed(params.seed, vm.as_str());
            match DistributionGenerator::new(params.with_seed(seed)) {
                Ok(generator) => {
                    self.per_vm.insert(vm.clone(), generator);
                }
                Err(e) => {
                    log::warn!("No failure generator for vm {}: {}", vm, e);
                    return None;
                }
            }
        }
        self.per_vm.get_mut(vm)
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    pub fn monitor(&self) -> &FailureMonitor {
        &self.monitor
    }
}

/// FNV-1a over the key, folded into the seed.
fn mix_seed(seed: u64, key: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    seed ^ hash
}
