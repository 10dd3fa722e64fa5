use std::str::FromStr;

use crate::api::config_dto::PoliciesDto;
use crate::domain::policy::task_to_vm_mapper::{FcfsTaskToVmMapper, SimpleTaskToVmMapper, TaskToVmMapper};
use crate::domain::policy::vm_provisioner::{ElasticVmProvisioner, SimpleVmProvisioner, VmProvisioner};
use crate::domain::policy::vm_to_device_mapper::{SimpleVmToDeviceMapper, VmToDeviceMapper};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmToDeviceMapperType {
    #[default]
    Simple,
}

impl FromStr for VmToDeviceMapperType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(VmToDeviceMapperType::Simple),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "vm to device mapper", name: s.to_string() }),
        }
    }
}

impl VmToDeviceMapperType {
    pub fn get_instance(&self) -> Box<dyn VmToDeviceMapper> {
        match self {
            VmToDeviceMapperType::Simple => Box::new(SimpleVmToDeviceMapper),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskToVmMapperType {
    #[default]
    Simple,
    Fcfs,
}

impl FromStr for TaskToVmMapperType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(TaskToVmMapperType::Simple),
            "fcfs" => Ok(TaskToVmMapperType::Fcfs),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "task to vm mapper", name: s.to_string() }),
        }
    }
}

impl TaskToVmMapperType {
    pub fn get_instance(&self) -> Box<dyn TaskToVmMapper> {
        match self {
            TaskToVmMapperType::Simple => Box::new(SimpleTaskToVmMapper::default()),
            TaskToVmMapperType::Fcfs => Box::new(FcfsTaskToVmMapper),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmProvisionerType {
    #[default]
    Simple,
    Elastic,
}

impl FromStr for VmProvisionerType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(VmProvisionerType::Simple),
            "elastic" => Ok(VmProvisionerType::Elastic),
            _ => Err(ConfigurationError::UnknownPolicy { kind: "vm provisioner", name: s.to_string() }),
        }
    }
}

impl VmProvisionerType {
    pub fn get_instance(&self) -> Box<dyn VmProvisioner> {
        match self {
            VmProvisionerType::Simple => Box::new(SimpleVmProvisioner),
            VmProvisionerType::Elastic => Box::new(ElasticVmProvisioner),
        }
    }
}

/// The three strategies a broker is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicyConfig {
    pub vm_to_device: VmToDeviceMapperType,
    pub task_to_vm: TaskToVmMapperType,
    pub provisioner: VmProvisionerType,
}

impl TryFrom<&PoliciesDto> for PolicyConfig {
    type Error = ConfigurationError;

    fn try_from(dto: &PoliciesDto) -> Result<Self, Self::Error> {
        Ok(PolicyConfig { vm_to_device: dto.vm_to_device.parse()?, task_to_vm: dto.task_to_vm.parse()?, provisioner: dto.provisioner.parse()? })
    }
}

impl PolicyConfig {
    pub fn get_instance(&self) -> PolicySet {
        PolicySet { vm_to_device: self.vm_to_device.get_instance(), task_to_vm: self.task_to_vm.get_instance(), provisioner: self.provisioner.get_instance() }
    }
}

/// Live strategy objects handed to the broker. Built from a [`PolicyConfig`], or assembled by the caller to plug
/// in custom implementations.
#[derive(Debug)]
pub struct PolicySet {
    pub vm_to_device: Box<dyn VmToDeviceMapper>,
    pub task_to_vm: Box<dyn TaskToVmMapper>,
    pub provisioner: Box<dyn VmProvisioner>,
}

impl Default for PolicySet {
    fn default() -> Self {
        PolicyConfig::default().get_instance()
    }
}

impl PolicySet {
    pub fn with_vm_to_device(mut self, mapper: impl VmToDeviceMapper + 'static) -> Self {
        self.vm_to_device = Box::new(mapper);
        self
    }

    pub fn with_task_to_vm(mut self, mapper: impl TaskToVmMapper + 'static) -> Self {
        self.task_to_vm = Box::new(mapper);
        self
    }

    pub fn with_provisioner(mut self, provisioner: impl VmProvisioner + 'static) -> Self {
        self.provisioner = Box::new(provisioner);
        self
    }
}
