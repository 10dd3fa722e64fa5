use crate::api::topology_dto::VmDto;
use crate::domain::utils::id::{DeviceId, VmId};
use crate::error::ConfigurationError;

/// Capacity a VM asks of its host.
#[derive(Debug, Clone, PartialEq)]
pub struct VmSpec {
    /// Compute rate per core, million instructions per second.
    pub mips: f64,
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
}

/// A declared virtual machine. Its id survives churn rounds; whether it is bound right now is tracked by the broker
/// and by the device that hosts it.
#[derive(Debug, Clone, PartialEq)]
pub struct Vm {
    pub id: VmId,
    pub spec: VmSpec,
    /// Absent means the placement policy is free to choose a device.
    pub device_affinity: Option<DeviceId>,
}

impl Vm {
    pub fn new(id: impl Into<String>, spec: VmSpec) -> Self {
        Vm { id: VmId::new(id), spec, device_affinity: None }
    }

    pub fn with_affinity(mut self, device: impl Into<String>) -> Self {
        self.device_affinity = Some(DeviceId::new(device));
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.spec.mips.is_finite() && self.spec.mips > 0.0) {
            return Err(ConfigurationError::InvalidVm { vm: self.id.clone(), reason: format!("mips must be positive, got {}", self.spec.mips) });
        }
        if self.spec.cores == 0 {
            return Err(ConfigurationError::InvalidVm { vm: self.id.clone(), reason: "a vm needs at least one core".to_string() });
        }
        Ok(())
    }
}

impl TryFrom<VmDto> for Vm {
    type Error = ConfigurationError;

    fn try_from(dto: VmDto) -> Result<Self, Self::Error> {
        let vm = Vm {
            id: VmId::new(dto.id),
            spec: VmSpec { mips: dto.mips, cores: dto.cores, ram: dto.ram, bw: dto.bw, storage: dto.size },
            device_affinity: dto.device.map(DeviceId::new),
        };
        vm.validate()?;
        Ok(vm)
    }
}
