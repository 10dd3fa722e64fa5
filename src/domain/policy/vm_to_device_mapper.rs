use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use crate::domain::resource::host::DeviceCharacteristics;
use crate::domain::resource::vm::Vm;
use crate::domain::utils::id::{DeviceId, VmId};
use crate::error::ConfigurationError;

/// Chooses the device each declared VM is created on. Runs once, after every device reported its characteristics.
pub trait VmToDeviceMapper: Debug {
    fn map(&mut self, characteristics: &BTreeMap<DeviceId, DeviceCharacteristics>, vms: &[Vm]) -> Result<HashMap<VmId, DeviceId>, ConfigurationError>;
}

/// Honors device affinity; every other VM goes round-robin over the devices in name order.
#[derive(Debug, Default)]
pub struct SimpleVmToDeviceMapper;

impl VmToDeviceMapper for SimpleVmToDeviceMapper {
    fn map(&mut self, characteristics: &BTreeMap<DeviceId, DeviceCharacteristics>, vms: &[Vm]) -> Result<HashMap<VmId, DeviceId>, ConfigurationError> {
        let devices: Vec<&DeviceId> = characteristics.keys().collect();
        let mut mapping = HashMap::with_capacity(vms.len());

        if devices.is_empty() {
            log::warn!("No devices reported characteristics; {} vm(s) stay unplaced.", vms.len());
            return Ok(mapping);
        }

        for (i, vm) in vms.iter().enumerate() {
            let device = match &vm.device_affinity {
                Some(affinity) if characteristics.contains_key(affinity) => affinity.clone(),
                Some(affinity) => return Err(ConfigurationError::UnknownDeviceAffinity { vm: vm.id.clone(), device: affinity.to_string() }),
                None => devices[i % devices.len()].clone(),
            };
            mapping.insert(vm.id.clone(), device);
        }
        Ok(mapping)
    }
}
