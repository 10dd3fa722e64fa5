use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::api::topology_dto::DeviceDto;
use crate::domain::resource::host::HostSpec;
use crate::domain::topology::routing::RoutingTable;
use crate::domain::utils::id::{DeviceId, HostId};
use crate::error::ConfigurationError;

/// Static description of one fog node.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSpec {
    pub id: DeviceId,
    /// Directed edges: this device can send to each neighbor.
    pub neighbors: Vec<DeviceId>,
    pub hosts: Vec<HostSpec>,
    /// Bytes per second.
    pub uplink_bw: f64,
    pub downlink_bw: f64,
}

impl DeviceSpec {
    pub fn new(name: impl Into<String>, neighbors: &[&str], hosts: Vec<HostSpec>, uplink_bw: f64, downlink_bw: f64) -> Self {
        DeviceSpec { id: DeviceId::new(name), neighbors: neighbors.iter().map(|n| DeviceId::new(*n)).collect(), hosts, uplink_bw, downlink_bw }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidDevice { device: self.id.clone(), reason };

        if !(self.uplink_bw.is_finite() && self.uplink_bw > 0.0) {
            return Err(invalid(format!("uplink bandwidth must be positive, got {}", self.uplink_bw)));
        }
        if !(self.downlink_bw.is_finite() && self.downlink_bw > 0.0) {
            return Err(invalid(format!("downlink bandwidth must be positive, got {}", self.downlink_bw)));
        }
        if self.hosts.is_empty() {
            return Err(invalid("a device needs at least one host".to_string()));
        }
        for host in &self.hosts {
            if host.cores == 0 || !(host.mips > 0.0) {
                return Err(invalid(format!("host {} needs cores and a positive mips rating", host.id)));
            }
        }
        Ok(())
    }
}

impl From<DeviceDto> for DeviceSpec {
    fn from(dto: DeviceDto) -> Self {
        let hosts = dto
            .hosts
            .into_iter()
            .enumerate()
            .map(|(i, host)| HostSpec {
                id: HostId::new(format!("{}-host-{}", dto.name, i)),
                mips: host.mips,
                cores: host.cores,
                ram: host.ram,
                bw: host.bw,
                storage: host.storage,
            })
            .collect();

        DeviceSpec {
            id: DeviceId::new(dto.name),
            neighbors: dto.neighbors.into_iter().map(DeviceId::new).collect(),
            hosts,
            uplink_bw: dto.uplink_bw,
            downlink_bw: dto.downlink_bw,
        }
    }
}

/// The validated device graph.
#[derive(Debug, Clone)]
pub struct Topology {
    devices: Vec<DeviceSpec>,
}

impl Topology {
    pub fn new(devices: Vec<DeviceSpec>) -> Result<Self, ConfigurationError> {
        let mut seen: HashSet<DeviceId> = HashSet::new();
        for device in &devices {
            if !seen.insert(device.id.clone()) {
                return Err(ConfigurationError::DuplicateDevice(device.id.clone()));
            }
            device.validate()?;
        }

        for device in &devices {
            for neighbor in &device.neighbors {
                if !seen.contains(neighbor) {
                    return Err(ConfigurationError::UnknownNeighbor { device: device.id.clone(), neighbor: neighbor.to_string() });
                }
                if neighbor == &device.id {
                    log::warn!("Device {} lists itself as neighbor; the self edge is ignored.", device.id);
                }
            }
        }

        Ok(Topology { devices })
    }

    pub fn from_dto(devices: Vec<DeviceDto>) -> Result<Self, ConfigurationError> {
        Topology::new(devices.into_iter().map(DeviceSpec::from).collect())
    }

    pub fn devices(&self) -> &[DeviceSpec] {
        &self.devices
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceSpec> {
        self.devices.iter().find(|device| &device.id == id)
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.device(id).is_some()
    }

    pub fn adjacency(&self) -> BTreeMap<DeviceId, BTreeSet<DeviceId>> {
        self.devices
            .iter()
            .map(|device| {
                let neighbors = device.neighbors.iter().filter(|neighbor| *neighbor != &device.id).cloned().collect();
                (device.id.clone(), neighbors)
            })
            .collect()
    }

    pub fn routing_table(&self) -> RoutingTable {
        RoutingTable::build(&self.adjacency())
    }
}
