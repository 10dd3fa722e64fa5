use std::collections::BTreeMap;

use crate::domain::resource::compute::VmCompute;
use crate::domain::resource::vm::{Vm, VmSpec};
use crate::domain::simulator::event::SimTime;
use crate::domain::utils::id::{DeviceId, HostId, VmId};

#[derive(Debug, Clone, PartialEq)]
pub struct HostSpec {
    pub id: HostId,
    /// Compute rate per core.
    pub mips: f64,
    pub cores: u32,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
}

#[derive(Debug, Clone)]
pub struct Host {
    pub spec: HostSpec,
    free_cores: u32,
    free_ram: u64,
    free_bw: u64,
    free_storage: u64,
}

impl Host {
    pub fn new(spec: HostSpec) -> Self {
        Host { free_cores: spec.cores, free_ram: spec.ram, free_bw: spec.bw, free_storage: spec.storage, spec }
    }

    pub fn fits(&self, vm: &VmSpec) -> bool {
        vm.mips <= self.spec.mips
            && vm.cores <= self.free_cores
            && vm.ram <= self.free_ram
            && vm.bw <= self.free_bw
            && vm.storage <= self.free_storage
    }

    fn reserve(&mut self, vm: &VmSpec) {
        self.free_cores -= vm.cores;
        self.free_ram -= vm.ram;
        self.free_bw -= vm.bw;
        self.free_storage -= vm.storage;
    }

    fn release(&mut self, vm: &VmSpec) {
        self.free_cores = (self.free_cores + vm.cores).min(self.spec.cores);
        self.free_ram = (self.free_ram + vm.ram).min(self.spec.ram);
        self.free_bw = (self.free_bw + vm.bw).min(self.spec.bw);
        self.free_storage = (self.free_storage + vm.storage).min(self.spec.storage);
    }

    pub fn free_cores(&self) -> u32 {
        self.free_cores
    }
}

#[derive(Debug, Clone)]
struct BoundVm {
    vm: Vm,
    host: usize,
    compute: VmCompute,
}

/// Capacity summary a device reports to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceCharacteristics {
    pub device: DeviceId,
    pub hosts: usize,
    pub total_cores: u32,
    pub free_cores: u32,
    pub total_mips: f64,
    pub total_ram: u64,
    pub uplink_bw: f64,
    pub downlink_bw: f64,
    pub bound_vms: usize,
}

/// Hosts owned by a device and the VMs currently bound to them.
#[derive(Debug, Clone)]
pub struct ResourceHost {
    hosts: Vec<Host>,
    bound: BTreeMap<VmId, BoundVm>,
}

impl ResourceHost {
    pub fn new(specs: &[HostSpec]) -> Self {
        ResourceHost { hosts: specs.iter().cloned().map(Host::new).collect(), bound: BTreeMap::new() }
    }

    /// Places the VM on the feasible host with the most free cores (first host on ties).
    /// Returns `false` when no host can take it.
    pub fn allocate(&mut self, vm: &Vm) -> bool {
        if self.bound.contains_key(&vm.id) {
            log::debug!("Vm {} is already bound, allocation is a no-op.", vm.id);
            return true;
        }

        let chosen = self
            .hosts
            .iter()
            .enumerate()
            .filter(|(_, host)| host.fits(&vm.spec))
            .max_by(|(a_idx, a), (b_idx, b)| a.free_cores.cmp(&b.free_cores).then(b_idx.cmp(a_idx)))
            .map(|(idx, _)| idx);

        let Some(host_idx) = chosen else {
            return false;
        };

        self.hosts[host_idx].reserve(&vm.spec);
        let compute = VmCompute::new(vm.id.clone(), vm.spec.mips, vm.spec.cores);
        self.bound.insert(vm.id.clone(), BoundVm { vm: vm.clone(), host: host_idx, compute });
        true
    }

    pub fn deallocate(&mut self, vm_id: &VmId) -> bool {
        match self.bound.remove(vm_id) {
            Some(bound) => {
                if bound.compute.running() > 0 {
                    log::warn!("Vm {} destroyed with {} task(s) still running.", vm_id, bound.compute.running());
                }
                self.hosts[bound.host].release(&bound.vm.spec);
                true
            }
            None => false,
        }
    }

    pub fn is_bound(&self, vm_id: &VmId) -> bool {
        self.bound.contains_key(vm_id)
    }

    pub fn bound_vms(&self) -> Vec<VmId> {
        self.bound.keys().cloned().collect()
    }

    pub fn host_of(&self, vm_id: &VmId) -> Option<&HostId> {
        self.bound.get(vm_id).map(|bound| &self.hosts[bound.host].spec.id)
    }

    /// Hands a task to the VM's compute capability. `None` if the VM is not bound here.
    pub fn submit(&mut self, vm_id: &VmId, length: u64, cores: u32, now: SimTime) -> Option<(SimTime, SimTime)> {
        self.bound.get_mut(vm_id).map(|bound| bound.compute.submit(length, cores, now))
    }

    pub fn complete(&mut self, vm_id: &VmId) {
        if let Some(bound) = self.bound.get_mut(vm_id) {
            bound.compute.complete();
        }
    }

    pub fn characteristics(&self, device: &DeviceId, uplink_bw: f64, downlink_bw: f64) -> DeviceCharacteristics {
        DeviceCharacteristics {
            device: device.clone(),
            hosts: self.hosts.len(),
            total_cores: self.hosts.iter().map(|host| host.spec.cores).sum(),
            free_cores: self.hosts.iter().map(|host| host.free_cores).sum(),
            total_mips: self.hosts.iter().map(|host| host.spec.mips * host.spec.cores as f64).sum(),
            total_ram: self.hosts.iter().map(|host| host.spec.ram).sum(),
            uplink_bw,
            downlink_bw,
            bound_vms: self.bound.len(),
        }
    }
}
