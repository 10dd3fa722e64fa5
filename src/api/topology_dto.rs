use serde::Deserialize;

/// Bytes per second, roughly 1 MB/s.
pub const DEFAULT_LINK_BANDWIDTH: f64 = 1_048_576.0;

fn default_link_bandwidth() -> f64 {
    DEFAULT_LINK_BANDWIDTH
}

fn default_host_ram() -> u64 {
    2048
}

fn default_host_bw() -> u64 {
    10_000
}

fn default_host_storage() -> u64 {
    1_000_000
}

fn default_vm_mips() -> f64 {
    1000.0
}

fn default_cores() -> u32 {
    1
}

fn default_vm_ram() -> u64 {
    512
}

fn default_vm_bw() -> u64 {
    1024
}

fn default_vm_size() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDto {
    pub devices: Vec<DeviceDto>,
    #[serde(default)]
    pub vms: Vec<VmDto>,
}

/// One fog node. Its name is also its identifier; neighbors are referenced by name.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub name: String,
    #[serde(default)]
    pub neighbors: Vec<String>,
    pub hosts: Vec<HostDto>,
    #[serde(default = "default_link_bandwidth")]
    pub uplink_bw: f64,
    #[serde(default = "default_link_bandwidth")]
    pub downlink_bw: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDto {
    pub mips: f64,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_host_ram")]
    pub ram: u64,
    #[serde(default = "default_host_bw")]
    pub bw: u64,
    #[serde(default = "default_host_storage")]
    pub storage: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDto {
    pub id: String,
    #[serde(default = "default_vm_mips")]
    pub mips: f64,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_vm_ram")]
    pub ram: u64,
    #[serde(default = "default_vm_bw")]
    pub bw: u64,
    #[serde(default = "default_vm_size")]
    pub size: u64,
    /// Name of the device this VM should be placed on.
    #[serde(default)]
    pub device: Option<String>,
}
