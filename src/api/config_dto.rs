use std::collections::BTreeMap;

use serde::Deserialize;

use crate::api::topology_dto::DEFAULT_LINK_BANDWIDTH;

fn default_stage_in_bandwidth() -> f64 {
    DEFAULT_LINK_BANDWIDTH
}

fn default_policy() -> String {
    "simple".to_string()
}

fn default_mode() -> String {
    "none".to_string()
}

fn default_sample_size() -> usize {
    50
}

fn default_max_extensions() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfigDto {
    /// Last cycle a task is re-dispatched for. 0 runs every task once.
    #[serde(default)]
    pub max_cycle: u32,
    #[serde(default = "default_stage_in_bandwidth")]
    pub stage_in_bandwidth: f64,
    #[serde(default)]
    pub end_time: Option<f64>,
    /// Seeds the selectivity decisions of every task.
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub policies: PoliciesDto,
    #[serde(default)]
    pub failure: FailureDto,
}

impl Default for SimulationConfigDto {
    fn default() -> Self {
        SimulationConfigDto {
            max_cycle: 0,
            stage_in_bandwidth: default_stage_in_bandwidth(),
            end_time: None,
            seed: 0,
            policies: PoliciesDto::default(),
            failure: FailureDto::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoliciesDto {
    #[serde(default = "default_policy")]
    pub vm_to_device: String,
    #[serde(default = "default_policy")]
    pub task_to_vm: String,
    #[serde(default = "default_policy")]
    pub provisioner: String,
}

impl Default for PoliciesDto {
    fn default() -> Self {
        PoliciesDto { vm_to_device: default_policy(), task_to_vm: default_policy(), provisioner: default_policy() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDto {
    #[serde(default = "default_mode")]
    pub monitor_mode: String,
    #[serde(default = "default_mode")]
    pub failure_mode: String,
    #[serde(default)]
    pub distribution: Option<DistributionDto>,
    #[serde(default)]
    pub per_vm: BTreeMap<String, DistributionDto>,
}

impl Default for FailureDto {
    fn default() -> Self {
        FailureDto { monitor_mode: default_mode(), failure_mode: default_mode(), distribution: None, per_vm: BTreeMap::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionDto {
    pub family: String,
    pub scale: f64,
    pub shape: f64,
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_max_extensions")]
    pub max_extensions: u32,
    #[serde(default)]
    pub seed: u64,
}
