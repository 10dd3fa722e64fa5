use thiserror::Error;

use crate::domain::simulator::event::EntityId;
use crate::domain::utils::id::{DeviceId, TaskId, VmId, WorkflowId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse simulation JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to write simulation report: {0}")]
    ReportError(#[from] csv::Error),

    #[error("Invalid simulation setup: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Entity '{entity}' violated the event protocol: {detail}")]
    ProtocolViolation { entity: String, detail: String },

    #[error("Event addressed to unregistered entity {0:?}")]
    UnknownEntity(EntityId),
}

/// Fatal problems detected before (or, for routing, while) data is staged.
/// A simulation that reports one of these must not be run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Workflow '{0}' contains a dependency cycle")]
    CyclicWorkflow(WorkflowId),

    #[error("Task '{0}' is declared more than once")]
    DuplicateTask(TaskId),

    #[error("Task '{task}' in workflow '{workflow}' references unknown task '{reference}'")]
    UnknownTaskReference { workflow: WorkflowId, task: TaskId, reference: String },

    #[error("Device '{0}' is declared more than once")]
    DuplicateDevice(DeviceId),

    #[error("Device '{device}' declares unknown neighbor '{neighbor}'")]
    UnknownNeighbor { device: DeviceId, neighbor: String },

    #[error("Device '{device}' is malformed: {reason}")]
    InvalidDevice { device: DeviceId, reason: String },

    #[error("No route from device '{from}' to device '{to}'")]
    NoRoute { from: DeviceId, to: DeviceId },

    #[error("Vm '{0}' is declared more than once")]
    DuplicateVm(VmId),

    #[error("Vm '{vm}' is malformed: {reason}")]
    InvalidVm { vm: VmId, reason: String },

    #[error("Vm '{vm}' has affinity to unknown device '{device}'")]
    UnknownDeviceAffinity { vm: VmId, device: String },

    #[error("Task '{task}' is pinned to unknown vm '{vm}'")]
    UnknownPinnedVm { task: TaskId, vm: String },

    #[error("Unknown {kind} '{name}'")]
    UnknownPolicy { kind: &'static str, name: String },

    #[error("Invalid failure distribution: {0}")]
    InvalidDistribution(String),

    #[error("Failure mode '{0}' requires a shared distribution")]
    MissingFailureGenerator(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
