use crate::domain::resource::host::DeviceCharacteristics;
use crate::domain::resource::vm::Vm;
use crate::domain::utils::id::{DeviceId, TaskId, VmId};
use crate::domain::workflow::task::Task;

/// Ask a device to push a finished task's files toward the device of a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutRequest {
    /// Producing task, registered on the device that receives this request.
    pub task: TaskId,
    /// Consumer cycle the data is for.
    pub cycle: u32,
    pub destination: DeviceId,
    /// `false` announces "no data this cycle" and travels without transfer delay.
    pub has_data: bool,
    pub files: Vec<String>,
}

/// Link-layer unit relayed hop by hop.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTransfer {
    pub task: TaskId,
    pub cycle: u32,
    pub destination: DeviceId,
    pub size: u64,
    pub has_data: bool,
}

#[derive(Debug)]
pub enum Message {
    /// Broker bootstrap.
    Init,
    IncomingTask(Task),
    ResourceRequest,
    ResourceResponse(DeviceCharacteristics),
    VmCreate(Vm),
    VmCreateAck { vm: VmId, device: DeviceId, created: bool },
    VmDestroy(VmId),
    VmDestroyAck { vm: VmId, device: DeviceId },
    StageOut(StageOutRequest),
    /// Arrives at the next hop, which still has to pull it through its downlink.
    LinkTransfer(DataTransfer),
    /// Fully received by a device: either consumed there or relayed further.
    TransferDownloaded(DataTransfer),
    UplinkFree,
    DownlinkFree,
    ExecuteTask { task: Task, vm: VmId },
    /// Root task variant: the task's input is pulled through the downlink first.
    ExecuteTaskWithData { task: Task, vm: VmId },
    ComputeFinished { task: TaskId, vm: VmId },
    /// Device -> broker. `executed` is `false` when the task short-circuited on a parent without data.
    TaskReturned { task: Task, executed: bool },
    /// Broker -> workflow engine.
    TaskIsDone(Task),
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Init => "INIT",
            Message::IncomingTask(_) => "INCOMING_TASK",
            Message::ResourceRequest => "RESOURCE_REQUEST",
            Message::ResourceResponse(_) => "RESOURCE_RESPONSE",
            Message::VmCreate(_) => "VM_CREATE",
            Message::VmCreateAck { .. } => "VM_CREATE_ACK",
            Message::VmDestroy(_) => "VM_DESTROY",
            Message::VmDestroyAck { .. } => "VM_DESTROY_ACK",
            Message::StageOut(_) => "STAGE_OUT",
            Message::LinkTransfer(_) => "LINK_TRANSFER",
            Message::TransferDownloaded(_) => "TRANSFER_DOWNLOADED",
            Message::UplinkFree => "UPLINK_FREE",
            Message::DownlinkFree => "DOWNLINK_FREE",
            Message::ExecuteTask { .. } => "EXECUTE_TASK",
            Message::ExecuteTaskWithData { .. } => "EXECUTE_TASK_WITH_DATA",
            Message::ComputeFinished { .. } => "COMPUTE_FINISHED",
            Message::TaskReturned { .. } => "TASK_RETURNED",
            Message::TaskIsDone(_) => "TASK_IS_DONE",
        }
    }
}
