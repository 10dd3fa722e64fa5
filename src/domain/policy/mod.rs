pub mod assignment_ledger;
pub mod policy_type;
pub mod task_to_vm_mapper;
pub mod vm_provisioner;
pub mod vm_to_device_mapper;
