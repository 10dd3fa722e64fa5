pub mod config_dto;
pub mod topology_dto;
pub mod workflow_dto;
