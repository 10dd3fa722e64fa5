pub mod broker;
pub mod device;
pub mod message;
pub mod workflow_engine;
