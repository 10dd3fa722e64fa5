pub mod entity;
pub mod failure;
pub mod policy;
pub mod report;
pub mod resource;
pub mod simulation;
pub mod simulator;
pub mod topology;
pub mod utils;
pub mod workflow;
