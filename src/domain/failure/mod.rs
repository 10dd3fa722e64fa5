pub mod distribution;
pub mod failure_generator;
pub mod failure_monitor;
