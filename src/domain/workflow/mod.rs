pub mod data;
pub mod models;
pub mod task;
pub mod task_state;
pub mod workflow;
