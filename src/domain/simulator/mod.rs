pub mod entity_trait;
pub mod event;
pub mod simulator;
