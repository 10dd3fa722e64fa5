use std::any::Any;

use crate::domain::simulator::event::{EntityId, Event};
use crate::domain::simulator::simulator::SimContext;
use crate::error::Result;

/// A scheduled unit of the simulation. Entities only change their own state, and only from inside `handle`.
pub trait Entity: Any {
    fn id(&self) -> EntityId;

    fn name(&self) -> &str;

    /// Called once, in registration order, before the first event is delivered.
    fn start(&mut self, _ctx: &mut SimContext<'_>) -> Result<()> {
        Ok(())
    }

    fn handle(&mut self, event: Event, ctx: &mut SimContext<'_>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
