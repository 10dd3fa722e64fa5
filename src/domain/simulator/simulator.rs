use slotmap::SlotMap;

use crate::domain::entity::message::Message;
use crate::domain::simulator::entity_trait::Entity;
use crate::domain::simulator::event::{EntityId, EventId, EventQueue, SimTime};
use crate::error::{Error, Result};

/// Handle given to an entity while it processes one event.
pub struct SimContext<'a> {
    queue: &'a mut EventQueue,
    now: SimTime,
    current: EntityId,
}

impl<'a> SimContext<'a> {
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn self_id(&self) -> EntityId {
        self.current
    }

    /// Schedules `message` for `target` at `now + delay`. Negative or NaN delays are clamped to zero.
    pub fn schedule(&mut self, target: EntityId, delay: SimTime, message: Message) -> EventId {
        let delay = sanitize_delay(delay, &message);
        self.queue.push(self.now + delay, self.current, target, message)
    }

    pub fn send_now(&mut self, target: EntityId, message: Message) -> EventId {
        self.schedule(target, 0.0, message)
    }

    pub fn schedule_self(&mut self, delay: SimTime, message: Message) -> EventId {
        let current = self.current;
        self.schedule(current, delay, message)
    }
}

fn sanitize_delay(delay: SimTime, message: &Message) -> SimTime {
    if delay >= 0.0 {
        return delay;
    }
    log::warn!("Negative delay {} for event '{}' clamped to zero.", delay, message.tag());
    0.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub events_processed: u64,
    pub final_time: SimTime,
}

/// Discrete-event kernel: owns every entity and the pending event queue.
pub struct Simulator {
    entities: SlotMap<EntityId, Box<dyn Entity>>,
    queue: EventQueue,
    clock: SimTime,
    events_processed: u64,
    started: bool,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Simulator { entities: SlotMap::with_key(), queue: EventQueue::new(), clock: 0.0, events_processed: 0, started: false }
    }

    /// Registers an entity. The constructor receives the key the entity is stored under.
    pub fn add_entity<E, F>(&mut self, build: F) -> EntityId
    where
        E: Entity,
        F: FnOnce(EntityId) -> E,
    {
        self.entities.insert_with_key(|id| Box::new(build(id)))
    }

    pub fn entity<E: Entity>(&self, id: EntityId) -> Option<&E> {
        self.entities.get(id).and_then(|entity| entity.as_any().downcast_ref::<E>())
    }

    pub fn entity_mut<E: Entity>(&mut self, id: EntityId) -> Option<&mut E> {
        self.entities.get_mut(id).and_then(|entity| entity.as_any_mut().downcast_mut::<E>())
    }

    /// Schedules an event from outside any handler, relative to the current clock.
    pub fn schedule(&mut self, source: EntityId, target: EntityId, delay: SimTime, message: Message) -> EventId {
        let delay = sanitize_delay(delay, &message);
        self.queue.push(self.clock + delay, source, target, message)
    }

    pub fn now(&self) -> SimTime {
        self.clock
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    fn start_entities(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        let ids: Vec<EntityId> = self.entities.keys().collect();
        for id in ids {
            let entity = self.entities.get_mut(id).ok_or(Error::UnknownEntity(id))?;
            let mut ctx = SimContext { queue: &mut self.queue, now: self.clock, current: id };
            entity.start(&mut ctx)?;
        }
        Ok(())
    }

    /// Delivers the earliest pending event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> Result<bool> {
        self.start_entities()?;

        let Some(event) = self.queue.pop() else {
            return Ok(false);
        };

        self.clock = event.time;
        let target = event.target;
        let entity = self.entities.get_mut(target).ok_or(Error::UnknownEntity(target))?;
        let mut ctx = SimContext { queue: &mut self.queue, now: self.clock, current: target };
        entity.handle(event, &mut ctx)?;
        self.events_processed += 1;

        Ok(true)
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_until(None)
    }

    /// Runs until the queue drains or the next event lies beyond `end_time`.
    pub fn run_until(&mut self, end_time: Option<SimTime>) -> Result<RunSummary> {
        self.start_entities()?;

        loop {
            if let (Some(end), Some(next)) = (end_time, self.queue.peek_time()) {
                if next > end {
                    log::info!("Stopping at {}: next event at {} is past the end time.", self.clock, next);
                    break;
                }
            }
            if !self.step()? {
                break;
            }
        }

        log::info!("Simulation finished at {} after {} events.", self.clock, self.events_processed);
        Ok(RunSummary { events_processed: self.events_processed, final_time: self.clock })
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::domain::simulator::event::Event;

    /// Records arrival times and bounces a fixed number of follow-up events to itself.
    struct Echo {
        id: EntityId,
        bounces: u32,
        seen: Vec<SimTime>,
    }

    impl Entity for Echo {
        fn id(&self) -> EntityId {
            self.id
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn start(&mut self, ctx: &mut SimContext<'_>) -> Result<()> {
            ctx.schedule_self(1.5, Message::Init);
            Ok(())
        }

        fn handle(&mut self, _event: Event, ctx: &mut SimContext<'_>) -> Result<()> {
            self.seen.push(ctx.now());
            if self.bounces > 0 {
                self.bounces -= 1;
                ctx.schedule_self(2.0, Message::Init);
            }
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_run_delivers_follow_up_events() {
        let mut simulator = Simulator::new();
        let echo = simulator.add_entity(|id| Echo { id, bounces: 2, seen: Vec::new() });

        let summary = simulator.run().unwrap();

        assert_eq!(summary.events_processed, 3);
        assert_eq!(summary.final_time, 5.5);
        assert_eq!(simulator.entity::<Echo>(echo).unwrap().seen, vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn test_run_until_stops_before_end_time() {
        let mut simulator = Simulator::new();
        let echo = simulator.add_entity(|id| Echo { id, bounces: 10, seen: Vec::new() });

        simulator.run_until(Some(4.0)).unwrap();

        assert_eq!(simulator.entity::<Echo>(echo).unwrap().seen, vec![1.5, 3.5]);
        assert_eq!(simulator.pending_events(), 1, "The event past the end time stays queued");
    }

    #[test]
    fn test_negative_delay_is_clamped() {
        let mut simulator = Simulator::new();
        let echo = simulator.add_entity(|id| Echo { id, bounces: 0, seen: Vec::new() });
        simulator.schedule(echo, echo, -3.0, Message::Init);

        simulator.run().unwrap();

        assert_eq!(simulator.entity::<Echo>(echo).unwrap().seen, vec![0.0, 1.5]);
    }
}
