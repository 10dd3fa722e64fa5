use std::cmp::Ordering;
use std::collections::BinaryHeap;

use slotmap::new_key_type;

use crate::domain::entity::message::Message;

/// Simulated time in seconds.
pub type SimTime = f64;

new_key_type! {
    /// Arena key of an entity registered with the kernel.
    pub struct EntityId;
}

/// Strictly increasing sequence number. Breaks ties between events scheduled for the same instant,
/// so equal-time events are delivered in the order they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct Event {
    pub id: EventId,
    pub time: SimTime,
    pub source: EntityId,
    pub target: EntityId,
    pub message: Message,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed: BinaryHeap is a max-heap, the earliest (time, id) must come out first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

/// Pending events ordered by `(time, id)`.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Event>,
    next_id: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: SimTime, source: EntityId, target: EntityId, message: Message) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.heap.push(Event { id, time, source, target, message });
        id
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop()
    }

    pub fn peek_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|event| event.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn two_keys() -> (EntityId, EntityId) {
        let mut arena: SlotMap<EntityId, ()> = SlotMap::with_key();
        (arena.insert(()), arena.insert(()))
    }

    #[test]
    fn test_pops_in_time_order() {
        let (a, b) = two_keys();
        let mut queue = EventQueue::new();
        queue.push(5.0, a, b, Message::Init);
        queue.push(1.0, a, b, Message::Init);
        queue.push(3.0, a, b, Message::Init);

        let times: Vec<SimTime> = std::iter::from_fn(|| queue.pop()).map(|e| e.time).collect();
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_equal_times_are_fifo() {
        let (a, b) = two_keys();
        let mut queue = EventQueue::new();
        let first = queue.push(2.0, a, b, Message::Init);
        let second = queue.push(2.0, b, a, Message::Init);
        let third = queue.push(2.0, a, a, Message::Init);

        let ids: Vec<EventId> = std::iter::from_fn(|| queue.pop()).map(|e| e.id).collect();
        assert_eq!(ids, vec![first, second, third], "Equal-time events must come out in scheduling order");
    }
}
