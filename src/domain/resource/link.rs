use std::collections::VecDeque;
use std::fmt;

use crate::domain::entity::message::Message;
use crate::domain::simulator::event::{EntityId, SimTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Uplink,
    Downlink,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDirection::Uplink => write!(f, "uplink"),
            LinkDirection::Downlink => write!(f, "downlink"),
        }
    }
}

/// A transfer waiting for (or holding) the link. When served, `message` is delivered to `target` after `delay`.
#[derive(Debug)]
pub struct PendingTransfer {
    pub target: EntityId,
    pub delay: SimTime,
    pub message: Message,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceInterval {
    pub start: SimTime,
    pub end: SimTime,
}

/// Single-server FIFO: one transfer in flight, the rest queue in arrival order.
#[derive(Debug)]
pub struct Link {
    direction: LinkDirection,
    bandwidth: f64,
    busy: bool,
    queue: VecDeque<PendingTransfer>,
    history: Vec<ServiceInterval>,
}

impl Link {
    pub fn new(direction: LinkDirection, bandwidth: f64) -> Self {
        Link { direction, bandwidth, busy: false, queue: VecDeque::new(), history: Vec::new() }
    }

    /// Time to push `size` bytes through this link. Control-only transfers (no data) cost nothing.
    pub fn transfer_delay(&self, size: u64, has_data: bool) -> SimTime {
        if has_data { size as f64 / self.bandwidth } else { 0.0 }
    }

    /// Returns the transfer back if the link was idle and it must start now; otherwise queues it.
    pub fn submit(&mut self, transfer: PendingTransfer) -> Option<PendingTransfer> {
        if self.busy {
            self.queue.push_back(transfer);
            log::debug!("{} busy, transfer queued ({} waiting).", self.direction, self.queue.len());
            return None;
        }
        self.busy = true;
        Some(transfer)
    }

    /// Called when the in-flight transfer finishes. Hands out the next queued transfer, or marks the link idle.
    pub fn release(&mut self) -> Option<PendingTransfer> {
        let next = self.queue.pop_front();
        if next.is_none() {
            self.busy = false;
        }
        next
    }

    pub fn record_service(&mut self, start: SimTime, delay: SimTime) {
        self.history.push(ServiceInterval { start, end: start + delay });
    }

    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn history(&self) -> &[ServiceInterval] {
        &self.history
    }
}

/// Device capability: the contended uplink and downlink of one topology node.
#[derive(Debug)]
pub struct LinkEndpoint {
    pub uplink: Link,
    pub downlink: Link,
}

impl LinkEndpoint {
    pub fn new(uplink_bw: f64, downlink_bw: f64) -> Self {
        LinkEndpoint { uplink: Link::new(LinkDirection::Uplink, uplink_bw), downlink: Link::new(LinkDirection::Downlink, downlink_bw) }
    }

    pub fn link_mut(&mut self, direction: LinkDirection) -> &mut Link {
        match direction {
            LinkDirection::Uplink => &mut self.uplink,
            LinkDirection::Downlink => &mut self.downlink,
        }
    }
}
