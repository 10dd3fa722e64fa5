use std::fmt::Debug;

use rand::Rng;
use rand::rngs::StdRng;

use crate::domain::simulator::event::SimTime;

/// Decides, once per cycle, whether a task produces output data. Randomness comes from the caller's generator,
/// so a run is reproducible from its seed.
pub trait SelectivityModel: Debug {
    fn generate_data(&self, clock: SimTime, rng: &mut StdRng) -> bool;
}

/// Decides when a periodic root task is activated next.
pub trait ExecutionModel: Debug {
    fn next_execution_time(&self, clock: SimTime) -> SimTime;
}

/// Produces data with a fixed probability, independently per call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractionalSelectivity {
    pub fraction: f64,
}

impl FractionalSelectivity {
    pub fn new(fraction: f64) -> Self {
        FractionalSelectivity { fraction }
    }
}

impl SelectivityModel for FractionalSelectivity {
    fn generate_data(&self, _clock: SimTime, rng: &mut StdRng) -> bool {
        if self.fraction >= 1.0 {
            return true;
        }
        if self.fraction <= 0.0 {
            return false;
        }
        rng.random::<f64>() < self.fraction
    }
}

/// Activates on every multiple of `period`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicExecutionModel {
    pub period: f64,
}

impl PeriodicExecutionModel {
    pub fn new(period: f64) -> Self {
        PeriodicExecutionModel { period }
    }
}

impl ExecutionModel for PeriodicExecutionModel {
    /// Next aligned tick at or after `clock`. A non-positive period means "now".
    fn next_execution_time(&self, clock: SimTime) -> SimTime {
        if self.period <= 0.0 {
            return clock;
        }
        (clock / self.period).ceil() * self.period
    }
}
