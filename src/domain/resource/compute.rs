use crate::domain::simulator::event::SimTime;
use crate::domain::utils::id::VmId;

/// Compute capability of one bound VM: submitted tasks run back to back at the VM's full rate.
#[derive(Debug, Clone)]
pub struct VmCompute {
    vm: VmId,
    mips: f64,
    cores: u32,
    busy_until: SimTime,
    running: usize,
}

impl VmCompute {
    pub fn new(vm: VmId, mips: f64, cores: u32) -> Self {
        VmCompute { vm, mips, cores, busy_until: 0.0, running: 0 }
    }

    /// Reserves the VM for a task and returns its `(start, finish)` window.
    pub fn submit(&mut self, length: u64, task_cores: u32, now: SimTime) -> (SimTime, SimTime) {
        let usable_cores = task_cores.clamp(1, self.cores);
        let duration = length as f64 / (self.mips * usable_cores as f64);

        let start = now.max(self.busy_until);
        let finish = start + duration;

        self.busy_until = finish;
        self.running += 1;

        log::debug!("Vm {} runs {} MI on {} cores from {} to {}.", self.vm, length, usable_cores, start, finish);
        (start, finish)
    }

    pub fn complete(&mut self) {
        self.running = self.running.saturating_sub(1);
    }

    pub fn running(&self) -> usize {
        self.running
    }

    pub fn busy_until(&self) -> SimTime {
        self.busy_until
    }
}
