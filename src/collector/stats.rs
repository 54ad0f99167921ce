use std::fmt::{Display, Formatter};
use std::ops::AddAssign;
use serde::Serialize;
use crate::collector::config::NUM_PORTS;
use crate::collector::isa::FuClass;

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct CollectorStats {
    pub steps: u64,
    pub dispatched: u64,
    /// offers refused for lack of idle units
    pub dispatch_rejected: u64,
    pub bank_reads: u64,
    /// units that wanted a bank but lost arbitration
    pub bank_conflicts: u64,
    pub forwarded: u64,
    pub promoted: u64,
    pub squashed: u64,
    pub flushed: u64,
    pub released: [u64; NUM_PORTS],
    pub released_by_class: [u64; FuClass::COUNT],
    pub squashed_released: u64,
    pub dual_releases: u64,
    /// Ready-unit steps spent waiting behind an older instruction of the same warp
    pub order_stalls: u64,
    /// selected for release but the consumer was not ready
    pub release_backpressure: u64,
}

impl CollectorStats {
    pub fn total_released(&self) -> u64 {
        self.released.iter().sum()
    }

    /// Released instructions per step.
    pub fn ipc(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total_released() as f64 / self.steps as f64
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl AddAssign<&CollectorStats> for CollectorStats {
    fn add_assign(&mut self, other: &CollectorStats) {
        self.steps += other.steps;
        self.dispatched += other.dispatched;
        self.dispatch_rejected += other.dispatch_rejected;
        self.bank_reads += other.bank_reads;
        self.bank_conflicts += other.bank_conflicts;
        self.forwarded += other.forwarded;
        self.promoted += other.promoted;
        self.squashed += other.squashed;
        self.flushed += other.flushed;
        for p in 0..NUM_PORTS {
            self.released[p] += other.released[p];
        }
        for c in 0..FuClass::COUNT {
            self.released_by_class[c] += other.released_by_class[c];
        }
        self.squashed_released += other.squashed_released;
        self.dual_releases += other.dual_releases;
        self.order_stalls += other.order_stalls;
        self.release_backpressure += other.release_backpressure;
    }
}

impl Display for CollectorStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "steps={} released={} ipc={:.3}", self.steps, self.total_released(), self.ipc())?;
        writeln!(
            f,
            "dispatched={} rejected={} bank_reads={} conflicts={} forwarded={}",
            self.dispatched, self.dispatch_rejected, self.bank_reads, self.bank_conflicts, self.forwarded
        )?;
        writeln!(
            f,
            "squashed={} (released as nop: {}) flushed={} order_stalls={} backpressure={} dual={}",
            self.squashed,
            self.squashed_released,
            self.flushed,
            self.order_stalls,
            self.release_backpressure,
            self.dual_releases
        )?;
        let by_class = FuClass::all()
            .map(|c| format!("{}={}", c, self.released_by_class[c as usize]))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "released by unit: {}", by_class)
    }
}
