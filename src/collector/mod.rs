pub mod alloc;
pub mod arbiter;
pub mod config;
pub mod counters;
pub mod forward;
pub mod inst;
pub mod isa;
pub mod regfile;
pub mod release;
pub mod squash;
pub mod stats;
pub mod unit;

#[cfg(test)]
mod unit_tests;

use std::sync::Arc;
use log::{debug, info};
use crate::base::behavior::ModuleBehaviors;
use crate::base::module::ModuleBase;

pub use alloc::Allocation;
pub use arbiter::{BankArbiters, BankGrant};
pub use config::{CollectorConfig, NUM_BANKS, NUM_OPERANDS, NUM_PORTS};
pub use counters::WarpCounters;
pub use inst::{Instruction, IssuedInst, LaneData, Writeback};
pub use isa::{FuClass, Opcode};
pub use regfile::BankedRegFile;
pub use stats::CollectorStats;
pub use unit::{CollectorUnit, CuState};

/// Committed state of the collector between two steps.
#[derive(Debug, Default, Clone)]
pub struct CollectorState {
    pub units: Vec<CollectorUnit>,
    pub counters: WarpCounters,
    pub arbiters: BankArbiters,
    pub release_rr: usize,
}

/// Everything driven into the collector for one step.
#[derive(Debug, Default, Clone)]
pub struct CollectorInputs {
    pub dispatch: [Option<Instruction>; NUM_PORTS],
    pub writebacks: [Option<Writeback>; NUM_PORTS],
    pub flush: Option<usize>,
    /// current speculative branch tag per warp
    pub branch_tags: Vec<u32>,
    /// per release port, whether the consumer accepts an instruction this step
    pub exec_ready: [bool; NUM_PORTS],
}

impl CollectorInputs {
    /// No traffic, all tags zero, both consumers ready.
    pub fn idle(num_warps: usize) -> Self {
        Self {
            branch_tags: vec![0; num_warps],
            exec_ready: [true; NUM_PORTS],
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectorOutputs {
    /// dispatch ready as seen by the front end at the start of the step
    pub dispatch_ready: [bool; NUM_PORTS],
    /// issue id handed to each accepted dispatch offer
    pub granted: [Option<u32>; NUM_PORTS],
    pub refused: bool,
    pub released: [Option<IssuedInst>; NUM_PORTS],
}

impl CollectorOutputs {
    pub fn released(&self) -> impl Iterator<Item = &IssuedInst> {
        self.released.iter().flatten()
    }
}

/// Operand collection and in-order release for all warps of one core.
///
/// Each [`OperandCollector::step`] runs allocation, collection (bank reads and
/// forwarding), promotion, squash and release against the committed state and
/// publishes the result at the end of the step.
#[derive(Debug)]
pub struct OperandCollector {
    base: ModuleBase<CollectorState, CollectorConfig>,
    pub stats: CollectorStats,
}

impl OperandCollector {
    pub fn new(config: Arc<CollectorConfig>) -> Self {
        let base = ModuleBase {
            state: CollectorState {
                units: vec![CollectorUnit::default(); config.num_collectors],
                counters: WarpCounters::new(config.num_warps, config.counter_width),
                ..CollectorState::default()
            },
            ..ModuleBase::default()
        };
        base.config.set(config).map_err(|_| "config already set").unwrap();
        OperandCollector { base, stats: CollectorStats::default() }
    }

    pub fn conf(&self) -> &CollectorConfig {
        self.base.config.get().expect("collector built without config")
    }

    pub fn state(&self) -> &CollectorState {
        &self.base.state
    }

    pub fn units(&self) -> &[CollectorUnit] {
        &self.base.state.units
    }

    pub fn counters(&self) -> &WarpCounters {
        &self.base.state.counters
    }

    pub fn cycle(&self) -> u64 {
        self.base.cycle
    }

    pub fn dispatch_ready(&self) -> [bool; NUM_PORTS] {
        alloc::dispatch_ready(&self.base.state.units)
    }

    /// Non-idle units; equals the number of dispatched but unreleased instructions.
    pub fn occupancy(&self) -> usize {
        self.units().iter().filter(|cu| !cu.is_idle()).count()
    }

    /// Unreleased issue ids summed over all warps.
    pub fn ids_in_flight(&self) -> usize {
        let counters = self.counters();
        (0..counters.num_warps()).map(|w| counters.in_flight(w) as usize).sum()
    }

    pub fn reset(&mut self) {
        let conf = *self.conf();
        self.base.state = CollectorState {
            units: vec![CollectorUnit::default(); conf.num_collectors],
            counters: WarpCounters::new(conf.num_warps, conf.counter_width),
            ..CollectorState::default()
        };
        self.base.cycle = 0;
        self.stats = CollectorStats::default();
    }

    /// Advances one step. `rf` is read for collection and forwarding, then written
    /// with this step's writebacks, then ticked.
    pub fn step(&mut self, rf: &mut BankedRegFile, io: &CollectorInputs) -> CollectorOutputs {
        let conf = *self.conf();
        let (n, dual) = (conf.num_collectors, conf.dual_release);
        let cur = &self.base.state;
        let mut next = self.base.snapshot();
        let stats = &mut self.stats;
        let cycle = self.base.cycle;
        let mut out = CollectorOutputs {
            dispatch_ready: alloc::dispatch_ready(&cur.units),
            ..CollectorOutputs::default()
        };

        // allocation feasibility, on the committed pool
        let allocation = alloc::plan(&cur.units, &io.dispatch, &conf);

        // forwarding has priority over bank reads of the same operand
        let forwards = forward::snoop(&cur.units, &io.writebacks, rf);
        let covered = forward::covered(&forwards, n);
        for f in forwards {
            debug!("{}: cu {} rs{} forwarded", cycle, f.cu, f.op + 1);
            next.units[f.cu].satisfy(f.op, f.data);
            stats.forwarded += 1;
        }

        let (grants, waiting) = cur.arbiters.arbitrate(&cur.units, &covered);
        for (bank, grant) in grants.iter().enumerate() {
            let Some(grant) = grant else { continue };
            let cu = &cur.units[grant.cu];
            match rf.read(bank, cu.warp(), regfile::slot_of(grant.reg)) {
                Some(data) => {
                    debug!("{}: bank {} -> cu {} rs{} (r{})", cycle, bank, grant.cu, grant.op + 1, grant.reg);
                    next.units[grant.cu].satisfy(grant.op, data);
                    next.arbiters.advance(bank, grant.cu, n);
                    stats.bank_reads += 1;
                    stats.bank_conflicts += waiting[bank] as u64 - 1;
                }
                None => stats.bank_conflicts += waiting[bank] as u64,
            }
        }

        for idx in 0..n {
            if cur.units[idx].is_allocated() && next.units[idx].promote() {
                debug!("{}: cu {} {}", cycle, idx, next.units[idx]);
                stats.promoted += 1;
            }
        }

        let squashed = squash::squash_stale(&cur.units, &mut next.units, &io.branch_tags);
        if squashed > 0 {
            info!("{}: {} collector unit(s) squashed on stale branch tag", cycle, squashed);
            stats.squashed += squashed as u64;
        }
        if let Some(warp) = io.flush {
            assert!(warp < cur.counters.num_warps(), "flush of unknown warp {}", warp);
            let freed = squash::flush(&cur.units, &mut next.units, warp);
            next.counters.rewind(warp);
            info!("{}: flush w{} freed {} collector unit(s)", cycle, warp, freed);
            stats.flushed += freed as u64;
        }

        let plan = release::select(&cur.units, &cur.counters, io.flush, io.exec_ready, cur.release_rr, dual);
        stats.order_stalls += plan.order_stalls as u64;
        for port in 0..NUM_PORTS {
            if plan.selected[port].is_some() && !plan.fired[port] {
                stats.release_backpressure += 1;
            }
        }
        for (port, idx) in plan.released() {
            let cu = &cur.units[idx];
            let issued = cu.issue(idx, squash::is_stale(cu, &io.branch_tags));
            debug!("{}: release port {} {}", cycle, port, issued);
            next.counters.retire(cu.warp());
            next.units[idx].clear();
            stats.released[port] += 1;
            stats.released_by_class[issued.unit() as usize] += 1;
            if issued.squashed {
                stats.squashed_released += 1;
            }
            out.released[port] = Some(issued);
        }
        if out.released.iter().all(Option::is_some) {
            stats.dual_releases += 1;
        }
        next.release_rr = release::next_start(&plan, cur.release_rr, n);

        match allocation {
            Allocation::None => {}
            Allocation::Refused => {
                debug!("{}: dispatch refused", cycle);
                out.refused = true;
                stats.dispatch_rejected += io.dispatch.iter().flatten().count() as u64;
            }
            Allocation::Granted(grants) => {
                out.granted = alloc::commit(&mut next.units, &mut next.counters, &io.dispatch, &grants);
                for (port, id) in out.granted.iter().enumerate() {
                    if let (Some(id), Some(cu)) = (id, grants[port]) {
                        debug!("{}: dispatch port {} -> cu {} id {}", cycle, port, cu, id);
                        stats.dispatched += 1;
                    }
                }
            }
        }

        for wb in io.writebacks.iter().flatten() {
            rf.write(wb);
        }
        rf.tick_one();

        stats.steps += 1;
        self.base.commit(next);
        out
    }
}
