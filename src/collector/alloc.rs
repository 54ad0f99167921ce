use log::debug;
use smallvec::SmallVec;
use crate::collector::config::{CollectorConfig, NUM_PORTS};
use crate::collector::counters::WarpCounters;
use crate::collector::inst::Instruction;
use crate::collector::unit::CollectorUnit;

/// Outcome of one step's dispatch offers against the committed pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// nothing was offered
    None,
    /// collector unit picked for each offering port
    Granted([Option<usize>; NUM_PORTS]),
    /// not enough idle units for every offer; nothing is allocated
    Refused,
}

pub fn idle_units(units: &[CollectorUnit]) -> SmallVec<[usize; 8]> {
    units
        .iter()
        .enumerate()
        .filter(|(_, cu)| cu.is_idle())
        .map(|(i, _)| i)
        .collect()
}

/// Port 0 ready with one idle unit, port 1 only with two.
pub fn dispatch_ready(units: &[CollectorUnit]) -> [bool; NUM_PORTS] {
    let idle = units.iter().filter(|cu| cu.is_idle()).count();
    std::array::from_fn(|port| idle > port)
}

/// Feasibility phase. Offers are served both-or-neither; free units are handed out
/// lowest index first, in port order. An offer naming a warp or register outside
/// the configured file refuses the whole step.
pub fn plan(
    units: &[CollectorUnit],
    offers: &[Option<Instruction>; NUM_PORTS],
    conf: &CollectorConfig,
) -> Allocation {
    let wanted = offers.iter().filter(|o| o.is_some()).count();
    if wanted == 0 {
        return Allocation::None;
    }
    for (port, inst) in offers.iter().enumerate() {
        let Some(inst) = inst else { continue };
        if let Err(err) = inst.validate(conf) {
            debug!("dispatch port {} refused: {:#}", port, err);
            return Allocation::Refused;
        }
    }
    let idle = idle_units(units);
    if idle.len() < wanted {
        return Allocation::Refused;
    }
    let mut free = idle.into_iter();
    let mut grants = [None; NUM_PORTS];
    for (port, offer) in offers.iter().enumerate() {
        if offer.is_some() {
            grants[port] = free.next();
        }
    }
    Allocation::Granted(grants)
}

/// Commit phase. Issue ids chain through `counters`, so two same-warp offers in
/// one step get consecutive ids in port order.
pub fn commit(
    units: &mut [CollectorUnit],
    counters: &mut WarpCounters,
    offers: &[Option<Instruction>; NUM_PORTS],
    grants: &[Option<usize>; NUM_PORTS],
) -> [Option<u32>; NUM_PORTS] {
    let mut ids = [None; NUM_PORTS];
    for port in 0..NUM_PORTS {
        if let (Some(inst), Some(cu)) = (offers[port], grants[port]) {
            let id = counters.take(inst.warp);
            units[cu].allocate(inst, id);
            ids[port] = Some(id);
        }
    }
    ids
}
