use smallvec::SmallVec;
use crate::collector::config::NUM_PORTS;
use crate::collector::counters::WarpCounters;
use crate::collector::isa::FuClass;
use crate::collector::unit::CollectorUnit;

/// Release decision for one step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    /// unit selected per port, whether or not the consumer accepted it
    pub selected: [Option<usize>; NUM_PORTS],
    /// selected and accepted by the consumer
    pub fired: [bool; NUM_PORTS],
    /// Ready units held back only because an older instruction of their warp is in flight
    pub order_stalls: usize,
}

impl ReleasePlan {
    pub fn released(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..NUM_PORTS).filter_map(|p| self.fired[p].then_some(p).zip(self.selected[p]))
    }
}

/// Picks the units handed to execution, scanning from `start`.
///
/// Port 0 takes the first Ready unit that is the oldest unreleased instruction of
/// its warp. With `dual`, port 1 takes a second one of a different unit class. It
/// may pick the next instruction of port 0's warp, but only once port 0 actually
/// fired. Units of `flushed` are never released.
pub fn select(
    units: &[CollectorUnit],
    counters: &WarpCounters,
    flushed: Option<usize>,
    exec_ready: [bool; NUM_PORTS],
    start: usize,
    dual: bool,
) -> ReleasePlan {
    let n = units.len();
    let scan = || (0..n).map(move |offset| (start + offset) % n);
    let candidate = |idx: usize| {
        let cu = &units[idx];
        cu.is_ready() && Some(cu.warp()) != flushed
    };

    let mut plan = ReleasePlan::default();
    let port0 = scan().find(|&i| candidate(i) && units[i].issue_id == counters.head(units[i].warp()));
    plan.selected[0] = port0;
    plan.fired[0] = port0.is_some() && exec_ready[0];

    if dual {
        let class0: Option<FuClass> = port0.map(|i| units[i].unit());
        let chained_warp = port0.filter(|_| plan.fired[0]).map(|i| units[i].warp());
        let port1 = scan().find(|&i| {
            if Some(i) == port0 || !candidate(i) {
                return false;
            }
            let cu = &units[i];
            if class0 == Some(cu.unit()) {
                return false;
            }
            let head = counters.head(cu.warp());
            if Some(cu.warp()) == chained_warp {
                cu.issue_id == counters.succ(head)
            } else {
                cu.issue_id == head
            }
        });
        plan.selected[1] = port1;
        plan.fired[1] = port1.is_some() && exec_ready[1];
    }

    let released: SmallVec<[usize; NUM_PORTS]> = plan.released().map(|(_, cu)| cu).collect();
    plan.order_stalls = (0..n)
        .filter(|i| !released.contains(i))
        .filter(|&i| candidate(i) && units[i].issue_id != counters.head(units[i].warp()))
        .count();
    plan
}

/// Next start index: one past the highest unit released this step.
pub fn next_start(plan: &ReleasePlan, start: usize, n: usize) -> usize {
    plan.released()
        .map(|(_, cu)| cu)
        .max()
        .map_or(start, |cu| (cu + 1) % n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::inst::Instruction;
    use crate::collector::isa::Opcode;

    fn ready(opcode: u8, warp: usize, issue_id: u32) -> CollectorUnit {
        let mut cu = CollectorUnit::default();
        cu.allocate(Instruction::new(opcode, warp, 1, [0; 3]), issue_id);
        cu.state = crate::collector::unit::CuState::Ready;
        cu
    }

    fn counters(issued: &[u32]) -> WarpCounters {
        let mut c = WarpCounters::new(issued.len(), 8);
        for (w, &k) in issued.iter().enumerate() {
            (0..k).for_each(|_| {
                c.take(w);
            });
        }
        c
    }

    #[test]
    fn younger_ready_waits_for_head() {
        let units = vec![ready(Opcode::ADD, 0, 1), CollectorUnit::default()];
        let plan = select(&units, &counters(&[2]), None, [true; 2], 0, false);
        assert_eq!(plan.selected, [None, None]);
        assert_eq!(plan.order_stalls, 1);
    }

    #[test]
    fn scan_starts_at_pointer() {
        let units = vec![ready(Opcode::ADD, 0, 0), ready(Opcode::ADD, 1, 0)];
        let c = counters(&[1, 1]);
        assert_eq!(select(&units, &c, None, [true; 2], 0, false).selected[0], Some(0));
        assert_eq!(select(&units, &c, None, [true; 2], 1, false).selected[0], Some(1));
    }

    #[test]
    fn backpressure_keeps_selection_unfired() {
        let units = vec![ready(Opcode::ADD, 0, 0)];
        let plan = select(&units, &counters(&[1]), None, [false, true], 0, false);
        assert_eq!(plan.selected[0], Some(0));
        assert!(!plan.fired[0]);
        assert_eq!(plan.released().count(), 0);
        assert_eq!(next_start(&plan, 0, 1), 0);
    }

    #[test]
    fn dual_release_needs_distinct_unit_classes() {
        let units = vec![
            ready(Opcode::ADD, 0, 0),
            ready(Opcode::SUB, 1, 0),
            ready(Opcode::FADD, 2, 0),
        ];
        let c = counters(&[1, 1, 1]);
        let plan = select(&units, &c, None, [true; 2], 0, true);
        assert_eq!(plan.selected, [Some(0), Some(2)]);
        assert_eq!(next_start(&plan, 0, 3), 0);
        let single = select(&units, &c, None, [true; 2], 0, false);
        assert_eq!(single.selected, [Some(0), None]);
    }

    #[test]
    fn dual_release_chains_same_warp_only_after_port0_fires() {
        let units = vec![ready(Opcode::ADD, 0, 0), ready(Opcode::LDR, 0, 1)];
        let c = counters(&[2]);
        let plan = select(&units, &c, None, [true; 2], 0, true);
        assert_eq!(plan.released().collect::<Vec<_>>(), vec![(0, 0), (1, 1)]);
        assert_eq!(plan.order_stalls, 0);
        let blocked = select(&units, &c, None, [false, true], 0, true);
        assert_eq!(blocked.selected, [Some(0), None]);
        assert_eq!(blocked.order_stalls, 1);
    }

    #[test]
    fn flushed_warp_is_not_released() {
        let units = vec![ready(Opcode::ADD, 3, 0)];
        let plan = select(&units, &counters(&[0, 0, 0, 1]), Some(3), [true; 2], 0, false);
        assert_eq!(plan.selected[0], None);
    }
}
