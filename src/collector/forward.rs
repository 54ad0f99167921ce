use smallvec::SmallVec;
use crate::collector::config::{NUM_OPERANDS, NUM_PORTS};
use crate::collector::inst::{LaneData, Writeback};
use crate::collector::regfile::BankedRegFile;
use crate::collector::unit::CollectorUnit;

/// An operand satisfied straight from a same-step writeback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub cu: usize,
    pub op: usize,
    pub data: LaneData,
}

/// Matches this step's writebacks against every outstanding operand.
///
/// Lanes outside the write mask keep the register's committed value, so the
/// forwarded operand equals what the register will hold after the write. When
/// both ports write the same register, port 1 is applied last and wins.
pub fn snoop(
    units: &[CollectorUnit],
    writebacks: &[Option<Writeback>; NUM_PORTS],
    rf: &BankedRegFile,
) -> SmallVec<[Forward; 4]> {
    let mut forwards = SmallVec::new();
    if writebacks.iter().all(Option::is_none) {
        return forwards;
    }
    for (idx, cu) in units.iter().enumerate() {
        for op in (0..NUM_OPERANDS).filter(|&op| cu.outstanding(op)) {
            let reg = cu.inst.rs[op];
            let mut hits = writebacks
                .iter()
                .flatten()
                .filter(|wb| wb.warp == cu.warp() && wb.rd == reg)
                .peekable();
            if hits.peek().is_none() {
                continue;
            }
            let mut data = rf.peek(cu.warp(), reg);
            hits.for_each(|wb| wb.merge_into(&mut data));
            forwards.push(Forward { cu: idx, op, data });
        }
    }
    forwards
}

/// Per-unit mask of operands covered by `forwards`.
pub fn covered(forwards: &[Forward], n: usize) -> Vec<u8> {
    let mut mask = vec![0u8; n];
    for f in forwards {
        mask[f.cu] |= 1 << f.op;
    }
    mask
}
