use std::fmt::{Display, Formatter};
use crate::collector::config::NUM_OPERANDS;
use crate::collector::inst::{Instruction, IssuedInst, LaneData};
use crate::collector::isa::FuClass;
use crate::utils::{BitMask, BitSlice};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CuState {
    #[default]
    Idle,
    Allocated,
    Ready,
}

/// A collector unit.
///
/// Holds one in-flight instruction while its source operands are gathered, either
/// from a register file bank or from a same-step writeback. Conceptually close to a
/// reservation station, except that nothing is computed here.
#[derive(Debug, Default, Clone)]
pub struct CollectorUnit {
    pub state: CuState,
    pub inst: Instruction,
    pub needed_mask: u8,
    pub operand_ready: [bool; NUM_OPERANDS],
    pub operand_data: [LaneData; NUM_OPERANDS],
    pub issue_id: u32,
    /// rewritten to a no-op by a stale branch tag
    pub squashed: bool,
}

impl CollectorUnit {
    pub fn is_idle(&self) -> bool {
        self.state == CuState::Idle
    }

    pub fn is_allocated(&self) -> bool {
        self.state == CuState::Allocated
    }

    pub fn is_ready(&self) -> bool {
        self.state == CuState::Ready
    }

    pub fn warp(&self) -> usize {
        self.inst.warp
    }

    pub fn unit(&self) -> FuClass {
        self.inst.unit()
    }

    pub fn allocate(&mut self, inst: Instruction, issue_id: u32) {
        assert!(self.is_idle(), "allocating a busy collector unit");
        *self = CollectorUnit {
            state: CuState::Allocated,
            inst,
            needed_mask: inst.needed_mask(),
            operand_ready: [false; NUM_OPERANDS],
            operand_data: Default::default(),
            issue_id,
            squashed: false,
        };
    }

    /// Operand `op` is needed by the opcode and has not been collected yet.
    pub fn outstanding(&self, op: usize) -> bool {
        self.is_allocated() && self.needed_mask.bit(op) && !self.operand_ready[op]
    }

    pub fn satisfy(&mut self, op: usize, data: LaneData) {
        debug_assert!(!self.operand_ready[op], "operand {} collected twice", op);
        self.operand_data[op] = data;
        self.operand_ready[op] = true;
    }

    pub fn operands_complete(&self) -> bool {
        (0..NUM_OPERANDS).all(|op| !self.needed_mask.bit(op) || self.operand_ready[op])
    }

    /// Allocated -> Ready once every needed operand is in. Returns whether it fired.
    pub fn promote(&mut self) -> bool {
        if self.is_allocated() && self.operands_complete() {
            self.state = CuState::Ready;
            true
        } else {
            false
        }
    }

    /// Keeps the program-order slot but drops the work: no-op, nothing to collect.
    pub fn squash(&mut self) {
        assert!(!self.is_idle(), "squashing an idle collector unit");
        self.inst = self.inst.to_nop();
        self.needed_mask = 0;
        self.operand_data = Default::default();
        self.state = CuState::Ready;
        self.squashed = true;
    }

    pub fn clear(&mut self) {
        *self = CollectorUnit::default();
    }

    /// Bundle handed to execution on release.
    pub fn issue(&self, cu: usize, stale: bool) -> IssuedInst {
        let squashed = stale || self.squashed;
        let inst = if squashed { self.inst.to_nop() } else { self.inst };
        let rs_data = if squashed {
            Default::default()
        } else {
            self.operand_data.clone()
        };
        IssuedInst {
            inst,
            issue_id: self.issue_id,
            cu,
            rs_data,
            squashed,
        }
    }
}

impl Display for CollectorUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.state {
            CuState::Idle => write!(f, "idle"),
            _ => write!(
                f,
                "{:?} id={} need={:03b} ready={:03b} [{}]",
                self.state,
                self.issue_id,
                self.needed_mask,
                self.operand_ready[..].to_u32(),
                self.inst
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::isa::Opcode;

    #[test]
    fn promotes_only_when_needed_operands_arrive() {
        let mut cu = CollectorUnit::default();
        cu.allocate(Instruction::new(Opcode::ADD, 0, 1, [2, 3, 0]), 0);
        assert_eq!(cu.needed_mask, 0b011);
        assert!(!cu.promote());
        cu.satisfy(0, vec![1]);
        assert!(!cu.promote());
        assert!(!cu.outstanding(2), "rs3 is not read by add");
        cu.satisfy(1, vec![2]);
        assert!(cu.promote());
        assert!(cu.is_ready());
    }

    #[test]
    fn sourceless_ops_are_complete_at_allocation() {
        let mut cu = CollectorUnit::default();
        cu.allocate(Instruction::new(Opcode::BRA, 1, 0, [0, 0, 0]), 3);
        assert!(cu.promote());
    }

    #[test]
    fn squash_turns_unit_into_ready_nop() {
        let mut cu = CollectorUnit::default();
        cu.allocate(Instruction::new(Opcode::FFMA, 2, 5, [1, 2, 3]), 7);
        cu.satisfy(0, vec![4]);
        cu.squash();
        assert!(cu.is_ready());
        assert_eq!(cu.needed_mask, 0);
        assert_eq!(cu.inst.opcode, Opcode::NOP);
        assert_eq!(cu.issue_id, 7);
        assert!(cu.operand_ready[0], "ready bits are never cleared in place");
        let issued = cu.issue(4, false);
        assert!(issued.squashed);
        assert_eq!(issued.issue_id, 7);
    }
}
