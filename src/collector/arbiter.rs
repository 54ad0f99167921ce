use crate::collector::config::{NUM_BANKS, NUM_OPERANDS};
use crate::collector::regfile::bank_of;
use crate::collector::unit::CollectorUnit;
use crate::utils::BitSlice;

/// One bank read granted to a collector unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankGrant {
    pub cu: usize,
    /// operand slot, 0..3 for rs1..rs3
    pub op: usize,
    pub reg: u8,
}

/// Per-bank round-robin arbiters. Each bank keeps its own rotating start index
/// over the collector pool.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BankArbiters {
    pub rr: [usize; NUM_BANKS],
}

/// First operand of `cu` waiting on `bank`, rs1 before rs2 before rs3.
/// `skip` masks operands already satisfied by forwarding this step.
fn pending_in_bank(cu: &CollectorUnit, bank: usize, skip: u8) -> Option<usize> {
    (0..NUM_OPERANDS).find(|&op| {
        cu.outstanding(op) && !skip.bit(op) && bank_of(cu.inst.rs[op]) == bank
    })
}

impl BankArbiters {
    /// Selects at most one read per bank. `forwarded[i]` holds the operands of unit
    /// `i` that forwarding already covers this step; they are not requested.
    /// Also returns, per bank, how many units wanted it.
    pub fn arbitrate(
        &self,
        units: &[CollectorUnit],
        forwarded: &[u8],
    ) -> ([Option<BankGrant>; NUM_BANKS], [usize; NUM_BANKS]) {
        let n = units.len();
        let mut grants = [None; NUM_BANKS];
        let mut waiting = [0usize; NUM_BANKS];
        for bank in 0..NUM_BANKS {
            for offset in 0..n {
                let idx = (self.rr[bank] + offset) % n;
                let skip = forwarded.get(idx).copied().unwrap_or(0);
                if let Some(op) = pending_in_bank(&units[idx], bank, skip) {
                    waiting[bank] += 1;
                    if grants[bank].is_none() {
                        grants[bank] = Some(BankGrant { cu: idx, op, reg: units[idx].inst.rs[op] });
                    }
                }
            }
        }
        (grants, waiting)
    }

    /// Moves the bank's pointer one past the unit it just served.
    pub fn advance(&mut self, bank: usize, served: usize, n: usize) {
        self.rr[bank] = (served + 1) % n;
    }
}
