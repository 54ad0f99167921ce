use std::sync::Arc;
use log::debug;
use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::collector::config::{CollectorConfig, NUM_BANKS};
use crate::collector::inst::{LaneData, Writeback};

pub fn bank_of(reg: u8) -> usize {
    reg as usize % NUM_BANKS
}

pub fn slot_of(reg: u8) -> usize {
    reg as usize / NUM_BANKS
}

/// One bank, laid out as `value[lane][warp][slot]`.
#[derive(Debug, Default, Clone)]
pub struct Bank {
    values: Vec<u32>,
    /// a collection read was already answered this step
    busy: bool,
}

#[derive(Debug, Default)]
pub struct RegFileState {
    banks: Vec<Bank>,
    reads: u64,
    writes: u64,
}

/// Register file shared by all collector units, split into [`NUM_BANKS`] banks.
///
/// Each bank answers at most one collection read per step; the limit resets on
/// `tick_one`. Writes are never arbitrated.
#[derive(Debug, Default)]
pub struct BankedRegFile {
    base: ModuleBase<RegFileState, CollectorConfig>,
}

module!(BankedRegFile, RegFileState, CollectorConfig,);

impl ModuleBehaviors for BankedRegFile {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
        self.base.state.banks.iter_mut().for_each(|b| b.busy = false);
    }

    fn reset(&mut self) {
        for bank in &mut self.base.state.banks {
            bank.values.fill(0);
            bank.busy = false;
        }
        self.base.state.reads = 0;
        self.base.state.writes = 0;
    }
}

impl BankedRegFile {
    pub fn new(config: Arc<CollectorConfig>) -> Self {
        let bank_size = config.num_lanes * config.num_warps * config.slots_per_bank();
        let mut me = BankedRegFile {
            base: ModuleBase {
                state: RegFileState {
                    banks: vec![Bank { values: vec![0; bank_size], busy: false }; NUM_BANKS],
                    reads: 0,
                    writes: 0,
                },
                ..ModuleBase::default()
            },
        };
        me.init_conf(config);
        me
    }

    fn index(&self, lane: usize, warp: usize, slot: usize) -> usize {
        let conf = self.conf();
        assert!(
            lane < conf.num_lanes && warp < conf.num_warps && slot < conf.slots_per_bank(),
            "regfile access lane {} w{} slot {} out of range",
            lane, warp, slot
        );
        (lane * conf.num_warps + warp) * conf.slots_per_bank() + slot
    }

    fn gather(&self, bank: usize, warp: usize, slot: usize) -> LaneData {
        (0..self.conf().num_lanes)
            .map(|lane| self.base.state.banks[bank].values[self.index(lane, warp, slot)])
            .collect()
    }

    pub fn bank_busy(&self, bank: usize) -> bool {
        self.base.state.banks[bank].busy
    }

    /// Arbitrated collection read. Returns `None` if `bank` already served a read this step.
    pub fn read(&mut self, bank: usize, warp: usize, slot: usize) -> Option<LaneData> {
        assert!(bank < NUM_BANKS, "bank {} out of range", bank);
        if self.base.state.banks[bank].busy {
            return None;
        }
        let data = self.gather(bank, warp, slot);
        let state = &mut self.base.state;
        state.banks[bank].busy = true;
        state.reads += 1;
        debug!("regfile: bank {} read w{} slot {}", bank, warp, slot);
        Some(data)
    }

    /// Current value of a register, outside of bank arbitration.
    pub fn peek(&self, warp: usize, reg: u8) -> LaneData {
        self.gather(bank_of(reg), warp, slot_of(reg))
    }

    /// Masked write; always accepted.
    pub fn write(&mut self, wb: &Writeback) {
        let num_lanes = self.conf().num_lanes;
        assert!(
            wb.warp < self.conf().num_warps && (wb.rd as usize) < self.conf().num_regs,
            "writeback to w{} r{} out of range",
            wb.warp, wb.rd
        );
        assert!(wb.data.len() >= num_lanes, "writeback carries {} lanes, need {}", wb.data.len(), num_lanes);
        let (bank, slot) = (bank_of(wb.rd), slot_of(wb.rd));
        for lane in (0..num_lanes).filter(|&l| (wb.mask >> l) & 1 == 1) {
            let idx = self.index(lane, wb.warp, slot);
            self.base.state.banks[bank].values[idx] = wb.data[lane];
        }
        self.base.state.writes += 1;
    }

    /// Unconditional full-warp initialization, e.g. for kernel arguments.
    pub fn fill(&mut self, warp: usize, reg: u8, data: &[u32]) {
        let num_lanes = self.conf().num_lanes;
        self.write(&Writeback::new(warp, reg, crate::utils::low_mask(num_lanes), data.to_vec()));
    }

    pub fn num_reads(&self) -> u64 {
        self.base.state.reads
    }

    pub fn num_writes(&self) -> u64 {
        self.base.state.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_rf() -> BankedRegFile {
        BankedRegFile::new(Arc::new(CollectorConfig {
            num_lanes: 4,
            num_warps: 2,
            num_regs: 16,
            ..CollectorConfig::default()
        }))
    }

    #[test]
    fn register_addressing() {
        assert_eq!((bank_of(0), slot_of(0)), (0, 0));
        assert_eq!((bank_of(5), slot_of(5)), (1, 1));
        assert_eq!((bank_of(15), slot_of(15)), (3, 3));
    }

    #[test]
    fn one_read_per_bank_per_step() {
        let mut rf = small_rf();
        rf.fill(1, 6, &[1, 2, 3, 4]);
        assert_eq!(rf.read(bank_of(6), 1, slot_of(6)), Some(vec![1, 2, 3, 4]));
        assert_eq!(rf.read(bank_of(6), 0, slot_of(6)), None);
        assert!(rf.bank_busy(bank_of(6)));
        // other banks are independent
        assert!(rf.read(bank_of(7), 0, slot_of(7)).is_some());
        rf.tick_one();
        assert!(!rf.bank_busy(bank_of(6)));
        assert!(rf.read(bank_of(6), 0, slot_of(6)).is_some());
    }

    #[test]
    fn masked_write_keeps_inactive_lanes() {
        let mut rf = small_rf();
        rf.fill(0, 3, &[9, 9, 9, 9]);
        rf.write(&Writeback::new(0, 3, 0b1010, vec![1, 2, 3, 4]));
        assert_eq!(rf.peek(0, 3), vec![9, 2, 9, 4]);
        // other warps untouched
        assert_eq!(rf.peek(1, 3), vec![0, 0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn write_past_last_register_panics() {
        let mut rf = small_rf();
        rf.write(&Writeback::new(0, 16, 0b1111, vec![5; 4]));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn read_of_unknown_warp_panics() {
        let mut rf = small_rf();
        rf.read(bank_of(0), 2, slot_of(0));
    }
}
