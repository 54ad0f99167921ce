use std::sync::Arc;
use crate::collector::*;

pub fn small_config() -> CollectorConfig {
    CollectorConfig {
        num_collectors: 4,
        num_warps: 2,
        num_lanes: 4,
        num_regs: 16,
        counter_width: 8,
        dual_release: false,
    }
}

/// Collector plus register file, with inputs that persist until changed.
/// Dispatch, writeback and flush are one-step pulses and are cleared after each step.
pub struct Bench {
    pub oc: OperandCollector,
    pub rf: BankedRegFile,
    pub io: CollectorInputs,
}

impl Bench {
    pub fn new(conf: CollectorConfig) -> Self {
        let conf = Arc::new(conf);
        Bench {
            oc: OperandCollector::new(Arc::clone(&conf)),
            rf: BankedRegFile::new(Arc::clone(&conf)),
            io: CollectorInputs::idle(conf.num_warps),
        }
    }

    pub fn step(&mut self) -> CollectorOutputs {
        let out = self.oc.step(&mut self.rf, &self.io);
        self.io.dispatch = [None, None];
        self.io.writebacks = [None, None];
        self.io.flush = None;
        out
    }

    pub fn dispatch(&mut self, a: Option<Instruction>, b: Option<Instruction>) -> CollectorOutputs {
        self.io.dispatch = [a, b];
        self.step()
    }

    pub fn unit(&self, idx: usize) -> &CollectorUnit {
        &self.oc.units()[idx]
    }

    pub fn lanes(&self, value: u32) -> LaneData {
        vec![value; self.oc.conf().num_lanes]
    }

    pub fn fill(&mut self, warp: usize, reg: u8, value: u32) {
        let data = self.lanes(value);
        self.rf.fill(warp, reg, &data);
    }

    pub fn writeback(&self, warp: usize, reg: u8, value: u32) -> Option<Writeback> {
        Some(Writeback::new(warp, reg, crate::utils::low_mask(self.oc.conf().num_lanes), self.lanes(value)))
    }
}

pub fn inst(opcode: u8, warp: usize, rd: u8, rs: [u8; 3]) -> Option<Instruction> {
    Some(Instruction::new(opcode, warp, rd, rs))
}
