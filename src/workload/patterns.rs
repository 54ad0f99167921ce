use std::collections::VecDeque;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::collector::inst::Instruction;
use crate::collector::isa::{self, FuClass, Opcode};
use crate::workload::config::WorkloadConfig;
use crate::workload::{Program, ProgramInst};

const ALU_OPS: &[u8] = &[Opcode::ADD, Opcode::SUB, Opcode::MUL, Opcode::MOV, Opcode::IMAD, Opcode::SHL, Opcode::SELP];
const FPU_OPS: &[u8] = &[Opcode::FADD, Opcode::FMUL, Opcode::FFMA, Opcode::ITOF];
const SFU_OPS: &[u8] = &[Opcode::SIN, Opcode::COS, Opcode::RCP, Opcode::SQRT];
const LSU_OPS: &[u8] = &[Opcode::LDR, Opcode::STR, Opcode::LDS];
const CTRL_OPS: &[u8] = &[Opcode::BEQ, Opcode::BNE, Opcode::BRA, Opcode::BAR];
const TEX_OPS: &[u8] = &[Opcode::TEX, Opcode::TXL];

/// Opcodes drawn for each unit class.
pub fn ops_of(class: FuClass) -> &'static [u8] {
    match class {
        FuClass::Alu => ALU_OPS,
        FuClass::Fpu => FPU_OPS,
        FuClass::Sfu => SFU_OPS,
        FuClass::Lsu => LSU_OPS,
        FuClass::Ctrl => CTRL_OPS,
        FuClass::Tex => TEX_OPS,
    }
}

/// how many recent destinations a dependent source may pick from
const RECENT_DESTS: usize = 4;

/// Seeded synthetic instruction streams.
#[derive(Debug)]
pub struct ProgramGenerator {
    rng: StdRng,
    classes: WeightedIndex<u32>,
    dep_rate: f64,
    mispredict_rate: f64,
    num_regs: usize,
}

impl ProgramGenerator {
    pub fn new(conf: &WorkloadConfig, num_regs: usize, seed: u64) -> anyhow::Result<Self> {
        let weights: Vec<u32> = FuClass::all().map(|c| conf.mix.weight(c)).collect();
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            classes: WeightedIndex::new(weights)?,
            dep_rate: conf.dep_rate,
            mispredict_rate: conf.mispredict_rate,
            num_regs,
        })
    }

    fn reg(&mut self) -> u8 {
        // r0 is left alone as a conventional zero/argument register
        self.rng.gen_range(1..self.num_regs) as u8
    }

    fn source(&mut self, recent: &VecDeque<u8>) -> u8 {
        if !recent.is_empty() && self.rng.gen_bool(self.dep_rate) {
            recent[self.rng.gen_range(0..recent.len())]
        } else {
            self.reg()
        }
    }

    fn pick(&mut self, ops: &[u8]) -> u8 {
        ops[self.rng.gen_range(0..ops.len())]
    }

    pub fn program(&mut self, warp: usize, len: usize) -> Program {
        let mut recent = VecDeque::with_capacity(RECENT_DESTS);
        let mut program = Vec::with_capacity(len);
        for idx in 0..len {
            let pc = (idx * 8) as u32;
            if idx + 1 == len {
                program.push(ProgramInst {
                    inst: Instruction::new(Opcode::EXIT, warp, 0, [0; 3]).with_pc(pc),
                    mispredict: false,
                });
                break;
            }
            let class = FuClass::from_index(self.classes.sample(&mut self.rng)).unwrap_or(FuClass::Alu);
            let opcode = self.pick(ops_of(class));
            let rd = self.reg();
            let rs = [self.source(&recent), self.source(&recent), self.source(&recent)];
            let mut inst = Instruction::new(opcode, warp, rd, rs).with_pc(pc);
            inst.imm = self.rng.gen_range(-64..64);
            let mispredict = isa::is_cond_branch(opcode) && self.rng.gen_bool(self.mispredict_rate);
            if inst.writes_rd() {
                if recent.len() == RECENT_DESTS {
                    recent.pop_front();
                }
                recent.push_back(rd);
            }
            program.push(ProgramInst { inst, mispredict });
        }
        program
    }

    /// Instructions fetched down the wrong side of a branch at `branch_pc`.
    pub fn wrong_path(&mut self, warp: usize, branch_pc: u32, len: usize) -> VecDeque<Instruction> {
        (0..len)
            .map(|k| {
                let ops = if self.rng.gen_bool(0.5) { ALU_OPS } else { FPU_OPS };
                let opcode = self.pick(ops);
                let rs = [self.reg(), self.reg(), self.reg()];
                Instruction::new(opcode, warp, self.reg(), rs).with_pc(branch_pc + 8 * (k as u32 + 1))
            })
            .collect()
    }
}

pub fn generate(conf: &WorkloadConfig, num_warps: usize, num_regs: usize) -> anyhow::Result<Vec<Program>> {
    let mut gen = ProgramGenerator::new(conf, num_regs, conf.seed)?;
    Ok((0..num_warps).map(|warp| gen.program(warp, conf.insts_per_warp)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::config::ClassMix;

    #[test]
    fn same_seed_same_programs() {
        let conf = WorkloadConfig { insts_per_warp: 32, ..WorkloadConfig::default() };
        let a = generate(&conf, 2, 64).unwrap();
        let b = generate(&conf, 2, 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[1].len(), 32);
        assert_eq!(a[1].last().map(|p| p.inst.opcode), Some(Opcode::EXIT));
        assert!(a[1].iter().all(|p| p.inst.warp == 1));
    }

    #[test]
    fn mix_restricts_classes_and_registers() {
        let conf = WorkloadConfig {
            insts_per_warp: 200,
            mix: ClassMix { alu: 0, fpu: 1, sfu: 0, lsu: 0, ctrl: 0, tex: 0 },
            ..WorkloadConfig::default()
        };
        let programs = generate(&conf, 1, 16).unwrap();
        for p in &programs[0][..199] {
            assert_eq!(p.inst.unit(), FuClass::Fpu);
            assert!(p.inst.rd < 16 && p.inst.rs.iter().all(|&r| r < 16));
            assert!(!p.mispredict);
        }
    }

    #[test]
    fn only_conditional_branches_mispredict() {
        let conf = WorkloadConfig {
            insts_per_warp: 500,
            mispredict_rate: 1.0,
            mix: ClassMix { alu: 1, fpu: 0, sfu: 0, lsu: 0, ctrl: 1, tex: 0 },
            ..WorkloadConfig::default()
        };
        let programs = generate(&conf, 1, 64).unwrap();
        assert!(programs[0].iter().any(|p| p.mispredict));
        assert!(programs[0].iter().all(|p| p.mispredict == isa::is_cond_branch(p.inst.opcode)));
    }

    #[test]
    fn wrong_path_follows_the_branch() {
        let mut gen = ProgramGenerator::new(&WorkloadConfig::default(), 64, 1).unwrap();
        let insts = gen.wrong_path(3, 0x40, 3);
        assert_eq!(insts.iter().map(|i| i.pc).collect::<Vec<_>>(), vec![0x48, 0x50, 0x58]);
        assert!(insts.iter().all(|i| i.warp == 3));
    }
}
