use std::fmt::{Display, Formatter};
use anyhow::bail;
use crate::collector::config::{CollectorConfig, NUM_OPERANDS};
use crate::collector::isa::{self, FuClass, Opcode};
use crate::utils::{BitField, BitSlice};

/// One value per SIMT lane.
pub type LaneData = Vec<u32>;

pub fn sign_ext<const W: u8>(from: u32) -> i32 {
    assert!(
        W <= 32,
        "cannot extend a two's complement number that is more than 32 bits"
    );
    ((from << (32 - W)) as i32) >> (32 - W)
}

/// Dispatched instruction descriptor, as produced by the front end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u8,
    pub warp: usize,
    pub rd: u8,
    /// rs1, rs2, rs3
    pub rs: [u8; NUM_OPERANDS],
    pub pred: u8,
    pub imm: i32,
    pub pc: u32,
    /// speculative branch tag of the warp at fetch time
    pub tag: u32,
}

impl Instruction {
    pub fn new(opcode: u8, warp: usize, rd: u8, rs: [u8; NUM_OPERANDS]) -> Self {
        Self {
            opcode,
            warp,
            rd,
            rs,
            pred: 0x7,
            ..Self::default()
        }
    }

    pub fn with_pc(self, pc: u32) -> Self {
        Self { pc, ..self }
    }

    pub fn with_tag(self, tag: u32) -> Self {
        Self { tag, ..self }
    }

    /// Decodes a 64-bit machine word:
    /// `{op[63:56], rd[55:48], rs1[47:40], rs2[39:32], pg[31:28], rs3[27:20], imm[19:0]}`.
    pub fn decode(word: u64, warp: usize, pc: u32, tag: u32) -> Self {
        Self {
            opcode: word.sel(63, 56) as u8,
            warp,
            rd: word.sel(55, 48) as u8,
            rs: [
                word.sel(47, 40) as u8,
                word.sel(39, 32) as u8,
                word.sel(27, 20) as u8,
            ],
            pred: word.sel(31, 28) as u8,
            imm: sign_ext::<20>(word.sel(19, 0) as u32),
            pc,
            tag,
        }
    }

    pub fn encode(&self) -> u64 {
        ((self.opcode as u64) << 56)
            | ((self.rd as u64) << 48)
            | ((self.rs[0] as u64) << 40)
            | ((self.rs[1] as u64) << 32)
            | (((self.pred & 0xF) as u64) << 28)
            | ((self.rs[2] as u64) << 20)
            | ((self.imm as u32 & 0xF_FFFF) as u64)
    }

    /// A descriptor the collector may be handed: known warp and registers in range.
    pub fn validate(&self, config: &CollectorConfig) -> anyhow::Result<()> {
        if self.warp >= config.num_warps {
            bail!("{}: warp {} out of range (num_warps={})", self, self.warp, config.num_warps);
        }
        let needs = self.needed_mask();
        for (i, &reg) in self.rs.iter().enumerate() {
            if needs.bit(i) && reg as usize >= config.num_regs {
                bail!("{}: rs{} = r{} out of range (num_regs={})", self, i + 1, reg, config.num_regs);
            }
        }
        if self.writes_rd() && self.rd as usize >= config.num_regs {
            bail!("{}: rd = r{} out of range (num_regs={})", self, self.rd, config.num_regs);
        }
        Ok(())
    }

    pub fn needed_mask(&self) -> u8 {
        isa::needed_mask(self.opcode)
    }

    pub fn unit(&self) -> FuClass {
        isa::fu_class(self.opcode)
    }

    pub fn writes_rd(&self) -> bool {
        isa::op_info(self.opcode).writes_rd
    }

    /// The same slot in program order, stripped down to a no-op.
    pub fn to_nop(&self) -> Self {
        Self {
            opcode: Opcode::NOP,
            warp: self.warp,
            pc: self.pc,
            tag: self.tag,
            ..Self::default()
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "w{} pc={:#06x} {} rd=r{} rs=[r{}, r{}, r{}] tag={}",
            self.warp,
            self.pc,
            isa::mnemonic(self.opcode),
            self.rd,
            self.rs[0],
            self.rs[1],
            self.rs[2],
            self.tag
        )
    }
}

/// Result broadcast from a functional unit; always accepted by the register file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Writeback {
    pub warp: usize,
    pub rd: u8,
    /// lanes to write; unset lanes keep their old register value
    pub mask: u32,
    pub data: LaneData,
}

impl Writeback {
    pub fn new(warp: usize, rd: u8, mask: u32, data: LaneData) -> Self {
        Self { warp, rd, mask, data }
    }

    /// Overlays this writeback's active lanes onto `value`.
    pub fn merge_into(&self, value: &mut LaneData) {
        for (lane, v) in value.iter_mut().enumerate() {
            if lane < 32 && self.mask.bit(lane) {
                *v = self.data[lane];
            }
        }
    }
}

/// Instruction bundle after operand collection, i.e. rs_addr -> rs_data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedInst {
    pub inst: Instruction,
    pub issue_id: u32,
    pub cu: usize,
    /// empty for operands the opcode does not read
    pub rs_data: [LaneData; NUM_OPERANDS],
    /// released as a no-op after its branch tag went stale
    pub squashed: bool,
}

impl IssuedInst {
    pub fn unit(&self) -> FuClass {
        self.inst.unit()
    }
}

impl Display for IssuedInst {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IssuedInst {{ cu: {}, id: {}, {}{} }}",
            self.cu,
            self.issue_id,
            self.inst,
            if self.squashed { " (squashed)" } else { "" }
        )
    }
}
