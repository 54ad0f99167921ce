use std::fmt::{Display, Formatter};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use phf::phf_map;

#[derive(Debug, Clone)]
pub struct Opcode;
impl Opcode {
    pub const NOP: u8 = 0x00;
    pub const ADD: u8 = 0x01;
    pub const SUB: u8 = 0x02;
    pub const MUL: u8 = 0x03;
    pub const SLT: u8 = 0x04;
    pub const IMAD: u8 = 0x05;
    pub const NEG: u8 = 0x06;
    pub const MOV: u8 = 0x07;
    pub const LDR: u8 = 0x10;
    pub const STR: u8 = 0x11;
    pub const LDS: u8 = 0x12;
    pub const STS: u8 = 0x13;
    pub const BEQ: u8 = 0x20;
    pub const BNE: u8 = 0x21;
    pub const BRA: u8 = 0x22;
    pub const SSY: u8 = 0x23;
    pub const JOIN: u8 = 0x24;
    pub const BAR: u8 = 0x25;
    pub const TID: u8 = 0x26;
    pub const CALL: u8 = 0x27;
    pub const RET: u8 = 0x28;
    pub const FADD: u8 = 0x30;
    pub const FSUB: u8 = 0x31;
    pub const FMUL: u8 = 0x32;
    pub const FDIV: u8 = 0x33;
    pub const FTOI: u8 = 0x34;
    pub const FFMA: u8 = 0x35;
    pub const IDIV: u8 = 0x36;
    pub const IREM: u8 = 0x37;
    pub const IABS: u8 = 0x38;
    pub const IMIN: u8 = 0x39;
    pub const IMAX: u8 = 0x3A;
    pub const FMIN: u8 = 0x3B;
    pub const FMAX: u8 = 0x3C;
    pub const FABS: u8 = 0x3D;
    pub const ITOF: u8 = 0x3E;
    pub const SIN: u8 = 0x40;
    pub const COS: u8 = 0x41;
    pub const EX2: u8 = 0x42;
    pub const LG2: u8 = 0x43;
    pub const RCP: u8 = 0x44;
    pub const RSQ: u8 = 0x45;
    pub const SQRT: u8 = 0x46;
    pub const TANH: u8 = 0x47;
    pub const AND: u8 = 0x50;
    pub const OR: u8 = 0x51;
    pub const XOR: u8 = 0x52;
    pub const NOT: u8 = 0x53;
    pub const FNEG: u8 = 0x54;
    pub const SHL: u8 = 0x60;
    pub const SHR: u8 = 0x61;
    pub const SHA: u8 = 0x62;
    pub const POPC: u8 = 0x68;
    pub const CLZ: u8 = 0x69;
    pub const BREV: u8 = 0x6A;
    pub const CNOT: u8 = 0x6B;
    pub const SLE: u8 = 0x70;
    pub const SEQ: u8 = 0x71;
    pub const FSLT: u8 = 0x72;
    pub const FSLE: u8 = 0x73;
    pub const FSEQ: u8 = 0x74;
    pub const ISETP: u8 = 0x80;
    pub const FSETP: u8 = 0x81;
    pub const SELP: u8 = 0x82;
    pub const TEX: u8 = 0x90;
    pub const TXL: u8 = 0x91;
    pub const TXB: u8 = 0x92;
    pub const EXIT: u8 = 0xFF;
}

/// Execution backend an instruction is handed to on release.
#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuClass {
    Alu = 0,
    Fpu = 1,
    Sfu = 2,
    Lsu = 3,
    Ctrl = 4,
    Tex = 5,
}

impl FuClass {
    pub const COUNT: usize = 6;

    pub fn from_index(idx: usize) -> Option<FuClass> {
        FuClass::from_usize(idx)
    }

    pub fn all() -> impl Iterator<Item = FuClass> {
        (0..Self::COUNT).filter_map(FuClass::from_index)
    }
}

impl Display for FuClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FuClass::Alu => "alu",
            FuClass::Fpu => "fpu",
            FuClass::Sfu => "sfu",
            FuClass::Lsu => "lsu",
            FuClass::Ctrl => "ctrl",
            FuClass::Tex => "tex",
        };
        write!(f, "{}", name)
    }
}

pub const NEED_NONE: u8 = 0b000;
pub const NEED_RS1: u8 = 0b001;
pub const NEED_RS1_RS2: u8 = 0b011;
pub const NEED_ALL: u8 = 0b111;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub name: &'static str,
    /// bit i set: source operand i (rs1, rs2, rs3) must be collected
    pub needs: u8,
    pub unit: FuClass,
    pub writes_rd: bool,
}

const fn op(name: &'static str, needs: u8, unit: FuClass, writes_rd: bool) -> OpInfo {
    OpInfo { name, needs, unit, writes_rd }
}

/// Opcodes missing from the table decode as a plain two-source ALU op.
pub const DEFAULT_OP: OpInfo = op("alu", NEED_RS1_RS2, FuClass::Alu, true);

static OP_TABLE: phf::Map<u8, OpInfo> = phf_map! {
    // control, no sources
    0x00u8 => op("nop",  NEED_NONE, FuClass::Ctrl, false),
    0xFFu8 => op("exit", NEED_NONE, FuClass::Ctrl, false),
    0x22u8 => op("bra",  NEED_NONE, FuClass::Ctrl, false),
    0x23u8 => op("ssy",  NEED_NONE, FuClass::Ctrl, false),
    0x24u8 => op("join", NEED_NONE, FuClass::Ctrl, false),
    0x25u8 => op("bar",  NEED_NONE, FuClass::Ctrl, false),
    0x26u8 => op("tid",  NEED_NONE, FuClass::Ctrl, true),
    0x27u8 => op("call", NEED_NONE, FuClass::Ctrl, false),
    0x28u8 => op("ret",  NEED_NONE, FuClass::Ctrl, false),
    // unary
    0x07u8 => op("mov",  NEED_RS1, FuClass::Alu, true),
    0x06u8 => op("neg",  NEED_RS1, FuClass::Alu, true),
    0x38u8 => op("iabs", NEED_RS1, FuClass::Alu, true),
    0x53u8 => op("not",  NEED_RS1, FuClass::Alu, true),
    0x68u8 => op("popc", NEED_RS1, FuClass::Alu, true),
    0x69u8 => op("clz",  NEED_RS1, FuClass::Alu, true),
    0x6Au8 => op("brev", NEED_RS1, FuClass::Alu, true),
    0x6Bu8 => op("cnot", NEED_RS1, FuClass::Alu, true),
    0x34u8 => op("ftoi", NEED_RS1, FuClass::Fpu, true),
    0x3Eu8 => op("itof", NEED_RS1, FuClass::Fpu, true),
    0x3Du8 => op("fabs", NEED_RS1, FuClass::Fpu, true),
    0x54u8 => op("fneg", NEED_RS1, FuClass::Fpu, true),
    0x10u8 => op("ldr",  NEED_RS1, FuClass::Lsu, true),
    0x12u8 => op("lds",  NEED_RS1, FuClass::Lsu, true),
    0x40u8 => op("sin",  NEED_RS1, FuClass::Sfu, true),
    0x41u8 => op("cos",  NEED_RS1, FuClass::Sfu, true),
    0x42u8 => op("ex2",  NEED_RS1, FuClass::Sfu, true),
    0x43u8 => op("lg2",  NEED_RS1, FuClass::Sfu, true),
    0x44u8 => op("rcp",  NEED_RS1, FuClass::Sfu, true),
    0x45u8 => op("rsq",  NEED_RS1, FuClass::Sfu, true),
    0x46u8 => op("sqrt", NEED_RS1, FuClass::Sfu, true),
    0x47u8 => op("tanh", NEED_RS1, FuClass::Sfu, true),
    // binary
    0x01u8 => op("add",  NEED_RS1_RS2, FuClass::Alu, true),
    0x02u8 => op("sub",  NEED_RS1_RS2, FuClass::Alu, true),
    0x03u8 => op("mul",  NEED_RS1_RS2, FuClass::Alu, true),
    0x36u8 => op("idiv", NEED_RS1_RS2, FuClass::Alu, true),
    0x37u8 => op("irem", NEED_RS1_RS2, FuClass::Alu, true),
    0x39u8 => op("imin", NEED_RS1_RS2, FuClass::Alu, true),
    0x3Au8 => op("imax", NEED_RS1_RS2, FuClass::Alu, true),
    0x04u8 => op("slt",  NEED_RS1_RS2, FuClass::Alu, true),
    0x70u8 => op("sle",  NEED_RS1_RS2, FuClass::Alu, true),
    0x71u8 => op("seq",  NEED_RS1_RS2, FuClass::Alu, true),
    0x50u8 => op("and",  NEED_RS1_RS2, FuClass::Alu, true),
    0x51u8 => op("or",   NEED_RS1_RS2, FuClass::Alu, true),
    0x52u8 => op("xor",  NEED_RS1_RS2, FuClass::Alu, true),
    0x60u8 => op("shl",  NEED_RS1_RS2, FuClass::Alu, true),
    0x61u8 => op("shr",  NEED_RS1_RS2, FuClass::Alu, true),
    0x62u8 => op("sha",  NEED_RS1_RS2, FuClass::Alu, true),
    0x80u8 => op("isetp", NEED_RS1_RS2, FuClass::Alu, true),
    0x30u8 => op("fadd", NEED_RS1_RS2, FuClass::Fpu, true),
    0x31u8 => op("fsub", NEED_RS1_RS2, FuClass::Fpu, true),
    0x32u8 => op("fmul", NEED_RS1_RS2, FuClass::Fpu, true),
    0x33u8 => op("fdiv", NEED_RS1_RS2, FuClass::Fpu, true),
    0x3Bu8 => op("fmin", NEED_RS1_RS2, FuClass::Fpu, true),
    0x3Cu8 => op("fmax", NEED_RS1_RS2, FuClass::Fpu, true),
    0x72u8 => op("fslt", NEED_RS1_RS2, FuClass::Fpu, true),
    0x73u8 => op("fsle", NEED_RS1_RS2, FuClass::Fpu, true),
    0x74u8 => op("fseq", NEED_RS1_RS2, FuClass::Fpu, true),
    0x81u8 => op("fsetp", NEED_RS1_RS2, FuClass::Fpu, true),
    0x11u8 => op("str",  NEED_RS1_RS2, FuClass::Lsu, false),
    0x13u8 => op("sts",  NEED_RS1_RS2, FuClass::Lsu, false),
    0x20u8 => op("beq",  NEED_RS1_RS2, FuClass::Ctrl, false),
    0x21u8 => op("bne",  NEED_RS1_RS2, FuClass::Ctrl, false),
    0x90u8 => op("tex",  NEED_RS1_RS2, FuClass::Tex, true),
    0x91u8 => op("txl",  NEED_RS1_RS2, FuClass::Tex, true),
    0x92u8 => op("txb",  NEED_RS1_RS2, FuClass::Tex, true),
    // ternary
    0x05u8 => op("imad", NEED_ALL, FuClass::Alu, true),
    0x35u8 => op("ffma", NEED_ALL, FuClass::Fpu, true),
    0x82u8 => op("selp", NEED_ALL, FuClass::Alu, true),
};

pub fn op_info(opcode: u8) -> OpInfo {
    OP_TABLE.get(&opcode).copied().unwrap_or(DEFAULT_OP)
}

/// Which of rs1/rs2/rs3 the opcode reads, as a 3-bit mask.
pub fn needed_mask(opcode: u8) -> u8 {
    op_info(opcode).needs
}

pub fn fu_class(opcode: u8) -> FuClass {
    op_info(opcode).unit
}

pub fn mnemonic(opcode: u8) -> &'static str {
    OP_TABLE.get(&opcode).map(|info| info.name).unwrap_or("???")
}

pub fn is_known(opcode: u8) -> bool {
    OP_TABLE.contains_key(&opcode)
}

/// Opcodes that end in a taken/not-taken decision.
pub fn is_cond_branch(opcode: u8) -> bool {
    matches!(opcode, Opcode::BEQ | Opcode::BNE)
}
