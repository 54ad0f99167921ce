pub mod config;
pub mod patterns;

use std::fs;
use std::path::Path;
use anyhow::{bail, Context};
use serde::Deserialize;
use crate::collector::config::CollectorConfig;
use crate::collector::inst::Instruction;
use crate::collector::isa;
use crate::workload::config::WorkloadConfig;

/// One instruction of a warp's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramInst {
    pub inst: Instruction,
    /// the front end predicts this conditional branch wrong
    pub mispredict: bool,
}

pub type Program = Vec<ProgramInst>;

/// Program file layout: encoded 64-bit words per warp, instruction `i` at pc `8 * i`.
///
/// ```json
/// { "warps": [[<word>, <word>, ...], ...], "mispredicted": [{ "warp": 0, "pc": 16 }] }
/// ```
#[derive(Debug, Deserialize)]
struct ProgramFile {
    warps: Vec<Vec<u64>>,
    #[serde(default)]
    mispredicted: Vec<MispredictSite>,
}

#[derive(Debug, Deserialize)]
struct MispredictSite {
    warp: usize,
    pc: u32,
}

pub fn parse_programs(text: &str, collector: &CollectorConfig) -> anyhow::Result<Vec<Program>> {
    let file: ProgramFile = serde_json::from_str(text).context("malformed program file")?;
    if file.warps.len() > collector.num_warps {
        bail!("program file has {} warps, collector has {}", file.warps.len(), collector.num_warps);
    }

    let mut programs: Vec<Program> = vec![Vec::new(); collector.num_warps];
    for (warp, words) in file.warps.iter().enumerate() {
        for (idx, &word) in words.iter().enumerate() {
            let inst = Instruction::decode(word, warp, (idx * 8) as u32, 0);
            if !isa::is_known(inst.opcode) {
                bail!("w{} pc={:#06x}: unknown opcode {:#04x}", warp, inst.pc, inst.opcode);
            }
            inst.validate(collector).with_context(|| format!("w{} instruction {}", warp, idx))?;
            programs[warp].push(ProgramInst { inst, mispredict: false });
        }
    }

    for site in &file.mispredicted {
        let Some(entry) = programs
            .get_mut(site.warp)
            .and_then(|program| program.iter_mut().find(|p| p.inst.pc == site.pc))
        else {
            bail!("mispredicted site w{} pc={:#06x} is not in the program", site.warp, site.pc);
        };
        if !isa::is_cond_branch(entry.inst.opcode) {
            bail!("mispredicted site w{} pc={:#06x} is not a conditional branch", site.warp, site.pc);
        }
        entry.mispredict = true;
    }
    Ok(programs)
}

pub fn load_programs(path: &Path, collector: &CollectorConfig) -> anyhow::Result<Vec<Program>> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read program file {}", path.display()))?;
    parse_programs(&text, collector).with_context(|| format!("in {}", path.display()))
}

/// Programs for every warp: the configured file, or the seeded generator.
pub fn programs(conf: &WorkloadConfig, collector: &CollectorConfig) -> anyhow::Result<Vec<Program>> {
    match &conf.file {
        Some(path) => load_programs(path, collector),
        None => patterns::generate(conf, collector.num_warps, collector.num_regs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::isa::Opcode;

    fn words(insts: &[Instruction]) -> String {
        insts.iter().map(|i| i.encode().to_string()).collect::<Vec<_>>().join(", ")
    }

    #[test]
    fn parses_words_and_marks_mispredicts() {
        let cfg = CollectorConfig { num_warps: 2, ..CollectorConfig::default() };
        let w0 = [
            Instruction::new(Opcode::ADD, 0, 3, [1, 2, 0]),
            Instruction::new(Opcode::BEQ, 0, 0, [3, 1, 0]),
            Instruction::new(Opcode::EXIT, 0, 0, [0; 3]),
        ];
        let text = format!(r#"{{ "warps": [[{}]], "mispredicted": [{{ "warp": 0, "pc": 8 }}] }}"#, words(&w0));
        let programs = parse_programs(&text, &cfg).unwrap();
        assert_eq!(programs.len(), 2);
        assert!(programs[1].is_empty());
        assert_eq!(programs[0].iter().map(|p| p.inst.pc).collect::<Vec<_>>(), vec![0, 8, 16]);
        assert_eq!(programs[0].iter().map(|p| p.mispredict).collect::<Vec<_>>(), vec![false, true, false]);
        assert_eq!(programs[0][0].inst.rs, [1, 2, 0]);
    }

    #[test]
    fn rejects_bad_programs() {
        let cfg = CollectorConfig { num_warps: 1, num_regs: 16, ..CollectorConfig::default() };
        let out_of_range = Instruction::new(Opcode::ADD, 0, 3, [1, 40, 0]);
        let text = format!(r#"{{ "warps": [[{}]] }}"#, words(&[out_of_range]));
        assert!(parse_programs(&text, &cfg).is_err());

        let add = Instruction::new(Opcode::ADD, 0, 3, [1, 2, 0]);
        let text = format!(r#"{{ "warps": [[{}]], "mispredicted": [{{ "warp": 0, "pc": 0 }}] }}"#, words(&[add]));
        assert!(parse_programs(&text, &cfg).is_err());

        let text = format!(r#"{{ "warps": [[{}], [{}]] }}"#, words(&[add]), words(&[add]));
        assert!(parse_programs(&text, &cfg).is_err());
        assert!(parse_programs("{ \"warps\": ", &cfg).is_err());
    }
}
