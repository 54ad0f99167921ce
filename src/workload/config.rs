use std::path::PathBuf;
use anyhow::bail;
use serde::Deserialize;
use crate::collector::isa::FuClass;
use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkloadConfig {
    pub seed: u64,
    pub insts_per_warp: usize,
    /// JSON program file; replaces the synthetic generator when set
    pub file: Option<PathBuf>,
    pub mix: ClassMix,
    /// probability that a source operand reuses a recent destination
    pub dep_rate: f64,
    /// probability that a conditional branch is mispredicted
    pub mispredict_rate: f64,
    /// wrong-path instructions fetched behind a mispredicted branch
    pub wrong_path_len: usize,
}

impl Config for WorkloadConfig {}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            insts_per_warp: 256,
            file: None,
            mix: ClassMix::default(),
            dep_rate: 0.4,
            mispredict_rate: 0.1,
            wrong_path_len: 4,
        }
    }
}

/// Relative weight of each functional-unit class in generated programs.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ClassMix {
    pub alu: u32,
    pub fpu: u32,
    pub sfu: u32,
    pub lsu: u32,
    pub ctrl: u32,
    pub tex: u32,
}

impl Default for ClassMix {
    fn default() -> Self {
        Self {
            alu: 6,
            fpu: 3,
            sfu: 1,
            lsu: 2,
            ctrl: 1,
            tex: 1,
        }
    }
}

impl ClassMix {
    pub fn weight(&self, class: FuClass) -> u32 {
        match class {
            FuClass::Alu => self.alu,
            FuClass::Fpu => self.fpu,
            FuClass::Sfu => self.sfu,
            FuClass::Lsu => self.lsu,
            FuClass::Ctrl => self.ctrl,
            FuClass::Tex => self.tex,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if FuClass::all().all(|c| self.mix.weight(c) == 0) {
            bail!("workload class mix has no positive weight");
        }
        for (name, rate) in [("dep_rate", self.dep_rate), ("mispredict_rate", self.mispredict_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                bail!("{} must be within [0, 1], got {}", name, rate);
            }
        }
        Ok(())
    }
}
