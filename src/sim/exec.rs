use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use serde::Deserialize;
use smallvec::SmallVec;
use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::collector::config::NUM_PORTS;
use crate::collector::inst::{IssuedInst, LaneData, Writeback};
use crate::collector::isa::{self, FuClass};
use crate::sim::config::Config;
use crate::utils::low_mask;

/// How a resolved misprediction is cleaned out of the collector.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// bump the warp's branch tag and flush its collector units
    #[default]
    Flush,
    /// bump the branch tag only; wrong-path units drain as no-ops
    Tag,
}

impl FromStr for Recovery {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "flush" => Ok(Self::Flush),
            "tag" => Ok(Self::Tag),
            _ => Err(format!("unsupported recovery '{}', expected one of: flush, tag", value)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ExecConfig {
    pub alu_latency: u64,
    pub fpu_latency: u64,
    pub sfu_latency: u64,
    pub lsu_latency: u64,
    pub ctrl_latency: u64,
    pub tex_latency: u64,
    /// conditional branches resolve this many steps after release
    pub branch_latency: u64,
    /// steps a release port stays busy after taking an SFU or texture op
    pub sfu_interval: u64,
    pub recovery: Recovery,
    /// 1: a pending register is released to the front end one step before its
    /// writeback, so the dependent instruction catches it by forwarding
    pub scoreboard_lookahead: u64,
}

impl Config for ExecConfig {}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            alu_latency: 2,
            fpu_latency: 4,
            sfu_latency: 8,
            lsu_latency: 12,
            ctrl_latency: 1,
            tex_latency: 16,
            branch_latency: 3,
            sfu_interval: 4,
            recovery: Recovery::Flush,
            scoreboard_lookahead: 1,
        }
    }
}

impl ExecConfig {
    pub fn latency(&self, opcode: u8) -> u64 {
        if isa::is_cond_branch(opcode) {
            return self.branch_latency.max(1);
        }
        let latency = match isa::fu_class(opcode) {
            FuClass::Alu => self.alu_latency,
            FuClass::Fpu => self.fpu_latency,
            FuClass::Sfu => self.sfu_latency,
            FuClass::Lsu => self.lsu_latency,
            FuClass::Ctrl => self.ctrl_latency,
            FuClass::Tex => self.tex_latency,
        };
        latency.max(1)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scoreboard_lookahead > 1 {
            anyhow::bail!("scoreboard_lookahead must be 0 or 1, got {}", self.scoreboard_lookahead);
        }
        Ok(())
    }
}

/// An instruction finished executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub warp: usize,
    pub pc: u32,
    pub opcode: u8,
    /// acceptance order across all ports
    pub seq: u64,
    /// a mispredicted branch; younger results of the warp are discarded
    pub redirect: bool,
}

#[derive(Debug, Clone)]
struct PendingWriteback {
    wb: Writeback,
    seq: u64,
}

/// What the functional units hand back in one step.
#[derive(Debug, Default)]
pub struct ExecEvents {
    pub writebacks: [Option<Writeback>; NUM_PORTS],
    pub completions: Vec<Completion>,
    /// (warp, rd) the front end may stop waiting on
    pub cleared: Vec<(usize, u8)>,
    /// wrong-path results discarded by a redirect
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct ExecState {
    /// at most [`NUM_PORTS`] writebacks per step
    writebacks: BTreeMap<u64, SmallVec<[PendingWriteback; NUM_PORTS]>>,
    clears: BTreeMap<u64, Vec<(usize, u8)>>,
    completions: BTreeMap<u64, Vec<Completion>>,
    busy_until: [u64; NUM_PORTS],
    in_flight: usize,
    accepted: u64,
    dropped: u64,
}

/// Functional-unit stand-in. Takes released instructions, produces writebacks after
/// a per-class latency and never more than two per step.
#[derive(Debug, Default)]
pub struct ExecUnit {
    base: ModuleBase<ExecState, ExecConfig>,
    num_lanes: usize,
}

module!(ExecUnit, ExecState, ExecConfig,);

impl ModuleBehaviors for ExecUnit {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state = ExecState::default();
    }
}

/// Placeholder arithmetic. Values only need to be deterministic in the operands.
fn compute(issued: &IssuedInst, num_lanes: usize) -> LaneData {
    (0..num_lanes)
        .map(|lane| {
            issued
                .rs_data
                .iter()
                .filter(|data| !data.is_empty())
                .fold(issued.inst.opcode as u32 ^ issued.inst.imm as u32, |acc, data| {
                    acc.wrapping_mul(31).wrapping_add(data[lane])
                })
        })
        .collect()
}

impl ExecUnit {
    pub fn new(config: Arc<ExecConfig>, num_lanes: usize) -> Self {
        let mut me = ExecUnit {
            base: ModuleBase::default(),
            num_lanes,
        };
        me.init_conf(config);
        me
    }

    pub fn now(&self) -> u64 {
        self.base.cycle
    }

    pub fn ready(&self) -> [bool; NUM_PORTS] {
        let now = self.now();
        std::array::from_fn(|port| self.base.state.busy_until[port] <= now)
    }

    pub fn idle(&self) -> bool {
        let state = &self.base.state;
        state.in_flight == 0 && state.writebacks.is_empty() && state.clears.is_empty()
    }

    pub fn accepted(&self) -> u64 {
        self.base.state.accepted
    }

    pub fn dropped(&self) -> u64 {
        self.base.state.dropped
    }

    /// Takes a released instruction on `port`. Squashed no-ops are absorbed.
    /// `redirect` marks a mispredicted branch.
    pub fn accept(&mut self, port: usize, issued: &IssuedInst, redirect: bool) {
        if issued.squashed {
            return;
        }
        let now = self.now();
        let conf = *self.conf();
        let inst = issued.inst;
        let seq = self.base.state.accepted;
        let mut done = now + conf.latency(inst.opcode);

        if matches!(inst.unit(), FuClass::Sfu | FuClass::Tex) {
            self.base.state.busy_until[port] = now + conf.sfu_interval;
        }

        if inst.writes_rd() {
            let data = compute(issued, self.num_lanes);
            let wb = Writeback::new(inst.warp, inst.rd, low_mask(self.num_lanes), data);
            let state = &mut self.base.state;
            while state.writebacks.get(&done).is_some_and(|slot| slot.len() >= NUM_PORTS) {
                done += 1;
            }
            state.writebacks.entry(done).or_default().push(PendingWriteback { wb, seq });
            let clear_at = done.saturating_sub(conf.scoreboard_lookahead).max(now + 1);
            state.clears.entry(clear_at).or_default().push((inst.warp, inst.rd));
        }

        let state = &mut self.base.state;
        state.completions.entry(done).or_default().push(Completion {
            warp: inst.warp,
            pc: inst.pc,
            opcode: inst.opcode,
            seq,
            redirect,
        });
        state.in_flight += 1;
        state.accepted += 1;
    }

    /// Everything due this step. A redirecting branch discards the pending results
    /// of its warp accepted after it, including ones due now; scoreboard clears
    /// are kept.
    pub fn drain(&mut self) -> ExecEvents {
        let now = self.now();
        let state = &mut self.base.state;
        let mut events = ExecEvents::default();

        events.completions = state.completions.remove(&now).unwrap_or_default();
        state.in_flight -= events.completions.len();
        for c in events.completions.iter().filter(|c| c.redirect) {
            events.dropped += state.discard_younger(c.warp, c.seq);
        }
        state.dropped += events.dropped as u64;

        for (port, pending) in state.writebacks.remove(&now).unwrap_or_default().into_iter().enumerate() {
            events.writebacks[port] = Some(pending.wb);
        }
        events.cleared = state.clears.remove(&now).unwrap_or_default();
        events
    }
}

impl ExecState {
    fn discard_younger(&mut self, warp: usize, seq: u64) -> usize {
        let mut dropped = 0;
        for slot in self.writebacks.values_mut() {
            let before = slot.len();
            slot.retain(|p| p.wb.warp != warp || p.seq <= seq);
            dropped += before - slot.len();
        }
        self.writebacks.retain(|_, slot| !slot.is_empty());
        dropped
    }
}
