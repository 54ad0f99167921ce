use std::collections::VecDeque;
use std::sync::Arc;
use anyhow::{bail, ensure};
use log::debug;
use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::collector::config::NUM_PORTS;
use crate::collector::inst::{Instruction, IssuedInst};
use crate::sim::exec::{Completion, Recovery};
use crate::utils::BitSlice;
use crate::workload::config::WorkloadConfig;
use crate::workload::patterns::ProgramGenerator;
use crate::workload::Program;

/// wrong-path streams are drawn from a generator seeded apart from the programs
const WRONG_PATH_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone)]
struct WrongPath {
    branch_pc: u32,
    insts: VecDeque<Instruction>,
}

/// Dispatched to the collector, not yet released.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    pc: u32,
    issue_id: u32,
    rd: Option<u8>,
}

#[derive(Debug, Clone, Default)]
struct WarpFetch {
    next: usize,
    tag: u32,
    /// outstanding writes per register
    pending: Vec<u32>,
    in_flight: VecDeque<InFlight>,
    wrong_path: Option<WrongPath>,
    /// waiting for its flush to reach the collector
    flush_pending: bool,
}

#[derive(Debug, Default)]
pub struct FrontendState {
    warps: Vec<WarpFetch>,
    rr: usize,
    flushes: VecDeque<usize>,
}

/// Dispatch front end: walks each warp's program, holds back instructions whose
/// registers are still being written, and runs down the wrong path of a
/// mispredicted branch until it resolves.
#[derive(Debug)]
pub struct Frontend {
    base: ModuleBase<FrontendState, WorkloadConfig>,
    programs: Vec<Program>,
    num_regs: usize,
    wrong_paths: ProgramGenerator,
}

module!(Frontend, FrontendState, WorkloadConfig,);

impl ModuleBehaviors for Frontend {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state = FrontendState::new(self.programs.len(), self.num_regs);
    }
}

impl FrontendState {
    fn new(num_warps: usize, num_regs: usize) -> Self {
        Self {
            warps: (0..num_warps)
                .map(|_| WarpFetch { pending: vec![0; num_regs], ..WarpFetch::default() })
                .collect(),
            ..Self::default()
        }
    }
}

impl WarpFetch {
    fn blocked(&self, inst: &Instruction) -> bool {
        let needs = inst.needed_mask();
        let raw = inst.rs.iter().enumerate().any(|(i, &r)| needs.bit(i) && self.pending[r as usize] > 0);
        let waw = inst.writes_rd() && self.pending[inst.rd as usize] > 0;
        raw || waw
    }

    fn release_reg(&mut self, rd: u8) {
        debug_assert!(self.pending[rd as usize] > 0, "r{} was not pending", rd);
        self.pending[rd as usize] = self.pending[rd as usize].saturating_sub(1);
    }
}

impl Frontend {
    pub fn new(config: Arc<WorkloadConfig>, programs: Vec<Program>, num_regs: usize) -> anyhow::Result<Self> {
        let wrong_paths = ProgramGenerator::new(&config, num_regs, config.seed ^ WRONG_PATH_SALT)?;
        let mut me = Frontend {
            base: ModuleBase {
                state: FrontendState::new(programs.len(), num_regs),
                ..ModuleBase::default()
            },
            programs,
            num_regs,
            wrong_paths,
        };
        me.init_conf(config);
        Ok(me)
    }

    /// Current branch tag of every warp.
    pub fn tags(&self) -> Vec<u32> {
        self.base.state.warps.iter().map(|w| w.tag).collect()
    }

    /// Oldest flush not yet handed to the collector; one per step.
    pub fn take_flush(&mut self) -> Option<usize> {
        self.base.state.flushes.pop_front()
    }

    /// The collector dropped every unreleased instruction of `warp`.
    pub fn apply_flush(&mut self, warp: usize) {
        let fetch = &mut self.base.state.warps[warp];
        for dropped in std::mem::take(&mut fetch.in_flight) {
            if let Some(rd) = dropped.rd {
                fetch.release_reg(rd);
            }
        }
        fetch.flush_pending = false;
    }

    /// Scoreboard clear from the functional units.
    pub fn clear(&mut self, warp: usize, rd: u8) {
        self.base.state.warps[warp].release_reg(rd);
    }

    fn head(&self, warp: usize) -> Option<Instruction> {
        let fetch = &self.base.state.warps[warp];
        if fetch.flush_pending {
            return None;
        }
        let inst = match &fetch.wrong_path {
            Some(wp) => *wp.insts.front()?,
            None => self.programs[warp].get(fetch.next)?.inst,
        };
        (!fetch.blocked(&inst)).then(|| inst.with_tag(fetch.tag))
    }

    /// Instructions offered on the dispatch ports this step, from distinct warps
    /// in round-robin order. A port is only offered to when `ready` says so.
    pub fn offer(&self, ready: [bool; NUM_PORTS]) -> [Option<Instruction>; NUM_PORTS] {
        let num_warps = self.programs.len();
        let mut offers = [None; NUM_PORTS];
        let mut candidates = (0..num_warps)
            .map(|i| (self.base.state.rr + i) % num_warps)
            .filter_map(|warp| self.head(warp));
        for port in 0..NUM_PORTS {
            if !ready[port] {
                break;
            }
            offers[port] = candidates.next();
        }
        offers
    }

    /// Records what the collector took. `granted` holds the issue id handed to
    /// each offer, or nothing when the dispatch was refused.
    pub fn accept(&mut self, offers: &[Option<Instruction>; NUM_PORTS], granted: &[Option<u32>; NUM_PORTS]) {
        let wrong_path_len = self.conf().wrong_path_len;
        let num_warps = self.programs.len();
        for (offer, id) in offers.iter().zip(granted) {
            let (Some(inst), Some(issue_id)) = (offer, *id) else { continue };
            let warp = inst.warp;
            let fetch = &mut self.base.state.warps[warp];

            match fetch.wrong_path.as_mut() {
                Some(wp) => {
                    wp.insts.pop_front();
                }
                None => {
                    let mispredict = self.programs[warp][fetch.next].mispredict;
                    fetch.next += 1;
                    if mispredict {
                        debug!("w{} fetching down the wrong path of pc={:#06x}", warp, inst.pc);
                        fetch.wrong_path = Some(WrongPath {
                            branch_pc: inst.pc,
                            insts: self.wrong_paths.wrong_path(warp, inst.pc, wrong_path_len),
                        });
                    }
                }
            }

            let rd = inst.writes_rd().then_some(inst.rd);
            if let Some(rd) = rd {
                fetch.pending[rd as usize] += 1;
            }
            fetch.in_flight.push_back(InFlight { pc: inst.pc, issue_id, rd });
            self.base.state.rr = (warp + 1) % num_warps;
        }
    }

    /// Checks a release against the dispatch order of its warp. Returns whether
    /// it is the mispredicted branch the warp is waiting on.
    pub fn on_release(&mut self, issued: &IssuedInst) -> anyhow::Result<bool> {
        let warp = issued.inst.warp;
        let fetch = &mut self.base.state.warps[warp];
        let Some(front) = fetch.in_flight.pop_front() else {
            bail!("w{} released {} with nothing dispatched", warp, issued);
        };
        ensure!(
            front.pc == issued.inst.pc && front.issue_id == issued.issue_id,
            "w{} released {}, expected pc={:#06x} id {}",
            warp,
            issued,
            front.pc,
            front.issue_id
        );
        // a squashed no-op never reaches a functional unit to clear its register
        if issued.squashed {
            if let Some(rd) = front.rd {
                fetch.release_reg(rd);
            }
            return Ok(false);
        }
        let redirect = fetch
            .wrong_path
            .as_ref()
            .is_some_and(|wp| wp.branch_pc == issued.inst.pc && issued.inst.tag == fetch.tag);
        Ok(redirect)
    }

    /// A branch resolved. On a redirect the warp moves to a new tag and goes back
    /// to the instruction after the branch.
    pub fn resolve(&mut self, completion: &Completion, recovery: Recovery) {
        if !completion.redirect {
            return;
        }
        let fetch = &mut self.base.state.warps[completion.warp];
        debug_assert!(fetch.wrong_path.as_ref().is_some_and(|wp| wp.branch_pc == completion.pc));
        fetch.wrong_path = None;
        fetch.tag = fetch.tag.wrapping_add(1);
        debug!("w{} redirected after pc={:#06x}, tag now {}", completion.warp, completion.pc, fetch.tag);
        if recovery == Recovery::Flush {
            fetch.flush_pending = true;
            self.base.state.flushes.push_back(completion.warp);
        }
    }

    /// Dispatched and not yet released, over all warps.
    pub fn in_flight(&self) -> usize {
        self.base.state.warps.iter().map(|w| w.in_flight.len()).sum()
    }

    pub fn fetched(&self, warp: usize) -> usize {
        self.base.state.warps[warp].next
    }

    pub fn done(&self) -> bool {
        self.base.state.warps.iter().zip(&self.programs).all(|(w, program)| {
            w.next == program.len() && w.in_flight.is_empty() && w.wrong_path.is_none() && !w.flush_pending
        })
    }
}
