use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use anyhow::bail;
use crate::collector::counters::counter_cmp;
use crate::collector::inst::IssuedInst;
use crate::collector::isa;

/// Queues released instructions per warp in program order, and checks on the way in
/// that each warp's issue ids advance by exactly one.
pub struct Tracer {
    /// per-warp program-order buffer of lines
    bufs: Vec<VecDeque<Line>>,
    last_id: Vec<Option<u32>>,
    counter_width: usize,
    keep_lines: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Line {
    pub cycle: u64,
    pub port: usize,
    pub cu: usize,
    pub pc: u32,
    pub opcode: u8,
    pub issue_id: u32,
    pub squashed: bool,
}

impl Display for Line {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "@{} port {} cu {} id {} pc={:#06x} {}{}",
            self.cycle,
            self.port,
            self.cu,
            self.issue_id,
            self.pc,
            isa::mnemonic(self.opcode),
            if self.squashed { " (squashed)" } else { "" }
        )
    }
}

impl Tracer {
    pub fn new(num_warps: usize, counter_width: usize, keep_lines: bool) -> Tracer {
        Tracer {
            bufs: (0..num_warps).map(|_| VecDeque::new()).collect(),
            last_id: vec![None; num_warps],
            counter_width,
            keep_lines,
        }
    }

    pub fn record(&mut self, cycle: u64, port: usize, issued: &IssuedInst) -> anyhow::Result<()> {
        let warp = issued.inst.warp;
        let mask = (1u32 << self.counter_width) - 1;
        let expected = self.last_id[warp].map_or(0, |id| id.wrapping_add(1) & mask);
        if issued.issue_id != expected {
            let what = match counter_cmp(issued.issue_id, expected, self.counter_width) {
                Ordering::Less => "an already released id",
                _ => "ahead of an unreleased id",
            };
            bail!(
                "@{}: w{} released id {} ({}), expected {}",
                cycle,
                warp,
                issued.issue_id,
                what,
                expected
            );
        }
        self.last_id[warp] = Some(issued.issue_id);
        if self.keep_lines {
            self.bufs[warp].push_back(Line {
                cycle,
                port,
                cu: issued.cu,
                pc: issued.inst.pc,
                opcode: issued.inst.opcode,
                issue_id: issued.issue_id,
                squashed: issued.squashed,
            });
        }
        Ok(())
    }

    pub fn consume(&mut self, warp: usize) -> Option<Line> {
        self.bufs[warp].pop_front()
    }

    pub fn last_id(&self, warp: usize) -> Option<u32> {
        self.last_id[warp]
    }
}
