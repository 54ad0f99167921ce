use std::cmp::Ordering;

/// Compares two wrapping counters of `n` bits by forward distance, so that a
/// counter that just wrapped still orders after the one it wrapped past.
pub fn counter_cmp(a: u32, b: u32, n: usize) -> Ordering {
    let max = 1u64 << n;
    let forward = |x: u64, y: u64| -> u64 {
        (y.wrapping_sub(x)) & (max - 1u64)
    };

    let dist_ab = forward(a as u64, b as u64);
    let dist_ba = forward(b as u64, a as u64);

    dist_ab.cmp(&dist_ba)
}

/// Per-warp program-order sequence numbers.
///
/// `issue[w]` is the id the next dispatched instruction of warp `w` receives;
/// `release[w]` is the id of the only instruction of `w` allowed to release next.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarpCounters {
    issue: Vec<u32>,
    release: Vec<u32>,
    width: usize,
}

impl WarpCounters {
    pub fn new(num_warps: usize, width: usize) -> Self {
        assert!(width > 0 && width < 32, "counter width {} out of range", width);
        Self {
            issue: vec![0; num_warps],
            release: vec![0; num_warps],
            width,
        }
    }

    pub fn succ(&self, counter: u32) -> u32 {
        counter.wrapping_add(1) & ((1u32 << self.width) - 1)
    }

    /// Hands out the next issue id of `warp` (post-increment).
    pub fn take(&mut self, warp: usize) -> u32 {
        let id = self.issue[warp];
        self.issue[warp] = self.succ(id);
        id
    }

    pub fn peek_issue(&self, warp: usize) -> u32 {
        self.issue[warp]
    }

    pub fn head(&self, warp: usize) -> u32 {
        self.release[warp]
    }

    pub fn retire(&mut self, warp: usize) {
        assert!(self.in_flight(warp) > 0, "warp {} released past its last issued instruction", warp);
        self.release[warp] = self.succ(self.release[warp]);
    }

    /// Forgets every unreleased id of `warp` after a flush.
    pub fn rewind(&mut self, warp: usize) {
        self.issue[warp] = self.release[warp];
    }

    pub fn in_flight(&self, warp: usize) -> u32 {
        self.issue[warp].wrapping_sub(self.release[warp]) & ((1u32 << self.width) - 1)
    }

    pub fn num_warps(&self) -> usize {
        self.issue.len()
    }
}
