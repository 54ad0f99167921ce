use crate::collector::unit::CollectorUnit;

/// The unit holds an instruction fetched under a branch tag its warp has since left.
/// Warps without a tag entry are never stale.
pub fn is_stale(cu: &CollectorUnit, tags: &[u32]) -> bool {
    !cu.is_idle() && tags.get(cu.warp()).is_some_and(|&tag| tag != cu.inst.tag)
}

/// Rewrites every newly stale unit into a Ready no-op. Decided on `cur`, applied to
/// `next`. Returns the number of units squashed.
pub fn squash_stale(cur: &[CollectorUnit], next: &mut [CollectorUnit], tags: &[u32]) -> usize {
    let mut squashed = 0;
    for (idx, cu) in cur.iter().enumerate() {
        if is_stale(cu, tags) && !cu.squashed && !next[idx].is_idle() {
            next[idx].squash();
            squashed += 1;
        }
    }
    squashed
}

/// Drops every in-flight instruction of `warp`. Returns the number of units freed.
pub fn flush(cur: &[CollectorUnit], next: &mut [CollectorUnit], warp: usize) -> usize {
    let mut freed = 0;
    for (idx, cu) in cur.iter().enumerate() {
        if !cu.is_idle() && cu.warp() == warp {
            next[idx].clear();
            freed += 1;
        }
    }
    freed
}
