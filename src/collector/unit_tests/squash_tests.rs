use crate::collector::Opcode;
use super::common::*;

#[test]
fn flush_suppresses_release_and_rewinds_issue() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::NOP, 0, 0, [0; 3]), inst(Opcode::NOP, 0, 0, [0; 3]));
    b.step();
    assert!(b.unit(0).is_ready() && b.unit(1).is_ready());

    b.io.flush = Some(0);
    let out = b.step();
    assert_eq!(out.released().count(), 0, "a flushed warp releases nothing in the flush step");
    assert!(b.unit(0).is_idle() && b.unit(1).is_idle());
    assert_eq!(b.oc.counters().peek_issue(0), 0);
    assert_eq!(b.oc.counters().head(0), 0);
    assert_eq!(b.oc.stats.flushed, 2);

    let out = b.dispatch(inst(Opcode::MOV, 0, 1, [2, 0, 0]), None);
    assert_eq!(out.granted, [Some(0), None]);
}

#[test]
fn same_step_dispatch_survives_its_warps_flush() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::NOP, 0, 0, [0; 3]), None);

    b.io.flush = Some(0);
    let out = b.dispatch(inst(Opcode::NOP, 0, 0, [0; 3]), None);
    assert_eq!(out.granted, [Some(0), None]);
    assert!(b.unit(0).is_idle());
    assert!(b.unit(1).is_allocated());
    assert_eq!(b.oc.occupancy(), b.oc.ids_in_flight());

    b.step();
    let out = b.step();
    let issued = out.released[0].as_ref().expect("post-flush instruction releases");
    assert_eq!((issued.cu, issued.issue_id), (1, 0));
}

#[test]
fn stale_head_released_in_the_same_step_goes_out_as_nop() {
    let mut b = Bench::new(small_config());
    b.fill(1, 1, 5);
    b.dispatch(inst(Opcode::MOV, 1, 2, [1, 0, 0]), None);
    b.step();
    assert!(b.unit(0).is_ready());

    b.io.branch_tags[1] = 1;
    let out = b.step();
    let issued = out.released[0].as_ref().expect("head still releases");
    assert!(issued.squashed);
    assert_eq!(issued.inst.opcode, Opcode::NOP);
    assert!(issued.rs_data.iter().all(Vec::is_empty));
    assert_eq!(b.oc.stats.squashed_released, 1);
    assert_eq!(b.oc.counters().head(1), 1);
}

#[test]
fn tag_change_squashes_only_its_warp() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::ADD, 0, 1, [4, 8, 0]), inst(Opcode::ADD, 1, 1, [5, 9, 0]));
    b.io.branch_tags[0] = 3;
    b.step();
    assert!(b.unit(0).is_ready() && b.unit(0).squashed);
    assert!(b.unit(1).is_allocated() && !b.unit(1).squashed);
    assert_eq!(b.oc.stats.squashed, 1);
}

#[test]
fn squashed_unit_stops_collecting() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::ADD, 0, 1, [4, 8, 0]), None);
    b.io.branch_tags[0] = 1;
    b.step();
    assert_eq!(b.oc.stats.bank_reads, 1, "the read issued before the squash is not undone");
    assert_eq!(b.unit(0).needed_mask, 0);

    let out = b.step();
    assert_eq!(b.oc.stats.bank_reads, 1);
    assert!(out.released[0].as_ref().is_some_and(|i| i.squashed));
}

#[test]
fn flush_wins_over_tag_squash() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::ADD, 0, 1, [4, 8, 0]), None);
    b.io.branch_tags[0] = 1;
    b.io.flush = Some(0);
    b.step();
    assert!(b.unit(0).is_idle());
    assert_eq!(b.oc.occupancy(), 0);
    assert_eq!(b.oc.ids_in_flight(), 0);
}
