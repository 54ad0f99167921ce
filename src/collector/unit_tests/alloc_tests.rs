use crate::collector::{CollectorConfig, Opcode};
use super::common::*;

#[test]
fn dispatch_ready_follows_idle_units() {
    let mut b = Bench::new(small_config());
    let add = inst(Opcode::ADD, 0, 1, [4, 8, 0]);
    assert_eq!(b.oc.dispatch_ready(), [true, true]);

    b.dispatch(add, add);
    b.dispatch(add, None);
    assert_eq!(b.oc.occupancy(), 3);
    assert_eq!(b.oc.dispatch_ready(), [true, false]);

    let out = b.dispatch(add, add);
    assert!(out.refused, "dual offer with a single idle unit must be refused whole");
    assert_eq!(out.granted, [None, None]);
    assert_eq!(b.oc.occupancy(), 3);
    assert_eq!(b.oc.counters().peek_issue(0), 3, "refused offers consume no issue id");
    assert_eq!(b.oc.stats.dispatch_rejected, 2);

    let out = b.dispatch(add, None);
    assert_eq!(out.granted, [Some(3), None]);
    assert_eq!(b.oc.dispatch_ready(), [false, false]);
}

#[test]
fn lone_offer_on_port1_is_served() {
    let mut b = Bench::new(small_config());
    let out = b.dispatch(None, inst(Opcode::MOV, 1, 2, [3, 0, 0]));
    assert_eq!(out.granted, [None, Some(0)]);
    assert!(b.unit(0).is_allocated());
    assert_eq!(b.unit(0).warp(), 1);
}

#[test]
fn issue_ids_are_per_warp_and_chain_within_a_step() {
    let mut b = Bench::new(small_config());
    let w0 = inst(Opcode::NOP, 0, 0, [0; 3]);
    let w1 = inst(Opcode::NOP, 1, 0, [0; 3]);
    assert_eq!(b.dispatch(w0, w1).granted, [Some(0), Some(0)]);
    assert_eq!(b.dispatch(w1, w1).granted, [Some(1), Some(2)]);
    assert_eq!(b.unit(2).issue_id, 1);
    assert_eq!(b.unit(3).issue_id, 2);
}

#[test]
fn released_unit_is_reusable_only_after_the_step() {
    let mut b = Bench::new(CollectorConfig { num_collectors: 1, ..small_config() });
    let nop = inst(Opcode::NOP, 1, 0, [0; 3]);
    assert_eq!(b.dispatch(nop, None).granted, [Some(0), None]);
    b.step();
    assert!(b.unit(0).is_ready());

    let out = b.dispatch(nop, None);
    assert_eq!(out.released().count(), 1);
    assert!(out.refused);
    assert!(b.unit(0).is_idle());

    let out = b.dispatch(nop, None);
    assert_eq!(out.granted, [Some(1), None]);
}

#[test]
fn allocation_copies_descriptor_and_need_mask() {
    let mut b = Bench::new(small_config());
    let ffma = Some(crate::collector::Instruction::new(Opcode::FFMA, 1, 7, [1, 2, 3]).with_pc(0x40).with_tag(0));
    b.dispatch(ffma, None);
    let cu = b.unit(0);
    assert_eq!(cu.inst.pc, 0x40);
    assert_eq!(cu.inst.rs, [1, 2, 3]);
    assert_eq!(cu.needed_mask, 0b111);
    assert_eq!(cu.operand_ready, [false; 3]);
}

#[test]
fn out_of_range_source_is_refused() {
    let mut b = Bench::new(small_config());
    b.fill(1, 0, 77);
    let out = b.dispatch(inst(Opcode::MOV, 0, 1, [16, 0, 0]), None);
    assert!(out.refused);
    assert_eq!(out.granted, [None, None]);
    assert!(b.unit(0).is_idle());
    assert_eq!(b.oc.counters().peek_issue(0), 0);
    assert_eq!(b.oc.stats.dispatch_rejected, 1);

    // an in-range partner is refused along with it
    let out = b.dispatch(inst(Opcode::MOV, 0, 1, [2, 0, 0]), inst(Opcode::NOP, 2, 0, [0; 3]));
    assert!(out.refused);
    assert_eq!(b.oc.occupancy(), 0);
}

#[test]
#[should_panic(expected = "out of range")]
fn out_of_range_writeback_panics() {
    let mut b = Bench::new(small_config());
    let wb = b.writeback(0, 16, 5);
    b.io.writebacks[0] = wb;
    b.step();
}

#[test]
fn built_with_its_config() {
    let b = Bench::new(CollectorConfig { num_collectors: 3, ..small_config() });
    assert_eq!(b.oc.conf().num_collectors, 3);
    assert_eq!(b.oc.units().len(), 3);
}
