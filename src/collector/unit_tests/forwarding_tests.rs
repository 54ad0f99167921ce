use crate::collector::{Opcode, Writeback};
use super::common::*;

#[test]
fn forwarding_beats_same_step_bank_read() {
    let mut b = Bench::new(small_config());
    b.fill(0, 4, 1);
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 0, 0]), None);

    let wb = b.writeback(0, 4, 9);
    b.io.writebacks[0] = wb;
    b.step();
    assert!(b.unit(0).is_ready());
    assert_eq!(b.unit(0).operand_data[0], b.lanes(9), "stale bank value must not win");
    assert_eq!(b.oc.stats.forwarded, 1);
    assert_eq!(b.oc.stats.bank_reads, 0);
    assert_eq!(b.rf.peek(0, 4), b.lanes(9));
}

#[test]
fn forwarded_operand_frees_its_bank_for_another_unit() {
    let mut b = Bench::new(small_config());
    b.fill(1, 8, 8);
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 0, 0]), inst(Opcode::MOV, 1, 2, [8, 0, 0]));

    let wb = b.writeback(0, 4, 5);
    b.io.writebacks[1] = wb;
    b.step();
    assert!(b.unit(0).is_ready() && b.unit(1).is_ready());
    assert_eq!(b.unit(0).operand_data[0], b.lanes(5));
    assert_eq!(b.unit(1).operand_data[0], b.lanes(8));
    assert_eq!(b.oc.stats.bank_reads, 1);
}

#[test]
fn other_warps_writebacks_are_not_forwarded() {
    let mut b = Bench::new(small_config());
    b.fill(0, 4, 1);
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 0, 0]), None);

    let wb = b.writeback(1, 4, 9);
    b.io.writebacks[0] = wb;
    b.step();
    assert_eq!(b.oc.stats.forwarded, 0);
    assert_eq!(b.unit(0).operand_data[0], b.lanes(1));
}

#[test]
fn unneeded_source_fields_do_not_match() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 5, 6]), None);
    let wb = b.writeback(0, 5, 3);
    b.io.writebacks[0] = wb;
    b.step();
    assert_eq!(b.oc.stats.forwarded, 0);
}

#[test]
fn younger_writeback_port_wins() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 0, 0]), None);
    b.io.writebacks = [b.writeback(0, 4, 2), b.writeback(0, 4, 3)];
    b.step();
    assert_eq!(b.unit(0).operand_data[0], b.lanes(3));
    assert_eq!(b.rf.peek(0, 4), b.lanes(3));
}

#[test]
fn masked_lanes_keep_the_old_register_value() {
    let mut b = Bench::new(small_config());
    b.fill(0, 4, 1);
    b.dispatch(inst(Opcode::MOV, 0, 2, [4, 0, 0]), None);
    b.io.writebacks[0] = Some(Writeback::new(0, 4, 0b0011, vec![7; 4]));
    b.step();
    assert_eq!(b.unit(0).operand_data[0], vec![7, 7, 1, 1]);
    assert_eq!(b.rf.peek(0, 4), vec![7, 7, 1, 1]);
}

#[test]
fn one_writeback_feeds_every_waiting_unit() {
    let mut b = Bench::new(small_config());
    b.dispatch(inst(Opcode::ADD, 1, 2, [6, 6, 0]), inst(Opcode::MOV, 1, 3, [6, 0, 0]));
    let wb = b.writeback(1, 6, 4);
    b.io.writebacks[0] = wb;
    b.step();
    assert_eq!(b.oc.stats.forwarded, 3);
    assert_eq!(b.oc.stats.bank_reads, 0);
    assert!(b.unit(0).is_ready() && b.unit(1).is_ready());
}
