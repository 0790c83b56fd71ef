use owlet_core::cpu::mos6502::{BusAccess, ReadKind, StatusFlag};

mod common;
use common::TestRig;

const IRQ_DEVICE: u32 = 1;
const NMI_DEVICE: u32 = 1;

fn setup_vectors(rig: &mut TestRig, irq: u16, nmi: u16) {
    rig.memory[0xFFFE] = irq as u8;
    rig.memory[0xFFFF] = (irq >> 8) as u8;
    rig.memory[0xFFFA] = nmi as u8;
    rig.memory[0xFFFB] = (nmi >> 8) as u8;
}

#[test]
fn test_irq_entry_takes_seven_cycles() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    // CLI / NOP sled
    rig.load(0x0200, &[0x58, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA]);
    rig.load(0x0400, &[0xEA]);
    rig.boot_at(0x0200);

    rig.step_instruction(); // CLI
    rig.step_instruction(); // one more instruction so the line is seen
    rig.cpu.set_irq(IRQ_DEVICE, true);
    rig.step_instruction(); // NOP; the following fetch is hijacked

    assert!(matches!(rig.cpu.access, BusAccess::Read(ReadKind::Interrupt)));
    assert!(rig.cpu.is_probably_irq());

    let return_pc = rig.cpu.pc;
    let s_before = rig.cpu.s;

    // 7 cycles from the hijacked fetch to the handler's first fetch.
    rig.run(7);
    assert!(rig.cpu.is_about_to_execute());
    assert_eq!(rig.cpu.pc, 0x0400);
    assert_ne!(rig.cpu.p & (StatusFlag::I as u8), 0);
    assert_eq!(rig.cpu.s, s_before.wrapping_sub(3));

    // Pushed frame: PCH, PCL, P with B clear.
    let stack = 0x0100 | s_before as u16;
    assert_eq!(rig.memory[stack as usize], (return_pc >> 8) as u8);
    assert_eq!(rig.memory[stack as usize - 1], return_pc as u8);
    assert_eq!(rig.memory[stack as usize - 2] & StatusFlag::B as u8, 0);
}

#[test]
fn test_irq_masked_by_i_flag() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    // SEI / NOPs
    rig.load(0x0200, &[0x78, 0xEA, 0xEA, 0xEA]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.cpu.set_irq(IRQ_DEVICE, true);
    rig.step_instruction();
    rig.step_instruction();
    // Still executing the sled.
    assert!(rig.cpu.pc >= 0x0200 && rig.cpu.pc < 0x0210);
}

#[test]
fn test_nmi_is_edge_triggered_and_unmasked() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    // SEI / NOP sled; NMI fires despite I.
    rig.load(0x0200, &[0x78, 0xEA, 0xEA, 0xEA, 0xEA]);
    rig.load(0x0500, &[0xEA, 0x40]); // NOP / RTI
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.cpu.set_nmi(NMI_DEVICE, true);
    rig.step_instruction();

    assert!(matches!(rig.cpu.access, BusAccess::Read(ReadKind::Interrupt)));
    assert!(!rig.cpu.is_probably_irq());

    rig.run(7);
    assert_eq!(rig.cpu.pc, 0x0500);

    // Level stays high: no second entry without a new edge.
    rig.step_instruction(); // NOP in handler
    assert_eq!(rig.cpu.opcode_pc, 0x0500);
}

#[test]
fn test_rti_restores_context() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    rig.load(0x0200, &[0x58, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA, 0xEA]);
    rig.load(0x0400, &[0x40]); // RTI immediately
    rig.boot_at(0x0200);

    rig.step_instruction(); // CLI
    rig.step_instruction();
    rig.cpu.set_irq(IRQ_DEVICE, true);
    rig.step_instruction();
    let return_pc = rig.cpu.pc;
    rig.run(7); // interrupt sequence
    rig.cpu.set_irq(IRQ_DEVICE, false);

    assert_eq!(rig.step_instruction(), 6); // RTI
    assert_eq!(rig.cpu.pc, return_pc);
    assert_eq!(rig.cpu.p & (StatusFlag::I as u8), 0);
}

#[test]
fn test_brk_pushes_b_set_and_vectors_through_fffe() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    rig.load(0x0200, &[0x00, 0xFF]); // BRK + padding byte
    rig.load(0x0400, &[0xEA]);
    rig.boot_at(0x0200);

    let s_before = rig.cpu.s;
    assert_eq!(rig.step_instruction(), 7);
    assert_eq!(rig.cpu.pc, 0x0400);

    // Return address skips the padding byte.
    let stack = 0x0100 | s_before as u16;
    let pushed_pc =
        u16::from_le_bytes([rig.memory[stack as usize - 1], rig.memory[stack as usize]]);
    assert_eq!(pushed_pc, 0x0202);
    assert_ne!(rig.memory[stack as usize - 2] & StatusFlag::B as u8, 0);
}

#[test]
fn test_interrupt_read_classification() {
    let mut rig = TestRig::new();
    setup_vectors(&mut rig, 0x0400, 0x0500);
    rig.load(0x0200, &[0x58, 0xEA, 0xEA]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.cpu.set_irq(IRQ_DEVICE, true);
    rig.step_instruction();

    // The hijacked fetch reads the opcode byte but discards it: the
    // interrupted instruction's address is fetched again on return.
    assert!(rig.cpu.access.is_opcode_fetch());
    assert!(!rig.cpu.is_about_to_execute());
}
