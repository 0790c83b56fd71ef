use owlet_core::cpu::mos6502::StatusFlag;

mod common;
use common::TestRig;

#[test]
fn test_lda_immediate() {
    let mut rig = TestRig::new();
    // LDA #$42
    rig.load(0x0200, &[0xA9, 0x42]);
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 2);
    assert_eq!(rig.cpu.a, 0x42);
    assert_eq!(rig.cpu.pc, 0x0202);
    assert_eq!(rig.cpu.p & (StatusFlag::Z as u8), 0);
    assert_eq!(rig.cpu.p & (StatusFlag::N as u8), 0);
}

#[test]
fn test_lda_zero_sets_z() {
    let mut rig = TestRig::new();
    rig.load(0x0200, &[0xA9, 0x00]);
    rig.boot_at(0x0200);
    rig.step_instruction();
    assert_ne!(rig.cpu.p & (StatusFlag::Z as u8), 0);
}

#[test]
fn test_lda_absolute_cycles() {
    let mut rig = TestRig::new();
    // LDA $1234
    rig.load(0x0200, &[0xAD, 0x34, 0x12]);
    rig.memory[0x1234] = 0x99;
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 4);
    assert_eq!(rig.cpu.a, 0x99);
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
    assert_eq!(rig.cpu.ea, 0x1234);
}

#[test]
fn test_lda_absolute_x_page_cross_penalty() {
    let mut rig = TestRig::new();
    // LDX #$01 / LDA $12FF,X
    rig.load(0x0200, &[0xA2, 0x01, 0xBD, 0xFF, 0x12]);
    rig.memory[0x1300] = 0x55;
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 2);
    assert_eq!(rig.step_instruction(), 5); // 4 + 1 page-cross penalty
    assert_eq!(rig.cpu.a, 0x55);
}

#[test]
fn test_lda_absolute_x_no_penalty_same_page() {
    let mut rig = TestRig::new();
    rig.load(0x0200, &[0xA2, 0x01, 0xBD, 0x00, 0x12]);
    rig.memory[0x1201] = 0x77;
    rig.boot_at(0x0200);

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 4);
    assert_eq!(rig.cpu.a, 0x77);
}

#[test]
fn test_sta_zero_page() {
    let mut rig = TestRig::new();
    // LDA #$AB / STA $80
    rig.load(0x0200, &[0xA9, 0xAB, 0x85, 0x80]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 3);
    assert_eq!(rig.memory[0x0080], 0xAB);
}

#[test]
fn test_sta_absolute_x_always_five_cycles() {
    let mut rig = TestRig::new();
    // LDA #$01 / LDX #$02 / STA $1200,X
    rig.load(0x0200, &[0xA9, 0x01, 0xA2, 0x02, 0x9D, 0x00, 0x12]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 5);
    assert_eq!(rig.memory[0x1202], 0x01);
}

#[test]
fn test_indirect_indexed_load() {
    let mut rig = TestRig::new();
    // LDY #$04 / LDA ($70),Y
    rig.load(0x0200, &[0xA0, 0x04, 0xB1, 0x70]);
    rig.load(0x0070, &[0x00, 0x30]); // pointer -> $3000
    rig.memory[0x3004] = 0x5A;
    rig.boot_at(0x0200);

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 5);
    assert_eq!(rig.cpu.a, 0x5A);
    assert_eq!(rig.cpu.ia, 0x0070);
    assert_eq!(rig.cpu.ea, 0x3004);
}

#[test]
fn test_indexed_indirect_load() {
    let mut rig = TestRig::new();
    // LDX #$04 / LDA ($20,X)
    rig.load(0x0200, &[0xA2, 0x04, 0xA1, 0x20]);
    rig.load(0x0024, &[0x10, 0x40]); // pointer at $24 -> $4010
    rig.memory[0x4010] = 0x3C;
    rig.boot_at(0x0200);

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 6);
    assert_eq!(rig.cpu.a, 0x3C);
}

#[test]
fn test_rmw_inc_absolute() {
    let mut rig = TestRig::new();
    // INC $1234
    rig.load(0x0200, &[0xEE, 0x34, 0x12]);
    rig.memory[0x1234] = 0x7F;
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 6);
    assert_eq!(rig.memory[0x1234], 0x80);
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
}

#[test]
fn test_asl_zero_page_rmw() {
    let mut rig = TestRig::new();
    // ASL $42
    rig.load(0x0200, &[0x06, 0x42]);
    rig.memory[0x0042] = 0x81;
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 5);
    assert_eq!(rig.memory[0x0042], 0x02);
    assert_ne!(rig.cpu.p & (StatusFlag::C as u8), 0);
}

#[test]
fn test_branch_cycle_counts() {
    let mut rig = TestRig::new();
    // SEC / BCC +2 (not taken) / BCS +2 (taken, same page)
    rig.load(0x0200, &[0x38, 0x90, 0x02, 0xB0, 0x02, 0xEA, 0xEA, 0xEA]);
    rig.boot_at(0x0200);

    rig.step_instruction(); // SEC
    assert_eq!(rig.step_instruction(), 2); // BCC not taken
    assert_eq!(rig.step_instruction(), 3); // BCS taken, no page cross
    assert_eq!(rig.cpu.pc, 0x0207);
}

#[test]
fn test_branch_page_cross_costs_four() {
    let mut rig = TestRig::new();
    // BNE -3 crossing back over the page boundary.
    rig.load(0x0200, &[0xA9, 0x01, 0xD0, 0xFB]); // LDA #1 / BNE $01FF
    rig.boot_at(0x0200);

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 4);
    assert_eq!(rig.cpu.pc, 0x01FF);
}

#[test]
fn test_jsr_rts_round_trip() {
    let mut rig = TestRig::new();
    // JSR $0300 ... $0300: LDA #$11 / RTS
    rig.load(0x0200, &[0x20, 0x00, 0x03, 0xA9, 0x22]);
    rig.load(0x0300, &[0xA9, 0x11, 0x60]);
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 6); // JSR
    assert_eq!(rig.cpu.pc, 0x0300);
    rig.step_instruction(); // LDA #$11
    assert_eq!(rig.cpu.a, 0x11);
    assert_eq!(rig.step_instruction(), 6); // RTS
    assert_eq!(rig.cpu.pc, 0x0203);
    rig.step_instruction(); // LDA #$22
    assert_eq!(rig.cpu.a, 0x22);
}

#[test]
fn test_stack_push_pull() {
    let mut rig = TestRig::new();
    // LDA #$5A / PHA / LDA #$00 / PLA
    rig.load(0x0200, &[0xA9, 0x5A, 0x48, 0xA9, 0x00, 0x68]);
    rig.boot_at(0x0200);
    let s0 = rig.cpu.s;

    rig.step_instruction();
    assert_eq!(rig.step_instruction(), 3); // PHA
    assert_eq!(rig.cpu.s, s0.wrapping_sub(1));
    rig.step_instruction();
    assert_ne!(rig.cpu.p & (StatusFlag::Z as u8), 0);
    assert_eq!(rig.step_instruction(), 4); // PLA
    assert_eq!(rig.cpu.a, 0x5A);
    assert_eq!(rig.cpu.s, s0);
}

#[test]
fn test_jmp_indirect_page_bug() {
    let mut rig = TestRig::new();
    // JMP ($12FF): the high pointer byte wraps to $1200 on NMOS.
    rig.load(0x0200, &[0x6C, 0xFF, 0x12]);
    rig.memory[0x12FF] = 0x34;
    rig.memory[0x1300] = 0x99; // would be used by a fixed implementation
    rig.memory[0x1200] = 0x56;
    rig.boot_at(0x0200);

    assert_eq!(rig.step_instruction(), 5);
    assert_eq!(rig.cpu.pc, 0x5634);
}

#[test]
fn test_transfers_and_flags() {
    let mut rig = TestRig::new();
    // LDX #$FF / TXS / LDA #$80 / TAY
    rig.load(0x0200, &[0xA2, 0xFF, 0x9A, 0xA9, 0x80, 0xA8]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    let p_before = rig.cpu.p;
    rig.step_instruction(); // TXS: no flags
    assert_eq!(rig.cpu.s, 0xFF);
    assert_eq!(rig.cpu.p, p_before);
    rig.step_instruction();
    rig.step_instruction(); // TAY sets N
    assert_eq!(rig.cpu.y, 0x80);
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
}

#[test]
fn test_compare_sets_carry_for_gte() {
    let mut rig = TestRig::new();
    // LDA #$40 / CMP #$40 / CMP #$41
    rig.load(0x0200, &[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.step_instruction();
    assert_ne!(rig.cpu.p & (StatusFlag::C as u8), 0);
    assert_ne!(rig.cpu.p & (StatusFlag::Z as u8), 0);
    rig.step_instruction();
    assert_eq!(rig.cpu.p & (StatusFlag::C as u8), 0);
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
}

#[test]
fn test_adc_overflow_flag() {
    let mut rig = TestRig::new();
    // CLC / LDA #$7F / ADC #$01
    rig.load(0x0200, &[0x18, 0xA9, 0x7F, 0x69, 0x01]);
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.step_instruction();
    rig.step_instruction();
    assert_eq!(rig.cpu.a, 0x80);
    assert_ne!(rig.cpu.p & (StatusFlag::V as u8), 0);
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
}

#[test]
fn test_bit_copies_operand_high_bits() {
    let mut rig = TestRig::new();
    // LDA #$01 / BIT $80
    rig.load(0x0200, &[0xA9, 0x01, 0x24, 0x80]);
    rig.memory[0x0080] = 0xC0;
    rig.boot_at(0x0200);

    rig.step_instruction();
    rig.step_instruction();
    assert_ne!(rig.cpu.p & (StatusFlag::N as u8), 0);
    assert_ne!(rig.cpu.p & (StatusFlag::V as u8), 0);
    assert_ne!(rig.cpu.p & (StatusFlag::Z as u8), 0); // $01 & $C0 == 0
}
