//! Decimal-mode ADC/SBC, including the NMOS flag quirks: ADC takes N
//! and V from the intermediate sum and Z from the binary result; SBC
//! flags always come from the binary result.

use owlet_core::cpu::mos6502::{CpuVariant, StatusFlag};

mod common;
use common::TestRig;

fn flag(rig: &TestRig, flag: StatusFlag) -> bool {
    rig.cpu.p & flag as u8 != 0
}

/// SED / CLC or SEC / LDA #a / ADC or SBC #b.
fn run_bcd(variant: CpuVariant, op: u8, a: u8, b: u8, carry: bool) -> TestRig {
    let mut rig = TestRig::with_variant(variant);
    let carry_op = if carry { 0x38 } else { 0x18 };
    rig.load(0x0200, &[0xF8, carry_op, 0xA9, a, op, b]);
    rig.boot_at(0x0200);
    for _ in 0..4 {
        rig.step_instruction();
    }
    rig
}

#[test]
fn bcd_adc_simple() {
    let rig = run_bcd(CpuVariant::Nmos, 0x69, 0x19, 0x01, false);
    assert_eq!(rig.cpu.a, 0x20);
    assert!(!flag(&rig, StatusFlag::C));
}

#[test]
fn bcd_adc_with_carry_out() {
    let rig = run_bcd(CpuVariant::Nmos, 0x69, 0x99, 0x01, false);
    assert_eq!(rig.cpu.a, 0x00);
    assert!(flag(&rig, StatusFlag::C));
}

#[test]
fn bcd_adc_carry_in() {
    let rig = run_bcd(CpuVariant::Nmos, 0x69, 0x58, 0x46, true);
    // 58 + 46 + 1 = 105
    assert_eq!(rig.cpu.a, 0x05);
    assert!(flag(&rig, StatusFlag::C));
}

#[test]
fn bcd_adc_nmos_z_from_binary_result() {
    // 0x99 + 0x01: BCD result is 0x00 but the binary sum 0x9A is not
    // zero, so NMOS leaves Z clear.
    let rig = run_bcd(CpuVariant::Nmos, 0x69, 0x99, 0x01, false);
    assert!(!flag(&rig, StatusFlag::Z));
}

#[test]
fn bcd_adc_cmos_z_from_decimal_result() {
    let rig = run_bcd(CpuVariant::Cmos, 0x69, 0x99, 0x01, false);
    assert_eq!(rig.cpu.a, 0x00);
    assert!(flag(&rig, StatusFlag::Z));
}

#[test]
fn bcd_sbc_simple() {
    let rig = run_bcd(CpuVariant::Nmos, 0xE9, 0x42, 0x13, true);
    assert_eq!(rig.cpu.a, 0x29);
    assert!(flag(&rig, StatusFlag::C));
}

#[test]
fn bcd_sbc_borrow() {
    let rig = run_bcd(CpuVariant::Nmos, 0xE9, 0x13, 0x42, true);
    // 13 - 42 borrows: 71 with carry clear.
    assert_eq!(rig.cpu.a, 0x71);
    assert!(!flag(&rig, StatusFlag::C));
}

#[test]
fn bcd_sbc_nmos_flags_are_binary() {
    // 0x00 - 0x00 with borrow: binary result 0xFF drives N.
    let rig = run_bcd(CpuVariant::Nmos, 0xE9, 0x00, 0x00, false);
    assert!(flag(&rig, StatusFlag::N));
    assert!(!flag(&rig, StatusFlag::C));
}

#[test]
fn binary_mode_unaffected() {
    // CLD path sanity check: plain binary ADC.
    let mut rig = TestRig::new();
    rig.load(0x0200, &[0xD8, 0x18, 0xA9, 0x45, 0x69, 0x45]);
    rig.boot_at(0x0200);
    for _ in 0..4 {
        rig.step_instruction();
    }
    assert_eq!(rig.cpu.a, 0x8A);
}
