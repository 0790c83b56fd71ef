//! Per-addressing-mode cycle sequences.
//!
//! `begin_instr` drives the cycle after the opcode fetch; `step_instr`
//! handles every later cycle of the instruction, consuming the byte the
//! bus owner deposited for the previous read and driving the next access.
//! The final cycle of every sequence applies the operation and drives the
//! next opcode fetch, so register effects land just before the following
//! instruction is fetched, matching real pipeline overlap.

use super::decode::{Mode, Op, OpClass};
use super::{CpuVariant, Mos6502, Phase, ReadKind, StatusFlag};

pub(crate) fn begin_instr(cpu: &mut Mos6502) {
    match cpu.mode {
        Mode::Imp | Mode::Acc | Mode::Push | Mode::Pull | Mode::Rts | Mode::Rti => {
            // Dummy read of the next byte, not consumed.
            cpu.drive_read(cpu.pc, ReadKind::Dummy);
        }
        _ => {
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.pc = cpu.pc.wrapping_add(1);
        }
    }
    cpu.phase = Phase::Instr(1);
}

/// NMOS performs a dummy write of the unmodified byte during the modify
/// cycle of a read-modify-write; CMOS re-reads instead.
fn rmw_modify_cycle(cpu: &mut Mos6502) {
    if cpu.variant() == CpuVariant::Cmos {
        cpu.drive_read(cpu.ea, ReadKind::Dummy);
    } else {
        let old = cpu.val;
        cpu.drive_write(cpu.ea, old);
    }
}

/// Drive the data access once the effective address is known.
fn drive_operand_access(cpu: &mut Mos6502) {
    match cpu.op.class() {
        OpClass::Write => {
            let value = cpu.store_value();
            cpu.drive_write(cpu.ea, value);
        }
        _ => cpu.drive_read(cpu.ea, ReadKind::Data),
    }
}

pub(crate) fn step_instr(cpu: &mut Mos6502, n: u8) {
    match cpu.mode {
        Mode::Imp | Mode::Acc => {
            cpu.apply_implied_op();
            cpu.drive_fetch();
        }

        Mode::Imm => {
            let value = cpu.dbus;
            cpu.apply_read_op(value);
            cpu.drive_fetch();
        }

        Mode::Zp => step_zp_abs(cpu, n, 1),
        Mode::Abs => match n {
            1 => {
                cpu.lo = cpu.dbus;
                cpu.drive_read(cpu.pc, ReadKind::Operand);
                cpu.pc = cpu.pc.wrapping_add(1);
                cpu.phase = Phase::Instr(2);
            }
            _ => step_zp_abs(cpu, n, 2),
        },

        Mode::ZpX | Mode::ZpY => match n {
            1 => {
                cpu.lo = cpu.dbus;
                cpu.drive_read(cpu.lo as u16, ReadKind::Dummy);
                cpu.phase = Phase::Instr(2);
            }
            _ => step_zp_abs(cpu, n, 2),
        },

        Mode::AbsX | Mode::AbsY => step_abs_indexed(cpu, n),
        Mode::IndX => step_ind_x(cpu, n),
        Mode::IndY => step_ind_y(cpu, n),
        Mode::ZpInd => step_zp_ind(cpu, n),
        Mode::Rel => step_branch(cpu, n),
        Mode::Push => step_push(cpu, n),
        Mode::Pull => step_pull(cpu, n),
        Mode::Jsr => step_jsr(cpu, n),
        Mode::Rts => step_rts(cpu, n),
        Mode::Rti => step_rti(cpu, n),
        Mode::Brk => step_brk(cpu, n),
        Mode::JmpAbs => step_jmp_abs(cpu, n),
        Mode::JmpInd => step_jmp_ind(cpu, n),
        Mode::JmpIndX => step_jmp_ind_x(cpu, n),
    }
}

/// Shared tail for zero page, absolute and indexed-zero-page modes once
/// the address bytes are in. `base` is the cycle number at which the
/// effective address is resolved and the data access driven.
fn step_zp_abs(cpu: &mut Mos6502, n: u8, base: u8) {
    if n == base {
        cpu.ea = match cpu.mode {
            // The zero page address is the byte just fetched.
            Mode::Zp => cpu.dbus as u16,
            // Indexing wraps within the zero page.
            Mode::ZpX => cpu.lo.wrapping_add(cpu.x) as u16,
            Mode::ZpY => cpu.lo.wrapping_add(cpu.y) as u16,
            Mode::Abs => u16::from_le_bytes([cpu.lo, cpu.dbus]),
            _ => unreachable!(),
        };
        drive_operand_access(cpu);
        cpu.phase = Phase::Instr(base + 1);
    } else if n == base + 1 {
        match cpu.op.class() {
            OpClass::Read => {
                let value = cpu.dbus;
                cpu.apply_read_op(value);
                cpu.drive_fetch();
            }
            OpClass::Write => cpu.drive_fetch(),
            OpClass::Rmw => {
                cpu.val = cpu.dbus;
                rmw_modify_cycle(cpu);
                cpu.phase = Phase::Instr(base + 2);
            }
        }
    } else if n == base + 2 {
        let new = cpu.apply_rmw_op(cpu.val);
        cpu.drive_write(cpu.ea, new);
        cpu.phase = Phase::Instr(base + 3);
    } else {
        cpu.drive_fetch();
    }
}

fn step_abs_indexed(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.pc = cpu.pc.wrapping_add(1);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            let base = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            let index = if cpu.mode == Mode::AbsX { cpu.x } else { cpu.y };
            cpu.ea = base.wrapping_add(index as u16);
            let crossed = (cpu.ea ^ base) & 0xFF00 != 0;
            if cpu.op.class() == OpClass::Read && !crossed {
                cpu.drive_read(cpu.ea, ReadKind::Data);
                cpu.phase = Phase::Instr(4);
            } else {
                // Dummy access at the un-fixed-up address.
                let fixup = (base & 0xFF00) | (cpu.ea & 0x00FF);
                cpu.drive_read(fixup, ReadKind::Dummy);
                cpu.phase = Phase::Instr(3);
            }
        }
        3 => match cpu.op.class() {
            OpClass::Read => {
                cpu.drive_read(cpu.ea, ReadKind::Data);
                cpu.phase = Phase::Instr(4);
            }
            OpClass::Write => {
                let value = cpu.store_value();
                cpu.drive_write(cpu.ea, value);
                cpu.phase = Phase::Instr(7);
            }
            OpClass::Rmw => {
                cpu.drive_read(cpu.ea, ReadKind::Data);
                cpu.phase = Phase::Instr(5);
            }
        },
        4 => {
            let value = cpu.dbus;
            cpu.apply_read_op(value);
            cpu.drive_fetch();
        }
        5 => {
            cpu.val = cpu.dbus;
            rmw_modify_cycle(cpu);
            cpu.phase = Phase::Instr(6);
        }
        6 => {
            let new = cpu.apply_rmw_op(cpu.val);
            cpu.drive_write(cpu.ea, new);
            cpu.phase = Phase::Instr(7);
        }
        _ => cpu.drive_fetch(),
    }
}

fn step_ind_x(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.lo as u16, ReadKind::Dummy);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.ia = cpu.lo.wrapping_add(cpu.x) as u16;
            cpu.drive_read(cpu.ia, ReadKind::Pointer);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.lo = cpu.dbus;
            // Pointer high byte wraps within the zero page.
            cpu.drive_read((cpu.ia + 1) & 0x00FF, ReadKind::Pointer);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.ea = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            drive_operand_access(cpu);
            cpu.phase = Phase::Instr(5);
        }
        5 => match cpu.op.class() {
            OpClass::Read => {
                let value = cpu.dbus;
                cpu.apply_read_op(value);
                cpu.drive_fetch();
            }
            _ => cpu.drive_fetch(),
        },
        _ => unreachable!(),
    }
}

fn step_ind_y(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.ia = cpu.dbus as u16;
            cpu.drive_read(cpu.ia, ReadKind::Pointer);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read((cpu.ia + 1) & 0x00FF, ReadKind::Pointer);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            let base = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.ea = base.wrapping_add(cpu.y as u16);
            let crossed = (cpu.ea ^ base) & 0xFF00 != 0;
            if cpu.op.class() == OpClass::Read && !crossed {
                cpu.drive_read(cpu.ea, ReadKind::Data);
                cpu.phase = Phase::Instr(5);
            } else {
                let fixup = (base & 0xFF00) | (cpu.ea & 0x00FF);
                cpu.drive_read(fixup, ReadKind::Dummy);
                cpu.phase = Phase::Instr(4);
            }
        }
        4 => {
            drive_operand_access(cpu);
            cpu.phase = Phase::Instr(if cpu.op.class() == OpClass::Read { 5 } else { 6 });
        }
        5 => {
            let value = cpu.dbus;
            cpu.apply_read_op(value);
            cpu.drive_fetch();
        }
        _ => cpu.drive_fetch(),
    }
}

fn step_zp_ind(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.ia = cpu.dbus as u16;
            cpu.drive_read(cpu.ia, ReadKind::Pointer);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read((cpu.ia + 1) & 0x00FF, ReadKind::Pointer);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.ea = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            drive_operand_access(cpu);
            cpu.phase = Phase::Instr(4);
        }
        4 => match cpu.op.class() {
            OpClass::Read => {
                let value = cpu.dbus;
                cpu.apply_read_op(value);
                cpu.drive_fetch();
            }
            _ => cpu.drive_fetch(),
        },
        _ => unreachable!(),
    }
}

fn step_branch(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            if cpu.branch_taken() {
                cpu.drive_read(cpu.pc, ReadKind::Dummy);
                cpu.phase = Phase::Instr(2);
            } else {
                cpu.drive_fetch();
            }
        }
        2 => {
            let target = cpu.pc.wrapping_add(cpu.lo as i8 as u16);
            if (target ^ cpu.pc) & 0xFF00 == 0 {
                cpu.pc = target;
                cpu.drive_fetch();
            } else {
                // Page crossed: one more cycle to fix the high byte.
                let partial = (cpu.pc & 0xFF00) | (target & 0x00FF);
                cpu.drive_read(partial, ReadKind::Dummy);
                cpu.ea = target;
                cpu.phase = Phase::Instr(3);
            }
        }
        3 => {
            cpu.pc = cpu.ea;
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_push(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            let value = match cpu.op {
                Op::Pha => cpu.a,
                Op::Php => cpu.p | StatusFlag::B as u8 | StatusFlag::U as u8,
                Op::Phx => cpu.x,
                Op::Phy => cpu.y,
                _ => unreachable!(),
            };
            cpu.drive_write(0x0100 | cpu.s as u16, value);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(2);
        }
        _ => cpu.drive_fetch(),
    }
}

fn step_pull(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Dummy);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            let value = cpu.dbus;
            match cpu.op {
                Op::Pla => {
                    cpu.a = value;
                    cpu.set_nz(value);
                }
                Op::Plp => {
                    cpu.p = (value | StatusFlag::U as u8) & !(StatusFlag::B as u8);
                }
                Op::Plx => {
                    cpu.x = value;
                    cpu.set_nz(value);
                }
                Op::Ply => {
                    cpu.y = value;
                    cpu.set_nz(value);
                }
                _ => unreachable!(),
            }
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_jsr(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Dummy);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.drive_write(0x0100 | cpu.s as u16, (cpu.pc >> 8) as u8);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.drive_write(0x0100 | cpu.s as u16, cpu.pc as u8);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.phase = Phase::Instr(5);
        }
        5 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.ea = cpu.pc;
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_rts(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Dummy);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.lo = cpu.dbus;
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_read(cpu.pc, ReadKind::Dummy);
            cpu.pc = cpu.pc.wrapping_add(1);
            cpu.phase = Phase::Instr(5);
        }
        _ => cpu.drive_fetch(),
    }
}

fn step_rti(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Dummy);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.p = (cpu.dbus | StatusFlag::U as u8) & !(StatusFlag::B as u8);
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.lo = cpu.dbus;
            cpu.s = cpu.s.wrapping_add(1);
            cpu.drive_read(0x0100 | cpu.s as u16, ReadKind::Data);
            cpu.phase = Phase::Instr(5);
        }
        5 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_brk(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.drive_write(0x0100 | cpu.s as u16, (cpu.pc >> 8) as u8);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.drive_write(0x0100 | cpu.s as u16, cpu.pc as u8);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            let pushed = cpu.p | StatusFlag::B as u8 | StatusFlag::U as u8;
            cpu.drive_write(0x0100 | cpu.s as u16, pushed);
            cpu.s = cpu.s.wrapping_sub(1);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.set_flag(StatusFlag::I, true);
            if cpu.variant() == CpuVariant::Cmos {
                cpu.set_flag(StatusFlag::D, false);
            }
            cpu.ia = 0xFFFE;
            cpu.drive_read(0xFFFE, ReadKind::Pointer);
            cpu.phase = Phase::Instr(5);
        }
        5 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(0xFFFF, ReadKind::Pointer);
            cpu.phase = Phase::Instr(6);
        }
        6 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_jmp_abs(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.ea = cpu.pc;
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}

fn step_jmp_ind(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.pc = cpu.pc.wrapping_add(1);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            cpu.ia = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_read(cpu.ia, ReadKind::Pointer);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.lo = cpu.dbus;
            if cpu.variant() == CpuVariant::Cmos {
                // Extra cycle; the high pointer byte read does not wrap.
                cpu.drive_read(cpu.ia, ReadKind::Dummy);
                cpu.phase = Phase::Instr(5);
            } else {
                // NMOS bug: the high pointer byte wraps within the page.
                let next = (cpu.ia & 0xFF00) | (cpu.ia.wrapping_add(1) & 0x00FF);
                cpu.drive_read(next, ReadKind::Pointer);
                cpu.phase = Phase::Instr(4);
            }
        }
        4 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_fetch();
        }
        5 => {
            cpu.drive_read(cpu.ia.wrapping_add(1), ReadKind::Pointer);
            cpu.phase = Phase::Instr(4);
        }
        _ => unreachable!(),
    }
}

fn step_jmp_ind_x(cpu: &mut Mos6502, n: u8) {
    match n {
        1 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.pc, ReadKind::Operand);
            cpu.pc = cpu.pc.wrapping_add(1);
            cpu.phase = Phase::Instr(2);
        }
        2 => {
            let base = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.ia = base.wrapping_add(cpu.x as u16);
            cpu.drive_read(cpu.pc, ReadKind::Dummy);
            cpu.phase = Phase::Instr(3);
        }
        3 => {
            cpu.drive_read(cpu.ia, ReadKind::Pointer);
            cpu.phase = Phase::Instr(4);
        }
        4 => {
            cpu.lo = cpu.dbus;
            cpu.drive_read(cpu.ia.wrapping_add(1), ReadKind::Pointer);
            cpu.phase = Phase::Instr(5);
        }
        5 => {
            cpu.pc = u16::from_le_bytes([cpu.lo, cpu.dbus]);
            cpu.drive_fetch();
        }
        _ => unreachable!(),
    }
}
