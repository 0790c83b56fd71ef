use super::CpuVariant;

/// Instruction operations. Flow-control instructions carry their own
/// dedicated sequences and appear here mostly for trace/debug display.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    // Loads / stores
    Lda,
    Ldx,
    Ldy,
    Sta,
    Stx,
    Sty,
    Stz, // CMOS

    // ALU
    Adc,
    Sbc,
    And,
    Ora,
    Eor,
    Cmp,
    Cpx,
    Cpy,
    Bit,
    BitImm, // CMOS BIT #imm: Z only

    // Read-modify-write
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    Tsb, // CMOS
    Trb, // CMOS

    // Implied
    Clc,
    Sec,
    Cli,
    Sei,
    Clv,
    Cld,
    Sed,
    Tax,
    Tay,
    Txa,
    Tya,
    Tsx,
    Txs,
    Inx,
    Iny,
    Dex,
    Dey,
    Nop,

    // Branches
    Bpl,
    Bmi,
    Bvc,
    Bvs,
    Bcc,
    Bcs,
    Bne,
    Beq,
    Bra, // CMOS

    // Stack
    Pha,
    Php,
    Phx, // CMOS
    Phy, // CMOS
    Pla,
    Plp,
    Plx, // CMOS
    Ply, // CMOS

    // Flow
    Jsr,
    Rts,
    Rti,
    Brk,
    Jmp,
}

/// Memory-access shape of an operation, used by the addressing-mode
/// sequences to pick read, write or read-modify-write cycle patterns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum OpClass {
    Read,
    Write,
    Rmw,
}

impl Op {
    pub(crate) fn class(self) -> OpClass {
        match self {
            Op::Sta | Op::Stx | Op::Sty | Op::Stz => OpClass::Write,
            Op::Asl | Op::Lsr | Op::Rol | Op::Ror | Op::Inc | Op::Dec | Op::Tsb | Op::Trb => {
                OpClass::Rmw
            }
            _ => OpClass::Read,
        }
    }
}

/// Addressing modes plus the dedicated flow sequences.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Imp,
    Acc,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbsX,
    AbsY,
    IndX,
    IndY,
    ZpInd, // CMOS (zp)
    Rel,
    Push,
    Pull,
    Jsr,
    Rts,
    Rti,
    Brk,
    JmpAbs,
    JmpInd,
    JmpIndX, // CMOS JMP (abs,X)
}

/// Decode one opcode. Undocumented NMOS opcodes and unused CMOS slots
/// execute as single-byte NOPs.
pub(crate) fn decode(opcode: u8, variant: CpuVariant) -> (Op, Mode) {
    let cmos = variant == CpuVariant::Cmos;

    // CMOS-only opcodes first; on NMOS these fall through to NOP (the
    // undocumented-opcode behaviour is not modelled).
    if cmos {
        match opcode {
            0x80 => return (Op::Bra, Mode::Rel),
            0x89 => return (Op::BitImm, Mode::Imm),
            0x34 => return (Op::Bit, Mode::ZpX),
            0x3C => return (Op::Bit, Mode::AbsX),
            0x64 => return (Op::Stz, Mode::Zp),
            0x74 => return (Op::Stz, Mode::ZpX),
            0x9C => return (Op::Stz, Mode::Abs),
            0x9E => return (Op::Stz, Mode::AbsX),
            0x04 => return (Op::Tsb, Mode::Zp),
            0x0C => return (Op::Tsb, Mode::Abs),
            0x14 => return (Op::Trb, Mode::Zp),
            0x1C => return (Op::Trb, Mode::Abs),
            0x1A => return (Op::Inc, Mode::Acc),
            0x3A => return (Op::Dec, Mode::Acc),
            0xDA => return (Op::Phx, Mode::Push),
            0x5A => return (Op::Phy, Mode::Push),
            0xFA => return (Op::Plx, Mode::Pull),
            0x7A => return (Op::Ply, Mode::Pull),
            0x7C => return (Op::Jmp, Mode::JmpIndX),
            0x12 => return (Op::Ora, Mode::ZpInd),
            0x32 => return (Op::And, Mode::ZpInd),
            0x52 => return (Op::Eor, Mode::ZpInd),
            0x72 => return (Op::Adc, Mode::ZpInd),
            0x92 => return (Op::Sta, Mode::ZpInd),
            0xB2 => return (Op::Lda, Mode::ZpInd),
            0xD2 => return (Op::Cmp, Mode::ZpInd),
            0xF2 => return (Op::Sbc, Mode::ZpInd),
            _ => {}
        }
    }

    match opcode {
        // --- LDA ---
        0xA9 => (Op::Lda, Mode::Imm),
        0xA5 => (Op::Lda, Mode::Zp),
        0xB5 => (Op::Lda, Mode::ZpX),
        0xAD => (Op::Lda, Mode::Abs),
        0xBD => (Op::Lda, Mode::AbsX),
        0xB9 => (Op::Lda, Mode::AbsY),
        0xA1 => (Op::Lda, Mode::IndX),
        0xB1 => (Op::Lda, Mode::IndY),

        // --- LDX ---
        0xA2 => (Op::Ldx, Mode::Imm),
        0xA6 => (Op::Ldx, Mode::Zp),
        0xB6 => (Op::Ldx, Mode::ZpY),
        0xAE => (Op::Ldx, Mode::Abs),
        0xBE => (Op::Ldx, Mode::AbsY),

        // --- LDY ---
        0xA0 => (Op::Ldy, Mode::Imm),
        0xA4 => (Op::Ldy, Mode::Zp),
        0xB4 => (Op::Ldy, Mode::ZpX),
        0xAC => (Op::Ldy, Mode::Abs),
        0xBC => (Op::Ldy, Mode::AbsX),

        // --- STA ---
        0x85 => (Op::Sta, Mode::Zp),
        0x95 => (Op::Sta, Mode::ZpX),
        0x8D => (Op::Sta, Mode::Abs),
        0x9D => (Op::Sta, Mode::AbsX),
        0x99 => (Op::Sta, Mode::AbsY),
        0x81 => (Op::Sta, Mode::IndX),
        0x91 => (Op::Sta, Mode::IndY),

        // --- STX / STY ---
        0x86 => (Op::Stx, Mode::Zp),
        0x96 => (Op::Stx, Mode::ZpY),
        0x8E => (Op::Stx, Mode::Abs),
        0x84 => (Op::Sty, Mode::Zp),
        0x94 => (Op::Sty, Mode::ZpX),
        0x8C => (Op::Sty, Mode::Abs),

        // --- ADC ---
        0x69 => (Op::Adc, Mode::Imm),
        0x65 => (Op::Adc, Mode::Zp),
        0x75 => (Op::Adc, Mode::ZpX),
        0x6D => (Op::Adc, Mode::Abs),
        0x7D => (Op::Adc, Mode::AbsX),
        0x79 => (Op::Adc, Mode::AbsY),
        0x61 => (Op::Adc, Mode::IndX),
        0x71 => (Op::Adc, Mode::IndY),

        // --- SBC ---
        0xE9 => (Op::Sbc, Mode::Imm),
        0xE5 => (Op::Sbc, Mode::Zp),
        0xF5 => (Op::Sbc, Mode::ZpX),
        0xED => (Op::Sbc, Mode::Abs),
        0xFD => (Op::Sbc, Mode::AbsX),
        0xF9 => (Op::Sbc, Mode::AbsY),
        0xE1 => (Op::Sbc, Mode::IndX),
        0xF1 => (Op::Sbc, Mode::IndY),

        // --- CMP ---
        0xC9 => (Op::Cmp, Mode::Imm),
        0xC5 => (Op::Cmp, Mode::Zp),
        0xD5 => (Op::Cmp, Mode::ZpX),
        0xCD => (Op::Cmp, Mode::Abs),
        0xDD => (Op::Cmp, Mode::AbsX),
        0xD9 => (Op::Cmp, Mode::AbsY),
        0xC1 => (Op::Cmp, Mode::IndX),
        0xD1 => (Op::Cmp, Mode::IndY),

        // --- CPX / CPY ---
        0xE0 => (Op::Cpx, Mode::Imm),
        0xE4 => (Op::Cpx, Mode::Zp),
        0xEC => (Op::Cpx, Mode::Abs),
        0xC0 => (Op::Cpy, Mode::Imm),
        0xC4 => (Op::Cpy, Mode::Zp),
        0xCC => (Op::Cpy, Mode::Abs),

        // --- AND ---
        0x29 => (Op::And, Mode::Imm),
        0x25 => (Op::And, Mode::Zp),
        0x35 => (Op::And, Mode::ZpX),
        0x2D => (Op::And, Mode::Abs),
        0x3D => (Op::And, Mode::AbsX),
        0x39 => (Op::And, Mode::AbsY),
        0x21 => (Op::And, Mode::IndX),
        0x31 => (Op::And, Mode::IndY),

        // --- ORA ---
        0x09 => (Op::Ora, Mode::Imm),
        0x05 => (Op::Ora, Mode::Zp),
        0x15 => (Op::Ora, Mode::ZpX),
        0x0D => (Op::Ora, Mode::Abs),
        0x1D => (Op::Ora, Mode::AbsX),
        0x19 => (Op::Ora, Mode::AbsY),
        0x01 => (Op::Ora, Mode::IndX),
        0x11 => (Op::Ora, Mode::IndY),

        // --- EOR ---
        0x49 => (Op::Eor, Mode::Imm),
        0x45 => (Op::Eor, Mode::Zp),
        0x55 => (Op::Eor, Mode::ZpX),
        0x4D => (Op::Eor, Mode::Abs),
        0x5D => (Op::Eor, Mode::AbsX),
        0x59 => (Op::Eor, Mode::AbsY),
        0x41 => (Op::Eor, Mode::IndX),
        0x51 => (Op::Eor, Mode::IndY),

        // --- BIT ---
        0x24 => (Op::Bit, Mode::Zp),
        0x2C => (Op::Bit, Mode::Abs),

        // --- Shifts / rotates ---
        0x0A => (Op::Asl, Mode::Acc),
        0x06 => (Op::Asl, Mode::Zp),
        0x16 => (Op::Asl, Mode::ZpX),
        0x0E => (Op::Asl, Mode::Abs),
        0x1E => (Op::Asl, Mode::AbsX),
        0x4A => (Op::Lsr, Mode::Acc),
        0x46 => (Op::Lsr, Mode::Zp),
        0x56 => (Op::Lsr, Mode::ZpX),
        0x4E => (Op::Lsr, Mode::Abs),
        0x5E => (Op::Lsr, Mode::AbsX),
        0x2A => (Op::Rol, Mode::Acc),
        0x26 => (Op::Rol, Mode::Zp),
        0x36 => (Op::Rol, Mode::ZpX),
        0x2E => (Op::Rol, Mode::Abs),
        0x3E => (Op::Rol, Mode::AbsX),
        0x6A => (Op::Ror, Mode::Acc),
        0x66 => (Op::Ror, Mode::Zp),
        0x76 => (Op::Ror, Mode::ZpX),
        0x6E => (Op::Ror, Mode::Abs),
        0x7E => (Op::Ror, Mode::AbsX),

        // --- INC / DEC ---
        0xE6 => (Op::Inc, Mode::Zp),
        0xF6 => (Op::Inc, Mode::ZpX),
        0xEE => (Op::Inc, Mode::Abs),
        0xFE => (Op::Inc, Mode::AbsX),
        0xC6 => (Op::Dec, Mode::Zp),
        0xD6 => (Op::Dec, Mode::ZpX),
        0xCE => (Op::Dec, Mode::Abs),
        0xDE => (Op::Dec, Mode::AbsX),

        // --- Flag instructions ---
        0x18 => (Op::Clc, Mode::Imp),
        0x38 => (Op::Sec, Mode::Imp),
        0x58 => (Op::Cli, Mode::Imp),
        0x78 => (Op::Sei, Mode::Imp),
        0xB8 => (Op::Clv, Mode::Imp),
        0xD8 => (Op::Cld, Mode::Imp),
        0xF8 => (Op::Sed, Mode::Imp),

        // --- Transfers ---
        0xAA => (Op::Tax, Mode::Imp),
        0xA8 => (Op::Tay, Mode::Imp),
        0x8A => (Op::Txa, Mode::Imp),
        0x98 => (Op::Tya, Mode::Imp),
        0xBA => (Op::Tsx, Mode::Imp),
        0x9A => (Op::Txs, Mode::Imp),

        // --- Register inc/dec ---
        0xE8 => (Op::Inx, Mode::Imp),
        0xC8 => (Op::Iny, Mode::Imp),
        0xCA => (Op::Dex, Mode::Imp),
        0x88 => (Op::Dey, Mode::Imp),

        // --- NOP ---
        0xEA => (Op::Nop, Mode::Imp),

        // --- Branches ---
        0x10 => (Op::Bpl, Mode::Rel),
        0x30 => (Op::Bmi, Mode::Rel),
        0x50 => (Op::Bvc, Mode::Rel),
        0x70 => (Op::Bvs, Mode::Rel),
        0x90 => (Op::Bcc, Mode::Rel),
        0xB0 => (Op::Bcs, Mode::Rel),
        0xD0 => (Op::Bne, Mode::Rel),
        0xF0 => (Op::Beq, Mode::Rel),

        // --- Jumps / subroutines ---
        0x4C => (Op::Jmp, Mode::JmpAbs),
        0x6C => (Op::Jmp, Mode::JmpInd),
        0x20 => (Op::Jsr, Mode::Jsr),
        0x60 => (Op::Rts, Mode::Rts),
        0x40 => (Op::Rti, Mode::Rti),

        // --- Stack ---
        0x48 => (Op::Pha, Mode::Push),
        0x08 => (Op::Php, Mode::Push),
        0x68 => (Op::Pla, Mode::Pull),
        0x28 => (Op::Plp, Mode::Pull),

        // --- BRK ---
        0x00 => (Op::Brk, Mode::Brk),

        // Undocumented: execute as a NOP of the aliased length.
        _ => undocumented(opcode, variant),
    }
}

/// Undocumented opcodes execute as NOPs sized by the addressing mode
/// their bit pattern aliases, so the PC stays in step with code that
/// wanders into them. Their actual side effects are not modelled.
fn undocumented(opcode: u8, variant: CpuVariant) -> (Op, Mode) {
    if variant == CpuVariant::Cmos {
        // 65C12 undefined opcodes read as one-byte NOPs.
        return (Op::Nop, Mode::Imp);
    }

    let mode = if opcode & 0x03 == 0x03 {
        // The illegal cc=11 column borrows the cc=01 column's
        // addressing pattern (the zp,Y/abs,Y variants share lengths
        // with their X-indexed rows).
        match opcode >> 2 & 0x07 {
            0 => Mode::IndX,
            1 => Mode::Zp,
            2 => Mode::Imm,
            3 => Mode::Abs,
            4 => Mode::IndY,
            5 => Mode::ZpX,
            6 => Mode::AbsY,
            _ => Mode::AbsX,
        }
    } else {
        match opcode {
            // Two-byte immediate forms.
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => Mode::Imm,
            // Two-byte zero page forms.
            0x04 | 0x44 | 0x64 => Mode::Zp,
            0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => Mode::ZpX,
            // Three-byte absolute forms.
            0x0C => Mode::Abs,
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => Mode::AbsX,
            // The x2 jam column and the leftover implied slots.
            _ => Mode::Imp,
        }
    };

    (Op::Nop, mode)
}
