use super::decode::Op;
use super::{CpuVariant, Mos6502, StatusFlag};

impl Mos6502 {
    // ---- Flag helpers ----

    /// Set N, Z flags from result (for loads, transfers, logical ops).
    #[inline]
    pub(crate) fn set_nz(&mut self, result: u8) {
        self.set_flag(StatusFlag::N, result & 0x80 != 0);
        self.set_flag(StatusFlag::Z, result == 0);
    }

    // ---- ALU operation helpers ----

    /// ADC. Sets N, Z, C, V. Handles BCD mode.
    /// Binary: A = A + M + C.
    /// NMOS BCD: N,V from the intermediate sum, Z from the binary result.
    /// CMOS BCD: all flags from the corrected result.
    fn perform_adc(&mut self, operand: u8) {
        let a = self.a;
        let carry_in: u16 = if self.flag(StatusFlag::C) { 1 } else { 0 };

        if self.flag(StatusFlag::D) {
            // Correct each nibble as it passes nine.
            let mut low = (a & 0x0F) as u16 + (operand & 0x0F) as u16 + carry_in;
            if low >= 0x0A {
                low = ((low + 0x06) & 0x0F) + 0x10;
            }
            let mut result = (a & 0xF0) as u16 + (operand & 0xF0) as u16 + low;

            // N and V reflect the sum before the high nibble correction.
            self.set_flag(StatusFlag::N, result & 0x80 != 0);
            self.set_flag(
                StatusFlag::V,
                (!(a as u16 ^ operand as u16) & (a as u16 ^ result)) & 0x80 != 0,
            );

            if result >= 0xA0 {
                result += 0x60;
            }
            self.set_flag(StatusFlag::C, result >= 0x100);
            self.a = result as u8;

            match self.variant() {
                // The 65C12 fixes N and Z to track the corrected result.
                CpuVariant::Cmos => self.set_nz(self.a),
                // NMOS leaves Z tracking the plain binary sum.
                CpuVariant::Nmos => {
                    let binary = a as u16 + operand as u16 + carry_in;
                    self.set_flag(StatusFlag::Z, binary & 0xFF == 0);
                }
            }
        } else {
            let sum = a as u16 + operand as u16 + carry_in;
            let result = sum as u8;
            self.set_flag(StatusFlag::C, sum > 0xFF);
            self.set_flag(StatusFlag::V, ((!(a ^ operand)) & (a ^ result)) & 0x80 != 0);
            self.a = result;
            self.set_nz(result);
        }
    }

    /// SBC. Sets N, Z, C, V. Handles BCD mode.
    /// Binary: A = A - M - !C (computed as A + ~M + C).
    /// NMOS BCD: all flags from the binary result; only A is corrected.
    fn perform_sbc(&mut self, operand: u8) {
        let a = self.a;
        let carry_in: u16 = if self.flag(StatusFlag::C) { 1 } else { 0 };

        let diff = a as u16 + (operand ^ 0xFF) as u16 + carry_in;
        let result = diff as u8;

        self.set_flag(StatusFlag::C, diff > 0xFF);
        self.set_flag(StatusFlag::V, ((a ^ operand) & (a ^ result)) & 0x80 != 0);
        self.set_nz(result);

        if self.flag(StatusFlag::D) {
            let borrow = 1 - carry_in;
            let mut lo = (a & 0x0F) as i16 - (operand & 0x0F) as i16 - borrow as i16;
            let lo_borrow = lo < 0;
            if lo < 0 {
                lo -= 6;
            }
            let mut hi = (a >> 4) as i16 - (operand >> 4) as i16 - if lo_borrow { 1 } else { 0 };
            if hi < 0 {
                hi -= 6;
            }
            self.a = ((hi as u8 & 0x0F) << 4) | (lo as u8 & 0x0F);
            if self.variant() == CpuVariant::Cmos {
                self.set_nz(self.a);
            }
        } else {
            self.a = result;
        }
    }

    /// Compare (CMP/CPX/CPY). Sets N, Z, C only.
    fn perform_compare(&mut self, register: u8, operand: u8) {
        let result = register.wrapping_sub(operand);
        self.set_flag(StatusFlag::C, register >= operand);
        self.set_nz(result);
    }

    /// BIT. Z from A & M, N and V copied from M bits 7 and 6.
    fn perform_bit(&mut self, operand: u8) {
        self.set_flag(StatusFlag::Z, self.a & operand == 0);
        self.set_flag(StatusFlag::N, operand & 0x80 != 0);
        self.set_flag(StatusFlag::V, operand & 0x40 != 0);
    }

    // ---- Dispatch ----

    /// Apply a read-class operation to the fetched operand byte.
    pub(crate) fn apply_read_op(&mut self, value: u8) {
        match self.op {
            Op::Lda => {
                self.a = value;
                self.set_nz(value);
            }
            Op::Ldx => {
                self.x = value;
                self.set_nz(value);
            }
            Op::Ldy => {
                self.y = value;
                self.set_nz(value);
            }
            Op::Adc => self.perform_adc(value),
            Op::Sbc => self.perform_sbc(value),
            Op::And => {
                self.a &= value;
                self.set_nz(self.a);
            }
            Op::Ora => {
                self.a |= value;
                self.set_nz(self.a);
            }
            Op::Eor => {
                self.a ^= value;
                self.set_nz(self.a);
            }
            Op::Cmp => self.perform_compare(self.a, value),
            Op::Cpx => self.perform_compare(self.x, value),
            Op::Cpy => self.perform_compare(self.y, value),
            Op::Bit => self.perform_bit(value),
            // CMOS BIT #imm affects Z only.
            Op::BitImm => self.set_flag(StatusFlag::Z, self.a & value == 0),
            // Undocumented opcodes decoded as NOPs with an operand.
            _ => {}
        }
    }

    /// Value a write-class operation drives onto the bus.
    pub(crate) fn store_value(&self) -> u8 {
        match self.op {
            Op::Sta => self.a,
            Op::Stx => self.x,
            Op::Sty => self.y,
            Op::Stz => 0,
            _ => unreachable!(),
        }
    }

    /// Apply a read-modify-write operation, returning the new byte.
    pub(crate) fn apply_rmw_op(&mut self, value: u8) -> u8 {
        match self.op {
            Op::Asl => {
                let result = value << 1;
                self.set_flag(StatusFlag::C, value & 0x80 != 0);
                self.set_nz(result);
                result
            }
            Op::Lsr => {
                let result = value >> 1;
                self.set_flag(StatusFlag::C, value & 0x01 != 0);
                self.set_nz(result);
                result
            }
            Op::Rol => {
                let carry_in = if self.flag(StatusFlag::C) { 1 } else { 0 };
                let result = (value << 1) | carry_in;
                self.set_flag(StatusFlag::C, value & 0x80 != 0);
                self.set_nz(result);
                result
            }
            Op::Ror => {
                let carry_in = if self.flag(StatusFlag::C) { 0x80 } else { 0 };
                let result = (value >> 1) | carry_in;
                self.set_flag(StatusFlag::C, value & 0x01 != 0);
                self.set_nz(result);
                result
            }
            Op::Inc => {
                let result = value.wrapping_add(1);
                self.set_nz(result);
                result
            }
            Op::Dec => {
                let result = value.wrapping_sub(1);
                self.set_nz(result);
                result
            }
            Op::Tsb => {
                self.set_flag(StatusFlag::Z, self.a & value == 0);
                value | self.a
            }
            Op::Trb => {
                self.set_flag(StatusFlag::Z, self.a & value == 0);
                value & !self.a
            }
            _ => unreachable!(),
        }
    }

    /// Apply an implied (or accumulator-mode) operation.
    pub(crate) fn apply_implied_op(&mut self) {
        match self.op {
            Op::Clc => self.set_flag(StatusFlag::C, false),
            Op::Sec => self.set_flag(StatusFlag::C, true),
            Op::Cli => self.set_flag(StatusFlag::I, false),
            Op::Sei => self.set_flag(StatusFlag::I, true),
            Op::Clv => self.set_flag(StatusFlag::V, false),
            Op::Cld => self.set_flag(StatusFlag::D, false),
            Op::Sed => self.set_flag(StatusFlag::D, true),
            Op::Tax => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.set_nz(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            Op::Tsx => {
                self.x = self.s;
                self.set_nz(self.x);
            }
            // TXS does not set flags.
            Op::Txs => self.s = self.x,
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }
            Op::Nop => {}
            // Accumulator-mode shifts and CMOS INC A/DEC A.
            Op::Asl | Op::Lsr | Op::Rol | Op::Ror | Op::Inc | Op::Dec => {
                let a = self.a;
                self.a = self.apply_rmw_op(a);
            }
            _ => unreachable!(),
        }
    }

    /// Branch condition for the relative-mode sequence.
    pub(crate) fn branch_taken(&self) -> bool {
        match self.op {
            Op::Bpl => !self.flag(StatusFlag::N),
            Op::Bmi => self.flag(StatusFlag::N),
            Op::Bvc => !self.flag(StatusFlag::V),
            Op::Bvs => self.flag(StatusFlag::V),
            Op::Bcc => !self.flag(StatusFlag::C),
            Op::Bcs => self.flag(StatusFlag::C),
            Op::Bne => !self.flag(StatusFlag::Z),
            Op::Beq => self.flag(StatusFlag::Z),
            Op::Bra => true,
            _ => unreachable!(),
        }
    }
}
