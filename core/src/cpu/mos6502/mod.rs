mod alu;
mod decode;
mod sequences;

use crate::cpu::state::CpuSnapshot;

pub(crate) use decode::{Mode, Op};

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum StatusFlag {
    C = 0x01, // Carry
    Z = 0x02, // Zero
    I = 0x04, // Interrupt Disable
    D = 0x08, // Decimal
    B = 0x10, // Break
    U = 0x20, // Unused (always 1)
    V = 0x40, // Overflow
    N = 0x80, // Negative
}

/// NMOS 6502 (B, B+) or CMOS 65C12 (Master 128) personality.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CpuVariant {
    Nmos,
    Cmos,
}

/// Classification of a read cycle, for the debugger and the hack paths.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadKind {
    /// Opcode fetch.
    Opcode,
    /// Opcode fetch hijacked by IRQ/NMI; the fetched byte is discarded and
    /// the interrupt sequence runs instead.
    Interrupt,
    /// Instruction operand byte.
    Operand,
    /// Indirect pointer or vector byte.
    Pointer,
    /// Actual data load (the reads that data-read breakpoints consider).
    Data,
    /// Internal cycle whose fetched byte is discarded.
    Dummy,
}

/// What the CPU drove onto the bus this cycle. For a read, the owner must
/// deposit the byte in `dbus` before the next `step`; for a write it must
/// consume `dbus`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BusAccess {
    Read(ReadKind),
    Write,
}

impl BusAccess {
    #[inline]
    pub fn is_read(self) -> bool {
        matches!(self, BusAccess::Read(_))
    }

    /// True for both plain and interrupt-hijacked opcode fetches.
    #[inline]
    pub fn is_opcode_fetch(self) -> bool {
        matches!(
            self,
            BusAccess::Read(ReadKind::Opcode) | BusAccess::Read(ReadKind::Interrupt)
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Reset sequence cycle n was driven.
    Reset(u8),
    /// An opcode fetch (possibly hijacked) was driven.
    Fetch,
    /// Instruction cycle n was driven.
    Instr(u8),
    /// Hardware interrupt sequence cycle n was driven.
    Interrupt(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum IntSource {
    None,
    Irq,
    Nmi,
}

const RESET_VECTOR: u16 = 0xFFFC;
const NMI_VECTOR: u16 = 0xFFFA;
const IRQ_VECTOR: u16 = 0xFFFE;
const STACK_BASE: u16 = 0x0100;

/// Cycle-stepped 6502 with an externally serviced data bus.
///
/// Each `step` advances one clock cycle: the CPU consumes the byte the
/// owner left in `dbus` for the previous read (if any), advances its
/// internal sequence, and drives `abus`/`access` (plus `dbus` for writes)
/// for the new cycle. The owner services the bus between steps, which is
/// what lets the machine route paging, MMIO dispatch and 1 MHz stretching
/// outside the CPU, and lets the hack paths rewrite a fetched opcode
/// before it executes.
#[derive(Clone, Debug, PartialEq)]
pub struct Mos6502 {
    // Registers
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub pc: u16,

    // Bus pins
    pub abus: u16,
    pub dbus: u8,
    pub access: BusAccess,

    /// Opcode currently executing.
    pub opcode: u8,
    /// Address the current opcode was fetched from.
    pub opcode_pc: u16,
    /// Effective address of the last memory operand.
    pub ea: u16,
    /// Indirect pointer address used by the indirect addressing modes.
    pub ia: u16,

    variant: CpuVariant,
    pub(crate) phase: Phase,
    pub(crate) op: Op,
    pub(crate) mode: Mode,
    pub(crate) lo: u8,
    pub(crate) val: u8,

    // Interrupt inputs: one bit per device, aggregated.
    irq_lines: u32,
    nmi_lines: u32,
    nmi_prev: bool,
    nmi_latch: bool,
    pub(crate) int_source: IntSource,

    halted: bool,
}

impl Mos6502 {
    pub fn new(variant: CpuVariant) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFD,
            p: StatusFlag::I as u8 | StatusFlag::U as u8,
            pc: 0,
            abus: 0,
            dbus: 0,
            access: BusAccess::Read(ReadKind::Dummy),
            opcode: 0,
            opcode_pc: 0,
            ea: 0,
            ia: 0,
            variant,
            phase: Phase::Reset(0),
            op: Op::Nop,
            mode: Mode::Imp,
            lo: 0,
            val: 0,
            irq_lines: 0,
            nmi_lines: 0,
            nmi_prev: false,
            nmi_latch: false,
            int_source: IntSource::None,
            halted: false,
        }
    }

    pub fn variant(&self) -> CpuVariant {
        self.variant
    }

    /// Set or clear one device's level on the aggregated IRQ input.
    /// `device` is a single-bit mask identifying the source.
    pub fn set_irq(&mut self, device: u32, level: bool) {
        if level {
            self.irq_lines |= device;
        } else {
            self.irq_lines &= !device;
        }
    }

    /// Set or clear one device's level on the aggregated NMI input.
    /// The NMI itself is edge-triggered on the aggregate.
    pub fn set_nmi(&mut self, device: u32, level: bool) {
        if level {
            self.nmi_lines |= device;
        } else {
            self.nmi_lines &= !device;
        }
    }

    /// Hold the CPU: `step` becomes a no-op until `reset`. Used for the
    /// Break key, which ties the 6502 reset line low while held.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Begin the reset sequence: the next two cycles fetch the reset
    /// vector, then execution continues from there.
    pub fn reset(&mut self) {
        self.halted = false;
        self.p |= StatusFlag::I as u8 | StatusFlag::U as u8;
        if self.variant == CpuVariant::Cmos {
            self.p &= !(StatusFlag::D as u8);
        }
        self.int_source = IntSource::None;
        self.nmi_latch = false;
        self.phase = Phase::Reset(0);
    }

    /// True when the access just driven is an opcode fetch whose byte will
    /// be consumed by the next `step`. The hack paths key off this window:
    /// `pc` still holds the fetch address, and overwriting `dbus` replaces
    /// the instruction about to execute.
    #[inline]
    pub fn is_about_to_execute(&self) -> bool {
        !self.halted && matches!(self.access, BusAccess::Read(ReadKind::Opcode))
    }

    /// True when the access just driven is an interrupt-hijacked fetch and
    /// the in-flight interrupt is an IRQ rather than an NMI.
    #[inline]
    pub fn is_probably_irq(&self) -> bool {
        matches!(self.access, BusAccess::Read(ReadKind::Interrupt))
            && self.int_source == IntSource::Irq
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            a: self.a,
            x: self.x,
            y: self.y,
            s: self.s,
            p: self.p,
            pc: self.pc,
        }
    }

    /// Advance one clock cycle.
    pub fn step(&mut self) {
        if self.halted {
            return;
        }

        match self.phase {
            Phase::Reset(n) => self.step_reset(n),
            Phase::Fetch => self.step_fetch(),
            Phase::Instr(n) => sequences::step_instr(self, n),
            Phase::Interrupt(n) => self.step_interrupt(n),
        }
    }

    fn step_reset(&mut self, n: u8) {
        match n {
            0 => {
                self.drive_read(RESET_VECTOR, ReadKind::Pointer);
                self.phase = Phase::Reset(1);
            }
            1 => {
                self.lo = self.dbus;
                self.drive_read(RESET_VECTOR.wrapping_add(1), ReadKind::Pointer);
                self.phase = Phase::Reset(2);
            }
            2 => {
                self.pc = u16::from_le_bytes([self.lo, self.dbus]);
                self.drive_fetch();
            }
            _ => unreachable!(),
        }
    }

    fn step_fetch(&mut self) {
        if matches!(self.access, BusAccess::Read(ReadKind::Interrupt)) {
            // Hijacked fetch: discard the byte, run the interrupt sequence.
            self.drive_read(self.pc, ReadKind::Dummy);
            self.phase = Phase::Interrupt(0);
            return;
        }

        self.opcode = self.dbus;
        self.opcode_pc = self.abus;
        self.pc = self.pc.wrapping_add(1);

        let (op, mode) = decode::decode(self.opcode, self.variant);
        self.op = op;
        self.mode = mode;
        sequences::begin_instr(self);
    }

    /// 7-cycle hardware interrupt response. Cycle 0 (the dummy operand
    /// read) was driven by `step_fetch`; `pc` still points at the
    /// interrupted instruction.
    fn step_interrupt(&mut self, n: u8) {
        match n {
            0 => {
                self.drive_write(STACK_BASE | self.s as u16, (self.pc >> 8) as u8);
                self.s = self.s.wrapping_sub(1);
                self.phase = Phase::Interrupt(1);
            }
            1 => {
                self.drive_write(STACK_BASE | self.s as u16, self.pc as u8);
                self.s = self.s.wrapping_sub(1);
                self.phase = Phase::Interrupt(2);
            }
            2 => {
                let pushed = (self.p | StatusFlag::U as u8) & !(StatusFlag::B as u8);
                self.drive_write(STACK_BASE | self.s as u16, pushed);
                self.s = self.s.wrapping_sub(1);
                self.phase = Phase::Interrupt(3);
            }
            3 => {
                self.p |= StatusFlag::I as u8;
                if self.variant == CpuVariant::Cmos {
                    self.p &= !(StatusFlag::D as u8);
                }
                let vector = if self.int_source == IntSource::Nmi {
                    self.nmi_latch = false;
                    NMI_VECTOR
                } else {
                    IRQ_VECTOR
                };
                self.ia = vector;
                self.drive_read(vector, ReadKind::Pointer);
                self.phase = Phase::Interrupt(4);
            }
            4 => {
                self.lo = self.dbus;
                self.drive_read(self.ia.wrapping_add(1), ReadKind::Pointer);
                self.phase = Phase::Interrupt(5);
            }
            5 => {
                self.pc = u16::from_le_bytes([self.lo, self.dbus]);
                self.int_source = IntSource::None;
                self.drive_fetch();
            }
            _ => unreachable!(),
        }
    }

    /// Drive the next opcode fetch, polling the interrupt inputs. A
    /// pending NMI edge or unmasked IRQ level turns the fetch into an
    /// interrupt hijack.
    pub(crate) fn drive_fetch(&mut self) {
        let nmi = self.nmi_lines != 0;
        if nmi && !self.nmi_prev {
            self.nmi_latch = true;
        }
        self.nmi_prev = nmi;

        self.abus = self.pc;
        if self.nmi_latch {
            self.int_source = IntSource::Nmi;
            self.access = BusAccess::Read(ReadKind::Interrupt);
        } else if self.irq_lines != 0 && self.p & StatusFlag::I as u8 == 0 {
            self.int_source = IntSource::Irq;
            self.access = BusAccess::Read(ReadKind::Interrupt);
        } else {
            self.access = BusAccess::Read(ReadKind::Opcode);
        }
        self.phase = Phase::Fetch;
    }

    #[inline]
    pub(crate) fn drive_read(&mut self, addr: u16, kind: ReadKind) {
        self.abus = addr;
        self.access = BusAccess::Read(kind);
    }

    #[inline]
    pub(crate) fn drive_write(&mut self, addr: u16, value: u8) {
        self.abus = addr;
        self.dbus = value;
        self.access = BusAccess::Write;
    }

    #[inline]
    pub(crate) fn flag(&self, flag: StatusFlag) -> bool {
        self.p & flag as u8 != 0
    }

    #[inline]
    pub(crate) fn set_flag(&mut self, flag: StatusFlag, set: bool) {
        if set {
            self.p |= flag as u8;
        } else {
            self.p &= !(flag as u8);
        }
    }
}
