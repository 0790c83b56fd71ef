#![allow(dead_code)]

use owlet_core::cpu::mos6502::{BusAccess, CpuVariant, Mos6502};

/// Minimal test harness: the CPU plus a flat 64K memory that services
/// the bus after every step, the way a machine would.
pub struct TestRig {
    pub cpu: Mos6502,
    pub memory: [u8; 0x10000],
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_variant(CpuVariant::Nmos)
    }

    pub fn with_variant(variant: CpuVariant) -> Self {
        Self { cpu: Mos6502::new(variant), memory: [0; 0x10000] }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.memory[start..start + data.len()].copy_from_slice(data);
    }

    /// One clock cycle: step the CPU, then service whatever it drove.
    pub fn step(&mut self) {
        self.cpu.step();
        match self.cpu.access {
            BusAccess::Read(_) => self.cpu.dbus = self.memory[self.cpu.abus as usize],
            BusAccess::Write => self.memory[self.cpu.abus as usize] = self.cpu.dbus,
        }
    }

    pub fn run(&mut self, cycles: usize) {
        for _ in 0..cycles {
            self.step();
        }
    }

    /// Point the reset vector at `pc` and run the reset sequence up to
    /// (and including) the first opcode fetch. Instruction cycle counts
    /// measured from here are exact: one instruction takes exactly as
    /// many `step` calls as its documented cycle count.
    pub fn boot_at(&mut self, pc: u16) {
        self.memory[0xFFFC] = pc as u8;
        self.memory[0xFFFD] = (pc >> 8) as u8;
        self.cpu.reset();
        self.step(); // vector low
        self.step(); // vector high
        self.step(); // first opcode fetch
        assert!(self.cpu.is_about_to_execute());
    }

    /// Run to the next opcode fetch (which may be an interrupt-hijacked
    /// one). Returns the cycle count of the instruction that just
    /// completed.
    pub fn step_instruction(&mut self) -> usize {
        let mut cycles = 0;
        loop {
            self.step();
            cycles += 1;
            if self.cpu.access.is_opcode_fetch() || cycles > 16 {
                break;
            }
        }
        cycles
    }
}
