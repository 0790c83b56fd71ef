#![allow(dead_code)]

use std::sync::Arc;

use owlet_core::sound::SoundDataUnit;
use owlet_core::video::unit::VideoDataUnit;
use owlet_machines::bbc::model::Model;
use owlet_machines::bbc::{Machine, MachineConfig, ROM_SIZE, RomData};

/// Build an OS ROM with `code` at the entry point (0xC000), the reset
/// vector pointing there, and arbitrary extra patches at ROM-window
/// addresses (0xC000-0xFFFF).
pub fn os_rom(code: &[u8], patches: &[(u16, &[u8])]) -> Arc<RomData> {
    let mut rom = [0u8; ROM_SIZE];
    rom[..code.len()].copy_from_slice(code);
    rom[0x3FFC] = 0x00;
    rom[0x3FFD] = 0xC0;
    for (addr, bytes) in patches {
        let offset = (addr - 0xC000) as usize;
        rom[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    Arc::new(rom)
}

/// A machine of the given model booting straight into `code`.
pub fn boot_machine(model: Model, code: &[u8]) -> Machine {
    boot_machine_with(model, code, &[])
}

pub fn boot_machine_with(model: Model, code: &[u8], patches: &[(u16, &[u8])]) -> Machine {
    let mut machine = Machine::new(model, MachineConfig::default());
    machine.set_os_rom(os_rom(code, patches));
    machine
}

/// Step the machine, discarding output.
pub fn step_n(machine: &mut Machine, ticks: usize) {
    let mut video = VideoDataUnit::default();
    let mut sound = SoundDataUnit::default();
    for _ in 0..ticks {
        machine.step(&mut video, &mut sound);
    }
}

/// Step the machine, returning the video units produced.
pub fn step_collect(machine: &mut Machine, ticks: usize) -> Vec<VideoDataUnit> {
    let mut units = Vec::with_capacity(ticks);
    let mut sound = SoundDataUnit::default();
    for _ in 0..ticks {
        let mut video = VideoDataUnit::default();
        machine.step(&mut video, &mut sound);
        units.push(video);
    }
    units
}

/// Step until the debugger reports a halt (the way a host emulation
/// loop would stop driving the machine). Returns whether it halted.
pub fn step_until_halted(machine: &mut Machine, max_ticks: usize) -> bool {
    let mut video = VideoDataUnit::default();
    let mut sound = SoundDataUnit::default();
    for _ in 0..max_ticks {
        if machine.debug_is_halted() {
            return true;
        }
        machine.step(&mut video, &mut sound);
    }
    machine.debug_is_halted()
}

/// Read bytes through the debugger's flat view with no overrides.
pub fn read_ram(machine: &Machine, addr: u16, len: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; len];
    machine.debug_read_bytes(&mut buffer, addr, 0);
    buffer
}
