//! Debugger instrumentation: per-byte flags, stepping, the paging
//! override view and asynchronous 6502 calls.
//!
//! All of this lives in an optional `DebugState` so machines without a
//! debugger attached carry no overhead beyond the data-bus route
//! selection.

use owlet_core::cpu::mos6502::{BusAccess, ReadKind};

use super::memory::{
    ANDY_BIG_PAGE_INDEX, BIG_PAGE_SIZE_BYTES, BigPage, HAZEL_BIG_PAGE_INDEX, MapSel, MemRef,
    MOS_BIG_PAGE_INDEX, NUM_BIG_PAGES, NUM_ROM_BIG_PAGES, ROM0_BIG_PAGE_INDEX,
    SHADOW_BIG_PAGE_INDEX,
};
use super::model::{
    ACCCON_TST, ACCCON_X, ACCCON_Y, BPLUS_ACCCON_SHADOW, DPO_ANDY, DPO_HAZEL, DPO_OS,
    DPO_OVERRIDE_ANDY, DPO_OVERRIDE_HAZEL, DPO_OVERRIDE_ROM, DPO_OVERRIDE_SHADOW,
    DPO_ROM_BANK_MASK, DPO_SHADOW, Model, ROMSEL_BANK_MASK, ROMSEL_RAM,
};
use super::{ASYNC_CALL_TIMEOUT, AsyncCallFn, Machine};

// Per-byte debug flag bits.
pub const BYTE_FLAG_BREAK_EXECUTE: u8 = 1 << 0;
pub const BYTE_FLAG_TEMP_EXECUTE: u8 = 1 << 1;
pub const BYTE_FLAG_BREAK_READ: u8 = 1 << 2;
pub const BYTE_FLAG_BREAK_WRITE: u8 = 1 << 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StepType {
    #[default]
    None,
    /// Halt at the next opcode fetch; if an interrupt preempts it, drop
    /// a temp breakpoint at the interrupted address instead.
    StepIn,
    /// Halt at the first opcode fetched after an IRQ whose source
    /// matches the per-VIA breakpoint masks.
    StepIntoIrqHandler,
}

/// Hardware-condition breakpoints: IFR bit masks per VIA.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HardwareDebugState {
    pub system_via_irq_breakpoints: u8,
    pub user_via_irq_breakpoints: u8,
}

pub struct DebugState {
    /// One 4K flag array per big page.
    pub(crate) flags: Vec<[u8; BIG_PAGE_SIZE_BYTES]>,
    /// Temp breakpoints as (big page, offset), so halting can clear
    /// exactly the flags it set.
    temp_execute_breakpoints: Vec<(u8, u16)>,
    pub(crate) step_type: StepType,
    pub hw: HardwareDebugState,
    is_halted: bool,
    halt_reason: Option<String>,
}

impl DebugState {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            flags: vec![[0; BIG_PAGE_SIZE_BYTES]; NUM_BIG_PAGES as usize],
            temp_execute_breakpoints: Vec::new(),
            step_type: StepType::None,
            hw: HardwareDebugState::default(),
            is_halted: false,
            halt_reason: None,
        })
    }
}

impl Machine {
    // ----------------------------------------------------------------
    // Attach / detach
    // ----------------------------------------------------------------

    pub fn has_debug_state(&self) -> bool {
        self.debug.is_some()
    }

    pub fn set_debug_state(&mut self, debug: Option<Box<DebugState>>) {
        self.debug = debug;
        self.update_data_bus_fn();
    }

    pub fn take_debug_state(&mut self) -> Option<Box<DebugState>> {
        let debug = self.debug.take();
        self.update_data_bus_fn();
        debug
    }

    // ----------------------------------------------------------------
    // Halting
    // ----------------------------------------------------------------

    pub(crate) fn debug_halt(&mut self, reason: impl Into<String>) {
        if let Some(debug) = &mut self.debug {
            debug.is_halted = true;
            debug.halt_reason = Some(reason.into());

            let temp = std::mem::take(&mut debug.temp_execute_breakpoints);
            for (big_page, offset) in temp {
                debug.flags[big_page as usize][offset as usize] &= !BYTE_FLAG_TEMP_EXECUTE;
            }

            debug.step_type = StepType::None;
        }
    }

    pub fn debug_is_halted(&self) -> bool {
        self.debug.as_ref().is_some_and(|d| d.is_halted)
    }

    pub fn debug_halt_reason(&self) -> Option<&str> {
        self.debug.as_ref().and_then(|d| d.halt_reason.as_deref())
    }

    pub fn debug_run(&mut self) {
        if let Some(debug) = &mut self.debug {
            debug.is_halted = false;
        }
    }

    /// Host-side halt request (e.g. the stop button).
    pub fn debug_request_halt(&mut self, reason: impl Into<String>) {
        self.debug_halt(reason);
    }

    // ----------------------------------------------------------------
    // Byte flags
    // ----------------------------------------------------------------

    pub(crate) fn debug_flags_for(&self, big_page: u8, addr: u16) -> u8 {
        match &self.debug {
            Some(debug) => debug.flags[big_page as usize][(addr & 0x0FFF) as usize],
            None => 0,
        }
    }

    /// Byte flags at an address through the current live mapping.
    pub fn debug_get_byte_flags(&self, addr: u16) -> u8 {
        let shadow = self.shadow_pages.is_some();
        let big_page = self.active_map(shadow).big_pages[(addr >> 8) as usize];
        self.debug_flags_for(big_page, addr)
    }

    pub fn debug_set_byte_flags(&mut self, addr: u16, flags: u8) {
        let shadow = self.shadow_pages.is_some();
        let big_page = self.active_map(shadow).big_pages[(addr >> 8) as usize];
        if let Some(debug) = &mut self.debug {
            debug.flags[big_page as usize][(addr & 0x0FFF) as usize] = flags;
        }
    }

    pub fn debug_add_temp_breakpoint(&mut self, addr: u16) {
        let shadow = self.shadow_pages.is_some();
        let big_page = self.active_map(shadow).big_pages[(addr >> 8) as usize];
        let offset = addr & 0x0FFF;

        if let Some(debug) = &mut self.debug {
            let flags = &mut debug.flags[big_page as usize][offset as usize];
            if *flags & BYTE_FLAG_TEMP_EXECUTE == 0 {
                *flags |= BYTE_FLAG_TEMP_EXECUTE;
                debug.temp_execute_breakpoints.push((big_page, offset));
            }
        }
    }

    // ----------------------------------------------------------------
    // Stepping
    // ----------------------------------------------------------------

    pub fn debug_step_in(&mut self) {
        self.set_step_type(StepType::StepIn);
    }

    fn set_step_type(&mut self, step_type: StepType) {
        if let Some(debug) = &mut self.debug {
            debug.step_type = step_type;
        }
    }

    pub fn hardware_debug_state(&self) -> HardwareDebugState {
        self.debug.as_ref().map(|d| d.hw).unwrap_or_default()
    }

    pub fn set_hardware_debug_state(&mut self, hw: HardwareDebugState) {
        if let Some(debug) = &mut self.debug {
            debug.hw = hw;
        }
    }

    /// React to byte flags on a read access.
    pub(crate) fn handle_read_byte_debug_flags(&mut self, kind: ReadKind, addr: u16, flags: u8) {
        if flags & BYTE_FLAG_BREAK_EXECUTE != 0 {
            if kind == ReadKind::Opcode {
                self.debug_halt(format!("execute: ${addr:04X}"));
            }
        } else if flags & BYTE_FLAG_TEMP_EXECUTE != 0 && kind == ReadKind::Opcode {
            self.debug_halt("single step");
        }

        if flags & BYTE_FLAG_BREAK_READ != 0
            && matches!(kind, ReadKind::Data | ReadKind::Pointer)
        {
            self.debug_halt(format!("data read: ${addr:04X}"));
        }
    }

    /// On an interrupt-hijacked fetch: if a watched VIA IRQ source is
    /// both enabled and pending, arm the step-into-handler stop.
    pub(crate) fn handle_interrupt_breakpoints(&mut self) {
        if !self.state.cpu.is_probably_irq() {
            return;
        }
        let Some(debug) = &mut self.debug else {
            return;
        };

        let system = self.state.system_via.ifr
            & self.state.system_via.ier
            & debug.hw.system_via_irq_breakpoints;
        let user =
            self.state.user_via.ifr & self.state.user_via.ier & debug.hw.user_via_irq_breakpoints;

        if system & 0x7F != 0 || user & 0x7F != 0 {
            debug.step_type = StepType::StepIntoIrqHandler;
        }
    }

    /// Step-type handling, run on every opcode or interrupt fetch while
    /// a debugger is attached.
    pub(crate) fn handle_step(&mut self) {
        let step_type = match &self.debug {
            Some(debug) => debug.step_type,
            None => return,
        };
        let access = self.state.cpu.access;

        match step_type {
            StepType::None => {}

            StepType::StepIn => {
                if matches!(access, BusAccess::Read(ReadKind::Opcode)) {
                    // Done.
                    self.debug_halt("single step");
                } else {
                    // The instruction was interrupted; stop where the
                    // handler will return to.
                    let return_addr = self.state.cpu.pc;
                    self.debug_add_temp_breakpoint(return_addr);
                }
                self.set_step_type(StepType::None);
            }

            StepType::StepIntoIrqHandler => {
                if matches!(access, BusAccess::Read(ReadKind::Opcode)) {
                    self.set_step_type(StepType::None);
                    self.debug_halt("IRQ/NMI");
                }
            }
        }
    }

    // ----------------------------------------------------------------
    // Paging override view
    // ----------------------------------------------------------------

    pub fn debug_get_page_override_mask(&self) -> u32 {
        self.model().dpo_mask()
    }

    /// The DPO word matching the current live paging state.
    pub fn debug_get_current_page_override(&self) -> u32 {
        match self.model() {
            Model::B => (self.state.romsel & ROMSEL_BANK_MASK) as u32,

            Model::BPlus => {
                let mut dpo = (self.state.romsel & ROMSEL_BANK_MASK) as u32;
                if self.state.romsel & ROMSEL_RAM != 0 {
                    dpo |= DPO_ANDY;
                }
                if self.state.acccon & BPLUS_ACCCON_SHADOW != 0 {
                    dpo |= DPO_SHADOW;
                }
                dpo
            }

            Model::Master => {
                let mut dpo = (self.state.romsel & ROMSEL_BANK_MASK) as u32;
                if self.state.romsel & ROMSEL_RAM != 0 {
                    dpo |= DPO_ANDY;
                }
                if self.state.acccon & ACCCON_X != 0 {
                    dpo |= DPO_SHADOW;
                }
                if self.state.acccon & ACCCON_Y != 0 {
                    dpo |= DPO_HAZEL;
                }
                if self.state.acccon & ACCCON_TST != 0 {
                    dpo |= DPO_OS;
                }
                dpo
            }
        }
    }

    /// The big page that would back `page` (an address high byte) under
    /// the supplied overrides. Unoverridden regions resolve through the
    /// current mapping for an instruction at PC page 0, which gives the
    /// debugger a stable flat view independent of the live paging.
    pub fn debug_get_big_page(&self, page: u8, dpo: u32) -> &BigPage {
        let index = self.debug_big_page_index(page, dpo & self.model().dpo_mask());
        &self.big_pages[index as usize]
    }

    fn debug_big_page_index(&self, page: u8, dpo: u32) -> u8 {
        // The IO region comes first: whether or not the OS override is
        // set, reads fall through to the MOS big page. Reaching the
        // IO devices from this path is a known limitation.
        if (0xFC..0xFF).contains(&page) {
            return MOS_BIG_PAGE_INDEX + (page >> 4) - 0x0C;
        }

        let nibble = page >> 4;
        match nibble {
            0x0..=0x2 => self.live_big_page_index(page),

            0x3..=0x7 => {
                if dpo & DPO_OVERRIDE_SHADOW != 0 {
                    if dpo & DPO_SHADOW != 0 {
                        SHADOW_BIG_PAGE_INDEX + (nibble - 3)
                    } else {
                        nibble // main RAM big page
                    }
                } else {
                    self.live_big_page_index(page)
                }
            }

            0x8 => self.andy_big_page_index(page, dpo),

            // ANDY reaches 0xAFFF on the B+ only.
            0x9 | 0xA => {
                if self.model() == Model::BPlus {
                    self.andy_big_page_index(page, dpo)
                } else {
                    self.rom_big_page_index(page, dpo)
                }
            }

            0xB => self.rom_big_page_index(page, dpo),

            0xC | 0xD => {
                if dpo & DPO_OVERRIDE_HAZEL != 0 {
                    if dpo & DPO_HAZEL != 0 {
                        HAZEL_BIG_PAGE_INDEX + (nibble - 0x0C)
                    } else {
                        MOS_BIG_PAGE_INDEX + (nibble - 0x0C)
                    }
                } else {
                    self.live_big_page_index(page)
                }
            }

            0xE | 0xF => MOS_BIG_PAGE_INDEX + (nibble - 0x0C),

            _ => unreachable!(),
        }
    }

    fn andy_big_page_index(&self, page: u8, dpo: u32) -> u8 {
        if dpo & DPO_OVERRIDE_ANDY != 0 && dpo & DPO_ANDY != 0 {
            // Don't mask, just subtract: ANDY is 4K on the Master but
            // 12K on the B+.
            ANDY_BIG_PAGE_INDEX + ((page >> 4) - 0x08)
        } else {
            self.rom_big_page_index(page, dpo)
        }
    }

    fn rom_big_page_index(&self, page: u8, dpo: u32) -> u8 {
        if dpo & DPO_OVERRIDE_ROM != 0 {
            let bank = (dpo & DPO_ROM_BANK_MASK) as u8;
            ROM0_BIG_PAGE_INDEX + bank * NUM_ROM_BIG_PAGES + ((page >> 4) - 0x08)
        } else {
            self.live_big_page_index(page)
        }
    }

    /// The big page currently live at an address high byte (for an
    /// instruction at PC page 0).
    pub fn debug_live_big_page(&self, page: u8) -> &BigPage {
        &self.big_pages[self.live_big_page_index(page) as usize]
    }

    fn live_big_page_index(&self, page: u8) -> u8 {
        let map = if self.shadow_pages.is_some() && self.pc_page_maps[0] == MapSel::Shadow {
            match &self.shadow_pages {
                Some(shadow) => shadow,
                None => &self.pages,
            }
        } else {
            &self.pages
        };
        map.big_pages[page as usize]
    }

    // ----------------------------------------------------------------
    // Out-of-band memory access
    // ----------------------------------------------------------------

    pub fn debug_read_bytes(&self, dst: &mut [u8], addr: u16, dpo: u32) {
        let mut addr = addr;
        for byte in dst {
            let big_page = self.debug_get_big_page((addr >> 8) as u8, dpo);
            *byte = match big_page.read {
                Some(mem) => self.read_mem(
                    MemRef { region: mem.region, offset: mem.offset + (addr as u32 & 0xF00) },
                    addr as u8,
                ),
                None => 0,
            };
            addr = addr.wrapping_add(1);
        }
    }

    pub fn debug_write_bytes(&mut self, addr: u16, dpo: u32, src: &[u8]) {
        let mut addr = addr;
        for &byte in src {
            let big_page = *self.debug_get_big_page((addr >> 8) as u8, dpo);
            if let Some(mem) = big_page.write {
                let mem =
                    MemRef { region: mem.region, offset: mem.offset + (addr as u32 & 0xF00) };
                self.write_mem(mem, addr as u8, byte);
            }
            addr = addr.wrapping_add(1);
        }
    }

    pub fn debug_addressable_latch(&self) -> u8 {
        self.state.addressable_latch
    }

    // ----------------------------------------------------------------
    // Async 6502 calls
    // ----------------------------------------------------------------

    /// Arm an asynchronous subroutine call. The call is injected at the
    /// next IRQ entry; if none arrives within the timeout the callback
    /// fires with `called = false`. A previously pending call is
    /// cancelled first (its callback also fires with false).
    pub fn debug_set_async_call(
        &mut self,
        address: u16,
        a: u8,
        x: u8,
        y: u8,
        c: bool,
        callback: AsyncCallFn,
    ) {
        self.finish_async_call(false);

        self.state.async_call_address = Some(address);
        self.state.async_call_timeout = ASYNC_CALL_TIMEOUT;
        self.state.async_call_a = a;
        self.state.async_call_x = x;
        self.state.async_call_y = y;
        self.state.async_call_c = c;
        self.async_call_fn = Some(callback);

        self.update_data_bus_fn();
    }

    pub fn debug_has_async_call(&self) -> bool {
        self.state.async_call_address.is_some()
    }
}
