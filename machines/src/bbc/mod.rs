//! The BBC Micro machine family: B, B+ and Master 128.
//!
//! `Machine` owns everything: the 6502, the memory and paging model,
//! the MMIO dispatch, the video and sound chips and the per-tick
//! sequencing. One call to [`Machine::step`] advances the whole machine
//! by one 2 MHz cycle and produces one video unit (and sometimes a
//! sound sample).
//!
//! The split between [`State`] and the rest of `Machine` is the
//! savestate boundary: `State` is everything a snapshot carries, while
//! the remaining fields (page maps, MMIO tables, callbacks, debug
//! state) are wiring that is derived from the state and configuration,
//! and is rebuilt rather than copied when a machine is cloned.

pub mod debug;
pub mod drive_sounds;
pub mod keys;
pub mod memory;
pub mod mmio;
pub mod model;
mod paging;
mod tick;

use std::sync::Arc;

use owlet_core::cpu::mos6502::Mos6502;
use owlet_core::device::crtc6845::CrtcOutput;
use owlet_core::device::mc146818::RtcTime;
use owlet_core::device::{Crtc6845, Mc146818, Saa5050, Sn76489, Via6522, VideoUla, Wd1770};
use owlet_core::trace::{TraceEvent, TraceSink, TraceStats};

use crate::disc::{DiscControl, DiscImage, DiscInterface};
use debug::DebugState;
use keys::BeebKey;
use memory::{BIG_PAGE_SIZE_BYTES, BigPage, MapSel, MemoryPages, NUM_BIG_PAGES};
use mmio::MmioTables;
use model::Model;

pub const ROM_SIZE: usize = 16384;
pub type RomData = [u8; ROM_SIZE];

// Aggregated interrupt line bits, one per device.
pub(crate) const IRQ_DEVICE_SYSTEM_VIA: u32 = 1 << 0;
pub(crate) const IRQ_DEVICE_USER_VIA: u32 = 1 << 1;
pub(crate) const NMI_DEVICE_FDC: u32 = 1 << 0;

// Addressable latch bits.
pub(crate) const LATCH_NOT_SOUND_WRITE: u8 = 0x01;
pub(crate) const LATCH_RTC_READ: u8 = 0x02;
pub(crate) const LATCH_RTC_DATA_STROBE: u8 = 0x04;
pub(crate) const LATCH_NOT_KB_WRITE: u8 = 0x08;
pub(crate) const LATCH_CAPS_LOCK_LED: u8 = 0x40;
pub(crate) const LATCH_SHIFT_LOCK_LED: u8 = 0x80;

// System VIA port B bits.
pub(crate) const PORTB_LATCH_VALUE: u8 = 0x08;
pub(crate) const PORTB_RTC_CHIP_SELECT: u8 = 0x40;
pub(crate) const PORTB_RTC_ADDRESS_STROBE: u8 = 0x80;

/// The async call thunk lives in an undefined area of FRED.
pub(crate) const ASYNC_CALL_THUNK_ADDR: u16 = 0xFC50;
pub(crate) const ASYNC_CALL_TIMEOUT: i32 = 1_000_000;
pub(crate) const ASYNC_CALL_THUNK_SIZE: usize = 24;

/// One sound sample every 2^SOUND_CLOCK_SHIFT cycles (every fourth odd
/// cycle): 250 kHz, the SN76489's internal step rate at 4 MHz.
pub(crate) const SOUND_CLOCK_SHIFT: u64 = 3;

pub const HACK_FLAG_PASTE: u32 = 1 << 0;

pub const CLONE_IMPEDIMENT_DRIVE_0: u32 = 1 << 0;
pub const CLONE_IMPEDIMENT_DRIVE_1: u32 = 1 << 1;
pub const CLONE_IMPEDIMENT_LINK: u32 = 1 << 2;

// Trace flags.
pub const TRACE_FLAG_SYSTEM_VIA: u32 = 1 << 0;
pub const TRACE_FLAG_USER_VIA: u32 = 1 << 1;
pub const TRACE_FLAG_FDC: u32 = 1 << 2;
pub const TRACE_FLAG_RTC: u32 = 1 << 3;
pub const TRACE_FLAG_INSTRUCTIONS: u32 = 1 << 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasteState {
    None,
    Wait,
    Delete,
    Paste,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriveState {
    pub track: u8,
    pub motor: bool,
    /// Playback position within the installed spin sound, if any.
    pub spin_sound_index: usize,
    /// Playback position within the step sound; past-the-end means
    /// idle.
    pub step_sound_index: usize,
}

impl Default for DriveState {
    fn default() -> Self {
        Self { track: 0, motor: false, spin_sound_index: 0, step_sound_index: usize::MAX }
    }
}

/// Sideways-capable paged RAM on FRED/JIM: two address latches at
/// 0xFC00/01 select which 256-byte page the whole of JIM windows onto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtMem {
    ram: Vec<u8>,
    addr_l: u8,
    addr_h: u8,
}

impl ExtMem {
    fn new() -> Self {
        Self { ram: vec![0; 16 * 1024 * 1024], addr_l: 0, addr_h: 0 }
    }

    fn base(&self) -> usize {
        (self.addr_h as usize) << 16 | (self.addr_l as usize) << 8
    }

    pub fn read(&self, offset: u8) -> u8 {
        self.ram[self.base() + offset as usize]
    }

    pub fn write(&mut self, offset: u8, value: u8) {
        let base = self.base();
        self.ram[base + offset as usize] = value;
    }
}

/// The savestate unit: everything two identically configured machines
/// need to share for their subsequent execution to match bit for bit.
#[derive(Clone, PartialEq)]
pub struct State {
    pub cpu: Mos6502,

    pub(crate) ram: Vec<u8>,
    pub(crate) os_rom: Option<Arc<RomData>>,
    /// A sideways bank is exactly one of ROM (shared, immutable), RAM
    /// (private, writable) or absent.
    pub(crate) sideways_roms: [Option<Arc<RomData>>; 16],
    pub(crate) sideways_rams: [Option<Vec<u8>>; 16],

    pub(crate) romsel: u8,
    pub(crate) acccon: u8,

    pub(crate) system_via: Via6522,
    pub(crate) user_via: Via6522,
    pub(crate) crtc: Crtc6845,
    pub(crate) video_ula: VideoUla,
    pub(crate) saa5050: Saa5050,
    pub(crate) sn76489: Sn76489,
    pub(crate) fdc: Wd1770,
    pub(crate) rtc: Mc146818,
    pub(crate) ext_mem: Option<ExtMem>,

    pub(crate) key_columns: [u8; 16],
    pub(crate) key_scan_column: u8,
    pub(crate) num_keys_down: u8,
    pub(crate) resetting: bool,

    pub(crate) addressable_latch: u8,
    pub(crate) old_addressable_latch: u8,
    pub(crate) old_system_via_pb: u8,

    pub(crate) cycles: u64,

    pub(crate) crtc_last_output: CrtcOutput,
    pub(crate) cursor_pattern: u8,
    /// Byte latched for the teletext data path (IC15).
    pub(crate) ic15_byte: u8,
    pub(crate) shadow_select_mask: u16,
    pub(crate) last_vsync_cycles: u64,
    pub(crate) last_frame_cycles: u64,

    pub(crate) stretched_cycles_left: u8,

    pub(crate) paste_state: PasteState,
    pub(crate) paste_text: Option<Arc<[u8]>>,
    pub(crate) paste_index: usize,
    pub(crate) paste_wait_end: u64,
    pub(crate) hack_flags: u32,

    pub(crate) async_call_address: Option<u16>,
    pub(crate) async_call_a: u8,
    pub(crate) async_call_x: u8,
    pub(crate) async_call_y: u8,
    pub(crate) async_call_c: bool,
    pub(crate) async_call_timeout: i32,
    pub(crate) async_call_thunk_buf: [u8; ASYNC_CALL_THUNK_SIZE],

    pub(crate) disc_control: DiscControl,
    pub(crate) drives: [DriveState; 2],
}

impl State {
    fn new(model: Model, config: &MachineConfig) -> Self {
        let mut rtc = Mc146818::new();
        if model.has_rtc() {
            rtc.set_ram_contents(&config.nvram_contents);
            if let Some(time) = &config.rtc_time {
                rtc.set_time(time);
            }
        }

        let mut sn76489 = Sn76489::new();
        sn76489.reset(config.power_on_tone);

        Self {
            cpu: Mos6502::new(model.cpu_variant()),
            ram: vec![0; model.ram_size()],
            os_rom: None,
            sideways_roms: Default::default(),
            sideways_rams: Default::default(),
            romsel: 0,
            acccon: 0,
            system_via: Via6522::new(),
            user_via: Via6522::new(),
            crtc: Crtc6845::new(),
            video_ula: VideoUla::new(config.video_nula),
            saa5050: Saa5050::new(),
            sn76489,
            fdc: Wd1770::new(),
            rtc,
            ext_mem: config.ext_mem.then(ExtMem::new),
            key_columns: [0; 16],
            key_scan_column: 0,
            num_keys_down: 0,
            resetting: false,
            addressable_latch: 0,
            old_addressable_latch: 0,
            old_system_via_pb: 0,
            cycles: config.initial_cycles,
            crtc_last_output: CrtcOutput::default(),
            cursor_pattern: 0,
            ic15_byte: 0,
            shadow_select_mask: 0,
            last_vsync_cycles: 0,
            last_frame_cycles: 0,
            stretched_cycles_left: 0,
            paste_state: PasteState::None,
            paste_text: None,
            paste_index: 0,
            paste_wait_end: 0,
            hack_flags: 0,
            async_call_address: None,
            async_call_a: 0,
            async_call_x: 0,
            async_call_y: 0,
            async_call_c: false,
            async_call_timeout: 0,
            async_call_thunk_buf: [0; ASYNC_CALL_THUNK_SIZE],
            disc_control: DiscControl::default(),
            drives: [DriveState::default(); 2],
        }
    }
}

/// Something plugged into the user port, serviced once per odd cycle.
pub trait LinkHandler {
    fn update(&mut self, user_via: &mut Via6522);
}

pub type InstructionFn = Box<dyn FnMut(&Mos6502) -> bool>;
pub type AsyncCallFn = Box<dyn FnOnce(bool)>;

pub(crate) struct ExternalMmioFns {
    pub read: Option<Box<dyn FnMut(u16) -> u8>>,
    pub write: Option<Box<dyn FnMut(u16, u8)>>,
}

/// Which of the four base data-bus routes is active. A "with hacks"
/// wrapper runs around the base route whenever any slow-path feature is
/// live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DataBusHandler {
    MainOnly,
    MainOnlyDebug,
    Shadow,
    ShadowDebug,
}

#[derive(Debug)]
pub enum CloneError {
    /// Bitmask of CLONE_IMPEDIMENT_* values.
    CloneImpedimentsSet(u32),
}

impl std::fmt::Display for CloneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloneImpedimentsSet(mask) => {
                write!(f, "machine cannot be cloned (impediments: {mask:#x})")
            }
        }
    }
}

impl std::error::Error for CloneError {}

#[derive(Debug)]
pub enum RomError {
    BadRomSize { expected: usize, actual: usize },
}

impl std::fmt::Display for RomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRomSize { expected, actual } => {
                write!(f, "bad ROM size: expected {expected} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for RomError {}

/// Validate and share a ROM image.
pub fn rom_from_bytes(bytes: &[u8]) -> Result<Arc<RomData>, RomError> {
    let data: RomData = bytes
        .try_into()
        .map_err(|_| RomError::BadRomSize { expected: ROM_SIZE, actual: bytes.len() })?;
    Ok(Arc::new(data))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Leds {
    pub caps_lock: bool,
    pub shift_lock: bool,
    pub drives: [bool; 2],
}

/// Construction inputs. NVRAM contents are consumed on the Master only.
#[derive(Default)]
pub struct MachineConfig {
    pub disc_interface: Option<DiscInterface>,
    pub nvram_contents: Vec<u8>,
    pub rtc_time: Option<RtcTime>,
    pub video_nula: bool,
    pub ext_mem: bool,
    pub power_on_tone: bool,
    pub link_handler: Option<Box<dyn LinkHandler>>,
    pub initial_cycles: u64,
}

pub struct Machine {
    pub(crate) state: State,
    model: Model,
    disc_interface: Option<DiscInterface>,
    pub(crate) disc_images: [Option<DiscImage>; 2],
    video_nula: bool,
    ext_mem_fitted: bool,

    pub(crate) big_pages: [BigPage; NUM_BIG_PAGES as usize],
    pub(crate) pages: MemoryPages,
    pub(crate) shadow_pages: Option<Box<MemoryPages>>,
    /// Which page map an instruction fetched from each high byte uses.
    pub(crate) pc_page_maps: [MapSel; 256],

    pub(crate) mmio: Box<MmioTables>,
    pub(crate) external_mmio: Vec<ExternalMmioFns>,

    /// Shared sink for ROM and unmapped writes.
    pub(crate) scratch: Box<[u8; BIG_PAGE_SIZE_BYTES]>,

    pub(crate) debug: Option<Box<DebugState>>,
    pub(crate) trace: Option<TraceSink>,
    pub(crate) trace_flags: u32,
    pub(crate) trace_instruction_pending: bool,

    pub(crate) instruction_fns: Vec<InstructionFn>,
    pub(crate) async_call_fn: Option<AsyncCallFn>,
    pub(crate) link_handler: Option<Box<dyn LinkHandler>>,

    pub(crate) data_bus: DataBusHandler,
    pub(crate) hacks: bool,

    pub(crate) disc_access: bool,
    pub(crate) last_video_access_address: u16,
}

impl Machine {
    pub fn new(model: Model, mut config: MachineConfig) -> Self {
        let state = State::new(model, &config);
        let mut machine = Self {
            state,
            model,
            disc_interface: config.disc_interface,
            disc_images: [None, None],
            video_nula: config.video_nula,
            ext_mem_fitted: config.ext_mem,
            big_pages: [BigPage::unmapped(); NUM_BIG_PAGES as usize],
            pages: MemoryPages::new(),
            shadow_pages: None,
            pc_page_maps: [MapSel::Default; 256],
            mmio: MmioTables::new(),
            external_mmio: Vec::new(),
            scratch: Box::new([0; BIG_PAGE_SIZE_BYTES]),
            debug: None,
            trace: None,
            trace_flags: 0,
            trace_instruction_pending: false,
            instruction_fns: Vec::new(),
            async_call_fn: None,
            link_handler: config.link_handler.take(),
            data_bus: DataBusHandler::MainOnly,
            hacks: false,
            disc_access: false,
            last_video_access_address: 0,
        };
        machine.init_stuff();
        machine
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn cycles(&self) -> u64 {
        self.state.cycles
    }

    pub fn cpu(&self) -> &Mos6502 {
        &self.state.cpu
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_resetting(&self) -> bool {
        self.state.resetting
    }

    pub fn disc_interface(&self) -> Option<DiscInterface> {
        self.disc_interface
    }

    pub fn video_nula(&self) -> bool {
        self.video_nula
    }

    pub fn has_ext_mem(&self) -> bool {
        self.ext_mem_fitted
    }

    /// RAM address of the most recent video fetch, for debugger display.
    pub fn last_video_access_address(&self) -> u16 {
        self.last_video_access_address
    }

    /// Remaining 1 MHz-alignment stretch on the current CPU access.
    pub fn stretched_cycles_left(&self) -> u8 {
        self.state.stretched_cycles_left
    }

    /// Rebuild all the derived wiring from the current state and
    /// configuration.
    fn init_stuff(&mut self) {
        if self.model.has_shadow_ram() {
            self.shadow_pages = Some(Box::new(MemoryPages::new()));
            self.pc_page_maps = [MapSel::Default; 256];
        }

        self.init_mmio();
        self.init_big_pages();
        self.update_data_bus_fn();
    }

    fn init_mmio(&mut self) {
        use crate::disc::interface::{DISC_INTERFACE_FLAG_1772, DISC_INTERFACE_FLAG_NO_INTRQ};
        use mmio::{MmioRead, MmioWrite};

        self.mmio = MmioTables::new();

        // The async call thunk reads out of FRED.
        for i in 0..ASYNC_CALL_THUNK_SIZE as u16 {
            self.mmio
                .set_read(ASYNC_CALL_THUNK_ADDR + i, MmioRead::AsyncThunk(i as u8));
        }

        if self.ext_mem_fitted {
            self.mmio.set_write(0xFC00, MmioWrite::ExtMemAddrL);
            self.mmio.set_write(0xFC01, MmioWrite::ExtMemAddrH);
            self.mmio.set_read(0xFC02, MmioRead::ExtMemAddrL);
            self.mmio.set_read(0xFC03, MmioRead::ExtMemAddrH);
            for i in 0xFD00..=0xFDFFu16 {
                self.mmio.set(i, MmioRead::ExtMemData, MmioWrite::ExtMemData);
            }
        }

        // VIAs: 16 registers each, mirrored across 32 bytes.
        for i in 0..32u16 {
            let reg = (i & 15) as u8;
            self.mmio
                .set(0xFE40 + i, MmioRead::SystemVia(reg), MmioWrite::SystemVia(reg));
            self.mmio
                .set(0xFE60 + i, MmioRead::UserVia(reg), MmioWrite::UserVia(reg));
        }

        // 6845: address/data pairs mirrored over 8 bytes.
        for i in (0..8u16).step_by(2) {
            self.mmio
                .set(0xFE00 + i, MmioRead::CrtcAddress, MmioWrite::CrtcAddress);
            self.mmio
                .set(0xFE00 + i + 1, MmioRead::CrtcData, MmioWrite::CrtcData);
        }

        // Video ULA; write-only as far as the CPU is concerned.
        for i in 0..2u16 {
            self.mmio.set_write(0xFE20 + i * 2, MmioWrite::UlaControl);
            self.mmio.set_write(0xFE21 + i * 2, MmioWrite::UlaPalette);
        }
        if self.video_nula {
            self.mmio.set_write(0xFE22, MmioWrite::NulaControl);
            self.mmio.set_write(0xFE23, MmioWrite::NulaPalette);
        }

        // Paging registers.
        match self.model {
            Model::B => {
                for i in 0..16u16 {
                    self.mmio.set(0xFE30 + i, MmioRead::Romsel, MmioWrite::Romsel);
                }
            }
            Model::BPlus | Model::Master => {
                for i in 0..4u16 {
                    self.mmio.set(0xFE30 + i, MmioRead::Romsel, MmioWrite::Romsel);
                    self.mmio.set(0xFE34 + i, MmioRead::Acccon, MmioWrite::Acccon);
                }
            }
        }

        // Disc interface.
        if let Some(interface) = self.disc_interface {
            self.state.fdc.set_1772(interface.flags & DISC_INTERFACE_FLAG_1772 != 0);
            self.state
                .fdc
                .set_no_intrq(interface.flags & DISC_INTERFACE_FLAG_NO_INTRQ != 0);

            for i in 0..4u16 {
                self.mmio
                    .set(interface.fdc_addr + i, MmioRead::Fdc(i as u8), MmioWrite::Fdc(i as u8));
            }
            self.mmio
                .set(interface.control_addr, MmioRead::DiscControl, MmioWrite::DiscControl);
        }

        mmio::init_stretch(&mut self.mmio, self.model == Model::Master);
    }

    /// Swap in the right base data-bus route and decide whether the
    /// hacks wrapper is needed this configuration.
    pub(crate) fn update_data_bus_fn(&mut self) {
        let shadow = self.shadow_pages.is_some();
        let debugging = self.debug.is_some();

        self.data_bus = match (shadow, debugging) {
            (false, false) => DataBusHandler::MainOnly,
            (false, true) => DataBusHandler::MainOnlyDebug,
            (true, false) => DataBusHandler::Shadow,
            (true, true) => DataBusHandler::ShadowDebug,
        };

        self.hacks = debugging
            || self.trace.is_some()
            || self.state.hack_flags != 0
            || self.state.async_call_address.is_some()
            || !self.instruction_fns.is_empty();
    }

    // ----------------------------------------------------------------
    // Keyboard
    // ----------------------------------------------------------------

    pub fn get_key_state(&self, key: BeebKey) -> bool {
        if key == keys::BREAK {
            return self.state.resetting;
        }
        let column = &self.state.key_columns[(key & 0x0F) as usize];
        column & 1 << (key >> 4) != 0
    }

    /// Returns true when the call changed anything (i.e. this was an
    /// edge). Break is special: it holds the CPU in reset while down
    /// and resets it (cancelling any paste) on release.
    pub fn set_key_state(&mut self, key: BeebKey, new_state: bool) -> bool {
        if key == keys::BREAK {
            if new_state != self.state.resetting {
                self.state.resetting = new_state;
                if new_state {
                    self.state.cpu.halt();
                } else {
                    self.state.cpu.reset();
                    self.stop_paste();
                }
                return true;
            }
            return false;
        }

        let mask = 1u8 << (key >> 4);
        let column = &mut self.state.key_columns[(key & 0x0F) as usize];
        let old_state = *column & mask != 0;

        if !old_state && new_state {
            self.state.num_keys_down += 1;
            *column |= mask;
            true
        } else if old_state && !new_state {
            self.state.num_keys_down -= 1;
            *column &= !mask;
            true
        } else {
            false
        }
    }

    pub fn num_keys_down(&self) -> u8 {
        self.state.num_keys_down
    }

    // ----------------------------------------------------------------
    // Paste
    // ----------------------------------------------------------------

    pub fn is_pasting(&self) -> bool {
        self.state.hack_flags & HACK_FLAG_PASTE != 0
    }

    /// Kick off a paste: press the start key so the MOS enters its read
    /// loop, then feed bytes through the OSRDCH intercept.
    pub fn start_paste(&mut self, text: Arc<[u8]>) {
        self.stop_paste();

        self.state.hack_flags |= HACK_FLAG_PASTE;
        self.state.paste_state = PasteState::Wait;
        self.state.paste_text = Some(text);
        self.state.paste_index = 0;
        self.state.paste_wait_end = self.state.cycles + 2_000_000;

        self.set_key_state(keys::PASTE_START_KEY, true);
        self.update_data_bus_fn();
    }

    pub fn stop_paste(&mut self) {
        self.state.paste_state = PasteState::None;
        self.state.paste_index = 0;
        self.state.paste_text = None;
        self.state.hack_flags &= !HACK_FLAG_PASTE;
        self.update_data_bus_fn();
    }

    // ----------------------------------------------------------------
    // ROMs and RAM banks
    // ----------------------------------------------------------------

    pub fn set_os_rom(&mut self, data: Arc<RomData>) {
        self.state.os_rom = Some(data);
        self.init_big_pages();
    }

    pub fn set_sideways_rom(&mut self, bank: u8, data: Option<Arc<RomData>>) {
        let bank = (bank & 0x0F) as usize;
        self.state.sideways_roms[bank] = data;
        self.state.sideways_rams[bank] = None;
        self.init_big_pages();
    }

    /// Configure a bank as sideways RAM, optionally preloaded.
    pub fn set_sideways_ram(&mut self, bank: u8, initial: Option<&[u8]>) {
        let bank = (bank & 0x0F) as usize;
        let mut ram = vec![0u8; ROM_SIZE];
        if let Some(initial) = initial {
            let len = initial.len().min(ROM_SIZE);
            ram[..len].copy_from_slice(&initial[..len]);
        }
        self.state.sideways_roms[bank] = None;
        self.state.sideways_rams[bank] = Some(ram);
        self.init_big_pages();
    }

    // ----------------------------------------------------------------
    // Discs
    // ----------------------------------------------------------------

    pub fn set_disc_image(&mut self, drive: usize, image: Option<DiscImage>) {
        if drive < self.disc_images.len() {
            self.disc_images[drive] = image;
        }
    }

    pub fn disc_image(&self, drive: usize) -> Option<&DiscImage> {
        self.disc_images.get(drive).and_then(|d| d.as_ref())
    }

    /// True if any disc access happened since the last call.
    pub fn take_disc_access_flag(&mut self) -> bool {
        std::mem::replace(&mut self.disc_access, false)
    }

    // ----------------------------------------------------------------
    // Host hooks
    // ----------------------------------------------------------------

    /// Register a per-instruction callback; it stays installed until it
    /// returns false.
    pub fn add_instruction_fn(&mut self, callback: InstructionFn) {
        self.instruction_fns.push(callback);
        self.update_data_bus_fn();
    }

    /// Install an emulator-external peripheral at one MMIO address.
    /// Passing None for a side leaves that side unmapped/discarded.
    /// External handlers are wiring, not state: they do not survive
    /// cloning.
    pub fn set_mmio_fns(
        &mut self,
        addr: u16,
        read: Option<Box<dyn FnMut(u16) -> u8>>,
        write: Option<Box<dyn FnMut(u16, u8)>>,
    ) {
        use mmio::{MmioRead, MmioWrite};

        debug_assert!((0xFC00..0xFF00).contains(&addr));

        let index = self.external_mmio.len() as u16;
        let read_op = if read.is_some() { MmioRead::External(index) } else { MmioRead::Unmapped };
        let write_op =
            if write.is_some() { MmioWrite::External(index) } else { MmioWrite::Discard };
        self.external_mmio.push(ExternalMmioFns { read, write });
        self.mmio.set(addr, read_op, write_op);
    }

    pub fn has_link_handler(&self) -> bool {
        self.link_handler.is_some()
    }

    // ----------------------------------------------------------------
    // Status for the host UI
    // ----------------------------------------------------------------

    pub fn leds(&self) -> Leds {
        Leds {
            caps_lock: self.state.addressable_latch & LATCH_CAPS_LOCK_LED == 0,
            shift_lock: self.state.addressable_latch & LATCH_SHIFT_LOCK_LED == 0,
            drives: [self.state.drives[0].motor, self.state.drives[1].motor],
        }
    }

    /// Master NVRAM contents (the RTC's battery RAM).
    pub fn nvram_contents(&self) -> Option<Vec<u8>> {
        self.model.has_rtc().then(|| self.state.rtc.ram_contents().to_vec())
    }

    pub fn teletext_debug(&self) -> bool {
        self.state.saa5050.is_debug()
    }

    pub fn set_teletext_debug(&mut self, debug: bool) {
        self.state.saa5050.set_debug(debug);
    }

    // ----------------------------------------------------------------
    // Tracing
    // ----------------------------------------------------------------

    pub fn start_trace(&mut self, flags: u32, max_bytes: usize) {
        let mut sink = TraceSink::new(max_bytes);
        sink.push(self.state.cycles, TraceEvent::Initial(self.state.cpu.snapshot()));
        self.trace = Some(sink);
        self.trace_flags = flags;
        self.trace_instruction_pending = false;
        self.update_data_bus_fn();
    }

    pub fn stop_trace(&mut self) -> Option<TraceSink> {
        let sink = self.trace.take();
        self.trace_flags = 0;
        self.update_data_bus_fn();
        sink
    }

    pub fn trace_stats(&self) -> Option<TraceStats> {
        self.trace.as_ref().map(|t| t.stats())
    }

    // ----------------------------------------------------------------
    // Cloning
    // ----------------------------------------------------------------

    /// Bitmask of reasons this machine cannot be cloned right now.
    pub fn clone_impediments(&self) -> u32 {
        let mut result = 0;

        for (drive, image) in self.disc_images.iter().enumerate() {
            if let Some(image) = image {
                if !image.can_clone() {
                    result |= CLONE_IMPEDIMENT_DRIVE_0 << drive;
                }
            }
        }

        if self.link_handler.is_some() {
            result |= CLONE_IMPEDIMENT_LINK;
        }

        result
    }

    /// Duplicate the machine: state is copied, disc images are shared
    /// copy-on-write, and all the derived wiring is rebuilt. Debug
    /// state, trace sinks and host callbacks do not carry over.
    pub fn clone_machine(&self) -> Result<Box<Machine>, CloneError> {
        let impediments = self.clone_impediments();
        if impediments != 0 {
            return Err(CloneError::CloneImpedimentsSet(impediments));
        }

        let disc_images = [
            self.disc_images[0].as_ref().map(|d| d.clone_image()),
            self.disc_images[1].as_ref().map(|d| d.clone_image()),
        ];

        let mut machine = Machine {
            state: self.state.clone(),
            model: self.model,
            disc_interface: self.disc_interface,
            disc_images,
            video_nula: self.video_nula,
            ext_mem_fitted: self.ext_mem_fitted,
            big_pages: [BigPage::unmapped(); NUM_BIG_PAGES as usize],
            pages: MemoryPages::new(),
            shadow_pages: None,
            pc_page_maps: [MapSel::Default; 256],
            mmio: MmioTables::new(),
            external_mmio: Vec::new(),
            scratch: Box::new([0; BIG_PAGE_SIZE_BYTES]),
            debug: None,
            trace: None,
            trace_flags: 0,
            trace_instruction_pending: false,
            instruction_fns: Vec::new(),
            async_call_fn: None,
            link_handler: None,
            data_bus: DataBusHandler::MainOnly,
            hacks: false,
            disc_access: false,
            last_video_access_address: 0,
        };
        machine.init_stuff();
        Ok(Box::new(machine))
    }
}
