//! One 2 MHz tick: video, odd-cycle peripherals, CPU with 1 MHz
//! stretching, and the data-bus routes.

use log::debug;

use owlet_core::cpu::mos6502::{BusAccess, ReadKind};
use owlet_core::device::video_ula::CURSOR_PATTERNS;
use owlet_core::device::wd1770::FdcHandler;
use owlet_core::sound::SoundDataUnit;
use owlet_core::trace::{InstructionTraceEvent, TraceEvent};
use owlet_core::video::unit::{
    METADATA_FLAG_6845_CUDISP, METADATA_FLAG_6845_DISPEN, METADATA_FLAG_6845_RASTER0,
    METADATA_FLAG_HAS_ADDRESS, METADATA_FLAG_HAS_VALUE, METADATA_FLAG_ODD_CYCLE, UNIT_FLAG_HSYNC,
    UNIT_FLAG_VSYNC, VideoDataType, VideoDataUnit,
};

use super::memory::{BIG_PAGE_SIZE_BYTES, MapSel, MemRef, MemRegion, MemoryPages};
use super::mmio::{MmioRead, MmioWrite};
use super::{
    ASYNC_CALL_THUNK_ADDR, DataBusHandler, DriveState, HACK_FLAG_PASTE, IRQ_DEVICE_SYSTEM_VIA,
    IRQ_DEVICE_USER_VIA, LATCH_NOT_KB_WRITE, LATCH_NOT_SOUND_WRITE, LATCH_RTC_DATA_STROBE,
    LATCH_RTC_READ, Machine, NMI_DEVICE_FDC, PORTB_LATCH_VALUE, PORTB_RTC_ADDRESS_STROBE,
    PORTB_RTC_CHIP_SELECT, PasteState, SOUND_CLOCK_SHIFT, State, TRACE_FLAG_INSTRUCTIONS,
    TRACE_FLAG_SYSTEM_VIA, keys, model::Model,
};
use crate::disc::{DiscControl, DiscImage};

impl Machine {
    /// Advance the machine one 2 MHz cycle. Fills in `video_unit`;
    /// returns true when `sound_unit` was also filled in (every fourth
    /// odd cycle).
    pub fn step(&mut self, video_unit: &mut VideoDataUnit, sound_unit: &mut SoundDataUnit) -> bool {
        let odd_cycle = (self.state.cycles & 1) as u8;
        let mut sound = false;

        self.state.cycles += 1;

        video_unit.metadata.flags = 0;
        if odd_cycle != 0 {
            video_unit.metadata.flags |= METADATA_FLAG_ODD_CYCLE;
        }

        // Update video hardware.
        if self.state.video_ula.fast_6845() || odd_cycle != 0 {
            self.video_cycle(video_unit, odd_cycle != 0);
        }

        // Update display output.
        self.emit_video_unit(video_unit);

        if odd_cycle != 0 {
            self.update_keyboard();

            // Joystick buttons: not emulated, tied high.
            self.state.system_via.b.p |= 1 << 4 | 1 << 5;

            self.update_user_port();

            // Update IRQs.
            let system_irq = self.state.system_via.update();
            self.state.cpu.set_irq(IRQ_DEVICE_SYSTEM_VIA, system_irq);
            let user_irq = self.state.user_via.update();
            self.state.cpu.set_irq(IRQ_DEVICE_USER_VIA, user_irq);

            self.update_addressable_latch();

            if self.model().has_rtc() {
                self.state.rtc.update();
            }

            // Update NMI.
            let fdc_output = self.update_fdc();
            self.state.cpu.set_nmi(NMI_DEVICE_FDC, fdc_output);

            // Update sound.
            if self.state.cycles & ((1 << SOUND_CLOCK_SHIFT) - 1) == 0 {
                let write_enable = self.state.addressable_latch & LATCH_NOT_SOUND_WRITE == 0;
                let data = self.state.system_via.a.p;
                sound_unit.sn_output = self.state.sn76489.update(write_enable, data);
                sound_unit.disc_drive_sound = self.update_disc_drive_sound();
                sound = true;
            }

            self.state.old_addressable_latch = self.state.addressable_latch;
        }

        // Update CPU.
        if self.state.stretched_cycles_left > 0 {
            self.state.stretched_cycles_left -= 1;
        } else if !self.state.cpu.is_halted() {
            self.state.cpu.step();

            let hi = (self.state.cpu.abus >> 8) as u8;
            let mmio_page = hi.wrapping_sub(0xFC);
            if mmio_page < 3 {
                let lo = self.state.cpu.abus as u8;
                let stretch = if self.state.cpu.access.is_read() {
                    self.mmio.read_stretch(mmio_page, lo)
                } else {
                    self.mmio.write_stretch(mmio_page, lo)
                };
                self.state.stretched_cycles_left = (1 + odd_cycle) & stretch;
            }
        }

        if self.state.stretched_cycles_left == 0 && !self.state.cpu.is_halted() {
            if self.hacks {
                self.handle_data_bus_with_hacks();
            } else {
                self.handle_data_bus();
            }
        }

        sound
    }

    // ----------------------------------------------------------------
    // Video
    // ----------------------------------------------------------------

    fn video_cycle(&mut self, video_unit: &mut VideoDataUnit, odd_cycle: bool) {
        let output = self.state.crtc.update();

        self.state.system_via.a.c1 = output.vsync;
        self.state.cursor_pattern >>= 1;

        let addr = self.video_address(output.address, output.raster) | self.state.shadow_select_mask;

        // Teletext update.
        if odd_cycle {
            if output.vsync && !self.state.crtc_last_output.vsync {
                self.state.last_frame_cycles = self.state.cycles - self.state.last_vsync_cycles;
                self.state.last_vsync_cycles = self.state.cycles;
                self.state.saa5050.vsync();
            }

            if self.state.video_ula.teletext() {
                // Line sequencing follows DISPEN, the pin the SAA5050's
                // LOSE input is wired to.
                if output.display {
                    if !self.state.crtc_last_output.display {
                        self.state.saa5050.start_of_line();
                    }
                } else {
                    self.state.ic15_byte |= 0x40;
                    if self.state.crtc_last_output.display {
                        self.state.saa5050.end_of_line();
                    }
                }
            }

            let latched = self.state.ic15_byte;
            self.state.saa5050.byte(latched, output.display);

            self.state.ic15_byte =
                if output.address & 0x2000 != 0 { self.video_ram_byte(addr) } else { 0 };

            video_unit.metadata.flags |= METADATA_FLAG_HAS_VALUE;
            video_unit.metadata.value = self.state.ic15_byte;
        }

        if !self.state.video_ula.teletext() {
            if !self.state.crtc_last_output.display {
                self.state.video_ula.display_enabled();
            }

            let value = self.video_ram_byte(addr);
            self.state.video_ula.byte(value);

            video_unit.metadata.flags |= METADATA_FLAG_HAS_VALUE;
            video_unit.metadata.value = value;
        }

        if output.cudisp {
            self.state.cursor_pattern = CURSOR_PATTERNS[self.state.video_ula.cursor_shape()];
        }

        self.last_video_access_address = addr;
        video_unit.metadata.flags |= METADATA_FLAG_HAS_ADDRESS;
        video_unit.metadata.address = addr;

        self.state.crtc_last_output = output;
    }

    /// Both RAM sizes are powers of two, so the shadow select mask just
    /// falls away on 32K machines.
    fn video_ram_byte(&self, addr: u16) -> u8 {
        self.state.ram[addr as usize & (self.state.ram.len() - 1)]
    }

    fn emit_video_unit(&mut self, video_unit: &mut VideoDataUnit) {
        let last = self.state.crtc_last_output;

        if last.raster == 0 {
            video_unit.metadata.flags |= METADATA_FLAG_6845_RASTER0;
        }
        if last.display {
            video_unit.metadata.flags |= METADATA_FLAG_6845_DISPEN;
        }
        if last.cudisp {
            video_unit.metadata.flags |= METADATA_FLAG_6845_CUDISP;
        }

        if self.state.video_ula.teletext() {
            self.state.saa5050.emit_pixels(video_unit);

            if self.state.cursor_pattern & 1 != 0 {
                video_unit.pixels[0] ^= 0x0FFF;
                video_unit.pixels[1] ^= 0x0FFF;
            }
        } else {
            video_unit.kind = VideoDataType::Bitmap16MHz;

            if last.display && last.raster < 8 {
                self.state.video_ula.emit_pixels(video_unit);

                if self.state.cursor_pattern & 1 != 0 {
                    for pixel in video_unit.pixels.iter_mut() {
                        *pixel ^= 0x0FFF;
                    }
                }
            } else {
                let fill = if self.state.cursor_pattern & 1 != 0 { 0x0FFF } else { 0 };
                video_unit.pixels = [fill; 8];
            }
        }

        video_unit.flags = 0;
        if last.hsync {
            video_unit.flags |= UNIT_FLAG_HSYNC;
        }
        if last.vsync {
            video_unit.flags |= UNIT_FLAG_VSYNC;
        }
    }

    // ----------------------------------------------------------------
    // Odd-cycle peripherals
    // ----------------------------------------------------------------

    fn update_keyboard(&mut self) {
        if self.state.addressable_latch & LATCH_NOT_KB_WRITE != 0 {
            // Auto scan: walk the columns; any key outside row 0 in the
            // current column raises CA2.
            let column = self.state.key_columns[self.state.key_scan_column as usize];
            self.state.system_via.a.c2 = column & 0xFE != 0;

            self.state.key_scan_column = (self.state.key_scan_column + 1) & 0x0F;
        } else {
            // Manual scan: port A low bits select a cell, bit 7 reads it
            // back.
            let key = self.state.system_via.a.p & 0x7F;
            let kcol = (key & 0x0F) as usize;
            let krow = key >> 4;

            let column = self.state.key_columns[kcol];

            // Row 0 doesn't cause an interrupt.
            self.state.system_via.a.c2 = column & 0xFE != 0;

            self.state.system_via.a.p &= 0x7F;
            if column & 1 << krow != 0 {
                self.state.system_via.a.p |= 0x80;
            }
        }
    }

    fn update_user_port(&mut self) {
        match &mut self.link_handler {
            Some(handler) => handler.update(&mut self.state.user_via),
            None => {
                // Nothing connected to the user port.
                self.state.user_via.b.p = 0xFF;
                self.state.user_via.b.c1 = true;
            }
        }
    }

    fn update_addressable_latch(&mut self) {
        let pb = self.state.system_via.b.p;
        if pb == self.state.old_system_via_pb {
            return;
        }

        let mask = 1u8 << (pb & 0x07);
        self.state.addressable_latch &= !mask;
        if pb & PORTB_LATCH_VALUE != 0 {
            self.state.addressable_latch |= mask;
        }

        if let Some(trace) = &mut self.trace {
            if self.trace_flags & TRACE_FLAG_SYSTEM_VIA != 0 {
                trace.push(self.state.cycles, TraceEvent::PortB(pb));
            }
        }

        if self.model() == Model::Master && pb & PORTB_RTC_CHIP_SELECT != 0 {
            let port_a = self.state.system_via.a.p;
            let old_pb = self.state.old_system_via_pb;

            // Address latched on the falling edge of AS.
            if old_pb & PORTB_RTC_ADDRESS_STROBE != 0 && pb & PORTB_RTC_ADDRESS_STROBE == 0 {
                self.state.rtc.set_address(port_a);
            }

            let toggled = self.state.old_addressable_latch ^ self.state.addressable_latch;
            if toggled & LATCH_RTC_DATA_STROBE != 0 {
                if self.state.addressable_latch & LATCH_RTC_DATA_STROBE != 0 {
                    // 0 -> 1
                    if self.state.addressable_latch & LATCH_RTC_READ != 0 {
                        self.state.system_via.a.p = self.state.rtc.read();
                    }
                } else {
                    // 1 -> 0
                    if self.state.addressable_latch & LATCH_RTC_READ == 0 {
                        self.state.rtc.set_data(port_a);
                    }
                }
            }
        }

        self.state.old_system_via_pb = pb;
    }

    fn update_fdc(&mut self) -> bool {
        let control = self.state.disc_control;
        let State { fdc, drives, .. } = &mut self.state;
        let mut port = DrivePort {
            drives,
            images: &mut self.disc_images,
            control,
            disc_access: &mut self.disc_access,
        };
        fdc.update(&mut port).nmi_level()
    }

    fn update_disc_drive_sound(&mut self) -> f32 {
        let mut sample = 0.0;
        for drive in self.state.drives.iter_mut() {
            sample += super::drive_sounds::next_sample(drive);
        }
        sample
    }

    // ----------------------------------------------------------------
    // Memory resolution
    // ----------------------------------------------------------------

    pub(crate) fn read_mem(&self, mem: MemRef, lo: u8) -> u8 {
        let index = mem.offset as usize + lo as usize;
        match mem.region {
            MemRegion::MainRam => self.state.ram[index],
            MemRegion::SidewaysRom(bank) => match &self.state.sideways_roms[bank as usize] {
                Some(rom) => rom[index],
                None => 0,
            },
            MemRegion::SidewaysRam(bank) => match &self.state.sideways_rams[bank as usize] {
                Some(ram) => ram[index],
                None => 0,
            },
            MemRegion::Os => match &self.state.os_rom {
                Some(rom) => rom[index],
                None => 0,
            },
            MemRegion::Zeros => 0,
            MemRegion::Scratch => self.scratch[index & (BIG_PAGE_SIZE_BYTES - 1)],
        }
    }

    pub(crate) fn write_mem(&mut self, mem: MemRef, lo: u8, value: u8) {
        let index = mem.offset as usize + lo as usize;
        match mem.region {
            MemRegion::MainRam => self.state.ram[index] = value,
            MemRegion::SidewaysRam(bank) => {
                if let Some(ram) = &mut self.state.sideways_rams[bank as usize] {
                    ram[index] = value;
                }
            }
            MemRegion::Scratch => self.scratch[index & (BIG_PAGE_SIZE_BYTES - 1)] = value,
            // ROM, MOS and zeros never appear on the write side; the
            // page maps substitute the scratch sink for them.
            MemRegion::SidewaysRom(_) | MemRegion::Os | MemRegion::Zeros => {}
        }
    }

    /// The page map in effect for the current data-bus cycle.
    pub(crate) fn active_map(&self, shadow: bool) -> &MemoryPages {
        if shadow {
            let hi = (self.state.cpu.opcode_pc >> 8) as usize;
            if self.pc_page_maps[hi] == MapSel::Shadow {
                if let Some(shadow_pages) = &self.shadow_pages {
                    return shadow_pages;
                }
            }
        }
        &self.pages
    }

    /// Write through the default page map (used by the async-call stack
    /// fixup; the stack page is main RAM in every map).
    pub(crate) fn write_through_pages(&mut self, addr: u16, value: u8) {
        let mem = self.pages.writes[(addr >> 8) as usize];
        self.write_mem(mem, addr as u8, value);
    }

    // ----------------------------------------------------------------
    // Data bus routes
    // ----------------------------------------------------------------

    pub(crate) fn handle_data_bus(&mut self) {
        match self.data_bus {
            DataBusHandler::MainOnly => self.data_bus_cycle(false, false),
            DataBusHandler::MainOnlyDebug => self.data_bus_cycle(false, true),
            DataBusHandler::Shadow => self.data_bus_cycle(true, false),
            DataBusHandler::ShadowDebug => self.data_bus_cycle(true, true),
        }
    }

    fn data_bus_cycle(&mut self, shadow: bool, debugging: bool) {
        let abus = self.state.cpu.abus;
        let hi = (abus >> 8) as u8;
        let lo = abus as u8;
        let mmio_page = hi.wrapping_sub(0xFC);

        match self.state.cpu.access {
            BusAccess::Read(kind) => {
                let value = if mmio_page < 3 {
                    self.mmio_read(mmio_page, abus)
                } else {
                    let mem = self.active_map(shadow).reads[hi as usize];
                    self.read_mem(mem, lo)
                };
                self.state.cpu.dbus = value;

                if debugging {
                    let big_page = self.active_map(shadow).big_pages[hi as usize];
                    let flags = self.debug_flags_for(big_page, abus);
                    if flags != 0 {
                        self.handle_read_byte_debug_flags(kind, abus, flags);
                    }
                    if kind == ReadKind::Interrupt {
                        self.handle_interrupt_breakpoints();
                    }
                }
            }
            BusAccess::Write => {
                let value = self.state.cpu.dbus;
                if mmio_page < 3 {
                    self.mmio_write(mmio_page, abus, value);
                } else {
                    let mem = self.active_map(shadow).writes[hi as usize];
                    self.write_mem(mem, lo, value);
                }

                if debugging {
                    let big_page = self.active_map(shadow).big_pages[hi as usize];
                    let flags = self.debug_flags_for(big_page, abus);
                    if flags & super::debug::BYTE_FLAG_BREAK_WRITE != 0 {
                        self.debug_halt(format!("data write: ${abus:04X}"));
                    }
                }
            }
        }
    }

    // ----------------------------------------------------------------
    // MMIO dispatch
    // ----------------------------------------------------------------

    fn mmio_read(&mut self, page: u8, addr: u16) -> u8 {
        if self.mmio.rom_reads_active {
            // Master TST mode: the fetch comes from whatever ROM the
            // page map has there.
            let mem = self.pages.reads[(addr >> 8) as usize];
            return self.read_mem(mem, addr as u8);
        }

        let op = self.mmio.reads[page as usize][(addr & 0xFF) as usize];
        match op {
            MmioRead::Unmapped => 0,
            MmioRead::SystemVia(reg) => self.state.system_via.read(reg),
            MmioRead::UserVia(reg) => self.state.user_via.read(reg),
            MmioRead::CrtcAddress => self.state.crtc.read_address(),
            MmioRead::CrtcData => self.state.crtc.read_data(),
            MmioRead::Romsel => self.state.romsel,
            MmioRead::Acccon => self.state.acccon,
            MmioRead::Fdc(reg) => self.state.fdc.read(reg),
            MmioRead::DiscControl => match self.disc_interface() {
                Some(interface) => interface.byte_from_control(self.state.disc_control),
                None => 0,
            },
            MmioRead::AsyncThunk(offset) => self.state.async_call_thunk_buf[offset as usize],
            MmioRead::ExtMemAddrL => self.state.ext_mem.as_ref().map_or(0, |e| e.addr_l),
            MmioRead::ExtMemAddrH => self.state.ext_mem.as_ref().map_or(0, |e| e.addr_h),
            MmioRead::ExtMemData => {
                self.state.ext_mem.as_ref().map_or(0, |e| e.read(addr as u8))
            }
            MmioRead::External(index) => {
                match self.external_mmio.get_mut(index as usize).and_then(|f| f.read.as_mut()) {
                    Some(read) => read(addr),
                    None => 0,
                }
            }
        }
    }

    fn mmio_write(&mut self, page: u8, addr: u16, value: u8) {
        let op = self.mmio.writes[page as usize][(addr & 0xFF) as usize];
        match op {
            MmioWrite::Discard => {}
            MmioWrite::SystemVia(reg) => self.state.system_via.write(reg, value),
            MmioWrite::UserVia(reg) => self.state.user_via.write(reg, value),
            MmioWrite::CrtcAddress => self.state.crtc.write_address(value),
            MmioWrite::CrtcData => self.state.crtc.write_data(value),
            MmioWrite::UlaControl => self.state.video_ula.write_control(value),
            MmioWrite::UlaPalette => self.state.video_ula.write_palette(value),
            MmioWrite::NulaControl => self.state.video_ula.write_nula_control(value),
            MmioWrite::NulaPalette => self.state.video_ula.write_nula_palette(value),
            MmioWrite::Romsel => {
                if let Some(trace) = &mut self.trace {
                    trace.push(self.state.cycles, TraceEvent::WriteRomsel(value));
                }
                self.write_romsel(value);
            }
            MmioWrite::Acccon => {
                if let Some(trace) = &mut self.trace {
                    trace.push(self.state.cycles, TraceEvent::WriteAcccon(value));
                }
                self.write_acccon(value);
            }
            MmioWrite::Fdc(reg) => {
                let control = self.state.disc_control;
                let State { fdc, drives, .. } = &mut self.state;
                let mut port = DrivePort {
                    drives,
                    images: &mut self.disc_images,
                    control,
                    disc_access: &mut self.disc_access,
                };
                fdc.write(reg, value, &mut port);
            }
            MmioWrite::DiscControl => {
                if let Some(interface) = self.disc_interface() {
                    let control = interface.control_from_byte(value);
                    debug!(
                        "1770 control: ${value:02X}: reset={} dden={} drive={:?} side={}",
                        control.reset, control.dden, control.drive, control.side
                    );
                    self.state.disc_control = control;
                    if control.reset {
                        self.state.fdc.reset();
                    }
                    self.state.fdc.set_dden(control.dden);
                }
            }
            MmioWrite::ExtMemAddrL => {
                if let Some(ext) = &mut self.state.ext_mem {
                    ext.addr_l = value;
                }
            }
            MmioWrite::ExtMemAddrH => {
                if let Some(ext) = &mut self.state.ext_mem {
                    ext.addr_h = value;
                }
            }
            MmioWrite::ExtMemData => {
                if let Some(ext) = &mut self.state.ext_mem {
                    ext.write(addr as u8, value);
                }
            }
            MmioWrite::External(index) => {
                if let Some(write) =
                    self.external_mmio.get_mut(index as usize).and_then(|f| f.write.as_mut())
                {
                    write(addr, value);
                }
            }
        }
    }

    // ----------------------------------------------------------------
    // The hacks route
    // ----------------------------------------------------------------

    /// Extra work around the base data-bus route: async-call thunk
    /// injection, instruction callbacks, paste OSRDCH interception,
    /// trace instruction events and debugger step handling.
    pub(crate) fn handle_data_bus_with_hacks(&mut self) {
        if self.state.async_call_address.is_some() {
            if self.state.cpu.is_probably_irq() {
                self.arm_async_call_thunk();
            } else {
                self.state.async_call_timeout -= 1;
                if self.state.async_call_timeout < 0 {
                    self.finish_async_call(false);
                }
            }
        }

        self.handle_data_bus();

        if self.state.cpu.is_about_to_execute() {
            if !self.instruction_fns.is_empty() {
                let before = self.instruction_fns.len();
                let (fns, cpu) = (&mut self.instruction_fns, &self.state.cpu);
                fns.retain_mut(|callback| callback(cpu));
                if self.instruction_fns.len() != before {
                    self.update_data_bus_fn();
                }
            }

            if self.state.hack_flags & HACK_FLAG_PASTE != 0 {
                self.paste_osrdch();
            }

            if self.trace.is_some() && self.trace_flags & TRACE_FLAG_INSTRUCTIONS != 0 {
                self.trace_instruction_boundary();
            }
        }

        if self.debug.is_some() {
            if let BusAccess::Read(ReadKind::Opcode) | BusAccess::Read(ReadKind::Interrupt) =
                self.state.cpu.access
            {
                self.handle_step();
            }
        }
    }

    fn trace_instruction_boundary(&mut self) {
        let cpu = &self.state.cpu;
        let (a, x, y, p, s) = (cpu.a, cpu.x, cpu.y, cpu.p, cpu.s);
        let (data, opcode, ad, ia) = (cpu.dbus, cpu.opcode, cpu.ea, cpu.ia);
        let next_pc = cpu.abus;
        let cycles = self.state.cycles;

        if let Some(trace) = &mut self.trace {
            // Fill out the results of the last instruction.
            if self.trace_instruction_pending {
                trace.patch_last_instruction(|event| {
                    event.a = a;
                    event.x = x;
                    event.y = y;
                    event.p = p;
                    event.s = s;
                    event.data = data;
                    event.opcode = opcode;
                    event.ad = ad;
                    event.ia = ia;
                });
            }

            // Allocate the event for the next instruction.
            trace.push(
                cycles,
                TraceEvent::Instruction(InstructionTraceEvent {
                    pc: next_pc,
                    ..Default::default()
                }),
            );
            self.trace_instruction_pending = true;
        }
    }

    /// OSRDCH interception: when the CPU is about to execute at the
    /// OSRDCH entry point, supply the next pasted byte in A and turn
    /// the fetched opcode into RTS.
    fn paste_osrdch(&mut self) {
        if self.state.cpu.pc != 0xFFE1 {
            return;
        }

        match self.state.paste_state {
            PasteState::None => {}

            PasteState::Wait | PasteState::Delete => {
                if self.state.paste_state == PasteState::Wait {
                    self.set_key_state(keys::PASTE_START_KEY, false);
                }
                // Delete the pasted start-key character.
                self.state.cpu.a = 127;
                self.state.paste_state = PasteState::Paste;
            }

            PasteState::Paste => {
                let (byte, exhausted) = match &self.state.paste_text {
                    Some(text) => {
                        let byte = text[self.state.paste_index];
                        (byte, self.state.paste_index + 1 == text.len())
                    }
                    None => (0, true),
                };

                self.state.cpu.a = byte;
                self.state.paste_index += 1;
                if exhausted {
                    self.stop_paste();
                }
            }
        }

        // No Escape.
        self.state.cpu.p &= !0x01;

        // Pretend the instruction was RTS.
        self.state.cpu.dbus = 0x60;
    }

    // ----------------------------------------------------------------
    // Async 6502 calls
    // ----------------------------------------------------------------

    /// The next IRQ entry has arrived: rewrite the interrupted context
    /// so the in-flight IRQ returns into the thunk, and point the thunk
    /// at the requested call.
    fn arm_async_call_thunk(&mut self) {
        let Some(address) = self.state.async_call_address else {
            return;
        };

        // Manually push the interrupted PC and status; the thunk's
        // closing RTI consumes this frame.
        let pc = self.state.cpu.pc;
        let p = self.state.cpu.p;
        for byte in [(pc >> 8) as u8, pc as u8, p] {
            let stack_addr = 0x0100 | self.state.cpu.s as u16;
            self.write_through_pages(stack_addr, byte);
            self.state.cpu.s = self.state.cpu.s.wrapping_sub(1);
        }

        // Set up the CPU as if it were about to execute the thunk, so
        // the IRQ routine returns to the right place.
        if self.state.async_call_c {
            self.state.cpu.p |= 0x01;
        } else {
            self.state.cpu.p &= !0x01;
        }
        self.state.cpu.pc = ASYNC_CALL_THUNK_ADDR;

        let thunk = [
            0x48, // pha
            0x8A, // txa
            0x48, // pha
            0x98, // tya
            0x48, // pha
            0xA9,
            self.state.async_call_a,
            0xA2,
            self.state.async_call_x,
            0xA0,
            self.state.async_call_y,
            if self.state.async_call_c { 0x38 } else { 0x18 }, // sec : clc
            0x20, // jsr abs
            address as u8,
            (address >> 8) as u8,
            0x68, // pla
            0xA8, // tay
            0x68, // pla
            0xAA, // tax
            0x68, // pla
            0x40, // rti
        ];
        self.state.async_call_thunk_buf[..thunk.len()].copy_from_slice(&thunk);

        self.finish_async_call(true);
    }

    pub(crate) fn finish_async_call(&mut self, called: bool) {
        if let Some(callback) = self.async_call_fn.take() {
            callback(called);
        }
        self.state.async_call_address = None;
        self.state.async_call_timeout = 0;
        self.update_data_bus_fn();
    }
}

/// The FDC's view of the selected drive: routes byte traffic to the
/// right disc image using the decoded control latch.
struct DrivePort<'a> {
    drives: &'a mut [DriveState; 2],
    images: &'a mut [Option<DiscImage>; 2],
    control: DiscControl,
    disc_access: &'a mut bool,
}

impl DrivePort<'_> {
    fn drive_index(&self) -> Option<usize> {
        self.control.drive.map(|d| (d & 1) as usize)
    }
}

impl FdcHandler for DrivePort<'_> {
    fn spin_up(&mut self) {
        if let Some(drive) = self.drive_index() {
            self.drives[drive].motor = true;
        }
    }

    fn spin_down(&mut self) {
        if let Some(drive) = self.drive_index() {
            self.drives[drive].motor = false;
        }
    }

    fn step(&mut self, inward: bool) {
        if let Some(drive) = self.drive_index() {
            let drive = &mut self.drives[drive];
            drive.track =
                if inward { drive.track.saturating_add(1) } else { drive.track.saturating_sub(1) };
            super::drive_sounds::trigger_step(drive);
        }
    }

    fn track0(&self) -> bool {
        match self.drive_index() {
            Some(drive) => self.drives[drive].track == 0,
            None => false,
        }
    }

    fn write_protected(&self) -> bool {
        match self.drive_index() {
            Some(drive) => {
                self.images[drive].as_ref().is_some_and(|image| image.is_write_protected())
            }
            None => false,
        }
    }

    fn track(&self) -> u8 {
        match self.drive_index() {
            Some(drive) => self.drives[drive].track,
            None => 0,
        }
    }

    fn sector_size(&mut self, sector: u8) -> Option<usize> {
        let drive = self.drive_index()?;
        let image = self.images[drive].as_ref()?;
        image.sector_size(self.control.side, self.drives[drive].track, sector, self.control.dden)
    }

    fn read_byte(&mut self, sector: u8, offset: usize) -> Option<u8> {
        let drive = self.drive_index()?;
        *self.disc_access = true;
        let image = self.images[drive].as_ref()?;
        image.read(self.control.side, self.drives[drive].track, sector, offset)
    }

    fn write_byte(&mut self, sector: u8, offset: usize, value: u8) -> bool {
        let Some(drive) = self.drive_index() else {
            return false;
        };
        *self.disc_access = true;
        match &mut self.images[drive] {
            Some(image) => {
                image.write(self.control.side, self.drives[drive].track, sector, offset, value)
            }
            None => false,
        }
    }
}
