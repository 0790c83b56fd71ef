//! Paging: translating ROMSEL/ACCCON into the active page maps.
//!
//! Big pages are populated once from the configured buffers; paging
//! register changes then re-point the page maps. Writes that do not
//! change any recognised bit skip the remap entirely.

use super::memory::{
    ANDY_BIG_PAGE_INDEX, BPLUS_RAM_BIG_PAGE_INDEX, BigPage, HAZEL_BIG_PAGE_INDEX,
    MAIN_BIG_PAGE_INDEX, MapSel, MemRef, MemRegion, MemoryPages, NUM_ANDY_BIG_PAGES,
    NUM_BPLUS_RAM_BIG_PAGES, NUM_HAZEL_BIG_PAGES, NUM_MAIN_BIG_PAGES, NUM_MOS_BIG_PAGES,
    NUM_ROM_BIG_PAGES, NUM_SHADOW_BIG_PAGES, ROM0_BIG_PAGE_INDEX, SHADOW_BIG_PAGE_INDEX,
};
use super::model::{
    ACCCON_D, ACCCON_E, ACCCON_TST, ACCCON_X, ACCCON_Y, BPLUS_ACCCON_SHADOW, Model,
    ROMSEL_BANK_MASK, ROMSEL_RAM, SCREEN_WRAP_ADJUSTMENTS,
};
use super::{Machine, memory};

impl Machine {
    // ----------------------------------------------------------------
    // Big page initialisation
    // ----------------------------------------------------------------

    fn init_some_big_pages(
        &mut self,
        index: u8,
        num: u8,
        read: Option<MemRef>,
        write: Option<MemRef>,
        code: char,
    ) {
        for i in 0..num {
            let advance = |r: Option<MemRef>| {
                r.map(|r| MemRef {
                    region: r.region,
                    offset: r.offset + i as u32 * memory::BIG_PAGE_SIZE_BYTES as u32,
                })
            };
            self.big_pages[(index + i) as usize] = BigPage {
                index: index + i,
                code,
                read: advance(read),
                write: advance(write),
            };
        }
    }

    /// ANDY/HAZEL/shadow big pages. On 32K machines they alias main
    /// RAM, provenance included.
    fn init_shadow_big_pages(&mut self, index: u8, num: u8, code: char) {
        let mut actual_index = index;
        let mut code = code;
        if self.state.ram.len() < 65536 {
            actual_index -= ANDY_BIG_PAGE_INDEX;
            code = 'm';
        }

        let base = MemRef {
            region: MemRegion::MainRam,
            offset: actual_index as u32 * memory::BIG_PAGE_SIZE_BYTES as u32,
        };
        self.init_some_big_pages(index, num, Some(base), Some(base), code);
    }

    fn init_sideways_rom_big_pages(&mut self, bank: u8) {
        let index = ROM0_BIG_PAGE_INDEX + bank * NUM_ROM_BIG_PAGES;
        let code = memory::rom_bank_code(bank);

        if self.state.sideways_roms[bank as usize].is_some() {
            let base = MemRef { region: MemRegion::SidewaysRom(bank), offset: 0 };
            self.init_some_big_pages(index, NUM_ROM_BIG_PAGES, Some(base), None, code);
        } else if self.state.sideways_rams[bank as usize].is_some() {
            let base = MemRef { region: MemRegion::SidewaysRam(bank), offset: 0 };
            self.init_some_big_pages(index, NUM_ROM_BIG_PAGES, Some(base), Some(base), code);
        } else {
            self.init_some_big_pages(index, NUM_ROM_BIG_PAGES, None, None, code);
        }
    }

    pub(crate) fn init_big_pages(&mut self) {
        self.big_pages = [BigPage::unmapped(); memory::NUM_BIG_PAGES as usize];
        self.pages = MemoryPages::new();
        if let Some(shadow) = &mut self.shadow_pages {
            **shadow = MemoryPages::new();
        }

        let main = MemRef { region: MemRegion::MainRam, offset: 0 };
        self.init_some_big_pages(MAIN_BIG_PAGE_INDEX, NUM_MAIN_BIG_PAGES, Some(main), Some(main), 'm');

        self.init_shadow_big_pages(ANDY_BIG_PAGE_INDEX, NUM_ANDY_BIG_PAGES, 'n');

        // HAZEL doesn't exist on the B+; that region is part of ANDY.
        self.init_shadow_big_pages(
            HAZEL_BIG_PAGE_INDEX,
            NUM_HAZEL_BIG_PAGES,
            self.model().hazel_code(),
        );

        self.init_shadow_big_pages(SHADOW_BIG_PAGE_INDEX, NUM_SHADOW_BIG_PAGES, 's');

        for bank in 0..16 {
            self.init_sideways_rom_big_pages(bank);
        }

        let os = self
            .state
            .os_rom
            .as_ref()
            .map(|_| MemRef { region: MemRegion::Os, offset: 0 });
        self.init_some_big_pages(memory::MOS_BIG_PAGE_INDEX, NUM_MOS_BIG_PAGES, os, None, 'o');

        // Reconfigure the paging.

        // Pages 0x00-0x2F are main RAM in both maps.
        self.set_pages(true, MAIN_BIG_PAGE_INDEX, 3, 0x0);

        // Pages 0x30-0x7F: main RAM in the default map...
        self.set_pages(false, MAIN_BIG_PAGE_INDEX + 3, 5, 0x3);

        // ...and shadow RAM in the shadow map.
        if self.shadow_pages.is_some() {
            self.set_shadow_only_pages(SHADOW_BIG_PAGE_INDEX, NUM_SHADOW_BIG_PAGES, 0x3);
        }

        // Pages 0x80-0xBF.
        self.update_romsel_pages();

        // Pages 0xC0-0xFF.
        self.set_pages(true, memory::MOS_BIG_PAGE_INDEX, NUM_MOS_BIG_PAGES, 0xC);

        // Update ACCCON last - updating the OS pages may have made a
        // mess on the Master.
        self.update_acccon_pages(None);

    }

    // ----------------------------------------------------------------
    // Page map plumbing
    // ----------------------------------------------------------------

    /// Install big pages into the default map and, when `both`, the
    /// shadow map too.
    pub(crate) fn set_pages(&mut self, both: bool, index: u8, num: u8, dest: u8) {
        memory::apply_pages(&mut self.pages, &self.big_pages, index, num, dest);
        if both {
            if let Some(shadow) = &mut self.shadow_pages {
                memory::apply_pages(shadow, &self.big_pages, index, num, dest);
            }
        }
    }

    fn set_shadow_only_pages(&mut self, index: u8, num: u8, dest: u8) {
        if let Some(shadow) = &mut self.shadow_pages {
            memory::apply_pages(shadow, &self.big_pages, index, num, dest);
        }
    }

    /// Map the 16K of sideways bank `rom` at 0x8000, minus
    /// `num_skipped_big_pages` at the bottom (they stay whatever was
    /// mapped there, i.e. ANDY).
    fn set_rom_pages(&mut self, rom: u8, num_skipped_big_pages: u8) {
        self.set_pages(
            true,
            ROM0_BIG_PAGE_INDEX + rom * NUM_ROM_BIG_PAGES + num_skipped_big_pages,
            NUM_ROM_BIG_PAGES - num_skipped_big_pages,
            0x8 + num_skipped_big_pages,
        );
    }

    // ----------------------------------------------------------------
    // ROMSEL
    // ----------------------------------------------------------------

    pub(crate) fn update_romsel_pages(&mut self) {
        let romsel = self.state.romsel;
        match self.model() {
            Model::B => {
                self.set_rom_pages(romsel & ROMSEL_BANK_MASK, 0);
            }
            Model::BPlus => {
                if romsel & ROMSEL_RAM != 0 {
                    self.set_pages(true, BPLUS_RAM_BIG_PAGE_INDEX, NUM_BPLUS_RAM_BIG_PAGES, 0x8);
                    self.set_rom_pages(romsel & ROMSEL_BANK_MASK, NUM_BPLUS_RAM_BIG_PAGES);
                } else {
                    self.set_rom_pages(romsel & ROMSEL_BANK_MASK, 0);
                }
            }
            Model::Master => {
                if romsel & ROMSEL_RAM != 0 {
                    self.set_pages(true, ANDY_BIG_PAGE_INDEX, NUM_ANDY_BIG_PAGES, 0x8);
                    self.set_rom_pages(romsel & ROMSEL_BANK_MASK, NUM_ANDY_BIG_PAGES);
                } else {
                    self.set_rom_pages(romsel & ROMSEL_BANK_MASK, 0);
                }
            }
        }
    }

    pub(crate) fn write_romsel(&mut self, value: u8) {
        let mask = self.model().romsel_mask();
        if (self.state.romsel ^ value) & mask != 0 {
            self.state.romsel = value & mask;
            self.update_romsel_pages();
        }
    }

    // ----------------------------------------------------------------
    // ACCCON
    // ----------------------------------------------------------------

    /// Usr/MOS shadow selection:
    ///
    /// ```text
    /// YXE  Usr  MOS
    /// ---  ---  ---
    /// 000   M    M
    /// 001   M    S
    /// 010   S    M
    /// 011   S    S
    /// 1x0   M    M
    /// 1x1   S    S   (MOS follows X when Y is set)
    /// ```
    fn does_mos_use_shadow(acccon: u8) -> bool {
        if acccon & ACCCON_Y != 0 { acccon & ACCCON_X != 0 } else { acccon & ACCCON_E != 0 }
    }

    pub(crate) fn update_acccon_pages(&mut self, old: Option<u8>) {
        match self.model() {
            Model::B => {
                // No ACCCON.
            }
            Model::BPlus => self.update_bplus_acccon_pages(),
            Model::Master => self.update_master_acccon_pages(old),
        }
    }

    fn update_bplus_acccon_pages(&mut self) {
        let shadow = self.state.acccon & BPLUS_ACCCON_SHADOW != 0;
        let sel = if shadow { MapSel::Shadow } else { MapSel::Default };
        self.state.shadow_select_mask = if shadow { 0x8000 } else { 0x0000 };

        // VDU drivers live at 0xA000-0xAFFF and 0xC000-0xDFFF; those
        // are the instruction pages that see shadow RAM.
        for page in 0xA0..0xB0 {
            self.pc_page_maps[page] = sel;
        }
        for page in 0xC0..0xE0 {
            self.pc_page_maps[page] = sel;
        }
    }

    fn update_master_acccon_pages(&mut self, old: Option<u8>) {
        let acccon = self.state.acccon;
        let old = old.unwrap_or(!acccon);
        let diff = acccon ^ old;

        if diff & ACCCON_Y != 0 {
            if acccon & ACCCON_Y != 0 {
                // 8K filing system RAM at 0xC000.
                self.set_pages(true, HAZEL_BIG_PAGE_INDEX, NUM_HAZEL_BIG_PAGES, 0xC);
            } else {
                // MOS at 0xC000.
                self.set_pages(true, memory::MOS_BIG_PAGE_INDEX, NUM_HAZEL_BIG_PAGES, 0xC);
            }
        }

        let usr_shadow = acccon & ACCCON_X != 0;
        let mos_shadow = Self::does_mos_use_shadow(acccon);
        let old_usr_shadow = old & ACCCON_X != 0;
        let old_mos_shadow = Self::does_mos_use_shadow(old);

        if usr_shadow != old_usr_shadow || mos_shadow != old_mos_shadow {
            let usr = if usr_shadow { MapSel::Shadow } else { MapSel::Default };
            let mos = if mos_shadow { MapSel::Shadow } else { MapSel::Default };

            for page in 0x00..0xC0 {
                self.pc_page_maps[page] = usr;
            }
            for page in 0xC0..0xE0 {
                self.pc_page_maps[page] = mos;
            }
            for page in 0xE0..0x100 {
                self.pc_page_maps[page] = usr;
            }
        }

        self.state.shadow_select_mask = if acccon & ACCCON_D != 0 { 0x8000 } else { 0 };

        if diff & ACCCON_TST != 0 {
            self.mmio.rom_reads_active = acccon & ACCCON_TST != 0;
        }
    }

    pub(crate) fn write_acccon(&mut self, value: u8) {
        let mask = self.model().acccon_mask();
        if (self.state.acccon ^ value) & mask != 0 {
            let old = self.state.acccon;
            self.state.acccon = value & mask;
            self.update_acccon_pages(Some(old));
        }
    }

    // ----------------------------------------------------------------
    // Video address translation
    // ----------------------------------------------------------------

    /// Translate a CRTC refresh address to a RAM byte address. Public
    /// so a debugger can show where a screen byte lives.
    ///
    /// Addresses with bit 13 set go through the teletext base pair
    /// (selected by bit 11). Bitmap addresses with bit 12 set wrap the
    /// screen by subtracting one of four adjustments chosen by the
    /// addressable latch's screen-base bits; the address then shifts
    /// left three and picks up the raster line.
    pub fn video_address(&self, crtc_address: u16, raster: u8) -> u16 {
        let mut addr = crtc_address & 0x3FFF;

        if addr & 0x2000 != 0 {
            let base = self.model().teletext_bases()[(addr >> 11 & 1) as usize];
            (addr & 0x3FF) | base
        } else {
            if addr & 0x1000 != 0 {
                let index = (self.state.addressable_latch >> 4 & 3) as usize;
                addr = addr.wrapping_sub(SCREEN_WRAP_ADJUSTMENTS[index]);
                addr &= !0x1000;
            }

            addr <<= 3;

            // When raster >= 8 this address is bogus; the caller only
            // uses it on visible lines.
            addr | (raster & 7) as u16
        }
    }
}
