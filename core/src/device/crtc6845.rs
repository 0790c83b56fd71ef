/// HD6845 CRT Controller
///
/// Generates the video timing chain: character/scanline counters, sync
/// pulses, display enable, the refresh memory address and the cursor
/// strobe. The BBC Micro clocks it at 1 MHz normally and 2 MHz in the
/// high-bandwidth modes (video ULA "fast 6845" bit).
///
/// # Registers (written through the address/data port pair)
///
/// | Reg | Name                 | Notes                                 |
/// |-----|----------------------|---------------------------------------|
/// | R0  | Horizontal total     | characters - 1                        |
/// | R1  | Horizontal displayed |                                       |
/// | R2  | Horizontal sync pos  |                                       |
/// | R3  | Sync widths          | low nibble H, high nibble V (0 = 16)  |
/// | R4  | Vertical total       | character rows - 1                    |
/// | R5  | Vertical adjust      | extra scanlines                       |
/// | R6  | Vertical displayed   |                                       |
/// | R7  | Vertical sync pos    |                                       |
/// | R8  | Interlace & skew     | interlace modes only partially used   |
/// | R9  | Max raster address   | scanlines per row - 1                 |
/// | R10 | Cursor start         | bits 6:5 = blink mode                 |
/// | R11 | Cursor end           |                                       |
/// | R12 | Start address high   | 6 bits                                |
/// | R13 | Start address low    |                                       |
/// | R14 | Cursor address high  |                                       |
/// | R15 | Cursor address low   |                                       |
/// | R16 | Light pen high       | read only (not driven here)           |
/// | R17 | Light pen low        | read only                             |
#[derive(Clone, Debug, PartialEq)]
pub struct Crtc6845 {
    registers: [u8; 18],
    address: u8,

    // Timing chain
    column: u8,       // horizontal character counter
    row: u8,          // vertical character row counter
    raster: u8,       // scanline within the row
    in_adjust: bool,  // inside the R5 vertical adjust area
    adjust_left: u8,
    ma: u16,          // refresh address for the current character
    row_start_ma: u16,

    hsync_left: u8,
    vsync_left: u8,
    vsync_active: bool,

    // Cursor blink: counts fields, toggled per the R10 blink mode.
    field_count: u8,
}

/// Per-clock output pins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrtcOutput {
    pub hsync: bool,
    pub vsync: bool,
    pub display: bool,
    pub cudisp: bool,
    pub address: u16,
    pub raster: u8,
}

/// Write masks: unimplemented high bits read back as zero.
const REGISTER_MASKS: [u8; 18] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0x7F, 0x1F, 0x7F, 0x7F, 0xFF, 0x1F, 0x7F, 0x1F, 0x3F, 0xFF, 0x3F,
    0xFF, 0x3F, 0xFF,
];

impl Crtc6845 {
    pub fn new() -> Self {
        Self {
            registers: [0; 18],
            address: 0,
            column: 0,
            row: 0,
            raster: 0,
            in_adjust: false,
            adjust_left: 0,
            ma: 0,
            row_start_ma: 0,
            hsync_left: 0,
            vsync_left: 0,
            vsync_active: false,
            field_count: 0,
        }
    }

    pub fn write_address(&mut self, value: u8) {
        self.address = value & 0x1F;
    }

    pub fn read_address(&self) -> u8 {
        0
    }

    pub fn write_data(&mut self, value: u8) {
        let reg = self.address as usize;
        if reg < 16 {
            self.registers[reg] = value & REGISTER_MASKS[reg];
        }
    }

    pub fn read_data(&self) -> u8 {
        let reg = self.address as usize;
        // R12/R13 read as zero on the real 6845; R14-R17 are readable.
        if (14..18).contains(&reg) { self.registers[reg] } else { 0 }
    }

    pub fn register(&self, reg: usize) -> u8 {
        self.registers[reg]
    }

    fn screen_start(&self) -> u16 {
        (self.registers[12] as u16) << 8 | self.registers[13] as u16
    }

    fn cursor_address(&self) -> u16 {
        (self.registers[14] as u16) << 8 | self.registers[15] as u16
    }

    fn cursor_visible(&self) -> bool {
        match self.registers[10] >> 5 & 0x03 {
            0x00 => true,
            0x01 => false,
            // Blink at 1/16 or 1/32 field rate.
            0x02 => self.field_count & 0x08 != 0,
            _ => self.field_count & 0x10 != 0,
        }
    }

    /// Advance one character clock and sample the output pins.
    pub fn update(&mut self) -> CrtcOutput {
        let r0 = self.registers[0];
        let r9 = self.registers[9];

        let display_h = self.column < self.registers[1];
        let display_v = self.row < self.registers[6] && !self.in_adjust;
        let display = display_h && display_v && self.raster <= r9;

        let cudisp = display
            && self.ma == self.cursor_address()
            && self.raster >= self.registers[10] & 0x1F
            && self.raster <= self.registers[11] & 0x1F
            && self.cursor_visible();

        let output = CrtcOutput {
            hsync: self.hsync_left > 0,
            vsync: self.vsync_active,
            display,
            cudisp,
            address: self.ma & 0x3FFF,
            raster: self.raster,
        };

        if display_h && display_v {
            self.ma = self.ma.wrapping_add(1) & 0x3FFF;
        }

        // Horizontal sync.
        if self.column == self.registers[2] && self.hsync_left == 0 {
            let width = self.registers[3] & 0x0F;
            self.hsync_left = if width == 0 { 16 } else { width };
        } else if self.hsync_left > 0 {
            self.hsync_left -= 1;
        }

        // Vertical sync runs in scanline units, decremented at line end.
        self.column += 1;
        if self.column > r0 {
            self.column = 0;
            self.end_of_line();
        }

        output
    }

    fn end_of_line(&mut self) {
        if self.vsync_left > 0 {
            self.vsync_left -= 1;
            if self.vsync_left == 0 {
                self.vsync_active = false;
            }
        }

        let r9 = self.registers[9];

        if self.in_adjust {
            if self.adjust_left == 0 {
                self.start_frame();
            } else {
                self.adjust_left -= 1;
                self.raster = self.raster.wrapping_add(1) & 0x1F;
                self.ma = self.row_start_ma;
            }
            return;
        }

        if self.raster >= r9 {
            self.raster = 0;
            self.ma = self.row_start_ma.wrapping_add(self.registers[1] as u16) & 0x3FFF;
            self.row_start_ma = self.ma;
            self.row += 1;

            if self.row == self.registers[7] && !self.vsync_active {
                self.vsync_active = true;
                let width = self.registers[3] >> 4;
                self.vsync_left = if width == 0 { 16 } else { width };
                self.field_count = self.field_count.wrapping_add(1);
            }

            if self.row > self.registers[4] {
                let adjust = self.registers[5];
                if adjust == 0 {
                    self.start_frame();
                } else {
                    self.in_adjust = true;
                    self.adjust_left = adjust - 1;
                }
            }
        } else {
            self.raster += 1;
            self.ma = self.row_start_ma;
        }
    }

    fn start_frame(&mut self) {
        self.row = 0;
        self.raster = 0;
        self.in_adjust = false;
        self.ma = self.screen_start();
        self.row_start_ma = self.ma;
    }
}

impl Default for Crtc6845 {
    fn default() -> Self {
        Self::new()
    }
}
