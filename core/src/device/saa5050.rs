//! SAA5050 teletext character generator
//!
//! Decodes one 40-column teletext row stream per displayed line: spacing
//! control codes (colours, flash, conceal, double height, graphics
//! modes, hold), a 5x9 alphanumeric glyph ROM with character rounding,
//! and 2x3 sixel block graphics (contiguous or separated).
//!
//! The chip runs at the 1 MHz character rate but the machine emits video
//! in half-character units, so output is latched per character and
//! handed out as two 6-subpixel halves: `byte()` decodes a character
//! cell, `emit_pixels()` fills a teletext video unit with the background
//! and foreground colours plus one 6-bit mask per output sub-scanline.
//! Character rounding gives the two sub-scanlines of each scanned line
//! different masks, which is what the doubled vertical resolution is
//! for.
//!
//! Line/frame sequencing is driven by the CRTC through `vsync()`,
//! `start_of_line()` and `end_of_line()` (DISPEN transitions, the same
//! wiring the hardware uses via the LOSE pin).

use crate::video::unit::{VideoDataType, VideoDataUnit};

/// Glyph ROM for characters 0x20-0x7F. 5-bit rows, bit 4 leftmost, 10
/// rows per character cell. The teletext variants (pound sign, arrows,
/// fractions) replace the ASCII glyphs at the usual positions.
#[rustfmt::skip]
const GLYPHS: [[u8; 10]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x20 ' '
    [0x00, 0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04, 0x00, 0x00], // 0x21 '!'
    [0x00, 0x0A, 0x0A, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x22 '"'
    [0x00, 0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x1F, 0x00, 0x00], // 0x23 pound
    [0x00, 0x04, 0x0F, 0x14, 0x0E, 0x05, 0x1E, 0x04, 0x00, 0x00], // 0x24 '$'
    [0x00, 0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03, 0x00, 0x00], // 0x25 '%'
    [0x00, 0x08, 0x14, 0x14, 0x08, 0x15, 0x12, 0x0D, 0x00, 0x00], // 0x26 '&'
    [0x00, 0x04, 0x04, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x27 '\''
    [0x00, 0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02, 0x00, 0x00], // 0x28 '('
    [0x00, 0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08, 0x00, 0x00], // 0x29 ')'
    [0x00, 0x04, 0x15, 0x0E, 0x04, 0x0E, 0x15, 0x04, 0x00, 0x00], // 0x2A '*'
    [0x00, 0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00, 0x00, 0x00], // 0x2B '+'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x04, 0x08, 0x00], // 0x2C ','
    [0x00, 0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x2D '-'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00], // 0x2E '.'
    [0x00, 0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00, 0x00, 0x00], // 0x2F '/'
    [0x00, 0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E, 0x00, 0x00], // 0x30 '0'
    [0x00, 0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E, 0x00, 0x00], // 0x31 '1'
    [0x00, 0x0E, 0x11, 0x01, 0x06, 0x08, 0x10, 0x1F, 0x00, 0x00], // 0x32 '2'
    [0x00, 0x1F, 0x01, 0x02, 0x06, 0x01, 0x11, 0x0E, 0x00, 0x00], // 0x33 '3'
    [0x00, 0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02, 0x00, 0x00], // 0x34 '4'
    [0x00, 0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E, 0x00, 0x00], // 0x35 '5'
    [0x00, 0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x36 '6'
    [0x00, 0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08, 0x00, 0x00], // 0x37 '7'
    [0x00, 0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x38 '8'
    [0x00, 0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C, 0x00, 0x00], // 0x39 '9'
    [0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00], // 0x3A ':'
    [0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x04, 0x04, 0x08, 0x00], // 0x3B ';'
    [0x00, 0x02, 0x04, 0x08, 0x10, 0x08, 0x04, 0x02, 0x00, 0x00], // 0x3C '<'
    [0x00, 0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00, 0x00, 0x00], // 0x3D '='
    [0x00, 0x08, 0x04, 0x02, 0x01, 0x02, 0x04, 0x08, 0x00, 0x00], // 0x3E '>'
    [0x00, 0x0E, 0x11, 0x02, 0x04, 0x04, 0x00, 0x04, 0x00, 0x00], // 0x3F '?'
    [0x00, 0x0E, 0x11, 0x17, 0x15, 0x17, 0x10, 0x0E, 0x00, 0x00], // 0x40 '@'
    [0x00, 0x04, 0x0A, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x00, 0x00], // 0x41 'A'
    [0x00, 0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E, 0x00, 0x00], // 0x42 'B'
    [0x00, 0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E, 0x00, 0x00], // 0x43 'C'
    [0x00, 0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E, 0x00, 0x00], // 0x44 'D'
    [0x00, 0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F, 0x00, 0x00], // 0x45 'E'
    [0x00, 0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10, 0x00, 0x00], // 0x46 'F'
    [0x00, 0x0E, 0x11, 0x10, 0x10, 0x13, 0x11, 0x0F, 0x00, 0x00], // 0x47 'G'
    [0x00, 0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11, 0x00, 0x00], // 0x48 'H'
    [0x00, 0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E, 0x00, 0x00], // 0x49 'I'
    [0x00, 0x01, 0x01, 0x01, 0x01, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x4A 'J'
    [0x00, 0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11, 0x00, 0x00], // 0x4B 'K'
    [0x00, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F, 0x00, 0x00], // 0x4C 'L'
    [0x00, 0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11, 0x00, 0x00], // 0x4D 'M'
    [0x00, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11, 0x00, 0x00], // 0x4E 'N'
    [0x00, 0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x4F 'O'
    [0x00, 0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10, 0x00, 0x00], // 0x50 'P'
    [0x00, 0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D, 0x00, 0x00], // 0x51 'Q'
    [0x00, 0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11, 0x00, 0x00], // 0x52 'R'
    [0x00, 0x0E, 0x11, 0x10, 0x0E, 0x01, 0x11, 0x0E, 0x00, 0x00], // 0x53 'S'
    [0x00, 0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x00], // 0x54 'T'
    [0x00, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x55 'U'
    [0x00, 0x11, 0x11, 0x11, 0x0A, 0x0A, 0x04, 0x04, 0x00, 0x00], // 0x56 'V'
    [0x00, 0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A, 0x00, 0x00], // 0x57 'W'
    [0x00, 0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11, 0x00, 0x00], // 0x58 'X'
    [0x00, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04, 0x00, 0x00], // 0x59 'Y'
    [0x00, 0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F, 0x00, 0x00], // 0x5A 'Z'
    [0x00, 0x04, 0x08, 0x1F, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00], // 0x5B left arrow
    [0x00, 0x10, 0x08, 0x04, 0x02, 0x01, 0x00, 0x00, 0x00, 0x00], // 0x5C half
    [0x00, 0x04, 0x02, 0x1F, 0x02, 0x04, 0x00, 0x00, 0x00, 0x00], // 0x5D right arrow
    [0x00, 0x04, 0x0E, 0x15, 0x04, 0x04, 0x04, 0x04, 0x00, 0x00], // 0x5E up arrow
    [0x00, 0x0A, 0x1F, 0x0A, 0x0A, 0x1F, 0x0A, 0x00, 0x00, 0x00], // 0x5F '#'
    [0x00, 0x00, 0x00, 0x00, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x00], // 0x60 dash
    [0x00, 0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F, 0x00, 0x00], // 0x61 'a'
    [0x00, 0x10, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x1E, 0x00, 0x00], // 0x62 'b'
    [0x00, 0x00, 0x00, 0x0F, 0x10, 0x10, 0x10, 0x0F, 0x00, 0x00], // 0x63 'c'
    [0x00, 0x01, 0x01, 0x0F, 0x11, 0x11, 0x11, 0x0F, 0x00, 0x00], // 0x64 'd'
    [0x00, 0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E, 0x00, 0x00], // 0x65 'e'
    [0x00, 0x06, 0x08, 0x1E, 0x08, 0x08, 0x08, 0x08, 0x00, 0x00], // 0x66 'f'
    [0x00, 0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x0E, 0x00, 0x00], // 0x67 'g'
    [0x00, 0x10, 0x10, 0x1E, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00], // 0x68 'h'
    [0x00, 0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E, 0x00, 0x00], // 0x69 'i'
    [0x00, 0x02, 0x00, 0x06, 0x02, 0x02, 0x12, 0x0C, 0x00, 0x00], // 0x6A 'j'
    [0x00, 0x10, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11, 0x00, 0x00], // 0x6B 'k'
    [0x00, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E, 0x00, 0x00], // 0x6C 'l'
    [0x00, 0x00, 0x00, 0x1A, 0x15, 0x15, 0x15, 0x15, 0x00, 0x00], // 0x6D 'm'
    [0x00, 0x00, 0x00, 0x1E, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00], // 0x6E 'n'
    [0x00, 0x00, 0x00, 0x0E, 0x11, 0x11, 0x11, 0x0E, 0x00, 0x00], // 0x6F 'o'
    [0x00, 0x00, 0x00, 0x1E, 0x11, 0x1E, 0x10, 0x10, 0x00, 0x00], // 0x70 'p'
    [0x00, 0x00, 0x00, 0x0F, 0x11, 0x0F, 0x01, 0x01, 0x00, 0x00], // 0x71 'q'
    [0x00, 0x00, 0x00, 0x16, 0x18, 0x10, 0x10, 0x10, 0x00, 0x00], // 0x72 'r'
    [0x00, 0x00, 0x00, 0x0F, 0x10, 0x0E, 0x01, 0x1E, 0x00, 0x00], // 0x73 's'
    [0x00, 0x08, 0x08, 0x1E, 0x08, 0x08, 0x08, 0x06, 0x00, 0x00], // 0x74 't'
    [0x00, 0x00, 0x00, 0x11, 0x11, 0x11, 0x13, 0x0D, 0x00, 0x00], // 0x75 'u'
    [0x00, 0x00, 0x00, 0x11, 0x11, 0x0A, 0x0A, 0x04, 0x00, 0x00], // 0x76 'v'
    [0x00, 0x00, 0x00, 0x11, 0x15, 0x15, 0x15, 0x0A, 0x00, 0x00], // 0x77 'w'
    [0x00, 0x00, 0x00, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x00, 0x00], // 0x78 'x'
    [0x00, 0x00, 0x00, 0x11, 0x11, 0x0F, 0x01, 0x0E, 0x00, 0x00], // 0x79 'y'
    [0x00, 0x00, 0x00, 0x1F, 0x02, 0x04, 0x08, 0x1F, 0x00, 0x00], // 0x7A 'z'
    [0x00, 0x10, 0x08, 0x04, 0x02, 0x05, 0x0A, 0x05, 0x00, 0x00], // 0x7B quarter
    [0x00, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x00, 0x00], // 0x7C double bar
    [0x00, 0x18, 0x09, 0x1A, 0x05, 0x0B, 0x15, 0x07, 0x00, 0x00], // 0x7D three quarters
    [0x00, 0x04, 0x00, 0x1F, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00], // 0x7E divide
    [0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F, 0x1F], // 0x7F block
];

fn primary(colour: u8) -> u16 {
    let r = if colour & 1 != 0 { 0x0F00 } else { 0 };
    let g = if colour & 2 != 0 { 0x00F0 } else { 0 };
    let b = if colour & 4 != 0 { 0x000F } else { 0 };
    r | g | b
}

/// Double a 6-bit row into 12 subpixels. Input bit 5 is the leftmost
/// pixel; output bit 0 is the leftmost subpixel (emission order).
fn double_bits(row: u8) -> u16 {
    let mut out = 0u16;
    for i in 0..6 {
        if row >> (5 - i) & 1 != 0 {
            out |= 0b11 << (i * 2);
        }
    }
    out
}

/// Character rounding: add half dots where a dot in this row is
/// diagonally adjacent to a dot in the neighbouring row.
fn rounded(row: u8, adjacent: u8) -> u16 {
    let c = double_bits(row);
    let a = double_bits(adjacent);
    c | (a & ((c << 1) | (c >> 1)))
}

/// Sixel glyph row (6 pixels, bit 5 leftmost) for a graphics character.
/// Character bits 0/1 = top pair, 2/3 = middle, 4/6 = bottom.
fn sixel_row(ch: u8, row: u8, separated: bool) -> u8 {
    let (left_bit, right_bit) = match row {
        0..=2 => (0, 1),
        3..=6 => (2, 3),
        _ => (4, 6),
    };
    // Separated graphics blank one column per block and the final block
    // row.
    if separated && matches!(row, 2 | 6 | 9) {
        return 0;
    }
    let mut bits = 0u8;
    if ch >> left_bit & 1 != 0 {
        bits |= if separated { 0b011_000 } else { 0b111_000 };
    }
    if ch >> right_bit & 1 != 0 {
        bits |= if separated { 0b000_011 } else { 0b000_111 };
    }
    bits
}

#[derive(Clone, Debug, PartialEq)]
pub struct Saa5050 {
    debug: bool,

    // Frame state
    flash_field: u8,
    row_scan: u8,
    bottom_half: bool,
    row_had_dh: bool,

    // Cell attribute state, reset at the start of each displayed line.
    fg: u8,
    bg: u8,
    graphics: bool,
    separated: bool,
    flash: bool,
    conceal: bool,
    double_height: bool,
    hold: bool,
    held_char: u8,
    held_separated: bool,

    // Latched output for the current character cell.
    out_fg: u16,
    out_bg: u16,
    mask0: u16,
    mask1: u16,
    half: u8,
}

impl Saa5050 {
    pub fn new() -> Self {
        Self {
            debug: false,
            flash_field: 0,
            row_scan: 0,
            bottom_half: false,
            row_had_dh: false,
            fg: 7,
            bg: 0,
            graphics: false,
            separated: false,
            flash: false,
            conceal: false,
            double_height: false,
            hold: false,
            held_char: 0x20,
            held_separated: false,
            out_fg: 0,
            out_bg: 0,
            mask0: 0,
            mask1: 0,
            half: 0,
        }
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Field restart, driven from the CRTC vsync rising edge.
    pub fn vsync(&mut self) {
        self.row_scan = 0;
        self.bottom_half = false;
        self.row_had_dh = false;
        self.flash_field = self.flash_field.wrapping_add(1);
    }

    /// DISPEN rising edge: start of a displayed line.
    pub fn start_of_line(&mut self) {
        self.fg = 7;
        self.bg = 0;
        self.graphics = false;
        self.separated = false;
        self.flash = false;
        self.conceal = false;
        self.double_height = false;
        self.hold = false;
        self.held_char = 0x20;
        self.held_separated = false;
    }

    /// DISPEN falling edge: end of a displayed line.
    pub fn end_of_line(&mut self) {
        self.row_scan += 1;
        if self.row_scan >= 10 {
            self.row_scan = 0;
            let next_is_bottom = self.row_had_dh && !self.bottom_half;
            self.bottom_half = next_is_bottom;
            self.row_had_dh = false;
        }
    }

    /// Teletext flash duty cycle: roughly 3:1 on at about 1 Hz.
    fn flash_on(&self) -> bool {
        self.flash_field % 48 < 36
    }

    /// Decode one character cell for the current scanline.
    pub fn byte(&mut self, value: u8, display: bool) {
        self.half = 0;

        if !display {
            self.out_fg = 0;
            self.out_bg = 0;
            self.mask0 = 0;
            self.mask1 = 0;
            return;
        }

        let ch = value & 0x7F;

        // Set-at codes take effect on this cell.
        if ch < 0x20 {
            match ch {
                0x09 => self.flash = false,
                0x18 => self.conceal = true,
                0x1C => self.bg = 0,
                0x1D => self.bg = self.fg,
                0x1F => self.hold = false,
                _ => {}
            }
        }

        self.render_cell(ch);

        // Set-after codes take effect from the next cell.
        if ch < 0x20 {
            match ch {
                0x01..=0x07 => {
                    self.fg = ch;
                    self.graphics = false;
                    self.conceal = false;
                }
                0x08 => self.flash = true,
                0x0C => self.double_height = false,
                0x0D => {
                    self.double_height = true;
                    self.row_had_dh = true;
                }
                0x11..=0x17 => {
                    self.fg = ch & 0x07;
                    self.graphics = true;
                    self.conceal = false;
                }
                0x19 => self.separated = false,
                0x1A => self.separated = true,
                0x1E => self.hold = true,
                _ => {}
            }
        }
    }

    fn render_cell(&mut self, ch: u8) {
        self.out_bg = primary(self.bg);
        self.out_fg = primary(self.fg);

        let blank = |this: &mut Self| {
            this.mask0 = 0;
            this.mask1 = 0;
        };

        if ch < 0x20 {
            if self.debug {
                // Render the control code as its letter form, inverted.
                self.render_glyph(ch + 0x40);
                self.mask0 ^= 0x0FFF;
                self.mask1 ^= 0x0FFF;
            } else if self.hold && self.graphics {
                let held = self.held_char;
                let sep = self.held_separated;
                self.render_sixels(held, sep);
            } else {
                blank(self);
            }
            return;
        }

        if self.conceal && !self.debug {
            blank(self);
            return;
        }

        if self.flash && !self.flash_on() {
            blank(self);
            return;
        }

        if self.graphics && ch & 0x20 != 0 {
            self.held_char = ch;
            self.held_separated = self.separated;
            let sep = self.separated;
            self.render_sixels(ch, sep);
        } else {
            self.render_glyph(ch);
        }
    }

    /// Glyph row index for the current scanline, honouring double
    /// height. Rows without the attribute on a bottom-half row render
    /// normally.
    fn glyph_row(&self) -> (u8, u8, u8) {
        let glyph_at = |row: i8| -> u8 {
            if (0..10).contains(&row) { row as u8 } else { 0xFF }
        };
        if self.double_height {
            let base = self.row_scan / 2 + if self.bottom_half { 5 } else { 0 };
            (base, glyph_at(base as i8 - 1), glyph_at(base as i8 + 1))
        } else {
            let base = self.row_scan;
            (base, glyph_at(base as i8 - 1), glyph_at(base as i8 + 1))
        }
    }

    fn render_glyph(&mut self, ch: u8) {
        let glyph = &GLYPHS[(ch - 0x20) as usize];
        let (row, above, below) = self.glyph_row();
        let cur = glyph[row as usize];
        let prev = if above == 0xFF { 0 } else { glyph[above as usize] };
        let next = if below == 0xFF { 0 } else { glyph[below as usize] };

        // Left-align the 5-bit row in the 6-pixel cell.
        self.mask0 = rounded(cur << 1, prev << 1);
        self.mask1 = rounded(cur << 1, next << 1);
    }

    fn render_sixels(&mut self, ch: u8, separated: bool) {
        let (row, _, _) = self.glyph_row();
        let bits = sixel_row(ch, row, separated);
        let mask = double_bits(bits);
        self.mask0 = mask;
        self.mask1 = mask;
    }

    /// Fill one video unit with half of the current character cell.
    pub fn emit_pixels(&mut self, unit: &mut VideoDataUnit) {
        unit.kind = VideoDataType::Teletext;
        unit.pixels[0] = self.out_bg;
        unit.pixels[1] = self.out_fg;
        let shift = self.half * 6;
        unit.pixels[2] = self.mask0 >> shift & 0x3F;
        unit.pixels[3] = self.mask1 >> shift & 0x3F;
        self.half ^= 1;
    }
}

impl Default for Saa5050 {
    fn default() -> Self {
        Self::new()
    }
}
