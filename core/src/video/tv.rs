//! TV display model.
//!
//! Consumes the per-cycle video units and scans them out into a fixed
//! RGBA texture the way a PAL set would: free-running horizontal and
//! vertical timing that the sync flags in the unit stream short-circuit.
//! Every unit writes a pair of texture scanlines (the texture is stored
//! at double vertical resolution); the 12 MHz and teletext unit types
//! are 3:2 horizontally supersampled through a gamma-correct blend
//! table.

use crate::video::unit::{VideoDataType, VideoDataUnit};

pub const TV_TEXTURE_WIDTH: usize = 768;
pub const TV_TEXTURE_HEIGHT: usize = 576;

// One 64us scanline is 128 2MHz cycles: 4us retrace, 8us back porch,
// 52us of picture.
const HORIZONTAL_RETRACE_CYCLES: u32 = 2 * 4;
const BACK_PORCH_CYCLES: u32 = 2 * 8;
const SCAN_OUT_CYCLES: u32 = 2 * 52;
const SCANLINE_CYCLES: u32 = HORIZONTAL_RETRACE_CYCLES + BACK_PORCH_CYCLES + SCAN_OUT_CYCLES;
const VERTICAL_RETRACE_SCANLINES: u32 = 12;

const HEIGHT_SCALE: usize = 2;

// If this many lines are scanned without a vertical retrace the set
// retraces anyway, so output keeps going when there is no CRTC vsync.
const MAX_NUM_SCANNED_LINES: usize = 500 * HEIGHT_SCALE;

const GAMMA: f64 = 2.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TvState {
    VerticalRetrace,
    VerticalRetraceWait,
    Scanout,
    HorizontalRetrace,
    HorizontalRetraceWait,
    BackPorch,
}

pub struct TvOutput {
    state: TvState,
    state_timer: u32,
    x: usize,
    y: usize,
    num_fields: u64,

    texture: Vec<u32>,
    texture_data_version: u64,

    r_shift: u32,
    g_shift: u32,
    b_shift: u32,

    // 4-bit channel value to shifted texel contribution.
    rs: [u32; 16],
    gs: [u32; 16],
    bs: [u32; 16],
    // Gamma-corrected 1:2 blend of two 4-bit channel values.
    blend: [[u8; 16]; 16],
}

impl TvOutput {
    pub fn new(r_shift: u32, g_shift: u32, b_shift: u32) -> Self {
        let mut tv = Self {
            state: TvState::VerticalRetrace,
            state_timer: 0,
            x: 0,
            y: 0,
            num_fields: 0,
            texture: vec![0; TV_TEXTURE_WIDTH * TV_TEXTURE_HEIGHT],
            texture_data_version: 0,
            r_shift,
            g_shift,
            b_shift,
            rs: [0; 16],
            gs: [0; 16],
            bs: [0; 16],
            blend: [[0; 16]; 16],
        };
        tv.init_palette();
        tv
    }

    fn init_palette(&mut self) {
        for i in 0..16u32 {
            let value = i << 4 | i;
            self.rs[i as usize] = value << self.r_shift;
            self.gs[i as usize] = value << self.g_shift;
            self.bs[i as usize] = value << self.b_shift;
        }

        for i in 0..16 {
            for j in 0..16 {
                let a = (i as f64 / 15.0).powf(GAMMA);
                let b = (j as f64 / 15.0).powf(GAMMA);
                let value = ((a + b + b) / 3.0).powf(1.0 / GAMMA);
                self.blend[i][j] = (value.clamp(0.0, 1.0) * 255.0) as u8;
            }
        }
    }

    /// Monotone texture version; bumped once per completed field,
    /// always after the field's pixels are fully written.
    pub fn texture_data_version(&self) -> u64 {
        self.texture_data_version
    }

    pub fn texture(&self) -> &[u32] {
        &self.texture
    }

    pub fn num_fields(&self) -> u64 {
        self.num_fields
    }

    pub fn update_all(&mut self, units: &[VideoDataUnit]) {
        for unit in units {
            self.update(unit);
        }
    }

    pub fn update(&mut self, unit: &VideoDataUnit) {
        use crate::video::unit::{UNIT_FLAG_HSYNC, UNIT_FLAG_VSYNC};

        match self.state {
            TvState::VerticalRetrace => {
                self.num_fields += 1;
                self.texture_data_version += 1;
                self.x = 0;
                self.y = 0;
                self.state_timer = 1;
                self.state = TvState::VerticalRetraceWait;
            }

            TvState::VerticalRetraceWait => {
                // Ignore everything during retrace.
                self.state_timer += 1;
                if self.state_timer >= VERTICAL_RETRACE_SCANLINES * SCANLINE_CYCLES {
                    self.state_timer = 0;
                    self.state = TvState::Scanout;
                }
            }

            TvState::Scanout => {
                if unit.flags & UNIT_FLAG_VSYNC != 0 {
                    self.state = TvState::VerticalRetrace;
                    return;
                }
                if unit.flags & UNIT_FLAG_HSYNC != 0 {
                    self.state = TvState::HorizontalRetrace;
                    return;
                }

                if self.x + 8 <= TV_TEXTURE_WIDTH && self.y + 1 < TV_TEXTURE_HEIGHT {
                    let row = self.y * TV_TEXTURE_WIDTH + self.x;
                    match unit.kind {
                        VideoDataType::Bitmap16MHz => self.scan_16mhz(unit, row),
                        VideoDataType::Bitmap12MHz => self.scan_12mhz(unit, row),
                        VideoDataType::Teletext => self.scan_teletext(unit, row),
                    }
                }
                self.x += 8;

                self.state_timer += 1;
                if self.state_timer >= SCAN_OUT_CYCLES {
                    self.state = TvState::HorizontalRetrace;
                }
            }

            TvState::HorizontalRetrace => {
                self.x = 0;
                self.y += HEIGHT_SCALE;
                if self.y >= MAX_NUM_SCANNED_LINES {
                    // VBlank time anyway.
                    self.state = TvState::VerticalRetrace;
                    return;
                }
                // +1 for the scanout cycle that noticed hsync, +1 for
                // this one.
                self.state_timer = 2;
                self.state = TvState::HorizontalRetraceWait;
            }

            TvState::HorizontalRetraceWait => {
                self.state_timer += 1;
                if self.state_timer >= HORIZONTAL_RETRACE_CYCLES {
                    self.state_timer = 0;
                    self.state = TvState::BackPorch;
                }
            }

            TvState::BackPorch => {
                self.state_timer += 1;
                if self.state_timer >= BACK_PORCH_CYCLES {
                    self.state_timer = 0;
                    self.state = TvState::Scanout;
                }
            }
        }
    }

    #[inline]
    fn texel(&self, pixel: u16) -> u32 {
        self.rs[(pixel >> 8 & 0x0F) as usize]
            | self.gs[(pixel >> 4 & 0x0F) as usize]
            | self.bs[(pixel & 0x0F) as usize]
    }

    /// Blend two 12-bit pixels 1:2 per channel.
    #[inline]
    fn blend_texel(&self, one: u16, two: u16) -> u32 {
        let r = self.blend[(one >> 8 & 0x0F) as usize][(two >> 8 & 0x0F) as usize];
        let g = self.blend[(one >> 4 & 0x0F) as usize][(two >> 4 & 0x0F) as usize];
        let b = self.blend[(one & 0x0F) as usize][(two & 0x0F) as usize];
        (r as u32) << self.r_shift | (g as u32) << self.g_shift | (b as u32) << self.b_shift
    }

    fn scan_16mhz(&mut self, unit: &VideoDataUnit, row: usize) {
        for (i, &pixel) in unit.pixels.iter().enumerate() {
            let texel = self.texel(pixel);
            self.texture[row + i] = texel;
            self.texture[row + TV_TEXTURE_WIDTH + i] = texel;
        }
    }

    /// 6 pixels into 8 texels: texel n covers subpixel span
    /// 000 011 112 222 333 344 445 555.
    fn supersample(&self, p: &[u16; 6], out: &mut [u32; 8]) {
        out[0] = self.texel(p[0]);
        out[1] = self.blend_texel(p[0], p[1]);
        out[2] = self.blend_texel(p[2], p[1]);
        out[3] = self.texel(p[2]);
        out[4] = self.texel(p[3]);
        out[5] = self.blend_texel(p[3], p[4]);
        out[6] = self.blend_texel(p[5], p[4]);
        out[7] = self.texel(p[5]);
    }

    fn scan_12mhz(&mut self, unit: &VideoDataUnit, row: usize) {
        let pixels: [u16; 6] = unit.pixels[0..6].try_into().unwrap();
        let mut texels = [0u32; 8];
        self.supersample(&pixels, &mut texels);
        for (i, &texel) in texels.iter().enumerate() {
            self.texture[row + i] = texel;
            self.texture[row + TV_TEXTURE_WIDTH + i] = texel;
        }
    }

    fn scan_teletext(&mut self, unit: &VideoDataUnit, row: usize) {
        let bg = unit.pixels[0];
        let fg = unit.pixels[1];

        for line in 0..2usize {
            let mask = unit.pixels[2 + line];
            let mut pixels = [0u16; 6];
            for (bit, pixel) in pixels.iter_mut().enumerate() {
                *pixel = if mask >> bit & 1 != 0 { fg } else { bg };
            }
            let mut texels = [0u32; 8];
            self.supersample(&pixels, &mut texels);
            let dest = row + line * TV_TEXTURE_WIDTH;
            self.texture[dest..dest + 8].copy_from_slice(&texels);
        }
    }
}
