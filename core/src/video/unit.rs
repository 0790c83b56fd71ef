//! Per-cycle video output unit.
//!
//! The machine emits one `VideoDataUnit` per 2 MHz tick. Pixels are
//! 12-bit RGB values (0x0RGB, one nibble per channel). The three unit
//! types cover the bitmap modes, the NuLA 12 MHz attribute modes and
//! teletext; the latter two are horizontally supersampled 3:2 by the TV
//! output stage.

/// Encoding of the 8 pixel slots in a unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VideoDataType {
    /// 8 pixels at 16 MHz, one per slot. Also used for blank/cursor-only
    /// output, so the zero value must produce black.
    #[default]
    Bitmap16MHz,
    /// 6 pixels at 12 MHz in slots 0-5, supersampled by the TV stage.
    Bitmap12MHz,
    /// Half a teletext character cell: slot 0 = background colour,
    /// slot 1 = foreground colour, slots 2 and 3 = 6-bit subpixel masks
    /// for the two output sub-scanlines.
    Teletext,
}

pub const UNIT_FLAG_VSYNC: u8 = 1 << 0;
pub const UNIT_FLAG_HSYNC: u8 = 1 << 1;

// Metadata flags.
pub const METADATA_FLAG_HAS_ADDRESS: u8 = 1 << 0;
pub const METADATA_FLAG_ODD_CYCLE: u8 = 1 << 1;
pub const METADATA_FLAG_HAS_VALUE: u8 = 1 << 2;
pub const METADATA_FLAG_6845_RASTER0: u8 = 1 << 3;
pub const METADATA_FLAG_6845_DISPEN: u8 = 1 << 4;
pub const METADATA_FLAG_6845_CUDISP: u8 = 1 << 5;

/// Debugger-facing description of where a unit's byte came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoDataMetadata {
    pub flags: u8,
    /// RAM address the video byte was fetched from.
    pub address: u16,
    /// The fetched byte.
    pub value: u8,
}

/// One 2 MHz tick's worth of video output: 8 pixel slots plus sync flags
/// and provenance metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoDataUnit {
    pub kind: VideoDataType,
    pub pixels: [u16; 8],
    pub flags: u8,
    pub metadata: VideoDataMetadata,
}
