//! The big-page memory model.
//!
//! Total addressable memory is 336K: 64K RAM (main + shadow + ANDY +
//! HAZEL), 256K sideways ROM (16 x 16K) and the 16K MOS. Paging
//! operates at 4K resolution, so the whole space divides into 84 "big
//! pages":
//!
//! ```text
//! 0-7     main RAM
//! 8       ANDY (Master) / ANDY (B+)
//! 9,10    HAZEL (Master) / ANDY (B+)
//! 11-15   shadow RAM (Master/B+)
//! 16-19   ROM 0
//! ...
//! 76-79   ROM 15
//! 80-83   MOS
//! ```
//!
//! On the B, big pages 8-15 alias big pages 0-7.
//!
//! Each big page is set up once when the machine is created; paging
//! register changes just re-point the per-high-byte page maps at the
//! right big pages. Because sideways ROMs are shared immutable buffers,
//! a big page refers to its backing store as a `(region, offset)` pair
//! that the machine resolves on access rather than as a raw slice.

pub const BIG_PAGE_SIZE_BYTES: usize = 4096;
pub const BIG_PAGE_OFFSET_MASK: u16 = 0x0FFF;
pub const BIG_PAGE_SIZE_PAGES: usize = BIG_PAGE_SIZE_BYTES / 256;

pub const MAIN_BIG_PAGE_INDEX: u8 = 0;
pub const NUM_MAIN_BIG_PAGES: u8 = 32 / 4;

pub const ANDY_BIG_PAGE_INDEX: u8 = MAIN_BIG_PAGE_INDEX + NUM_MAIN_BIG_PAGES;
pub const NUM_ANDY_BIG_PAGES: u8 = 4 / 4;

pub const HAZEL_BIG_PAGE_INDEX: u8 = ANDY_BIG_PAGE_INDEX + NUM_ANDY_BIG_PAGES;
pub const NUM_HAZEL_BIG_PAGES: u8 = 8 / 4;

pub const BPLUS_RAM_BIG_PAGE_INDEX: u8 = ANDY_BIG_PAGE_INDEX;
pub const NUM_BPLUS_RAM_BIG_PAGES: u8 = 12 / 4;

pub const SHADOW_BIG_PAGE_INDEX: u8 = HAZEL_BIG_PAGE_INDEX + NUM_HAZEL_BIG_PAGES;
pub const NUM_SHADOW_BIG_PAGES: u8 = 20 / 4;

pub const ROM0_BIG_PAGE_INDEX: u8 = SHADOW_BIG_PAGE_INDEX + NUM_SHADOW_BIG_PAGES;
pub const NUM_ROM_BIG_PAGES: u8 = 16 / 4;

pub const MOS_BIG_PAGE_INDEX: u8 = ROM0_BIG_PAGE_INDEX + 16 * NUM_ROM_BIG_PAGES;
pub const NUM_MOS_BIG_PAGES: u8 = 16 / 4;

pub const NUM_BIG_PAGES: u8 = MOS_BIG_PAGE_INDEX + NUM_MOS_BIG_PAGES;

/// Which backing buffer a page of memory lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemRegion {
    MainRam,
    SidewaysRom(u8),
    SidewaysRam(u8),
    Os,
    /// Shared zero-filled page: unmapped reads return 0.
    Zeros,
    /// Shared write sink: ROM and unmapped writes land here.
    Scratch,
}

/// A 256-byte page of backing store: region plus the byte offset of the
/// page within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemRef {
    pub region: MemRegion,
    pub offset: u32,
}

impl MemRef {
    pub const ZEROS: MemRef = MemRef { region: MemRegion::Zeros, offset: 0 };
}

/// One 4K big page. `read`/`write` of `None` mean unmapped; the page
/// maps substitute the shared zeros/scratch pages so lookups never need
/// a null check on the hot path. `code` is the one-character provenance
/// tag the debugger shows ('m' main, 'n' ANDY, 'h' HAZEL, 's' shadow,
/// 'o' MOS, '0'-'f' ROM bank).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BigPage {
    pub index: u8,
    pub code: char,
    pub read: Option<MemRef>,
    pub write: Option<MemRef>,
}

impl BigPage {
    pub const fn unmapped() -> Self {
        Self { index: 0, code: '\0', read: None, write: None }
    }
}

/// Active translation for the 256 CPU pages: per high byte, a read
/// page, a write page and the owning big page (for debug flags and
/// provenance). All entries are always populated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryPages {
    pub reads: [MemRef; 256],
    pub writes: [MemRef; 256],
    pub big_pages: [u8; 256],
}

impl MemoryPages {
    pub fn new() -> Self {
        Self {
            reads: [MemRef::ZEROS; 256],
            writes: [MemRef { region: MemRegion::Scratch, offset: 0 }; 256],
            big_pages: [0; 256],
        }
    }
}

impl Default for MemoryPages {
    fn default() -> Self {
        Self::new()
    }
}

/// Which page map an instruction page uses on shadow-capable machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapSel {
    Default,
    Shadow,
}

/// Point `num` big pages' worth of a page map at `big_pages[index..]`,
/// starting at CPU big page `dest` (i.e. high byte `dest << 4`), with
/// zeros/scratch substitution for unmapped sides.
pub fn apply_pages(
    pages: &mut MemoryPages,
    big_pages: &[BigPage],
    index: u8,
    num: u8,
    dest: u8,
) {
    debug_assert!(dest < 16);
    let mut page = (dest as usize) << 4;

    for i in 0..num {
        let bp = &big_pages[(index + i) as usize];

        for j in 0..BIG_PAGE_SIZE_PAGES {
            let page_offset = (j * 256) as u32;

            pages.reads[page] = match bp.read {
                Some(r) => MemRef { region: r.region, offset: r.offset + page_offset },
                None => MemRef::ZEROS,
            };
            pages.writes[page] = match bp.write {
                Some(w) => MemRef { region: w.region, offset: w.offset + page_offset },
                None => MemRef { region: MemRegion::Scratch, offset: page_offset },
            };
            pages.big_pages[page] = bp.index;

            page += 1;
        }
    }
}

/// ROM bank index to provenance code.
pub fn rom_bank_code(bank: u8) -> char {
    b"0123456789abcdef"[bank as usize & 0x0F] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_constants_line_up() {
        assert_eq!(ANDY_BIG_PAGE_INDEX, 8);
        assert_eq!(HAZEL_BIG_PAGE_INDEX, 9);
        assert_eq!(SHADOW_BIG_PAGE_INDEX, 11);
        assert_eq!(ROM0_BIG_PAGE_INDEX, 16);
        assert_eq!(MOS_BIG_PAGE_INDEX, 80);
        assert_eq!(NUM_BIG_PAGES, 84);
    }

    #[test]
    fn apply_pages_substitutes_unmapped_sides() {
        let mut pages = MemoryPages::new();
        let bp = BigPage { index: 20, code: '1', read: None, write: None };

        apply_pages(&mut pages, &[bp], 0, 1, 0x8);

        for page in 0x80..0x90 {
            assert_eq!(pages.reads[page].region, MemRegion::Zeros);
            assert_eq!(pages.writes[page].region, MemRegion::Scratch);
            assert_eq!(pages.big_pages[page], 20);
        }
    }

    #[test]
    fn apply_pages_offsets_by_256_per_page() {
        let mut pages = MemoryPages::new();
        let bp = BigPage {
            index: 3,
            code: 'm',
            read: Some(MemRef { region: MemRegion::MainRam, offset: 0x3000 }),
            write: Some(MemRef { region: MemRegion::MainRam, offset: 0x3000 }),
        };

        apply_pages(&mut pages, &[bp], 0, 1, 0x3);

        assert_eq!(pages.reads[0x30].offset, 0x3000);
        assert_eq!(pages.reads[0x31].offset, 0x3100);
        assert_eq!(pages.reads[0x3F].offset, 0x3F00);
    }
}
