//! Disc image geometry and format recognition.
//!
//! Images are raw sector-major dumps recognised by file extension plus
//! size. Double-sided images interleave the sides track by track (side
//! 0 track N, side 1 track N, ...), the usual `.dsd`/`.adl` layout.

/// Fixed layout of a disc image. Immutable for the lifetime of the
/// image data it describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiscGeometry {
    pub double_sided: bool,
    pub double_density: bool,
    pub num_tracks: usize,
    pub sectors_per_track: usize,
    pub bytes_per_sector: usize,
}

impl DiscGeometry {
    pub const fn new(
        double_sided: bool,
        double_density: bool,
        num_tracks: usize,
        sectors_per_track: usize,
        bytes_per_sector: usize,
    ) -> Self {
        Self { double_sided, double_density, num_tracks, sectors_per_track, bytes_per_sector }
    }

    pub fn total_bytes(&self) -> usize {
        let sides = if self.double_sided { 2 } else { 1 };
        sides * self.num_tracks * self.sectors_per_track * self.bytes_per_sector
    }

    /// Byte index of `(side, track, sector, offset)`, or None when the
    /// request falls outside the geometry.
    pub fn index(&self, side: u8, track: u8, sector: u8, offset: usize) -> Option<usize> {
        if side > 0 && !self.double_sided {
            return None;
        }
        if side > 1
            || track as usize >= self.num_tracks
            || sector as usize >= self.sectors_per_track
            || offset >= self.bytes_per_sector
        {
            return None;
        }

        let track_index = if self.double_sided {
            track as usize * 2 + side as usize
        } else {
            track as usize
        };

        Some(
            (track_index * self.sectors_per_track + sector as usize) * self.bytes_per_sector
                + offset,
        )
    }
}

struct Format {
    extension: &'static str,
    double_sided: bool,
    double_density: bool,
    sectors_per_track: usize,
    bytes_per_sector: usize,
    /// 40-track images are recognised by falling at or under this size.
    small_tracks: usize,
    large_tracks: usize,
}

const FORMATS: [Format; 7] = [
    Format {
        extension: "ssd",
        double_sided: false,
        double_density: false,
        sectors_per_track: 10,
        bytes_per_sector: 256,
        small_tracks: 40,
        large_tracks: 80,
    },
    Format {
        extension: "dsd",
        double_sided: true,
        double_density: false,
        sectors_per_track: 10,
        bytes_per_sector: 256,
        small_tracks: 40,
        large_tracks: 80,
    },
    Format {
        extension: "sdd",
        double_sided: false,
        double_density: true,
        sectors_per_track: 16,
        bytes_per_sector: 256,
        small_tracks: 40,
        large_tracks: 80,
    },
    Format {
        extension: "ddd",
        double_sided: true,
        double_density: true,
        sectors_per_track: 16,
        bytes_per_sector: 256,
        small_tracks: 40,
        large_tracks: 80,
    },
    Format {
        extension: "ads",
        double_sided: false,
        double_density: true,
        sectors_per_track: 16,
        bytes_per_sector: 256,
        small_tracks: 40,
        large_tracks: 40,
    },
    Format {
        extension: "adm",
        double_sided: false,
        double_density: true,
        sectors_per_track: 16,
        bytes_per_sector: 256,
        small_tracks: 80,
        large_tracks: 80,
    },
    Format {
        extension: "adl",
        double_sided: true,
        double_density: true,
        sectors_per_track: 16,
        bytes_per_sector: 256,
        small_tracks: 80,
        large_tracks: 80,
    },
];

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Recognise a disc geometry from a file name and size. The size must
/// fit the format's capacity and be a whole number of sectors.
pub fn find_geometry(name: &str, size: usize) -> Option<DiscGeometry> {
    let extension = extension_of(name)?;

    for format in &FORMATS {
        if !format.extension.eq_ignore_ascii_case(extension) {
            continue;
        }

        if size % format.bytes_per_sector != 0 {
            return None;
        }

        let sides = if format.double_sided { 2 } else { 1 };
        let track_bytes = sides * format.sectors_per_track * format.bytes_per_sector;
        let num_tracks = if size <= format.small_tracks * track_bytes {
            format.small_tracks
        } else if size <= format.large_tracks * track_bytes {
            format.large_tracks
        } else {
            return None;
        };

        return Some(DiscGeometry::new(
            format.double_sided,
            format.double_density,
            num_tracks,
            format.sectors_per_track,
            format.bytes_per_sector,
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssd_80_track() {
        let g = find_geometry("elite.ssd", 80 * 10 * 256).unwrap();
        assert!(!g.double_sided);
        assert!(!g.double_density);
        assert_eq!(g.num_tracks, 80);
        assert_eq!(g.total_bytes(), 204800);
    }

    #[test]
    fn ssd_40_track() {
        let g = find_geometry("small.SSD", 40 * 10 * 256).unwrap();
        assert_eq!(g.num_tracks, 40);
    }

    #[test]
    fn dsd_interleaves_sides() {
        let g = find_geometry("games.dsd", 80 * 2 * 10 * 256).unwrap();
        assert!(g.double_sided);
        // Track 0 side 1 follows track 0 side 0.
        assert_eq!(g.index(1, 0, 0, 0), Some(10 * 256));
        // Track 1 side 0 follows both sides of track 0.
        assert_eq!(g.index(0, 1, 0, 0), Some(2 * 10 * 256));
    }

    #[test]
    fn oversize_is_rejected() {
        assert!(find_geometry("big.ssd", 80 * 10 * 256 + 256).is_none());
    }

    #[test]
    fn non_sector_multiple_is_rejected() {
        assert!(find_geometry("odd.ssd", 1000).is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(find_geometry("whatever.bin", 204800).is_none());
    }

    #[test]
    fn out_of_geometry_requests_fail() {
        let g = find_geometry("a.ssd", 204800).unwrap();
        assert!(g.index(1, 0, 0, 0).is_none()); // no side 1
        assert!(g.index(0, 80, 0, 0).is_none()); // past last track
        assert!(g.index(0, 0, 10, 0).is_none()); // past last sector
        assert!(g.index(0, 0, 0, 256).is_none()); // past sector end
        assert_eq!(g.index(0, 79, 9, 255), Some(204799));
    }
}
