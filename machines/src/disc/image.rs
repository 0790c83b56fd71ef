//! In-memory disc images with copy-on-write sharing.
//!
//! Several machines (a live machine and its clones) may hold handles to
//! the same image bytes. Reads share; the first write through a
//! non-unique handle clones the underlying data first, so other handles
//! keep reading the old bytes undisturbed. The mutex only covers the
//! brief byte access or the uniqueness check, never an emulated
//! operation.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};
use sha1::{Digest, Sha1};

use super::geometry::{DiscGeometry, find_geometry};

/// Unwritten space reads as the standard format filler.
pub const FILL_BYTE: u8 = 0xE5;

/// Zip entries beyond this are certainly not BBC disc images.
const MAX_ZIP_ENTRY_SIZE: u64 = 8 * 1024 * 1024;

#[derive(Debug)]
pub enum DiscImageError {
    /// The image file contains no data at all.
    Empty,
    /// The file size is not a whole number of sectors.
    NotSectorMultiple,
    /// Extension/size combination matches no known format.
    UnknownGeometry,
    ZipOpenFailed(String),
    ZipStatFailed(String),
    ZipEntryTooLarge(String),
    /// The archive holds more than one recognisable disc image.
    ZipMultipleImages,
    ZipNoImages,
    ZipExtractFailed(String),
    ReadFailed(std::io::Error),
}

impl fmt::Display for DiscImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "disc image is empty"),
            Self::NotSectorMultiple => write!(f, "not a multiple of the sector size"),
            Self::UnknownGeometry => write!(f, "unknown disc image format"),
            Self::ZipOpenFailed(e) => write!(f, "failed to open zip file: {e}"),
            Self::ZipStatFailed(name) => write!(f, "failed to read zip entry info: {name}"),
            Self::ZipEntryTooLarge(name) => write!(f, "zip entry too large: {name}"),
            Self::ZipMultipleImages => write!(f, "zip file contains multiple disc images"),
            Self::ZipNoImages => write!(f, "zip file contains no disc images"),
            Self::ZipExtractFailed(name) => write!(f, "failed to extract disc image: {name}"),
            Self::ReadFailed(e) => write!(f, "failed to read disc image: {e}"),
        }
    }
}

impl std::error::Error for DiscImageError {}

impl From<std::io::Error> for DiscImageError {
    fn from(e: std::io::Error) -> Self {
        Self::ReadFailed(e)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMethod {
    File,
    Zip,
}

struct Bytes {
    data: Vec<u8>,
    /// Lazily computed SHA-1 of `data`; cleared by any write.
    hash: Option<String>,
}

struct Data {
    // Fixed for the lifetime of this Data; safe to read unlocked.
    geometry: DiscGeometry,
    bytes: Mutex<Bytes>,
}

/// Handle to a shared, copy-on-write disc image.
pub struct DiscImage {
    data: Arc<Data>,
    name: String,
    load_method: LoadMethod,
}

fn lock_bytes(data: &Data) -> MutexGuard<'_, Bytes> {
    // A panic mid-access cannot leave the byte vector inconsistent, so
    // recover from poisoning rather than propagate it.
    data.bytes.lock().unwrap_or_else(|e| e.into_inner())
}

impl DiscImage {
    /// Wrap raw image bytes. `name` is for display and save paths.
    pub fn from_buffer(
        name: String,
        load_method: LoadMethod,
        data: Vec<u8>,
        geometry: DiscGeometry,
    ) -> Result<Self, DiscImageError> {
        if data.is_empty() {
            return Err(DiscImageError::Empty);
        }
        if data.len() % geometry.bytes_per_sector != 0 {
            return Err(DiscImageError::NotSectorMultiple);
        }

        Ok(Self {
            data: Arc::new(Data { geometry, bytes: Mutex::new(Bytes { data, hash: None }) }),
            name,
            load_method,
        })
    }

    /// Load from a file path. A `.zip` archive must contain exactly one
    /// entry with a recognisable geometry; the image name then records
    /// both, as `archive.zip::entry.ssd`.
    pub fn load_from_file(path: &Path) -> Result<Self, DiscImageError> {
        let name = path.to_string_lossy().into_owned();

        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

        if is_zip {
            let (entry_name, data, geometry) = load_from_zip(path)?;
            info!("{name}: using disc image {entry_name}");
            Self::from_buffer(format!("{name}::{entry_name}"), LoadMethod::Zip, data, geometry)
        } else {
            let data = std::fs::read(path)?;
            let geometry = find_geometry(&name, data.len())
                .ok_or(DiscImageError::UnknownGeometry)?;
            Self::from_buffer(name, LoadMethod::File, data, geometry)
        }
    }

    /// New handle sharing this image's bytes copy-on-write.
    pub fn clone_image(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            name: self.name.clone(),
            load_method: self.load_method,
        }
    }

    pub fn can_clone(&self) -> bool {
        true
    }

    /// Saving back only makes sense when the image maps to a real file.
    pub fn can_save(&self) -> bool {
        self.load_method == LoadMethod::File
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load_method(&self) -> LoadMethod {
        self.load_method
    }

    pub fn geometry(&self) -> &DiscGeometry {
        &self.data.geometry
    }

    pub fn is_write_protected(&self) -> bool {
        false
    }

    /// One-line description: "DS SD 80T x 10S".
    pub fn description(&self) -> String {
        let g = &self.data.geometry;
        format!(
            "{} {} {}T x {}S",
            if g.double_sided { "DS" } else { "SS" },
            if g.double_density { "DD" } else { "SD" },
            g.num_tracks,
            g.sectors_per_track,
        )
    }

    /// SHA-1 of the image contents, cached until the next write.
    pub fn hash(&self) -> String {
        let mut bytes = lock_bytes(&self.data);
        if bytes.hash.is_none() {
            let digest = Sha1::digest(&bytes.data);
            let mut hash = String::with_capacity(digest.len() * 2);
            for byte in digest {
                hash.push_str(&format!("{byte:02x}"));
            }
            bytes.hash = Some(hash);
        }
        bytes.hash.clone().unwrap_or_default()
    }

    /// Sector size lookup for the FDC: the density must match what the
    /// controller was told to expect or the ID mark is never found.
    pub fn sector_size(
        &self,
        side: u8,
        track: u8,
        sector: u8,
        double_density: bool,
    ) -> Option<usize> {
        let geometry = &self.data.geometry;
        if double_density != geometry.double_density {
            return None;
        }
        geometry.index(side, track, sector, 0)?;
        Some(geometry.bytes_per_sector)
    }

    /// Read one byte. Past-the-data reads inside the geometry return
    /// the fill byte; out-of-geometry requests fail.
    pub fn read(&self, side: u8, track: u8, sector: u8, offset: usize) -> Option<u8> {
        let index = self.data.geometry.index(side, track, sector, offset)?;
        let bytes = lock_bytes(&self.data);
        Some(bytes.data.get(index).copied().unwrap_or(FILL_BYTE))
    }

    /// Write one byte, copy-on-write. Writes past the current data
    /// length grow it to the next sector boundary first.
    pub fn write(&mut self, side: u8, track: u8, sector: u8, offset: usize, value: u8) -> bool {
        let index = match self.data.geometry.index(side, track, sector, offset) {
            Some(index) => index,
            None => return false,
        };

        self.make_unique();

        let bytes_per_sector = self.data.geometry.bytes_per_sector;
        let mut bytes = lock_bytes(&self.data);

        if index >= bytes.data.len() {
            let new_len = (index + bytes_per_sector) / bytes_per_sector * bytes_per_sector;
            bytes.data.resize(new_len, FILL_BYTE);
        }

        if bytes.data[index] != value {
            bytes.data[index] = value;
            bytes.hash = None;
        }

        true
    }

    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        if !self.can_save() {
            return Err(std::io::Error::other("image was not loaded from a plain file"));
        }
        let bytes = lock_bytes(&self.data);
        std::fs::write(path, &bytes.data)
    }

    /// Ensure this handle is the only reference to its data, cloning
    /// the bytes if it is not. Once this returns, no other handle can
    /// race the upcoming mutation.
    fn make_unique(&mut self) {
        if Arc::strong_count(&self.data) == 1 {
            return;
        }

        let copied = {
            let bytes = lock_bytes(&self.data);
            Data {
                geometry: self.data.geometry,
                bytes: Mutex::new(Bytes { data: bytes.data.clone(), hash: None }),
            }
        };

        self.data = Arc::new(copied);
    }
}

fn load_from_zip(path: &Path) -> Result<(String, Vec<u8>, DiscGeometry), DiscImageError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| DiscImageError::ZipOpenFailed(e.to_string()))?;

    let mut image: Option<(usize, String, DiscGeometry)> = None;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| DiscImageError::ZipStatFailed(e.to_string()))?;
        let entry_name = entry.name().to_string();
        let size = entry.size();
        drop(entry);

        if size > MAX_ZIP_ENTRY_SIZE {
            warn!("{entry_name}: zip entry too large");
            return Err(DiscImageError::ZipEntryTooLarge(entry_name));
        }

        if let Some(geometry) = find_geometry(&entry_name, size as usize) {
            if image.is_some() {
                return Err(DiscImageError::ZipMultipleImages);
            }
            image = Some((i, entry_name, geometry));
        }
    }

    let (index, entry_name, geometry) = image.ok_or(DiscImageError::ZipNoImages)?;

    let mut entry = archive
        .by_index(index)
        .map_err(|e| DiscImageError::ZipExtractFailed(e.to_string()))?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut data)
        .map_err(|e| DiscImageError::ZipExtractFailed(e.to_string()))?;

    Ok((entry_name, data, geometry))
}
