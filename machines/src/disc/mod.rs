pub mod geometry;
pub mod image;
pub mod interface;

pub use geometry::{DiscGeometry, find_geometry};
pub use image::{DiscImage, DiscImageError, FILL_BYTE, LoadMethod};
pub use interface::{ACORN_1770, DiscControl, DiscInterface, MASTER_128};
