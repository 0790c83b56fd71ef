pub mod bbc;
pub mod disc;
pub mod registry;

pub use bbc::model::Model;
pub use bbc::{CloneError, Leds, Machine, MachineConfig, RomData, RomError, rom_from_bytes};
pub use disc::{DiscGeometry, DiscImage, DiscImageError, DiscInterface};
