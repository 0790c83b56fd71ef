pub mod cpu;
pub mod device;
pub mod sound;
pub mod trace;
pub mod video;

pub mod prelude {
    pub use crate::cpu::mos6502::{BusAccess, CpuVariant, Mos6502, ReadKind};
    pub use crate::sound::SoundDataUnit;
    pub use crate::video::unit::{VideoDataType, VideoDataUnit};
}
