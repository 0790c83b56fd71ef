pub mod mos6502;
pub mod state;

pub use mos6502::Mos6502;
pub use state::CpuSnapshot;
