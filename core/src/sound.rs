//! Per-sample sound output unit.

/// One sound sample, produced every fourth odd cycle (250 kHz). The
/// disc-drive sound channel carries the mixed mechanical samples when a
/// sample map is installed, silence otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SoundDataUnit {
    pub sn_output: i16,
    pub disc_drive_sound: f32,
}
