//! Process-wide disc drive sound samples.
//!
//! The mechanical samples are host assets: the host installs them once
//! before constructing any machine and they are consumed read-only by
//! every machine for the lifetime of the process. When nothing is
//! installed the drive sound channel stays silent.

use std::sync::OnceLock;

use super::DriveState;

#[derive(Clone, Debug, Default)]
pub struct DriveSounds {
    /// Looped while the motor is on.
    pub spin_loop: Vec<f32>,
    /// Played once per head step.
    pub step: Vec<f32>,
}

static DRIVE_SOUNDS: OnceLock<DriveSounds> = OnceLock::new();

/// Install the sample map. Returns false if a map was already
/// installed (the first one wins).
pub fn install(sounds: DriveSounds) -> bool {
    DRIVE_SOUNDS.set(sounds).is_ok()
}

pub fn installed() -> bool {
    DRIVE_SOUNDS.get().is_some()
}

/// Advance one drive's sound playback by one sample.
pub(crate) fn next_sample(drive: &mut DriveState) -> f32 {
    let Some(sounds) = DRIVE_SOUNDS.get() else {
        return 0.0;
    };

    let mut sample = 0.0;

    if drive.motor && !sounds.spin_loop.is_empty() {
        sample += sounds.spin_loop[drive.spin_sound_index % sounds.spin_loop.len()];
        drive.spin_sound_index = drive.spin_sound_index.wrapping_add(1);
    }

    if drive.step_sound_index < sounds.step.len() {
        sample += sounds.step[drive.step_sound_index];
        drive.step_sound_index += 1;
    }

    sample
}

/// Restart the step sound (called when the head moves).
pub(crate) fn trigger_step(drive: &mut DriveState) {
    if installed() {
        drive.step_sound_index = 0;
    }
}
