use log::debug;

/// WD1770/1772 floppy disc controller
///
/// Command-compatible pair used by the BBC B 1770 interfaces and the
/// Master 128. The controller shuttles sector bytes between its data
/// register and the drive; the board supplies the drive side through an
/// [`FdcHandler`] passed to each `update()` call, which keeps the
/// machine free to route drive select / side / density from its control
/// latch.
///
/// # Registers
///
/// | Offset | Read    | Write   |
/// |--------|---------|---------|
/// | 0      | Status  | Command |
/// | 1      | Track   | Track   |
/// | 2      | Sector  | Sector  |
/// | 3      | Data    | Data    |
///
/// # Commands (upper nibble)
///
/// | Bits  | Command         | Type |
/// |-------|-----------------|------|
/// | 0000  | Restore         | I    |
/// | 0001  | Seek            | I    |
/// | 001x  | Step            | I    |
/// | 010x  | Step-in         | I    |
/// | 011x  | Step-out        | I    |
/// | 100x  | Read sector     | II   |
/// | 101x  | Write sector    | II   |
/// | 1100  | Read address    | III  |
/// | 1101  | Force interrupt | IV   |
/// | 1110  | Read track      | III (not supported, completes empty)  |
/// | 1111  | Write track     | III (not supported, completes empty)  |
///
/// `update()` runs at 1 MHz and returns the INTRQ/DRQ pins for NMI
/// wiring. The 1772 flag selects the faster stepping rates; the
/// no-INTRQ flag models interfaces that leave INTRQ unwired.
pub trait FdcHandler {
    fn spin_up(&mut self);
    fn spin_down(&mut self);
    /// Move the head one track; `inward` is towards higher tracks.
    fn step(&mut self, inward: bool);
    fn track0(&self) -> bool;
    fn write_protected(&self) -> bool;
    /// Physical head position, for ID address marks.
    fn track(&self) -> u8;
    /// Size of a sector under the head, or None if the ID cannot be
    /// found (wrong density, no disc, bad sector number).
    fn sector_size(&mut self, sector: u8) -> Option<usize>;
    fn read_byte(&mut self, sector: u8, offset: usize) -> Option<u8>;
    fn write_byte(&mut self, sector: u8, offset: usize, value: u8) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FdcOutput {
    pub intrq: bool,
    pub drq: bool,
}

impl FdcOutput {
    pub fn nmi_level(self) -> bool {
        self.intrq || self.drq
    }
}

// Status register bits.
const STATUS_BUSY: u8 = 0x01;
const STATUS_DRQ_OR_INDEX: u8 = 0x02;
const STATUS_LOST_OR_TRACK0: u8 = 0x04;
const STATUS_RNF: u8 = 0x10;
const STATUS_SPUN_UP: u8 = 0x20;
const STATUS_WRITE_PROTECT: u8 = 0x40;
const STATUS_MOTOR_ON: u8 = 0x80;

// 1 MHz tick budgets.
const SPIN_UP_TICKS: u32 = 50_000;
const SETTLE_TICKS: u32 = 15_000;
const MOTOR_TIMEOUT_TICKS: u32 = 2_000_000;
const STEP_TICKS_1770: [u32; 4] = [6_000, 12_000, 20_000, 30_000];
const STEP_TICKS_1772: [u32; 4] = [2_000, 3_000, 5_000, 6_000];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Type I head movement towards `target` (restore aims for the
    /// physical track-0 switch instead of a register value).
    Seek { target: u8, restore: bool },
    SingleStep { inward: bool, update_track: bool },
    Settle,
    /// Type II/III lead-in before the first byte.
    TransferWait,
    Reading,
    Writing,
    ReadAddress { index: u8 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Wd1770 {
    status: u8,
    track: u8,
    sector: u8,
    data: u8,
    command: u8,

    phase: Phase,
    wait: u32,
    offset: usize,
    sector_size: usize,

    dden: bool,
    intrq: bool,
    drq: bool,
    lost_data: bool,

    motor_on: bool,
    motor_idle: u32,
    step_inward: bool,

    is_1772: bool,
    no_intrq: bool,
}

impl Wd1770 {
    pub fn new() -> Self {
        Self {
            status: 0,
            track: 0,
            sector: 0,
            data: 0,
            command: 0,
            phase: Phase::Idle,
            wait: 0,
            offset: 0,
            sector_size: 0,
            dden: false,
            intrq: false,
            drq: false,
            lost_data: false,
            motor_on: false,
            motor_idle: 0,
            step_inward: true,
            is_1772: false,
            no_intrq: false,
        }
    }

    pub fn reset(&mut self) {
        self.status = 0;
        self.phase = Phase::Idle;
        self.wait = 0;
        self.intrq = false;
        self.drq = false;
        self.lost_data = false;
    }

    /// Density select: true = double density (MFM).
    pub fn set_dden(&mut self, dden: bool) {
        self.dden = dden;
    }

    pub fn set_1772(&mut self, is_1772: bool) {
        self.is_1772 = is_1772;
    }

    pub fn set_no_intrq(&mut self, no_intrq: bool) {
        self.no_intrq = no_intrq;
    }

    fn byte_ticks(&self) -> u32 {
        if self.dden { 32 } else { 64 }
    }

    fn step_ticks(&self) -> u32 {
        let rate = (self.command & 0x03) as usize;
        if self.is_1772 { STEP_TICKS_1772[rate] } else { STEP_TICKS_1770[rate] }
    }

    fn busy(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x03 {
            0 => {
                self.intrq = false;
                self.read_status()
            }
            1 => self.track,
            2 => self.sector,
            3 => {
                self.drq = false;
                self.data
            }
            _ => unreachable!(),
        }
    }

    fn read_status(&self) -> u8 {
        let mut status = 0u8;
        if self.busy() {
            status |= STATUS_BUSY;
        }
        if self.motor_on {
            status |= STATUS_MOTOR_ON;
        }
        if self.command < 0x80 || self.command >> 4 == 0x0D {
            // Type I layout.
            if self.motor_on {
                status |= STATUS_SPUN_UP;
            }
            if self.track == 0 {
                status |= STATUS_LOST_OR_TRACK0;
            }
        } else {
            if self.drq {
                status |= STATUS_DRQ_OR_INDEX;
            }
            if self.lost_data {
                status |= STATUS_LOST_OR_TRACK0;
            }
        }
        status | (self.status & (STATUS_RNF | STATUS_WRITE_PROTECT))
    }

    pub fn write(&mut self, reg: u8, value: u8, handler: &mut dyn FdcHandler) {
        match reg & 0x03 {
            0 => self.write_command(value, handler),
            1 => self.track = value,
            2 => self.sector = value,
            3 => {
                self.drq = false;
                self.data = value;
            }
            _ => unreachable!(),
        }
    }

    fn write_command(&mut self, value: u8, handler: &mut dyn FdcHandler) {
        if self.busy() && value >> 4 != 0x0D {
            return;
        }

        self.command = value;
        self.intrq = false;
        self.status &= !(STATUS_RNF | STATUS_WRITE_PROTECT);
        self.lost_data = false;

        if !self.motor_on && value >> 4 != 0x0D {
            self.motor_on = true;
            handler.spin_up();
        }
        self.motor_idle = 0;

        match value >> 4 {
            0x00 => {
                self.phase = Phase::Seek { target: 0, restore: true };
                self.wait = 0;
            }
            0x01 => {
                self.phase = Phase::Seek { target: self.data, restore: false };
                self.wait = 0;
            }
            0x02 | 0x03 => {
                self.phase = Phase::SingleStep {
                    inward: self.step_inward,
                    update_track: value & 0x10 != 0,
                };
                self.wait = self.step_ticks();
            }
            0x04 | 0x05 => {
                self.phase = Phase::SingleStep { inward: true, update_track: value & 0x10 != 0 };
                self.wait = self.step_ticks();
            }
            0x06 | 0x07 => {
                self.phase = Phase::SingleStep { inward: false, update_track: value & 0x10 != 0 };
                self.wait = self.step_ticks();
            }
            0x08 | 0x09 | 0x0A | 0x0B => {
                if value & 0x20 != 0 && handler.write_protected() {
                    self.status |= STATUS_WRITE_PROTECT;
                    self.finish();
                    return;
                }
                // h flag set skips the spin-up wait.
                self.phase = Phase::TransferWait;
                self.wait = if value & 0x08 != 0 { self.byte_ticks() * 4 } else { SPIN_UP_TICKS };
            }
            0x0C => {
                self.phase = Phase::ReadAddress { index: 0 };
                self.wait = self.byte_ticks() * 4;
            }
            0x0D => {
                // Force interrupt.
                self.phase = Phase::Idle;
                if value & 0x08 != 0 {
                    self.intrq = true;
                }
            }
            _ => {
                // Read/write track: not supported; complete empty.
                debug!("1770: unsupported track command ${value:02X}");
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        self.phase = Phase::Idle;
        self.intrq = true;
    }

    fn begin_transfer(&mut self, handler: &mut dyn FdcHandler) {
        match handler.sector_size(self.sector) {
            Some(size) => {
                self.sector_size = size;
                self.offset = 0;
                if self.command & 0x20 != 0 {
                    // Write: raise DRQ for the first byte.
                    self.drq = true;
                    self.phase = Phase::Writing;
                } else {
                    self.phase = Phase::Reading;
                }
                self.wait = self.byte_ticks();
            }
            None => {
                self.status |= STATUS_RNF;
                self.finish();
            }
        }
    }

    /// Advance one 1 MHz cycle.
    pub fn update(&mut self, handler: &mut dyn FdcHandler) -> FdcOutput {
        if self.motor_on && !self.busy() {
            self.motor_idle += 1;
            if self.motor_idle >= MOTOR_TIMEOUT_TICKS {
                self.motor_on = false;
                self.motor_idle = 0;
                handler.spin_down();
            }
        }

        if self.busy() {
            if self.wait > 0 {
                self.wait -= 1;
            } else {
                self.advance(handler);
            }
        }

        FdcOutput { intrq: self.intrq && !self.no_intrq, drq: self.drq }
    }

    fn advance(&mut self, handler: &mut dyn FdcHandler) {
        match self.phase {
            Phase::Idle => {}

            Phase::Seek { target, restore } => {
                let arrived =
                    if restore { handler.track0() } else { self.track == target };
                if arrived {
                    if restore {
                        self.track = 0;
                    }
                    self.phase = Phase::Settle;
                    self.wait = if self.command & 0x04 != 0 { SETTLE_TICKS } else { 0 };
                } else {
                    let inward = if restore { false } else { target > self.track };
                    handler.step(inward);
                    self.step_inward = inward;
                    if !restore {
                        self.track = if inward {
                            self.track.wrapping_add(1)
                        } else {
                            self.track.wrapping_sub(1)
                        };
                    }
                    self.wait = self.step_ticks();
                }
            }

            Phase::SingleStep { inward, update_track } => {
                handler.step(inward);
                self.step_inward = inward;
                if update_track {
                    self.track =
                        if inward { self.track.wrapping_add(1) } else { self.track.wrapping_sub(1) };
                }
                self.phase = Phase::Settle;
                self.wait = if self.command & 0x04 != 0 { SETTLE_TICKS } else { 0 };
            }

            Phase::Settle => self.finish(),

            Phase::TransferWait => self.begin_transfer(handler),

            Phase::Reading => {
                if self.offset >= self.sector_size {
                    if self.command & 0x10 != 0 {
                        // Multi-sector: carry on with the next one.
                        self.sector = self.sector.wrapping_add(1);
                        self.begin_transfer(handler);
                    } else {
                        self.finish();
                    }
                    return;
                }
                match handler.read_byte(self.sector, self.offset) {
                    Some(byte) => {
                        if self.drq {
                            self.lost_data = true;
                        }
                        self.data = byte;
                        self.drq = true;
                        self.offset += 1;
                        self.wait = self.byte_ticks();
                    }
                    None => {
                        self.status |= STATUS_RNF;
                        self.finish();
                    }
                }
            }

            Phase::Writing => {
                if self.drq {
                    // CPU never supplied the byte.
                    self.lost_data = true;
                    self.data = 0;
                }
                if !handler.write_byte(self.sector, self.offset, self.data) {
                    self.status |= STATUS_RNF;
                    self.finish();
                    return;
                }
                self.offset += 1;
                if self.offset >= self.sector_size {
                    if self.command & 0x10 != 0 {
                        self.sector = self.sector.wrapping_add(1);
                        self.begin_transfer(handler);
                    } else {
                        self.finish();
                    }
                } else {
                    self.drq = true;
                    self.wait = self.byte_ticks();
                }
            }

            Phase::ReadAddress { index } => {
                let size_code = match self.sector_size.max(256) {
                    128 => 0,
                    256 => 1,
                    512 => 2,
                    _ => 3,
                };
                let id = [handler.track(), 0, self.sector, size_code, 0xFF, 0xFF];
                self.data = id[index as usize];
                self.drq = true;
                if index == 1 {
                    // The 1770 copies the ID track into the sector register.
                    self.sector = handler.track();
                }
                if index == 5 {
                    self.finish();
                } else {
                    self.phase = Phase::ReadAddress { index: index + 1 };
                    self.wait = self.byte_ticks();
                }
            }
        }
    }
}

impl Default for Wd1770 {
    fn default() -> Self {
        Self::new()
    }
}
