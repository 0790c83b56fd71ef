/// MC146818 real-time clock + battery RAM
///
/// The Master 128's CMOS chip: time/calendar registers, control
/// registers A-D and 50 bytes of battery-backed RAM holding the
/// machine's configuration (the NVRAM). Wired to the system VIA port A
/// with address/data strobes driven from the addressable latch.
///
/// | Reg   | Contents                                   |
/// |-------|--------------------------------------------|
/// | 0-9   | Time/alarm/calendar                        |
/// | 10    | Register A (divider / rate select)         |
/// | 11    | Register B (SET, data mode, 24/12)         |
/// | 12    | Register C (interrupt flags, read-only)    |
/// | 13    | Register D (valid RAM/time, read-only)     |
/// | 14-63 | Battery RAM                                |
///
/// `update()` runs at 1 MHz; the time advances once per second unless
/// register B's SET bit holds updates off.
#[derive(Clone, Debug, PartialEq)]
pub struct Mc146818 {
    registers: [u8; 64],
    address: u8,
    subsecond: u32,
}

/// Calendar values for initialising the clock, always binary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RtcTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_of_week: u8, // 1-7, 1 = Sunday
    pub day: u8,         // 1-31
    pub month: u8,       // 1-12
    pub year: u8,        // 0-99
}

pub const NVRAM_SIZE: usize = 50;

const REG_SECONDS: usize = 0;
const REG_MINUTES: usize = 2;
const REG_HOURS: usize = 4;
const REG_DAY_OF_WEEK: usize = 6;
const REG_DAY: usize = 7;
const REG_MONTH: usize = 8;
const REG_YEAR: usize = 9;
const REG_A: usize = 10;
const REG_B: usize = 11;
const REG_C: usize = 12;
const REG_D: usize = 13;

const REG_B_SET: u8 = 0x80;
const REG_B_BINARY: u8 = 0x04;
const REG_B_24H: u8 = 0x02;

fn to_bcd(value: u8) -> u8 {
    (value / 10) << 4 | (value % 10)
}

fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

impl Mc146818 {
    pub fn new() -> Self {
        let mut rtc = Self { registers: [0; 64], address: 0, subsecond: 0 };
        // Default to 24-hour BCD with the oscillator running.
        rtc.registers[REG_B] = REG_B_24H;
        rtc.registers[REG_D] = 0x80; // valid RAM and time
        rtc
    }

    pub fn set_address(&mut self, address: u8) {
        self.address = address & 0x3F;
    }

    pub fn read(&mut self) -> u8 {
        match self.address as usize {
            // Interrupt sources are not wired up on the BBC; reading
            // register C clears the (always empty) flags.
            REG_C => 0,
            REG_D => 0x80,
            reg => self.registers[reg],
        }
    }

    pub fn set_data(&mut self, value: u8) {
        match self.address as usize {
            REG_C | REG_D => {}
            REG_A => self.registers[REG_A] = value & 0x7F,
            reg => self.registers[reg] = value,
        }
    }

    fn binary_mode(&self) -> bool {
        self.registers[REG_B] & REG_B_BINARY != 0
    }

    fn encode(&self, value: u8) -> u8 {
        if self.binary_mode() { value } else { to_bcd(value) }
    }

    fn decode(&self, value: u8) -> u8 {
        if self.binary_mode() { value } else { from_bcd(value) }
    }

    /// Initialise the calendar from host time.
    pub fn set_time(&mut self, time: &RtcTime) {
        self.registers[REG_SECONDS] = self.encode(time.seconds);
        self.registers[REG_MINUTES] = self.encode(time.minutes);
        self.registers[REG_DAY_OF_WEEK] = self.encode(time.day_of_week);
        self.registers[REG_DAY] = self.encode(time.day);
        self.registers[REG_MONTH] = self.encode(time.month);
        self.registers[REG_YEAR] = self.encode(time.year);

        if self.registers[REG_B] & REG_B_24H != 0 {
            self.registers[REG_HOURS] = self.encode(time.hours);
        } else {
            let (hours12, pm) = match time.hours {
                0 => (12, false),
                1..=11 => (time.hours, false),
                12 => (12, true),
                _ => (time.hours - 12, true),
            };
            self.registers[REG_HOURS] = self.encode(hours12) | if pm { 0x80 } else { 0 };
        }
    }

    /// Load the battery RAM (the Master NVRAM). Short input leaves the
    /// remainder untouched.
    pub fn set_ram_contents(&mut self, contents: &[u8]) {
        let len = contents.len().min(NVRAM_SIZE);
        self.registers[14..14 + len].copy_from_slice(&contents[..len]);
    }

    pub fn ram_contents(&self) -> [u8; NVRAM_SIZE] {
        let mut out = [0; NVRAM_SIZE];
        out.copy_from_slice(&self.registers[14..64]);
        out
    }

    /// Advance one 1 MHz cycle.
    pub fn update(&mut self) {
        if self.registers[REG_B] & REG_B_SET != 0 {
            self.subsecond = 0;
            return;
        }
        self.subsecond += 1;
        if self.subsecond >= 1_000_000 {
            self.subsecond = 0;
            self.advance_second();
        }
    }

    fn advance_second(&mut self) {
        let seconds = self.decode(self.registers[REG_SECONDS]) + 1;
        if seconds < 60 {
            self.registers[REG_SECONDS] = self.encode(seconds);
            return;
        }
        self.registers[REG_SECONDS] = self.encode(0);

        let minutes = self.decode(self.registers[REG_MINUTES]) + 1;
        if minutes < 60 {
            self.registers[REG_MINUTES] = self.encode(minutes);
            return;
        }
        self.registers[REG_MINUTES] = self.encode(0);

        if !self.advance_hour() {
            return;
        }

        let dow = self.decode(self.registers[REG_DAY_OF_WEEK]);
        self.registers[REG_DAY_OF_WEEK] = self.encode(dow % 7 + 1);

        let year = self.decode(self.registers[REG_YEAR]);
        let month = self.decode(self.registers[REG_MONTH]);
        let day = self.decode(self.registers[REG_DAY]) + 1;
        if day <= days_in_month(month, year) {
            self.registers[REG_DAY] = self.encode(day);
            return;
        }
        self.registers[REG_DAY] = self.encode(1);

        if month < 12 {
            self.registers[REG_MONTH] = self.encode(month + 1);
            return;
        }
        self.registers[REG_MONTH] = self.encode(1);
        self.registers[REG_YEAR] = self.encode((year + 1) % 100);
    }

    /// Returns true when the day rolled over.
    fn advance_hour(&mut self) -> bool {
        if self.registers[REG_B] & REG_B_24H != 0 {
            let hours = self.decode(self.registers[REG_HOURS]) + 1;
            if hours < 24 {
                self.registers[REG_HOURS] = self.encode(hours);
                false
            } else {
                self.registers[REG_HOURS] = self.encode(0);
                true
            }
        } else {
            let pm = self.registers[REG_HOURS] & 0x80 != 0;
            let hours = self.decode(self.registers[REG_HOURS] & 0x7F) + 1;
            match (hours, pm) {
                (12, false) => {
                    self.registers[REG_HOURS] = self.encode(12) | 0x80;
                    false
                }
                (12, true) => {
                    self.registers[REG_HOURS] = self.encode(12);
                    true
                }
                (13, _) => {
                    self.registers[REG_HOURS] =
                        self.encode(1) | if pm { 0x80 } else { 0 };
                    false
                }
                _ => {
                    self.registers[REG_HOURS] =
                        self.encode(hours) | if pm { 0x80 } else { 0 };
                    false
                }
            }
        }
    }
}

fn days_in_month(month: u8, year: u8) -> u8 {
    match month {
        2 => {
            if year % 4 == 0 { 29 } else { 28 }
        }
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

impl Default for Mc146818 {
    fn default() -> Self {
        Self::new()
    }
}
