use owlet_core::device::wd1770::{FdcHandler, Wd1770};

/// In-memory single-track-per-position drive: 10 sectors of 256 bytes
/// per track, like a DFS disc.
struct TestDrive {
    track: u8,
    data: Vec<u8>, // [track][sector][offset]
    write_protected: bool,
    motor: bool,
}

impl TestDrive {
    fn new() -> Self {
        let mut data = vec![0u8; 80 * 10 * 256];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        Self { track: 0, data, write_protected: false, motor: false }
    }

    fn index(&self, sector: u8, offset: usize) -> usize {
        (self.track as usize * 10 + sector as usize) * 256 + offset
    }
}

impl FdcHandler for TestDrive {
    fn spin_up(&mut self) {
        self.motor = true;
    }
    fn spin_down(&mut self) {
        self.motor = false;
    }
    fn step(&mut self, inward: bool) {
        self.track = if inward { self.track + 1 } else { self.track.saturating_sub(1) };
    }
    fn track0(&self) -> bool {
        self.track == 0
    }
    fn write_protected(&self) -> bool {
        self.write_protected
    }
    fn track(&self) -> u8 {
        self.track
    }
    fn sector_size(&mut self, sector: u8) -> Option<usize> {
        (sector < 10).then_some(256)
    }
    fn read_byte(&mut self, sector: u8, offset: usize) -> Option<u8> {
        let index = self.index(sector, offset);
        self.data.get(index).copied()
    }
    fn write_byte(&mut self, sector: u8, offset: usize, value: u8) -> bool {
        let index = self.index(sector, offset);
        match self.data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

fn run(fdc: &mut Wd1770, drive: &mut TestDrive, cycles: u32) -> (bool, bool) {
    let mut intrq = false;
    let mut drq = false;
    for _ in 0..cycles {
        let out = fdc.update(drive);
        intrq |= out.intrq;
        drq |= out.drq;
    }
    (intrq, drq)
}

#[test]
fn restore_homes_the_head_and_interrupts() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();
    drive.track = 5;

    fdc.write(0, 0x00, &mut drive); // Restore, slowest rate
    let (intrq, _) = run(&mut fdc, &mut drive, 8 * 31_000);

    assert!(intrq);
    assert_eq!(drive.track, 0);
    assert_eq!(fdc.read(1), 0); // track register homed
    assert!(drive.motor);
}

#[test]
fn seek_moves_to_the_data_register_target() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();

    fdc.write(3, 12, &mut drive); // data register = target track
    fdc.write(0, 0x10, &mut drive); // Seek
    run(&mut fdc, &mut drive, 13 * 7_000);

    assert_eq!(drive.track, 12);
    assert_eq!(fdc.read(1), 12);
}

#[test]
fn read_sector_streams_bytes_through_drq() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();

    fdc.write(2, 3, &mut drive); // sector 3
    fdc.write(0, 0x88, &mut drive); // Read sector, no spin-up wait

    let mut bytes = Vec::new();
    for _ in 0..200_000 {
        let out = fdc.update(&mut drive);
        if out.drq {
            bytes.push(fdc.read(3));
        }
        if out.intrq {
            break;
        }
    }

    assert_eq!(bytes.len(), 256);
    let base = (3 * 256) as usize;
    for (i, &byte) in bytes.iter().enumerate() {
        assert_eq!(byte, drive.data[base + i], "byte {i}");
    }
    // Completion leaves busy clear.
    assert_eq!(fdc.read(0) & 0x01, 0);
}

#[test]
fn read_missing_sector_sets_rnf() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();

    fdc.write(2, 15, &mut drive); // no such sector
    fdc.write(0, 0x88, &mut drive);
    let (intrq, _) = run(&mut fdc, &mut drive, 200_000);

    assert!(intrq);
    assert_ne!(fdc.read(0) & 0x10, 0); // RNF
}

#[test]
fn write_sector_stores_supplied_bytes() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();

    fdc.write(2, 0, &mut drive);
    fdc.write(0, 0xA8, &mut drive); // Write sector, no spin-up wait

    let mut written = 0u32;
    for _ in 0..200_000 {
        let out = fdc.update(&mut drive);
        if out.drq {
            fdc.write(3, (written & 0xFF) as u8, &mut drive);
            written += 1;
        }
        if out.intrq {
            break;
        }
    }

    assert!(written >= 256);
    assert_eq!(drive.data[0], 0);
    assert_eq!(drive.data[100], 100);
    assert_eq!(drive.data[255], 255);
}

#[test]
fn write_sector_respects_write_protect() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();
    drive.write_protected = true;

    fdc.write(0, 0xA8, &mut drive);
    let (intrq, _) = run(&mut fdc, &mut drive, 1_000);

    assert!(intrq);
    assert_ne!(fdc.read(0) & 0x40, 0); // write protect status
    assert_eq!(fdc.read(0) & 0x01, 0); // not busy
}

#[test]
fn force_interrupt_aborts_a_command() {
    let mut fdc = Wd1770::new();
    let mut drive = TestDrive::new();
    drive.track = 40;

    fdc.write(0, 0x00, &mut drive); // Restore (will take a while)
    run(&mut fdc, &mut drive, 100);
    assert_ne!(fdc.read(0) & 0x01, 0); // busy

    fdc.write(0, 0xD0, &mut drive); // Force interrupt, no INTRQ
    assert_eq!(fdc.read(0) & 0x01, 0);
}

#[test]
fn no_intrq_wiring_masks_the_interrupt_output() {
    let mut fdc = Wd1770::new();
    fdc.set_no_intrq(true);
    let mut drive = TestDrive::new();

    fdc.write(0, 0x00, &mut drive);
    let (intrq, _) = run(&mut fdc, &mut drive, 8 * 31_000);
    assert!(!intrq);
    // The command still completed.
    assert_eq!(fdc.read(0) & 0x01, 0);
}
