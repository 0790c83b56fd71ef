//! BBC keyboard matrix codes.
//!
//! A key code packs its matrix position as `column | row << 4`, the
//! form the keyboard scan hardware uses: the low nibble drives the
//! column counter compare, the high bits select the row within the
//! column. Row 0 holds Shift/Ctrl and the DIP links and never raises
//! the keyboard interrupt.
//!
//! Break is not part of the matrix; it pulls the system reset line and
//! gets a sentinel code of its own.

pub type BeebKey = u8;

/// Out-of-matrix sentinel: holds the CPU in reset while down.
pub const BREAK: BeebKey = 0xFF;

pub const SHIFT: BeebKey = 0x00;
pub const CTRL: BeebKey = 0x01;

pub const Q: BeebKey = 0x10;
pub const KEY_3: BeebKey = 0x11;
pub const KEY_4: BeebKey = 0x12;
pub const KEY_5: BeebKey = 0x13;
pub const F4: BeebKey = 0x14;
pub const KEY_8: BeebKey = 0x15;
pub const F7: BeebKey = 0x16;
pub const MINUS: BeebKey = 0x17;
pub const CARET: BeebKey = 0x18;
pub const LEFT: BeebKey = 0x19;

pub const F0: BeebKey = 0x20;
pub const W: BeebKey = 0x21;
pub const E: BeebKey = 0x22;
pub const T: BeebKey = 0x23;
pub const KEY_7: BeebKey = 0x24;
pub const I: BeebKey = 0x25;
pub const KEY_9: BeebKey = 0x26;
pub const KEY_0: BeebKey = 0x27;
pub const UNDERSCORE: BeebKey = 0x28;
pub const RIGHT: BeebKey = 0x29;

pub const KEY_1: BeebKey = 0x30;
pub const KEY_2: BeebKey = 0x31;
pub const D: BeebKey = 0x32;
pub const R: BeebKey = 0x33;
pub const KEY_6: BeebKey = 0x34;
pub const U: BeebKey = 0x35;
pub const O: BeebKey = 0x36;
pub const P: BeebKey = 0x37;
pub const BRACKET_LEFT: BeebKey = 0x38;
pub const UP: BeebKey = 0x39;

pub const CAPS_LOCK: BeebKey = 0x40;
pub const A: BeebKey = 0x41;
pub const X: BeebKey = 0x42;
pub const F: BeebKey = 0x43;
pub const Y: BeebKey = 0x44;
pub const J: BeebKey = 0x45;
pub const K: BeebKey = 0x46;
pub const AT: BeebKey = 0x47;
pub const COLON: BeebKey = 0x48;
pub const RETURN: BeebKey = 0x49;

pub const SHIFT_LOCK: BeebKey = 0x50;
pub const S: BeebKey = 0x51;
pub const C: BeebKey = 0x52;
pub const G: BeebKey = 0x53;
pub const H: BeebKey = 0x54;
pub const N: BeebKey = 0x55;
pub const L: BeebKey = 0x56;
pub const SEMICOLON: BeebKey = 0x57;
pub const BRACKET_RIGHT: BeebKey = 0x58;
pub const DELETE: BeebKey = 0x59;

pub const TAB: BeebKey = 0x60;
pub const Z: BeebKey = 0x61;
pub const SPACE: BeebKey = 0x62;
pub const V: BeebKey = 0x63;
pub const B: BeebKey = 0x64;
pub const M: BeebKey = 0x65;
pub const COMMA: BeebKey = 0x66;
pub const PERIOD: BeebKey = 0x67;
pub const SLASH: BeebKey = 0x68;
pub const COPY: BeebKey = 0x69;

pub const ESCAPE: BeebKey = 0x70;
pub const F1: BeebKey = 0x71;
pub const F2: BeebKey = 0x72;
pub const F3: BeebKey = 0x73;
pub const F5: BeebKey = 0x74;
pub const F6: BeebKey = 0x75;
pub const F8: BeebKey = 0x76;
pub const F9: BeebKey = 0x77;
pub const BACKSLASH: BeebKey = 0x78;
pub const DOWN: BeebKey = 0x79;

/// Key pressed to kick a paste off, released again once the MOS starts
/// reading input.
pub const PASTE_START_KEY: BeebKey = SPACE;
pub const PASTE_START_CHAR: u8 = b' ';
