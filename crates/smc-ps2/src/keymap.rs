//! Scan code Set 2 to IBM key-number translation.
//!
//! The output space is the IBM 101/102/104-key numbering (1..=126): host
//! firmware sees one byte per key event, break form = key number | 0x80.
//! Codes with no entry (fake shifts, power-management keys) translate to
//! `None` and are dropped by the decoder.

/// IBM key numbers for the keys the decoder treats specially.
pub const KEY_LSHIFT: u8 = 44;
pub const KEY_RSHIFT: u8 = 57;
pub const KEY_LCTRL: u8 = 58;
pub const KEY_RCTRL: u8 = 64;
pub const KEY_LALT: u8 = 60;
pub const KEY_RALT: u8 = 62;
pub const KEY_LMETA: u8 = 59;
pub const KEY_RMETA: u8 = 63;
pub const KEY_DELETE: u8 = 76;
pub const KEY_PRTSCR: u8 = 124;
pub const KEY_PAUSE: u8 = 126;

/// Translates a one-byte Set-2 make code (no prefix).
pub fn base_keynum(code: u8) -> Option<u8> {
    let key = match code {
        0x01 => 120, // F9
        0x03 => 116, // F5
        0x04 => 114, // F3
        0x05 => 112, // F1
        0x06 => 113, // F2
        0x07 => 123, // F12
        0x09 => 121, // F10
        0x0A => 119, // F8
        0x0B => 117, // F6
        0x0C => 115, // F4
        0x0D => 16,  // Tab
        0x0E => 1,   // ` ~
        0x11 => KEY_LALT,
        0x12 => KEY_LSHIFT,
        0x14 => KEY_LCTRL,
        0x15 => 17, // Q
        0x16 => 2,  // 1
        0x1A => 46, // Z
        0x1B => 32, // S
        0x1C => 31, // A
        0x1D => 18, // W
        0x1E => 3,  // 2
        0x21 => 48, // C
        0x22 => 47, // X
        0x23 => 33, // D
        0x24 => 19, // E
        0x25 => 5,  // 4
        0x26 => 4,  // 3
        0x29 => 61, // Space
        0x2A => 49, // V
        0x2B => 34, // F
        0x2C => 21, // T
        0x2D => 20, // R
        0x2E => 6,  // 5
        0x31 => 51, // N
        0x32 => 50, // B
        0x33 => 36, // H
        0x34 => 35, // G
        0x35 => 22, // Y
        0x36 => 7,  // 6
        0x3A => 52, // M
        0x3B => 37, // J
        0x3C => 23, // U
        0x3D => 8,  // 7
        0x3E => 9,  // 8
        0x41 => 53, // , <
        0x42 => 38, // K
        0x43 => 24, // I
        0x44 => 25, // O
        0x45 => 11, // 0
        0x46 => 10, // 9
        0x49 => 54, // . >
        0x4A => 55, // / ?
        0x4B => 39, // L
        0x4C => 40, // ; :
        0x4D => 26, // P
        0x4E => 12, // - _
        0x52 => 41, // ' "
        0x54 => 27, // [ {
        0x55 => 13, // = +
        0x58 => 30, // Caps Lock
        0x59 => KEY_RSHIFT,
        0x5A => 43, // Enter
        0x5B => 28, // ] }
        0x5D => 29, // \ |
        0x61 => 45, // 102nd key (ISO < >)
        0x66 => 15, // Backspace
        0x69 => 93, // KP 1
        0x6B => 92, // KP 4
        0x6C => 91, // KP 7
        0x70 => 99, // KP 0
        0x71 => 104, // KP .
        0x72 => 98, // KP 2
        0x73 => 97, // KP 5
        0x74 => 102, // KP 6
        0x75 => 96, // KP 8
        0x76 => 110, // Esc
        0x77 => 90, // Num Lock
        0x78 => 122, // F11
        0x79 => 106, // KP +
        0x7A => 103, // KP 3
        0x7B => 105, // KP -
        0x7C => 100, // KP *
        0x7D => 101, // KP 9
        0x7E => 125, // Scroll Lock
        0x83 => 118, // F7
        _ => return None,
    };
    Some(key)
}

/// Translates an `0xE0`-prefixed Set-2 code.
pub fn extended_keynum(code: u8) -> Option<u8> {
    let key = match code {
        0x11 => KEY_RALT,
        0x14 => KEY_RCTRL,
        0x1F => KEY_LMETA,
        0x27 => KEY_RMETA,
        0x2F => 65, // Menu
        0x4A => 95, // KP /
        0x5A => 108, // KP Enter
        0x69 => 81, // End
        0x6B => 79, // Left
        0x6C => 80, // Home
        0x70 => 75, // Insert
        0x71 => KEY_DELETE,
        0x72 => 84, // Down
        0x74 => 89, // Right
        0x75 => 83, // Up
        0x7A => 86, // Page Down
        0x7C => KEY_PRTSCR,
        0x7D => 85, // Page Up
        // 0x12 is the fake shift wrapped around PrtScr/navigation codes.
        _ => return None,
    };
    Some(key)
}
