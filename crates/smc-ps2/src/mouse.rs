//! Mouse packet aggregator.
//!
//! Assembles 3- or 4-byte motion packets once the init sequencer has
//! negotiated a device ID, and coalesces bursts by merging a freshly
//! completed packet into the newest still-queued one when that cannot lose
//! information (same buttons, no hardware overflow, sums within range).
//! Merging bounds queue growth under a slow host instead of dropping
//! motion.

use tracing::trace;

use crate::ring::RingBuffer;

/// Always-set bit in the first byte of a packet; used for resync.
const SYNC_BIT: u8 = 0x08;
/// Button bits in the first byte.
const BUTTON_MASK: u8 = 0x07;
/// X/Y overflow bits in the first byte.
const OVERFLOW_MASK: u8 = 0xC0;
/// Buttons 4/5 in the fourth byte (ID-4 devices).
const EXT_BUTTON_MASK: u8 = 0x30;
/// Wheel nibble in the fourth byte.
const WHEEL_MASK: u8 = 0x0F;

/// Queued packets; power-of-two ring with one slot reserved.
const QUEUE: usize = 8;

/// A decoded motion packet.
///
/// Deltas are kept sign-extended so merged packets can exceed the wire's
/// 9-bit field transiently during the range check; anything stored here is
/// guaranteed to re-encode without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MousePacket {
    /// Button bits (0..=2) of the first packet byte.
    pub buttons: u8,
    pub dx: i16,
    pub dy: i16,
    /// Wheel delta; only on the wire when the packet size is 4.
    pub wheel: i8,
    /// Buttons 4/5 as wire bits (4-5 of the fourth byte); zero for 3-byte
    /// packets.
    pub ext_buttons: u8,
}

impl MousePacket {
    /// Encodes to wire form. Returns the bytes and their count.
    pub fn encode(&self, packet_size: u8) -> ([u8; 4], usize) {
        let mut b0 = (self.buttons & BUTTON_MASK) | SYNC_BIT;
        if self.dx < 0 {
            b0 |= 0x10;
        }
        if self.dy < 0 {
            b0 |= 0x20;
        }
        let b3 = (self.wheel as u8 & WHEEL_MASK) | self.ext_buttons;
        let bytes = [b0, self.dx as u8, self.dy as u8, b3];
        (bytes, packet_size as usize)
    }
}

#[derive(Debug)]
pub struct MouseAggregator {
    /// None until the sequencer reports the device ready.
    packet_size: Option<u8>,
    partial: [u8; 4],
    received: u8,
    packets: [MousePacket; QUEUE],
    head: u8,
    tail: u8,
    /// False when the newest queued packet arrived with a hardware overflow
    /// bit set; such packets are never merge targets.
    newest_mergeable: bool,
}

impl MouseAggregator {
    pub fn new() -> Self {
        const EMPTY: MousePacket = MousePacket {
            buttons: 0,
            dx: 0,
            dy: 0,
            wheel: 0,
            ext_buttons: 0,
        };
        Self {
            packet_size: None,
            partial: [0; 4],
            received: 0,
            packets: [EMPTY; QUEUE],
            head: 0,
            tail: 0,
            newest_mergeable: false,
        }
    }

    /// Enables packet assembly with the negotiated size (3 or 4 bytes).
    pub fn enable(&mut self, packet_size: u8) {
        debug_assert!(packet_size == 3 || packet_size == 4);
        self.packet_size = Some(packet_size);
        self.received = 0;
    }

    /// Back to pass-through mode; drops partial and queued packets.
    pub fn disable(&mut self) {
        self.packet_size = None;
        self.received = 0;
        self.head = 0;
        self.tail = 0;
    }

    pub fn enabled(&self) -> bool {
        self.packet_size.is_some()
    }

    pub fn packet_size(&self) -> Option<u8> {
        self.packet_size
    }

    fn mask(index: u8) -> u8 {
        index & (QUEUE as u8 - 1)
    }

    /// Number of complete packets waiting for the host.
    pub fn queued(&self) -> u8 {
        Self::mask(self.head.wrapping_sub(self.tail))
    }

    pub fn pop_packet(&mut self) -> Option<MousePacket> {
        if self.head == self.tail {
            return None;
        }
        let packet = self.packets[self.tail as usize];
        self.tail = Self::mask(self.tail.wrapping_add(1));
        Some(packet)
    }

    /// Feeds one byte from the transceiver. Before the device is ready the
    /// byte goes to the raw ring (the sequencer reads responses there).
    pub fn process<const N: usize>(&mut self, byte: u8, raw: &mut RingBuffer<N>) {
        let Some(packet_size) = self.packet_size else {
            raw.push(byte);
            return;
        };

        if self.received == 0 && byte & SYNC_BIT == 0 {
            // Out of step with the device; wait for a plausible first byte.
            trace!(byte, "mouse resync: dropping byte without sync bit");
            return;
        }

        self.partial[self.received as usize] = byte;
        self.received += 1;
        if self.received < packet_size {
            return;
        }
        self.received = 0;

        let packet = decode(&self.partial, packet_size);
        if self.try_merge(&packet, packet_size) {
            return;
        }
        let next = Self::mask(self.head.wrapping_add(1));
        if next == self.tail {
            // Queue full and unmergeable; the packet is lost.
            trace!("mouse packet queue overrun");
            return;
        }
        self.packets[self.head as usize] = packet;
        self.head = next;
        self.newest_mergeable = self.partial[0] & OVERFLOW_MASK == 0;
    }

    /// Merges `packet` into the newest queued packet if nothing is lost:
    /// identical buttons, no overflow flagged on either side, and all
    /// summed deltas within their wire ranges.
    fn try_merge(&mut self, packet: &MousePacket, packet_size: u8) -> bool {
        if self.head == self.tail || !self.newest_mergeable {
            return false;
        }
        if self.partial[0] & OVERFLOW_MASK != 0 {
            return false;
        }
        let newest = Self::mask(self.head.wrapping_sub(1));
        let queued = &self.packets[newest as usize];
        if queued.buttons != packet.buttons || queued.ext_buttons != packet.ext_buttons {
            return false;
        }
        let dx = queued.dx + packet.dx;
        let dy = queued.dy + packet.dy;
        if dx.abs() > 255 || dy.abs() > 255 {
            return false;
        }
        let wheel = queued.wheel as i16 + packet.wheel as i16;
        if packet_size == 4 && !(-8..=7).contains(&wheel) {
            return false;
        }
        let queued = &mut self.packets[newest as usize];
        queued.dx = dx;
        queued.dy = dy;
        queued.wheel = wheel as i8;
        true
    }
}

impl Default for MouseAggregator {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(bytes: &[u8; 4], packet_size: u8) -> MousePacket {
    let flags = bytes[0];
    let mut dx = bytes[1] as i16;
    if flags & 0x10 != 0 {
        dx -= 256;
    }
    let mut dy = bytes[2] as i16;
    if flags & 0x20 != 0 {
        dy -= 256;
    }
    let (wheel, ext_buttons) = if packet_size == 4 {
        // Signed 4-bit wheel nibble; buttons 4/5 ride in bits 4-5.
        let nibble = bytes[3] & WHEEL_MASK;
        let wheel = if nibble >= 8 {
            nibble as i8 - 16
        } else {
            nibble as i8
        };
        (wheel, bytes[3] & EXT_BUTTON_MASK)
    } else {
        (0, 0)
    };
    MousePacket {
        buttons: flags & BUTTON_MASK,
        dx,
        dy,
        wheel,
        ext_buttons,
    }
}
