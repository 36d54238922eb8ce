//! Fixed-capacity circular byte buffer.

/// Circular byte buffer with power-of-two capacity `N` (at most 256).
///
/// `head` is the producer index, `tail` the consumer index; `head == tail`
/// means empty, so `N - 1` slots are usable. Producer and consumer may live
/// in different execution contexts (ISR vs. main loop) but each index is
/// only ever advanced by its own side; [`RingBuffer::rewind`] is the one
/// exception and belongs to the producer.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    buf: [u8; N],
    head: u8,
    tail: u8,
}

impl<const N: usize> RingBuffer<N> {
    const VALID: () = assert!(N.is_power_of_two() && N <= 256, "capacity must be a power of two <= 256");

    pub fn new() -> Self {
        // Force the capacity check to be evaluated for this N.
        let () = Self::VALID;
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
        }
    }

    fn mask(index: u8) -> u8 {
        // N <= 256, so the mask fits in u8 (N == 256 masks with 0xFF).
        index & ((N - 1) as u8)
    }

    /// True if at least one byte is queued.
    pub fn available(&self) -> bool {
        self.head != self.tail
    }

    /// Number of queued bytes: `(N + head - tail) mod N`.
    pub fn len(&self) -> u8 {
        Self::mask(self.head.wrapping_sub(self.tail))
    }

    pub fn is_empty(&self) -> bool {
        !self.available()
    }

    /// Free slots remaining before [`RingBuffer::push`] starts failing.
    pub fn free(&self) -> u8 {
        (N - 1) as u8 - self.len()
    }

    /// Appends one byte. Returns false (dropping the byte) when full.
    pub fn push(&mut self, value: u8) -> bool {
        let next = Self::mask(self.head.wrapping_add(1));
        if next == self.tail {
            return false;
        }
        self.buf[self.head as usize] = value;
        self.head = next;
        true
    }

    /// Removes and returns the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.head == self.tail {
            return None;
        }
        let value = self.buf[self.tail as usize];
        self.tail = Self::mask(self.tail.wrapping_add(1));
        Some(value)
    }

    /// Un-writes the `n` most recently pushed bytes.
    ///
    /// Producer-side overrun recovery: a multi-byte emission that only
    /// partially fit is taken back so the consumer never sees a truncated
    /// sequence. `n` must not exceed the current length.
    pub fn rewind(&mut self, n: u8) {
        debug_assert!(n <= self.len());
        self.head = Self::mask(self.head.wrapping_sub(n));
    }

    /// Drops all queued bytes.
    pub fn flush(&mut self) {
        self.tail = self.head;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
