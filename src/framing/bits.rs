/// Read position into the logical byte stream formed by the crossover
/// bytes carried over from the previous buffer followed by the current
/// input buffer.
///
/// The cursor tracks a byte offset plus a bit offset 0..=7 and is owned by
/// whichever stage is actively scanning; it never outlives one call.
pub(crate) struct BitCursor<'a> {
    head: &'a [u8],
    tail: &'a [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitCursor<'a> {
    pub fn new(head: &'a [u8], tail: &'a [u8]) -> Self {
        BitCursor {
            head,
            tail,
            byte: 0,
            bit: 0,
        }
    }

    /// Total length of the logical stream in bytes.
    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn position(&self) -> usize {
        self.byte
    }

    pub fn get(&self, i: usize) -> u8 {
        if i < self.head.len() {
            self.head[i]
        } else {
            self.tail[i - self.head.len()]
        }
    }

    /// Move to an absolute (byte, bit) position.
    pub fn relocate(&mut self, byte: usize, bit: u8) {
        debug_assert!(bit < 8);
        self.byte = byte;
        self.bit = bit;
    }

    /// `true` when a whole bit-shifted byte can be taken: the byte under
    /// the cursor plus, at a nonzero bit offset, the byte after it.
    pub fn can_take_byte(&self) -> bool {
        if self.bit == 0 {
            self.byte < self.len()
        } else {
            self.byte + 1 < self.len()
        }
    }

    /// Take the next 8 bits at the current alignment: the low bits of the
    /// byte under the cursor joined with the high bits of the next.
    pub fn take_byte(&mut self) -> u8 {
        debug_assert!(self.can_take_byte());
        let b = if self.bit == 0 {
            self.get(self.byte)
        } else {
            (self.get(self.byte) << self.bit) | (self.get(self.byte + 1) >> (8 - self.bit))
        };
        self.byte += 1;
        b
    }

    /// `true` when `window` bytes of pattern starting at the current
    /// (byte, bit) position are fully contained in the stream.
    pub fn window_available(&self, window: usize) -> bool {
        let span = window + usize::from(self.bit != 0);
        self.byte + span <= self.len()
    }

    /// Copy every byte from `from` to the end of the stream.
    pub fn copy_from(&self, from: usize) -> Vec<u8> {
        (from..self.len()).map(|i| self.get(i)).collect()
    }

    /// Copy the trailing `n` bytes (or fewer if the stream is shorter).
    pub fn copy_tail(&self, n: usize) -> Vec<u8> {
        self.copy_from(self.len().saturating_sub(n))
    }
}
