/// Removes the bit-transition-density pseudo-noise cover applied by the
/// transmit side.
///
/// The sequence is generated by h(x) = x^8 + x^7 + x^5 + x^3 + 1 seeded
/// with all ones. Its 255-bit period lands on a byte boundary after eight
/// repetitions, so a 255-byte table XORed cyclically over the data
/// reproduces the full sequence at every frame offset.
pub struct Derandomizer {
    table: [u8; 255],
}

impl Default for Derandomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Derandomizer {
    pub fn new() -> Self {
        let mut table = [0u8; 255];
        // shift register of the last 8 sequence bits, newest in bit 0
        let mut reg: u16 = 0xff;
        for slot in table.iter_mut() {
            let mut byte = 0u8;
            for _ in 0..8 {
                let out = (reg >> 7) & 1;
                byte = (byte << 1) | out as u8;
                let next = (reg ^ (reg >> 2) ^ (reg >> 4) ^ (reg >> 7)) & 1;
                reg = ((reg << 1) | next) & 0xff;
            }
            *slot = byte;
        }
        Derandomizer { table }
    }

    /// XOR the sequence over `data`, which starts at sequence offset 0.
    /// The transform is an involution: applying it twice restores the
    /// input.
    pub fn decode(&self, data: &mut [u8]) {
        for (i, b) in data.iter_mut().enumerate() {
            *b ^= self.table[i % 255];
        }
    }
}
