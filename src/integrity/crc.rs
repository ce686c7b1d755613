use crate::{config::CrcConfig, Error, Result};

const POLY: u16 = 0x1021;

/// CRC-CCITT frame checksum validator.
///
/// The 16-bit checksum sits in the two bytes immediately before the
/// trailing Reed-Solomon parity span (or at the configured parity
/// offset), covering everything from the frame start or the end of the
/// sync pattern up to itself. Lookup is split into high-nibble and
/// low-nibble contribution tables XORed per step.
pub struct CrcDecoder {
    hi: [u16; 256],
    lo: [u16; 256],
    seed: u16,
    start: usize,
    checksum_at: usize,
    discard: bool,
}

fn byte_crc(b: u8) -> u16 {
    let mut r = u16::from(b) << 8;
    for _ in 0..8 {
        r = if r & 0x8000 != 0 { (r << 1) ^ POLY } else { r << 1 };
    }
    r
}

impl CrcDecoder {
    /// Resolve the checksum span against the frame layout.
    ///
    /// # Errors
    /// [`Error::Config`] when the checksum position falls outside the
    /// frame or leaves an empty span.
    pub fn new(
        cfg: &CrcConfig,
        frame_length: usize,
        sync_length: usize,
        rs_parity_span: Option<usize>,
    ) -> Result<Self> {
        let start = if cfg.include_sync { 0 } else { sync_length };
        let parity_offset = match cfg.parity_offset {
            Some(off) => off,
            None => frame_length.saturating_sub(rs_parity_span.unwrap_or(0)),
        };
        if parity_offset > frame_length || parity_offset < start + 3 {
            return Err(Error::Config(format!(
                "checksum at {parity_offset}-2 leaves no span in a {frame_length}-byte frame"
            )));
        }
        let checksum_at = parity_offset - 2;

        // the byte table is linear over GF(2), so it splits by nibble
        let mut hi = [0u16; 256];
        let mut lo = [0u16; 256];
        for b in 0..256 {
            hi[b] = byte_crc(b as u8 & 0xf0);
            lo[b] = byte_crc(b as u8 & 0x0f);
        }

        Ok(CrcDecoder {
            hi,
            lo,
            seed: cfg.seed,
            start,
            checksum_at,
            discard: cfg.discard_bad_frames,
        })
    }

    pub fn discard_bad_frames(&self) -> bool {
        self.discard
    }

    pub fn checksum_offset(&self) -> usize {
        self.checksum_at
    }

    fn compute(&self, data: &[u8]) -> u16 {
        let mut crc = self.seed;
        for &b in data {
            let idx = usize::from(((crc >> 8) as u8) ^ b);
            crc = (crc << 8) ^ self.hi[idx] ^ self.lo[idx];
        }
        crc
    }

    /// `true` when the stored checksum matches the computed one.
    pub fn check(&self, frame: &[u8]) -> bool {
        let want = u16::from_be_bytes([frame[self.checksum_at], frame[self.checksum_at + 1]]);
        self.compute(&frame[self.start..self.checksum_at]) == want
    }

    /// Write the checksum for the configured span, for loopback use.
    pub fn stamp(&self, frame: &mut [u8]) {
        let crc = self.compute(&frame[self.start..self.checksum_at]);
        frame[self.checksum_at..self.checksum_at + 2].copy_from_slice(&crc.to_be_bytes());
    }
}
