//! Configuration surface consumed from an external structured-config
//! collaborator.
//!
//! All values deserialize with `serde`; [`typed_builder::TypedBuilder`] is
//! derived for programmatic construction. Validation happens when a stage
//! is constructed from its config, not at deserialization time.

use std::io::Read;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{Error, Result};

fn default_true() -> bool {
    true
}

fn default_seed() -> u16 {
    0xffff
}

/// Frame synchronizer settings.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct SyncConfig {
    /// Sync pattern as hex digits, e.g. `"1ACFFC1D"`. The pattern length
    /// in bytes is derived from the digit count.
    #[builder(setter(into))]
    pub pattern: String,

    /// Total frame length in bytes, including the sync pattern.
    pub frame_length: usize,

    /// Bit-slip tolerance: 0 (off), 1, or 2 bits.
    #[serde(default)]
    #[builder(default)]
    pub slip_tolerance: u8,

    /// Search for the pattern at true polarity.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub true_sync: bool,

    /// Search for the bit-inverted pattern.
    #[serde(default)]
    #[builder(default)]
    pub inverted_sync: bool,

    /// Re-invert frame bytes when locked onto an inverted pattern.
    #[serde(default)]
    #[builder(default)]
    pub correct_inversion: bool,

    /// Number of frame-equivalents to bridge a lost lock. 0 disables the
    /// flywheel and loss of lock drops straight back to search.
    #[serde(default)]
    #[builder(default)]
    pub flywheel_duration: u32,

    /// Emit flywheel blocks as placeholder frames instead of discarding
    /// them.
    #[serde(default)]
    #[builder(default)]
    pub send_flywheels: bool,
}

impl SyncConfig {
    /// Parse the configured hex pattern into bytes.
    ///
    /// # Errors
    /// [`Error::Config`] if the digits are not valid hex, the digit count
    /// is odd, or the pattern is not 2 to 4 bytes long.
    pub fn pattern_bytes(&self) -> Result<Vec<u8>> {
        let digits = self.pattern.trim_start_matches("0x").trim_start_matches("0X");
        if digits.len() % 2 != 0 {
            return Err(Error::Config(format!(
                "sync pattern needs an even number of hex digits, got {:?}",
                self.pattern
            )));
        }
        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for i in (0..digits.len()).step_by(2) {
            let b = u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| {
                Error::Config(format!("sync pattern is not hex: {:?}", self.pattern))
            })?;
            bytes.push(b);
        }
        if bytes.len() < 2 || bytes.len() > 4 {
            return Err(Error::Config(format!(
                "sync pattern must be 2 to 4 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

/// Reed-Solomon settings.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct RsConfig {
    /// Interleave depth. 1..=5 when `ccsds` is set.
    pub interleave: u8,

    /// Use the CCSDS standard code: 8-bit symbols over x^8+x^7+x^2+x+1,
    /// 16 correctable errors, dual-basis representation. Virtual fill is
    /// derived from the frame length unless overridden.
    #[serde(default)]
    #[builder(default)]
    pub ccsds: bool,

    /// Bits per symbol, 3..=8. Ignored when `ccsds` is set.
    #[serde(default = "RsConfig::default_bits")]
    #[builder(default = 8)]
    pub bits_per_symbol: u8,

    /// Maximum correctable errors per codeword. Parity length is twice
    /// this. Ignored when `ccsds` is set.
    #[serde(default = "RsConfig::default_max_errors")]
    #[builder(default = 16)]
    pub max_correctable_errors: usize,

    /// Dual-basis symbol representation (8-bit fields only). Ignored when
    /// `ccsds` is set.
    #[serde(default)]
    #[builder(default)]
    pub dual_basis: bool,

    /// Virtual fill byte count for shortened codewords, across the whole
    /// codeblock. Must be a multiple of the interleave.
    #[serde(default)]
    #[builder(default)]
    pub virtual_fill: Option<usize>,

    /// Attempt correction when a syndrome is nonzero. When `false`, any
    /// nonzero syndrome marks the codeword uncorrectable.
    #[serde(default = "default_true")]
    #[builder(default = true)]
    pub block_correction: bool,

    /// Mark uncorrectable frames deleted.
    #[serde(default)]
    #[builder(default)]
    pub discard_uncorrectables: bool,
}

impl RsConfig {
    fn default_bits() -> u8 {
        8
    }

    fn default_max_errors() -> usize {
        16
    }

    /// Trailing parity bytes per frame implied by this configuration.
    #[must_use]
    pub fn parity_span(&self) -> usize {
        let max_errors = if self.ccsds {
            16
        } else {
            self.max_correctable_errors
        };
        2 * max_errors * usize::from(self.interleave)
    }
}

/// CRC decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct CrcConfig {
    /// Include the sync pattern bytes in the checksum span.
    #[serde(default)]
    #[builder(default)]
    pub include_sync: bool,

    /// Mark frames with a checksum mismatch deleted.
    #[serde(default)]
    #[builder(default)]
    pub discard_bad_frames: bool,

    /// Offset of the first byte following the checksum, i.e. the start of
    /// any trailing parity. Derived from the frame length minus the
    /// Reed-Solomon parity span when not set.
    #[serde(default)]
    #[builder(default)]
    pub parity_offset: Option<usize>,

    /// Checksum start seed.
    #[serde(default = "default_seed")]
    #[builder(default = 0xffff)]
    pub seed: u16,
}

/// Full per-link configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct LinkConfig {
    pub sync: SyncConfig,

    /// Bit-transition-density (PN) derandomization. Consumed by the graph
    /// construction collaborator, which wires a
    /// [`DerandomizerNode`](crate::pipeline::DerandomizerNode) between the
    /// synchronizer and the integrity stages when set.
    #[serde(default)]
    #[builder(default)]
    pub pn_decode: bool,

    #[serde(default)]
    #[builder(default)]
    pub reed_solomon: Option<RsConfig>,

    #[serde(default)]
    #[builder(default)]
    pub crc: Option<CrcConfig>,
}

impl LinkConfig {
    /// Read a link configuration from JSON.
    ///
    /// # Errors
    /// [`Error::ConfigParse`] on malformed input.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }
}
