use tracing::debug;

use super::BitCursor;
use crate::{Error, Result};

/// Default CCSDS attached sync marker.
pub const ASM: [u8; 4] = [0x1a, 0xcf, 0xfc, 0x1d];

/// Immutable 1-4 byte sync pattern value.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPattern {
    bytes: Vec<u8>,
}

impl SyncPattern {
    /// # Errors
    /// [`Error::Config`] unless the pattern is 2 to 4 bytes.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 || bytes.len() > 4 {
            return Err(Error::Config(format!(
                "sync pattern must be 2 to 4 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(SyncPattern {
            bytes: bytes.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The bit-complement of this pattern, as seen on an inverted link.
    #[must_use]
    pub fn inverted(&self) -> SyncPattern {
        SyncPattern {
            bytes: self.bytes.iter().map(|b| !b).collect(),
        }
    }
}

/// A located pattern occurrence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternMatch {
    /// Byte offset of the byte holding the pattern's first bit.
    pub start: usize,
    /// Bit offset 0..=7 of the pattern's first bit within that byte.
    pub bit: u8,
}

impl PatternMatch {
    /// Absolute bit position, for earliest-match comparisons.
    pub fn bit_position(&self) -> usize {
        self.start * 8 + usize::from(self.bit)
    }
}

/// One of the eight bit-shifted forms of a pattern: expected bytes plus a
/// mask selecting the significant bits at the window edges.
#[derive(Debug, Clone)]
struct ShiftForm {
    bytes: Vec<u8>,
    mask: Vec<u8>,
}

fn shifted_form(pattern: &[u8], bit: u8) -> ShiftForm {
    let nbits = pattern.len() * 8;
    let mut val: u64 = 0;
    for &b in pattern {
        val = (val << 8) | u64::from(b);
    }
    let mval: u64 = if nbits == 64 { u64::MAX } else { (1 << nbits) - 1 };

    let total = usize::from(bit) + nbits;
    let nbytes = (total + 7) / 8;
    let pad = nbytes * 8 - total;
    let v = (val << pad).to_be_bytes();
    let m = (mval << pad).to_be_bytes();

    ShiftForm {
        bytes: v[8 - nbytes..].to_vec(),
        mask: m[8 - nbytes..].to_vec(),
    }
}

/// Lookup keyed on the second byte of each shifted form, which is always
/// fully determined for patterns of 2 or more bytes.
enum KeyTable {
    /// Each key byte implies at most one bit shift.
    Direct(Box<[Option<u8>; 256]>),
    /// Shifted forms alias on the key byte; every candidate shift must be
    /// tested in turn.
    Candidates(Vec<Vec<u8>>),
}

/// Locates one polarity of a sync pattern at any bit offset.
///
/// Construction precomputes the eight shifted forms and a 256-entry table
/// keyed on each form's second byte. A pattern whose shifted forms collide
/// on the key byte silently falls back to a per-key candidate list; that
/// condition is not an error.
pub struct PatternMatcher {
    pattern: SyncPattern,
    forms: Vec<ShiftForm>,
    key: KeyTable,
}

impl PatternMatcher {
    pub fn new(pattern: SyncPattern) -> Self {
        let forms: Vec<ShiftForm> = (0..8).map(|b| shifted_form(pattern.as_bytes(), b)).collect();

        let mut direct: Box<[Option<u8>; 256]> = Box::new([None; 256]);
        let mut ambiguous = false;
        for (b, form) in forms.iter().enumerate() {
            debug_assert_eq!(form.mask[1], 0xff);
            let key = usize::from(form.bytes[1]);
            if direct[key].is_some() {
                ambiguous = true;
                break;
            }
            direct[key] = Some(b as u8);
        }

        let key = if ambiguous {
            debug!(pattern = ?pattern.as_bytes(), "ambiguous sync pattern, using candidate-list matcher");
            let mut table: Vec<Vec<u8>> = vec![Vec::new(); 256];
            for (b, form) in forms.iter().enumerate() {
                table[usize::from(form.bytes[1])].push(b as u8);
            }
            KeyTable::Candidates(table)
        } else {
            KeyTable::Direct(direct)
        };

        PatternMatcher {
            pattern,
            forms,
            key,
        }
    }

    pub fn pattern(&self) -> &SyncPattern {
        &self.pattern
    }

    /// `true` when construction fell back to the candidate-list table.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.key, KeyTable::Candidates(_))
    }

    fn verify(&self, cur: &BitCursor, start: usize, bit: u8) -> bool {
        let form = &self.forms[usize::from(bit)];
        if start + form.bytes.len() > cur.len() {
            return false;
        }
        form.bytes
            .iter()
            .zip(form.mask.iter())
            .enumerate()
            .all(|(j, (&expect, &mask))| cur.get(start + j) & mask == expect)
    }

    /// Exact-match test for the pattern at an absolute (byte, bit)
    /// position. The caller checks window availability first; a window
    /// running past the stream end is simply no match.
    pub fn matches_at(&self, cur: &BitCursor, byte: usize, bit: u8) -> bool {
        self.verify(cur, byte, bit)
    }

    /// Earliest full occurrence at or after byte offset `from`, at any bit
    /// shift. Occurrences whose window runs off the end of the stream are
    /// not reported; the synchronizer carries trailing bytes to the next
    /// call instead.
    pub fn search(&self, cur: &BitCursor, from: usize) -> Option<PatternMatch> {
        for i in from + 1..cur.len() {
            let key = usize::from(cur.get(i));
            let start = i - 1;
            match &self.key {
                KeyTable::Direct(table) => {
                    if let Some(bit) = table[key] {
                        if self.verify(cur, start, bit) {
                            return Some(PatternMatch { start, bit });
                        }
                    }
                }
                KeyTable::Candidates(table) => {
                    for &bit in &table[key] {
                        if self.verify(cur, start, bit) {
                            return Some(PatternMatch { start, bit });
                        }
                    }
                }
            }
        }
        None
    }
}
