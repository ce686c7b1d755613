//! Frame integrity checks: Reed-Solomon forward error correction and CRC
//! validation.

mod crc;
mod gf;
mod reed_solomon;

pub use crc::CrcDecoder;
pub use reed_solomon::ReedSolomon;

/// Outcome of an integrity check, ordered worst-last. A frame covering
/// multiple codewords takes the worst outcome of any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Integrity {
    /// Zero syndrome, nothing to do.
    Ok,
    /// Errors found and fixed; the count is corrected symbols.
    Corrected(usize),
    Uncorrectable,
}

impl Integrity {
    /// Combine outcomes across codewords: uncorrectable dominates,
    /// corrected counts accumulate.
    #[must_use]
    pub fn worst(self, other: Integrity) -> Integrity {
        match (self, other) {
            (Integrity::Uncorrectable, _) | (_, Integrity::Uncorrectable) => {
                Integrity::Uncorrectable
            }
            (Integrity::Corrected(a), Integrity::Corrected(b)) => Integrity::Corrected(a + b),
            (Integrity::Corrected(a), Integrity::Ok) | (Integrity::Ok, Integrity::Corrected(a)) => {
                Integrity::Corrected(a)
            }
            (Integrity::Ok, Integrity::Ok) => Integrity::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_worst_last() {
        assert!(Integrity::Ok < Integrity::Corrected(1));
        assert!(Integrity::Corrected(30) < Integrity::Uncorrectable);
    }

    #[test]
    fn worst_accumulates_corrections() {
        let w = Integrity::Corrected(2).worst(Integrity::Corrected(3));
        assert_eq!(w, Integrity::Corrected(5));
        assert_eq!(w.worst(Integrity::Ok), Integrity::Corrected(5));
        assert_eq!(w.worst(Integrity::Uncorrectable), Integrity::Uncorrectable);
    }
}
