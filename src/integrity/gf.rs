//! Galois field arithmetic over GF(2^m) for m in 3..=8, plus the dual-basis
//! symbol representation used by the CCSDS Reed-Solomon variant.

use crate::{Error, Result};

/// Field polynomial for x^8 + x^7 + x^2 + x + 1, the CCSDS choice.
pub const CCSDS_POLY: u16 = 0x187;

fn field_poly(bits: u8) -> Option<u16> {
    Some(match bits {
        3 => 0x0b,
        4 => 0x13,
        5 => 0x25,
        6 => 0x43,
        7 => 0x89,
        8 => CCSDS_POLY,
        _ => return None,
    })
}

/// Log/antilog tables for one field, built once at setup and read-only
/// afterwards.
///
/// Polynomials are coefficient vectors with index 0 holding the
/// highest-degree term.
pub(crate) struct GaloisField {
    n: usize,
    log: Vec<u8>,
    alog: Vec<u8>,
}

impl GaloisField {
    /// # Errors
    /// [`Error::Config`] for a symbol width outside 3..=8.
    pub fn new(bits: u8) -> Result<Self> {
        let poly = field_poly(bits).ok_or_else(|| {
            Error::Config(format!("unsupported symbol width {bits}, expected 3 to 8 bits"))
        })?;
        let size = 1usize << bits;
        let n = size - 1;
        let mut log = vec![0u8; size];
        let mut alog = vec![0u8; n];
        let mut v: u16 = 1;
        for (i, a) in alog.iter_mut().enumerate() {
            *a = v as u8;
            log[v as usize] = i as u8;
            v <<= 1;
            if v & (1 << bits) != 0 {
                v ^= poly;
            }
        }
        Ok(GaloisField { n, log, alog })
    }

    /// Multiplicative order, also the full codeword length.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Mask selecting the valid symbol bits.
    pub fn mask(&self) -> u8 {
        self.n as u8
    }

    /// alpha^e, for any signed exponent.
    pub fn exp(&self, e: i32) -> u8 {
        self.alog[(e.rem_euclid(self.n as i32)) as usize]
    }

    pub fn mult(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let e = usize::from(self.log[usize::from(a)]) + usize::from(self.log[usize::from(b)]);
        self.alog[e % self.n]
    }

    pub fn div(&self, a: u8, b: u8) -> u8 {
        debug_assert!(b != 0);
        if a == 0 {
            return 0;
        }
        let e = i32::from(self.log[usize::from(a)]) - i32::from(self.log[usize::from(b)]);
        self.exp(e)
    }

    pub fn inv(&self, a: u8) -> u8 {
        debug_assert!(a != 0);
        self.exp(-i32::from(self.log[usize::from(a)]))
    }

    /// x^e for nonzero x and any signed exponent.
    pub fn pow(&self, x: u8, e: i32) -> u8 {
        debug_assert!(x != 0);
        let l = i64::from(self.log[usize::from(x)]) * i64::from(e);
        self.alog[l.rem_euclid(self.n as i64) as usize]
    }

    /// Horner evaluation of a polynomial at x.
    pub fn poly_eval(&self, poly: &[u8], x: u8) -> u8 {
        let mut y = 0u8;
        for &c in poly {
            y = self.mult(y, x) ^ c;
        }
        y
    }

    pub fn poly_scale(&self, poly: &[u8], x: u8) -> Vec<u8> {
        poly.iter().map(|&c| self.mult(c, x)).collect()
    }

    /// Sum of two polynomials, aligned at the constant term.
    pub fn poly_add(&self, p: &[u8], q: &[u8]) -> Vec<u8> {
        let len = p.len().max(q.len());
        let mut out = vec![0u8; len];
        out[len - p.len()..].copy_from_slice(p);
        for (i, &c) in q.iter().enumerate() {
            out[len - q.len() + i] ^= c;
        }
        out
    }

    pub fn poly_mult(&self, p: &[u8], q: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; p.len() + q.len() - 1];
        for (i, &a) in p.iter().enumerate() {
            for (j, &b) in q.iter().enumerate() {
                out[i + j] ^= self.mult(a, b);
            }
        }
        out
    }

    /// Synthetic division by a monic divisor; returns (quotient,
    /// remainder).
    pub fn poly_div(&self, dividend: &[u8], divisor: &[u8]) -> (Vec<u8>, Vec<u8>) {
        debug_assert_eq!(divisor[0], 1, "divisor must be monic");
        let mut out = dividend.to_vec();
        let sep = dividend.len() - (divisor.len() - 1);
        for i in 0..sep {
            let coef = out[i];
            if coef == 0 {
                continue;
            }
            for (j, &d) in divisor.iter().enumerate().skip(1) {
                if d != 0 {
                    out[i + j] ^= self.mult(d, coef);
                }
            }
        }
        let rem = out.split_off(sep);
        (out, rem)
    }
}

/// Dual-basis transform for the 8-bit CCSDS field, per the Berlekamp
/// representation. Both directions are GF(2)-linear byte substitutions.
pub(crate) struct DualBasis {
    to_dual: [u8; 256],
    to_conv: [u8; 256],
}

impl DualBasis {
    /// Images of the conventional basis elements in the dual basis.
    const TAL: [u8; 8] = [0x8d, 0xef, 0xec, 0x86, 0xfa, 0x99, 0xaf, 0x7b];

    pub fn new() -> Self {
        let mut to_dual = [0u8; 256];
        let mut to_conv = [0u8; 256];
        for (i, d) in to_dual.iter_mut().enumerate() {
            let mut k = 0u8;
            for (j, &t) in Self::TAL.iter().enumerate() {
                if i & (0x80 >> j) != 0 {
                    k ^= t;
                }
            }
            *d = k;
            to_conv[usize::from(k)] = i as u8;
        }
        DualBasis { to_dual, to_conv }
    }

    pub fn to_dual(&self, b: u8) -> u8 {
        self.to_dual[usize::from(b)]
    }

    pub fn to_conventional(&self, b: u8) -> u8 {
        self.to_conv[usize::from(b)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccsds_field_basics() {
        let gf = GaloisField::new(8).unwrap();
        assert_eq!(gf.n(), 255);
        assert_eq!(gf.exp(0), 1);
        assert_eq!(gf.exp(1), 2);
        // the CCSDS evaluation element is alpha^11
        assert_eq!(gf.exp(11), 173);
        assert_eq!(gf.pow(2, 11), 173);
    }

    #[test]
    fn inverse_and_division() {
        let gf = GaloisField::new(8).unwrap();
        for a in 1..=255u8 {
            assert_eq!(gf.mult(a, gf.inv(a)), 1);
            assert_eq!(gf.div(gf.mult(a, 7), 7), a);
        }
    }

    #[test]
    fn small_field() {
        let gf = GaloisField::new(4).unwrap();
        assert_eq!(gf.n(), 15);
        assert_eq!(gf.mask(), 0x0f);
        for a in 1..=15u8 {
            assert!(gf.mult(a, gf.inv(a)) == 1);
        }
    }

    #[test]
    fn unsupported_width_rejected() {
        assert!(GaloisField::new(2).is_err());
        assert!(GaloisField::new(9).is_err());
    }

    #[test]
    fn poly_division_roundtrip() {
        let gf = GaloisField::new(8).unwrap();
        let a = [1u8, 5, 9, 200, 3];
        let b = [1u8, 77, 13];
        let (q, r) = gf.poly_div(&a, &b);
        // a == q*b + r
        let qb = gf.poly_mult(&q, &b);
        let back = gf.poly_add(&qb, &r);
        assert_eq!(back, a);
    }

    #[test]
    fn dual_basis_is_a_linear_involution_pair() {
        let d = DualBasis::new();
        for b in 0..=255u8 {
            assert_eq!(d.to_conventional(d.to_dual(b)), b);
            assert_eq!(d.to_dual(d.to_conventional(b)), b);
        }
        for (a, b) in [(0x12u8, 0x34u8), (0xff, 0x0f), (0x01, 0x80)] {
            assert_eq!(d.to_dual(a ^ b), d.to_dual(a) ^ d.to_dual(b));
        }
    }
}
