//! Reed-Solomon codeblock detection and correction.
//!
//! Decoding follows the CCSDS Reed-Solomon coding standard documented in
//! CCSDS 131.0-B-4: TM Synchronization and Channel Coding, generalized
//! over symbol width, interleave depth, and shortened (virtual-fill)
//! codewords. A systematic encoder over the same parameters is provided
//! for loopback use.

use super::gf::{DualBasis, GaloisField};
use super::Integrity;
use crate::{config::RsConfig, Error, Result};

/// Per-link Reed-Solomon codec.
///
/// Construction derives the codeword geometry from the configuration and
/// validates it against the frame layout:
///
/// ```text
/// frame_length == sync_length + codeword_length * interleave - virtual_fill
/// ```
///
/// When no virtual-fill override is configured the fill is derived from
/// that same equation. All tables are built once here and read-only
/// afterwards.
pub struct ReedSolomon {
    gf: GaloisField,
    dual: Option<DualBasis>,
    interleave: usize,
    parity_len: usize,
    /// Virtual fill per codeword, in symbols.
    vf: usize,
    gen: u8,
    fcr: i32,
    gen_poly: Vec<u8>,
    block_correction: bool,
    discard_uncorrectables: bool,
    sync_length: usize,
    frame_length: usize,
}

impl ReedSolomon {
    /// # Errors
    /// [`Error::Config`] on out-of-range parameters or a frame length
    /// inconsistent with the codeword geometry.
    pub fn new(cfg: &RsConfig, frame_length: usize, sync_length: usize) -> Result<Self> {
        let interleave = usize::from(cfg.interleave);
        if interleave == 0 {
            return Err(Error::Config("interleave must be at least 1".into()));
        }

        let (gf, max_errors, dual, gen, fcr) = if cfg.ccsds {
            if !(1..=5).contains(&interleave) {
                return Err(Error::Config(format!(
                    "CCSDS interleave must be 1 to 5, got {interleave}"
                )));
            }
            let gf = GaloisField::new(8)?;
            let gen = gf.exp(11);
            (gf, 16usize, true, gen, 112i32)
        } else {
            let gf = GaloisField::new(cfg.bits_per_symbol)?;
            if cfg.max_correctable_errors == 0 {
                return Err(Error::Config("max correctable errors must be at least 1".into()));
            }
            if 2 * cfg.max_correctable_errors >= gf.n() {
                return Err(Error::Config(format!(
                    "parity length {} leaves no data in a {}-symbol codeword",
                    2 * cfg.max_correctable_errors,
                    gf.n()
                )));
            }
            if cfg.dual_basis && cfg.bits_per_symbol != 8 {
                return Err(Error::Config(
                    "dual-basis representation requires 8-bit symbols".into(),
                ));
            }
            let gen = gf.exp(1);
            (gf, cfg.max_correctable_errors, cfg.dual_basis, gen, 1i32)
        };

        let n = gf.n();
        let parity_len = 2 * max_errors;
        let full = sync_length + n * interleave;
        let virtual_fill = match cfg.virtual_fill {
            Some(v) => {
                if full.checked_sub(v) != Some(frame_length) {
                    return Err(Error::Config(format!(
                        "frame length {frame_length} != sync {sync_length} + codeword {n} x \
                         interleave {interleave} - virtual fill {v}"
                    )));
                }
                v
            }
            None => full.checked_sub(frame_length).ok_or_else(|| {
                Error::Config(format!(
                    "frame length {frame_length} exceeds codeblock capacity {full}"
                ))
            })?,
        };
        if virtual_fill % interleave != 0 {
            return Err(Error::Config(format!(
                "virtual fill {virtual_fill} is not a multiple of interleave {interleave}"
            )));
        }
        let vf = virtual_fill / interleave;
        if vf >= n - parity_len {
            return Err(Error::Config(format!(
                "virtual fill {virtual_fill} consumes the whole data span"
            )));
        }

        let mut gen_poly = vec![1u8];
        for k in 0..parity_len {
            let root = gf.pow(gen, fcr + k as i32);
            gen_poly = gf.poly_mult(&gen_poly, &[1, root]);
        }

        Ok(ReedSolomon {
            gf,
            dual: dual.then(DualBasis::new),
            interleave,
            parity_len,
            vf,
            gen,
            fcr,
            gen_poly,
            block_correction: cfg.block_correction,
            discard_uncorrectables: cfg.discard_uncorrectables,
            sync_length,
            frame_length,
        })
    }

    pub fn codeword_length(&self) -> usize {
        self.gf.n()
    }

    pub fn parity_length(&self) -> usize {
        self.parity_len
    }

    pub fn interleave(&self) -> usize {
        self.interleave
    }

    /// Virtual fill in bytes across the whole codeblock.
    pub fn virtual_fill(&self) -> usize {
        self.vf * self.interleave
    }

    /// Trailing parity bytes of the frame across all interleave levels.
    pub fn parity_span(&self) -> usize {
        self.parity_len * self.interleave
    }

    pub fn discard_uncorrectables(&self) -> bool {
        self.discard_uncorrectables
    }

    /// Check and correct one frame in place. The aggregate outcome is the
    /// worst over the interleave levels; corrections are applied for every
    /// correctable level regardless.
    pub fn decode(&self, frame: &mut [u8]) -> Integrity {
        debug_assert_eq!(frame.len(), self.frame_length);
        let mut worst = Integrity::Ok;
        for level in 0..self.interleave {
            let mut cw = self.gather(frame, level);
            let outcome = self.decode_codeword(&mut cw);
            if matches!(outcome, Integrity::Corrected(_)) {
                self.scatter(frame, level, &cw);
            }
            worst = worst.worst(outcome);
        }
        worst
    }

    /// Compute and store the parity symbols for one frame in place.
    pub fn encode(&self, frame: &mut [u8]) {
        debug_assert_eq!(frame.len(), self.frame_length);
        let n = self.gf.n();
        let data_syms = n - self.parity_len;
        for level in 0..self.interleave {
            let mut msg = self.gather(frame, level);
            msg[data_syms..].fill(0);
            let (_, parity) = self.gf.poly_div(&msg, &self.gen_poly);
            for (k, &c) in parity.iter().enumerate() {
                frame[self.frame_index(data_syms + k, level)] = self.to_wire(c);
            }
        }
    }

    /// Frame byte index of codeword symbol `p` (an index into the padded
    /// codeword, 0 = highest degree) at one interleave level.
    fn frame_index(&self, p: usize, level: usize) -> usize {
        self.sync_length + (p - self.vf) * self.interleave + level
    }

    fn to_field(&self, b: u8) -> u8 {
        let b = match &self.dual {
            Some(d) => d.to_conventional(b),
            None => b,
        };
        b & self.gf.mask()
    }

    fn to_wire(&self, s: u8) -> u8 {
        match &self.dual {
            Some(d) => d.to_dual(s),
            None => s,
        }
    }

    /// Extract one codeword, virtual fill as leading zero symbols.
    fn gather(&self, frame: &[u8], level: usize) -> Vec<u8> {
        let n = self.gf.n();
        let mut cw = vec![0u8; n];
        for p in self.vf..n {
            cw[p] = self.to_field(frame[self.frame_index(p, level)]);
        }
        cw
    }

    /// Write the real span of a corrected codeword back into the frame.
    fn scatter(&self, frame: &mut [u8], level: usize, cw: &[u8]) {
        for (p, &s) in cw.iter().enumerate().skip(self.vf) {
            frame[self.frame_index(p, level)] = self.to_wire(s);
        }
    }

    fn decode_codeword(&self, cw: &mut [u8]) -> Integrity {
        let synd = self.syndromes(cw);
        if synd.iter().all(|&s| s == 0) {
            return Integrity::Ok;
        }
        if !self.block_correction {
            return Integrity::Uncorrectable;
        }

        let sigma = self.error_locator(&synd);
        let claimed = sigma.len().saturating_sub(1);
        if claimed == 0 || 2 * claimed > self.parity_len {
            return Integrity::Uncorrectable;
        }

        let mut sigma_rev = sigma.clone();
        sigma_rev.reverse();
        let positions = self.error_positions(&sigma_rev, claimed);
        if positions.len() != claimed {
            return Integrity::Uncorrectable;
        }
        // an error located inside the virtual fill cannot be real
        if positions.iter().any(|&p| p < self.vf) {
            return Integrity::Uncorrectable;
        }

        if !self.apply_corrections(cw, &synd, &positions) {
            return Integrity::Uncorrectable;
        }
        if self.syndromes(cw).iter().any(|&s| s != 0) {
            return Integrity::Uncorrectable;
        }
        Integrity::Corrected(claimed)
    }

    /// One Horner evaluation per syndrome coefficient.
    fn syndromes(&self, cw: &[u8]) -> Vec<u8> {
        (0..self.parity_len)
            .map(|i| self.gf.poly_eval(cw, self.gf.pow(self.gen, self.fcr + i as i32)))
            .collect()
    }

    /// Berlekamp-Massey: minimal-degree locator whose convolution with the
    /// syndrome sequence vanishes.
    fn error_locator(&self, synd: &[u8]) -> Vec<u8> {
        let mut errloc = vec![1u8];
        let mut oldloc = vec![1u8];
        for k in 0..self.parity_len {
            let mut delta = synd[k];
            for j in 1..errloc.len() {
                delta ^= self.gf.mult(errloc[errloc.len() - j - 1], synd[k - j]);
            }
            oldloc.push(0);
            if delta != 0 {
                if oldloc.len() > errloc.len() {
                    let newloc = self.gf.poly_scale(&oldloc, delta);
                    oldloc = self.gf.poly_scale(&errloc, self.gf.inv(delta));
                    errloc = newloc;
                }
                errloc = self.gf.poly_add(&errloc, &self.gf.poly_scale(&oldloc, delta));
            }
        }
        while errloc.first() == Some(&0) {
            errloc.remove(0);
        }
        errloc
    }

    /// Chien search over every field element; returned values are symbol
    /// indexes into the padded codeword.
    fn error_positions(&self, sigma_rev: &[u8], claimed: usize) -> Vec<usize> {
        let n = self.gf.n();
        let mut positions = Vec::with_capacity(claimed);
        for i in 0..n {
            if self.gf.poly_eval(sigma_rev, self.gf.pow(self.gen, i as i32)) == 0 {
                positions.push(n - 1 - i);
            }
        }
        positions
    }

    /// Forney magnitudes XORed in at each located position. `false` on a
    /// zero derivative denominator.
    fn apply_corrections(&self, cw: &mut [u8], synd: &[u8], positions: &[usize]) -> bool {
        let n = self.gf.n();
        let x: Vec<u8> = positions
            .iter()
            .map(|&p| self.gf.pow(self.gen, (n - 1 - p) as i32))
            .collect();

        let omega = self.error_evaluator(synd, &x);

        for (i, &xi) in x.iter().enumerate() {
            let xi_inv = self.gf.inv(xi);
            let mut denom = 1u8;
            for (j, &xj) in x.iter().enumerate() {
                if j != i {
                    denom = self.gf.mult(denom, 1 ^ self.gf.mult(xi_inv, xj));
                }
            }
            if denom == 0 {
                return false;
            }
            let y = self.gf.mult(
                self.gf.pow(xi, 1 - self.fcr),
                self.gf.poly_eval(&omega, xi_inv),
            );
            cw[positions[i]] ^= self.gf.div(y, denom);
        }
        true
    }

    /// Error evaluator Omega = S(z) * Lambda(z) mod z^(v+1), built from
    /// the locator over the located roots.
    fn error_evaluator(&self, synd: &[u8], x: &[u8]) -> Vec<u8> {
        let mut errloc = vec![1u8];
        for &xi in x {
            errloc = self.gf.poly_mult(&errloc, &[xi, 1]);
        }
        let mut rev: Vec<u8> = synd.iter().rev().copied().collect();
        rev.push(0);
        let mut divisor = vec![0u8; errloc.len() + 1];
        divisor[0] = 1;
        let (_, rem) = self.gf.poly_div(&self.gf.poly_mult(&rev, &errloc), &divisor);
        rem
    }
}
