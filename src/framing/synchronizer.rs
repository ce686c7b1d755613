use chrono::Utc;
use tracing::{debug, warn};

use super::{BitCursor, Flywheel, Frame, FrameAssembler, PatternMatch, PatternMatcher, SyncPattern};
use crate::{config::SyncConfig, Error, Result};

/// Synchronizer state between and within buffer calls.
///
/// `Lock` and `LostSync` are transient: they are only ever observed inside
/// one buffer's processing loop. The split states carry a boundary-
/// straddling fragment in the crossover buffer to the next call.
#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    FirstSearch,
    Search,
    Lock,
    LockSplitFrame,
    SplitSync { after_flywheel: bool },
    FlywheelSplitSync,
    Flywheel,
    LostSync,
}

/// Disposition of the sync check at a frame boundary.
enum Boundary {
    Locked,
    Split,
    Lost,
}

/// Named synchronizer counters.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    pub lock_frames: u64,
    pub flywheel_frames: u64,
    pub slipped_frames: u64,
    pub true_frames: u64,
    pub inverted_frames: u64,
    pub search_buffers: u64,
    pub drops_to_search: u64,
}

impl SyncStats {
    #[must_use]
    pub fn counters(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("lock_frames", self.lock_frames),
            ("flywheel_frames", self.flywheel_frames),
            ("slipped_frames", self.slipped_frames),
            ("true_frames", self.true_frames),
            ("inverted_frames", self.inverted_frames),
            ("search_buffers", self.search_buffers),
            ("drops_to_search", self.drops_to_search),
        ]
    }
}

/// Locates fixed-length frames in a pushed stream of arbitrary buffers.
///
/// The synchronizer owns its cursor, matchers, assembler, and flywheel.
/// Each [`process`](Self::process) call consumes one raw buffer and
/// returns the ordered frames completed by it; a frame or sync pattern may
/// straddle any number of calls. Frames include their sync pattern bytes.
pub struct FrameSynchronizer {
    pattern_len: usize,
    frame_length: usize,
    slip_tolerance: u8,
    correct_inversion: bool,
    true_matcher: Option<PatternMatcher>,
    inv_matcher: Option<PatternMatcher>,
    state: State,
    /// Crossover bytes carried between calls: a trailing search window, a
    /// split sync fragment, or a partially consumed byte at a nonzero bit
    /// offset.
    carry: Vec<u8>,
    /// Byte offset into the carry where the next call resumes. Nonzero
    /// when the carry keeps the byte preceding a frame boundary so that
    /// negative slip candidates stay reachable.
    resume: usize,
    bit: u8,
    inverted: bool,
    pending_slip: bool,
    assembler: FrameAssembler,
    flywheel: Flywheel,
    stats: SyncStats,
}

impl FrameSynchronizer {
    /// Build a synchronizer from its configuration.
    ///
    /// # Errors
    /// [`Error::Config`] on an invalid pattern, a frame length that does
    /// not exceed the pattern, slip tolerance above 2, or no polarity
    /// enabled.
    pub fn new(cfg: &SyncConfig) -> Result<Self> {
        let pattern = SyncPattern::new(&cfg.pattern_bytes()?)?;
        if cfg.frame_length <= pattern.len() {
            return Err(Error::Config(format!(
                "frame length {} must exceed the {}-byte sync pattern",
                cfg.frame_length,
                pattern.len()
            )));
        }
        if cfg.slip_tolerance > 2 {
            return Err(Error::Config(format!(
                "slip tolerance must be 0, 1, or 2, got {}",
                cfg.slip_tolerance
            )));
        }
        if !cfg.true_sync && !cfg.inverted_sync {
            return Err(Error::Config(
                "at least one of true or inverted sync must be enabled".into(),
            ));
        }

        let inv_matcher = cfg
            .inverted_sync
            .then(|| PatternMatcher::new(pattern.inverted()));
        let true_matcher = cfg.true_sync.then(|| PatternMatcher::new(pattern.clone()));

        Ok(FrameSynchronizer {
            pattern_len: pattern.len(),
            frame_length: cfg.frame_length,
            slip_tolerance: cfg.slip_tolerance,
            correct_inversion: cfg.correct_inversion,
            true_matcher,
            inv_matcher,
            state: State::FirstSearch,
            carry: Vec::new(),
            resume: 0,
            bit: 0,
            inverted: false,
            pending_slip: false,
            assembler: FrameAssembler::new(cfg.frame_length),
            flywheel: Flywheel::new(cfg.flywheel_duration, cfg.send_flywheels),
            stats: SyncStats::default(),
        })
    }

    /// Textual current-mode indicator.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self.state {
            State::FirstSearch | State::Search | State::LostSync => "search",
            State::Lock
            | State::LockSplitFrame
            | State::SplitSync {
                after_flywheel: false,
            } => "lock",
            State::Flywheel
            | State::FlywheelSplitSync
            | State::SplitSync {
                after_flywheel: true,
            } => "flywheel",
        }
    }

    #[must_use]
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn pattern_length(&self) -> usize {
        self.pattern_len
    }

    /// Drop any partial frame and crossover state and return to the
    /// initial search.
    pub fn flush(&mut self) {
        self.assembler.reset();
        self.carry.clear();
        self.resume = 0;
        self.state = State::FirstSearch;
        self.bit = 0;
        self.inverted = false;
        self.pending_slip = false;
    }

    /// Consume one raw buffer and return the frames it completed, in
    /// stream order.
    pub fn process(&mut self, buf: &[u8]) -> Vec<Frame> {
        let carry = std::mem::take(&mut self.carry);
        let mut cur = BitCursor::new(&carry, buf);
        cur.relocate(std::mem::take(&mut self.resume), self.bit);
        let mut out = Vec::new();
        let mut counted_search = false;

        loop {
            match self.state {
                State::FirstSearch | State::Search => {
                    if !counted_search {
                        self.stats.search_buffers += 1;
                        counted_search = true;
                    }
                    let from = cur.position();
                    if cur.len().saturating_sub(from) < 2 * self.pattern_len {
                        self.carry = cur.copy_from(from);
                        self.state = State::Search;
                        break;
                    }
                    match self.earliest_match(&cur, from) {
                        Some((m, inverted)) => {
                            debug!(byte = m.start, bit = m.bit, inverted, "sync acquired");
                            self.bit = m.bit;
                            self.inverted = inverted;
                            cur.relocate(m.start, m.bit);
                            self.state = State::Lock;
                        }
                        None => {
                            self.carry = cur.copy_tail(self.pattern_len);
                            self.state = State::Search;
                            break;
                        }
                    }
                }

                State::Lock | State::LockSplitFrame => {
                    let invert = self.inverted && self.correct_inversion;
                    match self.assembler.fill(&mut cur, invert) {
                        None => {
                            self.state = State::LockSplitFrame;
                            self.carry = cur.copy_from(cur.position());
                            break;
                        }
                        Some(mut frame) => {
                            frame.annotation.lock = true;
                            frame.annotation.inverted = self.inverted;
                            frame.annotation.slipped = std::mem::take(&mut self.pending_slip);
                            frame.annotation.timestamp = Some(Utc::now());
                            self.stats.lock_frames += 1;
                            if self.inverted {
                                self.stats.inverted_frames += 1;
                            } else {
                                self.stats.true_frames += 1;
                            }
                            if frame.annotation.slipped {
                                self.stats.slipped_frames += 1;
                            }
                            out.push(frame);

                            match self.check_boundary(&mut cur) {
                                Boundary::Locked => self.state = State::Lock,
                                Boundary::Split => {
                                    self.carry_split(&cur);
                                    self.state = State::SplitSync {
                                        after_flywheel: false,
                                    };
                                    break;
                                }
                                Boundary::Lost => self.state = State::LostSync,
                            }
                        }
                    }
                }

                State::LostSync => {
                    if self.flywheel.configured() {
                        warn!("lost sync, flywheeling");
                        self.flywheel.start();
                        self.state = State::Flywheel;
                    } else {
                        warn!("lost sync, dropping to search");
                        self.stats.drops_to_search += 1;
                        self.state = State::Search;
                    }
                }

                State::Flywheel => match self.assembler.fill(&mut cur, false) {
                    None => {
                        self.carry = cur.copy_from(cur.position());
                        break;
                    }
                    Some(mut frame) => {
                        self.stats.flywheel_frames += 1;
                        self.flywheel.spin();
                        if self.flywheel.send_frames() {
                            frame.annotation.lock = false;
                            frame.annotation.inverted = false;
                            frame.annotation.timestamp = Some(Utc::now());
                            out.push(frame);
                        }
                        if !cur.window_available(self.pattern_len) {
                            self.carry_split(&cur);
                            self.state = if self.flywheel.exhausted() {
                                State::SplitSync {
                                    after_flywheel: true,
                                }
                            } else {
                                State::FlywheelSplitSync
                            };
                            break;
                        }
                        if self.exact_at(&cur) {
                            debug!("sync reacquired from flywheel");
                            self.state = State::Lock;
                        } else if self.flywheel.exhausted() {
                            self.stats.drops_to_search += 1;
                            self.state = State::Search;
                        }
                    }
                },

                State::SplitSync { after_flywheel } => match self.check_boundary(&mut cur) {
                    Boundary::Locked => self.state = State::Lock,
                    Boundary::Split => {
                        self.carry_split(&cur);
                        break;
                    }
                    Boundary::Lost => {
                        if after_flywheel {
                            // A failed re-verify right after flywheel
                            // exhaustion drops straight to search.
                            self.stats.drops_to_search += 1;
                            self.state = State::Search;
                        } else {
                            self.state = State::LostSync;
                        }
                    }
                },

                State::FlywheelSplitSync => {
                    if !cur.window_available(self.pattern_len) {
                        self.carry_split(&cur);
                        break;
                    }
                    if self.exact_at(&cur) {
                        debug!("sync reacquired from flywheel");
                        self.state = State::Lock;
                    } else {
                        self.state = State::Flywheel;
                    }
                }
            }
        }

        out
    }

    fn matcher(&self, inverted: bool) -> Option<&PatternMatcher> {
        if inverted {
            self.inv_matcher.as_ref()
        } else {
            self.true_matcher.as_ref()
        }
    }

    /// Earliest match of either polarity; true sync wins an exact tie.
    fn earliest_match(&self, cur: &BitCursor, from: usize) -> Option<(PatternMatch, bool)> {
        let t = self
            .true_matcher
            .as_ref()
            .and_then(|m| m.search(cur, from))
            .map(|m| (m, false));
        let i = self
            .inv_matcher
            .as_ref()
            .and_then(|m| m.search(cur, from))
            .map(|m| (m, true));
        match (t, i) {
            (Some(a), Some(b)) => Some(if b.0.bit_position() < a.0.bit_position() {
                b
            } else {
                a
            }),
            (a, b) => a.or(b),
        }
    }

    /// Exact pattern test at the cursor position, current polarity first,
    /// then the other enabled polarity. Flips the tracked polarity when
    /// the other one matches.
    fn exact_at(&mut self, cur: &BitCursor) -> bool {
        let byte = cur.position();
        let bit = self.bit;
        let inverted = self.inverted;
        if let Some(m) = self.matcher(inverted) {
            if m.matches_at(cur, byte, bit) {
                return true;
            }
        }
        let flipped = self
            .matcher(!inverted)
            .map_or(false, |m| m.matches_at(cur, byte, bit));
        if flipped {
            self.inverted = !inverted;
        }
        flipped
    }

    /// Carry the stream tail from one byte before the cursor so that a
    /// boundary re-verify in the next call can still reach negative slip
    /// candidates.
    fn carry_split(&mut self, cur: &BitCursor) {
        let from = cur.position().saturating_sub(1);
        self.resume = cur.position() - from;
        self.carry = cur.copy_from(from);
    }

    /// Re-verify sync immediately after a completed frame: exact match,
    /// then bit-slip candidates within tolerance, nearest first.
    fn check_boundary(&mut self, cur: &mut BitCursor) -> Boundary {
        // the window must also cover the farthest positive slip candidate
        let furthest =
            cur.position() * 8 + usize::from(self.bit) + usize::from(self.slip_tolerance);
        if (furthest + self.pattern_len * 8 + 7) / 8 > cur.len() {
            return Boundary::Split;
        }
        if self.exact_at(cur) {
            return Boundary::Locked;
        }
        if self.slip_tolerance > 0 {
            let base = (cur.position() * 8 + usize::from(self.bit)) as i64;
            for delta in [-1i64, 1, -2, 2] {
                if delta.unsigned_abs() > u64::from(self.slip_tolerance) {
                    break;
                }
                let pos = base + delta;
                if pos < 0 {
                    continue;
                }
                let (byte, bit) = ((pos / 8) as usize, (pos % 8) as u8);
                let matched = self
                    .matcher(self.inverted)
                    .map_or(false, |m| m.matches_at(cur, byte, bit));
                if matched {
                    debug!(delta, "bit slip corrected");
                    cur.relocate(byte, bit);
                    self.bit = bit;
                    self.pending_slip = true;
                    return Boundary::Locked;
                }
            }
        }
        Boundary::Lost
    }
}
