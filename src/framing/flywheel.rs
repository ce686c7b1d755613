/// Bridges a loss-of-sync gap by assuming nominal frame timing continues
/// for a configured number of frame-equivalents.
pub(crate) struct Flywheel {
    duration: u32,
    remaining: u32,
    send: bool,
}

impl Flywheel {
    pub fn new(duration: u32, send: bool) -> Self {
        Flywheel {
            duration,
            remaining: 0,
            send,
        }
    }

    /// Flywheeling is configured at all.
    pub fn configured(&self) -> bool {
        self.duration > 0
    }

    /// Placeholder frames are emitted rather than discarded.
    pub fn send_frames(&self) -> bool {
        self.send
    }

    /// Arm the flywheel after a lost lock.
    pub fn start(&mut self) {
        self.remaining = self.duration;
    }

    /// Account one consumed frame-equivalent.
    pub fn spin(&mut self) {
        debug_assert!(self.remaining > 0);
        self.remaining -= 1;
    }

    pub fn exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spins_down_to_exhaustion() {
        let mut fw = Flywheel::new(3, true);
        assert!(fw.configured());
        fw.start();
        for _ in 0..3 {
            assert!(!fw.exhausted());
            fw.spin();
        }
        assert!(fw.exhausted());
    }

    #[test]
    fn zero_duration_is_unconfigured() {
        let fw = Flywheel::new(0, false);
        assert!(!fw.configured());
        assert!(fw.exhausted());
    }
}
