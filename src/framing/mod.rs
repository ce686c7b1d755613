//! Frame synchronization: locating fixed-length frames in an unaligned
//! bitstream.

mod assembler;
mod bits;
mod flywheel;
mod pattern;
mod pn;
mod synchronizer;

pub use pattern::{PatternMatch, PatternMatcher, SyncPattern, ASM};
pub use pn::Derandomizer;
pub use synchronizer::{FrameSynchronizer, SyncStats};

pub(crate) use assembler::FrameAssembler;
pub(crate) use bits::BitCursor;
pub(crate) use flywheel::Flywheel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality record attached 1:1 to every frame.
///
/// Each stage mutates only its own fields; the synchronizer stamps the
/// lock/polarity/slip flags and the timestamp, the integrity stages set
/// their own error bits, and downstream packet extraction owns the
/// sequence/decomposition bits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Assembled under pattern lock; `false` for flywheel placeholders.
    pub lock: bool,
    /// Locked onto the bit-inverted pattern.
    pub inverted: bool,
    /// A bit slip was corrected at this frame's boundary.
    pub slipped: bool,
    pub crc_error: bool,
    pub rs_corrected: bool,
    pub rs_uncorrectable: bool,
    pub sequence_error: bool,
    pub packet_error: bool,
    /// Idle/fill unit, set by downstream decomposition.
    pub idle: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Annotation {
    /// Combine two annotations keeping the worst of both: quality flags
    /// accumulate, lock survives only if both sides held it, and the
    /// earlier timestamp wins.
    pub fn merge(&mut self, other: &Annotation) {
        self.lock &= other.lock;
        self.inverted |= other.inverted;
        self.slipped |= other.slipped;
        self.crc_error |= other.crc_error;
        self.rs_corrected |= other.rs_corrected;
        self.rs_uncorrectable |= other.rs_uncorrectable;
        self.sequence_error |= other.sequence_error;
        self.packet_error |= other.packet_error;
        self.idle |= other.idle;
        self.timestamp = match (self.timestamp, other.timestamp) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// One fixed-length frame cut from the stream, including its sync pattern
/// bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Vec<u8>,
    pub annotation: Annotation,
    /// Marked by a policy decision (bad CRC, uncorrectable codeblock).
    /// Deleted frames are not forwarded by the pipeline nodes.
    pub deleted: bool,
}

impl Frame {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Frame {
            data,
            annotation: Annotation::default(),
            deleted: false,
        }
    }

    /// Clear the annotation and deleted flag for reuse of the storage.
    pub fn reset(&mut self) {
        self.annotation = Annotation::default();
        self.deleted = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_worst_of_both() {
        let mut a = Annotation {
            lock: true,
            crc_error: true,
            ..Annotation::default()
        };
        let b = Annotation {
            lock: false,
            rs_uncorrectable: true,
            ..Annotation::default()
        };
        a.merge(&b);
        assert!(!a.lock);
        assert!(a.crc_error);
        assert!(a.rs_uncorrectable);
    }

    #[test]
    fn merge_prefers_earlier_timestamp() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let mut a = Annotation {
            timestamp: Some(t1),
            ..Annotation::default()
        };
        let b = Annotation {
            timestamp: Some(t0),
            ..Annotation::default()
        };
        a.merge(&b);
        assert_eq!(a.timestamp, Some(t0));
    }

    #[test]
    fn reset_clears_annotation_and_deleted() {
        let mut f = Frame::new(vec![1, 2, 3]);
        f.annotation.crc_error = true;
        f.deleted = true;
        f.reset();
        assert_eq!(f.annotation, Annotation::default());
        assert!(!f.deleted);
        assert_eq!(f.data, [1, 2, 3]);
    }
}
