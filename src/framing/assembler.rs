use super::{Annotation, BitCursor, Frame};

/// Fills fixed-length frame buffers from bit-shifted cursor data.
///
/// A frame may span any number of input buffers; the assembler holds the
/// partially filled buffer between calls. Every output byte is built from
/// the high bits of one source byte joined with the low bits of the next
/// when the cursor sits at a nonzero bit offset, with polarity inversion
/// applied before storing when requested.
pub(crate) struct FrameAssembler {
    frame_length: usize,
    buf: Vec<u8>,
    filled: usize,
}

impl FrameAssembler {
    pub fn new(frame_length: usize) -> Self {
        FrameAssembler {
            frame_length,
            buf: vec![0; frame_length],
            filled: 0,
        }
    }

    /// A frame is partially assembled and waiting on more bytes.
    pub fn is_partial(&self) -> bool {
        self.filled > 0
    }

    /// Discard any partial frame.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    /// Pull bytes from the cursor until the frame is full or the cursor
    /// runs dry. Returns the completed frame, or `None` when the frame
    /// still spans into the next buffer.
    pub fn fill(&mut self, cur: &mut BitCursor, invert: bool) -> Option<Frame> {
        while self.filled < self.frame_length && cur.can_take_byte() {
            let b = cur.take_byte();
            self.buf[self.filled] = if invert { !b } else { b };
            self.filled += 1;
        }
        if self.filled < self.frame_length {
            return None;
        }
        self.filled = 0;
        let data = std::mem::replace(&mut self.buf, vec![0; self.frame_length]);
        Some(Frame {
            data,
            annotation: Annotation::default(),
            deleted: false,
        })
    }
}
