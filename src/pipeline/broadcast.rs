use tracing::error;

use super::FrameReceiver;
use crate::framing::Frame;
use crate::Result;

/// Fan-out to several receivers in attachment order.
///
/// Data delivery is frame-major: each frame reaches every receiver before
/// the next frame is delivered, and a fault aborts the remainder of the
/// delivery and propagates. `flush` is the one place faults are isolated:
/// a failing receiver is logged and the remaining receivers still flush.
pub struct Broadcaster {
    receivers: Vec<Box<dyn FrameReceiver>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Broadcaster {
            receivers: Vec::new(),
        }
    }

    pub fn add(&mut self, rx: Box<dyn FrameReceiver>) {
        self.receivers.push(rx);
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

impl FrameReceiver for Broadcaster {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn accept(&mut self, frame: Frame) -> Result<()> {
        if let Some((last, rest)) = self.receivers.split_last_mut() {
            for rx in rest {
                rx.accept(frame.clone())?;
            }
            last.accept(frame)?;
        }
        Ok(())
    }

    fn accept_many(&mut self, frames: Vec<Frame>) -> Result<()> {
        for frame in frames {
            self.accept(frame)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for rx in &mut self.receivers {
            if let Err(err) = rx.flush() {
                error!(receiver = rx.name(), %err, "flush failed, continuing with remaining receivers");
            }
        }
        Ok(())
    }
}
