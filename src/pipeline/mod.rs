//! Push-based stage fabric.
//!
//! Stages are wired into a fan-out graph and driven synchronously by the
//! thread pushing raw buffers: one call traverses every configured stage
//! before returning. Nodes are instantiated from a [`NodeRegistry`]
//! factory, configured with [`PipelineNode::load`], and wired with
//! [`FrameSource::add_receiver`]; attaching a second receiver to an output
//! transparently substitutes a fan-out [`Broadcaster`].

mod broadcast;
mod nodes;
mod registry;

pub use broadcast::Broadcaster;
pub use nodes::{CrcNode, DerandomizerNode, FrameSyncNode, ReedSolomonNode};
pub use registry::NodeRegistry;

use serde_json::Value;

use crate::framing::Frame;
use crate::{Error, Result};

/// Link-level facts shared with every stage once all nodes and links
/// exist, before the first data call.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkContext {
    /// Frame length in bytes, including the sync pattern.
    pub frame_length: usize,
    /// Sync pattern length in bytes.
    pub sync_length: usize,
    /// Trailing Reed-Solomon parity bytes per frame, when an RS stage is
    /// configured on the link.
    pub rs_parity_span: Option<usize>,
}

/// Minimal capability needed to be fed frames.
pub trait FrameReceiver {
    fn name(&self) -> &str;

    /// Deliver one frame. Faults propagate synchronously to the caller.
    fn accept(&mut self, frame: Frame) -> Result<()>;

    /// Deliver an ordered batch, one [`accept`](Self::accept) per frame.
    fn accept_many(&mut self, frames: Vec<Frame>) -> Result<()> {
        for frame in frames {
            self.accept(frame)?;
        }
        Ok(())
    }

    /// End of stream. Unlike the data path, fan-out flush faults are
    /// isolated per receiver.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A stage that emits frames to downstream receivers.
pub trait FrameSource {
    /// Attach a downstream receiver.
    fn add_receiver(&mut self, receiver: Box<dyn FrameReceiver>) -> Result<()>;
}

/// Lifecycle shared by every stage in the graph.
pub trait PipelineNode {
    /// Stage-type identifier this node was registered under.
    fn kind(&self) -> &'static str;

    fn name(&self) -> &str;

    /// Apply stage configuration. Out-of-range values are fatal here.
    fn load(&mut self, config: Value) -> Result<()>;

    /// Inspect link-level facts once every node and link exists.
    fn finish_setup(&mut self, link: &LinkContext) -> Result<()> {
        let _ = link;
        Ok(())
    }

    /// Named counters for the observability surface.
    fn counters(&self) -> Vec<(&'static str, u64)> {
        Vec::new()
    }

    /// Capability probe for wiring: stages that emit frames expose their
    /// output connection.
    fn as_frame_source(&mut self) -> Option<&mut dyn FrameSource> {
        None
    }

    /// Capability probe used while wiring: a node that can be fed frames
    /// converts itself into a receiver, anything else gives itself back
    /// so the caller can report the mismatch.
    fn into_frame_receiver(
        self: Box<Self>,
    ) -> std::result::Result<Box<dyn FrameReceiver>, Box<dyn PipelineNode>>;
}

/// Wire a configured node in as a frame receiver.
///
/// # Errors
/// [`Error::NotAReceiver`] when the node does not take frame input.
pub fn frame_receiver(node: Box<dyn PipelineNode>) -> Result<Box<dyn FrameReceiver>> {
    node.into_frame_receiver()
        .map_err(|n| Error::NotAReceiver(n.name().to_owned()))
}

/// Downstream connection held by every frame-emitting stage.
pub(crate) enum Output {
    Unresolved,
    Single(Box<dyn FrameReceiver>),
    Fanout(Broadcaster),
}

impl Output {
    pub fn new() -> Self {
        Output::Unresolved
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Output::Unresolved)
    }

    /// First receiver is held directly; the second substitutes a
    /// broadcaster.
    pub fn attach(&mut self, rx: Box<dyn FrameReceiver>) {
        *self = match std::mem::replace(self, Output::Unresolved) {
            Output::Unresolved => Output::Single(rx),
            Output::Single(first) => {
                let mut fanout = Broadcaster::new();
                fanout.add(first);
                fanout.add(rx);
                Output::Fanout(fanout)
            }
            Output::Fanout(mut fanout) => {
                fanout.add(rx);
                Output::Fanout(fanout)
            }
        };
    }

    pub fn send(&mut self, frame: Frame, node: &str) -> Result<()> {
        match self {
            Output::Unresolved => Err(Error::Linkage(format!("{node} has no output receiver"))),
            Output::Single(rx) => rx.accept(frame),
            Output::Fanout(fanout) => fanout.accept(frame),
        }
    }

    pub fn send_many(&mut self, frames: Vec<Frame>, node: &str) -> Result<()> {
        match self {
            Output::Unresolved => Err(Error::Linkage(format!("{node} has no output receiver"))),
            Output::Single(rx) => rx.accept_many(frames),
            Output::Fanout(fanout) => fanout.accept_many(frames),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        match self {
            Output::Unresolved => Ok(()),
            Output::Single(rx) => rx.flush(),
            Output::Fanout(fanout) => fanout.flush(),
        }
    }
}
