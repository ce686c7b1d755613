use std::collections::HashMap;

use super::nodes::{CrcNode, DerandomizerNode, FrameSyncNode, ReedSolomonNode};
use super::PipelineNode;
use crate::{Error, Result};

type Factory = Box<dyn Fn() -> Box<dyn PipelineNode>>;

/// Stage-type identifier to node factory.
///
/// Each call to [`instantiate`](Self::instantiate) produces a fresh,
/// independently owned node, so separate sessions never share mutable
/// state.
pub struct NodeRegistry {
    factories: HashMap<String, Factory>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry with the four built-in stages.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register("frame_sync", || Box::new(FrameSyncNode::new("frame_sync")));
        reg.register("derandomize", || {
            Box::new(DerandomizerNode::new("derandomize"))
        });
        reg.register("reed_solomon", || {
            Box::new(ReedSolomonNode::new("reed_solomon"))
        });
        reg.register("crc", || Box::new(CrcNode::new("crc")));
        reg
    }

    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn() -> Box<dyn PipelineNode> + 'static,
    {
        self.factories.insert(kind.to_owned(), Box::new(factory));
    }

    /// # Errors
    /// [`Error::Config`] for an unregistered stage type.
    pub fn instantiate(&self, kind: &str) -> Result<Box<dyn PipelineNode>> {
        self.factories
            .get(kind)
            .map(|f| f())
            .ok_or_else(|| Error::Config(format!("unknown stage type {kind:?}")))
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_stages() {
        let reg = NodeRegistry::with_defaults();
        for kind in ["frame_sync", "derandomize", "reed_solomon", "crc"] {
            let node = reg.instantiate(kind).unwrap();
            assert_eq!(node.kind(), kind);
        }
        assert!(reg.instantiate("archive").is_err());
    }

    #[test]
    fn instances_are_independent() {
        let reg = NodeRegistry::with_defaults();
        let a = reg.instantiate("crc").unwrap();
        let b = reg.instantiate("crc").unwrap();
        assert_eq!(a.kind(), b.kind());
    }
}
