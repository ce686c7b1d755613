//! Node adapters for the four built-in stages.

use serde_json::Value;
use tracing::debug;

use super::{FrameReceiver, FrameSource, LinkContext, Output, PipelineNode};
use crate::config::{CrcConfig, RsConfig, SyncConfig};
use crate::framing::{Derandomizer, Frame, FrameSynchronizer, SyncStats};
use crate::integrity::{CrcDecoder, Integrity, ReedSolomon};
use crate::{Error, Result};

/// Source stage: raw buffers in, frames out.
pub struct FrameSyncNode {
    name: String,
    sync: Option<FrameSynchronizer>,
    frame_length: usize,
    sync_length: usize,
    output: Output,
    passed: u64,
}

impl FrameSyncNode {
    pub fn new(name: impl Into<String>) -> Self {
        FrameSyncNode {
            name: name.into(),
            sync: None,
            frame_length: 0,
            sync_length: 0,
            output: Output::new(),
            passed: 0,
        }
    }

    /// Link facts this stage anchors; the caller adds the Reed-Solomon
    /// parity span when that stage is present.
    pub fn link_context(&self) -> LinkContext {
        LinkContext {
            frame_length: self.frame_length,
            sync_length: self.sync_length,
            rs_parity_span: None,
        }
    }

    pub fn mode(&self) -> &'static str {
        self.sync.as_ref().map_or("search", FrameSynchronizer::mode)
    }

    pub fn stats(&self) -> Option<&SyncStats> {
        self.sync.as_ref().map(FrameSynchronizer::stats)
    }

    /// Push one raw buffer and deliver the frames it completes.
    pub fn process(&mut self, buf: &[u8]) -> Result<()> {
        if !self.output.is_resolved() {
            return Err(Error::Linkage(format!("{} has no output receiver", self.name)));
        }
        let frames = match self.sync.as_mut() {
            Some(sync) => sync.process(buf),
            None => return Err(Error::Linkage(format!("{} is not configured", self.name))),
        };
        if frames.is_empty() {
            return Ok(());
        }
        self.passed += frames.len() as u64;
        self.output.send_many(frames, &self.name)
    }

    /// Drop any partial frame and flush downstream.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(sync) = self.sync.as_mut() {
            sync.flush();
        }
        self.output.flush()
    }
}

impl FrameSource for FrameSyncNode {
    fn add_receiver(&mut self, receiver: Box<dyn FrameReceiver>) -> Result<()> {
        self.output.attach(receiver);
        Ok(())
    }
}

impl PipelineNode for FrameSyncNode {
    fn kind(&self) -> &'static str {
        "frame_sync"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, config: Value) -> Result<()> {
        let cfg: SyncConfig = serde_json::from_value(config)?;
        self.sync_length = cfg.pattern_bytes()?.len();
        self.frame_length = cfg.frame_length;
        self.sync = Some(FrameSynchronizer::new(&cfg)?);
        Ok(())
    }

    fn counters(&self) -> Vec<(&'static str, u64)> {
        let mut out = self.stats().map(SyncStats::counters).unwrap_or_default();
        out.push(("passed_frames", self.passed));
        out
    }

    fn as_frame_source(&mut self) -> Option<&mut dyn FrameSource> {
        Some(self)
    }

    fn into_frame_receiver(
        self: Box<Self>,
    ) -> std::result::Result<Box<dyn FrameReceiver>, Box<dyn PipelineNode>> {
        Err(self)
    }
}

/// Removes the transmit-side pseudo-noise cover from the bytes after the
/// sync pattern.
pub struct DerandomizerNode {
    name: String,
    pn: Derandomizer,
    sync_length: usize,
    output: Output,
    passed: u64,
}

impl DerandomizerNode {
    pub fn new(name: impl Into<String>) -> Self {
        DerandomizerNode {
            name: name.into(),
            pn: Derandomizer::new(),
            sync_length: 0,
            output: Output::new(),
            passed: 0,
        }
    }
}

impl FrameSource for DerandomizerNode {
    fn add_receiver(&mut self, receiver: Box<dyn FrameReceiver>) -> Result<()> {
        self.output.attach(receiver);
        Ok(())
    }
}

impl FrameReceiver for DerandomizerNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, mut frame: Frame) -> Result<()> {
        self.pn.decode(&mut frame.data[self.sync_length..]);
        self.passed += 1;
        self.output.send(frame, &self.name)
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()
    }
}

impl PipelineNode for DerandomizerNode {
    fn kind(&self) -> &'static str {
        "derandomize"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, _config: Value) -> Result<()> {
        Ok(())
    }

    fn finish_setup(&mut self, link: &LinkContext) -> Result<()> {
        self.sync_length = link.sync_length;
        Ok(())
    }

    fn counters(&self) -> Vec<(&'static str, u64)> {
        vec![("passed_frames", self.passed)]
    }

    fn as_frame_source(&mut self) -> Option<&mut dyn FrameSource> {
        Some(self)
    }

    fn into_frame_receiver(
        self: Box<Self>,
    ) -> std::result::Result<Box<dyn FrameReceiver>, Box<dyn PipelineNode>> {
        Ok(self)
    }
}

/// Reed-Solomon detection/correction over each frame's codeblock.
pub struct ReedSolomonNode {
    name: String,
    cfg: Option<RsConfig>,
    rs: Option<ReedSolomon>,
    output: Output,
    corrected: u64,
    uncorrectable: u64,
    passed: u64,
    deleted: u64,
}

impl ReedSolomonNode {
    pub fn new(name: impl Into<String>) -> Self {
        ReedSolomonNode {
            name: name.into(),
            cfg: None,
            rs: None,
            output: Output::new(),
            corrected: 0,
            uncorrectable: 0,
            passed: 0,
            deleted: 0,
        }
    }
}

impl FrameSource for ReedSolomonNode {
    fn add_receiver(&mut self, receiver: Box<dyn FrameReceiver>) -> Result<()> {
        self.output.attach(receiver);
        Ok(())
    }
}

impl FrameReceiver for ReedSolomonNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, mut frame: Frame) -> Result<()> {
        let rs = self
            .rs
            .as_ref()
            .ok_or_else(|| Error::Linkage(format!("{} setup is not finished", self.name)))?;
        match rs.decode(&mut frame.data) {
            Integrity::Ok => {}
            Integrity::Corrected(symbols) => {
                debug!(name = %self.name, symbols, "corrected codeblock");
                frame.annotation.rs_corrected = true;
                self.corrected += 1;
            }
            Integrity::Uncorrectable => {
                debug!(name = %self.name, "uncorrectable codeblock");
                frame.annotation.rs_uncorrectable = true;
                self.uncorrectable += 1;
                if rs.discard_uncorrectables() {
                    frame.deleted = true;
                }
            }
        }
        if frame.deleted {
            self.deleted += 1;
            return Ok(());
        }
        self.passed += 1;
        self.output.send(frame, &self.name)
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()
    }
}

impl PipelineNode for ReedSolomonNode {
    fn kind(&self) -> &'static str {
        "reed_solomon"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, config: Value) -> Result<()> {
        self.cfg = Some(serde_json::from_value(config)?);
        Ok(())
    }

    fn finish_setup(&mut self, link: &LinkContext) -> Result<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| Error::Linkage(format!("{} was never loaded", self.name)))?;
        self.rs = Some(ReedSolomon::new(cfg, link.frame_length, link.sync_length)?);
        Ok(())
    }

    fn counters(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("corrected_frames", self.corrected),
            ("uncorrectable_frames", self.uncorrectable),
            ("passed_frames", self.passed),
            ("deleted_frames", self.deleted),
        ]
    }

    fn as_frame_source(&mut self) -> Option<&mut dyn FrameSource> {
        Some(self)
    }

    fn into_frame_receiver(
        self: Box<Self>,
    ) -> std::result::Result<Box<dyn FrameReceiver>, Box<dyn PipelineNode>> {
        Ok(self)
    }
}

/// CRC validation over each frame's checksum span.
pub struct CrcNode {
    name: String,
    cfg: Option<CrcConfig>,
    crc: Option<CrcDecoder>,
    output: Output,
    errors: u64,
    passed: u64,
    deleted: u64,
}

impl CrcNode {
    pub fn new(name: impl Into<String>) -> Self {
        CrcNode {
            name: name.into(),
            cfg: None,
            crc: None,
            output: Output::new(),
            errors: 0,
            passed: 0,
            deleted: 0,
        }
    }
}

impl FrameSource for CrcNode {
    fn add_receiver(&mut self, receiver: Box<dyn FrameReceiver>) -> Result<()> {
        self.output.attach(receiver);
        Ok(())
    }
}

impl FrameReceiver for CrcNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&mut self, mut frame: Frame) -> Result<()> {
        let crc = self
            .crc
            .as_ref()
            .ok_or_else(|| Error::Linkage(format!("{} setup is not finished", self.name)))?;
        if !crc.check(&frame.data) {
            debug!(name = %self.name, "checksum mismatch");
            frame.annotation.crc_error = true;
            self.errors += 1;
            if crc.discard_bad_frames() {
                frame.deleted = true;
            }
        }
        if frame.deleted {
            self.deleted += 1;
            return Ok(());
        }
        self.passed += 1;
        self.output.send(frame, &self.name)
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush()
    }
}

impl PipelineNode for CrcNode {
    fn kind(&self) -> &'static str {
        "crc"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self, config: Value) -> Result<()> {
        self.cfg = Some(serde_json::from_value(config)?);
        Ok(())
    }

    fn finish_setup(&mut self, link: &LinkContext) -> Result<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| Error::Linkage(format!("{} was never loaded", self.name)))?;
        self.crc = Some(CrcDecoder::new(
            cfg,
            link.frame_length,
            link.sync_length,
            link.rs_parity_span,
        )?);
        Ok(())
    }

    fn counters(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("crc_error_frames", self.errors),
            ("passed_frames", self.passed),
            ("deleted_frames", self.deleted),
        ]
    }

    fn as_frame_source(&mut self) -> Option<&mut dyn FrameSource> {
        Some(self)
    }

    fn into_frame_receiver(
        self: Box<Self>,
    ) -> std::result::Result<Box<dyn FrameReceiver>, Box<dyn PipelineNode>> {
        Ok(self)
    }
}
