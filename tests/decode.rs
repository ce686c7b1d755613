use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use downlink::config::{CrcConfig, RsConfig, SyncConfig};
use downlink::framing::{Derandomizer, Frame, FrameSynchronizer, ASM};
use downlink::integrity::{CrcDecoder, ReedSolomon};
use downlink::pipeline::{
    frame_receiver, FrameReceiver, FrameSource, FrameSyncNode, LinkContext, NodeRegistry,
    PipelineNode,
};
use downlink::Result;

const FRAME_LEN: usize = 32;

fn sync_config() -> SyncConfig {
    SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .build()
}

fn frame_bytes(tag: u8) -> Vec<u8> {
    let mut f = ASM.to_vec();
    f.extend((0..FRAME_LEN - 4).map(|i| tag.wrapping_add(i as u8)));
    f
}

fn push_bits(bits: &mut Vec<bool>, bytes: &[u8]) {
    for &b in bytes {
        for i in (0..8).rev() {
            bits.push(b >> i & 1 == 1);
        }
    }
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|c| {
            c.iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << (7 - i)))
        })
        .collect()
}

#[test]
fn pattern_split_at_buffer_boundary() {
    let mut sync = FrameSynchronizer::new(&sync_config()).unwrap();

    // first two pattern bytes end one buffer, the rest opens the next
    let mut first = vec![0u8; 10];
    first.extend(&ASM[..2]);
    let mut second = ASM[2..].to_vec();
    second.extend(&frame_bytes(1)[4..]);
    second.extend(ASM);

    assert!(sync.process(&first).is_empty());
    let frames = sync.process(&second);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, frame_bytes(1));
    assert!(frames[0].annotation.lock);
}

#[test]
fn chunked_delivery_matches_single_buffer() {
    let mut stream = vec![0u8; 5];
    for tag in 0..4 {
        stream.extend(frame_bytes(tag));
    }
    stream.extend(ASM);

    let mut one = FrameSynchronizer::new(&sync_config()).unwrap();
    let whole = one.process(&stream);

    let mut many = FrameSynchronizer::new(&sync_config()).unwrap();
    let mut chunked = Vec::new();
    for chunk in stream.chunks(7) {
        chunked.extend(many.process(chunk));
    }

    assert_eq!(whole.len(), 4);
    assert_eq!(whole.len(), chunked.len());
    for (a, b) in whole.iter().zip(chunked.iter()) {
        assert_eq!(a.data, b.data);
        let mut aa = a.annotation.clone();
        let mut bb = b.annotation.clone();
        aa.timestamp = None;
        bb.timestamp = None;
        assert_eq!(aa, bb);
    }
}

#[test]
fn single_bit_slip_is_corrected_and_annotated_once() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .slip_tolerance(1)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    // one stray bit inserted after the third frame shifts the rest of the
    // stream by exactly one bit
    let mut bits = Vec::new();
    for tag in 0..3 {
        push_bits(&mut bits, &frame_bytes(tag));
    }
    bits.push(false);
    for tag in 3..5 {
        push_bits(&mut bits, &frame_bytes(tag));
    }
    push_bits(&mut bits, &ASM);

    let frames = sync.process(&pack_bits(&bits));
    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.data, frame_bytes(i as u8), "frame {i}");
        assert!(frame.annotation.lock);
        assert_eq!(
            frame.annotation.slipped,
            i == 3,
            "only the frame after the slip carries the annotation"
        );
    }
    assert_eq!(sync.stats().slipped_frames, 1);
}

#[test]
fn bit_slip_across_split_buffers_is_corrected() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .slip_tolerance(1)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    // one stray bit right after the first frame; the buffer split lands
    // inside the boundary sync window
    let mut bits = Vec::new();
    push_bits(&mut bits, &frame_bytes(0));
    bits.push(false);
    push_bits(&mut bits, &frame_bytes(1));
    push_bits(&mut bits, &ASM);
    let stream = pack_bits(&bits);

    let mut frames = sync.process(&stream[..FRAME_LEN + 2]);
    frames.extend(sync.process(&stream[FRAME_LEN + 2..]));

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].data, frame_bytes(1));
    assert!(!frames[0].annotation.slipped);
    assert!(frames[1].annotation.slipped);
    assert_eq!(sync.stats().slipped_frames, 1);
    assert_eq!(sync.stats().drops_to_search, 0);
}

#[test]
fn dropped_bit_across_split_buffers_is_corrected() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .slip_tolerance(1)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    // the first frame loses its final payload bit, so the next pattern
    // arrives one bit early and the split sits on the boundary window
    let mut bits = Vec::new();
    push_bits(&mut bits, &frame_bytes(0));
    bits.pop();
    push_bits(&mut bits, &frame_bytes(1));
    push_bits(&mut bits, &ASM);
    let stream = pack_bits(&bits);

    let mut frames = sync.process(&stream[..FRAME_LEN + 2]);
    frames.extend(sync.process(&stream[FRAME_LEN + 2..]));

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].data, frame_bytes(1));
    assert!(frames[1].annotation.slipped);
    assert_eq!(sync.stats().slipped_frames, 1);
    assert_eq!(sync.stats().drops_to_search, 0);
}

#[test]
fn flywheel_emits_placeholder_frames() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .flywheel_duration(3)
        .send_flywheels(true)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    let mut stream = frame_bytes(1);
    stream.extend(vec![0u8; 3 * FRAME_LEN]);

    let frames = sync.process(&stream);
    assert_eq!(frames.len(), 4);
    assert!(frames[0].annotation.lock);
    for frame in &frames[1..] {
        assert!(!frame.annotation.lock);
        assert!(!frame.annotation.inverted);
        assert_eq!(frame.data.len(), FRAME_LEN);
    }
    assert_eq!(sync.stats().flywheel_frames, 3);
}

#[test]
fn flywheel_discard_counts_but_emits_nothing() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(FRAME_LEN)
        .flywheel_duration(3)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    let mut stream = frame_bytes(1);
    stream.extend(vec![0u8; 3 * FRAME_LEN]);

    let frames = sync.process(&stream);
    assert_eq!(frames.len(), 1, "only the locked frame is emitted");
    assert_eq!(sync.stats().flywheel_frames, 3);
}

#[test]
fn concrete_lock_scenario() {
    let cfg = SyncConfig::builder()
        .pattern("1ACFFC1D")
        .frame_length(1024)
        .build();
    let mut sync = FrameSynchronizer::new(&cfg).unwrap();

    let mut stream = vec![0u8; 1024];
    stream.extend(ASM);
    stream.extend((0..1020).map(|i| (i % 251) as u8));

    let frames = sync.process(&stream);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data.len(), 1024);
    assert_eq!(&frames[0].data[..4], ASM);
    assert!(frames[0].annotation.lock);
    assert_eq!(sync.stats().lock_frames, 1);
}

struct Sink {
    frames: Rc<RefCell<Vec<Frame>>>,
}

impl FrameReceiver for Sink {
    fn name(&self) -> &str {
        "sink"
    }

    fn accept(&mut self, frame: Frame) -> Result<()> {
        self.frames.borrow_mut().push(frame);
        Ok(())
    }
}

/// A full link: synchronizer, derandomizer, Reed-Solomon, CRC, collector.
#[test]
fn pipeline_end_to_end() {
    let frame_length = 4 + 255;
    let sync_length = 4;

    let rs_cfg = RsConfig::builder().interleave(1).ccsds(true).build();
    let rs = ReedSolomon::new(&rs_cfg, frame_length, sync_length).unwrap();
    let crc_cfg = CrcConfig::builder().build();
    let crc = CrcDecoder::new(&crc_cfg, frame_length, sync_length, Some(rs.parity_span())).unwrap();
    let pn = Derandomizer::new();

    // two valid frames: checksum stamped, parity encoded, then the
    // transmit-side randomization applied on top
    let mut expected = Vec::new();
    let mut stream = Vec::new();
    for tag in [0x20u8, 0x21] {
        let mut frame = ASM.to_vec();
        frame.extend((0..frame_length - 4).map(|i| tag.wrapping_add(i as u8)));
        crc.stamp(&mut frame);
        rs.encode(&mut frame);
        expected.push(frame.clone());
        pn.decode(&mut frame[sync_length..]);
        stream.extend(frame);
    }
    stream.extend(ASM);

    let registry = NodeRegistry::with_defaults();
    let mut sync_node = FrameSyncNode::new("sync");
    sync_node
        .load(json!({"pattern": "1ACFFC1D", "frame_length": frame_length}))
        .unwrap();
    let mut link = sync_node.link_context();
    link.rs_parity_span = Some(rs_cfg.parity_span());

    let mut pn_node = registry.instantiate("derandomize").unwrap();
    pn_node.load(json!({})).unwrap();
    pn_node.finish_setup(&link).unwrap();
    let mut rs_node = registry.instantiate("reed_solomon").unwrap();
    rs_node.load(json!({"interleave": 1, "ccsds": true})).unwrap();
    rs_node.finish_setup(&link).unwrap();
    let mut crc_node = registry.instantiate("crc").unwrap();
    crc_node.load(json!({})).unwrap();
    crc_node.finish_setup(&link).unwrap();

    let frames = Rc::new(RefCell::new(Vec::new()));
    crc_node
        .as_frame_source()
        .unwrap()
        .add_receiver(Box::new(Sink {
            frames: frames.clone(),
        }))
        .unwrap();
    rs_node
        .as_frame_source()
        .unwrap()
        .add_receiver(frame_receiver(crc_node).unwrap())
        .unwrap();
    pn_node
        .as_frame_source()
        .unwrap()
        .add_receiver(frame_receiver(rs_node).unwrap())
        .unwrap();
    sync_node
        .add_receiver(frame_receiver(pn_node).unwrap())
        .unwrap();

    for chunk in stream.chunks(100) {
        sync_node.process(chunk).unwrap();
    }
    sync_node.flush().unwrap();

    let frames = frames.borrow();
    assert_eq!(frames.len(), 2);
    for (frame, want) in frames.iter().zip(expected.iter()) {
        assert_eq!(&frame.data, want);
        assert!(frame.annotation.lock);
        assert!(!frame.annotation.crc_error);
        assert!(!frame.annotation.rs_corrected);
        assert!(!frame.annotation.rs_uncorrectable);
        assert!(!frame.deleted);
    }
    assert_eq!(sync_node.mode(), "search", "flush resets the synchronizer");
}

/// Errors inside the correction bound are repaired before the CRC check.
#[test]
fn pipeline_corrects_channel_errors() {
    let frame_length = 4 + 255;
    let sync_length = 4;

    let rs_cfg = RsConfig::builder().interleave(1).ccsds(true).build();
    let rs = ReedSolomon::new(&rs_cfg, frame_length, sync_length).unwrap();
    let crc_cfg = CrcConfig::builder().build();
    let crc = CrcDecoder::new(&crc_cfg, frame_length, sync_length, Some(rs.parity_span())).unwrap();

    let mut frame = ASM.to_vec();
    frame.extend((0..frame_length - 4).map(|i| (i * 3 % 256) as u8));
    crc.stamp(&mut frame);
    rs.encode(&mut frame);
    let clean = frame.clone();
    // corrupt a handful of payload bytes after encoding
    for i in [10, 40, 90, 200] {
        frame[i] ^= 0x42;
    }
    let mut stream = frame;
    stream.extend(ASM);

    let link = LinkContext {
        frame_length,
        sync_length,
        rs_parity_span: Some(rs_cfg.parity_span()),
    };
    let registry = NodeRegistry::with_defaults();
    let mut sync_node = FrameSyncNode::new("sync");
    sync_node
        .load(json!({"pattern": "1ACFFC1D", "frame_length": frame_length}))
        .unwrap();
    let mut rs_node = registry.instantiate("reed_solomon").unwrap();
    rs_node.load(json!({"interleave": 1, "ccsds": true})).unwrap();
    rs_node.finish_setup(&link).unwrap();
    let mut crc_node = registry.instantiate("crc").unwrap();
    crc_node.load(json!({})).unwrap();
    crc_node.finish_setup(&link).unwrap();

    let frames = Rc::new(RefCell::new(Vec::new()));
    crc_node
        .as_frame_source()
        .unwrap()
        .add_receiver(Box::new(Sink {
            frames: frames.clone(),
        }))
        .unwrap();
    rs_node
        .as_frame_source()
        .unwrap()
        .add_receiver(frame_receiver(crc_node).unwrap())
        .unwrap();
    sync_node
        .add_receiver(frame_receiver(rs_node).unwrap())
        .unwrap();

    sync_node.process(&stream).unwrap();

    let frames = frames.borrow();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].data, clean, "corrupted bytes restored");
    assert!(frames[0].annotation.rs_corrected);
    assert!(
        !frames[0].annotation.crc_error,
        "checksum verifies after correction"
    );
}
