//! Ground-station decoding of satellite downlink bitstreams.
//!
//! A raw downlink capture is an arbitrary sequence of byte buffers with no
//! alignment guarantees. This crate locates fixed-length frames inside that
//! stream by scanning for an attached sync pattern at any bit offset
//! ([`framing::FrameSynchronizer`]), then applies forward error correction
//! ([`integrity::ReedSolomon`]) and checksum validation
//! ([`integrity::CrcDecoder`]). The stages share a small push-based node
//! fabric ([`pipeline`]) so they can be wired into a fan-out graph.
//!
//! Decoding is single-threaded and synchronous: one call delivers one
//! buffer and traverses every configured stage before returning. Run
//! independent downlink sessions on separate threads by instantiating a
//! separate set of nodes per session.

mod error;

pub mod config;
pub mod framing;
pub mod integrity;
pub mod pipeline;

pub use error::{Error, Result};
