//! Sans-IO SPDY/2 framing layer.
//!
//! This crate provides a pure sans-IO SPDY version 2 frame codec. It has no
//! runtime dependencies on any I/O stack -- the caller feeds bytes in via
//! [`SpdyCodec::feed`] and drains decoded frames with
//! [`SpdyCodec::poll_event`]; the `encode_*` methods produce complete,
//! ready-to-transmit wire bytes.
//!
//! # Architecture
//!
//! ```text
//!   transport bytes
//!        |
//!   +----v-------------+
//!   | spindle-framing  |  SPDY/2 framing + zlib header compression
//!   | SpdyCodec        |  CodecEvent: Control, StreamData, Error
//!   +------------------+
//! ```
//!
//! Header blocks of SYN_STREAM and SYN_REPLY frames are compressed through a
//! pair of zlib contexts that live as long as the codec, one per direction.
//! The compression window spans frames, which is what makes the compression
//! effective -- and why every codec error is terminal: after a parse or
//! decompression failure the window can no longer be trusted, so the owning
//! session must tear the connection down.
//!
//! # Example
//!
//! ```rust
//! use spindle_framing::{CodecEvent, ControlFrame, HeaderBlock, SpdyCodec};
//!
//! let mut client = SpdyCodec::new();
//! let mut server = SpdyCodec::new();
//!
//! let mut headers = HeaderBlock::new();
//! headers.insert("method", "GET");
//! headers.insert("url", "/");
//! let wire = client.encode_syn_stream(1, 0, 2, false, &headers).unwrap();
//!
//! let consumed = server.feed(&wire);
//! assert_eq!(consumed, wire.len());
//! match server.poll_event() {
//!     Some(CodecEvent::Control(ControlFrame::SynStream { stream_id, .. })) => {
//!         assert_eq!(stream_id, 1);
//!     }
//!     other => panic!("unexpected event: {other:?}"),
//! }
//! ```

pub mod codec;
mod compress;
pub mod error;
pub mod frame;
pub mod header;

pub use codec::{CodecEvent, SpdyCodec, DEFAULT_MAX_CONTROL_PAYLOAD};
pub use error::FramingError;
pub use frame::{ControlFrame, FrameHeader, RstStatus, MAX_FRAME_PAYLOAD, SPDY_VERSION};
pub use header::HeaderBlock;
