//! SPDY/2 frame layout (common header and control payloads).
//!
//! Every frame starts with a fixed 8-byte common header:
//! ```text
//!  Control frame                        Data frame
//! +-+--------------+----------------+  +-+------------------------------+
//! |C|  Version(15) |    Type(16)    |  |C|      Stream-ID (31)          |
//! +-+--------------+----------------+  +-+------------------------------+
//! |   Flags (8)   |   Length (24)   |  |   Flags (8)   |  Length (24)   |
//! +---------------+-----------------+  +---------------+----------------+
//! ```
//! The control bit `C` is 1 for control frames and 0 for data frames; the
//! 24-bit length counts payload bytes only.

use crate::error::FramingError;
use crate::header::HeaderBlock;

/// Common frame header size in bytes.
pub const COMMON_HEADER_LEN: usize = 8;

/// The single supported protocol version.
pub const SPDY_VERSION: u16 = 2;

/// Hard payload ceiling implied by the 24-bit length field.
pub const MAX_FRAME_PAYLOAD: usize = 0x00ff_ffff;

// Control frame type constants.
pub const TYPE_SYN_STREAM: u16 = 1;
pub const TYPE_SYN_REPLY: u16 = 2;
pub const TYPE_RST_STREAM: u16 = 3;
pub const TYPE_NOP: u16 = 5;

// Flag constants.
/// Final frame for this stream, in the sender's direction.
pub const FLAG_FIN: u8 = 0x01;
/// Data frame payload is independently compressed by the application.
pub const DATA_FLAG_COMPRESSED: u8 = 0x02;

/// Fixed (pre-header-block) payload sizes per control type.
pub(crate) const SYN_STREAM_FIXED_LEN: usize = 10;
pub(crate) const SYN_REPLY_FIXED_LEN: usize = 6;
pub(crate) const RST_STREAM_PAYLOAD_LEN: usize = 8;

/// RST_STREAM status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RstStatus {
    ProtocolError = 1,
    InvalidStream = 2,
    RefusedStream = 3,
    UnsupportedVersion = 4,
    Cancel = 5,
    InternalError = 6,
    FlowControlError = 7,
}

impl RstStatus {
    pub fn from_u32(v: u32) -> Self {
        match v {
            1 => Self::ProtocolError,
            2 => Self::InvalidStream,
            3 => Self::RefusedStream,
            4 => Self::UnsupportedVersion,
            5 => Self::Cancel,
            7 => Self::FlowControlError,
            _ => Self::InternalError,
        }
    }
}

/// Decoded common frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Control bit: control frame vs data frame.
    pub control: bool,
    /// Protocol version (control frames only).
    pub version: u16,
    /// Control frame type (control frames only).
    pub frame_type: u16,
    /// Target stream (data frames only; control frames carry the stream id
    /// inside their payload).
    pub stream_id: u32,
    pub flags: u8,
    /// Declared payload length.
    pub length: usize,
}

/// Decode a common header from the first [`COMMON_HEADER_LEN`] bytes of
/// `buf`. Returns `None` if the buffer is too short.
pub fn decode_common_header(buf: &[u8]) -> Option<FrameHeader> {
    if buf.len() < COMMON_HEADER_LEN {
        return None;
    }
    let word = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let control = word & 0x8000_0000 != 0;
    let flags = buf[4];
    let length = ((u32::from(buf[5]) << 16) | (u32::from(buf[6]) << 8) | u32::from(buf[7])) as usize;
    if control {
        Some(FrameHeader {
            control: true,
            version: ((word >> 16) & 0x7fff) as u16,
            frame_type: (word & 0xffff) as u16,
            stream_id: 0,
            flags,
            length,
        })
    } else {
        Some(FrameHeader {
            control: false,
            version: 0,
            frame_type: 0,
            stream_id: word & 0x7fff_ffff,
            flags,
            length,
        })
    }
}

/// Encode a control frame common header.
pub fn encode_control_header(buf: &mut Vec<u8>, frame_type: u16, flags: u8, length: usize) {
    debug_assert!(length <= MAX_FRAME_PAYLOAD);
    let word = 0x8000_0000 | (u32::from(SPDY_VERSION) << 16) | u32::from(frame_type);
    buf.extend_from_slice(&word.to_be_bytes());
    buf.push(flags);
    buf.push((length >> 16) as u8);
    buf.push((length >> 8) as u8);
    buf.push(length as u8);
}

/// Encode a data frame common header.
pub fn encode_data_header(buf: &mut Vec<u8>, stream_id: u32, flags: u8, length: usize) {
    debug_assert!(length <= MAX_FRAME_PAYLOAD);
    buf.extend_from_slice(&(stream_id & 0x7fff_ffff).to_be_bytes());
    buf.push(flags);
    buf.push((length >> 16) as u8);
    buf.push((length >> 8) as u8);
    buf.push(length as u8);
}

/// A fully decoded SPDY control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// SYN_STREAM (type 1): opens a new stream.
    SynStream {
        stream_id: u32,
        /// Stream this one is associated with, 0 if none.
        associated_stream_id: u32,
        /// Priority in [0, 3]; 0 is the most urgent.
        priority: u8,
        fin: bool,
        headers: HeaderBlock,
    },
    /// SYN_REPLY (type 2): response half of a stream.
    SynReply {
        stream_id: u32,
        fin: bool,
        headers: HeaderBlock,
    },
    /// RST_STREAM (type 3): abnormal stream termination.
    RstStream { stream_id: u32, status: RstStatus },
    /// NOP (type 5): no payload, no effect.
    Nop,
}

impl ControlFrame {
    /// The stream this frame addresses, if any.
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            Self::SynStream { stream_id, .. }
            | Self::SynReply { stream_id, .. }
            | Self::RstStream { stream_id, .. } => Some(*stream_id),
            Self::Nop => None,
        }
    }
}

/// Parse the fixed SYN_STREAM prelude; the rest of the payload is the
/// (possibly compressed) header block.
pub(crate) fn parse_syn_stream_prelude(
    payload: &[u8],
) -> Result<(u32, u32, u8), FramingError> {
    if payload.len() < SYN_STREAM_FIXED_LEN {
        return Err(FramingError::InvalidControlFrame);
    }
    let stream_id =
        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
    let associated =
        u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]) & 0x7fff_ffff;
    let priority = payload[8] >> 6;
    if stream_id == 0 {
        return Err(FramingError::InvalidControlFrame);
    }
    Ok((stream_id, associated, priority))
}

/// Parse the fixed SYN_REPLY prelude.
pub(crate) fn parse_syn_reply_prelude(payload: &[u8]) -> Result<u32, FramingError> {
    if payload.len() < SYN_REPLY_FIXED_LEN {
        return Err(FramingError::InvalidControlFrame);
    }
    let stream_id =
        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
    if stream_id == 0 {
        return Err(FramingError::InvalidControlFrame);
    }
    Ok(stream_id)
}

/// Parse a complete RST_STREAM payload.
pub(crate) fn parse_rst_stream(payload: &[u8]) -> Result<(u32, RstStatus), FramingError> {
    if payload.len() != RST_STREAM_PAYLOAD_LEN {
        return Err(FramingError::InvalidControlFrame);
    }
    let stream_id =
        u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
    let status =
        u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    if stream_id == 0 {
        return Err(FramingError::InvalidControlFrame);
    }
    Ok((stream_id, RstStatus::from_u32(status)))
}
