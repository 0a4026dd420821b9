//! Incremental SPDY/2 frame codec.
//!
//! `SpdyCodec` is a sans-IO state machine: feed transport bytes in with
//! [`SpdyCodec::feed`] (any chunking, down to one byte at a time), drain
//! decoded frames with [`SpdyCodec::poll_event`], and serialize outbound
//! frames with the `encode_*` methods. One codec holds both directions'
//! compression contexts, so it serves exactly one connection.
//!
//! Control frames are buffered until complete and emitted as typed
//! [`ControlFrame`] values. Data frame payloads are never buffered: they are
//! forwarded as [`CodecEvent::StreamData`] chunks as bytes arrive, with a
//! final empty chunk marking the end of a FIN-flagged frame.
//!
//! All parse and compression failures are sticky: the codec moves to a
//! terminal error state, reports the error once, and ignores all further
//! input, because frame boundaries and the shared compression window cannot
//! be trusted after a failure.

use std::collections::VecDeque;

use crate::compress::{HeaderCompressor, HeaderDecompressor};
use crate::error::FramingError;
use crate::frame::{
    self, ControlFrame, FrameHeader, RstStatus, COMMON_HEADER_LEN, DATA_FLAG_COMPRESSED,
    FLAG_FIN, MAX_FRAME_PAYLOAD, RST_STREAM_PAYLOAD_LEN, SPDY_VERSION, SYN_REPLY_FIXED_LEN,
    SYN_STREAM_FIXED_LEN, TYPE_NOP, TYPE_RST_STREAM, TYPE_SYN_REPLY, TYPE_SYN_STREAM,
};
use crate::header::HeaderBlock;

/// Default cap on control frame payloads (the 24-bit wire ceiling is far
/// larger than any legitimate control frame).
pub const DEFAULT_MAX_CONTROL_PAYLOAD: usize = 64 * 1024;

/// Events produced by the codec for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecEvent {
    /// A complete control frame was decoded.
    Control(ControlFrame),
    /// A chunk of data frame payload for a stream. An empty chunk signals
    /// that a FIN-flagged data frame finished: no more data will arrive on
    /// this stream from the peer.
    StreamData { stream_id: u32, data: Vec<u8> },
    /// The codec entered its terminal error state. Emitted exactly once.
    Error(FramingError),
}

/// Parse state. `Error` is a real variant rather than a side flag so that
/// no transition out of it is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodecState {
    ReadingCommonHeader,
    ControlPayload,
    ForwardStreamData,
    IgnoreRemainingPayload,
    Error,
}

/// Incremental SPDY/2 frame parser and serializer.
pub struct SpdyCodec {
    state: CodecState,
    error: Option<FramingError>,
    /// Accumulates the common header, then the current control payload.
    scratch: Vec<u8>,
    /// Header of the frame currently being parsed.
    current: Option<FrameHeader>,
    /// Payload bytes still expected for the current frame.
    remaining: usize,
    compression: bool,
    max_control_payload: usize,
    /// Lazily created, then reused for the life of the codec.
    compressor: Option<HeaderCompressor>,
    decompressor: Option<HeaderDecompressor>,
    events: VecDeque<CodecEvent>,
}

impl Default for SpdyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SpdyCodec {
    /// Create a codec with compression enabled and the default control
    /// payload cap.
    pub fn new() -> Self {
        Self::with_options(true, DEFAULT_MAX_CONTROL_PAYLOAD)
    }

    /// Create a codec with explicit compression mode and control payload cap.
    pub fn with_options(compression: bool, max_control_payload: usize) -> Self {
        Self {
            state: CodecState::ReadingCommonHeader,
            error: None,
            scratch: Vec::with_capacity(COMMON_HEADER_LEN),
            current: None,
            remaining: 0,
            compression,
            max_control_payload: max_control_payload.min(MAX_FRAME_PAYLOAD),
            compressor: None,
            decompressor: None,
            events: VecDeque::new(),
        }
    }

    /// Feed transport bytes into the parser. Returns the number of bytes
    /// consumed; it is always safe to supply more than one frame. Once the
    /// codec has failed, every call consumes nothing.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        if self.state == CodecState::Error {
            return 0;
        }
        let mut consumed = 0;
        while consumed < data.len() {
            match self.state {
                CodecState::ReadingCommonHeader => {
                    let need = COMMON_HEADER_LEN - self.scratch.len();
                    let take = need.min(data.len() - consumed);
                    self.scratch.extend_from_slice(&data[consumed..consumed + take]);
                    consumed += take;
                    if self.scratch.len() == COMMON_HEADER_LEN {
                        self.interpret_common_header();
                    }
                }
                CodecState::ControlPayload => {
                    let take = self.remaining.min(data.len() - consumed);
                    self.scratch.extend_from_slice(&data[consumed..consumed + take]);
                    consumed += take;
                    self.remaining -= take;
                    if self.remaining == 0 {
                        self.finish_control_frame();
                    }
                }
                CodecState::ForwardStreamData => {
                    let take = self.remaining.min(data.len() - consumed);
                    if take > 0 {
                        let stream_id = self.current_stream_id();
                        self.events.push_back(CodecEvent::StreamData {
                            stream_id,
                            data: data[consumed..consumed + take].to_vec(),
                        });
                    }
                    consumed += take;
                    self.remaining -= take;
                    if self.remaining == 0 {
                        self.finish_data_frame();
                    }
                }
                CodecState::IgnoreRemainingPayload => {
                    let take = self.remaining.min(data.len() - consumed);
                    consumed += take;
                    self.remaining -= take;
                    if self.remaining == 0 {
                        self.reset_for_next_frame();
                    }
                }
                CodecState::Error => break,
            }
            if self.state == CodecState::Error {
                break;
            }
        }
        consumed
    }

    /// Drain the next decoded event, if any.
    pub fn poll_event(&mut self) -> Option<CodecEvent> {
        self.events.pop_front()
    }

    pub fn has_error(&self) -> bool {
        self.state == CodecState::Error
    }

    /// The sticky error, set on first failure.
    pub fn error_code(&self) -> Option<FramingError> {
        self.error
    }

    /// Discard any partially parsed frame and return to the initial state.
    /// Has no effect once the codec has failed.
    pub fn reset(&mut self) {
        if self.state != CodecState::Error {
            self.reset_for_next_frame();
        }
    }

    /// Skip the rest of the data frame currently being forwarded to
    /// `stream_id`. The session calls this when the target stream is
    /// unknown or already closed; the remaining payload is consumed and
    /// discarded instead of being emitted as events. No-op when the codec
    /// has already moved on to a different frame.
    pub fn ignore_remaining_payload(&mut self, stream_id: u32) {
        if self.state == CodecState::ForwardStreamData && self.current_stream_id() == stream_id {
            if self.remaining > 0 {
                self.state = CodecState::IgnoreRemainingPayload;
            } else {
                self.reset_for_next_frame();
            }
        }
    }

    // -- Serialization --

    /// Serialize a SYN_STREAM frame, compressing the header block through
    /// the persistent compressor.
    pub fn encode_syn_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, FramingError> {
        if let Some(code) = self.error {
            return Err(code);
        }
        if stream_id == 0 || stream_id > 0x7fff_ffff || priority > 3 {
            return Err(FramingError::InvalidControlFrame);
        }
        let block = self.deflate_block(headers)?;
        let length = SYN_STREAM_FIXED_LEN + block.len();
        if length > MAX_FRAME_PAYLOAD {
            return Err(FramingError::ControlPayloadTooLarge);
        }
        let mut out = Vec::with_capacity(COMMON_HEADER_LEN + length);
        frame::encode_control_header(&mut out, TYPE_SYN_STREAM, fin_flag(fin), length);
        out.extend_from_slice(&stream_id.to_be_bytes());
        out.extend_from_slice(&(associated_stream_id & 0x7fff_ffff).to_be_bytes());
        out.push(priority << 6);
        out.push(0);
        out.extend_from_slice(&block);
        Ok(out)
    }

    /// Serialize a SYN_REPLY frame, compressing the header block through
    /// the persistent compressor.
    pub fn encode_syn_reply(
        &mut self,
        stream_id: u32,
        fin: bool,
        headers: &HeaderBlock,
    ) -> Result<Vec<u8>, FramingError> {
        if let Some(code) = self.error {
            return Err(code);
        }
        if stream_id == 0 || stream_id > 0x7fff_ffff {
            return Err(FramingError::InvalidControlFrame);
        }
        let block = self.deflate_block(headers)?;
        let length = SYN_REPLY_FIXED_LEN + block.len();
        if length > MAX_FRAME_PAYLOAD {
            return Err(FramingError::ControlPayloadTooLarge);
        }
        let mut out = Vec::with_capacity(COMMON_HEADER_LEN + length);
        frame::encode_control_header(&mut out, TYPE_SYN_REPLY, fin_flag(fin), length);
        out.extend_from_slice(&stream_id.to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&block);
        Ok(out)
    }

    /// Serialize an RST_STREAM frame. Stateless: RST_STREAM carries no
    /// header block, so no compression context is involved.
    pub fn encode_rst_stream(stream_id: u32, status: RstStatus) -> Vec<u8> {
        let mut out = Vec::with_capacity(COMMON_HEADER_LEN + RST_STREAM_PAYLOAD_LEN);
        frame::encode_control_header(&mut out, TYPE_RST_STREAM, 0, RST_STREAM_PAYLOAD_LEN);
        out.extend_from_slice(&(stream_id & 0x7fff_ffff).to_be_bytes());
        out.extend_from_slice(&(status as u32).to_be_bytes());
        out
    }

    /// Serialize a data frame. The payload must not exceed
    /// [`MAX_FRAME_PAYLOAD`]; callers split larger payloads across frames.
    pub fn encode_data_frame(stream_id: u32, data: &[u8], fin: bool, compressed: bool) -> Vec<u8> {
        debug_assert!(stream_id != 0 && stream_id <= 0x7fff_ffff);
        debug_assert!(data.len() <= MAX_FRAME_PAYLOAD);
        let mut flags = fin_flag(fin);
        if compressed {
            flags |= DATA_FLAG_COMPRESSED;
        }
        let mut out = Vec::with_capacity(COMMON_HEADER_LEN + data.len());
        frame::encode_data_header(&mut out, stream_id, flags, data.len());
        out.extend_from_slice(data);
        out
    }

    /// Serialize a NOP frame.
    pub fn encode_nop() -> Vec<u8> {
        let mut out = Vec::with_capacity(COMMON_HEADER_LEN);
        frame::encode_control_header(&mut out, TYPE_NOP, 0, 0);
        out
    }

    // -- Internal parsing --

    fn current_stream_id(&self) -> u32 {
        self.current.map(|h| h.stream_id).unwrap_or(0)
    }

    fn interpret_common_header(&mut self) {
        // The scratch buffer holds exactly COMMON_HEADER_LEN bytes here.
        let header = match frame::decode_common_header(&self.scratch) {
            Some(h) => h,
            None => {
                self.set_error(FramingError::InvalidControlFrame);
                return;
            }
        };
        self.scratch.clear();
        self.current = Some(header);
        self.remaining = header.length;

        if header.control {
            if header.version != SPDY_VERSION {
                self.set_error(FramingError::UnsupportedVersion);
                return;
            }
            if header.length > self.max_control_payload {
                self.set_error(FramingError::ControlPayloadTooLarge);
                return;
            }
            let length_valid = match header.frame_type {
                TYPE_SYN_STREAM => header.length >= SYN_STREAM_FIXED_LEN,
                TYPE_SYN_REPLY => header.length >= SYN_REPLY_FIXED_LEN,
                TYPE_RST_STREAM => header.length == RST_STREAM_PAYLOAD_LEN,
                TYPE_NOP => header.length == 0,
                _ => false,
            };
            if !length_valid {
                self.set_error(FramingError::InvalidControlFrame);
                return;
            }
            self.state = CodecState::ControlPayload;
            if self.remaining == 0 {
                self.finish_control_frame();
            }
        } else if header.stream_id == 0 {
            // Data on the invalid stream 0: swallow the payload.
            self.state = CodecState::IgnoreRemainingPayload;
            if self.remaining == 0 {
                self.reset_for_next_frame();
            }
        } else {
            self.state = CodecState::ForwardStreamData;
            if self.remaining == 0 {
                self.finish_data_frame();
            }
        }
    }

    fn finish_control_frame(&mut self) {
        let header = match self.current {
            Some(h) => h,
            None => {
                self.set_error(FramingError::InvalidControlFrame);
                return;
            }
        };
        let payload = std::mem::take(&mut self.scratch);
        let fin = header.flags & FLAG_FIN != 0;

        let result = match header.frame_type {
            TYPE_SYN_STREAM => frame::parse_syn_stream_prelude(&payload).and_then(
                |(stream_id, associated_stream_id, priority)| {
                    let headers = self.decode_header_block(&payload[SYN_STREAM_FIXED_LEN..])?;
                    Ok(ControlFrame::SynStream {
                        stream_id,
                        associated_stream_id,
                        priority,
                        fin,
                        headers,
                    })
                },
            ),
            TYPE_SYN_REPLY => frame::parse_syn_reply_prelude(&payload).and_then(|stream_id| {
                let headers = self.decode_header_block(&payload[SYN_REPLY_FIXED_LEN..])?;
                Ok(ControlFrame::SynReply {
                    stream_id,
                    fin,
                    headers,
                })
            }),
            TYPE_RST_STREAM => frame::parse_rst_stream(&payload)
                .map(|(stream_id, status)| ControlFrame::RstStream { stream_id, status }),
            TYPE_NOP => Ok(ControlFrame::Nop),
            // Unknown types were rejected when the header was interpreted.
            _ => Err(FramingError::InvalidControlFrame),
        };

        match result {
            Ok(control) => {
                self.events.push_back(CodecEvent::Control(control));
                self.reset_for_next_frame();
            }
            Err(code) => self.set_error(code),
        }
    }

    fn finish_data_frame(&mut self) {
        if let Some(header) = self.current {
            if header.flags & FLAG_FIN != 0 {
                self.events.push_back(CodecEvent::StreamData {
                    stream_id: header.stream_id,
                    data: Vec::new(),
                });
            }
        }
        self.reset_for_next_frame();
    }

    fn decode_header_block(&mut self, block: &[u8]) -> Result<HeaderBlock, FramingError> {
        if !self.compression {
            return HeaderBlock::decode(block);
        }
        if self.decompressor.is_none() {
            self.decompressor = Some(HeaderDecompressor::new()?);
        }
        let raw = match self.decompressor.as_mut() {
            Some(ctx) => ctx.decompress(block)?,
            None => return Err(FramingError::DecompressorInit),
        };
        HeaderBlock::decode(&raw)
    }

    fn deflate_block(&mut self, headers: &HeaderBlock) -> Result<Vec<u8>, FramingError> {
        let mut raw = Vec::new();
        headers.encode(&mut raw);
        if !self.compression {
            return Ok(raw);
        }
        if self.compressor.is_none() {
            match HeaderCompressor::new() {
                Ok(ctx) => self.compressor = Some(ctx),
                Err(code) => {
                    self.set_error(code);
                    return Err(code);
                }
            }
        }
        let result = match self.compressor.as_mut() {
            Some(ctx) => ctx.compress(&raw),
            None => Err(FramingError::CompressorInit),
        };
        if let Err(code) = result {
            // A failed compressor leaves the shared window undefined.
            self.set_error(code);
            return Err(code);
        }
        result
    }

    fn reset_for_next_frame(&mut self) {
        self.scratch.clear();
        self.current = None;
        self.remaining = 0;
        self.state = CodecState::ReadingCommonHeader;
    }

    fn set_error(&mut self, code: FramingError) {
        if self.state != CodecState::Error {
            self.state = CodecState::Error;
            self.error = Some(code);
            self.events.push_back(CodecEvent::Error(code));
        }
    }
}

fn fin_flag(fin: bool) -> u8 {
    if fin {
        FLAG_FIN
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_control_header, encode_data_header};

    fn test_headers() -> HeaderBlock {
        let mut headers = HeaderBlock::new();
        headers.insert("method", "GET");
        headers.insert("url", "/index.html");
        headers.insert("version", "HTTP/1.1");
        headers
    }

    fn drain(codec: &mut SpdyCodec) -> Vec<CodecEvent> {
        let mut events = Vec::new();
        while let Some(event) = codec.poll_event() {
            events.push(event);
        }
        events
    }

    #[test]
    fn syn_stream_round_trip_compressed() {
        let mut client = SpdyCodec::new();
        let mut server = SpdyCodec::new();
        let headers = test_headers();

        let wire = client.encode_syn_stream(1, 0, 2, false, &headers).unwrap();
        assert_eq!(server.feed(&wire), wire.len());

        match drain(&mut server).as_slice() {
            [CodecEvent::Control(ControlFrame::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                fin,
                headers: decoded,
            })] => {
                assert_eq!(*stream_id, 1);
                assert_eq!(*associated_stream_id, 0);
                assert_eq!(*priority, 2);
                assert!(!fin);
                assert_eq!(*decoded, headers);
            }
            events => panic!("unexpected events: {events:?}"),
        }
    }

    #[test]
    fn syn_reply_round_trip_uncompressed() {
        let mut a = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        let mut b = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        let headers = test_headers();

        let wire = a.encode_syn_reply(3, true, &headers).unwrap();
        assert_eq!(b.feed(&wire), wire.len());

        match drain(&mut b).as_slice() {
            [CodecEvent::Control(ControlFrame::SynReply {
                stream_id,
                fin,
                headers: decoded,
            })] => {
                assert_eq!(*stream_id, 3);
                assert!(*fin);
                assert_eq!(*decoded, headers);
            }
            events => panic!("unexpected events: {events:?}"),
        }
    }

    #[test]
    fn serialization_is_stable_without_compression() {
        // With compression off, re-encoding a decoded frame reproduces the
        // original bytes.
        let mut a = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        let headers = test_headers();
        let first = a.encode_syn_stream(1, 0, 1, true, &headers).unwrap();

        let mut b = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        b.feed(&first);
        let decoded = match b.poll_event() {
            Some(CodecEvent::Control(ControlFrame::SynStream {
                stream_id,
                associated_stream_id,
                priority,
                fin,
                headers,
            })) => (stream_id, associated_stream_id, priority, fin, headers),
            other => panic!("unexpected event: {other:?}"),
        };

        let mut c = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        let second = c
            .encode_syn_stream(decoded.0, decoded.1, decoded.2, decoded.3, &decoded.4)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rst_stream_round_trip() {
        let wire = SpdyCodec::encode_rst_stream(7, RstStatus::RefusedStream);
        let mut codec = SpdyCodec::new();
        assert_eq!(codec.feed(&wire), wire.len());
        assert_eq!(
            drain(&mut codec),
            vec![CodecEvent::Control(ControlFrame::RstStream {
                stream_id: 7,
                status: RstStatus::RefusedStream,
            })]
        );
    }

    #[test]
    fn nop_round_trip() {
        let wire = SpdyCodec::encode_nop();
        let mut codec = SpdyCodec::new();
        assert_eq!(codec.feed(&wire), wire.len());
        assert_eq!(drain(&mut codec), vec![CodecEvent::Control(ControlFrame::Nop)]);
    }

    #[test]
    fn data_frame_forwarded_in_chunks() {
        let wire = SpdyCodec::encode_data_frame(5, b"hello world", true, false);
        let mut codec = SpdyCodec::new();

        // Feed in two pieces that split the payload.
        let split = COMMON_HEADER_LEN + 4;
        codec.feed(&wire[..split]);
        codec.feed(&wire[split..]);

        assert_eq!(
            drain(&mut codec),
            vec![
                CodecEvent::StreamData {
                    stream_id: 5,
                    data: b"hell".to_vec(),
                },
                CodecEvent::StreamData {
                    stream_id: 5,
                    data: b"o world".to_vec(),
                },
                // FIN marker.
                CodecEvent::StreamData {
                    stream_id: 5,
                    data: Vec::new(),
                },
            ]
        );
    }

    #[test]
    fn byte_at_a_time_equals_one_shot() {
        let mut client = SpdyCodec::new();
        let headers = test_headers();
        let mut wire = client.encode_syn_stream(1, 0, 0, false, &headers).unwrap();
        wire.extend_from_slice(&SpdyCodec::encode_data_frame(1, b"payload", true, false));
        wire.extend_from_slice(&SpdyCodec::encode_rst_stream(3, RstStatus::Cancel));

        let mut one_shot = SpdyCodec::new();
        assert_eq!(one_shot.feed(&wire), wire.len());
        let expected = drain(&mut one_shot);

        let mut trickle = SpdyCodec::new();
        for byte in &wire {
            assert_eq!(trickle.feed(std::slice::from_ref(byte)), 1);
        }
        // Data chunks arrive byte by byte; join them per stream for
        // comparison.
        let got = coalesce_data(drain(&mut trickle));
        assert_eq!(got, coalesce_data(expected));
    }

    fn coalesce_data(events: Vec<CodecEvent>) -> Vec<CodecEvent> {
        let mut out: Vec<CodecEvent> = Vec::new();
        for event in events {
            match (&event, out.last_mut()) {
                (
                    CodecEvent::StreamData { stream_id, data },
                    Some(CodecEvent::StreamData {
                        stream_id: prev_id,
                        data: prev,
                    }),
                ) if stream_id == prev_id && !data.is_empty() && !prev.is_empty() => {
                    prev.extend_from_slice(data);
                }
                _ => out.push(event),
            }
        }
        out
    }

    #[test]
    fn oversize_control_payload_is_sticky() {
        let mut wire = Vec::new();
        encode_control_header(&mut wire, TYPE_SYN_STREAM, 0, DEFAULT_MAX_CONTROL_PAYLOAD + 1);
        wire.extend_from_slice(&[0; 16]);

        let mut codec = SpdyCodec::new();
        codec.feed(&wire);
        assert!(codec.has_error());
        assert_eq!(
            codec.error_code(),
            Some(FramingError::ControlPayloadTooLarge)
        );
        assert_eq!(
            drain(&mut codec),
            vec![CodecEvent::Error(FramingError::ControlPayloadTooLarge)]
        );
        // All subsequent feeds are no-ops.
        assert_eq!(codec.feed(&SpdyCodec::encode_nop()), 0);
        assert!(drain(&mut codec).is_empty());
    }

    #[test]
    fn unknown_control_type_rejected() {
        let mut wire = Vec::new();
        encode_control_header(&mut wire, 9, 0, 0);
        let mut codec = SpdyCodec::new();
        codec.feed(&wire);
        assert_eq!(codec.error_code(), Some(FramingError::InvalidControlFrame));
    }

    #[test]
    fn wrong_version_rejected() {
        let mut wire = Vec::new();
        let word = 0x8000_0000u32 | (3 << 16) | u32::from(TYPE_NOP);
        wire.extend_from_slice(&word.to_be_bytes());
        wire.extend_from_slice(&[0, 0, 0, 0]);
        let mut codec = SpdyCodec::new();
        codec.feed(&wire);
        assert_eq!(codec.error_code(), Some(FramingError::UnsupportedVersion));
    }

    #[test]
    fn rst_stream_with_wrong_length_rejected() {
        let mut wire = Vec::new();
        encode_control_header(&mut wire, TYPE_RST_STREAM, 0, 6);
        wire.extend_from_slice(&[0; 6]);
        let mut codec = SpdyCodec::new();
        codec.feed(&wire);
        assert_eq!(codec.error_code(), Some(FramingError::InvalidControlFrame));
    }

    #[test]
    fn duplicate_header_names_enter_error_state() {
        // Build a raw (uncompressed) SYN_REPLY whose block repeats a name.
        let mut block = Vec::new();
        block.extend_from_slice(&2u32.to_be_bytes());
        for _ in 0..2 {
            block.extend_from_slice(&1u32.to_be_bytes());
            block.push(b'a');
            block.extend_from_slice(&1u32.to_be_bytes());
            block.push(b'x');
        }
        let mut wire = Vec::new();
        encode_control_header(&mut wire, TYPE_SYN_REPLY, 0, SYN_REPLY_FIXED_LEN + block.len());
        wire.extend_from_slice(&1u32.to_be_bytes());
        wire.extend_from_slice(&[0, 0]);
        wire.extend_from_slice(&block);

        let mut codec = SpdyCodec::with_options(false, DEFAULT_MAX_CONTROL_PAYLOAD);
        codec.feed(&wire);
        assert_eq!(codec.error_code(), Some(FramingError::InvalidControlFrame));
    }

    #[test]
    fn corrupt_compressed_block_enters_error_state() {
        let mut wire = Vec::new();
        encode_control_header(&mut wire, TYPE_SYN_REPLY, 0, SYN_REPLY_FIXED_LEN + 4);
        wire.extend_from_slice(&1u32.to_be_bytes());
        wire.extend_from_slice(&[0, 0]);
        wire.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let mut codec = SpdyCodec::new();
        codec.feed(&wire);
        assert_eq!(codec.error_code(), Some(FramingError::Decompress));
    }

    #[test]
    fn data_on_stream_zero_is_ignored() {
        let mut wire = Vec::new();
        encode_data_header(&mut wire, 0, FLAG_FIN, 4);
        wire.extend_from_slice(b"junk");
        wire.extend_from_slice(&SpdyCodec::encode_nop());

        let mut codec = SpdyCodec::new();
        assert_eq!(codec.feed(&wire), wire.len());
        // The junk payload produced no events; the following NOP decoded
        // normally.
        assert_eq!(drain(&mut codec), vec![CodecEvent::Control(ControlFrame::Nop)]);
    }

    #[test]
    fn ignore_remaining_payload_suppresses_chunks() {
        let wire = SpdyCodec::encode_data_frame(9, b"abcdefgh", false, false);
        let mut codec = SpdyCodec::new();

        // First half of the payload arrives and is forwarded.
        codec.feed(&wire[..COMMON_HEADER_LEN + 4]);
        assert_eq!(
            drain(&mut codec),
            vec![CodecEvent::StreamData {
                stream_id: 9,
                data: b"abcd".to_vec(),
            }]
        );

        // Session decides the stream is unknown; the rest is swallowed.
        codec.ignore_remaining_payload(9);
        codec.feed(&wire[COMMON_HEADER_LEN + 4..]);
        assert!(drain(&mut codec).is_empty());

        // A mismatched id does nothing.
        codec.ignore_remaining_payload(9);

        // The codec is back in sync for the next frame.
        let nop = SpdyCodec::encode_nop();
        codec.feed(&nop);
        assert_eq!(drain(&mut codec), vec![CodecEvent::Control(ControlFrame::Nop)]);
    }

    #[test]
    fn compression_state_spans_frames() {
        let mut client = SpdyCodec::new();
        let mut server = SpdyCodec::new();
        let headers = test_headers();

        let first = client.encode_syn_stream(1, 0, 0, false, &headers).unwrap();
        let second = client.encode_syn_stream(3, 0, 0, false, &headers).unwrap();
        // Cross-frame window: the repeat costs fewer bytes.
        assert!(second.len() < first.len());

        server.feed(&first);
        server.feed(&second);
        let events = drain(&mut server);
        assert_eq!(events.len(), 2);
        for (event, expected_id) in events.iter().zip([1u32, 3]) {
            match event {
                CodecEvent::Control(ControlFrame::SynStream {
                    stream_id,
                    headers: decoded,
                    ..
                }) => {
                    assert_eq!(*stream_id, expected_id);
                    assert_eq!(*decoded, headers);
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn empty_fin_data_frame_emits_end_marker() {
        let wire = SpdyCodec::encode_data_frame(2, b"", true, false);
        let mut codec = SpdyCodec::new();
        assert_eq!(codec.feed(&wire), wire.len());
        assert_eq!(
            drain(&mut codec),
            vec![CodecEvent::StreamData {
                stream_id: 2,
                data: Vec::new(),
            }]
        );
    }

    #[test]
    fn reset_discards_partial_frame() {
        let wire = SpdyCodec::encode_data_frame(4, b"abcdef", false, false);
        let mut codec = SpdyCodec::new();
        codec.feed(&wire[..COMMON_HEADER_LEN + 2]);
        drain(&mut codec);
        codec.reset();

        let nop = SpdyCodec::encode_nop();
        codec.feed(&nop);
        assert_eq!(drain(&mut codec), vec![CodecEvent::Control(ControlFrame::Nop)]);
    }
}
