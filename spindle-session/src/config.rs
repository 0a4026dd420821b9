use std::time::Duration;

use spindle_framing::codec::DEFAULT_MAX_CONTROL_PAYLOAD;

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of concurrently active streams. SYN_STREAMs beyond
    /// this limit are refused with RST_STREAM REFUSED_STREAM.
    pub max_concurrent_streams: usize,
    /// Cap on control frame payloads. Frames declaring a larger payload
    /// poison the connection.
    pub max_control_payload: usize,
    /// Whether header blocks are zlib-compressed. Both peers must agree;
    /// this exists mainly so tests can inspect wire bytes.
    pub compression: bool,
    /// Size of the buffer handed to each transport read.
    pub read_chunk_size: usize,
    /// Cap on inbound data buffered per stream while the task catches up.
    /// A peer that overruns it gets RST_STREAM FLOW_CONTROL_ERROR.
    pub max_stream_input_buffer: usize,
    /// How long the session loop sleeps waiting for stream output when the
    /// transport has nothing to read.
    pub output_poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 100,
            max_control_payload: DEFAULT_MAX_CONTROL_PAYLOAD,
            compression: true,
            read_chunk_size: 4096,
            max_stream_input_buffer: 1024 * 1024,
            output_poll_interval: Duration::from_millis(10),
        }
    }
}
