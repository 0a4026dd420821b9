use thiserror::Error;

/// Errors produced by the SPDY framing layer.
///
/// Every variant is terminal for the codec that raised it: frame boundaries
/// and the shared compression window cannot be trusted after a failure, so
/// the codec refuses all further input and the session must close the
/// connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Control frame is malformed (bad type, bad fixed payload size, or a
    /// header block with empty, duplicate, or out-of-order names).
    #[error("malformed control frame")]
    InvalidControlFrame,
    /// Declared control frame payload exceeds the configured limit.
    #[error("control frame payload too large")]
    ControlPayloadTooLarge,
    /// Control frame carries a protocol version other than SPDY/2.
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    /// The compression context could not be set up.
    #[error("compressor initialization failed")]
    CompressorInit,
    /// The decompression context could not be set up.
    #[error("decompressor initialization failed")]
    DecompressorInit,
    /// A header block failed to decompress.
    #[error("header block decompression failed")]
    Decompress,
    /// A header block failed to compress while serializing.
    #[error("header block compression failed")]
    Compress,
}
