use std::io;

use thiserror::Error;

use spindle_framing::FramingError;

/// Errors that terminate a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer violated the protocol or a compression context failed. The
    /// connection is no longer parseable and must be dropped.
    #[error("protocol error: {0}")]
    Protocol(#[from] FramingError),
    /// The underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Returned to a stream task whose stream was reset or abandoned. The task
/// should stop producing output and return; the session has already
/// discarded anything it queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stream was reset")]
pub struct StreamReset;
