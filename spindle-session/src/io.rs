//! Transport abstraction between the session loop and the network.
//!
//! The session never touches a socket directly: it reads and writes through
//! [`Transport`], which keeps the loop testable against scripted byte
//! streams. [`BufferedTransport`] adapts any [`SessionStream`] (e.g. a
//! `TcpStream`) and adds a read-ahead buffer so short frames do not cost
//! one syscall each.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use bytes::{Buf, BytesMut};

/// How a [`Transport::read`] call should behave when no bytes are ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Wait for bytes. Used when the session has no live streams and
    /// nothing to do but wait for the peer.
    Blocking,
    /// Return [`ReadOutcome::WouldBlock`] immediately so the session can go
    /// flush stream output instead. Must never wait: a live stream may
    /// have a reply queued that only the session thread can write.
    NonBlocking,
}

/// Result of a [`Transport::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were written into the buffer. Never zero.
    Read(usize),
    /// No bytes were ready.
    WouldBlock,
    /// The peer closed the connection.
    Closed,
}

/// Byte transport for one session.
pub trait Transport {
    /// Read up to `buf.len()` bytes, honoring `mode`: a
    /// [`ReadMode::NonBlocking`] read returns
    /// [`ReadOutcome::WouldBlock`] rather than waiting.
    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> io::Result<ReadOutcome>;

    /// Write the whole buffer, blocking as needed.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

/// Byte streams usable under [`BufferedTransport`]: `Read + Write` plus
/// the ability to switch the read side between blocking and non-blocking,
/// which is what lets the session loop alternate between waiting for the
/// peer and draining queued stream output.
pub trait SessionStream: Read + Write {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

impl SessionStream for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

#[cfg(unix)]
impl SessionStream for std::os::unix::net::UnixStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        std::os::unix::net::UnixStream::set_nonblocking(self, nonblocking)
    }
}

/// A [`Transport`] over a [`SessionStream`] with a read-ahead buffer.
///
/// Each underlying read fills an internal buffer of `chunk_size` bytes;
/// subsequent reads are served from the buffer until it drains. The inner
/// stream is flipped between blocking and non-blocking lazily, tracking
/// the requested [`ReadMode`]; writes always run in blocking mode so
/// `write_all` cannot spuriously fail with `WouldBlock`.
pub struct BufferedTransport<S> {
    inner: S,
    buffer: BytesMut,
    chunk_size: usize,
    /// Last mode applied to the inner stream; `None` until the first call.
    nonblocking: Option<bool>,
}

impl<S: SessionStream> BufferedTransport<S> {
    pub fn new(inner: S, chunk_size: usize) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            nonblocking: None,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn set_mode(&mut self, nonblocking: bool) -> io::Result<()> {
        if self.nonblocking != Some(nonblocking) {
            self.inner.set_nonblocking(nonblocking)?;
            self.nonblocking = Some(nonblocking);
        }
        Ok(())
    }

    fn fill_buffer(&mut self) -> io::Result<ReadOutcome> {
        self.buffer.resize(self.chunk_size, 0);
        match self.inner.read(&mut self.buffer) {
            Ok(0) => {
                self.buffer.clear();
                Ok(ReadOutcome::Closed)
            }
            Ok(n) => {
                self.buffer.truncate(n);
                Ok(ReadOutcome::Read(n))
            }
            // Read timeouts surface as WouldBlock or TimedOut depending on
            // the platform.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                ) =>
            {
                self.buffer.clear();
                Ok(ReadOutcome::WouldBlock)
            }
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }
}

impl<S: SessionStream> Transport for BufferedTransport<S> {
    fn read(&mut self, buf: &mut [u8], mode: ReadMode) -> io::Result<ReadOutcome> {
        if self.buffer.is_empty() {
            self.set_mode(mode == ReadMode::NonBlocking)?;
            match self.fill_buffer()? {
                ReadOutcome::Read(_) => {}
                outcome => return Ok(outcome),
            }
        }
        let n = buf.len().min(self.buffer.len());
        buf[..n].copy_from_slice(&self.buffer[..n]);
        self.buffer.advance(n);
        Ok(ReadOutcome::Read(n))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.set_mode(false)?;
        self.inner.write_all(buf)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Sink;

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for Sink {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl SessionStream for Sink {
        fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
            Ok(())
        }
    }

    struct ReadOnly<R>(R);

    impl<R: Read> Read for ReadOnly<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl<R> Write for ReadOnly<R> {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "read-only"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<R: Read> SessionStream for ReadOnly<R> {
        fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn serves_small_reads_from_buffer() {
        let data: Vec<u8> = (0..32).collect();
        let mut transport = BufferedTransport::new(ReadOnly(Cursor::new(data.clone())), 16);

        let mut out = Vec::new();
        let mut buf = [0u8; 5];
        loop {
            match transport.read(&mut buf, ReadMode::Blocking).unwrap() {
                ReadOutcome::Read(n) => out.extend_from_slice(&buf[..n]),
                ReadOutcome::Closed => break,
                ReadOutcome::WouldBlock => panic!("cursor never blocks"),
            }
        }
        assert_eq!(out, data);
    }

    #[test]
    fn eof_reported_as_closed() {
        let mut transport = BufferedTransport::new(ReadOnly(Cursor::new(Vec::new())), 16);
        let mut buf = [0u8; 4];
        assert_eq!(
            transport.read(&mut buf, ReadMode::NonBlocking).unwrap(),
            ReadOutcome::Closed
        );
    }

    #[test]
    fn read_larger_than_buffer_is_capped() {
        let data = vec![7u8; 100];
        let mut transport = BufferedTransport::new(ReadOnly(Cursor::new(data)), 16);
        let mut buf = [0u8; 64];
        assert_eq!(
            transport.read(&mut buf, ReadMode::Blocking).unwrap(),
            ReadOutcome::Read(16)
        );
    }

    struct WouldBlockOnce {
        blocked: bool,
    }

    impl Read for WouldBlockOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.blocked {
                self.blocked = false;
                Err(io::Error::new(io::ErrorKind::WouldBlock, "not ready"))
            } else {
                buf[0] = 42;
                Ok(1)
            }
        }
    }

    impl Write for WouldBlockOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SessionStream for WouldBlockOnce {
        fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn would_block_is_not_an_error() {
        let mut transport = BufferedTransport::new(WouldBlockOnce { blocked: true }, 16);
        let mut buf = [0u8; 4];
        assert_eq!(
            transport.read(&mut buf, ReadMode::NonBlocking).unwrap(),
            ReadOutcome::WouldBlock
        );
        assert_eq!(
            transport.read(&mut buf, ReadMode::NonBlocking).unwrap(),
            ReadOutcome::Read(1)
        );
        assert_eq!(buf[0], 42);
    }

    #[test]
    fn write_all_passes_through() {
        let mut transport = BufferedTransport::new(Sink, 16);
        transport.write_all(b"frame bytes").unwrap();
    }

    /// Stream that records mode switches and only yields data while
    /// blocking; a non-blocking read signals WouldBlock, like a socket.
    struct ModeTracking {
        nonblocking: bool,
        switches: Vec<bool>,
        data: Vec<u8>,
    }

    impl Read for ModeTracking {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.nonblocking {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "not ready"));
            }
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    impl Write for ModeTracking {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            assert!(!self.nonblocking, "writes must run in blocking mode");
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SessionStream for ModeTracking {
        fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
            self.nonblocking = nonblocking;
            self.switches.push(nonblocking);
            Ok(())
        }
    }

    #[test]
    fn read_mode_is_applied_to_the_inner_stream() {
        let stream = ModeTracking {
            nonblocking: false,
            switches: Vec::new(),
            data: b"abcd".to_vec(),
        };
        let mut transport = BufferedTransport::new(stream, 16);
        let mut buf = [0u8; 16];

        // A non-blocking read on a blocking socket must not hang: the
        // adapter flips the socket first and surfaces WouldBlock.
        assert_eq!(
            transport.read(&mut buf, ReadMode::NonBlocking).unwrap(),
            ReadOutcome::WouldBlock
        );
        assert_eq!(
            transport.read(&mut buf, ReadMode::Blocking).unwrap(),
            ReadOutcome::Read(4)
        );
        // Writes force blocking mode again.
        transport.read(&mut buf, ReadMode::NonBlocking).unwrap();
        transport.write_all(b"reply").unwrap();
        assert_eq!(transport.inner.switches, vec![true, false, true, false]);
    }

    #[test]
    fn repeated_reads_in_one_mode_switch_once() {
        let stream = ModeTracking {
            nonblocking: false,
            switches: Vec::new(),
            data: Vec::new(),
        };
        let mut transport = BufferedTransport::new(stream, 16);
        let mut buf = [0u8; 4];
        for _ in 0..3 {
            transport.read(&mut buf, ReadMode::NonBlocking).unwrap();
        }
        assert_eq!(transport.inner.switches, vec![true]);
    }
}
