//! Multiplexed SPDY/2 session runtime.
//!
//! Pairs the sans-IO [`spindle_framing`] codec with a connection: each
//! accepted connection gets a [`Session`] that owns the transport and the
//! codec, accepts peer-initiated streams, and dispatches one application
//! task per stream onto a shared [`Executor`]. Tasks interact with their
//! stream through [`StreamRef`]: blocking reads of request data, queued
//! writes of response frames. The session's I/O thread serializes all
//! frames, so the codec's shared compression window stays sequential
//! without locking.
//!
//! Typical server shape:
//!
//! ```no_run
//! use std::net::TcpListener;
//! use std::sync::Arc;
//!
//! use spindle_session::{
//!     BufferedTransport, Executor, Session, SessionConfig, StreamRef, StreamTask,
//!     StreamTaskFactory,
//! };
//! use spindle_framing::HeaderBlock;
//!
//! struct Hello;
//!
//! impl StreamTask for Hello {
//!     fn run(self: Box<Self>, stream: StreamRef) {
//!         // Drain the request body.
//!         while stream.read_data().is_some() {}
//!         let mut headers = HeaderBlock::new();
//!         headers.insert("status", "200 OK");
//!         headers.insert("version", "HTTP/1.1");
//!         let _ = stream.send_reply(headers, false);
//!         let _ = stream.send_data(b"hello".to_vec(), true);
//!     }
//! }
//!
//! struct HelloFactory;
//!
//! impl StreamTaskFactory for HelloFactory {
//!     fn new_task(&self) -> Box<dyn StreamTask> {
//!         Box::new(Hello)
//!     }
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     let executor = Arc::new(Executor::new(8));
//!     let listener = TcpListener::bind("127.0.0.1:9000")?;
//!     for conn in listener.incoming() {
//!         let conn = conn?;
//!         let config = SessionConfig::default();
//!         let transport = BufferedTransport::new(conn, config.read_chunk_size);
//!         let executor = Arc::clone(&executor);
//!         std::thread::spawn(move || {
//!             let mut session = Session::new(transport, config, executor, HelloFactory);
//!             let _ = session.run();
//!         });
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod io;
pub mod session;
pub mod stream;

pub use config::SessionConfig;
pub use error::{SessionError, StreamReset};
pub use executor::Executor;
pub use io::{BufferedTransport, ReadMode, ReadOutcome, SessionStream, Transport};
pub use session::{Session, StreamTask, StreamTaskFactory};
pub use stream::{StreamRef, StreamState};
