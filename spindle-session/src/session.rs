//! The per-connection session loop.
//!
//! One session owns one transport and one codec, and runs entirely on the
//! calling thread. Stream application logic runs on the shared
//! [`Executor`](crate::Executor); the session thread is the only thing that
//! touches the codec, which is what keeps the shared compression window
//! sequential without a lock around it.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace, warn};

use spindle_framing::frame::MAX_FRAME_PAYLOAD;
use spindle_framing::{CodecEvent, ControlFrame, HeaderBlock, RstStatus, SpdyCodec};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::executor::Executor;
use crate::io::{ReadMode, ReadOutcome, Transport};
use crate::stream::{OutboundFrame, OutputSignal, Stream, StreamRef};

/// Application logic for one stream. Runs on an executor worker; blocks on
/// [`StreamRef::read_data`] for request data and queues response frames.
pub trait StreamTask: Send {
    fn run(self: Box<Self>, stream: StreamRef);
}

/// Creates one [`StreamTask`] per accepted stream.
pub trait StreamTaskFactory: Send + Sync {
    fn new_task(&self) -> Box<dyn StreamTask>;
}

impl<F> StreamTask for F
where
    F: FnOnce(StreamRef) + Send,
{
    fn run(self: Box<Self>, stream: StreamRef) {
        self(stream)
    }
}

/// A server-side SPDY/2 session over one connection.
pub struct Session<T, F> {
    transport: T,
    codec: SpdyCodec,
    config: SessionConfig,
    executor: Arc<Executor>,
    factory: F,
    streams: HashMap<u32, Stream>,
    output_signal: Arc<OutputSignal>,
    /// Highest client stream id accepted so far; ids must be odd and
    /// strictly increasing.
    highest_accepted_id: u32,
    read_buf: Vec<u8>,
}

impl<T: Transport, F: StreamTaskFactory> Session<T, F> {
    pub fn new(transport: T, config: SessionConfig, executor: Arc<Executor>, factory: F) -> Self {
        let codec = SpdyCodec::with_options(config.compression, config.max_control_payload);
        let read_buf = vec![0; config.read_chunk_size];
        Self {
            transport,
            codec,
            config,
            executor,
            factory,
            streams: HashMap::new(),
            output_signal: Arc::new(OutputSignal::new()),
            highest_accepted_id: 0,
            read_buf,
        }
    }

    /// Drive the session until the connection closes or fails. Blocks the
    /// calling thread for the life of the connection.
    ///
    /// On return, all remaining streams have been reset so their tasks
    /// unblock and terminate; the tasks themselves may still be winding
    /// down on the executor.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let result = self.drive();
        self.teardown();
        if let Err(e) = &result {
            debug!("session ended with error: {e}");
        } else {
            trace!("session ended cleanly");
        }
        result
    }

    fn drive(&mut self) -> Result<(), SessionError> {
        loop {
            self.flush_outbound()?;
            self.reap_closed();

            // With no live streams there is nothing to flush, so a blocking
            // read is safe; otherwise stay responsive to stream output.
            let mode = if self.streams.is_empty() {
                ReadMode::Blocking
            } else {
                ReadMode::NonBlocking
            };
            match self.transport.read(&mut self.read_buf, mode)? {
                ReadOutcome::Read(n) => {
                    let fed = self.codec.feed(&self.read_buf[..n]);
                    trace!("read {n} bytes, codec consumed {fed}");
                    self.handle_events()?;
                }
                ReadOutcome::WouldBlock => {
                    self.output_signal.wait_timeout(self.config.output_poll_interval);
                }
                ReadOutcome::Closed => {
                    trace!("transport closed by peer");
                    return Ok(());
                }
            }
        }
    }

    fn handle_events(&mut self) -> Result<(), SessionError> {
        while let Some(event) = self.codec.poll_event() {
            match event {
                CodecEvent::Control(ControlFrame::SynStream {
                    stream_id,
                    associated_stream_id,
                    priority,
                    fin,
                    headers,
                }) => self.accept_stream(stream_id, associated_stream_id, priority, fin, headers)?,
                CodecEvent::Control(ControlFrame::SynReply { stream_id, .. }) => {
                    // Clients do not send SYN_REPLY.
                    if self.streams.contains_key(&stream_id) {
                        warn!("unexpected SYN_REPLY on stream {stream_id}");
                        self.reset_stream(stream_id, RstStatus::ProtocolError)?;
                    }
                }
                CodecEvent::Control(ControlFrame::RstStream { stream_id, status }) => {
                    if let Some(stream) = self.streams.get(&stream_id) {
                        debug!("peer reset stream {stream_id}: {status:?}");
                        stream.reset();
                    }
                    // Unknown ids are ignored: the stream may have been
                    // reaped already.
                }
                CodecEvent::Control(ControlFrame::Nop) => {}
                CodecEvent::StreamData { stream_id, data } => {
                    self.handle_data(stream_id, data)?;
                }
                CodecEvent::Error(code) => {
                    warn!("protocol error, dropping connection: {code}");
                    return Err(code.into());
                }
            }
        }
        Ok(())
    }

    fn accept_stream(
        &mut self,
        stream_id: u32,
        associated_stream_id: u32,
        priority: u8,
        fin: bool,
        headers: HeaderBlock,
    ) -> Result<(), SessionError> {
        // Client-initiated ids are odd and strictly increasing. A repeat or
        // regression is a protocol violation on that stream, not the
        // session.
        if stream_id % 2 == 0 || stream_id <= self.highest_accepted_id {
            warn!("rejecting invalid stream id {stream_id}");
            return self.send_rst(stream_id, RstStatus::ProtocolError);
        }
        if self.streams.len() >= self.config.max_concurrent_streams {
            debug!("refusing stream {stream_id}: at concurrency limit");
            return self.send_rst(stream_id, RstStatus::RefusedStream);
        }

        self.highest_accepted_id = stream_id;
        let stream = Stream::new(
            stream_id,
            associated_stream_id,
            priority,
            self.config.max_stream_input_buffer,
        );
        stream.open(fin);
        debug!("accepted stream {stream_id} (priority {priority}, fin {fin})");

        let task = self.factory.new_task();
        let task_ref = stream.task_ref(headers, Arc::clone(&self.output_signal));
        self.streams.insert(stream_id, stream);
        self.executor.execute(move || {
            let done = task_ref.clone();
            task.run(task_ref);
            done.mark_task_finished();
        });
        Ok(())
    }

    fn handle_data(&mut self, stream_id: u32, data: Vec<u8>) -> Result<(), SessionError> {
        match self.streams.get(&stream_id) {
            Some(stream) if !stream.is_reset() => {
                if data.is_empty() {
                    // End-of-stream marker from a FIN-flagged data frame.
                    stream.close_input();
                } else if !stream.push_input(data) {
                    // The task is not draining its input and the peer keeps
                    // sending. Drop the stream rather than buffer without
                    // bound.
                    warn!("stream {stream_id} inbound buffer overrun, resetting");
                    self.codec.ignore_remaining_payload(stream_id);
                    self.reset_stream(stream_id, RstStatus::FlowControlError)?;
                }
            }
            _ => {
                // Unknown or already-reset stream: swallow the rest of the
                // frame without buffering it.
                trace!("discarding data for stream {stream_id}");
                self.codec.ignore_remaining_payload(stream_id);
            }
        }
        Ok(())
    }

    /// Send RST_STREAM and tear down local state for `stream_id`, if any.
    fn reset_stream(&mut self, stream_id: u32, status: RstStatus) -> Result<(), SessionError> {
        if let Some(stream) = self.streams.get(&stream_id) {
            stream.reset();
        }
        self.send_rst(stream_id, status)
    }

    fn send_rst(&mut self, stream_id: u32, status: RstStatus) -> Result<(), SessionError> {
        let frame = SpdyCodec::encode_rst_stream(stream_id, status);
        self.transport.write_all(&frame)?;
        Ok(())
    }

    /// Serialize and write every queued outbound frame, draining streams in
    /// priority order (0 first, stream id as tie-break). Frames for one
    /// stream keep the order the task produced them.
    fn flush_outbound(&mut self) -> Result<(), SessionError> {
        let mut ready: Vec<(u8, u32)> = self
            .streams
            .values()
            .filter(|s| s.has_output())
            .map(|s| (s.priority, s.id))
            .collect();
        if ready.is_empty() {
            return Ok(());
        }
        ready.sort_unstable();

        for (_, stream_id) in ready {
            let frames = match self.streams.get(&stream_id) {
                Some(stream) => stream.take_output(),
                None => continue,
            };
            for frame in frames {
                match frame {
                    OutboundFrame::Reply { headers, fin } => {
                        let wire = self.codec.encode_syn_reply(stream_id, fin, &headers)?;
                        self.transport.write_all(&wire)?;
                    }
                    OutboundFrame::Data { data, fin } => {
                        self.write_data_frames(stream_id, &data, fin)?;
                    }
                    OutboundFrame::Rst { status } => {
                        debug!("stream {stream_id} aborted by task: {status:?}");
                        self.send_rst(stream_id, status)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Write a data payload, split across frames at the 24-bit length
    /// ceiling. FIN goes on the last frame only.
    fn write_data_frames(
        &mut self,
        stream_id: u32,
        data: &[u8],
        fin: bool,
    ) -> Result<(), SessionError> {
        if data.is_empty() {
            let wire = SpdyCodec::encode_data_frame(stream_id, data, fin, false);
            self.transport.write_all(&wire)?;
            return Ok(());
        }
        let mut chunks = data.chunks(MAX_FRAME_PAYLOAD).peekable();
        while let Some(chunk) = chunks.next() {
            let last = chunks.peek().is_none();
            let wire = SpdyCodec::encode_data_frame(stream_id, chunk, fin && last, false);
            self.transport.write_all(&wire)?;
        }
        Ok(())
    }

    fn reap_closed(&mut self) {
        self.streams.retain(|id, stream| {
            let reap = stream.reapable();
            if reap {
                trace!("reaping stream {id}");
            }
            !reap
        });
    }

    /// Reset every remaining stream so blocked tasks wake up and return.
    fn teardown(&mut self) {
        for stream in self.streams.values() {
            stream.reset();
        }
        self.streams.clear();
    }
}
