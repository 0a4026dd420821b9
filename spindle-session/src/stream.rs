//! Per-stream state and the task-facing stream handle.
//!
//! Each stream owns its own `Mutex` + `Condvar`, so contention on one
//! stream never stalls another. The session thread is the only lifecycle
//! mutator; worker tasks see the stream only through [`StreamRef`], which
//! exposes blocking input reads and outbound frame queueing.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use spindle_framing::{HeaderBlock, RstStatus};

use crate::error::StreamReset;

/// Lifecycle state, driven by the session thread only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Allocated but not yet announced to the task.
    Created,
    /// Both directions open.
    Open,
    /// We sent FIN; the peer may still send data.
    HalfClosedLocal,
    /// The peer sent FIN; we may still send data.
    HalfClosedRemote,
    /// Both halves closed, or the stream was reset.
    Closed,
}

/// An outbound frame queued by a stream task, not yet serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Reply { headers: HeaderBlock, fin: bool },
    Data { data: Vec<u8>, fin: bool },
    Rst { status: RstStatus },
}

impl OutboundFrame {
    fn is_fin(&self) -> bool {
        match self {
            OutboundFrame::Reply { fin, .. } | OutboundFrame::Data { fin, .. } => *fin,
            OutboundFrame::Rst { .. } => false,
        }
    }
}

struct StreamInner {
    state: StreamState,
    reset: bool,
    /// Inbound data chunks not yet consumed by the task.
    input: VecDeque<Vec<u8>>,
    input_bytes: usize,
    /// Remote direction finished; `read_data` returns `None` once the
    /// queue drains.
    input_closed: bool,
    /// Outbound frames not yet flushed by the session.
    output: VecDeque<OutboundFrame>,
    /// The worker task has returned; the session may reap the stream once
    /// it is also Closed.
    task_finished: bool,
}

struct Shared {
    inner: Mutex<StreamInner>,
    /// Signaled when input arrives or the stream is reset/finished.
    input_ready: Condvar,
}

/// Wakes the session's I/O thread when any stream queues output.
///
/// One signal is shared by all streams of a session. The session waits on
/// it with a timeout instead of busy-polling the transport.
pub(crate) struct OutputSignal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl OutputSignal {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn notify(&self) {
        *lock(&self.pending) = true;
        self.cond.notify_one();
    }

    /// Wait until notified or the timeout elapses, then clear the flag.
    /// Returns whether a notification arrived.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut pending = lock(&self.pending);
        if !*pending {
            let (guard, _result) = self
                .cond
                .wait_timeout(pending, timeout)
                .unwrap_or_else(|e| e.into_inner());
            pending = guard;
        }
        let was_pending = *pending;
        *pending = false;
        was_pending
    }
}

/// Session-side handle: owns the stream's identity and drives lifecycle.
pub(crate) struct Stream {
    pub(crate) id: u32,
    pub(crate) associated_id: u32,
    pub(crate) priority: u8,
    /// Cap on buffered inbound bytes; `push_input` refuses past it.
    input_limit: usize,
    shared: Arc<Shared>,
}

impl Stream {
    pub(crate) fn new(id: u32, associated_id: u32, priority: u8, input_limit: usize) -> Self {
        Self {
            id,
            associated_id,
            priority,
            input_limit,
            shared: Arc::new(Shared {
                inner: Mutex::new(StreamInner {
                    state: StreamState::Created,
                    reset: false,
                    input: VecDeque::new(),
                    input_bytes: 0,
                    input_closed: false,
                    output: VecDeque::new(),
                    task_finished: false,
                }),
                input_ready: Condvar::new(),
            }),
        }
    }

    /// Task-facing handle for dispatch to the executor.
    pub(crate) fn task_ref(
        &self,
        request_headers: HeaderBlock,
        output_signal: Arc<OutputSignal>,
    ) -> StreamRef {
        StreamRef {
            id: self.id,
            associated_id: self.associated_id,
            priority: self.priority,
            request_headers,
            shared: Arc::clone(&self.shared),
            output_signal,
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        lock(&self.shared.inner).state
    }

    pub(crate) fn open(&self, remote_fin: bool) {
        let mut inner = lock(&self.shared.inner);
        inner.state = if remote_fin {
            inner.input_closed = true;
            StreamState::HalfClosedRemote
        } else {
            StreamState::Open
        };
        if remote_fin {
            self.shared.input_ready.notify_all();
        }
    }

    /// Append a chunk from the peer and wake the task. Returns false when
    /// the chunk would push the buffered inbound bytes past the stream's
    /// limit; the chunk is dropped and the session resets the stream.
    pub(crate) fn push_input(&self, data: Vec<u8>) -> bool {
        let mut inner = lock(&self.shared.inner);
        if inner.input_closed || inner.reset {
            return true;
        }
        if inner.input_bytes + data.len() > self.input_limit {
            return false;
        }
        inner.input_bytes += data.len();
        inner.input.push_back(data);
        self.shared.input_ready.notify_all();
        true
    }

    /// Remote FIN: no more input will arrive.
    pub(crate) fn close_input(&self) {
        let mut inner = lock(&self.shared.inner);
        inner.input_closed = true;
        inner.state = match inner.state {
            StreamState::HalfClosedLocal | StreamState::Closed => StreamState::Closed,
            _ => StreamState::HalfClosedRemote,
        };
        self.shared.input_ready.notify_all();
    }

    /// Drain queued outbound frames for serialization. Frames come out in
    /// the order the task produced them. A frame carrying FIN closes the
    /// local half.
    pub(crate) fn take_output(&self) -> Vec<OutboundFrame> {
        let mut inner = lock(&self.shared.inner);
        let frames: Vec<OutboundFrame> = inner.output.drain(..).collect();
        for frame in &frames {
            if frame.is_fin() {
                inner.state = match inner.state {
                    StreamState::HalfClosedRemote | StreamState::Closed => StreamState::Closed,
                    _ => StreamState::HalfClosedLocal,
                };
            }
            if matches!(frame, OutboundFrame::Rst { .. }) {
                inner.state = StreamState::Closed;
                inner.reset = true;
            }
        }
        if inner.reset {
            self.shared.input_ready.notify_all();
        }
        frames
    }

    pub(crate) fn has_output(&self) -> bool {
        !lock(&self.shared.inner).output.is_empty()
    }

    /// Reset the stream: immediate Closed, buffered output discarded, task
    /// woken so it can observe the reset and return.
    pub(crate) fn reset(&self) {
        let mut inner = lock(&self.shared.inner);
        inner.reset = true;
        inner.state = StreamState::Closed;
        inner.input_closed = true;
        inner.input.clear();
        inner.input_bytes = 0;
        inner.output.clear();
        self.shared.input_ready.notify_all();
    }

    pub(crate) fn is_reset(&self) -> bool {
        lock(&self.shared.inner).reset
    }

    /// Closed and the task has returned: safe to drop from the session map.
    pub(crate) fn reapable(&self) -> bool {
        let inner = lock(&self.shared.inner);
        inner.state == StreamState::Closed && inner.task_finished && inner.output.is_empty()
    }
}

/// The handle a stream task works with.
///
/// Cloning is cheap; all clones share the same stream. Input reads block on
/// the stream's condvar; output methods queue frames and wake the session.
#[derive(Clone)]
pub struct StreamRef {
    id: u32,
    associated_id: u32,
    priority: u8,
    request_headers: HeaderBlock,
    shared: Arc<Shared>,
    output_signal: Arc<OutputSignal>,
}

impl StreamRef {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Id of the stream this one is associated with, or 0 for none.
    pub fn associated_id(&self) -> u32 {
        self.associated_id
    }

    /// Priority from the SYN_STREAM, 0 (highest) through 3.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// The request header block that opened this stream.
    pub fn request_headers(&self) -> &HeaderBlock {
        &self.request_headers
    }

    /// Blocking pop of the next inbound data chunk. Returns `None` once
    /// the peer finished its half or the stream was reset.
    pub fn read_data(&self) -> Option<Vec<u8>> {
        let mut inner = lock(&self.shared.inner);
        loop {
            if inner.reset {
                return None;
            }
            if let Some(chunk) = inner.input.pop_front() {
                inner.input_bytes -= chunk.len();
                return Some(chunk);
            }
            if inner.input_closed {
                return None;
            }
            inner = self
                .shared
                .input_ready
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Queue a SYN_REPLY carrying the response headers.
    pub fn send_reply(&self, headers: HeaderBlock, fin: bool) -> Result<(), StreamReset> {
        self.queue(OutboundFrame::Reply { headers, fin })
    }

    /// Queue a data frame. Oversize payloads are split across frames when
    /// serialized, so any length is accepted here.
    pub fn send_data(&self, data: Vec<u8>, fin: bool) -> Result<(), StreamReset> {
        self.queue(OutboundFrame::Data { data, fin })
    }

    /// Abort the stream: queue RST_STREAM for the peer and tear the stream
    /// down locally. The task should return soon after.
    pub fn send_rst(&self, status: RstStatus) -> Result<(), StreamReset> {
        self.queue(OutboundFrame::Rst { status })
    }

    /// Whether the stream has been reset. Long-running tasks check this
    /// between work units so cancellation is prompt.
    pub fn is_reset(&self) -> bool {
        lock(&self.shared.inner).reset
    }

    fn queue(&self, frame: OutboundFrame) -> Result<(), StreamReset> {
        let mut inner = lock(&self.shared.inner);
        if inner.reset || inner.state == StreamState::Closed {
            return Err(StreamReset);
        }
        inner.output.push_back(frame);
        drop(inner);
        self.output_signal.notify();
        Ok(())
    }

    /// Called by the dispatch wrapper when the task returns.
    pub(crate) fn mark_task_finished(&self) {
        let mut inner = lock(&self.shared.inner);
        inner.task_finished = true;
        drop(inner);
        // The session may be waiting to reap.
        self.output_signal.notify();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
