use std::io::{self, Read, Write};
use std::net::SocketAddr;

use bytes::BytesMut;

use crate::http::parser::is_complete;
use crate::http::response::Response;
use crate::http::writer::{ResponseWriter, WriteProgress};

/// One client connection occupying a slot in the connection table.
///
/// The buffer never holds more than `capacity - 1` bytes. Each connection
/// serves exactly one request; after the response is flushed (or the peer
/// goes away) the owner frees the slot.
pub struct Connection<S> {
    stream: S,
    peer: Option<SocketAddr>,
    buffer: BytesMut,
    capacity: usize,
    request_complete: bool,
    state: ConnectionState,
}

/// Per-connection state.
///
/// ```text
///   Accepted ──read──▶ Reading ──boundary / full──▶ Writing ──flushed──▶ (slot freed)
///       │                 │                            │
///       └──── EOF / error ┴──────────▶ Closed ◀────────┘ write error
/// ```
#[derive(Debug)]
pub enum ConnectionState {
    Accepted,
    Reading,
    Writing(ResponseWriter),
    Closed,
}

/// What a drain of the socket produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// No boundary yet; wait for more readiness
    Pending,
    /// The header/body boundary is buffered
    Complete,
    /// Buffer reached capacity without a boundary
    Full,
    /// Peer closed the stream
    Closed,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, peer: Option<SocketAddr>, capacity: usize) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(capacity),
            capacity,
            request_complete: false,
            state: ConnectionState::Accepted,
        }
    }

    /// Reads until the socket would block, the buffer fills, or the peer
    /// closes.
    ///
    /// Each read goes straight into the spare buffer space, so a single
    /// call can take up to `capacity - 1 - len` bytes. Once the boundary is
    /// buffered the drain continues, so the body is everything the kernel
    /// had queued at that point; any outcome after that reports `Complete`.
    pub fn read_available(&mut self) -> io::Result<ReadOutcome> {
        let limit = self.capacity.saturating_sub(1);

        loop {
            let start = self.buffer.len();
            if start >= limit {
                return Ok(if self.request_complete {
                    ReadOutcome::Complete
                } else {
                    ReadOutcome::Full
                });
            }

            self.buffer.resize(limit, 0);
            let result = self.stream.read(&mut self.buffer[start..]);
            let filled = match &result {
                Ok(n) => *n,
                Err(_) => 0,
            };
            self.buffer.truncate(start + filled);

            match result {
                Ok(0) if self.request_complete => return Ok(ReadOutcome::Complete),
                Ok(0) => {
                    self.state = ConnectionState::Closed;
                    return Ok(ReadOutcome::Closed);
                }
                Ok(_) => {
                    self.state = ConnectionState::Reading;
                    if !self.request_complete && is_complete(&self.buffer) {
                        self.request_complete = true;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(if self.request_complete {
                        ReadOutcome::Complete
                    } else {
                        ReadOutcome::Pending
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) if self.request_complete => return Ok(ReadOutcome::Complete),
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    return Err(e);
                }
            }
        }
    }

    /// Serializes `response` and starts flushing it.
    pub fn begin_response(&mut self, response: &Response) -> io::Result<WriteProgress> {
        self.state = ConnectionState::Writing(ResponseWriter::new(response));
        self.flush()
    }

    /// Continues a pending response write.
    pub fn flush(&mut self) -> io::Result<WriteProgress> {
        let ConnectionState::Writing(writer) = &mut self.state else {
            return Ok(WriteProgress::Done);
        };

        match writer.write_to(&mut self.stream) {
            Ok(WriteProgress::Done) => {
                // Best effort; the socket is about to be dropped anyway
                let _ = self.stream.flush();
                Ok(WriteProgress::Done)
            }
            Ok(WriteProgress::Pending) => Ok(WriteProgress::Pending),
            Err(e) => {
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

impl<S> Connection<S> {
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.state, ConnectionState::Writing(_))
    }

    pub fn request_complete(&self) -> bool {
        self.request_complete
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> S {
        self.stream
    }
}
