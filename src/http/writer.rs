use std::io::{self, Write};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Renders `resp` into wire bytes.
///
/// Header order is fixed: `Content-Type`, `Content-Length`,
/// `Connection: close`, then any extra headers.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    let fixed = format!(
        "Content-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        resp.content_type,
        resp.body.len()
    );
    buf.extend_from_slice(fixed.as_bytes());

    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf.extend_from_slice(&resp.body);

    buf
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Every byte has been written
    Done,
    /// The socket would block; call again on the next writable event
    Pending,
}

/// Serialized response plus a write cursor.
#[derive(Debug)]
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    /// Writes as much as the (non-blocking) sink accepts.
    pub fn write_to<W: Write>(&mut self, sink: &mut W) -> io::Result<WriteProgress> {
        while self.written < self.buffer.len() {
            match sink.write(&self.buffer[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(WriteProgress::Done)
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}
